//! apidiff CLI - API compatibility checking for Go codebases
//!
//! Compares two versions of a Go codebase and reports every change to the
//! exported API, flagging the ones that break existing callers.

use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;
mod git;
mod output;

use apidiff_core::differ::{FieldOrder, InterfaceAdditions};
use apidiff_core::BuildContext;
use commands::diff::DiffSettings;
use commands::*;
use config::ApidiffConfig;
use output::{OutputConfig, OutputFormat};

/// Detect breaking changes in the exported API of Go packages.
///
/// apidiff compares two directory trees or two git revisions, package by
/// package, and classifies every exported change as compatible or breaking.
#[derive(Parser)]
#[command(name = "apidiff")]
#[command(author, version)]
#[command(about = "Detect breaking changes in the exported API of Go packages")]
#[command(propagate_version = true)]
#[command(after_help = "Examples:
  apidiff diff v1.4.0 HEAD              Compare two git revisions
  apidiff diff ./old ./new              Compare two directory trees
  apidiff diff main HEAD --format json  Machine-readable report
  apidiff symbols . --package ./client  Show what apidiff sees

Exit codes:
  0  no breaking changes
  1  breaking changes found
  2  some packages could not be compared")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output format (overrides config default)
    #[arg(long, global = true, value_enum)]
    format: Option<OutputFormat>,

    /// Show detailed version information
    #[arg(long = "version-verbose")]
    version_verbose: bool,
}

/// Field order policy as a command-line value
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum FieldOrderArg {
    /// Callers use keyed struct literals; reordering fields is compatible
    Keyed,
    /// Callers use positional struct literals; reordering fields breaks
    Positional,
}

impl From<FieldOrderArg> for FieldOrder {
    fn from(arg: FieldOrderArg) -> Self {
        match arg {
            FieldOrderArg::Keyed => FieldOrder::Keyed,
            FieldOrderArg::Positional => FieldOrder::Positional,
        }
    }
}

/// Interface addition policy as a command-line value
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum InterfaceAdditionsArg {
    /// Callers only use interfaces; adding methods is compatible
    Consumed,
    /// Callers implement interfaces; adding methods breaks
    Implemented,
}

impl From<InterfaceAdditionsArg> for InterfaceAdditions {
    fn from(arg: InterfaceAdditionsArg) -> Self {
        match arg {
            InterfaceAdditionsArg::Consumed => InterfaceAdditions::Consumed,
            InterfaceAdditionsArg::Implemented => InterfaceAdditions::Implemented,
        }
    }
}

/// Platform whose files are loaded (overrides `[scanner]` in the config)
#[derive(Debug, Args)]
struct TargetArgs {
    /// Target operating system, as GOOS
    #[arg(long)]
    goos: Option<String>,

    /// Target architecture, as GOARCH
    #[arg(long)]
    goarch: Option<String>,

    /// Comma-separated build tags
    #[arg(long, value_delimiter = ',')]
    tags: Vec<String>,
}

impl TargetArgs {
    fn apply(self, build: &mut BuildContext) {
        if let Some(goos) = self.goos {
            build.goos = goos;
        }
        if let Some(goarch) = self.goarch {
            build.goarch = goarch;
        }
        if !self.tags.is_empty() {
            build.tags = self.tags;
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Compare the exported API of two versions
    #[command(visible_alias = "d")]
    Diff {
        /// Old version: a directory or a git revision
        old: String,

        /// New version: a directory or a git revision
        new: String,

        /// Repository to read revisions from (forces git mode)
        #[arg(long)]
        repo: Option<PathBuf>,

        /// How callers build struct values
        #[arg(long, value_enum)]
        field_order: Option<FieldOrderArg>,

        /// Whether callers implement exported interfaces
        #[arg(long, value_enum)]
        interface_additions: Option<InterfaceAdditionsArg>,

        /// Worker threads (default: one per core)
        #[arg(short = 'j', long)]
        threads: Option<usize>,

        /// Include packages under internal/ directories
        #[arg(long)]
        include_internal: bool,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// Print the exported symbols of the packages in a directory
    Symbols {
        /// Directory to inspect
        #[arg(default_value = ".")]
        path: String,

        /// Only this package (e.g. ./client)
        #[arg(short, long)]
        package: Option<String>,

        /// Include packages under internal/ directories
        #[arg(long)]
        include_internal: bool,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

fn setup_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();
}

/// Print verbose version information
fn print_verbose_version() {
    use colored::Colorize;

    let cli_version = env!("CARGO_PKG_VERSION");
    let platform = format!("{}-{}", std::env::consts::ARCH, std::env::consts::OS);

    println!("apidiff {}", cli_version);
    println!("  {:<14} {}", "apidiff-cli:".cyan(), cli_version);
    println!("  {:<14} {}", "apidiff-core:".cyan(), cli_version);
    println!("  {:<14} {}", "Platform:".cyan(), platform);
}

/// Directory whose `.apidiff.toml` applies to this invocation.
fn config_root(command: &Commands) -> PathBuf {
    match command {
        Commands::Diff {
            repo: Some(repo), ..
        } => repo.clone(),
        _ => PathBuf::from("."),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.version_verbose {
        print_verbose_version();
        return Ok(());
    }

    setup_logging(cli.verbose, cli.quiet);

    let command = match cli.command {
        Some(cmd) => cmd,
        None => {
            let _ = Cli::command().print_help();
            println!();
            return Ok(());
        }
    };

    let config = ApidiffConfig::load(&config_root(&command));

    // CLI flag > config default > text
    let format = cli.format.unwrap_or_else(|| {
        config
            .default_format()
            .and_then(|f| f.parse().ok())
            .unwrap_or(OutputFormat::Text)
    });

    let output = OutputConfig::auto_detect_with_color_override(format, config.use_color());
    colored::control::set_override(output.use_colors());

    match command {
        Commands::Diff {
            old,
            new,
            repo,
            field_order,
            interface_additions,
            threads,
            include_internal,
            target,
        } => {
            let mut settings = DiffSettings {
                policy: config.policy,
                scan: config.scanner.clone(),
                threads: threads.or(config.threads()),
            };
            if let Some(order) = field_order {
                settings.policy.field_order = order.into();
            }
            if let Some(additions) = interface_additions {
                settings.policy.interface_additions = additions.into();
            }
            settings.scan.include_internal |= include_internal;
            target.apply(&mut settings.scan.build);

            let code = diff::run(&old, &new, repo.as_deref(), settings, output)?;
            if code != diff::EXIT_OK {
                std::process::exit(code);
            }
            Ok(())
        }
        Commands::Symbols {
            path,
            package,
            include_internal,
            target,
        } => {
            let mut scan = config.scanner.clone();
            scan.include_internal |= include_internal;
            target.apply(&mut scan.build);
            symbols::run(&path, package.as_deref(), scan, output)
        }
        Commands::Completions { shell } => {
            completions::run(shell, &mut Cli::command(), &mut std::io::stdout())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_diff_flags() {
        let cli = Cli::try_parse_from([
            "apidiff",
            "diff",
            "v1",
            "v2",
            "--field-order",
            "positional",
            "--interface-additions",
            "implemented",
            "-j",
            "2",
            "--format",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.format, Some(OutputFormat::Json));
        match cli.command {
            Some(Commands::Diff {
                old,
                new,
                field_order,
                interface_additions,
                threads,
                ..
            }) => {
                assert_eq!(old, "v1");
                assert_eq!(new, "v2");
                assert_eq!(
                    FieldOrder::from(field_order.unwrap()),
                    FieldOrder::Positional
                );
                assert_eq!(
                    InterfaceAdditions::from(interface_additions.unwrap()),
                    InterfaceAdditions::Implemented
                );
                assert_eq!(threads, Some(2));
            }
            _ => panic!("expected diff command"),
        }
    }

    #[test]
    fn test_target_flags_override_build_context() {
        let cli = Cli::try_parse_from([
            "apidiff", "diff", "a", "b", "--goos", "windows", "--tags", "integration,slow",
        ])
        .unwrap();
        let Some(Commands::Diff { target, .. }) = cli.command else {
            panic!("expected diff command");
        };

        let mut build = BuildContext::default();
        target.apply(&mut build);
        assert_eq!(build.goos, "windows");
        assert_eq!(build.goarch, "amd64");
        assert_eq!(build.tags, vec!["integration", "slow"]);
    }

    #[test]
    fn test_config_root_follows_repo() {
        let cli = Cli::try_parse_from(["apidiff", "diff", "a", "b", "--repo", "/src/shapes"]).unwrap();
        assert_eq!(
            config_root(&cli.command.unwrap()),
            Path::new("/src/shapes")
        );
    }
}
