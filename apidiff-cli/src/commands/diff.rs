//! Diff command - API compatibility report between two versions
//!
//! Compares either two directory trees or two git revisions and reports
//! every exported API change, marking which ones break existing callers.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context};
use colored::Colorize;
use serde::Serialize;
use tracing::{debug, info};

use apidiff_core::differ::{ChangeKind, PackageFailure, Warning};
use apidiff_core::{DiffPolicy, Differ, DirSnapshot, Report, ScanOptions};

use crate::git::{self, GitSnapshot};
use crate::output::{Output, OutputConfig, Outputter, TableOutput};

/// No breaking changes.
pub const EXIT_OK: i32 = 0;
/// At least one breaking change.
pub const EXIT_BREAKING: i32 = 1;
/// Some packages could not be compared and nothing else broke.
pub const EXIT_FAILED: i32 = 2;

/// Comparison settings after merging CLI flags over the config file.
#[derive(Debug, Clone, Default)]
pub struct DiffSettings {
    pub policy: DiffPolicy,
    pub scan: ScanOptions,
    pub threads: Option<usize>,
}

/// Where the two versions come from.
#[derive(Debug, PartialEq, Eq)]
enum Source {
    Directories,
    Git(PathBuf),
}

fn detect_source(old: &str, new: &str, repo: Option<&Path>) -> anyhow::Result<Source> {
    if let Some(repo) = repo {
        return Ok(Source::Git(repo.to_path_buf()));
    }
    match (Path::new(old).is_dir(), Path::new(new).is_dir()) {
        (true, true) => Ok(Source::Directories),
        (false, false) => Ok(Source::Git(PathBuf::from("."))),
        _ => bail!(
            "'{}' and '{}' must both be directories or both be git revisions",
            old,
            new
        ),
    }
}

/// A single change as presented to users
#[derive(Debug, Clone, Serialize)]
pub struct ChangeView {
    pub symbol: String,
    pub kind: ChangeKind,
    pub message: String,
    pub compatible: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PackageView {
    pub package: String,
    pub changes: Vec<ChangeView>,
}

/// Rendered form of a [`Report`].
#[derive(Debug, Serialize)]
pub struct DiffResult {
    pub old_ref: String,
    pub new_ref: String,
    pub has_breaking_changes: bool,
    pub breaking_count: usize,
    pub compatible_count: usize,
    pub packages: Vec<PackageView>,
    pub warnings: Vec<Warning>,
    pub failures: Vec<PackageFailure>,
}

impl DiffResult {
    pub fn from_report(report: &Report) -> Self {
        let packages = report
            .packages
            .iter()
            .map(|p| PackageView {
                package: p.package.clone(),
                changes: p
                    .changes
                    .iter()
                    .map(|c| ChangeView {
                        symbol: c.symbol_name.clone(),
                        kind: c.kind,
                        message: c.message.clone(),
                        compatible: c.compatible,
                    })
                    .collect(),
            })
            .collect();

        Self {
            old_ref: report.old_ref.clone(),
            new_ref: report.new_ref.clone(),
            has_breaking_changes: report.has_breaking_changes(),
            breaking_count: report.breaking_count(),
            compatible_count: report.compatible_count(),
            packages,
            warnings: report.warnings.clone(),
            failures: report.failures.clone(),
        }
    }

    pub fn exit_code(&self) -> i32 {
        if self.has_breaking_changes {
            EXIT_BREAKING
        } else if !self.failures.is_empty() {
            EXIT_FAILED
        } else {
            EXIT_OK
        }
    }

    fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    fn package_rows(&self) -> Vec<Vec<String>> {
        self.packages
            .iter()
            .map(|p| {
                let breaking = p.changes.iter().filter(|c| !c.compatible).count();
                vec![
                    p.package.clone(),
                    breaking.to_string(),
                    (p.changes.len() - breaking).to_string(),
                ]
            })
            .collect()
    }
}

impl Outputter for DiffResult {
    fn to_text(&self, config: &OutputConfig) -> String {
        let mut output = String::new();

        output.push_str(&format!("{}\n", "API Changes Report".bold()));
        output.push_str("==================\n");
        output.push_str(&format!("Old: {}\n", self.old_ref.yellow()));
        output.push_str(&format!("New: {}\n\n", self.new_ref.green()));

        if self.is_empty() {
            output.push_str(&format!("{}\n", "No API changes detected.".dimmed()));
        } else {
            output.push_str("Summary:\n");
            output.push_str(&format!(
                "  Breaking changes:   {}\n",
                self.breaking_count.to_string().red()
            ));
            output.push_str(&format!(
                "  Compatible changes: {}\n\n",
                self.compatible_count.to_string().green()
            ));
            output.push_str(&TableOutput::from_rows(
                &["Package", "Breaking", "Compatible"],
                &self.package_rows(),
                config,
            ));
            output.push('\n');

            for package in &self.packages {
                let title = format!("Package: {}", package.package);
                output.push_str(&format!("\n{}\n", title.cyan().bold()));
                output.push_str(&format!("{}\n", "-".repeat(title.chars().count())));

                let breaking: Vec<&ChangeView> =
                    package.changes.iter().filter(|c| !c.compatible).collect();
                if !breaking.is_empty() {
                    output.push_str(&format!("\n{}\n", "Breaking changes:".red().bold()));
                    for change in breaking {
                        output.push_str(&format!("  {} {}\n", "✗".red(), change.message));
                    }
                }

                let compatible: Vec<&ChangeView> =
                    package.changes.iter().filter(|c| c.compatible).collect();
                if !compatible.is_empty() {
                    output.push_str(&format!("\n{}\n", "Compatible changes:".green().bold()));
                    for change in compatible {
                        output.push_str(&format!("  {} {}\n", "✓".green(), change.message));
                    }
                }
            }
        }

        if !self.warnings.is_empty() {
            output.push_str(&format!("\n{}\n", "Warnings:".yellow().bold()));
            for warning in &self.warnings {
                output.push_str(&format!("  ! {}\n", warning));
            }
        }

        if !self.failures.is_empty() {
            output.push_str(&format!("\n{}\n", "Failed packages:".red().bold()));
            for failure in &self.failures {
                output.push_str(&format!("  ✗ {}: {}\n", failure.package, failure.message));
            }
        }

        if self.has_breaking_changes {
            output.push_str(&format!(
                "\n{}\n",
                "⚠️  This change contains breaking API changes!".red().bold()
            ));
        }

        output
    }

    fn to_markdown(&self, _config: &OutputConfig) -> String {
        let mut output = String::new();

        output.push_str("# API Changes Report\n\n");
        output.push_str(&format!("**Old:** `{}`  \n", self.old_ref));
        output.push_str(&format!("**New:** `{}`  \n\n", self.new_ref));

        if self.is_empty() {
            output.push_str("*No API changes detected.*\n");
        } else {
            output.push_str("## Summary\n\n");
            output.push_str("| Type | Count |\n");
            output.push_str("|------|-------|\n");
            output.push_str(&format!("| Breaking changes | {} |\n", self.breaking_count));
            output.push_str(&format!(
                "| Compatible changes | {} |\n\n",
                self.compatible_count
            ));

            output.push_str("## Changes by Package\n\n");
            for package in &self.packages {
                output.push_str(&format!("### `{}`\n\n", package.package));

                let breaking: Vec<&ChangeView> =
                    package.changes.iter().filter(|c| !c.compatible).collect();
                if !breaking.is_empty() {
                    output.push_str("#### ❌ Breaking changes\n\n");
                    for change in breaking {
                        output.push_str(&format!("- {}\n", change.message));
                    }
                    output.push('\n');
                }

                let compatible: Vec<&ChangeView> =
                    package.changes.iter().filter(|c| c.compatible).collect();
                if !compatible.is_empty() {
                    output.push_str("#### ✅ Compatible changes\n\n");
                    for change in compatible {
                        output.push_str(&format!("- {}\n", change.message));
                    }
                    output.push('\n');
                }
            }
        }

        if !self.warnings.is_empty() {
            output.push_str("## Warnings\n\n");
            for warning in &self.warnings {
                output.push_str(&format!("- {}\n", warning));
            }
            output.push('\n');
        }

        if !self.failures.is_empty() {
            output.push_str("## Failed packages\n\n");
            for failure in &self.failures {
                output.push_str(&format!("- `{}`: {}\n", failure.package, failure.message));
            }
            output.push('\n');
        }

        if self.has_breaking_changes {
            output.push_str("---\n\n");
            output.push_str("⚠️ **This change contains breaking API changes!**\n");
        }

        output
    }
}

/// Compare two versions and print the report. Returns the process exit code.
pub fn run(
    old: &str,
    new: &str,
    repo: Option<&Path>,
    settings: DiffSettings,
    config: OutputConfig,
) -> anyhow::Result<i32> {
    let start = Instant::now();
    let differ = Differ::new(settings.policy).with_threads(settings.threads);

    let report = match detect_source(old, new, repo)? {
        Source::Directories => {
            info!("comparing directories {} and {}", old, new);
            let old_snapshot = DirSnapshot::new(old, settings.scan.clone());
            let new_snapshot = DirSnapshot::new(new, settings.scan);
            differ
                .diff_all(&old_snapshot, &new_snapshot)
                .with_context(|| format!("Failed to list packages of {} and {}", old, new))?
        }
        Source::Git(repo) => {
            if !git::is_repository(&repo) {
                bail!("{} is not inside a git repository", repo.display());
            }
            let old_snapshot = GitSnapshot::open(&repo, old, &settings.scan)
                .with_context(|| format!("Failed to read revision {}", old))?;
            let new_snapshot = GitSnapshot::open(&repo, new, &settings.scan)
                .with_context(|| format!("Failed to read revision {}", new))?;
            debug!(
                "comparing commits {} and {}",
                old_snapshot.commit(),
                new_snapshot.commit()
            );

            let changed = git::changed_packages(
                &repo,
                old_snapshot.commit(),
                new_snapshot.commit(),
                &settings.scan,
            )
            .context("Failed to list changed packages")?;
            differ.diff(&old_snapshot, &new_snapshot, &changed)
        }
    };

    info!(
        "{} ({}ms)",
        report.summary().text(),
        start.elapsed().as_millis()
    );
    let result = DiffResult::from_report(&report);
    let code = result.exit_code();
    Output::with_config(result, config).render()?;
    Ok(code)
}
