//! Symbols command - print the exported surface of a directory's packages
//!
//! Shows exactly what the differ sees for each package, which helps explain
//! a surprising report.

use std::collections::BTreeSet;

use anyhow::Context;
use colored::Colorize;
use serde::Serialize;

use apidiff_core::snapshot::load_symbol_table;
use apidiff_core::{DirSnapshot, ScanOptions, Snapshot};

use crate::output::{Output, OutputConfig, Outputter, TableOutput};

#[derive(Debug, Clone, Serialize)]
pub struct SymbolView {
    pub name: String,
    pub kind: String,
    #[serde(rename = "type")]
    pub ty: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PackageSymbols {
    pub package: String,
    pub symbols: Vec<SymbolView>,
}

/// Exported symbols per package
#[derive(Debug, Serialize)]
pub struct SymbolsResult {
    pub root: String,
    pub packages: Vec<PackageSymbols>,
    /// Packages that could not be loaded, with the reason.
    pub errors: Vec<(String, String)>,
}

impl Outputter for SymbolsResult {
    fn to_text(&self, config: &OutputConfig) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "{} {} ({} packages)\n",
            "SYMBOLS:".cyan().bold(),
            self.root,
            self.packages.len()
        ));

        for package in &self.packages {
            output.push_str(&format!("\n{}\n", package.package.bold()));
            let rows: Vec<Vec<String>> = package
                .symbols
                .iter()
                .map(|s| vec![s.name.clone(), s.kind.clone(), s.ty.clone()])
                .collect();
            output.push_str(&TableOutput::from_rows(&["Name", "Kind", "Type"], &rows, config));
            output.push('\n');
        }

        for (package, error) in &self.errors {
            output.push_str(&format!("\n{} {}: {}\n", "!".yellow(), package, error.dimmed()));
        }

        output
    }

    fn to_markdown(&self, _config: &OutputConfig) -> String {
        let mut output = format!("# Exported symbols of `{}`\n", self.root);

        for package in &self.packages {
            output.push_str(&format!("\n## `{}`\n\n", package.package));
            output.push_str("| Name | Kind | Type |\n");
            output.push_str("|------|------|------|\n");
            for symbol in &package.symbols {
                output.push_str(&format!(
                    "| `{}` | {} | `{}` |\n",
                    symbol.name,
                    symbol.kind,
                    symbol.ty.replace('|', "\\|")
                ));
            }
        }

        output
    }
}

/// Collect the symbol tables of `root`, or of one package in it.
pub fn collect(
    root: &str,
    package: Option<&str>,
    options: ScanOptions,
) -> anyhow::Result<SymbolsResult> {
    let snapshot = DirSnapshot::new(root, options);
    let packages: BTreeSet<String> = match package {
        Some(package) => BTreeSet::from([package.to_string()]),
        None => snapshot
            .packages()
            .with_context(|| format!("Failed to list packages of {}", root))?,
    };

    let mut result = SymbolsResult {
        root: root.to_string(),
        packages: Vec::new(),
        errors: Vec::new(),
    };

    for package in packages {
        match load_symbol_table(&snapshot, &package) {
            Ok(Some(table)) => result.packages.push(PackageSymbols {
                package,
                symbols: table
                    .iter()
                    .map(|s| SymbolView {
                        name: s.name.clone(),
                        kind: s.kind.to_string(),
                        ty: s.ty.to_string(),
                    })
                    .collect(),
            }),
            Ok(None) => result.errors.push((package, "no Go sources".to_string())),
            Err(e) => result.errors.push((package, e.to_string())),
        }
    }

    Ok(result)
}

pub fn run(
    root: &str,
    package: Option<&str>,
    options: ScanOptions,
    config: OutputConfig,
) -> anyhow::Result<()> {
    let result = collect(root, package, options)?;
    Output::with_config(result, config).render()
}
