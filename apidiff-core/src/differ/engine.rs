//! Whole-codebase comparison.
//!
//! Packages are independent, so each one is loaded and classified on the
//! rayon pool. Results are assembled in package-path order regardless of
//! completion order.

use rayon::prelude::*;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use super::changes::{PackageChanges, PackageFailure, Report, Side, Warning};
use super::classifier::classify_package;
use super::comparator::DiffPolicy;
use crate::error::{LoadError, PackageError, TableError};
use crate::snapshot::{load_symbol_table, Snapshot};
use crate::symbols::SymbolTable;

/// Result of processing one package.
enum Outcome {
    Compared {
        changes: Option<PackageChanges>,
        warnings: Vec<Warning>,
    },
    Failed {
        failure: PackageFailure,
        warnings: Vec<Warning>,
    },
}

/// Compares two snapshots package by package.
#[derive(Clone, Debug, Default)]
pub struct Differ {
    policy: DiffPolicy,
    threads: Option<usize>,
}

impl Differ {
    pub fn new(policy: DiffPolicy) -> Self {
        Self {
            policy,
            threads: None,
        }
    }

    /// Cap the worker count; `None` or `0` uses rayon's default.
    pub fn with_threads(mut self, threads: Option<usize>) -> Self {
        self.threads = threads;
        self
    }

    pub fn policy(&self) -> &DiffPolicy {
        &self.policy
    }

    /// Compare every package present in either snapshot.
    pub fn diff_all(&self, old: &dyn Snapshot, new: &dyn Snapshot) -> Result<Report, LoadError> {
        let mut packages = old.packages()?;
        packages.extend(new.packages()?);
        Ok(self.diff(old, new, &packages))
    }

    /// Compare the given packages.
    pub fn diff(&self, old: &dyn Snapshot, new: &dyn Snapshot, packages: &BTreeSet<String>) -> Report {
        info!(
            "comparing {} packages between {} and {}",
            packages.len(),
            old.label(),
            new.label()
        );

        let paths: Vec<&String> = packages.iter().collect();
        let pool = match self.threads {
            Some(n) if n > 0 => rayon::ThreadPoolBuilder::new().num_threads(n).build().ok(),
            _ => None,
        };

        let run = |pkg: &&String| self.diff_package(pkg, old, new);
        let outcomes: Vec<Outcome> = match pool {
            Some(pool) => pool.install(|| paths.par_iter().map(run).collect()),
            None => paths.par_iter().map(run).collect(),
        };

        let mut report = Report::new(old.label(), new.label());
        for outcome in outcomes {
            match outcome {
                Outcome::Compared { changes, warnings } => {
                    report.warnings.extend(warnings);
                    if let Some(changes) = changes.filter(|c| !c.changes.is_empty()) {
                        report.packages.push(changes);
                    }
                }
                Outcome::Failed { failure, warnings } => {
                    report.warnings.extend(warnings);
                    report.failures.push(failure);
                }
            }
        }

        debug!("{}", report.summary().text());
        report
    }

    fn diff_package(&self, package: &str, old: &dyn Snapshot, new: &dyn Snapshot) -> Outcome {
        let mut warnings = Vec::new();

        let old_table = match load_side(old, package, Side::Old, &mut warnings) {
            Ok(table) => table,
            Err(err) => return failed(package, err, warnings),
        };
        let new_table = match load_side(new, package, Side::New, &mut warnings) {
            Ok(table) => table,
            Err(err) => return failed(package, err, warnings),
        };

        let changes = classify_package(package, old_table.as_ref(), new_table.as_ref(), &self.policy);
        if let Some(changes) = &changes {
            debug!("{}: {} changes", package, changes.changes.len());
        }
        Outcome::Compared { changes, warnings }
    }
}

/// Load one side; load failures degrade to an absent table with a warning.
fn load_side(
    snapshot: &dyn Snapshot,
    package: &str,
    side: Side,
    warnings: &mut Vec<Warning>,
) -> Result<Option<SymbolTable>, TableError> {
    match load_symbol_table(snapshot, package) {
        Ok(table) => Ok(table),
        Err(PackageError::Load(err)) => {
            warn!("{} ({} side): {}", package, side.as_str(), err);
            warnings.push(Warning {
                package: package.to_string(),
                side,
                message: err.to_string(),
            });
            Ok(None)
        }
        Err(PackageError::Table(err)) => Err(err),
    }
}

fn failed(package: &str, err: TableError, warnings: Vec<Warning>) -> Outcome {
    warn!("{}: comparison stopped: {}", package, err);
    Outcome::Failed {
        failure: PackageFailure {
            package: package.to_string(),
            message: err.to_string(),
        },
        warnings,
    }
}
