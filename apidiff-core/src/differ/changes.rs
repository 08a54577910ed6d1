//! Change records and the report aggregate.

use serde::Serialize;
use std::fmt;

/// Type of change detected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Removed,
    Changed,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Added => "added",
            ChangeKind::Removed => "removed",
            ChangeKind::Changed => "changed",
        }
    }
}

/// A single compatibility-relevant change to one symbol (or to a whole
/// package, for package-level records).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChangeRecord {
    /// Qualified symbol name, or the package path for package records.
    pub symbol_name: String,

    pub kind: ChangeKind,

    /// Whether existing callers keep compiling against the new version.
    pub compatible: bool,

    /// Human-readable line, prefixed with the symbol name.
    pub message: String,
}

impl ChangeRecord {
    pub fn added(symbol_name: &str) -> Self {
        Self {
            symbol_name: symbol_name.to_string(),
            kind: ChangeKind::Added,
            compatible: true,
            message: format!("{}: added", symbol_name),
        }
    }

    pub fn removed(symbol_name: &str) -> Self {
        Self {
            symbol_name: symbol_name.to_string(),
            kind: ChangeKind::Removed,
            compatible: false,
            message: format!("{}: removed", symbol_name),
        }
    }

    pub fn changed(symbol_name: &str, compatible: bool, description: &str) -> Self {
        Self {
            symbol_name: symbol_name.to_string(),
            kind: ChangeKind::Changed,
            compatible,
            message: format!("{}: {}", symbol_name, description),
        }
    }

    pub fn package_added(package: &str) -> Self {
        Self {
            symbol_name: package.to_string(),
            kind: ChangeKind::Added,
            compatible: true,
            message: format!("package {} added", package),
        }
    }

    pub fn package_removed(package: &str) -> Self {
        Self {
            symbol_name: package.to_string(),
            kind: ChangeKind::Removed,
            compatible: false,
            message: format!("package {} removed", package),
        }
    }

    pub fn is_breaking(&self) -> bool {
        !self.compatible
    }
}

impl fmt::Display for ChangeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Ordered change records of one package.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PackageChanges {
    pub package: String,
    pub changes: Vec<ChangeRecord>,
}

impl PackageChanges {
    pub fn breaking(&self) -> impl Iterator<Item = &ChangeRecord> {
        self.changes.iter().filter(|c| !c.compatible)
    }

    pub fn compatible(&self) -> impl Iterator<Item = &ChangeRecord> {
        self.changes.iter().filter(|c| c.compatible)
    }
}

/// Which snapshot a warning refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Old,
    New,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Old => "old",
            Side::New => "new",
        }
    }
}

/// A non-fatal degradation: one side of a package could not be loaded and
/// was compared as absent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub package: String,
    pub side: Side,
    pub message: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} side) compared as absent: {}",
            self.package,
            self.side.as_str(),
            self.message
        )
    }
}

/// A package whose comparison was stopped by an invariant violation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PackageFailure {
    pub package: String,
    pub message: String,
}

/// Summary counts over a report.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    pub packages: usize,
    pub breaking: usize,
    pub compatible: usize,
    pub warnings: usize,
    pub failures: usize,
}

impl DiffSummary {
    /// Generate human-readable summary string.
    pub fn text(&self) -> String {
        if self.breaking == 0 && self.compatible == 0 {
            return "No API changes".to_string();
        }
        let mut text = format!(
            "{} breaking, {} compatible in {} package{}",
            self.breaking,
            self.compatible,
            self.packages,
            if self.packages == 1 { "" } else { "s" }
        );
        if self.warnings > 0 {
            text.push_str(&format!(", {} warnings", self.warnings));
        }
        if self.failures > 0 {
            text.push_str(&format!(", {} failed", self.failures));
        }
        text
    }
}

/// Complete result of comparing two revisions.
///
/// A read-only view: counts are recomputed from the package list on every
/// call rather than cached.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Report {
    pub old_ref: String,
    pub new_ref: String,

    /// Package change sets, sorted by package path.
    pub packages: Vec<PackageChanges>,

    pub warnings: Vec<Warning>,

    pub failures: Vec<PackageFailure>,
}

impl Report {
    pub fn new(old_ref: impl Into<String>, new_ref: impl Into<String>) -> Self {
        Self {
            old_ref: old_ref.into(),
            new_ref: new_ref.into(),
            ..Default::default()
        }
    }

    fn records(&self) -> impl Iterator<Item = &ChangeRecord> {
        self.packages.iter().flat_map(|p| p.changes.iter())
    }

    /// True iff any record in any package is incompatible.
    pub fn has_breaking_changes(&self) -> bool {
        self.records().any(|c| !c.compatible)
    }

    pub fn breaking_count(&self) -> usize {
        self.records().filter(|c| !c.compatible).count()
    }

    pub fn compatible_count(&self) -> usize {
        self.records().filter(|c| c.compatible).count()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// True when no package reported any change.
    pub fn is_empty(&self) -> bool {
        self.packages.iter().all(|p| p.changes.is_empty())
    }

    pub fn package(&self, path: &str) -> Option<&PackageChanges> {
        self.packages.iter().find(|p| p.package == path)
    }

    pub fn summary(&self) -> DiffSummary {
        DiffSummary {
            packages: self.packages.len(),
            breaking: self.breaking_count(),
            compatible: self.compatible_count(),
            warnings: self.warnings.len(),
            failures: self.failures.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report_with(records: Vec<ChangeRecord>) -> Report {
        let mut report = Report::new("v1", "v2");
        report.packages.push(PackageChanges {
            package: "./api".to_string(),
            changes: records,
        });
        report
    }

    #[test]
    fn test_change_kind_as_str() {
        assert_eq!(ChangeKind::Added.as_str(), "added");
        assert_eq!(ChangeKind::Removed.as_str(), "removed");
        assert_eq!(ChangeKind::Changed.as_str(), "changed");
    }

    #[test]
    fn test_added_is_compatible_removed_is_not() {
        let added = ChangeRecord::added("Multiply");
        assert!(added.compatible);
        assert_eq!(added.message, "Multiply: added");

        let removed = ChangeRecord::removed("MaxRetries");
        assert!(removed.is_breaking());
        assert_eq!(removed.to_string(), "MaxRetries: removed");
    }

    #[test]
    fn test_package_records() {
        let added = ChangeRecord::package_added("./billing");
        assert!(added.compatible);
        assert_eq!(added.message, "package ./billing added");

        let removed = ChangeRecord::package_removed("./billing");
        assert!(!removed.compatible);
        assert_eq!(removed.kind, ChangeKind::Removed);
    }

    #[test]
    fn test_report_counts() {
        let report = report_with(vec![
            ChangeRecord::added("A"),
            ChangeRecord::added("B"),
            ChangeRecord::changed("C", false, "changed from int to string"),
        ]);

        assert!(report.has_breaking_changes());
        assert_eq!(report.breaking_count(), 1);
        assert_eq!(report.compatible_count(), 2);
        assert!(!report.is_empty());
    }

    #[test]
    fn test_empty_report() {
        let report = Report::new("a", "b");
        assert!(!report.has_breaking_changes());
        assert_eq!(report.breaking_count(), 0);
        assert!(report.is_empty());
        assert_eq!(report.summary().text(), "No API changes");
    }

    #[test]
    fn test_summary_text() {
        let mut report = report_with(vec![
            ChangeRecord::added("A"),
            ChangeRecord::removed("B"),
        ]);
        report.warnings.push(Warning {
            package: "./api".to_string(),
            side: Side::Old,
            message: "parse error".to_string(),
        });

        let summary = report.summary();
        assert_eq!(summary.breaking, 1);
        assert_eq!(summary.compatible, 1);
        assert_eq!(summary.text(), "1 breaking, 1 compatible in 1 package, 1 warnings");
    }

    #[test]
    fn test_warning_display() {
        let warning = Warning {
            package: "./api".to_string(),
            side: Side::New,
            message: "no such revision".to_string(),
        };
        assert_eq!(
            warning.to_string(),
            "./api (new side) compared as absent: no such revision"
        );
    }
}
