//! API compatibility diffing.
//!
//! - [`comparator`]: structural comparison of two type descriptors under a
//!   [`DiffPolicy`].
//! - [`classifier`]: per-symbol classification of two symbol tables.
//! - [`changes`]: change records and the aggregate [`Report`].
//! - [`engine`]: parallel, per-package comparison of two snapshots.
//!
//! # Example
//!
//! ```no_run
//! use apidiff_core::differ::{DiffPolicy, Differ};
//! use apidiff_core::scanner::ScanOptions;
//! use apidiff_core::snapshot::DirSnapshot;
//!
//! let old = DirSnapshot::new("old", ScanOptions::default());
//! let new = DirSnapshot::new("new", ScanOptions::default());
//! let report = Differ::new(DiffPolicy::default()).diff_all(&old, &new).unwrap();
//!
//! for package in &report.packages {
//!     for change in package.breaking() {
//!         println!("BREAKING: {}", change.message);
//!     }
//! }
//! ```

pub mod changes;
pub mod classifier;
pub mod comparator;
pub mod engine;

pub use changes::{
    ChangeKind, ChangeRecord, DiffSummary, PackageChanges, PackageFailure, Report, Side, Warning,
};
pub use classifier::{classify, classify_package, classify_symbol};
pub use comparator::{compare_types, DiffPolicy, FieldOrder, InterfaceAdditions, TypeDelta};
pub use engine::Differ;
