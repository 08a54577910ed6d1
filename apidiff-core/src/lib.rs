//! apidiff core - API compatibility diffing for Go codebases.
//!
//! Given two snapshots of a codebase, this crate reports every change to the
//! exported API of every package and classifies each one as compatible or
//! breaking for existing callers.
//!
//! # Pipeline
//!
//! - **Discovery**: [`scanner`] finds packages in a directory tree; other
//!   [`snapshot::Snapshot`] implementations can read from anywhere else.
//! - **Loading**: [`parser`] turns a package's sources into a
//!   [`symbols::SymbolTable`] of structural [`types::Type`] descriptors.
//! - **Comparison**: [`differ`] compares tables symbol by symbol, in
//!   parallel across packages, and aggregates a [`differ::Report`].
//!
//! # Usage
//!
//! ```no_run
//! use apidiff_core::{DiffPolicy, Differ, DirSnapshot, ScanOptions};
//!
//! let old = DirSnapshot::new("v1", ScanOptions::default());
//! let new = DirSnapshot::new("v2", ScanOptions::default());
//! let report = Differ::new(DiffPolicy::default()).diff_all(&old, &new)?;
//!
//! if report.has_breaking_changes() {
//!     eprintln!("{} breaking changes", report.breaking_count());
//! }
//! # Ok::<(), apidiff_core::LoadError>(())
//! ```

pub mod differ;
pub mod error;
pub mod parser;
pub mod scanner;
pub mod snapshot;
pub mod symbols;
pub mod types;

pub use differ::{ChangeRecord, DiffPolicy, Differ, PackageChanges, Report};
pub use error::{LoadError, PackageError, TableError};
pub use parser::BuildContext;
pub use scanner::ScanOptions;
pub use snapshot::{DirSnapshot, MemorySnapshot, Snapshot, SourceFile};
pub use symbols::{DeclKind, Symbol, SymbolTable};
pub use types::Type;
