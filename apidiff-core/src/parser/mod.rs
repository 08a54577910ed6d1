//! Source loading: Go sources to symbol tables via tree-sitter.
//!
//! The loader works on one package at a time and never follows imports.
//! References to other packages stay opaque named types keyed by import
//! path, so comparing two revisions does not require a build environment.

pub mod build;
pub mod go;

mod helpers;

pub use build::BuildContext;
pub use go::load_package;
