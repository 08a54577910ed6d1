//! Read-only views of a codebase at one revision.
//!
//! A [`Snapshot`] answers two questions: which packages exist, and what the
//! source files of one package contain. The engine never touches the
//! filesystem or version control directly, which keeps comparison a pure
//! function of two snapshots.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{LoadError, PackageError};
use crate::parser::{self, BuildContext};
use crate::scanner::{self, ScanOptions};
use crate::symbols::SymbolTable;

/// One source file of a package.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceFile {
    /// File name without directory.
    pub name: String,
    pub source: String,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }
}

/// A codebase at one revision.
///
/// Implementations must be safe to read from several threads at once.
pub trait Snapshot: Sync {
    /// Label shown in reports (a git ref or a directory).
    fn label(&self) -> &str;

    /// Every package present in this snapshot.
    fn packages(&self) -> Result<BTreeSet<String>, LoadError>;

    /// Go sources of one package, sorted by name. Empty when the package
    /// does not exist at this revision.
    fn package_files(&self, package: &str) -> Result<Vec<SourceFile>, LoadError>;

    /// Target platform and tags that decide which files are loaded.
    fn build_context(&self) -> &BuildContext;
}

/// Load the symbol table of `package`, or `None` when the snapshot has no
/// such package.
pub fn load_symbol_table(
    snapshot: &dyn Snapshot,
    package: &str,
) -> Result<Option<SymbolTable>, PackageError> {
    let files = snapshot.package_files(package)?;
    if files.is_empty() {
        return Ok(None);
    }
    parser::load_package(package, &files, snapshot.build_context())
}

/// A checked-out directory tree.
#[derive(Clone, Debug)]
pub struct DirSnapshot {
    root: PathBuf,
    label: String,
    options: ScanOptions,
}

impl DirSnapshot {
    pub fn new(root: impl Into<PathBuf>, options: ScanOptions) -> Self {
        let root = root.into();
        let label = root.display().to_string();
        Self {
            root,
            label,
            options,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn package_dir(&self, package: &str) -> PathBuf {
        let rel = package.trim_start_matches('.').trim_start_matches('/');
        if rel.is_empty() {
            self.root.clone()
        } else {
            self.root.join(rel)
        }
    }
}

impl Snapshot for DirSnapshot {
    fn label(&self) -> &str {
        &self.label
    }

    fn packages(&self) -> Result<BTreeSet<String>, LoadError> {
        scanner::find_packages(&self.root, &self.options)
    }

    fn package_files(&self, package: &str) -> Result<Vec<SourceFile>, LoadError> {
        let dir = self.package_dir(package);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if !scanner::is_go_source(&name) {
                continue;
            }
            let source = fs::read_to_string(entry.path())?;
            files.push(SourceFile { name, source });
        }
        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    fn build_context(&self) -> &BuildContext {
        &self.options.build
    }
}

/// An in-memory snapshot, handy for embedding and tests.
#[derive(Clone, Debug, Default)]
pub struct MemorySnapshot {
    label: String,
    packages: BTreeMap<String, Vec<SourceFile>>,
    build: BuildContext,
}

impl MemorySnapshot {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            packages: BTreeMap::new(),
            build: BuildContext::default(),
        }
    }

    /// Load packages for another platform than linux/amd64.
    pub fn with_build_context(mut self, build: BuildContext) -> Self {
        self.build = build;
        self
    }

    /// Add a file to a package, creating the package on first use.
    pub fn with_file(mut self, package: &str, name: &str, source: &str) -> Self {
        self.add_file(package, name, source);
        self
    }

    pub fn add_file(&mut self, package: &str, name: &str, source: &str) {
        let files = self.packages.entry(package.to_string()).or_default();
        files.push(SourceFile::new(name, source));
        files.sort_by(|a, b| a.name.cmp(&b.name));
    }
}

impl Snapshot for MemorySnapshot {
    fn label(&self) -> &str {
        &self.label
    }

    fn packages(&self) -> Result<BTreeSet<String>, LoadError> {
        Ok(self.packages.keys().cloned().collect())
    }

    fn package_files(&self, package: &str) -> Result<Vec<SourceFile>, LoadError> {
        Ok(self.packages.get(package).cloned().unwrap_or_default())
    }

    fn build_context(&self) -> &BuildContext {
        &self.build
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_dir_snapshot_reads_package_files() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("api")).unwrap();
        fs::write(dir.path().join("api/b.go"), "package api\n").unwrap();
        fs::write(dir.path().join("api/a.go"), "package api\n").unwrap();
        fs::write(dir.path().join("api/a_test.go"), "package api\n").unwrap();

        let snapshot = DirSnapshot::new(dir.path(), ScanOptions::default());
        let files = snapshot.package_files("./api").unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.go", "b.go"]);

        assert!(snapshot.package_files("./missing").unwrap().is_empty());
    }

    #[test]
    fn test_dir_snapshot_root_package() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("main.go"), "package main\n").unwrap();

        let snapshot = DirSnapshot::new(dir.path(), ScanOptions::default());
        assert_eq!(snapshot.package_files(".").unwrap().len(), 1);
        assert!(snapshot.packages().unwrap().contains("."));
    }

    #[test]
    fn test_load_symbol_table_absent_package() {
        let snapshot = MemorySnapshot::new("empty");
        assert!(load_symbol_table(&snapshot, "./api").unwrap().is_none());
    }

    #[test]
    fn test_load_symbol_table_uses_snapshot_platform() {
        let snapshot = MemorySnapshot::new("v1")
            .with_file("./fsx", "open_linux.go", "package fsx\n\nfunc Open() error { return nil }\n")
            .with_file("./fsx", "open_windows.go", "package fsx\n\nfunc Open() error { return nil }\n")
            .with_file("./fsx", "sync_windows.go", "package fsx\n\nfunc Sync() {}\n");

        let linux = load_symbol_table(&snapshot, "./fsx").unwrap().unwrap();
        assert_eq!(linux.names().collect::<Vec<_>>(), vec!["Open"]);

        let snapshot = snapshot.with_build_context(BuildContext::new("windows", "amd64"));
        let windows = load_symbol_table(&snapshot, "./fsx").unwrap().unwrap();
        assert_eq!(windows.names().collect::<Vec<_>>(), vec!["Open", "Sync"]);
    }

    #[test]
    fn test_memory_snapshot() {
        let snapshot = MemorySnapshot::new("v1")
            .with_file("./api", "z.go", "package api\n")
            .with_file("./api", "a.go", "package api\n")
            .with_file(".", "main.go", "package main\n");

        assert_eq!(snapshot.label(), "v1");
        let packages: Vec<String> = snapshot.packages().unwrap().into_iter().collect();
        assert_eq!(packages, vec![".".to_string(), "./api".to_string()]);
        assert_eq!(snapshot.package_files("./api").unwrap()[0].name, "a.go");
    }
}
