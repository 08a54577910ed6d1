//! Git revisions as snapshots.
//!
//! Sources are read straight from the object database through the `git`
//! binary (`rev-parse`, `ls-tree`, `show`), so comparing two revisions never
//! touches the working tree.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::process::Command;

use apidiff_core::scanner::{is_go_source, package_path, packages_from_paths};
use apidiff_core::parser::BuildContext;
use apidiff_core::{LoadError, ScanOptions, Snapshot, SourceFile};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum GitError {
    #[error("Failed to run git: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("git {command} failed: {stderr}")]
    Command { command: String, stderr: String },

    #[error("Unknown revision '{0}'")]
    UnknownRevision(String),
}

/// Run git in `repo` and return its stdout.
fn git(repo: &Path, args: &[&str]) -> Result<Vec<u8>, GitError> {
    let output = Command::new("git").arg("-C").arg(repo).args(args).output()?;
    if !output.status.success() {
        return Err(GitError::Command {
            command: args.join(" "),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output.stdout)
}

/// Split NUL-terminated `-z` output into paths.
fn split_paths(stdout: &[u8]) -> Vec<String> {
    stdout
        .split(|b| *b == 0)
        .filter(|s| !s.is_empty())
        .map(|s| String::from_utf8_lossy(s).into_owned())
        .collect()
}

/// Resolve a user-supplied reference to a commit id.
pub fn resolve(repo: &Path, reference: &str) -> Result<String, GitError> {
    let spec = format!("{}^{{commit}}", reference);
    match git(repo, &["rev-parse", "--verify", "--quiet", &spec]) {
        Ok(stdout) => Ok(String::from_utf8_lossy(&stdout).trim().to_string()),
        Err(GitError::Command { .. }) => Err(GitError::UnknownRevision(reference.to_string())),
        Err(e) => Err(e),
    }
}

/// True when `path` is inside a git work tree.
pub fn is_repository(path: &Path) -> bool {
    git(path, &["rev-parse", "--is-inside-work-tree"]).is_ok()
}

/// Packages with Go sources touched between two commits.
///
/// Over-approximates: a touched package whose exported surface is unchanged
/// simply yields no records.
pub fn changed_packages(
    repo: &Path,
    old: &str,
    new: &str,
    options: &ScanOptions,
) -> Result<BTreeSet<String>, GitError> {
    let stdout = git(repo, &["diff", "--name-only", "--no-renames", "-z", old, new])?;
    let paths = split_paths(&stdout);
    let packages = packages_from_paths(paths.iter().map(|p| p.as_str()), options);
    debug!(
        "{} changed files in {} packages between {} and {}",
        paths.len(),
        packages.len(),
        old,
        new
    );
    Ok(packages)
}

/// One revision of a repository.
#[derive(Debug)]
pub struct GitSnapshot {
    repo: PathBuf,
    label: String,
    commit: String,
    /// Package path to repository-relative source paths.
    files: BTreeMap<String, Vec<String>>,
    build: BuildContext,
}

impl GitSnapshot {
    /// Resolve `reference` and index the Go packages of its tree.
    pub fn open(
        repo: impl Into<PathBuf>,
        reference: &str,
        options: &ScanOptions,
    ) -> Result<Self, GitError> {
        let repo = repo.into();
        let commit = resolve(&repo, reference)?;
        let stdout = git(&repo, &["ls-tree", "-r", "-z", "--name-only", &commit])?;
        let paths = split_paths(&stdout);

        let packages = packages_from_paths(paths.iter().map(|p| p.as_str()), options);
        let mut files: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for path in paths {
            let as_path = Path::new(&path);
            let is_source = as_path
                .file_name()
                .is_some_and(|name| is_go_source(&name.to_string_lossy()));
            if !is_source {
                continue;
            }
            let package = package_path(as_path.parent().unwrap_or_else(|| Path::new("")));
            if packages.contains(&package) {
                files.entry(package).or_default().push(path);
            }
        }

        debug!(
            "{} ({}) has {} packages",
            reference,
            &commit[..commit.len().min(12)],
            files.len()
        );
        Ok(Self {
            repo,
            label: reference.to_string(),
            commit,
            files,
            build: options.build.clone(),
        })
    }

    pub fn commit(&self) -> &str {
        &self.commit
    }
}

impl Snapshot for GitSnapshot {
    fn label(&self) -> &str {
        &self.label
    }

    fn packages(&self) -> Result<BTreeSet<String>, LoadError> {
        Ok(self.files.keys().cloned().collect())
    }

    fn package_files(&self, package: &str) -> Result<Vec<SourceFile>, LoadError> {
        let Some(paths) = self.files.get(package) else {
            return Ok(Vec::new());
        };

        let mut sources = Vec::with_capacity(paths.len());
        for path in paths {
            let object = format!("{}:{}", self.commit, path);
            let stdout = git(&self.repo, &["show", &object])
                .map_err(|e| LoadError::unavailable(format!("{}: {}", path, e)))?;
            let name = Path::new(path)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.clone());
            sources.push(SourceFile::new(name, String::from_utf8_lossy(&stdout)));
        }
        Ok(sources)
    }

    fn build_context(&self) -> &BuildContext {
        &self.build
    }
}
