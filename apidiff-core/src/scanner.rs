//! Package discovery over a directory tree using the `ignore` crate.
//!
//! A package is a directory holding at least one non-test `.go` file. Paths
//! are reported relative to the scan root in `./dir/sub` form, with the
//! root itself reported as `.`.
//!
//! Walking honors `.gitignore` (inside git work trees) and a custom
//! `.apidiffignore` file at any level. Directories the Go tool skips for
//! `./...` patterns (`testdata`, names starting with `.` or `_`) are never
//! descended into.

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::LoadError;
use crate::parser::BuildContext;

/// Custom ignore file honored at every directory level.
pub const IGNORE_FILE: &str = ".apidiffignore";

/// Options controlling which packages are compared.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanOptions {
    /// Include packages under an `internal` path element.
    pub include_internal: bool,

    /// Extra gitignore-style patterns to skip.
    pub ignore: Vec<String>,

    /// Follow symbolic links while walking.
    pub follow_symlinks: bool,

    /// Platform packages are loaded for (`goos`, `goarch`, `cgo`, `tags`).
    #[serde(flatten)]
    pub build: BuildContext,
}

/// True for files that contribute to a package's exported surface.
pub fn is_go_source(file_name: &str) -> bool {
    file_name.ends_with(".go") && !file_name.ends_with("_test.go")
}

/// Package path for a directory given relative to the root.
pub fn package_path(rel_dir: &Path) -> String {
    let rel = rel_dir.to_string_lossy().replace('\\', "/");
    let rel = rel.trim_matches('/');
    if rel.is_empty() || rel == "." {
        ".".to_string()
    } else {
        format!("./{}", rel.trim_start_matches("./"))
    }
}

/// Packages below an `internal` element cannot be imported from outside the
/// module, so they are not part of its public surface.
pub fn is_internal(package: &str) -> bool {
    package.split('/').any(|segment| segment == "internal")
}

/// Apply the internal-package filter to a discovered set.
pub fn filter_packages(packages: BTreeSet<String>, options: &ScanOptions) -> BTreeSet<String> {
    if options.include_internal {
        return packages;
    }
    packages
        .into_iter()
        .filter(|p| {
            let keep = !is_internal(p);
            if !keep {
                debug!("skipping internal package {}", p);
            }
            keep
        })
        .collect()
}

fn skipped_dir_name(name: &str) -> bool {
    name == "testdata" || name.starts_with('.') || name.starts_with('_')
}

/// Discover every package below `root`.
pub fn find_packages(root: &Path, options: &ScanOptions) -> Result<BTreeSet<String>, LoadError> {
    if !root.is_dir() {
        return Err(LoadError::unavailable(format!(
            "not a directory: {}",
            root.display()
        )));
    }

    let mut builder = WalkBuilder::new(root);
    builder
        .hidden(false)
        .git_ignore(true)
        .git_exclude(true)
        .follow_links(options.follow_symlinks)
        .add_custom_ignore_filename(IGNORE_FILE)
        .filter_entry(|entry| {
            let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
            entry.depth() == 0
                || !is_dir
                || !skipped_dir_name(&entry.file_name().to_string_lossy())
        });

    if !options.ignore.is_empty() {
        let mut overrides = ignore::overrides::OverrideBuilder::new(root);
        for pattern in &options.ignore {
            if let Err(e) = overrides.add(&format!("!{}", pattern)) {
                warn!("Invalid ignore pattern '{}': {}", pattern, e);
            }
        }
        match overrides.build() {
            Ok(overrides) => {
                builder.overrides(overrides);
            }
            Err(e) => warn!("Ignoring scanner patterns: {}", e),
        }
    }

    let mut packages = BTreeSet::new();
    for entry in builder.build() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }
        if !is_go_source(&entry.file_name().to_string_lossy()) {
            continue;
        }
        let dir = entry.path().parent().unwrap_or(root);
        let rel = dir.strip_prefix(root).unwrap_or(dir);
        packages.insert(package_path(rel));
    }

    debug!("found {} packages under {}", packages.len(), root.display());
    Ok(filter_packages(packages, options))
}

/// Packages for a flat list of root-relative file paths, such as a git tree
/// listing, using the same rules as [`find_packages`].
pub fn packages_from_paths<'a, I>(paths: I, options: &ScanOptions) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let matcher = ignore_matcher(&options.ignore);
    let mut packages = BTreeSet::new();

    for path in paths {
        let path = Path::new(path);
        let is_source = path
            .file_name()
            .is_some_and(|name| is_go_source(&name.to_string_lossy()));
        if !is_source {
            continue;
        }
        let dir = path.parent().unwrap_or_else(|| Path::new(""));
        if dir
            .components()
            .any(|c| skipped_dir_name(&c.as_os_str().to_string_lossy()))
        {
            continue;
        }
        if let Some(matcher) = &matcher {
            if matcher.matched_path_or_any_parents(path, false).is_ignore() {
                continue;
            }
        }
        packages.insert(package_path(dir));
    }

    filter_packages(packages, options)
}

fn ignore_matcher(patterns: &[String]) -> Option<Gitignore> {
    if patterns.is_empty() {
        return None;
    }
    let mut builder = GitignoreBuilder::new("");
    for pattern in patterns {
        if let Err(e) = builder.add_line(None, pattern) {
            warn!("Invalid ignore pattern '{}': {}", pattern, e);
        }
    }
    match builder.build() {
        Ok(matcher) => Some(matcher),
        Err(e) => {
            warn!("Ignoring scanner patterns: {}", e);
            None
        }
    }
}
