//! Integration tests for the apidiff CLI
//!
//! Drives the built binary against the Go fixture trees shared with
//! apidiff-core. Each test runs in its own temporary working directory so no
//! stray `.apidiff.toml` is picked up.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

// ============================================================================
// Test Utilities
// ============================================================================

fn apidiff_binary() -> Command {
    Command::new(env!("CARGO_BIN_EXE_apidiff"))
}

/// Run apidiff with the given args in the specified directory
fn run_apidiff(dir: &Path, args: &[&str]) -> Output {
    apidiff_binary()
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .expect("Failed to execute apidiff command")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

fn fixture(side: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../apidiff-core/tests/fixtures/inventory")
        .join(side)
}

fn fixture_arg(side: &str) -> String {
    fixture(side).to_string_lossy().to_string()
}

fn platform_arg(side: &str) -> String {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../apidiff-core/tests/fixtures/platform")
        .join(side)
        .to_string_lossy()
        .to_string()
}

/// Run `apidiff diff old new` over the fixtures with extra args
fn diff_fixtures(dir: &Path, extra: &[&str]) -> Output {
    let old = fixture_arg("old");
    let new = fixture_arg("new");
    let mut args = vec!["diff", old.as_str(), new.as_str()];
    args.extend_from_slice(extra);
    run_apidiff(dir, &args)
}

fn parse_json(output: &Output) -> serde_json::Value {
    let text = stdout(output);
    serde_json::from_str(&text).unwrap_or_else(|e| panic!("invalid JSON ({}): {}", e, text))
}

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .is_ok_and(|o| o.status.success())
}

fn git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args([
            "-c",
            "user.name=apidiff",
            "-c",
            "user.email=apidiff@example.com",
            "-c",
            "commit.gpgsign=false",
        ])
        .args(args)
        .output()
        .expect("Failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        stderr(&output)
    );
}

fn copy_tree(from: &Path, to: &Path) {
    for entry in fs::read_dir(from).unwrap() {
        let entry = entry.unwrap();
        let target = to.join(entry.file_name());
        if entry.file_type().unwrap().is_dir() {
            fs::create_dir_all(&target).unwrap();
            copy_tree(&entry.path(), &target);
        } else {
            fs::copy(entry.path(), &target).unwrap();
        }
    }
}

/// Replace everything but `.git` with the contents of `from`
fn replace_tree(from: &Path, repo: &Path) {
    for entry in fs::read_dir(repo).unwrap() {
        let entry = entry.unwrap();
        if entry.file_name() == ".git" {
            continue;
        }
        if entry.file_type().unwrap().is_dir() {
            fs::remove_dir_all(entry.path()).unwrap();
        } else {
            fs::remove_file(entry.path()).unwrap();
        }
    }
    copy_tree(from, repo);
}

/// Repository with the old fixture tagged `v1` and the new one tagged `v2`
fn fixture_repository() -> TempDir {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let repo = dir.path();
    git(repo, &["init", "-q"]);

    copy_tree(&fixture("old"), repo);
    git(repo, &["add", "-A"]);
    git(repo, &["commit", "-q", "-m", "v1"]);
    git(repo, &["tag", "v1"]);

    replace_tree(&fixture("new"), repo);
    git(repo, &["add", "-A"]);
    git(repo, &["commit", "-q", "-m", "v2"]);
    git(repo, &["tag", "v2"]);
    dir
}

// ============================================================================
// Directory Mode Tests
// ============================================================================

#[test]
fn test_diff_directories_text() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let output = diff_fixtures(temp_dir.path(), &[]);

    assert_eq!(output.status.code(), Some(1), "stderr: {}", stderr(&output));

    let text = stdout(&output);
    assert!(text.starts_with("API Changes Report\n"));
    assert!(text.contains("  Breaking changes:   3\n"));
    assert!(text.contains("  Compatible changes: 5\n"));
    assert!(text.contains("Package: ./store\n"));
    assert!(text.contains("  ✗ New: changed from func(int) *Memory to func(int, ...Option) *Memory\n"));
    assert!(text.contains("  ✗ DefaultCapacity: changed from untyped int to int\n"));
    assert!(text.contains("  ✓ (*Memory).Delete: added\n"));
    assert!(text.contains("  ✗ package ./legacy removed\n"));
    assert!(text.contains("  ✓ package ./audit added\n"));
    assert!(!text.contains("./pricing"), "unchanged packages are omitted");
    assert!(text.contains("This change contains breaking API changes!"));
}

#[test]
fn test_diff_directories_json() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let output = diff_fixtures(temp_dir.path(), &["--format", "json"]);

    assert_eq!(output.status.code(), Some(1));
    let json = parse_json(&output);

    assert_eq!(json["has_breaking_changes"], true);
    assert_eq!(json["breaking_count"], 3);
    assert_eq!(json["compatible_count"], 5);

    let packages: Vec<&str> = json["packages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["package"].as_str().unwrap())
        .collect();
    assert_eq!(packages, vec!["./audit", "./legacy", "./store"]);

    let store = &json["packages"][2]["changes"];
    assert_eq!(store[0]["symbol"], "(*Memory).Delete");
    assert_eq!(store[0]["kind"], "added");
    assert_eq!(store[0]["compatible"], true);
    assert!(json["warnings"].as_array().unwrap().is_empty());
    assert!(json["failures"].as_array().unwrap().is_empty());
}

#[test]
fn test_diff_directories_markdown() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let output = diff_fixtures(temp_dir.path(), &["--format", "markdown"]);

    let text = stdout(&output);
    assert!(text.starts_with("# API Changes Report\n"));
    assert!(text.contains("| Breaking changes | 3 |"));
    assert!(text.contains("### `./store`"));
    assert!(text.contains("- Item: field Location added\n"));
}

#[test]
fn test_diff_identical_directories_exits_zero() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let new = fixture_arg("new");
    let output = run_apidiff(temp_dir.path(), &["diff", &new, &new]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("No API changes detected."));
}

#[test]
fn test_interface_additions_flag() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let output = diff_fixtures(
        temp_dir.path(),
        &["--interface-additions", "implemented", "--format", "json"],
    );

    let json = parse_json(&output);
    assert_eq!(json["breaking_count"], 4);
    assert_eq!(json["compatible_count"], 4);
}

#[test]
fn test_platform_variants_are_compared_not_failed() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let (old, new) = (platform_arg("old"), platform_arg("new"));
    let output = run_apidiff(temp_dir.path(), &["diff", &old, &new, "--format", "json"]);

    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));
    let json = parse_json(&output);
    assert_eq!(json["failures"].as_array().unwrap().len(), 0);
    assert_eq!(json["compatible_count"], 1);
    assert_eq!(json["packages"][0]["changes"][0]["symbol"], "(*File).Close");
}

#[test]
fn test_goos_flag_selects_platform_files() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let (old, new) = (platform_arg("old"), platform_arg("new"));
    let output = run_apidiff(temp_dir.path(), &["diff", &old, &new, "--goos", "windows"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("Lock: changed from func(*File) error to func(*File, bool) error"));
}

#[test]
fn test_include_internal_flag() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    let output = diff_fixtures(temp_dir.path(), &[]);
    assert!(!stdout(&output).contains("./internal/cache"));

    let output = diff_fixtures(temp_dir.path(), &["--include-internal"]);
    let text = stdout(&output);
    assert!(text.contains("Package: ./internal/cache"));
    assert!(text.contains("  ✗ Warm: changed from func() to func([]string)\n"));
}

#[test]
fn test_thread_count_does_not_change_output() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let single = diff_fixtures(temp_dir.path(), &["--threads", "1", "--format", "json"]);
    let many = diff_fixtures(temp_dir.path(), &["--threads", "8", "--format", "json"]);
    assert_eq!(stdout(&single), stdout(&many));
}

// ============================================================================
// Configuration Tests
// ============================================================================

#[test]
fn test_config_file_sets_policy_and_format() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    fs::write(
        temp_dir.path().join(".apidiff.toml"),
        r#"
[policy]
interface_additions = "implemented"

[output]
format = "json"
"#,
    )
    .unwrap();

    let output = diff_fixtures(temp_dir.path(), &[]);
    let json = parse_json(&output);
    assert_eq!(json["breaking_count"], 4);
}

#[test]
fn test_cli_flags_override_config_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    fs::write(
        temp_dir.path().join(".apidiff.toml"),
        "[policy]\ninterface_additions = \"implemented\"\n\n[output]\nformat = \"json\"\n",
    )
    .unwrap();

    let output = diff_fixtures(
        temp_dir.path(),
        &["--interface-additions", "consumed", "--format", "markdown"],
    );
    let text = stdout(&output);
    assert!(text.starts_with("# API Changes Report"));
    assert!(text.contains("| Breaking changes | 3 |"));
}

#[test]
fn test_invalid_config_file_falls_back_to_defaults() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    fs::write(temp_dir.path().join(".apidiff.toml"), "[policy\nbroken").unwrap();

    let output = diff_fixtures(temp_dir.path(), &["--format", "json"]);
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(parse_json(&output)["breaking_count"], 3);
    assert!(stderr(&output).contains("Failed to parse .apidiff.toml"));
}

// ============================================================================
// Argument Error Tests
// ============================================================================

#[test]
fn test_mixing_directory_and_revision_fails() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let old = fixture_arg("old");
    let output = run_apidiff(temp_dir.path(), &["diff", &old, "HEAD"]);

    assert!(!output.status.success());
    assert!(
        stderr(&output).contains("must both be directories or both be git revisions"),
        "stderr: {}",
        stderr(&output)
    );
}

#[test]
fn test_revisions_outside_repository_fail() {
    if !git_available() {
        return;
    }
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let output = run_apidiff(temp_dir.path(), &["diff", "v1", "v2"]);

    assert!(!output.status.success());
    assert!(stderr(&output).contains("not inside a git repository"));
}

// ============================================================================
// Git Mode Tests
// ============================================================================

#[test]
fn test_diff_git_revisions() {
    if !git_available() {
        return;
    }
    let repo = fixture_repository();
    let output = run_apidiff(repo.path(), &["diff", "v1", "v2", "--format", "json"]);

    assert_eq!(output.status.code(), Some(1), "stderr: {}", stderr(&output));
    let json = parse_json(&output);
    assert_eq!(json["old_ref"], "v1");
    assert_eq!(json["new_ref"], "v2");
    assert_eq!(json["breaking_count"], 3);
    assert_eq!(json["compatible_count"], 5);
    assert_eq!(json["packages"][0]["package"], "./audit");
}

#[test]
fn test_diff_git_revisions_with_repo_flag() {
    if !git_available() {
        return;
    }
    let repo = fixture_repository();
    let elsewhere = TempDir::new().expect("Failed to create temp dir");
    let repo_arg = repo.path().to_string_lossy().to_string();
    let output = run_apidiff(
        elsewhere.path(),
        &["diff", "v2", "v2", "--repo", &repo_arg],
    );

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("No API changes detected."));
}

#[test]
fn test_unknown_revision_fails() {
    if !git_available() {
        return;
    }
    let repo = fixture_repository();
    let output = run_apidiff(repo.path(), &["diff", "v1", "no-such-tag"]);

    assert!(!output.status.success());
    assert!(stderr(&output).contains("no-such-tag"));
}

// ============================================================================
// Other Commands
// ============================================================================

#[test]
fn test_symbols_command() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let new = fixture_arg("new");
    let output = run_apidiff(
        temp_dir.path(),
        &["symbols", &new, "--package", "./store", "--format", "json"],
    );

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let json = parse_json(&output);
    let names: Vec<&str> = json["packages"][0]["symbols"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"Option"));
    assert!(names.contains(&"(*Memory).Delete"));
    assert!(!names.iter().any(|n| n.starts_with("items")));
}

#[test]
fn test_completions_bash() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let output = run_apidiff(temp_dir.path(), &["completions", "bash"]);

    assert!(output.status.success());
    assert!(stdout(&output).contains("apidiff"));
}

// ============================================================================
// CLI Flag Tests
// ============================================================================

#[test]
fn test_help_flag() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let output = run_apidiff(temp_dir.path(), &["--help"]);

    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("diff"));
    assert!(text.contains("symbols"));
    assert!(text.contains("Exit codes"));
}

#[test]
fn test_version_flag() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let output = run_apidiff(temp_dir.path(), &["--version"]);

    assert!(output.status.success());
    assert!(stdout(&output).contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_invalid_format_rejected() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let output = diff_fixtures(temp_dir.path(), &["--format", "yaml"]);
    assert!(!output.status.success());
}
