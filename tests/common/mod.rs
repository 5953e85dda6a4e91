//! Shared fixture harness for integration tests: spawn real `git`, not mocks.

use std::path::Path;
use std::process::Command;

use acidfs::{AcidFs, AcidFsConfig};
use tempfile::TempDir;

/// A fresh, empty, non-bare repository with no commits yet.
pub fn fresh_repo() -> (TempDir, AcidFs) {
    let dir = TempDir::new().unwrap();
    let config = AcidFsConfig::new(dir.path())
        .user_name("Test")
        .user_email("test@test.com");
    let fs = AcidFs::open_repo(config).unwrap();
    (dir, fs)
}

/// Open a second handle onto the same repository, for concurrent-session
/// scenarios.
pub fn reopen(dir: &TempDir) -> AcidFs {
    let config = AcidFsConfig::new(dir.path()).create(false);
    AcidFs::open_repo(config).unwrap()
}

pub fn run_git(root: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(root)
        .output()
        .expect("spawn git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_owned()
}

pub fn git_oid(root: &Path, rev: &str) -> String {
    run_git(root, &["rev-parse", rev])
}

pub fn git_file_content(root: &Path, commit: &str, path: &str) -> String {
    run_git(root, &["show", &format!("{commit}:{path}")])
}

pub fn git_parents(root: &Path, commit: &str) -> Vec<String> {
    let out = run_git(root, &["rev-list", "--parents", "--max-count=1", commit]);
    out.split_whitespace().skip(1).map(str::to_owned).collect()
}
