//! End-to-end scenarios E1-E6 from the filesystem façade's design notes.

mod common;

use std::io::{Read, Write};

use acidfs::{AcidFs, AcidFsConfig, TxInfo};
use common::{fresh_repo, git_file_content, git_oid, git_parents, reopen, run_git};

fn write_file(fs: &AcidFs, path: &str, content: &[u8]) {
    let mut handle = fs.open(path, "w").unwrap();
    handle.write_all(content).unwrap();
    if let acidfs::FileHandle::Writer(w) = &mut handle {
        w.close().unwrap();
    }
}

fn read_file(fs: &AcidFs, path: &str) -> Vec<u8> {
    let mut handle = fs.open(path, "r").unwrap();
    let mut buf = Vec::new();
    handle.read_to_end(&mut buf).unwrap();
    buf
}

#[test]
fn e1_write_and_commit_creates_branch_tip() {
    let (dir, fs) = fresh_repo();
    write_file(&fs, "/foo", b"Hello\n");
    fs.commit(&TxInfo::default()).unwrap();

    let root = dir.path();
    let head = git_oid(root, "HEAD");
    let content = git_file_content(root, &head, "foo");
    assert_eq!(content, "Hello");
    assert!(root.join("foo").exists());
    assert_eq!(std::fs::read_to_string(root.join("foo")).unwrap(), "Hello\n");
}

#[test]
fn e2_append_preserves_prior_bytes() {
    let (dir, fs) = fresh_repo();
    write_file(&fs, "/foo", b"Hello\n");
    fs.commit(&TxInfo::default()).unwrap();

    let mut handle = fs.open("/foo", "a").unwrap();
    handle.write_all(b"Daddy!\n").unwrap();
    if let acidfs::FileHandle::Writer(w) = &mut handle {
        w.close().unwrap();
    }
    fs.commit(&TxInfo::default()).unwrap();

    let fs2 = reopen(&dir);
    assert_eq!(read_file(&fs2, "/foo"), b"Hello\nDaddy!\n");
}

#[test]
fn e3_non_overlapping_adds_merge_cleanly() {
    let (dir, fs) = fresh_repo();
    write_file(&fs, "/seed", b"seed\n");
    fs.commit(&TxInfo::default()).unwrap();

    let s1 = reopen(&dir);
    let s2 = reopen(&dir);
    write_file(&s1, "/bar", b"bar\n");
    write_file(&s2, "/baz", b"baz\n");

    s1.commit(&TxInfo::default()).unwrap();
    s2.commit(&TxInfo::default()).unwrap();

    let root = dir.path();
    let head = git_oid(root, "HEAD");
    assert_eq!(git_parents(root, &head).len(), 2);

    let fs3 = reopen(&dir);
    assert!(fs3.exists("/bar").unwrap());
    assert!(fs3.exists("/baz").unwrap());
}

#[test]
fn e4_conflicting_writes_report_conflict() {
    let (dir, fs) = fresh_repo();
    write_file(&fs, "/foo", b"Original\n");
    fs.commit(&TxInfo::default()).unwrap();

    let s1 = reopen(&dir);
    write_file(&s1, "/foo", b"Party!\n");

    // An external agent commits a conflicting change to the same line first.
    let root = dir.path();
    std::fs::write(root.join("foo"), b"Howdy!\n").unwrap();
    run_git(root, &["add", "foo"]);
    run_git(root, &["commit", "-m", "external change"]);

    let result = s1.commit(&TxInfo::default());
    assert!(matches!(result, Err(acidfs::AcidFsError::Conflict(_))));

    // S1 did not advance the branch.
    let head = git_oid(root, "HEAD");
    let content = git_file_content(root, &head, "foo");
    assert_eq!(content, "Howdy!");
}

#[test]
fn e5_non_conflicting_line_edits_merge_via_patch() {
    let (dir, fs) = fresh_repo();
    write_file(&fs, "/foo", b"A\nB\nC\nD\nE\n");
    fs.commit(&TxInfo::default()).unwrap();

    let s1 = reopen(&dir);
    let s2 = reopen(&dir);

    // S1 appends a line, unrelated to S2's edit.
    write_file(&s1, "/foo", b"A\nB\nC\nD\nE\nF\n");
    s1.commit(&TxInfo::default()).unwrap();

    // S2, still based on the original commit, edits only line 2.
    write_file(&s2, "/foo", b"A\nZ\nC\nD\nE\n");
    s2.commit(&TxInfo::default()).unwrap();

    let fs3 = reopen(&dir);
    assert_eq!(read_file(&fs3, "/foo"), b"A\nZ\nC\nD\nE\nF\n");
}

#[test]
fn e6_open_file_left_unclosed_fails_commit_and_releases_lock() {
    let config = AcidFsConfig::new(tempfile::tempdir().unwrap().keep());
    let fs = AcidFs::open_repo(config).unwrap();
    let mut handle = fs.open("/foo", "w").unwrap();
    handle.write_all(b"never closed").unwrap();

    let result = fs.commit(&TxInfo::default());
    assert!(matches!(result, Err(acidfs::AcidFsError::OpenFileAtCommit(_))));

    // The session is usable again; a clean commit succeeds, proving the lock
    // was released rather than left held by the failed vote.
    fs.abort();
    assert!(fs.commit(&TxInfo::default()).is_ok());
}
