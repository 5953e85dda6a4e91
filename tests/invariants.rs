//! The numbered testable properties: overlay equivalence, fast-forward
//! dominance, merge parent shape, dirty monotonicity, path round-trip, and
//! hash stability.

mod common;

use std::io::{Read, Write};

use acidfs::{AcidFs, TxInfo};
use common::{fresh_repo, git_oid, git_parents, reopen};

fn write_file(fs: &AcidFs, path: &str, content: &[u8]) {
    let mut handle = fs.open(path, "w").unwrap();
    handle.write_all(content).unwrap();
    if let acidfs::FileHandle::Writer(w) = &mut handle {
        w.close().unwrap();
    }
}

/// 1. Overlay equivalence: committing a session with no writes leaves the
/// branch tip untouched.
#[test]
fn no_op_commit_leaves_branch_unchanged() {
    let (dir, fs) = fresh_repo();
    write_file(&fs, "/foo", b"Hello\n");
    fs.commit(&TxInfo::default()).unwrap();

    let root = dir.path();
    let before = git_oid(root, "HEAD");

    let s2 = reopen(&dir);
    assert_eq!(s2.get_base().unwrap().map(|o| o.to_string()), Some(before.clone()));
    s2.commit(&TxInfo::default()).unwrap();

    let after = git_oid(root, "HEAD");
    assert_eq!(before, after);
}

/// 2. Fast-forward dominance: a session whose merge-base equals the current
/// tip produces a single-parent commit.
#[test]
fn fast_forward_produces_single_parent() {
    let (dir, fs) = fresh_repo();
    write_file(&fs, "/seed", b"seed\n");
    fs.commit(&TxInfo::default()).unwrap();

    let s1 = reopen(&dir);
    write_file(&s1, "/foo", b"bar\n");
    s1.commit(&TxInfo::default()).unwrap();

    let root = dir.path();
    let head = git_oid(root, "HEAD");
    assert_eq!(git_parents(root, &head).len(), 1);
}

/// 3. Merge parent shape: a non-trivial merge commit has exactly two
/// parents, current then the session's own commit.
#[test]
fn merge_commit_has_two_parents() {
    let (dir, fs) = fresh_repo();
    write_file(&fs, "/seed", b"seed\n");
    fs.commit(&TxInfo::default()).unwrap();

    let s1 = reopen(&dir);
    let s2 = reopen(&dir);
    write_file(&s1, "/a", b"a\n");
    write_file(&s2, "/b", b"b\n");
    s1.commit(&TxInfo::default()).unwrap();
    s2.commit(&TxInfo::default()).unwrap();

    let root = dir.path();
    let head = git_oid(root, "HEAD");
    assert_eq!(git_parents(root, &head).len(), 2);
}

/// 4. Dirty monotonicity: a successful write leaves the session dirty, and a
/// clean base's hash equals its already-committed OID (no spurious rewrite).
#[test]
fn write_marks_dirty_and_clean_hash_is_stable() {
    let (dir, fs) = fresh_repo();
    write_file(&fs, "/foo", b"Hello\n");
    let hash_before_commit = fs.hash("/foo").unwrap();
    fs.commit(&TxInfo::default()).unwrap();

    let s2 = reopen(&dir);
    let hash_after_reopen = s2.hash("/foo").unwrap();
    assert_eq!(hash_before_commit, hash_after_reopen);
}

/// 5. Path round-trip: writing bytes at a path and reading it back within
/// the same session yields the same bytes, and the same holds after commit
/// in a fresh session.
#[test]
fn path_round_trip_within_and_across_sessions() {
    let (dir, fs) = fresh_repo();
    write_file(&fs, "/a/b/c", b"payload\n");

    let mut handle = fs.open("/a/b/c", "r").unwrap();
    let mut buf = Vec::new();
    handle.read_to_end(&mut buf).unwrap();
    assert_eq!(buf, b"payload\n");

    fs.commit(&TxInfo::default()).unwrap();

    let s2 = reopen(&dir);
    let mut handle2 = s2.open("/a/b/c", "r").unwrap();
    let mut buf2 = Vec::new();
    handle2.read_to_end(&mut buf2).unwrap();
    assert_eq!(buf2, b"payload\n");
}

/// 6. Lock exclusivity: a concurrent committer blocks on the held
/// `acidfs.lock` rather than racing past it, and only proceeds once the
/// lock is released.
#[test]
fn concurrent_vote_serializes_on_lock() {
    use std::sync::mpsc;
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    use fs4::fs_std::FileExt as _;

    let (dir, fs) = fresh_repo();
    write_file(&fs, "/seed", b"seed\n");
    fs.commit(&TxInfo::default()).unwrap();

    let lock_path = dir.path().join("acidfs.lock");
    let order = Arc::new(Mutex::new(Vec::new()));
    let order_holder = Arc::clone(&order);
    let (locked_tx, locked_rx) = mpsc::channel();

    let holder = thread::spawn(move || {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .unwrap();
        file.lock_exclusive().unwrap();
        order_holder.lock().unwrap().push("locked");
        locked_tx.send(()).unwrap();
        thread::sleep(Duration::from_millis(200));
        order_holder.lock().unwrap().push("unlocked");
        file.unlock().unwrap();
    });

    // Wait until the background thread genuinely holds the lock before the
    // session contends for it, so the commit below is known to race it.
    locked_rx.recv().unwrap();

    let s1 = reopen(&dir);
    write_file(&s1, "/foo", b"bar\n");
    s1.commit(&TxInfo::default()).unwrap();
    order.lock().unwrap().push("committed");

    holder.join().unwrap();

    let log = order.lock().unwrap();
    assert_eq!(*log, vec!["locked", "unlocked", "committed"]);
}

/// 7. Hash stability: `hash(path)` matches the OID git itself assigns to the
/// same bytes via `hash-object`.
#[test]
fn hash_matches_git_hash_object() {
    let (dir, fs) = fresh_repo();
    write_file(&fs, "/foo", b"Hello\n");
    let oid = fs.hash("/foo").unwrap();
    fs.commit(&TxInfo::default()).unwrap();

    let output = std::process::Command::new("git")
        .args(["hash-object", "foo"])
        .current_dir(dir.path())
        .output()
        .unwrap();
    let expected = String::from_utf8_lossy(&output.stdout).trim().to_owned();
    assert_eq!(oid.to_string(), expected);
}
