//! The [`ObjectStore`] trait — the single abstraction boundary between
//! acidfs and the git plumbing commands it shells out to (C1).
//!
//! No crate above `acidfs-git` spawns a subprocess itself; everything goes
//! through this trait, implemented by [`crate::CliObjectStore`]. The trait is
//! object-safe so callers can use `&dyn ObjectStore` / `Box<dyn ObjectStore>`.

use std::path::Path;

use crate::blob::{BlobReader, BlobWriter};
use crate::error::StoreError;
use crate::types::{AuthorEnv, Oid, TreeRow};

/// A byte conduit to the underlying git object database, spawning one
/// subprocess per operation. Implementations do not interpret semantics —
/// that is the job of `acidfs-core`.
pub trait ObjectStore {
    /// Initialize an empty repository at `path` (`git init [--bare]`).
    fn init(&self, path: &Path, bare: bool) -> Result<(), StoreError>;

    /// Resolve `reference` to the commit OID it names.
    ///
    /// Replaces: `git rev-list --max-count=1 <ref>`.
    fn rev_list_one(&self, reference: &str) -> Result<Oid, StoreError>;

    /// Resolve `commit`'s tree OID.
    ///
    /// Replaces: `git rev-parse <commit>^{tree}`.
    fn rev_parse_tree(&self, commit: Oid) -> Result<Oid, StoreError>;

    /// List the one-level-deep entries of a tree object.
    ///
    /// Replaces: `git ls-tree <oid>`. Rows with a mode other than `100644`/
    /// `040000` surface as `StoreError::UnsupportedMode`.
    fn ls_tree(&self, tree: Oid) -> Result<Vec<TreeRow>, StoreError>;

    /// Build a tree object from a flat list of entries.
    ///
    /// Replaces: `git mktree` (entries fed on stdin as
    /// `"<mode> <kind> <oid>\t<name>\n"`).
    fn mktree(&self, entries: &[TreeRow]) -> Result<Oid, StoreError>;

    /// Open a read stream over a blob's content.
    ///
    /// Replaces: `git cat-file blob <oid>`.
    fn cat_file_blob(&self, oid: Oid) -> Result<BlobReader, StoreError>;

    /// Open a write stream; closing it returns the OID of what was written.
    ///
    /// Replaces: `git hash-object -w --stdin`.
    fn hash_object_stdin(&self) -> Result<BlobWriter, StoreError>;

    /// Create a commit object.
    ///
    /// Replaces: `git commit-tree <tree> -m <message> [-p <parent>]*`, with
    /// `author_env` applied as environment variable overrides.
    fn commit_tree(
        &self,
        tree: Oid,
        parents: &[Oid],
        message: &str,
        author_env: &AuthorEnv,
    ) -> Result<Oid, StoreError>;

    /// Find the merge base of two commits, or `NoMergeBase` if they share no
    /// ancestor.
    ///
    /// Replaces: `git merge-base <a> <b>`.
    fn merge_base(&self, a: Oid, b: Oid) -> Result<Oid, StoreError>;

    /// Compute the textual three-way merge of `ours`/`theirs` against `base`
    /// and return the raw plumbing byte stream (parsed by `acidfs-core`'s
    /// merge engine).
    ///
    /// Replaces: `git merge-tree <base> <ours> <theirs>`.
    fn merge_tree(&self, base: Oid, ours: Oid, theirs: Oid) -> Result<Vec<u8>, StoreError>;

    /// Point `ref_path` (e.g. `"refs/heads/main"`) at `commit`.
    ///
    /// Replaces: `git update-ref <ref_path> <commit>`.
    fn update_ref(&self, ref_path: &str, commit: Oid) -> Result<(), StoreError>;

    /// Hard-reset the working tree and index to `commit`.
    ///
    /// Replaces: `git reset --hard <commit>`.
    fn reset_hard(&self, commit: Oid) -> Result<(), StoreError>;

    /// Soft-reset only the branch ref to `commit` (no working tree/index).
    ///
    /// Replaces: `git reset --soft <commit>`.
    fn reset_soft(&self, commit: Oid) -> Result<(), StoreError>;

    /// Set a repository-level git config value (`git config <key> <value>`).
    fn config_set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}
