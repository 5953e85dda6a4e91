//! The transaction session (C4): two-phase-commit protocol, fast-forward
//! detection, and exclusive locking around the overlay tree.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs4::fs_std::FileExt as _;
use acidfs_git::{AuthorEnv, ObjectStore, Oid};

use crate::error::CoreError;
use crate::merge;
use crate::overlay::{NodeId, Overlay, ROOT};

/// Metadata the external transaction coordinator supplies at vote time.
///
/// Mirrors `tx.description`, `tx.user`, `tx._extension` from the Python
/// `gitfs`/`acidfs` originals this crate's protocol is modeled on.
#[derive(Debug, Clone, Default)]
pub struct TxInfo {
    pub description: Option<String>,
    pub user: Option<String>,
    pub extension: BTreeMap<String, String>,
}

/// The two-phase-commit callback vocabulary a [`Session`] implements.
///
/// A caller wiring this into a real coordinator (a Zope-style `transaction`
/// manager, a saga, an outbox) adapts that coordinator's own callbacks onto
/// this trait; this crate does not provide the coordinator itself.
pub trait DataManager {
    fn abort(&mut self);
    fn tpc_begin(&mut self);
    fn commit(&mut self);
    fn tpc_vote(&mut self, tx: &TxInfo) -> Result<(), CoreError>;
    fn tpc_finish(&mut self) -> Result<(), CoreError>;
    fn tpc_abort(&mut self);
    fn sort_key(&self) -> &str;
}

/// A transaction over one branch of one object store.
pub struct Session {
    store: Arc<dyn ObjectStore>,
    db_root: PathBuf,
    working_root: Option<PathBuf>,
    bare: bool,
    branch: String,
    head_alias: bool,
    ref_path: PathBuf,
    lock_path: PathBuf,
    prev_commit: Option<Oid>,
    next_commit: Option<Oid>,
    lock_file: Option<File>,
    overlay: Overlay,
    closed: bool,
    sort_key: String,
}

impl Session {
    /// Open a session against `requested_branch` (`"HEAD"` by default).
    ///
    /// `working_root` is `Some(repo_root)` for a working (non-bare)
    /// repository, `None` in bare mode.
    pub fn open(
        store: Arc<dyn ObjectStore>,
        db_root: PathBuf,
        working_root: Option<PathBuf>,
        requested_branch: &str,
        sort_key: String,
    ) -> Result<Self, CoreError> {
        let bare = working_root.is_none();
        let (branch, head_alias) = resolve_branch(&db_root, requested_branch)?;
        let ref_path = db_root.join("refs").join("heads").join(&branch);
        let lock_path = db_root.join("acidfs.lock");

        let (prev_commit, overlay) = if ref_path.exists() {
            let commit_str = fs::read_to_string(&ref_path)?;
            let commit: Oid = commit_str
                .trim()
                .parse()
                .map_err(acidfs_git::StoreError::from)?;
            let tree_oid = store.rev_parse_tree(commit)?;
            (Some(commit), Overlay::read(store.as_ref(), tree_oid)?)
        } else {
            let heads_dir = db_root.join("refs").join("heads");
            let has_other_heads = fs::read_dir(&heads_dir)
                .map(|mut entries| entries.next().is_some())
                .unwrap_or(false);
            if has_other_heads {
                return Err(CoreError::NoSuchHead(branch));
            }
            tracing::info!(%branch, "new repository with no previous commits");
            (None, Overlay::empty())
        };

        Ok(Self {
            store,
            db_root,
            working_root,
            bare,
            branch,
            head_alias,
            ref_path,
            lock_path,
            prev_commit,
            next_commit: None,
            lock_file: None,
            overlay,
            closed: false,
            sort_key,
        })
    }

    #[must_use]
    pub fn store(&self) -> &dyn ObjectStore {
        self.store.as_ref()
    }

    #[must_use]
    pub fn overlay(&self) -> &Overlay {
        &self.overlay
    }

    pub fn overlay_mut(&mut self) -> &mut Overlay {
        &mut self.overlay
    }

    #[must_use]
    pub const fn root(&self) -> NodeId {
        ROOT
    }

    #[must_use]
    pub const fn prev_commit(&self) -> Option<Oid> {
        self.prev_commit
    }

    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.overlay.is_dirty(ROOT)
    }

    /// Rebase this session onto a different ref. Fails with `DirtyRebase` if
    /// any change is pending in the current transaction.
    pub fn set_base(&mut self, reference: &str) -> Result<(), CoreError> {
        if self.overlay.is_dirty(ROOT) {
            return Err(CoreError::DirtyRebase);
        }
        let commit = self.store.rev_list_one(reference)?;
        let tree_oid = self.store.rev_parse_tree(commit)?;
        self.overlay = Overlay::read(self.store.as_ref(), tree_oid)?;
        self.prev_commit = Some(commit);
        Ok(())
    }

    fn current_ref_expr(&self) -> String {
        if self.head_alias {
            "HEAD".to_owned()
        } else {
            format!("refs/heads/{}", self.branch)
        }
    }

    fn is_current_head(&self) -> Result<bool, CoreError> {
        let head = fs::read_to_string(self.db_root.join("HEAD"))?;
        Ok(head.trim().strip_prefix("ref: refs/heads/") == Some(self.branch.as_str()))
    }

    fn acquire_lock(&mut self) -> Result<(), CoreError> {
        if self.lock_file.is_some() {
            return Ok(());
        }
        tracing::debug!(lock_path = %self.lock_path.display(), "acquiring acidfs commit lock");
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&self.lock_path)?;
        file.lock_exclusive()?;
        self.lock_file = Some(file);
        Ok(())
    }

    fn release_lock(&mut self) -> Result<(), CoreError> {
        if let Some(file) = self.lock_file.take() {
            file.unlock()?;
        }
        Ok(())
    }
}

/// Resolve `requested` (typically `"HEAD"`) to a concrete branch name and
/// whether it aliases the repository's current symbolic `HEAD`.
fn resolve_branch(db_root: &Path, requested: &str) -> Result<(String, bool), CoreError> {
    let head_content = fs::read_to_string(db_root.join("HEAD"))?;
    let head_content = head_content.trim();
    let head_branch = head_content.strip_prefix("ref: refs/heads/");

    if requested == "HEAD" {
        let name = head_branch.ok_or(CoreError::DetachedHead)?;
        Ok((name.to_owned(), true))
    } else {
        Ok((requested.to_owned(), head_branch == Some(requested)))
    }
}

fn resolve_author(tx: &TxInfo) -> AuthorEnv {
    let name = tx
        .extension
        .get("acidfs_user")
        .or_else(|| tx.extension.get("user"))
        .cloned()
        .or_else(|| tx.user.as_deref().map(extract_user));
    let email = tx
        .extension
        .get("acidfs_email")
        .or_else(|| tx.extension.get("email"))
        .cloned();
    AuthorEnv { name, email }
}

/// Extract a bare user id from a transaction's raw `user` field.
///
/// Heuristic (see `DESIGN.md` for the open-question resolution): a leading
/// space strips to the remainder; otherwise split on the first run of
/// whitespace and take the tail, or the whole string if there is none. This
/// mirrors platform conventions that prefix a path-like realm to the user id
/// (e.g. Zope's `"/realm user"`).
fn extract_user(user: &str) -> String {
    if let Some(rest) = user.strip_prefix(' ') {
        return rest.to_owned();
    }
    match user.split_once(char::is_whitespace) {
        Some((_, tail)) if !tail.trim_start().is_empty() => tail.trim_start().to_owned(),
        _ => user.to_owned(),
    }
}

impl DataManager for Session {
    fn abort(&mut self) {
        self.closed = true;
    }

    fn tpc_begin(&mut self) {}

    fn commit(&mut self) {}

    fn tpc_vote(&mut self, tx: &TxInfo) -> Result<(), CoreError> {
        if !self.overlay.is_dirty(ROOT) {
            return Ok(());
        }

        let prev_root_oid = self.overlay.committed_oid(ROOT);
        let tree_oid = self.overlay.save(self.store.as_ref(), ROOT)?;
        if Some(tree_oid) == prev_root_oid {
            return Ok(());
        }

        let message = tx
            .description
            .clone()
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| "AcidFS transaction".to_owned());
        let author_env = resolve_author(tx);
        let parents: Vec<Oid> = self.prev_commit.into_iter().collect();
        let new_commit = self
            .store
            .commit_tree(tree_oid, &parents, &message, &author_env)?;

        self.acquire_lock()?;

        if self.prev_commit.is_none() {
            if self.ref_path.exists() {
                return Err(CoreError::Conflict(
                    "branch was created concurrently before this session's first commit".to_owned(),
                ));
            }
            self.next_commit = Some(new_commit);
            return Ok(());
        }

        let current = self.store.rev_list_one(&self.current_ref_expr())?;
        let base = self.store.merge_base(current, new_commit)?;

        if base == current {
            tracing::debug!(%current, %new_commit, "fast-forwarding");
            self.next_commit = Some(new_commit);
        } else {
            tracing::info!(%base, %current, %new_commit, "branch advanced concurrently, merging");
            let merged_tree = merge::run(self.store.as_ref(), &mut self.overlay, base, current, new_commit)?;
            let merge_commit = self.store.commit_tree(
                merged_tree,
                &[current, new_commit],
                "Merge",
                &AuthorEnv::default(),
            )?;
            self.next_commit = Some(merge_commit);
        }
        Ok(())
    }

    fn tpc_finish(&mut self) -> Result<(), CoreError> {
        let Some(next_commit) = self.next_commit.take() else {
            self.release_lock()?;
            self.closed = true;
            return Ok(());
        };

        if self.is_current_head()? {
            if self.bare {
                self.store.reset_soft(next_commit)?;
            } else {
                self.store.reset_hard(next_commit)?;
            }
        } else {
            fs::write(&self.ref_path, format!("{next_commit}\n"))?;
        }

        self.release_lock()?;
        self.closed = true;
        Ok(())
    }

    fn tpc_abort(&mut self) {
        let _ = self.release_lock();
        self.closed = true;
    }

    fn sort_key(&self) -> &str {
        &self.sort_key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_user_leading_space() {
        assert_eq!(extract_user(" bob"), "bob");
    }

    #[test]
    fn extract_user_splits_on_whitespace() {
        assert_eq!(extract_user("/realm bob"), "bob");
    }

    #[test]
    fn extract_user_whole_string_when_no_whitespace() {
        assert_eq!(extract_user("bob"), "bob");
    }

    #[test]
    fn resolve_author_prefers_acidfs_extension() {
        let mut tx = TxInfo::default();
        tx.user = Some("/realm bob".to_owned());
        tx.extension.insert("user".to_owned(), "carol".to_owned());
        tx.extension.insert("acidfs_user".to_owned(), "dave".to_owned());
        let author = resolve_author(&tx);
        assert_eq!(author.name.as_deref(), Some("dave"));
    }

    #[test]
    fn resolve_author_falls_back_to_tx_user() {
        let mut tx = TxInfo::default();
        tx.user = Some("/realm bob".to_owned());
        let author = resolve_author(&tx);
        assert_eq!(author.name.as_deref(), Some("bob"));
    }
}
