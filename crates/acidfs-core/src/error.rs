//! Errors surfaced by the overlay, session, and merge layers.

use thiserror::Error;

use acidfs_git::StoreError;

/// Errors from `acidfs-core`.
///
/// This enum deliberately does not distinguish *why* a merge failed — per
/// spec, every merge-side failure collapses to [`CoreError::Conflict`]; the
/// engine is conservative by design and a caller only needs to know "retry or
/// give up", not the precise textual reason.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A path component that should resolve to a tree was missing.
    #[error("no such entry: {0}")]
    PathNotFound(String),

    /// A blob operation addressed a tree.
    #[error("is a directory: {0}")]
    IsADirectory(String),

    /// A tree operation addressed a blob, or a path component was a blob.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// `tpc_vote` was reached with a `NewBlob` still open.
    #[error("file left open across commit: {0}")]
    OpenFileAtCommit(String),

    /// `set_base` was called with pending (dirty) changes.
    #[error("cannot rebase session with uncommitted changes")]
    DirtyRebase,

    /// The requested branch has no ref file and other heads already exist
    /// (almost certainly a typo, not a fresh repository).
    #[error("no such head: {0}")]
    NoSuchHead(String),

    /// `HEAD` does not point at a branch (detached-HEAD state), which this
    /// system does not support.
    #[error("cannot use detached HEAD state")]
    DetachedHead,

    /// Any merge-side failure: initial-commit race, unmergeable change,
    /// unsupported tree-entry mode inside a merge record, conflict markers
    /// surviving a `patch` pass, or a concurrent writer beating us to the ref.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A plumbing subprocess failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// An I/O error unrelated to a specific plumbing command (lock file,
    /// temp file for patch, etc).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// True for the umbrella merge-side failure kind, matching spec's single
    /// `Conflict` taxonomy entry.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}
