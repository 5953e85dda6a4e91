//! The unified error taxonomy surfaced by [`crate::AcidFs`].

use thiserror::Error;

use acidfs_core::CoreError;
use acidfs_git::StoreError;

/// Every way an `AcidFs` operation can fail.
#[derive(Debug, Error)]
pub enum AcidFsError {
    /// No entry exists at the given path.
    #[error("no such file or directory: {0}")]
    PathNotFound(String),

    /// A file-only operation (`open` for read/write, `rm`) addressed a
    /// directory.
    #[error("is a directory: {0}")]
    IsADirectory(String),

    /// A directory-only operation addressed a file, or a path component
    /// that should be a directory was a file.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// `open(path, "x")` or `mkdir` found something already there.
    #[error("already exists: {0}")]
    FileExists(String),

    /// `rmdir` on a non-empty directory.
    #[error("directory not empty: {0}")]
    DirectoryNotEmpty(String),

    /// An unrecognized or self-contradictory `open` mode string.
    #[error("bad open mode: {0}")]
    BadMode(String),

    /// A `FileWriter` was left open across a commit.
    #[error("file left open across commit: {0}")]
    OpenFileAtCommit(String),

    /// `set_base` was called with uncommitted changes pending.
    #[error("cannot rebase with uncommitted changes")]
    DirtyRebase,

    /// The three-way merge could not reconcile a concurrent commit, or lost
    /// a race to create the first commit on a branch.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A git plumbing subprocess failed.
    #[error(transparent)]
    StoreFailed(#[from] StoreError),

    /// A caller/configuration problem: missing repository with
    /// `create = false`, an unknown branch, detached HEAD, or a path that
    /// fails the configured [`crate::PathEncoding`].
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// An I/O error unrelated to a specific plumbing command.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<CoreError> for AcidFsError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::PathNotFound(p) => Self::PathNotFound(p),
            CoreError::IsADirectory(p) => Self::IsADirectory(p),
            CoreError::NotADirectory(p) => Self::NotADirectory(p),
            CoreError::OpenFileAtCommit(p) => Self::OpenFileAtCommit(p),
            CoreError::DirtyRebase => Self::DirtyRebase,
            CoreError::NoSuchHead(branch) => {
                Self::ConfigError(format!("no such head: {branch}"))
            }
            CoreError::DetachedHead => {
                Self::ConfigError("cannot use detached HEAD state".to_owned())
            }
            CoreError::Conflict(msg) => Self::Conflict(msg),
            CoreError::Store(err) => Self::StoreFailed(err),
            CoreError::Io(err) => Self::Io(err),
        }
    }
}
