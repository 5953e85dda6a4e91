//! Error types for the git object-store adapter.
//!
//! [`StoreError`] is the single error type returned by every
//! [`ObjectStore`](crate::ObjectStore) method. Per spec, the adapter is "a
//! pure byte conduit" — it does not interpret semantics, so this enum stays
//! narrow: subprocess failure, a handful of plumbing-specific outcomes
//! (missing ref, no merge base, unsupported tree-entry mode), and I/O.

use std::fmt;

use thiserror::Error;

/// Errors returned by [`ObjectStore`](crate::ObjectStore) operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A plumbing subprocess exited with a nonzero status.
    #[error("{}", format_store_failed(command, stderr, *exit_code))]
    StoreFailed {
        /// The plumbing command that was run (e.g. `"git ls-tree <oid>"`).
        command: String,
        /// Captured stderr, trimmed.
        stderr: String,
        /// Process exit code, if the process actually exited (vs. being killed).
        exit_code: Option<i32>,
    },

    /// `rev_list_one` was asked to resolve a ref that does not exist.
    #[error("ref does not exist: {ref_name}")]
    RefMissing {
        /// The ref name that failed to resolve.
        ref_name: String,
    },

    /// `merge_base` found no common ancestor between the two commits.
    #[error("no merge base between {a} and {b}")]
    NoMergeBase {
        /// First commit OID (as hex).
        a: String,
        /// Second commit OID (as hex).
        b: String,
    },

    /// A tree entry carried a mode other than `100644` or `040000`.
    #[error("unsupported tree entry mode `{mode}` for `{name}`")]
    UnsupportedMode {
        /// The raw mode string from `ls-tree`/`merge-tree`.
        mode: String,
        /// The entry name the mode was attached to.
        name: String,
    },

    /// A string that was expected to be a 40-hex OID was not.
    #[error("invalid OID: {0}")]
    InvalidOid(#[from] crate::types::OidParseError),

    /// An I/O error spawning or communicating with a subprocess.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn format_store_failed(command: &str, stderr: &str, exit_code: Option<i32>) -> String {
    use fmt::Write as _;
    let mut msg = format!("`{command}` failed");
    if let Some(code) = exit_code {
        let _ = write!(msg, " (exit {code})");
    }
    if !stderr.is_empty() {
        let _ = write!(msg, ": {stderr}");
    }
    msg
}
