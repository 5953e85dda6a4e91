//! An ACID, transactional filesystem-style view over a git-compatible
//! content-addressed object store.
//!
//! # Crate layout
//!
//! - [`config`] — [`AcidFsConfig`], [`PathEncoding`]: constructor options.
//! - [`facade`] — [`AcidFs`], the path-addressed handle applications use.
//! - [`error`] — [`AcidFsError`], the unified error taxonomy.
//! - [`path`] — path-splitting helpers.
//!
//! The object store plumbing (`acidfs-git`) and the transaction/merge engine
//! (`acidfs-core`) are separate crates in this workspace; most applications
//! only need the types re-exported here.

pub mod config;
pub mod error;
pub mod facade;
pub mod path;

pub use acidfs_core::{DataManager, TxInfo};
pub use acidfs_git::Oid;
pub use config::{AcidFsConfig, PathEncoding};
pub use error::AcidFsError;
pub use facade::{AcidFs, FileHandle, FileWriter};
