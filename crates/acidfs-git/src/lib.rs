//! Git object-store adapter for acidfs.
//!
//! This crate is the single place that spawns `git` subprocesses. Everything
//! above it programs against the [`ObjectStore`] trait and the plain value
//! types in [`types`]; no other acidfs crate shells out to git directly.
//!
//! # Crate layout
//!
//! - [`store`] — the [`ObjectStore`] trait definition (C1).
//! - [`cli_store`] — [`CliObjectStore`], the subprocess-spawning implementation.
//! - [`blob`] — [`BlobReader`]/[`BlobWriter`], non-seekable streams over
//!   plumbing pipes (C2).
//! - [`types`] — value types used in trait signatures ([`Oid`], [`TreeRow`],
//!   [`AuthorEnv`]).
//! - [`error`] — the [`StoreError`] enum returned by all trait methods.
//! - [`proc`] — private subprocess-spawning helpers shared by `cli_store`.

pub mod blob;
pub mod cli_store;
pub mod error;
pub(crate) mod proc;
pub mod store;
pub mod types;

pub use blob::{BlobReader, BlobWriter};
pub use cli_store::CliObjectStore;
pub use error::StoreError;
pub use store::ObjectStore;
pub use types::{AuthorEnv, ObjectKind, Oid, OidParseError, TreeRow};
