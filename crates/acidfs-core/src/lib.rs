//! Transaction session, overlay tree, and merge engine for acidfs.
//!
//! # Crate layout
//!
//! - [`overlay`] — the copy-on-write tree overlay, arena-addressed (C3).
//! - [`session`] — [`Session`], the two-phase-commit transaction state (C4).
//! - [`merge`] — the three-way merge engine (C5).
//! - [`error`] — [`CoreError`], returned by everything above.

pub mod error;
pub mod merge;
pub mod overlay;
pub mod session;

pub use error::CoreError;
pub use overlay::{Entry, NodeId, Overlay, Resident, ROOT};
pub use session::{DataManager, Session, TxInfo};
