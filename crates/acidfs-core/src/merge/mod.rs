//! The three-way merge engine (C5): parses `merge-tree` output and applies
//! remote-side deltas into the overlay.

mod apply;
mod parser;
mod types;

use acidfs_git::{ObjectStore, Oid};

use crate::error::CoreError;
use crate::overlay::Overlay;

/// Merge the session's just-built local commit (`ours`) against the
/// branch's new tip (`theirs`), given their common ancestor (`base`). Local
/// changes are already present in `overlay`; only remote-side deltas are
/// applied. On success, saves the overlay and returns the merged tree OID.
pub fn run(store: &dyn ObjectStore, overlay: &mut Overlay, base: Oid, theirs: Oid, ours: Oid) -> Result<Oid, CoreError> {
    let root = crate::overlay::ROOT;
    let stream = store.merge_tree(base, ours, theirs)?;
    let records = parser::parse(&stream)?;
    for record in &records {
        apply::apply(store, overlay, root, record)?;
    }
    overlay.save(store, root)
}
