//! The in-memory, copy-on-write tree overlay (C3).
//!
//! Nodes live in a flat arena (`Vec<TreeNode>`) owned by [`crate::Session`]
//! rather than as an `Rc<RefCell<..>>` graph: a child stores no owning
//! pointer to its parent, only a [`NodeId`] index, which sidesteps the
//! ownership cycle a naive tree-with-backpointers would create.

use std::collections::BTreeMap;

use acidfs_git::{ObjectKind, ObjectStore, Oid, TreeRow};

use crate::error::CoreError;

/// Index of a [`TreeNode`] within an [`Overlay`]'s arena.
pub type NodeId = usize;

/// A single named entry within a tree.
#[derive(Debug, Clone)]
pub enum Entry {
    /// A subdirectory. `node` is `None` until the entry has been
    /// materialized by [`Overlay::get`].
    Tree { oid: Option<Oid>, node: Option<NodeId> },
    /// A regular file with known, persisted content.
    Blob { oid: Oid },
    /// A write-in-progress file. The live [`acidfs_git::BlobWriter`] is owned
    /// by the caller's file-handle object, not the arena; this placeholder
    /// exists only so `save()` can detect and reject it. Carries the OID of
    /// the blob this name pointed to before the write started, if any, so a
    /// concurrent reader can fall back to the pre-write content.
    NewBlob(Option<Oid>),
}

/// A resident object returned by [`Overlay::get`]/[`Overlay::find`].
#[derive(Debug, Clone, Copy)]
pub enum Resident {
    Tree(NodeId),
    Blob(Oid),
    NewBlob(Option<Oid>),
}

/// One directory's worth of state: its entries, dirty flag, and the OID it
/// was last read from or saved to.
#[derive(Debug)]
pub struct TreeNode {
    pub parent: Option<NodeId>,
    pub name: Vec<u8>,
    pub dirty: bool,
    pub committed_oid: Option<Oid>,
    pub entries: BTreeMap<Vec<u8>, Entry>,
}

impl TreeNode {
    fn new(parent: Option<NodeId>, name: Vec<u8>, committed_oid: Option<Oid>) -> Self {
        Self {
            parent,
            name,
            dirty: false,
            committed_oid,
            entries: BTreeMap::new(),
        }
    }
}

/// The arena holding every materialized [`TreeNode`], rooted at index 0.
#[derive(Debug)]
pub struct Overlay {
    nodes: Vec<TreeNode>,
}

pub const ROOT: NodeId = 0;

impl Overlay {
    /// A fresh repository: an empty root, no persisted tree yet.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            nodes: vec![TreeNode::new(None, Vec::new(), None)],
        }
    }

    /// Populate the root from an existing tree OID by listing its top level.
    /// Subdirectories are not recursed into until [`Overlay::get`] touches
    /// them (lazy materialization).
    pub fn read(store: &dyn ObjectStore, tree_oid: Oid) -> Result<Self, CoreError> {
        let mut overlay = Self {
            nodes: vec![TreeNode::new(None, Vec::new(), Some(tree_oid))],
        };
        overlay.populate_from_tree(store, ROOT, tree_oid)?;
        Ok(overlay)
    }

    fn populate_from_tree(
        &mut self,
        store: &dyn ObjectStore,
        id: NodeId,
        tree_oid: Oid,
    ) -> Result<(), CoreError> {
        for row in store.ls_tree(tree_oid)? {
            let entry = match row.kind {
                ObjectKind::Blob => Entry::Blob { oid: row.oid },
                ObjectKind::Tree => Entry::Tree {
                    oid: Some(row.oid),
                    node: None,
                },
            };
            self.nodes[id].entries.insert(row.name, entry);
        }
        Ok(())
    }

    fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut TreeNode {
        &mut self.nodes[id]
    }

    /// Look up `name` within `id`, lazily materializing a subtree the first
    /// time it is touched. Returns `None` if absent.
    pub fn get(
        &mut self,
        store: &dyn ObjectStore,
        id: NodeId,
        name: &[u8],
    ) -> Result<Option<Resident>, CoreError> {
        let Some(entry) = self.node(id).entries.get(name).cloned() else {
            return Ok(None);
        };
        match entry {
            Entry::Blob { oid } => Ok(Some(Resident::Blob(oid))),
            Entry::NewBlob(prev) => Ok(Some(Resident::NewBlob(prev))),
            Entry::Tree { oid, node: Some(n) } => {
                let _ = oid;
                Ok(Some(Resident::Tree(n)))
            }
            Entry::Tree { oid: Some(oid), node: None } => {
                let child_id = self.nodes.len();
                self.nodes.push(TreeNode::new(Some(id), name.to_vec(), Some(oid)));
                self.populate_from_tree(store, child_id, oid)?;
                self.node_mut(id)
                    .entries
                    .insert(name.to_vec(), Entry::Tree { oid: Some(oid), node: Some(child_id) });
                Ok(Some(Resident::Tree(child_id)))
            }
            Entry::Tree { oid: None, node: None } => {
                unreachable!("a Tree entry with no oid is always inserted with a node (new_tree)")
            }
        }
    }

    /// Walk `path` component by component from `start`. A missing
    /// intermediate, or a terminal `Blob` with remaining path components,
    /// short-circuits to `None`.
    pub fn find(
        &mut self,
        store: &dyn ObjectStore,
        start: NodeId,
        path: &[Vec<u8>],
    ) -> Result<Option<Resident>, CoreError> {
        let mut current = Resident::Tree(start);
        for (i, component) in path.iter().enumerate() {
            let Resident::Tree(node) = current else {
                return Ok(None);
            };
            match self.get(store, node, component)? {
                Some(next) => current = next,
                None => return Ok(None),
            }
            let _ = i;
        }
        Ok(Some(current))
    }

    /// Insert an empty subtree, marking `id` (and ancestors) dirty.
    pub fn new_tree(&mut self, id: NodeId, name: Vec<u8>) -> NodeId {
        let child_id = self.nodes.len();
        self.nodes.push(TreeNode::new(Some(id), name.clone(), None));
        // A brand-new subtree has no persisted oid yet, so it must save()
        // along with its parent rather than being skipped as clean.
        self.node_mut(child_id).dirty = true;
        self.node_mut(id)
            .entries
            .insert(name, Entry::Tree { oid: None, node: Some(child_id) });
        self.set_dirty(id);
        child_id
    }

    /// Insert a write-in-progress placeholder, marking `id` dirty. `prev` is
    /// the OID `name` pointed to before the write started, if any.
    pub fn new_blob(&mut self, id: NodeId, name: Vec<u8>, prev: Option<Oid>) {
        self.node_mut(id).entries.insert(name, Entry::NewBlob(prev));
        self.set_dirty(id);
    }

    /// Replace a `NewBlob` placeholder with its final persisted OID. Does
    /// not mark dirty again — `new_blob` already did.
    pub fn install_blob(&mut self, id: NodeId, name: &[u8], oid: Oid) {
        self.node_mut(id)
            .entries
            .insert(name.to_vec(), Entry::Blob { oid });
    }

    /// Remove and return the entry at `name`, marking `id` dirty.
    pub fn remove(&mut self, id: NodeId, name: &[u8]) -> Option<Entry> {
        let removed = self.node_mut(id).entries.remove(name);
        if removed.is_some() {
            self.set_dirty(id);
        }
        removed
    }

    /// Install an arbitrary entry at `name` (used by `mv` and the merge
    /// engine), marking `id` dirty.
    pub fn set(&mut self, id: NodeId, name: Vec<u8>, entry: Entry) {
        self.node_mut(id).entries.insert(name, entry);
        self.set_dirty(id);
    }

    /// True iff `id`'s entry mapping is empty.
    #[must_use]
    pub fn empty(&self, id: NodeId) -> bool {
        self.node(id).entries.is_empty()
    }

    /// Iterate the entry names directly under `id`, without materializing
    /// anything.
    pub fn names(&self, id: NodeId) -> impl Iterator<Item = &[u8]> {
        self.node(id).entries.keys().map(Vec::as_slice)
    }

    /// The raw, possibly-unmaterialized entry at `name` under `id`.
    #[must_use]
    pub fn entry(&self, id: NodeId, name: &[u8]) -> Option<&Entry> {
        self.node(id).entries.get(name)
    }

    #[must_use]
    pub fn is_dirty(&self, id: NodeId) -> bool {
        self.node(id).dirty
    }

    #[must_use]
    pub fn committed_oid(&self, id: NodeId) -> Option<Oid> {
        self.node(id).committed_oid
    }

    #[must_use]
    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// Walk `dirty = true` up through ancestors, stopping at the first
    /// already-dirty one.
    pub fn set_dirty(&mut self, id: NodeId) {
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = self.node_mut(node_id);
            if node.dirty {
                break;
            }
            node.dirty = true;
            current = node.parent;
        }
    }

    /// Recursively serialize `id`. Dirty subtrees are saved first and their
    /// entries rewritten with the new OID; an unfinished `NewBlob` anywhere
    /// in the subtree is a hard error. If the recomputed OID equals the
    /// previous `committed_oid`, the node is marked clean without touching
    /// its parent.
    pub fn save(&mut self, store: &dyn ObjectStore, id: NodeId) -> Result<Oid, CoreError> {
        let names: Vec<Vec<u8>> = self.node(id).entries.keys().cloned().collect();
        for name in &names {
            let entry = self.node(id).entries.get(name).cloned().expect("just listed");
            match entry {
                Entry::NewBlob(_) => {
                    return Err(CoreError::OpenFileAtCommit(String::from_utf8_lossy(name).into_owned()));
                }
                Entry::Tree { node: Some(child_id), .. } if self.is_dirty(child_id) => {
                    let new_oid = self.save(store, child_id)?;
                    self.node_mut(id)
                        .entries
                        .insert(name.clone(), Entry::Tree { oid: Some(new_oid), node: Some(child_id) });
                }
                _ => {}
            }
        }

        let mut rows = Vec::with_capacity(self.node(id).entries.len());
        for (name, entry) in &self.node(id).entries {
            match entry {
                Entry::Blob { oid } => rows.push(TreeRow {
                    kind: ObjectKind::Blob,
                    oid: *oid,
                    name: name.clone(),
                }),
                Entry::Tree { oid: Some(oid), .. } => rows.push(TreeRow {
                    kind: ObjectKind::Tree,
                    oid: *oid,
                    name: name.clone(),
                }),
                Entry::Tree { oid: None, .. } => {
                    unreachable!("dirty pass above resolves every tree entry's oid")
                }
                Entry::NewBlob(_) => unreachable!("rejected above"),
            }
        }
        let new_oid = store.mktree(&rows)?;

        if self.node(id).committed_oid == Some(new_oid) {
            self.node_mut(id).dirty = false;
            return Ok(new_oid);
        }
        self.node_mut(id).committed_oid = Some(new_oid);
        self.node_mut(id).dirty = false;
        Ok(new_oid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_overlay_is_empty_and_clean() {
        let overlay = Overlay::empty();
        assert!(overlay.empty(ROOT));
        assert!(!overlay.is_dirty(ROOT));
        assert_eq!(overlay.committed_oid(ROOT), None);
    }

    #[test]
    fn new_blob_marks_root_dirty() {
        let mut overlay = Overlay::empty();
        overlay.new_blob(ROOT, b"foo".to_vec(), None);
        assert!(overlay.is_dirty(ROOT));
    }

    #[test]
    fn new_tree_marks_ancestors_dirty_once() {
        let mut overlay = Overlay::empty();
        let child = overlay.new_tree(ROOT, b"sub".to_vec());
        assert!(overlay.is_dirty(ROOT));
        assert!(!overlay.is_dirty(child));
        overlay.set_dirty(child);
        assert!(overlay.is_dirty(child));
    }

    #[test]
    fn remove_marks_dirty_and_returns_entry() {
        let mut overlay = Overlay::empty();
        overlay.new_blob(ROOT, b"foo".to_vec(), None);
        let removed = overlay.remove(ROOT, b"foo");
        assert!(matches!(removed, Some(Entry::NewBlob(None))));
        assert!(overlay.get_raw(ROOT, b"foo").is_none());
    }

    impl Overlay {
        fn get_raw(&self, id: NodeId, name: &[u8]) -> Option<&Entry> {
            self.node(id).entries.get(name)
        }
    }
}
