//! Value types parsed out of `merge-tree`'s plumbing output.

use acidfs_git::Oid;

/// Which side of the three-way merge a tree line describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Base,
    Our,
    Their,
}

/// One `"<whose> <mode> <oid>\t<path>"` line within a record.
#[derive(Debug, Clone)]
pub struct TreeLine {
    pub whose: Side,
    pub oid: Oid,
    pub path: Vec<u8>,
}

/// The kind of change a record describes, from its header line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// `added in local` / `removed in local` / `removed in both` — local
    /// already reflects these, nothing to apply.
    Ignored,
    AddedInRemote,
    RemovedInRemote,
    ChangedInBoth,
    AddedInBoth,
}

/// One change record: a header, its tree lines, and (for `changed in both`)
/// the raw unified-diff bytes that follow.
#[derive(Debug, Clone)]
pub struct Record {
    pub kind: RecordKind,
    pub lines: Vec<TreeLine>,
    pub diff: Vec<u8>,
}

/// Split a `/`-separated path into (parent components, final name).
pub fn split_path(path: &[u8]) -> (Vec<Vec<u8>>, Vec<u8>) {
    let mut components: Vec<Vec<u8>> = path.split(|&b| b == b'/').map(<[u8]>::to_vec).collect();
    let name = components.pop().unwrap_or_default();
    (components, name)
}
