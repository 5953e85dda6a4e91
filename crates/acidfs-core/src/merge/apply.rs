//! Applies parsed merge records into the overlay, invoking external `patch`
//! for textual three-way file merges.

use std::io::{Read as _, Write as _};
use std::process::{Command, Stdio};

use acidfs_git::{ObjectStore, Oid};

use crate::error::CoreError;
use crate::overlay::{Entry, NodeId, Overlay, Resident};

use super::types::{split_path, Record, RecordKind, Side, TreeLine};

pub(super) fn apply(store: &dyn ObjectStore, overlay: &mut Overlay, root: NodeId, record: &Record) -> Result<(), CoreError> {
    match record.kind {
        RecordKind::Ignored => Ok(()),
        RecordKind::AddedInRemote => apply_added_in_remote(store, overlay, root, record),
        RecordKind::RemovedInRemote => apply_removed_in_remote(store, overlay, root, record),
        RecordKind::AddedInBoth => apply_added_in_both(record),
        RecordKind::ChangedInBoth => apply_changed_in_both(store, overlay, root, record),
    }
}

fn resolve_folder(
    store: &dyn ObjectStore,
    overlay: &mut Overlay,
    mut current: NodeId,
    components: &[Vec<u8>],
) -> Result<NodeId, CoreError> {
    for component in components {
        current = match overlay.get(store, current, component)? {
            Some(Resident::Tree(id)) => id,
            Some(Resident::Blob(_) | Resident::NewBlob(_)) => {
                return Err(CoreError::Conflict(format!(
                    "merge wants to traverse `{}` as a directory but it is a file",
                    String::from_utf8_lossy(component)
                )));
            }
            None => overlay.new_tree(current, component.clone()),
        };
    }
    Ok(current)
}

fn same_path(lines: &[TreeLine]) -> bool {
    lines.windows(2).all(|pair| pair[0].path == pair[1].path)
}

fn apply_added_in_remote(store: &dyn ObjectStore, overlay: &mut Overlay, root: NodeId, record: &Record) -> Result<(), CoreError> {
    let [line] = record.lines.as_slice() else {
        return Err(CoreError::Conflict("added in remote: expected exactly one tree line".to_owned()));
    };
    if line.whose != Side::Their {
        return Err(CoreError::Conflict("added in remote: expected a `their` line".to_owned()));
    }
    let (parents, name) = split_path(&line.path);
    let folder = resolve_folder(store, overlay, root, &parents)?;
    overlay.set(folder, name, Entry::Blob { oid: line.oid });
    Ok(())
}

fn apply_removed_in_remote(store: &dyn ObjectStore, overlay: &mut Overlay, root: NodeId, record: &Record) -> Result<(), CoreError> {
    let [a, b] = record.lines.as_slice() else {
        return Err(CoreError::Conflict("removed in remote: expected exactly two tree lines".to_owned()));
    };
    let sides = [a.whose, b.whose];
    let sides_ok = sides.contains(&Side::Our) && sides.contains(&Side::Base);
    if !sides_ok || a.path != b.path || a.oid != b.oid {
        return Err(CoreError::Conflict(
            "removed in remote: tree lines disagree on path/oid/side".to_owned(),
        ));
    }
    let (parents, name) = split_path(&a.path);
    let folder = resolve_folder(store, overlay, root, &parents)?;
    overlay.remove(folder, &name);
    Ok(())
}

fn apply_added_in_both(record: &Record) -> Result<(), CoreError> {
    let [a, b] = record.lines.as_slice() else {
        return Err(CoreError::Conflict("added in both: expected exactly two tree lines".to_owned()));
    };
    let sides = [a.whose, b.whose];
    let sides_ok = sides.contains(&Side::Our) && sides.contains(&Side::Their);
    if !sides_ok || !same_path(record.lines.as_slice()) {
        return Err(CoreError::Conflict("added in both: tree lines disagree on path/side".to_owned()));
    }
    if a.oid == b.oid {
        Ok(())
    } else {
        Err(CoreError::Conflict(format!(
            "added in both with differing content at `{}`",
            String::from_utf8_lossy(&a.path)
        )))
    }
}

fn apply_changed_in_both(store: &dyn ObjectStore, overlay: &mut Overlay, root: NodeId, record: &Record) -> Result<(), CoreError> {
    if record.lines.len() != 3 || !same_path(&record.lines) {
        return Err(CoreError::Conflict("changed in both: expected base/our/their tree lines for one path".to_owned()));
    }
    let has_base = record.lines.iter().any(|l| l.whose == Side::Base);
    let has_our = record.lines.iter().any(|l| l.whose == Side::Our);
    let has_their = record.lines.iter().any(|l| l.whose == Side::Their);
    if !(has_base && has_our && has_their) {
        return Err(CoreError::Conflict("changed in both: missing a base/our/their line".to_owned()));
    }

    let path = &record.lines[0].path;
    let (parents, name) = split_path(path);
    let folder = resolve_folder(store, overlay, root, &parents)?;

    let current_oid = match overlay.get(store, folder, &name)? {
        Some(Resident::Blob(oid)) => oid,
        _ => {
            return Err(CoreError::Conflict(format!(
                "changed in both: `{}` is not a resident blob",
                String::from_utf8_lossy(&name)
            )));
        }
    };

    let mut current_bytes = Vec::new();
    let mut reader = store.cat_file_blob(current_oid)?;
    reader.read_to_end(&mut current_bytes)?;
    reader.close()?;

    let patched = run_patch(&current_bytes, &record.diff)?;
    if patched.split(|&b| b == b'\n').any(|line| line.starts_with(b"<<<<<<< ")) {
        return Err(CoreError::Conflict(format!(
            "unresolved conflict markers after patching `{}`",
            String::from_utf8_lossy(&name)
        )));
    }

    let new_oid = write_blob(store, &patched)?;
    overlay.set(folder, name, Entry::Blob { oid: new_oid });
    Ok(())
}

/// Apply a unified diff to `original` via the external `patch -s <file> -`
/// command (spec §6), returning the patched file's final bytes.
fn run_patch(original: &[u8], diff: &[u8]) -> Result<Vec<u8>, CoreError> {
    let mut file = tempfile::NamedTempFile::new()?;
    file.write_all(original)?;
    file.flush()?;

    let mut child = Command::new("patch")
        .arg("-s")
        .arg(file.path())
        .arg("-")
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(diff)?;
    }
    let output = child.wait_with_output()?;
    if !output.status.success() {
        return Err(CoreError::Conflict(format!(
            "patch failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let mut patched = Vec::new();
    std::fs::File::open(file.path())?.read_to_end(&mut patched)?;
    Ok(patched)
}

fn write_blob(store: &dyn ObjectStore, bytes: &[u8]) -> Result<Oid, CoreError> {
    let mut writer = store.hash_object_stdin()?;
    writer.write_all(bytes)?;
    Ok(writer.close()?)
}
