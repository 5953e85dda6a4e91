//! The path-addressed filesystem façade (C6), the handle applications use.

use std::cell::RefCell;
use std::io::{self, Read, Write};
use std::rc::Rc;
use std::sync::Arc;

use acidfs_core::{DataManager, NodeId, Resident, Session, TxInfo, ROOT};
use acidfs_git::{CliObjectStore, ObjectStore, Oid};

use crate::config::AcidFsConfig;
use crate::error::AcidFsError;
use crate::path;

/// A path-addressed handle over one branch of one object store.
///
/// Not `Send`/`Sync`: exactly one caller owns a handle at a time, matching
/// the single-threaded cooperative model every `Session` is built for.
pub struct AcidFs {
    store: Arc<dyn ObjectStore>,
    db_root: std::path::PathBuf,
    working_root: Option<std::path::PathBuf>,
    head: String,
    sort_key: String,
    path_encoding: crate::config::PathEncoding,
    session: Rc<RefCell<Option<Session>>>,
    cwd: RefCell<Vec<Vec<u8>>>,
}

impl AcidFs {
    /// Open (creating if configured and missing) the repository named by
    /// `config`.
    pub fn open_repo(config: AcidFsConfig) -> Result<Self, AcidFsError> {
        let working_root = if config.bare {
            None
        } else {
            Some(config.repo.clone())
        };
        let db_root = if config.bare {
            config.repo.clone()
        } else {
            config.repo.join(".git")
        };

        let store: Arc<dyn ObjectStore> = Arc::new(CliObjectStore::new(config.repo.clone()));

        if !db_root.join("HEAD").exists() {
            if !config.create {
                return Err(AcidFsError::ConfigError(format!(
                    "repository does not exist: {}",
                    config.repo.display()
                )));
            }
            tracing::info!(repo = %config.repo.display(), bare = config.bare, "initializing repository");
            store.init(&config.repo, config.bare)?;
            if let Some(name) = &config.user_name {
                store.config_set("user.name", name)?;
            }
            if let Some(email) = &config.user_email {
                store.config_set("user.email", email)?;
            }
        }

        Ok(Self {
            store,
            db_root,
            working_root,
            head: config.head,
            sort_key: config.name,
            path_encoding: config.path_encoding,
            session: Rc::new(RefCell::new(None)),
            cwd: RefCell::new(Vec::new()),
        })
    }

    /// Lazily open a [`Session`] for the current transaction, invoking `f`
    /// with it. Replaces the session on the next access after a commit or
    /// abort closes it.
    fn with_session<T>(
        &self,
        f: impl FnOnce(&mut Session) -> Result<T, AcidFsError>,
    ) -> Result<T, AcidFsError> {
        let mut slot = self.session.borrow_mut();
        if slot.as_ref().is_none_or(Session::is_closed) {
            *slot = Some(Session::open(
                Arc::clone(&self.store),
                self.db_root.clone(),
                self.working_root.clone(),
                &self.head,
                self.sort_key.clone(),
            )?);
        }
        f(slot.as_mut().expect("just opened"))
    }

    fn resolve(&self, path: &str) -> Vec<Vec<u8>> {
        let mut components = if path::is_absolute(path) {
            Vec::new()
        } else {
            self.cwd.borrow().clone()
        };
        for segment in path::split(path) {
            match segment.as_slice() {
                b"." => {}
                b".." => {
                    components.pop();
                }
                _ => components.push(segment),
            }
        }
        components
    }

    fn validate_name(&self, name: &[u8]) -> Result<(), AcidFsError> {
        if self.path_encoding.validate(name) {
            Ok(())
        } else {
            Err(AcidFsError::ConfigError(format!(
                "path component {:?} is not valid under the configured path encoding",
                String::from_utf8_lossy(name)
            )))
        }
    }

    /// Split `components` into its parent's resident tree node and the final
    /// name, auto-resolving but not auto-creating intermediate directories.
    ///
    /// Unlike [`acidfs_core::Overlay::find`] (which collapses "missing" and
    /// "blocked by a blob" into one `None`), this distinguishes them: a
    /// missing intermediate is `PathNotFound`, a blob standing where a
    /// directory was expected is `NotADirectory`, per spec's taxonomy.
    fn locate_parent(
        &self,
        session: &mut Session,
        components: &[Vec<u8>],
    ) -> Result<(NodeId, Vec<u8>), AcidFsError> {
        let (parent_components, name) = components
            .split_last()
            .map(|(name, rest)| (rest, name.clone()))
            .unwrap_or((&[], Vec::new()));
        let mut current = ROOT;
        for component in parent_components {
            match session.overlay_mut().get(session.store(), current, component)? {
                Some(Resident::Tree(node)) => current = node,
                Some(_) => return Err(AcidFsError::NotADirectory(display_path(components))),
                None => return Err(AcidFsError::PathNotFound(display_path(components))),
            }
        }
        Ok((current, name))
    }

    // -- read-only queries ---------------------------------------------

    pub fn exists(&self, path: &str) -> Result<bool, AcidFsError> {
        let components = self.resolve(path);
        self.with_session(|session| {
            Ok(session
                .overlay_mut()
                .find(session.store(), ROOT, &components)?
                .is_some())
        })
    }

    pub fn isdir(&self, path: &str) -> Result<bool, AcidFsError> {
        let components = self.resolve(path);
        self.with_session(|session| {
            Ok(matches!(
                session.overlay_mut().find(session.store(), ROOT, &components)?,
                Some(Resident::Tree(_))
            ))
        })
    }

    pub fn empty(&self, path: &str) -> Result<bool, AcidFsError> {
        let components = self.resolve(path);
        self.with_session(|session| {
            match session.overlay_mut().find(session.store(), ROOT, &components)? {
                Some(Resident::Tree(node)) => Ok(session.overlay().empty(node)),
                Some(_) => Err(AcidFsError::NotADirectory(display_path(&components))),
                None => Err(AcidFsError::PathNotFound(display_path(&components))),
            }
        })
    }

    pub fn listdir(&self, path: &str) -> Result<Vec<String>, AcidFsError> {
        let components = self.resolve(path);
        self.with_session(|session| {
            match session.overlay_mut().find(session.store(), ROOT, &components)? {
                Some(Resident::Tree(node)) => Ok(session
                    .overlay()
                    .names(node)
                    .map(|n| String::from_utf8_lossy(n).into_owned())
                    .collect()),
                Some(_) => Err(AcidFsError::NotADirectory(display_path(&components))),
                None => Err(AcidFsError::PathNotFound(display_path(&components))),
            }
        })
    }

    /// The OID an entry is, or would be, persisted as; saves a dirty subtree
    /// first if necessary.
    pub fn hash(&self, path: &str) -> Result<Oid, AcidFsError> {
        let components = self.resolve(path);
        self.with_session(|session| {
            match session.overlay_mut().find(session.store(), ROOT, &components)? {
                Some(Resident::Blob(oid)) => Ok(oid),
                Some(Resident::Tree(node)) => {
                    let store = Arc::clone(&self.store);
                    Ok(session.overlay_mut().save(store.as_ref(), node)?)
                }
                Some(Resident::NewBlob(_)) => Err(AcidFsError::OpenFileAtCommit(display_path(&components))),
                None => Err(AcidFsError::PathNotFound(display_path(&components))),
            }
        })
    }

    // -- directories -----------------------------------------------------

    pub fn mkdir(&self, path: &str) -> Result<(), AcidFsError> {
        let components = self.resolve(path);
        self.with_session(|session| {
            let (parent, name) = self.locate_parent(session, &components)?;
            self.validate_name(&name)?;
            if session.overlay_mut().get(session.store(), parent, &name)?.is_some() {
                return Err(AcidFsError::FileExists(display_path(&components)));
            }
            session.overlay_mut().new_tree(parent, name);
            Ok(())
        })
    }

    pub fn mkdirs(&self, path: &str) -> Result<(), AcidFsError> {
        let components = self.resolve(path);
        self.with_session(|session| {
            let mut current = ROOT;
            for name in &components {
                self.validate_name(name)?;
                match session.overlay_mut().get(session.store(), current, name)? {
                    Some(Resident::Tree(node)) => current = node,
                    Some(_) => {
                        return Err(AcidFsError::NotADirectory(display_path(&components)));
                    }
                    None => current = session.overlay_mut().new_tree(current, name.clone()),
                }
            }
            Ok(())
        })
    }

    // -- removal ---------------------------------------------------------

    pub fn rm(&self, path: &str) -> Result<(), AcidFsError> {
        let components = self.resolve(path);
        self.with_session(|session| {
            let (parent, name) = self.locate_parent(session, &components)?;
            match session.overlay_mut().get(session.store(), parent, &name)? {
                Some(Resident::Tree(_)) => Err(AcidFsError::IsADirectory(display_path(&components))),
                Some(_) => {
                    session.overlay_mut().remove(parent, &name);
                    Ok(())
                }
                None => Err(AcidFsError::PathNotFound(display_path(&components))),
            }
        })
    }

    pub fn rmdir(&self, path: &str) -> Result<(), AcidFsError> {
        let components = self.resolve(path);
        self.with_session(|session| {
            let (parent, name) = self.locate_parent(session, &components)?;
            match session.overlay_mut().get(session.store(), parent, &name)? {
                Some(Resident::Tree(node)) => {
                    if !session.overlay().empty(node) {
                        return Err(AcidFsError::DirectoryNotEmpty(display_path(&components)));
                    }
                    session.overlay_mut().remove(parent, &name);
                    Ok(())
                }
                Some(_) => Err(AcidFsError::NotADirectory(display_path(&components))),
                None => Err(AcidFsError::PathNotFound(display_path(&components))),
            }
        })
    }

    /// Remove recursively. The root (empty path) can never be removed.
    pub fn rmtree(&self, path: &str) -> Result<(), AcidFsError> {
        let components = self.resolve(path);
        if components.is_empty() {
            return Err(AcidFsError::ConfigError("cannot remove the root".to_owned()));
        }
        self.with_session(|session| {
            let (parent, name) = self.locate_parent(session, &components)?;
            if session.overlay_mut().get(session.store(), parent, &name)?.is_none() {
                return Err(AcidFsError::PathNotFound(display_path(&components)));
            }
            session.overlay_mut().remove(parent, &name);
            Ok(())
        })
    }

    // -- move --------------------------------------------------------------

    pub fn mv(&self, src: &str, dst: &str) -> Result<(), AcidFsError> {
        let src_components = self.resolve(src);
        let dst_components = self.resolve(dst);
        self.with_session(|session| {
            let (src_parent, src_name) = self.locate_parent(session, &src_components)?;
            let src_entry = session
                .overlay()
                .entry(src_parent, &src_name)
                .ok_or_else(|| AcidFsError::PathNotFound(display_path(&src_components)))?
                .clone();

            let (dst_parent, dst_name) = self.locate_parent(session, &dst_components)?;
            let target = session.overlay_mut().get(session.store(), dst_parent, &dst_name)?;
            let (final_parent, final_name) = match target {
                Some(Resident::Tree(node)) => (node, src_name.clone()),
                _ => (dst_parent, dst_name),
            };
            self.validate_name(&final_name)?;

            session.overlay_mut().remove(src_parent, &src_name);
            session.overlay_mut().set(final_parent, final_name, src_entry);
            Ok(())
        })
    }

    // -- open --------------------------------------------------------------

    /// Open `path` under `mode`: `"r"` (read), `"w"` (create/truncate),
    /// `"a"` (create-or-append), `"x"` (create exclusive). Combined
    /// read/write modes are rejected as [`AcidFsError::BadMode`].
    pub fn open(&self, path: &str, mode: &str) -> Result<FileHandle, AcidFsError> {
        let components = self.resolve(path);
        match mode {
            "r" => {
                // A path with a write-in-progress falls back to the blob it
                // pointed to before the write started, matching the original
                // `NewBlob.open()`'s pre-close read behavior.
                let oid = self.with_session(|session| {
                    match session.overlay_mut().find(session.store(), ROOT, &components)? {
                        Some(Resident::Blob(oid)) => Ok(oid),
                        Some(Resident::NewBlob(Some(prev))) => Ok(prev),
                        Some(Resident::NewBlob(None)) => {
                            Err(AcidFsError::OpenFileAtCommit(display_path(&components)))
                        }
                        Some(Resident::Tree(_)) => Err(AcidFsError::IsADirectory(display_path(&components))),
                        None => Err(AcidFsError::PathNotFound(display_path(&components))),
                    }
                })?;
                let reader = self.with_session(|session| Ok(session.store().cat_file_blob(oid)?))?;
                Ok(FileHandle::Reader(reader))
            }
            "w" | "x" => {
                let exclusive = mode == "x";
                self.with_session(|session| {
                    let (parent, name) = self.locate_parent(session, &components)?;
                    self.validate_name(&name)?;
                    match session.overlay_mut().get(session.store(), parent, &name)? {
                        Some(Resident::Tree(_)) => {
                            return Err(AcidFsError::IsADirectory(display_path(&components)));
                        }
                        Some(_) if exclusive => {
                            return Err(AcidFsError::FileExists(display_path(&components)));
                        }
                        _ => {}
                    }
                    session.overlay_mut().new_blob(parent, name.clone(), None);
                    let inner = session.store().hash_object_stdin()?;
                    Ok(FileHandle::Writer(FileWriter {
                        session: Rc::clone(&self.session),
                        folder: parent,
                        name,
                        inner: Some(inner),
                    }))
                })
            }
            "a" => self.with_session(|session| {
                let (parent, name) = self.locate_parent(session, &components)?;
                self.validate_name(&name)?;
                let prev = match session.overlay_mut().get(session.store(), parent, &name)? {
                    Some(Resident::Tree(_)) => {
                        return Err(AcidFsError::IsADirectory(display_path(&components)));
                    }
                    Some(Resident::Blob(oid)) => Some(oid),
                    Some(Resident::NewBlob(_)) => {
                        return Err(AcidFsError::OpenFileAtCommit(display_path(&components)));
                    }
                    None => None,
                };
                session.overlay_mut().new_blob(parent, name.clone(), prev);
                let mut inner = session.store().hash_object_stdin()?;
                if let Some(oid) = prev {
                    let mut reader = session.store().cat_file_blob(oid)?;
                    io::copy(&mut reader, &mut inner)?;
                    reader.close()?;
                }
                Ok(FileHandle::Writer(FileWriter {
                    session: Rc::clone(&self.session),
                    folder: parent,
                    name,
                    inner: Some(inner),
                }))
            }),
            other => Err(AcidFsError::BadMode(other.to_owned())),
        }
    }

    // -- transaction boundary ------------------------------------------

    pub fn get_base(&self) -> Result<Option<Oid>, AcidFsError> {
        self.with_session(|session| Ok(session.prev_commit()))
    }

    pub fn set_base(&self, reference: &str) -> Result<(), AcidFsError> {
        self.with_session(|session| Ok(session.set_base(reference)?))
    }

    /// Vote and finish the current transaction in one call, with `tx`
    /// metadata for the commit message/author. A clean session is a no-op.
    pub fn commit(&self, tx: &TxInfo) -> Result<(), AcidFsError> {
        self.with_session(|session| {
            session.tpc_vote(tx)?;
            session.tpc_finish()?;
            tracing::debug!(branch = %self.head, "committed transaction");
            Ok(())
        })
    }

    /// Abandon every change made in the current transaction.
    pub fn abort(&self) {
        if let Some(session) = self.session.borrow_mut().as_mut() {
            tracing::debug!(branch = %self.head, "aborting transaction");
            session.tpc_abort();
        }
    }

    // -- cwd ---------------------------------------------------------------

    pub fn chdir(&self, path: &str) -> Result<(), AcidFsError> {
        let components = self.resolve(path);
        self.with_session(|session| {
            match session.overlay_mut().find(session.store(), ROOT, &components)? {
                Some(Resident::Tree(_)) => Ok(()),
                Some(_) => Err(AcidFsError::NotADirectory(display_path(&components))),
                None => Err(AcidFsError::PathNotFound(display_path(&components))),
            }
        })?;
        *self.cwd.borrow_mut() = components;
        Ok(())
    }

    /// Run `f` with the cwd temporarily changed to `path`, restoring it
    /// afterward regardless of how `f` returns.
    pub fn cd<T>(&self, path: &str, f: impl FnOnce() -> Result<T, AcidFsError>) -> Result<T, AcidFsError> {
        let prev = self.cwd.borrow().clone();
        self.chdir(path)?;
        let result = f();
        *self.cwd.borrow_mut() = prev;
        result
    }
}

fn display_path(components: &[Vec<u8>]) -> String {
    let mut out = String::from("/");
    out.push_str(
        &components
            .iter()
            .map(|c| String::from_utf8_lossy(c).into_owned())
            .collect::<Vec<_>>()
            .join("/"),
    );
    out
}

/// A handle returned by [`AcidFs::open`].
pub enum FileHandle {
    Reader(acidfs_git::BlobReader),
    Writer(FileWriter),
}

impl Read for FileHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Reader(reader) => reader.read(buf),
            Self::Writer(_) => Err(io::Error::new(io::ErrorKind::Unsupported, "handle is write-only")),
        }
    }
}

impl Write for FileHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Writer(writer) => writer.write(buf),
            Self::Reader(_) => Err(io::Error::new(io::ErrorKind::Unsupported, "handle is read-only")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Writer(writer) => writer.flush(),
            Self::Reader(_) => Ok(()),
        }
    }
}

/// A write-in-progress file. Carries an index back-pointer to the overlay
/// (`folder`, `name`) rather than owning it, so a dropped-without-close
/// writer leaves the overlay's `NewBlob` placeholder alone to be caught by
/// `save()`'s `OpenFileAtCommit` check.
pub struct FileWriter {
    session: Rc<RefCell<Option<Session>>>,
    folder: NodeId,
    name: Vec<u8>,
    inner: Option<acidfs_git::BlobWriter>,
}

impl FileWriter {
    /// Close the writer, hashing its content and installing the result into
    /// the overlay at the bound path.
    pub fn close(&mut self) -> Result<Oid, AcidFsError> {
        let mut inner = self
            .inner
            .take()
            .ok_or_else(|| AcidFsError::ConfigError("file already closed".to_owned()))?;
        let oid = inner.close()?;
        if let Some(session) = self.session.borrow_mut().as_mut() {
            session.overlay_mut().install_blob(self.folder, &self.name, oid);
        }
        Ok(oid)
    }
}

impl Write for FileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let inner = self
            .inner
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "writer already closed"))?;
        inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let Some(inner) = self.inner.as_mut() else {
            return Ok(());
        };
        inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_path_renders_leading_slash() {
        assert_eq!(display_path(&[b"a".to_vec(), b"b".to_vec()]), "/a/b");
        assert_eq!(display_path(&[]), "/");
    }
}
