//! Blob streams (C2): non-seekable read/write handles over plumbing pipes.

use std::io::{self, Read, Write};
use std::process::Child;

use crate::error::StoreError;
use crate::proc;
use crate::types::Oid;

/// A read-only, non-restartable byte stream over `git cat-file blob <oid>`.
///
/// On [`Drop`], the child's stdout/stderr are closed and the process is
/// waited on; a nonzero exit surfaces only if the reader is explicitly
/// [`close`](Self::close)d — matching the teacher's handle-and-report-at-use
/// convention, since I/O errors are more actionable at the point a caller is
/// actually consuming the stream.
pub struct BlobReader {
    child: Option<Child>,
}

impl BlobReader {
    pub(crate) fn new(child: Child) -> Self {
        Self { child: Some(child) }
    }

    /// Close the stream, waiting for the underlying process and surfacing
    /// `StoreFailed` if it exited nonzero.
    pub fn close(mut self) -> Result<(), StoreError> {
        self.close_inner()
    }

    fn close_inner(&mut self) -> Result<(), StoreError> {
        if let Some(child) = self.child.take() {
            proc::finish(child, "git cat-file blob")?;
        }
        Ok(())
    }
}

impl Read for BlobReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let child = self
            .child
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "blob reader already closed"))?;
        let stdout = child
            .stdout
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "blob reader has no stdout"))?;
        stdout.read(buf)
    }
}

impl Drop for BlobReader {
    fn drop(&mut self) {
        let _ = self.close_inner();
    }
}

/// A write-only handle over `git hash-object -w --stdin`.
///
/// Writes are pushed straight to the child's stdin. [`close`](Self::close)
/// closes stdin, reads the 40-hex OID the child prints on stdout, and waits
/// on the process. Per spec, closing twice is a no-op; the caller above this
/// layer (the overlay's `NewBlob` entry) is responsible for installing the
/// returned OID at the bound path.
pub struct BlobWriter {
    child: Option<Child>,
    oid: Option<Oid>,
}

impl BlobWriter {
    pub(crate) fn new(child: Child) -> Self {
        Self {
            child: Some(child),
            oid: None,
        }
    }

    /// Close the writer, returning the OID of what was written. Closing
    /// twice is a no-op: the cached OID from the first close is returned.
    pub fn close(&mut self) -> Result<Oid, StoreError> {
        if let Some(oid) = self.oid {
            return Ok(oid);
        }
        let Some(mut child) = self.child.take() else {
            unreachable!("child is only None once oid is Some")
        };
        // Dropping stdin closes it, signalling EOF to the child.
        drop(child.stdin.take());
        let mut out = String::new();
        if let Some(mut stdout) = child.stdout.take() {
            use std::io::Read as _;
            stdout.read_to_string(&mut out)?;
        }
        proc::finish(child, "git hash-object -w --stdin")?;
        let oid: Oid = out.trim().parse()?;
        self.oid = Some(oid);
        Ok(oid)
    }
}

impl Write for BlobWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let child = self
            .child
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "blob writer already closed"))?;
        let stdin = child
            .stdin
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "blob writer has no stdin"))?;
        stdin.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Some(child) = self.child.as_mut()
            && let Some(stdin) = child.stdin.as_mut()
        {
            return stdin.flush();
        }
        Ok(())
    }
}

impl Drop for BlobWriter {
    fn drop(&mut self) {
        // A writer dropped without close() leaves no OID to install; the
        // overlay entry stays a NewBlob placeholder, which save() rejects.
        if self.oid.is_none()
            && let Some(child) = self.child.take()
        {
            let _ = proc::finish(child, "git hash-object -w --stdin");
        }
    }
}
