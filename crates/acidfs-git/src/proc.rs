//! Scoped child-process helper.
//!
//! Every plumbing invocation goes through [`run`] or [`spawn_piped`] so that
//! stdin/stdout/stderr are always closed and the child is always waited on,
//! even on an error path. Per spec §9: "never leak a child on an error path."

use std::io::Write as _;
use std::path::Path;
use std::process::{Child, Command, Output, Stdio};

use crate::error::StoreError;

/// Run a plumbing command to completion, feeding `stdin_data` (if any) and
/// collecting stdout/stderr. Returns `StoreError::StoreFailed` on nonzero exit.
pub(crate) fn run(
    cwd: &Path,
    program: &str,
    args: &[&str],
    stdin_data: Option<&[u8]>,
) -> Result<Output, StoreError> {
    let label = command_label(program, args);
    tracing::debug!(command = %label, "spawning plumbing command");

    let mut cmd = Command::new(program);
    cmd.args(args).current_dir(cwd);
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    cmd.stdin(if stdin_data.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });

    let mut child = cmd.spawn()?;
    if let Some(data) = stdin_data {
        // Scoped: drop the handle to close stdin before waiting, so a child
        // reading to EOF (e.g. `git mktree`, `git hash-object --stdin`) can finish.
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(data)?;
        }
    }
    let output = child.wait_with_output()?;

    if !output.status.success() {
        tracing::warn!(command = %label, stderr = %String::from_utf8_lossy(&output.stderr), "plumbing command failed");
        return Err(StoreError::StoreFailed {
            command: label,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            exit_code: output.status.code(),
        });
    }
    Ok(output)
}

/// Spawn a plumbing command with piped stdin and stdout, leaving both open
/// for the caller to drive (used for `cat-file blob` and `hash-object
/// --stdin`, whose I/O is exposed to callers as streams).
pub(crate) fn spawn_piped(cwd: &Path, program: &str, args: &[&str]) -> Result<Child, StoreError> {
    let label = command_label(program, args);
    tracing::debug!(command = %label, "spawning streaming plumbing command");
    Ok(Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?)
}

/// Wait on a child spawned via [`spawn_piped`] and convert a nonzero exit
/// into `StoreError::StoreFailed`, reading stderr for diagnostics.
pub(crate) fn finish(mut child: Child, label: &str) -> Result<(), StoreError> {
    let mut stderr_buf = Vec::new();
    if let Some(mut stderr) = child.stderr.take() {
        use std::io::Read as _;
        let _ = stderr.read_to_end(&mut stderr_buf);
    }
    let status = child.wait()?;
    if !status.success() {
        let stderr = String::from_utf8_lossy(&stderr_buf).trim().to_owned();
        tracing::warn!(command = %label, %stderr, "plumbing command failed");
        return Err(StoreError::StoreFailed {
            command: label.to_owned(),
            stderr,
            exit_code: status.code(),
        });
    }
    Ok(())
}

pub(crate) fn command_label(program: &str, args: &[&str]) -> String {
    let mut label = program.to_owned();
    for arg in args {
        label.push(' ');
        label.push_str(arg);
    }
    label
}

pub(crate) fn stdout_string(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).trim().to_owned()
}
