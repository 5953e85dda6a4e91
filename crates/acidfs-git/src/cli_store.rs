//! [`CliObjectStore`]: the subprocess-spawning [`ObjectStore`] implementation.
//!
//! Every method here shells out to a single git plumbing command, with the
//! object-store path (`.git`, or the bare repository root) as the child's
//! working directory, per spec §4.1.

use std::path::{Path, PathBuf};

use crate::blob::{BlobReader, BlobWriter};
use crate::error::StoreError;
use crate::proc;
use crate::store::ObjectStore;
use crate::types::{AuthorEnv, ObjectKind, Oid, TreeRow};

/// A git object store reached by spawning the `git` CLI.
///
/// `root` is the *object store* path: `<repo>/.git` for a working
/// repository, or `<repo>` itself in bare mode (spec §6).
pub struct CliObjectStore {
    root: PathBuf,
}

impl CliObjectStore {
    /// Wrap an existing object-store directory. Does not check that it is a
    /// valid repository; callers (the session layer) do that.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The object-store directory this instance was constructed with.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn git(&self, args: &[&str], stdin: Option<&[u8]>) -> Result<std::process::Output, StoreError> {
        proc::run(&self.root, "git", args, stdin)
    }
}

impl ObjectStore for CliObjectStore {
    fn init(&self, path: &Path, bare: bool) -> Result<(), StoreError> {
        let mut args = vec!["init"];
        if bare {
            args.push("--bare");
        }
        proc::run(path, "git", &args, None)?;
        Ok(())
    }

    fn rev_list_one(&self, reference: &str) -> Result<Oid, StoreError> {
        match self.git(&["rev-list", "--max-count=1", reference], None) {
            Ok(output) => Ok(proc::stdout_string(&output).parse()?),
            Err(StoreError::StoreFailed { .. }) => Err(StoreError::RefMissing {
                ref_name: reference.to_owned(),
            }),
            Err(other) => Err(other),
        }
    }

    fn rev_parse_tree(&self, commit: Oid) -> Result<Oid, StoreError> {
        let spec = format!("{commit}^{{tree}}");
        let output = self.git(&["rev-parse", &spec], None)?;
        Ok(proc::stdout_string(&output).parse()?)
    }

    fn ls_tree(&self, tree: Oid) -> Result<Vec<TreeRow>, StoreError> {
        let oid_str = tree.to_string();
        let output = self.git(&["ls-tree", "-z", &oid_str], None)?;
        parse_ls_tree(&output.stdout)
    }

    fn mktree(&self, entries: &[TreeRow]) -> Result<Oid, StoreError> {
        let mut stdin = Vec::new();
        for entry in entries {
            stdin.extend_from_slice(entry.kind.mode_str().as_bytes());
            stdin.push(b' ');
            stdin.extend_from_slice(kind_label(entry.kind).as_bytes());
            stdin.push(b' ');
            stdin.extend_from_slice(entry.oid.to_string().as_bytes());
            stdin.push(b'\t');
            stdin.extend_from_slice(&entry.name);
            stdin.push(b'\n');
        }
        let output = self.git(&["mktree"], Some(&stdin))?;
        Ok(proc::stdout_string(&output).parse()?)
    }

    fn cat_file_blob(&self, oid: Oid) -> Result<BlobReader, StoreError> {
        let oid_str = oid.to_string();
        let child = proc::spawn_piped(&self.root, "git", &["cat-file", "blob", &oid_str])?;
        Ok(BlobReader::new(child))
    }

    fn hash_object_stdin(&self) -> Result<BlobWriter, StoreError> {
        let child = proc::spawn_piped(&self.root, "git", &["hash-object", "-w", "--stdin"])?;
        Ok(BlobWriter::new(child))
    }

    fn commit_tree(
        &self,
        tree: Oid,
        parents: &[Oid],
        message: &str,
        author_env: &AuthorEnv,
    ) -> Result<Oid, StoreError> {
        let tree_str = tree.to_string();
        let parent_strs: Vec<String> = parents.iter().map(std::string::ToString::to_string).collect();
        let mut args: Vec<&str> = vec!["commit-tree", &tree_str, "-m", message];
        for p in &parent_strs {
            args.push("-p");
            args.push(p);
        }

        let mut cmd = std::process::Command::new("git");
        cmd.args(&args).current_dir(&self.root);
        apply_author_env(&mut cmd, author_env);
        cmd.stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .stdin(std::process::Stdio::null());
        let label = proc::command_label("git", &args);
        tracing::debug!(command = %label, "spawning plumbing command");
        let output = cmd.output()?;
        if !output.status.success() {
            return Err(StoreError::StoreFailed {
                command: label,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
                exit_code: output.status.code(),
            });
        }
        Ok(proc::stdout_string(&output).parse()?)
    }

    fn merge_base(&self, a: Oid, b: Oid) -> Result<Oid, StoreError> {
        let a_str = a.to_string();
        let b_str = b.to_string();
        match self.git(&["merge-base", &a_str, &b_str], None) {
            Ok(output) => Ok(proc::stdout_string(&output).parse()?),
            Err(StoreError::StoreFailed { .. }) => Err(StoreError::NoMergeBase { a: a_str, b: b_str }),
            Err(other) => Err(other),
        }
    }

    fn merge_tree(&self, base: Oid, ours: Oid, theirs: Oid) -> Result<Vec<u8>, StoreError> {
        let base_str = base.to_string();
        let ours_str = ours.to_string();
        let theirs_str = theirs.to_string();
        let output = self.git(&["merge-tree", &base_str, &ours_str, &theirs_str], None)?;
        Ok(output.stdout)
    }

    fn update_ref(&self, ref_path: &str, commit: Oid) -> Result<(), StoreError> {
        let commit_str = commit.to_string();
        self.git(&["update-ref", ref_path, &commit_str], None)?;
        Ok(())
    }

    fn reset_hard(&self, commit: Oid) -> Result<(), StoreError> {
        let commit_str = commit.to_string();
        self.git(&["reset", "--hard", &commit_str], None)?;
        Ok(())
    }

    fn reset_soft(&self, commit: Oid) -> Result<(), StoreError> {
        let commit_str = commit.to_string();
        self.git(&["reset", "--soft", &commit_str], None)?;
        Ok(())
    }

    fn config_set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.git(&["config", key, value], None)?;
        Ok(())
    }
}

fn kind_label(kind: ObjectKind) -> &'static str {
    match kind {
        ObjectKind::Blob => "blob",
        ObjectKind::Tree => "tree",
    }
}

fn apply_author_env(cmd: &mut std::process::Command, author_env: &AuthorEnv) {
    if let Some(name) = &author_env.name {
        cmd.env("GIT_AUTHOR_NAME", name);
        cmd.env("GIT_COMMITTER_NAME", name);
    }
    if let Some(email) = &author_env.email {
        cmd.env("GIT_AUTHOR_EMAIL", email);
        cmd.env("GIT_COMMITTER_EMAIL", email);
        cmd.env("EMAIL", email);
    }
}

/// Parse NUL-terminated `git ls-tree -z` output into [`TreeRow`]s.
///
/// `-z` is used (rather than newline-delimited output) so that entry names
/// containing arbitrary bytes round-trip exactly; per spec, name bytes are
/// opaque modulo the configured path encoding, which is validated above this
/// layer, not here.
fn parse_ls_tree(data: &[u8]) -> Result<Vec<TreeRow>, StoreError> {
    let mut rows = Vec::new();
    for record in data.split(|&b| b == 0) {
        if record.is_empty() {
            continue;
        }
        // Format: "<mode> <type> <oid>\t<name>"
        let tab = record
            .iter()
            .position(|&b| b == b'\t')
            .ok_or_else(|| StoreError::StoreFailed {
                command: "git ls-tree".to_owned(),
                stderr: format!("malformed ls-tree record: {:?}", String::from_utf8_lossy(record)),
                exit_code: None,
            })?;
        let (meta, name) = (&record[..tab], &record[tab + 1..]);
        let meta_str = String::from_utf8_lossy(meta);
        let mut parts = meta_str.splitn(3, ' ');
        let mode = parts.next().unwrap_or_default();
        let kind_word = parts.next().unwrap_or_default();
        let oid_str = parts.next().unwrap_or_default();

        let kind = ObjectKind::parse_mode(mode).map_err(|mode| StoreError::UnsupportedMode {
            mode,
            name: String::from_utf8_lossy(name).into_owned(),
        })?;
        debug_assert!(kind_word == "blob" || kind_word == "tree");
        let oid: Oid = oid_str.parse()?;
        rows.push(TreeRow {
            kind,
            oid,
            name: name.to_vec(),
        });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ls_tree_basic() {
        let data = b"100644 blob e69de29bb2d1d6434b8b29ae775ad8c2e48c5391\tfoo.txt\0040000 tree 4b825dc642cb6eb9a060e54bf8d69288fbee4904\tsub\0";
        let rows = parse_ls_tree(data).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, b"foo.txt");
        assert_eq!(rows[0].kind, ObjectKind::Blob);
        assert_eq!(rows[1].name, b"sub");
        assert_eq!(rows[1].kind, ObjectKind::Tree);
    }

    #[test]
    fn parse_ls_tree_rejects_unsupported_mode() {
        let data = b"120000 blob e69de29bb2d1d6434b8b29ae775ad8c2e48c5391\tlink\0";
        let err = parse_ls_tree(data).unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedMode { .. }));
    }

    #[test]
    fn parse_ls_tree_empty() {
        assert!(parse_ls_tree(b"").unwrap().is_empty());
    }
}
