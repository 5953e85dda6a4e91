//! Handle configuration (spec §6).

use std::path::PathBuf;

/// Validates tree-entry name bytes. No on-disk config file is involved —
/// this is a plain builder/struct passed to [`crate::AcidFs::open_repo`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PathEncoding {
    /// Every name byte must be ASCII. The default, matching spec's default.
    #[default]
    Ascii,
    /// Every name must be valid UTF-8.
    Utf8,
    /// A caller-supplied validator, for encodings neither built-in variant
    /// covers.
    Custom(fn(&[u8]) -> bool),
}

impl PathEncoding {
    #[must_use]
    pub fn validate(&self, name: &[u8]) -> bool {
        match self {
            Self::Ascii => name.is_ascii(),
            Self::Utf8 => std::str::from_utf8(name).is_ok(),
            Self::Custom(f) => f(name),
        }
    }
}

/// Constructor options for [`crate::AcidFs`].
#[derive(Debug, Clone)]
pub struct AcidFsConfig {
    /// Path to the repository on the local filesystem.
    pub repo: PathBuf,
    /// Branch to commit to. Default `"HEAD"`.
    pub head: String,
    /// Initialize the object store if missing. Default `true`.
    pub create: bool,
    /// On creation, create a bare repository. Default `false`.
    pub bare: bool,
    /// Written as repository-level author identity at creation.
    pub user_name: Option<String>,
    /// Written as repository-level author identity at creation.
    pub user_email: Option<String>,
    /// Coordinator sort key. Default `"AcidFS"`.
    pub name: String,
    /// Byte encoding accepted for tree entry names. Default `Ascii`.
    pub path_encoding: PathEncoding,
}

impl AcidFsConfig {
    /// Start a config for `repo` with every other option at its default.
    #[must_use]
    pub fn new(repo: impl Into<PathBuf>) -> Self {
        Self {
            repo: repo.into(),
            head: "HEAD".to_owned(),
            create: true,
            bare: false,
            user_name: None,
            user_email: None,
            name: "AcidFS".to_owned(),
            path_encoding: PathEncoding::Ascii,
        }
    }

    #[must_use]
    pub fn head(mut self, head: impl Into<String>) -> Self {
        self.head = head.into();
        self
    }

    #[must_use]
    pub const fn create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    #[must_use]
    pub const fn bare(mut self, bare: bool) -> Self {
        self.bare = bare;
        self
    }

    #[must_use]
    pub fn user_name(mut self, user_name: impl Into<String>) -> Self {
        self.user_name = Some(user_name.into());
        self
    }

    #[must_use]
    pub fn user_email(mut self, user_email: impl Into<String>) -> Self {
        self.user_email = Some(user_email.into());
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub const fn path_encoding(mut self, path_encoding: PathEncoding) -> Self {
        self.path_encoding = path_encoding;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_rejects_non_ascii() {
        assert!(!PathEncoding::Ascii.validate("café".as_bytes()));
        assert!(PathEncoding::Ascii.validate(b"cafe"));
    }

    #[test]
    fn utf8_accepts_multibyte() {
        assert!(PathEncoding::Utf8.validate("café".as_bytes()));
    }

    #[test]
    fn custom_validator_runs_caller_logic() {
        fn no_spaces(name: &[u8]) -> bool {
            !name.contains(&b' ')
        }
        let encoding = PathEncoding::Custom(no_spaces);
        assert!(encoding.validate(b"foo.txt"));
        assert!(!encoding.validate(b"foo bar.txt"));
    }

    #[test]
    fn defaults_match_spec() {
        let config = AcidFsConfig::new("/tmp/repo");
        assert_eq!(config.head, "HEAD");
        assert!(config.create);
        assert!(!config.bare);
        assert_eq!(config.name, "AcidFS");
        assert_eq!(config.path_encoding, PathEncoding::Ascii);
    }
}
