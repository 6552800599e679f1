// SPDX-License-Identifier: Apache-2.0

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::digest::CodeDigest;
use crate::error::RepairError;

pub const DEFAULT_EXTENSION: &str = "java";

static QUALIFIED_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_$][\w$]*(\.[A-Za-z_$][\w$]*)*$").expect("qualified name regex")
});

/// A program unit on disk: a source root plus a dotted class name.
///
/// The source file lives at `<source_root>/<class/name/as/path>.<extension>`.
/// Values are never modified in place; relocating yields a new value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Program {
    source_root: PathBuf,
    class_name: String,
    extension: String,
}

impl Program {
    pub fn new(source_root: impl Into<PathBuf>, class_name: impl Into<String>) -> Self {
        Self {
            source_root: source_root.into(),
            class_name: class_name.into(),
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn is_valid_class_name(name: &str) -> bool {
        QUALIFIED_NAME_RE.is_match(name)
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn simple_name(&self) -> &str {
        self.class_name
            .rsplit('.')
            .next()
            .unwrap_or(&self.class_name)
    }

    /// Dotted package prefix, if the class is not in the default package.
    pub fn package(&self) -> Option<&str> {
        self.class_name.rsplit_once('.').map(|(pkg, _)| pkg)
    }

    /// Path of the source file relative to the source root.
    pub fn class_name_as_path(&self) -> PathBuf {
        let mut path: PathBuf = self.class_name.split('.').collect();
        path.set_extension(&self.extension);
        path
    }

    pub fn file_path(&self) -> PathBuf {
        self.source_root.join(self.class_name_as_path())
    }

    /// The same unit under a different root.
    pub fn relocated(&self, source_root: impl Into<PathBuf>) -> Program {
        Program {
            source_root: source_root.into(),
            class_name: self.class_name.clone(),
            extension: self.extension.clone(),
        }
    }

    pub fn check_readable(&self) -> Result<(), RepairError> {
        let path = self.file_path();
        let not_readable = |reason: String| RepairError::SubjectNotReadable {
            path: path.clone(),
            reason,
        };
        let metadata = std::fs::metadata(&path).map_err(|e| not_readable(e.to_string()))?;
        if !metadata.is_file() {
            return Err(not_readable("not a regular file".to_string()));
        }
        std::fs::File::open(&path).map_err(|e| not_readable(e.to_string()))?;
        Ok(())
    }

    pub fn read_source(&self) -> std::io::Result<String> {
        std::fs::read_to_string(self.file_path())
    }

    pub fn digest(&self) -> std::io::Result<CodeDigest> {
        CodeDigest::of_file(&self.file_path())
    }

    /// Whether the source declares a routine called `name` with a body.
    ///
    /// Call sites such as `return name(x);` do not count.
    pub fn has_routine(&self, name: &str) -> Result<bool, RepairError> {
        if name.trim().is_empty() {
            return Err(RepairError::InvalidArgument(
                "routine name must not be empty".to_string(),
            ));
        }
        let source = self
            .read_source()
            .map_err(|e| RepairError::SubjectNotReadable {
                path: self.file_path(),
                reason: e.to_string(),
            })?;
        Ok(declares_routine(&source, name))
    }
}

pub(crate) fn declares_routine(source: &str, name: &str) -> bool {
    let pattern = format!(
        r"(?:^|[\s;{{}}])[\w<>\[\],.?]+\s+{}\s*\([^)]*\)\s*(?:throws\s+[\w.,\s]+?)?\{{",
        regex::escape(name)
    );
    match Regex::new(&pattern) {
        Ok(re) => re.is_match(source),
        Err(e) => {
            log::warn!("declares_routine; bad pattern for '{}': {}", name, e);
            false
        }
    }
}
