// SPDX-License-Identifier: Apache-2.0

//! Disposable working directory for one repair run.

use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::program::Program;

/// Scratch directory owned by one repair run; removed when dropped.
#[derive(Debug)]
pub struct Sandbox {
    root: PathBuf,
    released: bool,
}

impl Sandbox {
    /// Creates `root`, which must not already exist. Parent directories are
    /// created as needed and the sandbox itself is left world-writable.
    pub fn create(root: impl Into<PathBuf>) -> std::io::Result<Sandbox> {
        let root = root.into();
        if let Some(parent) = root.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::create_dir(&root)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&root, std::fs::Permissions::from_mode(0o777))?;
        }
        log::info!("Sandbox::create; root: {}", root.display());
        Ok(Sandbox {
            root,
            released: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Copies the tree under `source_root` into the sandbox, skipping the
    /// file at `exclude` (relative to `source_root`) and the sandbox itself
    /// when it lives inside the source tree. Returns the number of files
    /// copied.
    pub fn populate_from(&self, source_root: &Path, exclude: &Path) -> anyhow::Result<usize> {
        let excluded = source_root.join(exclude);
        let mut copied = 0;
        let mut dir_worklist: Vec<PathBuf> = vec![source_root.to_path_buf()];
        while let Some(dir) = dir_worklist.pop() {
            let entries = std::fs::read_dir(&dir)
                .with_context(|| format!("reading directory {}", dir.display()))?;
            for entry in entries {
                let path = entry?.path();
                if path == self.root || path == excluded {
                    continue;
                }
                let relative = path
                    .strip_prefix(source_root)
                    .with_context(|| format!("{} escapes the source root", path.display()))?;
                let target = self.root.join(relative);
                if path.is_dir() {
                    std::fs::create_dir_all(&target)
                        .with_context(|| format!("creating {}", target.display()))?;
                    dir_worklist.push(path);
                } else {
                    std::fs::copy(&path, &target).with_context(|| {
                        format!("copying {} to {}", path.display(), target.display())
                    })?;
                    copied += 1;
                }
            }
        }
        log::info!(
            "Sandbox::populate_from; source_root: {} copied: {} excluded: {}",
            source_root.display(),
            copied,
            exclude.display()
        );
        Ok(copied)
    }

    /// Copies `program`'s source to its location inside the sandbox.
    pub fn place(&self, program: &Program) -> std::io::Result<Placement> {
        Placement::install(&self.root, program)
    }

    /// Removes the sandbox, reporting failures to the caller.
    pub fn close(mut self) -> std::io::Result<()> {
        self.released = true;
        log::info!("Sandbox::close; root: {}", self.root.display());
        std::fs::remove_dir_all(&self.root)
    }

    /// Leaves the directory on disk and returns its path.
    pub fn keep(mut self) -> PathBuf {
        self.released = true;
        log::info!("Sandbox::keep; root: {}", self.root.display());
        std::mem::take(&mut self.root)
    }
}

impl Drop for Sandbox {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.root) {
            log::warn!(
                "Sandbox::drop; could not remove {}: {}",
                self.root.display(),
                e
            );
        }
    }
}

/// A program source copied into a sandbox.
///
/// On drop the destination gets its previous contents back, or is removed
/// if nothing was there before.
#[derive(Debug)]
pub struct Placement {
    target: PathBuf,
    previous: Option<Vec<u8>>,
}

impl Placement {
    pub fn install(sandbox_root: &Path, program: &Program) -> std::io::Result<Placement> {
        let target = sandbox_root.join(program.class_name_as_path());
        let source = program.file_path();
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let previous = match std::fs::read(&target) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e),
        };
        std::fs::copy(&source, &target)?;
        log::trace!(
            "Placement::install; {} -> {}",
            source.display(),
            target.display()
        );
        Ok(Placement { target, previous })
    }

    pub fn path(&self) -> &Path {
        &self.target
    }
}

impl Drop for Placement {
    fn drop(&mut self) {
        let result = match self.previous.take() {
            Some(bytes) => std::fs::write(&self.target, bytes),
            None => std::fs::remove_file(&self.target),
        };
        if let Err(e) = result {
            log::warn!(
                "Placement::drop; could not restore {}: {}",
                self.target.display(),
                e
            );
        }
    }
}
