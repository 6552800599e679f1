// SPDX-License-Identifier: Apache-2.0

//! Content-addressed build cache for program units inside a sandbox.
//!
//! Built artifacts are keyed by unit name, build mode, and the code digest of
//! the unit's source. Units that are not marked reloadable are built once and
//! then served from the cache for the rest of the run, whatever happens to
//! their source. Reloadable units are rebuilt whenever their digest changes,
//! and [`ArtifactLoader::reload`] forces a fresh build.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use anyhow::Context;

use crate::digest::CodeDigest;
use crate::program::Program;

/// Subdirectory of the sandbox holding build outputs.
pub const BUILD_DIR_NAME: &str = ".build";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildMode {
    Plain,
    /// Specification checks compiled into the artifact.
    RuntimeChecked,
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildMode::Plain => write!(f, "plain"),
            BuildMode::RuntimeChecked => write!(f, "checked"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BuildRequest<'a> {
    pub unit: &'a str,
    pub source: &'a Path,
    pub sandbox: &'a Path,
    pub output_dir: &'a Path,
    pub classpath: &'a [PathBuf],
    pub mode: BuildMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    Built,
    Failed { diagnostics: String },
}

pub trait Builder: Send + Sync {
    /// Compiles one unit into `request.output_dir`. A compile error is a
    /// `BuildOutcome::Failed`; `Err` is reserved for a builder that could
    /// not run at all.
    fn build(&self, request: &BuildRequest<'_>) -> anyhow::Result<BuildOutcome>;

    /// Whether builds in `mode` can be attempted at all.
    fn supports(&self, _mode: BuildMode) -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub unit: String,
    pub mode: BuildMode,
    pub digest: CodeDigest,
    pub output_dir: PathBuf,
    /// Classpath the artifact was built against, output directory first.
    pub classpath: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Load {
    Ready(Artifact),
    Failed { diagnostics: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoaderError {
    NotReloadable(String),
}

impl fmt::Display for LoaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoaderError::NotReloadable(unit) => {
                write!(f, "unit '{}' is not marked reloadable", unit)
            }
        }
    }
}

impl std::error::Error for LoaderError {}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoaderStats {
    pub builds: usize,
    pub build_failures: usize,
    pub cache_hits: usize,
    pub evictions: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ArtifactKey {
    unit: String,
    mode: BuildMode,
    digest: CodeDigest,
}

pub struct ArtifactLoader {
    builder: Arc<dyn Builder>,
    sandbox: PathBuf,
    extension: String,
    classpath: Vec<PathBuf>,
    built: HashMap<ArtifactKey, Load>,
    /// Current definition per (unit, mode).
    current: HashMap<(String, BuildMode), Artifact>,
    reloadable: BTreeSet<String>,
    active: Arc<Mutex<Option<Artifact>>>,
    stats: LoaderStats,
}

impl ArtifactLoader {
    pub fn new(
        builder: Arc<dyn Builder>,
        sandbox: impl Into<PathBuf>,
        extension: impl Into<String>,
        classpath: Vec<PathBuf>,
    ) -> Self {
        Self {
            builder,
            sandbox: sandbox.into(),
            extension: extension.into(),
            classpath,
            built: HashMap::new(),
            current: HashMap::new(),
            reloadable: BTreeSet::new(),
            active: Arc::new(Mutex::new(None)),
            stats: LoaderStats::default(),
        }
    }

    pub fn sandbox(&self) -> &Path {
        &self.sandbox
    }

    pub fn stats(&self) -> LoaderStats {
        self.stats
    }

    pub fn is_reloadable(&self, unit: &str) -> bool {
        self.reloadable.contains(unit)
    }

    pub fn mark_reloadable(&mut self, unit: impl Into<String>) {
        self.reloadable.insert(unit.into());
    }

    /// Marks every source unit found under `dir` (relative names resolved
    /// against the sandbox root) as reloadable. Returns how many units were
    /// newly marked.
    pub fn rescan(&mut self, dir: &Path) -> anyhow::Result<usize> {
        let build_dir = self.sandbox.join(BUILD_DIR_NAME);
        let mut marked = 0;
        let mut dir_worklist: Vec<PathBuf> = vec![dir.to_path_buf()];
        while let Some(dir) = dir_worklist.pop() {
            let entries = std::fs::read_dir(&dir)
                .with_context(|| format!("rescanning {}", dir.display()))?;
            for entry in entries {
                let path = entry?.path();
                if path.is_dir() {
                    if path != build_dir {
                        dir_worklist.push(path);
                    }
                    continue;
                }
                if path.extension().and_then(|e| e.to_str()) != Some(self.extension.as_str()) {
                    continue;
                }
                if let Some(unit) = self.unit_name_for(&path) {
                    if self.reloadable.insert(unit) {
                        marked += 1;
                    }
                }
            }
        }
        log::debug!(
            "ArtifactLoader::rescan; dir: {} newly reloadable: {}",
            dir.display(),
            marked
        );
        Ok(marked)
    }

    fn unit_name_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.sandbox).ok()?.with_extension("");
        let parts: Vec<&str> = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<Vec<&str>>>()?;
        Some(parts.join("."))
    }

    fn source_of(&self, unit: &str) -> PathBuf {
        Program::new(&self.sandbox, unit)
            .with_extension(&self.extension)
            .file_path()
    }

    /// Returns the artifact for `unit`, building it only when no suitable
    /// cached build exists.
    pub fn load(&mut self, unit: &str, mode: BuildMode) -> anyhow::Result<Load> {
        if !self.is_reloadable(unit) {
            if let Some(artifact) = self.current.get(&(unit.to_string(), mode)) {
                self.stats.cache_hits += 1;
                return Ok(Load::Ready(artifact.clone()));
            }
        }
        let key = self.key_for(unit, mode)?;
        if let Some(load) = self.built.get(&key).cloned() {
            self.stats.cache_hits += 1;
            log::trace!(
                "ArtifactLoader::load; cache hit for {} ({}, {})",
                unit,
                mode,
                key.digest.short()
            );
            if let Load::Ready(artifact) = &load {
                self.current
                    .insert((unit.to_string(), mode), artifact.clone());
            }
            return Ok(load);
        }
        self.build(key)
    }

    /// Rebuilds `unit` unconditionally, dropping cached builds of it and of
    /// every other reloadable unit.
    pub fn reload(&mut self, unit: &str, mode: BuildMode) -> anyhow::Result<Load> {
        if !self.is_reloadable(unit) {
            return Err(LoaderError::NotReloadable(unit.to_string()).into());
        }
        let before = self.built.len() + self.current.len();
        let reloadable = &self.reloadable;
        self.built
            .retain(|k, _| k.unit != unit && !reloadable.contains(&k.unit));
        self.current
            .retain(|(u, _), _| u != unit && !reloadable.contains(u));
        let evicted = before - (self.built.len() + self.current.len());
        self.stats.evictions += evicted;
        log::debug!(
            "ArtifactLoader::reload; unit: {} evicted: {}",
            unit,
            evicted
        );
        let key = self.key_for(unit, mode)?;
        self.build(key)
    }

    fn key_for(&self, unit: &str, mode: BuildMode) -> anyhow::Result<ArtifactKey> {
        let source = self.source_of(unit);
        let digest = CodeDigest::of_file(&source)
            .with_context(|| format!("digesting {}", source.display()))?;
        Ok(ArtifactKey {
            unit: unit.to_string(),
            mode,
            digest,
        })
    }

    fn build(&mut self, key: ArtifactKey) -> anyhow::Result<Load> {
        let source = self.source_of(&key.unit);
        let output_dir = self
            .sandbox
            .join(BUILD_DIR_NAME)
            .join(&key.unit)
            .join(format!("{}-{}", key.mode, key.digest.short()));
        if output_dir.exists() {
            std::fs::remove_dir_all(&output_dir)
                .with_context(|| format!("clearing {}", output_dir.display()))?;
        }
        std::fs::create_dir_all(&output_dir)
            .with_context(|| format!("creating {}", output_dir.display()))?;

        let request = BuildRequest {
            unit: &key.unit,
            source: &source,
            sandbox: &self.sandbox,
            output_dir: &output_dir,
            classpath: &self.classpath,
            mode: key.mode,
        };
        let start = Instant::now();
        let outcome = self.builder.build(&request)?;
        let elapsed = start.elapsed();

        let load = match outcome {
            BuildOutcome::Built => {
                self.stats.builds += 1;
                log::info!(
                    "ArtifactLoader::build; built {} ({}) in {:?}",
                    key.unit,
                    key.mode,
                    elapsed
                );
                let mut classpath = vec![output_dir.clone()];
                classpath.extend(self.classpath.iter().cloned());
                let artifact = Artifact {
                    unit: key.unit.clone(),
                    mode: key.mode,
                    digest: key.digest,
                    output_dir,
                    classpath,
                };
                self.current
                    .insert((key.unit.clone(), key.mode), artifact.clone());
                Load::Ready(artifact)
            }
            BuildOutcome::Failed { diagnostics } => {
                self.stats.build_failures += 1;
                log::info!(
                    "ArtifactLoader::build; {} ({}) failed in {:?}",
                    key.unit,
                    key.mode,
                    elapsed
                );
                log::debug!("ArtifactLoader::build; diagnostics: {}", diagnostics);
                Load::Failed { diagnostics }
            }
        };
        self.built.insert(key, load.clone());
        Ok(load)
    }

    /// The artifact the current check runs against, if any.
    pub fn active(&self) -> Option<Artifact> {
        lock_slot(&self.active).clone()
    }

    /// Makes `artifact` the active one until the returned guard is dropped,
    /// at which point the previous association comes back.
    pub fn activate(&self, artifact: Artifact) -> ActiveArtifact {
        let previous = lock_slot(&self.active).replace(artifact);
        ActiveArtifact {
            slot: Arc::clone(&self.active),
            previous,
        }
    }
}

/// A panic while the slot was held cannot leave it half-written, so a
/// poisoned lock is still usable.
fn lock_slot(slot: &Mutex<Option<Artifact>>) -> MutexGuard<'_, Option<Artifact>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct ActiveArtifact {
    slot: Arc<Mutex<Option<Artifact>>>,
    previous: Option<Artifact>,
}

impl Drop for ActiveArtifact {
    fn drop(&mut self) {
        *lock_slot(&self.slot) = self.previous.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails any source containing "broken"; counts invocations.
    struct CountingBuilder {
        calls: AtomicUsize,
    }

    impl Builder for CountingBuilder {
        fn build(&self, request: &BuildRequest<'_>) -> anyhow::Result<BuildOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let text = std::fs::read_to_string(request.source)?;
            if text.contains("broken") {
                return Ok(BuildOutcome::Failed {
                    diagnostics: "syntax error".to_string(),
                });
            }
            std::fs::write(request.output_dir.join("out.txt"), text)?;
            Ok(BuildOutcome::Built)
        }
    }

    fn setup() -> (tempfile::TempDir, Arc<CountingBuilder>, ArtifactLoader) {
        let scratch = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(scratch.path().join("demo")).unwrap();
        std::fs::write(scratch.path().join("demo/Calc.java"), "class Calc { int a; }").unwrap();
        std::fs::write(scratch.path().join("demo/Util.java"), "class Util {}").unwrap();
        let builder = Arc::new(CountingBuilder {
            calls: AtomicUsize::new(0),
        });
        let loader = ArtifactLoader::new(builder.clone(), scratch.path(), "java", vec![]);
        (scratch, builder, loader)
    }

    fn calls(builder: &CountingBuilder) -> usize {
        builder.calls.load(Ordering::SeqCst)
    }

    #[test]
    fn test_non_reloadable_unit_is_built_once() {
        let (scratch, builder, mut loader) = setup();
        let first = loader.load("demo.Util", BuildMode::Plain).unwrap();
        std::fs::write(scratch.path().join("demo/Util.java"), "class Util { int b; }").unwrap();
        let second = loader.load("demo.Util", BuildMode::Plain).unwrap();
        assert_eq!(first, second);
        assert_eq!(calls(&builder), 1);
        // Another mode is a separate artifact.
        loader.load("demo.Util", BuildMode::RuntimeChecked).unwrap();
        assert_eq!(calls(&builder), 2);
    }

    #[test]
    fn test_reloadable_unit_follows_its_digest() {
        let (scratch, builder, mut loader) = setup();
        loader.mark_reloadable("demo.Calc");
        let first = loader.load("demo.Calc", BuildMode::Plain).unwrap();

        // Layout-only edits keep the digest and hit the cache.
        std::fs::write(scratch.path().join("demo/Calc.java"), "class Calc {\n  int a;\n}").unwrap();
        assert_eq!(loader.load("demo.Calc", BuildMode::Plain).unwrap(), first);
        assert_eq!(calls(&builder), 1);

        std::fs::write(scratch.path().join("demo/Calc.java"), "class Calc { int z; }").unwrap();
        let second = loader.load("demo.Calc", BuildMode::Plain).unwrap();
        assert_ne!(first, second);
        assert_eq!(calls(&builder), 2);
        assert_eq!(loader.stats().cache_hits, 1);
    }

    #[test]
    fn test_failed_builds_are_cached_too() {
        let (scratch, builder, mut loader) = setup();
        loader.mark_reloadable("demo.Calc");
        std::fs::write(scratch.path().join("demo/Calc.java"), "broken").unwrap();
        for _ in 0..2 {
            assert!(matches!(
                loader.load("demo.Calc", BuildMode::Plain).unwrap(),
                Load::Failed { .. }
            ));
        }
        assert_eq!(calls(&builder), 1);
        assert_eq!(loader.stats().build_failures, 1);
    }

    #[test]
    fn test_reload_requires_mark() {
        let (_scratch, _builder, mut loader) = setup();
        let err = loader.reload("demo.Util", BuildMode::Plain).unwrap_err();
        assert_eq!(
            err.downcast_ref::<LoaderError>(),
            Some(&LoaderError::NotReloadable("demo.Util".to_string()))
        );
    }

    #[test]
    fn test_reload_forces_rebuild_and_evicts_reloadables() {
        let (scratch, builder, mut loader) = setup();
        assert_eq!(loader.rescan(scratch.path()).unwrap(), 2);
        loader.load("demo.Calc", BuildMode::Plain).unwrap();
        loader.load("demo.Util", BuildMode::Plain).unwrap();
        assert_eq!(calls(&builder), 2);

        loader.reload("demo.Calc", BuildMode::Plain).unwrap();
        assert_eq!(calls(&builder), 3);
        // Util was evicted as a reloadable unit and rebuilds on next load.
        loader.load("demo.Util", BuildMode::Plain).unwrap();
        assert_eq!(calls(&builder), 4);
        assert!(loader.stats().evictions >= 2);
    }

    #[test]
    fn test_rescan_ignores_build_outputs() {
        let (scratch, _builder, mut loader) = setup();
        loader.load("demo.Util", BuildMode::Plain).unwrap();
        std::fs::write(
            scratch.path().join(BUILD_DIR_NAME).join("Stray.java"),
            "class Stray {}",
        )
        .unwrap();
        loader.rescan(scratch.path()).unwrap();
        assert!(loader.is_reloadable("demo.Calc"));
        assert!(!loader.is_reloadable(".build.Stray"));
    }

    #[test]
    fn test_activation_is_restored() {
        let (_scratch, _builder, mut loader) = setup();
        let Load::Ready(util) = loader.load("demo.Util", BuildMode::Plain).unwrap() else {
            panic!("expected a build");
        };
        let Load::Ready(calc) = loader.load("demo.Calc", BuildMode::Plain).unwrap() else {
            panic!("expected a build");
        };
        assert_eq!(loader.active(), None);
        {
            let _outer = loader.activate(util.clone());
            {
                let _inner = loader.activate(calc.clone());
                assert_eq!(loader.active(), Some(calc));
            }
            assert_eq!(loader.active(), Some(util));
        }
        assert_eq!(loader.active(), None);
    }

    #[test]
    fn test_activation_survives_a_poisoned_slot() {
        let (_scratch, _builder, mut loader) = setup();
        let Load::Ready(util) = loader.load("demo.Util", BuildMode::Plain).unwrap() else {
            panic!("expected a build");
        };
        let slot = Arc::clone(&loader.active);
        let poisoner = std::thread::spawn(move || {
            let _held = slot.lock().unwrap();
            panic!("poison the active slot");
        });
        assert!(poisoner.join().is_err());
        assert!(loader.active.is_poisoned());

        assert_eq!(loader.active(), None);
        {
            let _active = loader.activate(util.clone());
            assert_eq!(loader.active(), Some(util));
        }
        assert_eq!(loader.active(), None);
    }
}
