// SPDX-License-Identifier: Apache-2.0

//! Deciding whether a candidate is an accepted fix.
//!
//! Both strategies stage the candidate the same way through a [`Workbench`]:
//! copy its source into the sandbox, build it, and make the build the active
//! artifact. Guards undo the placement and the activation on every exit path.
//!
//! * Direct: verify every candidate that builds.
//! * Counterexample-guided: replay the counterexamples gathered so far on a
//!   runtime-checked build first, and only verify candidates that survive
//!   all of them. Every new counterexample the verifier reports is cached.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::candidate::Candidate;
use crate::counterexample::{CounterExample, CounterExampleCache};
use crate::executor::ExecutionOutcome;
use crate::loader::{ActiveArtifact, Artifact, ArtifactLoader, BuildMode, Load};
use crate::runtime::RuntimeCheck;
use crate::sandbox::Placement;
use crate::scope::Scope;
use crate::verify::{VerificationOracle, VerificationRequest, Verdict};

/// Selects the success check for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckStrategy {
    #[default]
    Direct,
    RuntimeAssisted,
}

/// Sandbox plus build cache shared by every check in a run.
pub struct Workbench {
    sandbox: PathBuf,
    loader: ArtifactLoader,
}

/// A candidate placed and built inside the sandbox.
pub struct Staged {
    pub artifact: Artifact,
    placement: Placement,
    _active: ActiveArtifact,
}

impl Staged {
    pub fn source(&self) -> &Path {
        self.placement.path()
    }
}

pub enum Stage {
    Ready(Staged),
    Failed(String),
}

impl Workbench {
    pub fn new(loader: ArtifactLoader) -> Self {
        Self {
            sandbox: loader.sandbox().to_path_buf(),
            loader,
        }
    }

    pub fn sandbox(&self) -> &Path {
        &self.sandbox
    }

    pub fn loader(&self) -> &ArtifactLoader {
        &self.loader
    }

    pub fn loader_mut(&mut self) -> &mut ArtifactLoader {
        &mut self.loader
    }

    /// Places `candidate` in the sandbox and builds it in `mode`.
    ///
    /// Trouble with the candidate itself (its file cannot be copied, or it
    /// does not compile) is a [`Stage::Failed`]. `Err` means the builder
    /// could not run.
    pub fn stage(&mut self, candidate: &Candidate, mode: BuildMode) -> anyhow::Result<Stage> {
        let program = candidate.program();
        let placement = match Placement::install(&self.sandbox, program) {
            Ok(p) => p,
            Err(e) => {
                log::warn!(
                    "Workbench::stage; could not place {}: {}",
                    program.file_path().display(),
                    e
                );
                return Ok(Stage::Failed(format!("could not place candidate: {}", e)));
            }
        };
        match self.loader.load(program.class_name(), mode)? {
            Load::Ready(artifact) => {
                let active = self.loader.activate(artifact.clone());
                Ok(Stage::Ready(Staged {
                    artifact,
                    placement,
                    _active: active,
                }))
            }
            Load::Failed { diagnostics } => Ok(Stage::Failed(diagnostics)),
        }
    }
}

/// What a check concluded about one candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckVerdict {
    Accepted,
    BuildFailed(String),
    /// Builds, but does not meet the specification's static requirements.
    Malformed,
    /// The verifier found a violation; `cached` tells whether its
    /// counterexample was new to the cache.
    Refuted { cached: bool },
    /// A cached counterexample still falsifies the candidate.
    Pruned {
        example: usize,
        outcome: ExecutionOutcome,
    },
    NotDecidable(String),
}

impl CheckVerdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, CheckVerdict::Accepted)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckStats {
    pub checked: usize,
    pub accepted: usize,
    pub build_failures: usize,
    pub malformed: usize,
    pub oracle_calls: usize,
    pub refuted: usize,
    pub not_decidable: usize,
    pub replays: usize,
    pub pruned: usize,
}

/// The subject-level facts every verification request carries.
#[derive(Debug, Clone, Copy)]
pub struct CheckTarget<'a> {
    pub candidate: &'a Candidate,
    pub relevant_classes: &'a [String],
    pub scope: Option<&'a Scope>,
}

pub struct DirectVerification {
    verifier: Arc<dyn VerificationOracle>,
    stats: CheckStats,
}

pub struct GuidedVerification {
    verifier: Arc<dyn VerificationOracle>,
    runtime: RuntimeCheck,
    cache: CounterExampleCache,
    stats: CheckStats,
}

pub enum SuccessCheck {
    Direct(DirectVerification),
    CounterExampleGuided(GuidedVerification),
}

impl SuccessCheck {
    pub fn direct(verifier: Arc<dyn VerificationOracle>) -> Self {
        SuccessCheck::Direct(DirectVerification {
            verifier,
            stats: CheckStats::default(),
        })
    }

    pub fn guided(verifier: Arc<dyn VerificationOracle>, runtime: RuntimeCheck) -> Self {
        SuccessCheck::CounterExampleGuided(GuidedVerification {
            verifier,
            runtime,
            cache: CounterExampleCache::new(),
            stats: CheckStats::default(),
        })
    }

    pub fn strategy(&self) -> CheckStrategy {
        match self {
            SuccessCheck::Direct(_) => CheckStrategy::Direct,
            SuccessCheck::CounterExampleGuided(_) => CheckStrategy::RuntimeAssisted,
        }
    }

    pub fn stats(&self) -> CheckStats {
        match self {
            SuccessCheck::Direct(d) => d.stats,
            SuccessCheck::CounterExampleGuided(g) => g.stats,
        }
    }

    pub fn cache(&self) -> Option<&CounterExampleCache> {
        match self {
            SuccessCheck::Direct(_) => None,
            SuccessCheck::CounterExampleGuided(g) => Some(&g.cache),
        }
    }

    /// Seeds the counterexample cache; a no-op for direct verification.
    pub fn remember(&mut self, example: CounterExample) -> bool {
        match self {
            SuccessCheck::Direct(_) => false,
            SuccessCheck::CounterExampleGuided(g) => g.cache.insert(example),
        }
    }

    pub fn check(
        &mut self,
        bench: &mut Workbench,
        target: CheckTarget<'_>,
    ) -> anyhow::Result<CheckVerdict> {
        let start = Instant::now();
        let verdict = match self {
            SuccessCheck::Direct(d) => d.check(bench, target),
            SuccessCheck::CounterExampleGuided(g) => g.check(bench, target),
        }?;
        log::info!(
            "SuccessCheck::check; mutations: {} verdict: {:?} in {:?}",
            target.candidate.depth(),
            verdict,
            start.elapsed()
        );
        Ok(verdict)
    }
}

/// Runs the verifier on a staged candidate and tallies the result.
fn verify_staged(
    verifier: &dyn VerificationOracle,
    stats: &mut CheckStats,
    bench: &Workbench,
    staged: &Staged,
    target: CheckTarget<'_>,
) -> anyhow::Result<Result<Verdict, CheckVerdict>> {
    let request = VerificationRequest {
        candidate: target.candidate,
        source: staged.source(),
        sandbox: bench.sandbox(),
        relevant_classes: target.relevant_classes,
        scope: target.scope,
    };
    if !verifier.conforms(&request)? {
        stats.malformed += 1;
        return Ok(Err(CheckVerdict::Malformed));
    }
    stats.oracle_calls += 1;
    let start = Instant::now();
    let verdict = verifier.check(&request)?;
    log::debug!(
        "verify_staged; verdict: {} in {:?}",
        match &verdict {
            Verdict::Unsat => "unsat",
            Verdict::Sat(_) => "sat",
            Verdict::NotDecidable(_) => "not decidable",
        },
        start.elapsed()
    );
    Ok(Ok(verdict))
}

impl DirectVerification {
    fn check(
        &mut self,
        bench: &mut Workbench,
        target: CheckTarget<'_>,
    ) -> anyhow::Result<CheckVerdict> {
        self.stats.checked += 1;
        let staged = match bench.stage(target.candidate, BuildMode::Plain)? {
            Stage::Ready(staged) => staged,
            Stage::Failed(diagnostics) => {
                self.stats.build_failures += 1;
                return Ok(CheckVerdict::BuildFailed(diagnostics));
            }
        };
        let verdict = match verify_staged(
            self.verifier.as_ref(),
            &mut self.stats,
            bench,
            &staged,
            target,
        )? {
            Ok(v) => v,
            Err(rejected) => return Ok(rejected),
        };
        Ok(match verdict {
            Verdict::Unsat => {
                self.stats.accepted += 1;
                CheckVerdict::Accepted
            }
            Verdict::Sat(_) => {
                self.stats.refuted += 1;
                CheckVerdict::Refuted { cached: false }
            }
            Verdict::NotDecidable(reason) => {
                self.stats.not_decidable += 1;
                CheckVerdict::NotDecidable(reason)
            }
        })
    }
}

impl GuidedVerification {
    fn check(
        &mut self,
        bench: &mut Workbench,
        target: CheckTarget<'_>,
    ) -> anyhow::Result<CheckVerdict> {
        self.stats.checked += 1;
        let staged = match bench.stage(target.candidate, BuildMode::RuntimeChecked)? {
            Stage::Ready(staged) => staged,
            Stage::Failed(diagnostics) => {
                self.stats.build_failures += 1;
                return Ok(CheckVerdict::BuildFailed(diagnostics));
            }
        };

        for (index, example) in self.cache.iter().enumerate() {
            self.stats.replays += 1;
            let outcome = self
                .runtime
                .replay(&staged.artifact, target.candidate, example);
            if outcome.falsifies() {
                self.stats.pruned += 1;
                return Ok(CheckVerdict::Pruned {
                    example: index,
                    outcome,
                });
            }
        }

        let verdict = match verify_staged(
            self.verifier.as_ref(),
            &mut self.stats,
            bench,
            &staged,
            target,
        )? {
            Ok(v) => v,
            Err(rejected) => return Ok(rejected),
        };
        Ok(match verdict {
            Verdict::Unsat => {
                self.stats.accepted += 1;
                CheckVerdict::Accepted
            }
            Verdict::Sat(example) => {
                self.stats.refuted += 1;
                CheckVerdict::Refuted {
                    cached: self.cache.insert(example),
                }
            }
            Verdict::NotDecidable(reason) => {
                self.stats.not_decidable += 1;
                CheckVerdict::NotDecidable(reason)
            }
        })
    }
}
