// SPDX-License-Identifier: Apache-2.0

//! One complete repair run: validate the subject, set up the sandbox, search,
//! and report.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use mutrepair_search::{
    BoundedSearchEngine, SearchEngine, SearchReport, SearchStrategy, DEFAULT_MAX_DEPTH,
};

use crate::candidate::Candidate;
use crate::config::RepairConfig;
use crate::error::RepairError;
use crate::executor::TimeoutExecutor;
use crate::loader::{ArtifactLoader, BuildMode, Load, LoaderStats};
use crate::problem::{ProblemStats, RepairSearchProblem};
use crate::program::Program;
use crate::runtime::RuntimeCheck;
use crate::sandbox::Sandbox;
use crate::scope::Scope;
use crate::strategy::{CheckStats, CheckStrategy, SuccessCheck, Workbench};
use crate::tools::Toolchain;
use crate::verify::VerificationRequest;

#[derive(Debug, Clone)]
pub struct RepairRequest {
    pub source_root: PathBuf,
    pub class_name: String,
    pub routine: String,
    pub max_depth: usize,
    pub strategy: SearchStrategy,
    pub check: CheckStrategy,
    pub scope: Option<Scope>,
    /// Types besides the subject that the verifier should consider.
    pub dependencies: Vec<String>,
    /// Leave the sandbox on disk after the run.
    pub keep_sandbox: bool,
}

impl RepairRequest {
    pub fn new(
        source_root: impl Into<PathBuf>,
        class_name: impl Into<String>,
        routine: impl Into<String>,
    ) -> Self {
        Self {
            source_root: source_root.into(),
            class_name: class_name.into(),
            routine: routine.into(),
            max_depth: DEFAULT_MAX_DEPTH,
            strategy: SearchStrategy::default(),
            check: CheckStrategy::default(),
            scope: None,
            dependencies: vec![],
            keep_sandbox: false,
        }
    }
}

/// Counters and timings of a finished search.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub search: SearchReport,
    pub problem: ProblemStats,
    pub checks: CheckStats,
    /// Build cache counters, subject validation included.
    pub builds: LoaderStats,
    pub cached_counterexamples: usize,
    pub started: SystemTime,
    pub finished: SystemTime,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub enum RepairOutcome {
    Repaired {
        solution: Candidate,
        /// Where the fixed source can be picked up.
        location: PathBuf,
        summary: RunSummary,
    },
    NotRepaired {
        summary: RunSummary,
    },
}

impl RepairOutcome {
    pub fn is_repaired(&self) -> bool {
        matches!(self, RepairOutcome::Repaired { .. })
    }

    pub fn summary(&self) -> &RunSummary {
        match self {
            RepairOutcome::Repaired { summary, .. } | RepairOutcome::NotRepaired { summary } => {
                summary
            }
        }
    }
}

/// `HH:MM:SS.mmm` for a duration.
pub fn format_duration(d: Duration) -> String {
    let millis = d.as_millis();
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        millis / 3_600_000,
        (millis / 60_000) % 60,
        (millis / 1000) % 60,
        millis % 1000
    )
}

/// UTC wall-clock time of day, `HH:MM:SS.mmm`.
fn format_clock(t: SystemTime) -> String {
    let since_epoch = t.duration_since(UNIX_EPOCH).unwrap_or_default();
    let of_day = Duration::from_millis((since_epoch.as_millis() % 86_400_000) as u64);
    format!("{} UTC", format_duration(of_day))
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "*** Search started at {}", format_clock(self.started))?;
        writeln!(f, "*** Search finished at {}", format_clock(self.finished))?;
        writeln!(f, "*** Used time: {}", format_duration(self.elapsed))?;
        write!(
            f,
            "*** Stats: {} | candidates kept: {}, duplicates dropped: {}, builds: {}, build cache hits: {}, build failures: {}, verifier calls: {}, pruned by replay: {}, cached counterexamples: {}",
            self.search,
            self.problem.generated,
            self.problem.duplicates,
            self.builds.builds,
            self.builds.cache_hits,
            self.checks.build_failures,
            self.checks.oracle_calls,
            self.checks.pruned,
            self.cached_counterexamples
        )
    }
}

impl fmt::Display for RepairOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepairOutcome::Repaired {
                solution,
                location,
                summary,
            } => {
                writeln!(f, "*** FOUND SOLUTION! Get it from: {}", location.display())?;
                writeln!(f, "*** Mutations that produced the fix: ")?;
                for mutation in solution.mutations() {
                    writeln!(f, "{}", mutation)?;
                }
                write!(f, "{}", summary)
            }
            RepairOutcome::NotRepaired { summary } => {
                writeln!(
                    f,
                    "*** COULD NOT REPAIR PROGRAM. Try increasing depth in the search for solutions"
                )?;
                write!(f, "{}", summary)
            }
        }
    }
}

pub struct ProgramRepairer {
    config: RepairConfig,
    toolchain: Toolchain,
}

impl ProgramRepairer {
    pub fn new(config: RepairConfig, toolchain: Toolchain) -> Self {
        Self { config, toolchain }
    }

    pub fn config(&self) -> &RepairConfig {
        &self.config
    }

    fn validate(&self, request: &RepairRequest) -> Result<Program, RepairError> {
        if !Program::is_valid_class_name(&request.class_name) {
            return Err(RepairError::InvalidArgument(format!(
                "'{}' is not a qualified class name",
                request.class_name
            )));
        }
        if request.routine.trim().is_empty() {
            return Err(RepairError::InvalidArgument(
                "routine name must not be empty".to_string(),
            ));
        }
        if let Some(bad) = request
            .dependencies
            .iter()
            .find(|d| !Program::is_valid_class_name(d))
        {
            return Err(RepairError::InvalidArgument(format!(
                "dependency '{}' is not a qualified class name",
                bad
            )));
        }
        if request.check == CheckStrategy::RuntimeAssisted {
            if self.toolchain.invoker.is_none() {
                return Err(RepairError::Config(
                    "runtime-assisted checking needs tools.replay".to_string(),
                ));
            }
            if !self.toolchain.builder.supports(BuildMode::RuntimeChecked) {
                return Err(RepairError::Config(
                    "runtime-assisted checking needs tools.build_checked".to_string(),
                ));
            }
        }
        let subject = Program::new(&request.source_root, &request.class_name);
        subject.check_readable()?;
        if !subject.has_routine(&request.routine)? {
            return Err(RepairError::RoutineNotFound {
                class_name: request.class_name.clone(),
                routine: request.routine.clone(),
            });
        }
        Ok(subject)
    }

    fn success_check(&self, strategy: CheckStrategy) -> Result<SuccessCheck, RepairError> {
        let verifier = Arc::clone(&self.toolchain.verifier);
        match strategy {
            CheckStrategy::Direct => Ok(SuccessCheck::direct(verifier)),
            CheckStrategy::RuntimeAssisted => {
                let invoker = self.toolchain.invoker.clone().ok_or_else(|| {
                    RepairError::Config("runtime-assisted checking needs tools.replay".to_string())
                })?;
                let executor = TimeoutExecutor::new(self.config.replay_timeout())
                    .with_grace(self.config.replay_grace());
                Ok(SuccessCheck::guided(
                    verifier,
                    RuntimeCheck::new(executor, invoker),
                ))
            }
        }
    }

    /// The unmodified subject must build and conform before any search.
    fn check_subject(
        &self,
        sandbox: &Sandbox,
        loader: &mut ArtifactLoader,
        subject: &Program,
        request: &RepairRequest,
    ) -> Result<(), RepairError> {
        let invalid = |diagnostics: String| RepairError::SubjectInvalid {
            class_name: subject.class_name().to_string(),
            diagnostics,
        };
        let placement = sandbox
            .place(subject)
            .map_err(|e| RepairError::sandbox(sandbox.path(), e))?;
        loader.mark_reloadable(subject.class_name());
        if let Load::Failed { diagnostics } = loader.reload(subject.class_name(), BuildMode::Plain)? {
            return Err(invalid(diagnostics));
        }
        let candidate = Candidate::initial(subject.clone(), request.routine.clone());
        let mut relevant = vec![subject.class_name().to_string()];
        relevant.extend(request.dependencies.iter().cloned());
        let verification = VerificationRequest {
            candidate: &candidate,
            source: placement.path(),
            sandbox: sandbox.path(),
            relevant_classes: &relevant,
            scope: request.scope.as_ref(),
        };
        if !self.toolchain.verifier.conforms(&verification)? {
            return Err(invalid("does not conform to its specification".to_string()));
        }
        Ok(())
    }

    /// Copies the accepted source below the configured output directory.
    fn export(&self, solution: &Candidate) -> Result<PathBuf, RepairError> {
        let source = solution.program().file_path();
        let Some(output) = self.config.output_dir() else {
            return Ok(source);
        };
        let target = output.join(solution.program().class_name_as_path());
        let copy = || -> std::io::Result<()> {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(&source, &target).map(|_| ())
        };
        copy().map_err(|e| {
            RepairError::Search(anyhow::anyhow!(
                "exporting {} to {}: {}",
                source.display(),
                target.display(),
                e
            ))
        })?;
        Ok(target)
    }

    pub fn repair(&self, request: &RepairRequest) -> Result<RepairOutcome, RepairError> {
        log::info!(
            "ProgramRepairer::repair; class: {} routine: {} max_depth: {} strategy: {} check: {:?}",
            request.class_name,
            request.routine,
            request.max_depth,
            request.strategy,
            request.check
        );
        let subject = self.validate(request)?;
        let success_check = self.success_check(request.check)?;

        let sandbox_dir = self.config.sandbox_dir();
        let sandbox =
            Sandbox::create(&sandbox_dir).map_err(|e| RepairError::sandbox(&sandbox_dir, e))?;
        sandbox
            .populate_from(subject.source_root(), &subject.class_name_as_path())
            .map_err(|e| RepairError::sandbox(sandbox.path(), format!("{:#}", e)))?;

        let mut loader = ArtifactLoader::new(
            Arc::clone(&self.toolchain.builder),
            sandbox.path(),
            subject.extension(),
            self.config.support_libs(),
        );
        loader
            .rescan(sandbox.path())
            .map_err(|e| RepairError::sandbox(sandbox.path(), format!("{:#}", e)))?;
        self.check_subject(&sandbox, &mut loader, &subject, request)?;

        let mut problem = RepairSearchProblem::new(
            subject,
            request.routine.clone(),
            Arc::clone(&self.toolchain.mutator),
            success_check,
            Workbench::new(loader),
            self.config.mutants_dir(),
        )?
        .with_dependencies(&request.dependencies)
        .with_scope(request.scope.clone());

        let mut engine = SearchEngine::new(request.strategy, request.max_depth);
        let started = SystemTime::now();
        let clock = Instant::now();
        let found = engine.perform_search(&mut problem)?;
        let summary = RunSummary {
            search: engine.report(),
            problem: problem.stats(),
            checks: problem.success_check().stats(),
            builds: problem.workbench().loader().stats(),
            cached_counterexamples: problem.success_check().cache().map_or(0, |c| c.len()),
            started,
            finished: SystemTime::now(),
            elapsed: clock.elapsed(),
        };
        log::info!(
            "ProgramRepairer::repair; found: {} used time: {}",
            found,
            format_duration(summary.elapsed)
        );

        let outcome = if found {
            let solution = engine
                .solution()
                .map_err(|e| RepairError::Search(e.into()))?
                .clone();
            let location = self.export(&solution)?;
            RepairOutcome::Repaired {
                solution,
                location,
                summary,
            }
        } else {
            RepairOutcome::NotRepaired { summary }
        };

        drop(problem);
        if request.keep_sandbox {
            let kept = sandbox.keep();
            log::info!("ProgramRepairer::repair; sandbox kept at {}", kept.display());
        } else {
            let path = sandbox.path().to_path_buf();
            sandbox
                .close()
                .map_err(|e| RepairError::sandbox(path, e))?;
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case(Duration::ZERO, "00:00:00.000")]
    #[test_case(Duration::from_millis(1_234), "00:00:01.234")]
    #[test_case(Duration::from_millis(3_723_004), "01:02:03.004")]
    fn test_format_duration(d: Duration, want: &str) {
        assert_eq!(format_duration(d), want);
    }
}
