// SPDX-License-Identifier: Apache-2.0

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use mutrepair_search::SearchProblem;

use crate::candidate::Candidate;
use crate::config::random_token;
use crate::error::RepairError;
use crate::mutation::MutationGenerator;
use crate::program::Program;
use crate::scope::Scope;
use crate::strategy::{CheckTarget, CheckVerdict, SuccessCheck, Workbench};

const MUTANT_DIR_TOKEN_LEN: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProblemStats {
    pub expansions: usize,
    pub generated: usize,
    pub duplicates: usize,
    pub unreadable: usize,
}

/// Repair of one routine as a search problem over candidates.
///
/// The initial state is the unmodified subject. Successors are the
/// mutation generator's variants, one mutation deeper and free of
/// code-equal duplicates. Success is decided by the configured
/// [`SuccessCheck`].
pub struct RepairSearchProblem {
    subject: Program,
    routine: String,
    mutator: Arc<dyn MutationGenerator>,
    mutants_root: PathBuf,
    check: SuccessCheck,
    bench: Workbench,
    relevant_classes: Vec<String>,
    scope: Option<Scope>,
    stats: ProblemStats,
}

impl RepairSearchProblem {
    pub fn new(
        subject: Program,
        routine: impl Into<String>,
        mutator: Arc<dyn MutationGenerator>,
        check: SuccessCheck,
        bench: Workbench,
        mutants_root: impl Into<PathBuf>,
    ) -> Result<Self, RepairError> {
        let routine = routine.into();
        if !subject.has_routine(&routine)? {
            return Err(RepairError::RoutineNotFound {
                class_name: subject.class_name().to_string(),
                routine,
            });
        }
        let relevant_classes = vec![subject.class_name().to_string()];
        Ok(Self {
            subject,
            routine,
            mutator,
            mutants_root: mutants_root.into(),
            check,
            bench,
            relevant_classes,
            scope: None,
            stats: ProblemStats::default(),
        })
    }

    /// Adds types the verifier should consider alongside the subject.
    pub fn with_dependencies(mut self, dependencies: &[String]) -> Self {
        for dep in dependencies {
            if !self.relevant_classes.contains(dep) {
                self.relevant_classes.push(dep.clone());
            }
        }
        self
    }

    pub fn with_scope(mut self, scope: Option<Scope>) -> Self {
        self.scope = scope;
        self
    }

    pub fn relevant_classes(&self) -> &[String] {
        &self.relevant_classes
    }

    pub fn stats(&self) -> ProblemStats {
        self.stats
    }

    pub fn success_check(&self) -> &SuccessCheck {
        &self.check
    }

    pub fn success_check_mut(&mut self) -> &mut SuccessCheck {
        &mut self.check
    }

    pub fn workbench(&self) -> &Workbench {
        &self.bench
    }

    /// Fresh output directory for the variants of `candidate`.
    fn mutants_dir_for(&self, candidate: &Candidate) -> anyhow::Result<PathBuf> {
        let mut dir = self.mutants_root.join(random_token(MUTANT_DIR_TOKEN_LEN));
        if candidate.depth() > 0 {
            let digest = candidate
                .digest()
                .with_context(|| format!("digesting {}", candidate.program().file_path().display()))?;
            dir.push(format!("from_{}", digest.short()));
        }
        std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
        Ok(dir)
    }
}

/// Deletes `file` and then every directory between it and `stop` that is
/// left empty.
fn discard_mutant(file: &Path, stop: &Path) {
    if let Err(e) = std::fs::remove_file(file) {
        log::warn!("discard_mutant; could not remove {}: {}", file.display(), e);
        return;
    }
    let mut dir = file.parent();
    while let Some(d) = dir {
        if d == stop || !d.starts_with(stop) || std::fs::remove_dir(d).is_err() {
            break;
        }
        dir = d.parent();
    }
}

impl SearchProblem for RepairSearchProblem {
    type State = Candidate;
    type Error = anyhow::Error;

    fn initial_state(&mut self) -> anyhow::Result<Candidate> {
        Ok(Candidate::initial(self.subject.clone(), self.routine.clone()))
    }

    fn successors(&mut self, candidate: &Candidate) -> anyhow::Result<Vec<Candidate>> {
        self.stats.expansions += 1;
        let out_dir = self.mutants_dir_for(candidate)?;
        let mutants = self
            .mutator
            .generate(candidate.program(), &self.routine, &out_dir)?;
        let generated = mutants.len();

        let mut seen = HashSet::new();
        let mut successors = Vec::with_capacity(mutants.len());
        for mutant in mutants {
            let file = mutant.program.file_path();
            let digest = match mutant.program.digest() {
                Ok(d) => d,
                Err(e) => {
                    log::warn!(
                        "RepairSearchProblem::successors; skipping unreadable mutant {}: {}",
                        file.display(),
                        e
                    );
                    self.stats.unreadable += 1;
                    continue;
                }
            };
            if !seen.insert(digest) {
                log::debug!(
                    "RepairSearchProblem::successors; duplicate {} ({})",
                    mutant.id,
                    digest.short()
                );
                self.stats.duplicates += 1;
                discard_mutant(&file, &out_dir);
                continue;
            }
            successors.push(candidate.derive(mutant));
        }
        self.stats.generated += successors.len();
        log::info!(
            "RepairSearchProblem::successors; depth: {} generated: {} kept: {}",
            candidate.depth(),
            generated,
            successors.len()
        );
        Ok(successors)
    }

    fn is_successful(&mut self, candidate: &Candidate) -> anyhow::Result<bool> {
        let target = CheckTarget {
            candidate,
            relevant_classes: &self.relevant_classes,
            scope: self.scope.as_ref(),
        };
        let verdict = self.check.check(&mut self.bench, target)?;
        if let CheckVerdict::Accepted = verdict {
            log::info!(
                "RepairSearchProblem::is_successful; accepted {} after {} mutation(s)",
                candidate.program().file_path().display(),
                candidate.depth()
            );
        }
        Ok(verdict.is_accepted())
    }
}
