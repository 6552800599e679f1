// SPDX-License-Identifier: Apache-2.0

use crate::digest::CodeDigest;
use crate::mutation::{Mutant, MutationId};
use crate::program::Program;

/// A program variant under consideration, with its derivation history.
///
/// Candidates are immutable. [`Candidate::derive`] builds a child whose
/// history is the parent's plus exactly one mutation.
#[derive(Debug, Clone)]
pub struct Candidate {
    program: Program,
    routine: String,
    mutations: Vec<MutationId>,
}

impl Candidate {
    pub fn initial(program: Program, routine: impl Into<String>) -> Self {
        Self {
            program,
            routine: routine.into(),
            mutations: Vec::new(),
        }
    }

    pub fn derive(&self, mutant: Mutant) -> Candidate {
        let mut mutations = Vec::with_capacity(self.mutations.len() + 1);
        mutations.extend(self.mutations.iter().cloned());
        mutations.push(mutant.id);
        Candidate {
            program: mutant.program,
            routine: self.routine.clone(),
            mutations,
        }
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn routine(&self) -> &str {
        &self.routine
    }

    pub fn mutations(&self) -> &[MutationId] {
        &self.mutations
    }

    pub fn depth(&self) -> usize {
        self.mutations.len()
    }

    pub fn digest(&self) -> std::io::Result<CodeDigest> {
        self.program.digest()
    }
}
