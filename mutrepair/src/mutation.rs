// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::program::Program;

/// Identifies one atomic transformation: operator kind plus location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MutationId {
    pub operator: String,
    #[serde(default)]
    pub line: Option<u32>,
    #[serde(default)]
    pub routine: Option<String>,
}

impl MutationId {
    pub fn new(operator: impl Into<String>, line: Option<u32>, routine: Option<String>) -> Self {
        Self {
            operator: operator.into(),
            line,
            routine,
        }
    }
}

impl fmt::Display for MutationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.routine, self.line) {
            (Some(routine), Some(line)) => {
                write!(f, "{} in method {} in line {}", self.operator, routine, line)
            }
            (Some(routine), None) => write!(f, "{} in method {}", self.operator, routine),
            (None, Some(line)) => write!(f, "{} in line {}", self.operator, line),
            (None, None) => write!(f, "{} (not a method mutation)", self.operator),
        }
    }
}

/// A variant produced by a [`MutationGenerator`], already written to disk.
#[derive(Debug, Clone)]
pub struct Mutant {
    pub program: Program,
    pub id: MutationId,
}

/// Produces single-step syntactic variants of a program's routine.
///
/// Implementations write each variant below `out_dir` and may return an
/// empty list. An `Err` means the generator itself could not run and aborts
/// the repair.
pub trait MutationGenerator: Send + Sync {
    fn generate(
        &self,
        program: &Program,
        routine: &str,
        out_dir: &Path,
    ) -> anyhow::Result<Vec<Mutant>>;
}
