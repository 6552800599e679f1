// SPDX-License-Identifier: Apache-2.0

use std::path::Path;

use crate::candidate::Candidate;
use crate::counterexample::CounterExample;
use crate::scope::Scope;

/// Result of bounded verification of one candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// No violation within the configured bounds.
    Unsat,
    /// The specification is violated; the model is attached.
    Sat(CounterExample),
    /// The verifier does not support some construct in the candidate.
    NotDecidable(String),
}

/// Everything the verifier is told about a staged candidate.
#[derive(Debug, Clone, Copy)]
pub struct VerificationRequest<'a> {
    pub candidate: &'a Candidate,
    /// The candidate's source as placed inside the sandbox.
    pub source: &'a Path,
    pub sandbox: &'a Path,
    /// The subject class followed by the dependencies relevant to it.
    pub relevant_classes: &'a [String],
    pub scope: Option<&'a Scope>,
}

pub trait VerificationOracle: Send + Sync {
    fn check(&self, request: &VerificationRequest<'_>) -> anyhow::Result<Verdict>;

    /// Static well-formedness against the specification. Verifiers without
    /// a separate check accept everything here.
    fn conforms(&self, _request: &VerificationRequest<'_>) -> anyhow::Result<bool> {
        Ok(true)
    }
}
