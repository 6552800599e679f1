// SPDX-License-Identifier: Apache-2.0

//! Bounded mutation-based repair of a routine against its formal
//! specification.
//!
//! A [`ProgramRepairer`] copies the subject's source tree into a fresh
//! [`Sandbox`], checks that the unmodified subject builds, and then runs a
//! depth-bounded search over mutated candidates. Each candidate is staged in
//! the sandbox, built through the content-addressed [`ArtifactLoader`], and
//! judged by a [`SuccessCheck`]: either straight verification, or replay of
//! cached counterexamples under a [`TimeoutExecutor`] before verification.

pub mod candidate;
pub mod config;
pub mod counterexample;
pub mod digest;
pub mod error;
pub mod executor;
pub mod loader;
pub mod mutation;
pub mod problem;
pub mod program;
pub mod repairer;
pub mod runtime;
pub mod sandbox;
pub mod scope;
pub mod strategy;
pub mod tools;
pub mod verify;

pub use candidate::Candidate;
pub use config::RepairConfig;
pub use counterexample::{Argument, CounterExample, CounterExampleCache, SolvedModel};
pub use digest::CodeDigest;
pub use error::RepairError;
pub use executor::{CancelToken, ExecutionOutcome, TimeoutExecutor};
pub use loader::{
    Artifact, ArtifactLoader, BuildMode, BuildOutcome, BuildRequest, Builder, Load, LoaderError,
};
pub use mutation::{Mutant, MutationGenerator, MutationId};
pub use problem::RepairSearchProblem;
pub use program::Program;
pub use repairer::{ProgramRepairer, RepairOutcome, RepairRequest};
pub use runtime::{Invocation, Invoker, RuntimeCheck};
pub use sandbox::Sandbox;
pub use scope::Scope;
pub use strategy::{CheckStrategy, CheckVerdict, SuccessCheck, Workbench};
pub use tools::Toolchain;
pub use verify::{VerificationOracle, VerificationRequest, Verdict};

pub use mutrepair_search::{SearchStrategy, DEFAULT_MAX_DEPTH};
