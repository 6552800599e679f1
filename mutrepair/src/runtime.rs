// SPDX-License-Identifier: Apache-2.0

//! Replaying a counterexample against a runtime-checked build.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;

use crate::candidate::Candidate;
use crate::counterexample::{Argument, CounterExample};
use crate::executor::{CancelToken, ExecutionOutcome, TimeoutExecutor};
use crate::loader::Artifact;

/// One call of the target routine with concrete inputs.
#[derive(Debug, Clone, Serialize)]
pub struct Invocation {
    pub class_name: String,
    pub routine: String,
    /// Receiver state; `None` for static routines.
    pub receiver: Option<Value>,
    pub arguments: Vec<Argument>,
    /// Assigned before the call, keyed by class then field.
    pub statics: BTreeMap<String, BTreeMap<String, Value>>,
    #[serde(skip)]
    pub artifact: Artifact,
}

/// Executes an [`Invocation`] against a built artifact.
///
/// Implementations apply `statics` before the call and should poll
/// `cancel` while they wait on the candidate.
pub trait Invoker: Send + Sync {
    fn invoke(&self, invocation: &Invocation, cancel: &CancelToken) -> ExecutionOutcome;
}

pub struct RuntimeCheck {
    executor: TimeoutExecutor,
    invoker: Arc<dyn Invoker>,
}

impl RuntimeCheck {
    pub fn new(executor: TimeoutExecutor, invoker: Arc<dyn Invoker>) -> Self {
        Self { executor, invoker }
    }

    pub fn executor(&self) -> &TimeoutExecutor {
        &self.executor
    }

    /// Calls the candidate's routine on the inputs recorded in `example`.
    pub fn replay(
        &self,
        artifact: &Artifact,
        candidate: &Candidate,
        example: &CounterExample,
    ) -> ExecutionOutcome {
        let class_name = candidate.program().class_name();
        if example.routine != candidate.routine() || example.class_name != class_name {
            return ExecutionOutcome::InitError(format!(
                "counterexample targets {}::{}, candidate is {}::{}",
                example.class_name,
                example.routine,
                class_name,
                candidate.routine()
            ));
        }
        let invocation = Invocation {
            class_name: class_name.to_string(),
            routine: example.routine.clone(),
            receiver: example.receiver.clone(),
            arguments: example.arguments.clone(),
            statics: example.statics.clone(),
            artifact: artifact.clone(),
        };
        let invoker = Arc::clone(&self.invoker);
        let start = Instant::now();
        let outcome = self
            .executor
            .run(move |cancel| invoker.invoke(&invocation, cancel));
        log::debug!(
            "RuntimeCheck::replay; {}::{} model: {:?} outcome: {} in {:?}",
            class_name,
            example.routine,
            example.model.solution,
            outcome,
            start.elapsed()
        );
        outcome
    }
}
