// SPDX-License-Identifier: Apache-2.0

//! In-process oracles for the toy language, with call counters so tests can
//! observe how often each one ran.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

use mutrepair::{
    Argument, BuildMode, BuildOutcome, BuildRequest, Builder, CancelToken, CounterExample,
    ExecutionOutcome, Invocation, Invoker, Mutant, MutationGenerator, MutationId, Program, Scope,
    SolvedModel, Toolchain, VerificationOracle, VerificationRequest, Verdict,
};

use crate::toy::{self, EvalError};

/// Inputs `-bound..=bound` are checked when the scope gives no `int` bound.
pub const DEFAULT_INT_BOUND: i64 = 3;

pub const BODY_FILE: &str = "body.txt";
pub const ENSURES_FILE: &str = "ensures.txt";

/// One generated variant: where it was written, operator, line.
pub type MutantRecord = (PathBuf, String, u32);

/// Writes one variant per operator site of `routine`'s return expression,
/// flipping that operator. With `duplicates`, every variant is written a
/// second time with an extra comment, which is code-equal to the first.
pub fn mutate_into(
    source: &str,
    class_path: &Path,
    routine: &str,
    out_dir: &Path,
    duplicates: bool,
) -> std::io::Result<Vec<MutantRecord>> {
    let Some((line, expr)) = toy::return_expr(source, routine) else {
        return Ok(vec![]);
    };
    let mut records = Vec::new();
    for (n, site) in toy::operator_sites(&expr).into_iter().enumerate() {
        let mutated = toy::replace_return(source, line, &toy::flip_operator(&expr, site));
        let mut variants = vec![(format!("{}", n), "AOR", mutated.clone())];
        if duplicates {
            variants.push((
                format!("{}dup", n),
                "AORB",
                format!("{}// same code, different text\n", mutated),
            ));
        }
        for (dir, operator, text) in variants {
            let path = out_dir.join(dir).join(class_path);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, text)?;
            records.push((path, operator.to_string(), line));
        }
    }
    Ok(records)
}

/// Compiles `source` into `output_dir`; `Err` carries diagnostics.
pub fn build_into(
    source: &str,
    routine: &str,
    output_dir: &Path,
    checked: bool,
) -> Result<(), String> {
    let (_, body) = toy::return_expr(source, routine).ok_or("no return statement")?;
    toy::parse(&body).map_err(|e| e.to_string())?;
    std::fs::write(output_dir.join(BODY_FILE), &body).map_err(|e| e.to_string())?;
    if checked {
        let ensures = toy::ensures_expr(source, routine).ok_or("no ensures clause")?;
        std::fs::write(output_dir.join(ENSURES_FILE), ensures).map_err(|e| e.to_string())?;
    }
    Ok(())
}

/// Bounded check of `routine` over `x` in `-bound..=bound`.
pub fn verify_source(
    source: &str,
    class_name: &str,
    routine: &str,
    scope: Option<&Scope>,
) -> Verdict {
    let (Some((_, body)), Some(ensures)) = (
        toy::return_expr(source, routine),
        toy::ensures_expr(source, routine),
    ) else {
        return Verdict::NotDecidable("routine or specification missing".to_string());
    };
    let bound = scope
        .and_then(|s| s.bound_for("int"))
        .map_or(DEFAULT_INT_BOUND, i64::from);
    let command = format!(
        "check {} for {}",
        routine,
        scope.map(|s| s.to_string()).unwrap_or_default()
    );
    for x in -bound..=bound {
        let expected = match toy::eval(&ensures, x) {
            Ok(v) => v,
            Err(e) => return Verdict::NotDecidable(format!("specification: {}", e)),
        };
        match toy::eval(&body, x) {
            Ok(got) if got == expected => continue,
            Ok(_) | Err(EvalError::Throws(_)) => {
                return Verdict::Sat(counterexample(class_name, routine, x, &command));
            }
            Err(e) => return Verdict::NotDecidable(e.to_string()),
        }
    }
    Verdict::Unsat
}

pub fn counterexample(class_name: &str, routine: &str, x: i64, command: &str) -> CounterExample {
    CounterExample {
        class_name: class_name.to_string(),
        routine: routine.to_string(),
        receiver: None,
        arguments: vec![Argument {
            name: "x".to_string(),
            value: Some(json!(x)),
        }],
        statics: BTreeMap::new(),
        model: SolvedModel {
            command: command.to_string(),
            solution: format!("x={}", x),
        },
    }
}

/// Runs a runtime-checked toy build on one input.
///
/// A `bias` static on the class is added to the result before the
/// postcondition is checked.
pub fn replay_artifact(
    artifact_dir: &Path,
    class_name: &str,
    arguments: &[Argument],
    statics: &BTreeMap<String, BTreeMap<String, Value>>,
    cancel: &CancelToken,
) -> ExecutionOutcome {
    let read = |name: &str| std::fs::read_to_string(artifact_dir.join(name));
    let (Ok(body), Ok(ensures)) = (read(BODY_FILE), read(ENSURES_FILE)) else {
        return ExecutionOutcome::InitError("artifact lacks runtime checks".to_string());
    };
    let x = match arguments.iter().find(|a| a.name == "x") {
        Some(Argument { value: Some(v), .. }) => match v.as_i64() {
            Some(x) => x,
            None => return ExecutionOutcome::InitError(format!("x is not an int: {}", v)),
        },
        // Unconstrained parameters take the type's default.
        _ => 0,
    };
    let bias = statics
        .get(class_name)
        .and_then(|fields| fields.get("bias"))
        .and_then(Value::as_i64)
        .unwrap_or(0);
    let got = match toy::eval(&body, x) {
        Ok(v) => v + bias,
        Err(EvalError::Diverges) => {
            while !cancel.is_cancelled() {
                std::thread::sleep(std::time::Duration::from_millis(1));
            }
            return ExecutionOutcome::RuntimeFault("interrupted".to_string());
        }
        Err(EvalError::Throws(what)) => return ExecutionOutcome::MethodException(what),
        Err(e) => return ExecutionOutcome::RuntimeFault(e.to_string()),
    };
    match toy::eval(&ensures, x) {
        Ok(want) if want == got => ExecutionOutcome::Valid,
        Ok(want) => ExecutionOutcome::SpecViolation(format!(
            "JMLInternalNormalPostconditionError: expected {} got {} for x={}",
            want, got, x
        )),
        Err(e) => ExecutionOutcome::InitError(format!("specification: {}", e)),
    }
}

#[derive(Default)]
pub struct ToyMutator {
    pub emit_duplicates: bool,
    pub calls: AtomicUsize,
}

impl MutationGenerator for ToyMutator {
    fn generate(
        &self,
        program: &Program,
        routine: &str,
        out_dir: &Path,
    ) -> anyhow::Result<Vec<Mutant>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let source = program.read_source()?;
        let class_path = program.class_name_as_path();
        let records = mutate_into(&source, &class_path, routine, out_dir, self.emit_duplicates)?;
        Ok(records
            .into_iter()
            .map(|(path, operator, line)| {
                let root = path
                    .ancestors()
                    .nth(class_path.components().count())
                    .expect("mutant path below out_dir")
                    .to_path_buf();
                Mutant {
                    program: program.relocated(root),
                    id: MutationId::new(operator, Some(line), Some(routine.to_string())),
                }
            })
            .collect())
    }
}

#[derive(Default)]
pub struct ToyBuilder {
    pub builds: AtomicUsize,
}

impl Builder for ToyBuilder {
    fn build(&self, request: &BuildRequest<'_>) -> anyhow::Result<BuildOutcome> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        log::debug!("ToyBuilder::build; source: {}", request.source.display());
        let source = std::fs::read_to_string(request.source)?;
        let checked = request.mode == BuildMode::RuntimeChecked;
        Ok(match build_into(&source, toy::ROUTINE, request.output_dir, checked) {
            Ok(()) => BuildOutcome::Built,
            Err(diagnostics) => BuildOutcome::Failed { diagnostics },
        })
    }
}

/// What the verifier was last asked about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeenRequest {
    pub relevant_classes: Vec<String>,
    pub scope: Option<String>,
}

#[derive(Default)]
pub struct ToyVerifier {
    pub calls: AtomicUsize,
    pub conform_calls: AtomicUsize,
    /// When set, `conforms` rejects everything.
    pub reject_all: bool,
    pub last_request: Mutex<Option<SeenRequest>>,
}

impl VerificationOracle for ToyVerifier {
    fn check(&self, request: &VerificationRequest<'_>) -> anyhow::Result<Verdict> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(SeenRequest {
            relevant_classes: request.relevant_classes.to_vec(),
            scope: request.scope.map(|s| s.to_string()),
        });
        let source = std::fs::read_to_string(request.source)?;
        let verdict = verify_source(
            &source,
            request.candidate.program().class_name(),
            request.candidate.routine(),
            request.scope,
        );
        log::debug!(
            "ToyVerifier::check; source: {}; verdict: {:?}",
            request.source.display(),
            verdict
        );
        Ok(verdict)
    }

    fn conforms(&self, request: &VerificationRequest<'_>) -> anyhow::Result<bool> {
        self.conform_calls.fetch_add(1, Ordering::SeqCst);
        let source = std::fs::read_to_string(request.source)?;
        Ok(!self.reject_all && toy::ensures_expr(&source, request.candidate.routine()).is_some())
    }
}

#[derive(Default)]
pub struct ToyInvoker {
    pub calls: AtomicUsize,
}

impl Invoker for ToyInvoker {
    fn invoke(&self, invocation: &Invocation, cancel: &CancelToken) -> ExecutionOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        replay_artifact(
            &invocation.artifact.output_dir,
            &invocation.class_name,
            &invocation.arguments,
            &invocation.statics,
            cancel,
        )
    }
}

/// Toy oracles behind a [`Toolchain`], with handles for their counters.
pub struct ToyKit {
    pub mutator: Arc<ToyMutator>,
    pub builder: Arc<ToyBuilder>,
    pub verifier: Arc<ToyVerifier>,
    pub invoker: Arc<ToyInvoker>,
}

impl ToyKit {
    pub fn new() -> Self {
        Self::with(ToyMutator::default(), ToyVerifier::default())
    }

    pub fn with(mutator: ToyMutator, verifier: ToyVerifier) -> Self {
        Self {
            mutator: Arc::new(mutator),
            builder: Arc::new(ToyBuilder::default()),
            verifier: Arc::new(verifier),
            invoker: Arc::new(ToyInvoker::default()),
        }
    }

    pub fn toolchain(&self) -> Toolchain {
        Toolchain {
            mutator: self.mutator.clone(),
            verifier: self.verifier.clone(),
            builder: self.builder.clone(),
            invoker: Some(self.invoker.clone()),
        }
    }

    pub fn verifier_calls(&self) -> usize {
        self.verifier.calls.load(Ordering::SeqCst)
    }

    pub fn invoker_calls(&self) -> usize {
        self.invoker.calls.load(Ordering::SeqCst)
    }
}

impl Default for ToyKit {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_verify_source_finds_smallest_failing_input() {
        let src = toy::subject_source("x + 2", "x - 1 - 1");
        match verify_source(&src, toy::CLASS_NAME, toy::ROUTINE, None) {
            Verdict::Sat(ce) => assert_eq!(ce.model.solution, "x=-3"),
            other => panic!("unexpected verdict: {:?}", other),
        }
        let fixed = toy::subject_source("x + 2", "x + 1 + 1");
        assert_eq!(verify_source(&fixed, toy::CLASS_NAME, toy::ROUTINE, None), Verdict::Unsat);
        let looping = toy::subject_source("x + 2", "x + loop");
        assert!(matches!(
            verify_source(&looping, toy::CLASS_NAME, toy::ROUTINE, None),
            Verdict::NotDecidable(_)
        ));
    }

    #[test]
    fn test_scope_bounds_inputs() {
        let src = toy::subject_source("x", "x - 1");
        let scope: Scope = "int:1".parse().unwrap();
        match verify_source(&src, toy::CLASS_NAME, toy::ROUTINE, Some(&scope)) {
            Verdict::Sat(ce) => {
                assert_eq!(ce.model.solution, "x=-1");
                assert_eq!(ce.model.command, "check addTwo for int:1");
            }
            other => panic!("unexpected verdict: {:?}", other),
        }
    }

    #[test]
    fn test_mutate_into_with_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let src = toy::subject_source("x + 2", "x - 1 - 1");
        let records =
            mutate_into(&src, Path::new("demo/Calc.java"), toy::ROUTINE, dir.path(), true).unwrap();
        assert_eq!(records.len(), 4);
        assert!(records.iter().all(|(p, _, line)| p.exists() && *line == 6));
    }
}
