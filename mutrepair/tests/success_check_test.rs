// SPDX-License-Identifier: Apache-2.0

//! Counterexample-guided checking against a hand-built workbench.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;

use mutrepair::strategy::CheckTarget;
use mutrepair::{
    ArtifactLoader, Candidate, CheckVerdict, ExecutionOutcome, RuntimeCheck, Sandbox,
    SuccessCheck, TimeoutExecutor, Workbench,
};
use mutrepair_test_helpers::oracles::counterexample;
use mutrepair_test_helpers::{toy, ToyKit};

struct Bench {
    bench: Workbench,
    kit: ToyKit,
    relevant: Vec<String>,
    _sandbox: Sandbox,
    tmp: tempfile::TempDir,
}

impl Bench {
    fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let tmp = mutrepair_test_helpers::make_test_tmpdir("mutrepair_check");
        let sandbox = Sandbox::create(tmp.path().join("sandbox")).unwrap();
        let kit = ToyKit::new();
        let mut loader =
            ArtifactLoader::new(kit.builder.clone(), sandbox.path(), "java", vec![]);
        loader.mark_reloadable(toy::CLASS_NAME);
        Self {
            bench: Workbench::new(loader),
            kit,
            relevant: vec![toy::CLASS_NAME.to_string()],
            _sandbox: sandbox,
            tmp,
        }
    }

    fn candidate(&self, dir: &str, body: &str) -> Candidate {
        let program = toy::write_subject(&self.tmp.path().join(dir), "x + 2", body);
        Candidate::initial(program, toy::ROUTINE)
    }

    fn guided(&self, deadline: Duration) -> SuccessCheck {
        let executor = TimeoutExecutor::new(deadline).with_grace(Duration::from_millis(50));
        SuccessCheck::guided(
            self.kit.verifier.clone(),
            RuntimeCheck::new(executor, self.kit.invoker.clone()),
        )
    }

    fn check(&mut self, check: &mut SuccessCheck, candidate: &Candidate) -> CheckVerdict {
        let target = CheckTarget {
            candidate,
            relevant_classes: &self.relevant,
            scope: None,
        };
        check.check(&mut self.bench, target).unwrap()
    }
}

#[test]
fn test_cached_counterexample_prunes_without_verifier() {
    let mut bench = Bench::new();
    let mut check = bench.guided(Duration::from_secs(10));
    assert!(check.remember(counterexample(toy::CLASS_NAME, toy::ROUTINE, -3, "check")));

    let candidate = bench.candidate("a", "x + 1 - 1");
    match bench.check(&mut check, &candidate) {
        CheckVerdict::Pruned {
            example: 0,
            outcome: ExecutionOutcome::SpecViolation(msg),
        } => assert!(msg.contains("expected -1 got -3")),
        other => panic!("unexpected verdict: {:?}", other),
    }
    assert_eq!(bench.kit.verifier_calls(), 0);
    assert_eq!(bench.kit.invoker_calls(), 1);
    assert_eq!(check.stats().pruned, 1);
}

#[test]
fn test_only_candidates_surviving_replay_are_verified() {
    let mut bench = Bench::new();
    let mut check = bench.guided(Duration::from_secs(10));
    check.remember(counterexample(toy::CLASS_NAME, toy::ROUTINE, 0, "check"));

    // Right at x = 0, wrong for negative inputs.
    let candidate = bench.candidate("a", "x - 1 - 1");
    let verdict = bench.check(&mut check, &candidate);
    assert_eq!(
        verdict,
        CheckVerdict::Pruned {
            example: 0,
            outcome: ExecutionOutcome::SpecViolation(
                "JMLInternalNormalPostconditionError: expected 2 got -2 for x=0".to_string()
            ),
        }
    );

    let candidate = bench.candidate("b", "x + 1 + 1");
    assert_eq!(bench.check(&mut check, &candidate), CheckVerdict::Accepted);
    assert_eq!(bench.kit.verifier_calls(), 1);
    assert_eq!(check.cache().unwrap().len(), 1);
}

#[test]
fn test_refuting_counterexample_is_cached_once() {
    let mut bench = Bench::new();
    let mut check = bench.guided(Duration::from_secs(10));
    let candidate = bench.candidate("a", "x - 1 - 1");
    assert_eq!(
        bench.check(&mut check, &candidate),
        CheckVerdict::Refuted { cached: true }
    );
    let cache = check.cache().unwrap();
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.get(0).unwrap().model.solution, "x=-3");

    // Same model, different inputs recorded: not a new entry.
    let mut again = counterexample(toy::CLASS_NAME, toy::ROUTINE, -3, "check addTwo for ");
    again.arguments.clear();
    assert!(!check.remember(again));
    assert_eq!(check.cache().unwrap().len(), 1);
}

#[test]
fn test_not_decidable_leaves_cache_unchanged() {
    let mut bench = Bench::new();
    let mut check = bench.guided(Duration::from_secs(10));
    let candidate = bench.candidate("a", "x + loop");
    assert!(matches!(
        bench.check(&mut check, &candidate),
        CheckVerdict::NotDecidable(_)
    ));
    assert!(check.cache().unwrap().is_empty());
    assert_eq!(check.stats().not_decidable, 1);
}

#[test]
fn test_replay_timeout_does_not_prune() {
    let mut bench = Bench::new();
    let mut check = bench.guided(Duration::from_millis(100));
    check.remember(counterexample(toy::CLASS_NAME, toy::ROUTINE, -3, "check"));
    let candidate = bench.candidate("a", "x + loop");
    let verdict = bench.check(&mut check, &candidate);
    assert!(matches!(verdict, CheckVerdict::NotDecidable(_)), "{:?}", verdict);
    let stats = check.stats();
    assert_eq!(stats.replays, 1);
    assert_eq!(stats.pruned, 0);
    assert_eq!(bench.kit.verifier_calls(), 1);
}

#[test]
fn test_build_failure_is_not_verified() {
    let mut bench = Bench::new();
    let mut check = SuccessCheck::direct(bench.kit.verifier.clone());
    let candidate = bench.candidate("a", "x +");
    assert!(matches!(
        bench.check(&mut check, &candidate),
        CheckVerdict::BuildFailed(d) if d.contains("dangling operator")
    ));
    assert_eq!(bench.kit.verifier_calls(), 0);
    assert_eq!(check.stats().build_failures, 1);
    assert!(check.cache().is_none());
}

#[test]
fn test_identical_sources_share_one_build() {
    let mut bench = Bench::new();
    let mut check = SuccessCheck::direct(bench.kit.verifier.clone());
    let first = bench.candidate("a", "x + 1 + 1");
    let second = bench.candidate("b", "x + 1 + 1");
    assert_eq!(bench.check(&mut check, &first), CheckVerdict::Accepted);
    assert_eq!(bench.check(&mut check, &second), CheckVerdict::Accepted);
    let stats = bench.bench.loader().stats();
    assert_eq!(stats.builds, 1);
    assert_eq!(stats.cache_hits, 1);
    assert!(bench.bench.loader().active().is_none());
}
