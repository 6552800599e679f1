// SPDX-License-Identifier: Apache-2.0

//! Drives the command-backed adapters through the `toy-tool` binary.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;

use mutrepair::config::ToolsConfig;
use mutrepair::loader::BuildMode;
use mutrepair::tools::{CommandInvoker, CommandTemplate};
use mutrepair::{
    Artifact, Candidate, CheckStrategy, CodeDigest, ExecutionOutcome, ProgramRepairer,
    RepairConfig, RepairError, RepairOutcome, RepairRequest, RuntimeCheck, TimeoutExecutor,
    Toolchain,
};
use mutrepair_test_helpers::oracles::{self, counterexample};
use mutrepair_test_helpers::{make_test_tmpdir, scratch_config, toy};

const TOY_TOOL: &str = env!("CARGO_BIN_EXE_toy-tool");

fn argv(args: &[&str]) -> Option<Vec<String>> {
    let mut argv = vec![TOY_TOOL.to_string()];
    argv.extend(args.iter().map(|s| s.to_string()));
    Some(argv)
}

fn toy_tools() -> ToolsConfig {
    ToolsConfig {
        mutate: argv(&[
            "mutate",
            "--source-root",
            "{source_root}",
            "--class",
            "{class}",
            "--routine",
            "{routine}",
            "--output",
            "{output}",
        ]),
        build: argv(&["build", "--source", "{source}", "--output", "{output}"]),
        build_checked: argv(&[
            "build", "--source", "{source}", "--output", "{output}", "--checked",
        ]),
        verify: argv(&[
            "verify",
            "--source",
            "{source}",
            "--class",
            "{class}",
            "--routine",
            "{routine}",
            "--scope",
            "{scope}",
        ]),
        conforms: argv(&["conforms", "--source", "{source}", "--routine", "{routine}"]),
        replay: argv(&["replay", "--input", "{input}", "--artifact", "{artifact}"]),
        violation_markers: None,
    }
}

fn setup(body: &str) -> (tempfile::TempDir, RepairConfig) {
    let _ = env_logger::builder().is_test(true).try_init();
    let tmp = make_test_tmpdir("mutrepair_command_tools");
    toy::write_subject(&tmp.path().join("src"), "x + 2", body);
    let config = scratch_config(tmp.path()).with_tools(toy_tools());
    (tmp, config)
}

fn repair(config: RepairConfig, request: &RepairRequest) -> Result<RepairOutcome, RepairError> {
    let toolchain = Toolchain::from_config(&config)?;
    ProgramRepairer::new(config, toolchain).repair(request)
}

#[test]
fn test_direct_repair_through_commands() {
    let (tmp, config) = setup("x - 1 - 1");
    let mut request = RepairRequest::new(tmp.path().join("src"), toy::CLASS_NAME, toy::ROUTINE);
    request.max_depth = 2;
    request.scope = Some("int:4".parse().unwrap());
    let outcome = repair(config, &request).unwrap();
    let RepairOutcome::Repaired { location, solution, .. } = &outcome else {
        panic!("expected a repair, got: {}", outcome);
    };
    let fixed = std::fs::read_to_string(location).unwrap();
    assert_eq!(
        toy::return_expr(&fixed, toy::ROUTINE),
        Some((6, "x + 1 + 1".to_string()))
    );
    assert_eq!(solution.depth(), 2);
}

#[test]
fn test_runtime_assisted_repair_through_commands() {
    let (tmp, config) = setup("x - 1 - 1");
    let mut request = RepairRequest::new(tmp.path().join("src"), toy::CLASS_NAME, toy::ROUTINE);
    request.max_depth = 2;
    request.check = CheckStrategy::RuntimeAssisted;
    let outcome = repair(config, &request).unwrap();
    assert!(outcome.is_repaired(), "{}", outcome);
    let summary = outcome.summary();
    assert_eq!(summary.checks.oracle_calls, 2);
    assert_eq!(summary.checks.pruned, 2);
    assert_eq!(summary.cached_counterexamples, 1);
}

#[test]
fn test_subject_without_specification_is_rejected() {
    let tmp = make_test_tmpdir("mutrepair_command_tools");
    let subject = toy::subject_source("x + 2", "x - 1 - 1").replace("//@ ensures", "// ensures");
    let path = tmp.path().join("src/demo/Calc.java");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, subject).unwrap();
    let config = scratch_config(tmp.path()).with_tools(toy_tools());
    let request = RepairRequest::new(tmp.path().join("src"), toy::CLASS_NAME, toy::ROUTINE);
    let err = repair(config, &request).unwrap_err();
    assert!(matches!(err, RepairError::SubjectInvalid { .. }), "{}", err);
}

#[test]
fn test_toolchain_resolution_errors() {
    let config = RepairConfig::default().with_tools(ToolsConfig {
        mutate: None,
        ..toy_tools()
    });
    assert!(matches!(
        Toolchain::from_config(&config),
        Err(RepairError::Config(_))
    ));

    let config = RepairConfig::default().with_tools(ToolsConfig {
        verify: Some(vec!["mutrepair-no-such-verifier".to_string()]),
        ..toy_tools()
    });
    match Toolchain::from_config(&config) {
        Err(RepairError::ToolNotFound { tool, .. }) => {
            assert_eq!(tool, "mutrepair-no-such-verifier")
        }
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("expected an error"),
    }

    let config = RepairConfig::default().with_tools(ToolsConfig {
        replay: None,
        ..toy_tools()
    });
    assert!(Toolchain::from_config(&config).unwrap().invoker.is_none());
}

#[test]
fn test_runtime_check_without_checked_build_is_a_config_error() {
    let (tmp, config) = setup("x - 1 - 1");
    let config = config.with_tools(ToolsConfig {
        build_checked: None,
        ..toy_tools()
    });
    let mut request = RepairRequest::new(tmp.path().join("src"), toy::CLASS_NAME, toy::ROUTINE);
    request.check = CheckStrategy::RuntimeAssisted;
    match repair(config.clone(), &request) {
        Err(RepairError::Config(msg)) => assert!(msg.contains("tools.build_checked"), "{}", msg),
        Err(other) => panic!("unexpected error: {}", other),
        Ok(outcome) => panic!("expected a config error, got: {}", outcome),
    }
    assert!(!tmp.path().join("sandbox").exists());

    request.check = CheckStrategy::Direct;
    request.max_depth = 2;
    assert!(repair(config, &request).unwrap().is_repaired());
}

/// A runtime-checked build of `body` written straight into `dir`.
fn artifact(dir: &std::path::Path, body: &str) -> Artifact {
    let source = toy::subject_source("x + 2", body);
    oracles::build_into(&source, toy::ROUTINE, dir, true).unwrap();
    Artifact {
        unit: toy::CLASS_NAME.to_string(),
        mode: BuildMode::RuntimeChecked,
        digest: CodeDigest::of_source(&source),
        output_dir: dir.to_path_buf(),
        classpath: vec![dir.to_path_buf()],
    }
}

fn replay_check(deadline: Duration) -> RuntimeCheck {
    let replay = toy_tools().replay.unwrap();
    let template = CommandTemplate::resolve("replay", &replay).unwrap();
    let invoker = CommandInvoker::new(template, RepairConfig::default().violation_markers());
    RuntimeCheck::new(
        TimeoutExecutor::new(deadline).with_grace(Duration::from_millis(200)),
        Arc::new(invoker),
    )
}

#[test]
fn test_replay_outcomes_through_command() {
    let tmp = make_test_tmpdir("mutrepair_replay");
    let check = replay_check(Duration::from_secs(30));
    let program = mutrepair::Program::new(tmp.path(), toy::CLASS_NAME);
    let candidate = Candidate::initial(program, toy::ROUTINE);
    let example = counterexample(toy::CLASS_NAME, toy::ROUTINE, -3, "check");

    let fixed = tmp.path().join("fixed");
    std::fs::create_dir_all(&fixed).unwrap();
    assert_eq!(
        check.replay(&artifact(&fixed, "x + 1 + 1"), &candidate, &example),
        ExecutionOutcome::Valid
    );

    let broken = tmp.path().join("broken");
    std::fs::create_dir_all(&broken).unwrap();
    match check.replay(&artifact(&broken, "x + 1 - 1"), &candidate, &example) {
        ExecutionOutcome::SpecViolation(msg) => {
            assert!(msg.contains("JMLInternalNormalPostconditionError"), "{}", msg)
        }
        other => panic!("unexpected outcome: {}", other),
    }

    let throws = tmp.path().join("throws");
    std::fs::create_dir_all(&throws).unwrap();
    assert!(matches!(
        check.replay(&artifact(&throws, "x + boom"), &candidate, &example),
        ExecutionOutcome::MethodException(_)
    ));
}

#[test]
fn test_replay_of_looping_candidate_times_out() {
    let tmp = make_test_tmpdir("mutrepair_replay");
    let check = replay_check(Duration::from_millis(300));
    let program = mutrepair::Program::new(tmp.path(), toy::CLASS_NAME);
    let candidate = Candidate::initial(program, toy::ROUTINE);
    let example = counterexample(toy::CLASS_NAME, toy::ROUTINE, 1, "check");
    let looping = tmp.path().join("looping");
    std::fs::create_dir_all(&looping).unwrap();
    let outcome = check.replay(&artifact(&looping, "x + loop"), &candidate, &example);
    assert!(matches!(outcome, ExecutionOutcome::Timeout(_)), "{}", outcome);
    assert!(!outcome.falsifies());
}
