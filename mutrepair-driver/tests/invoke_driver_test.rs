// SPDX-License-Identifier: Apache-2.0

//! Runs the built driver binary and checks its exit status and messages.

use std::path::Path;
use std::process::{Command, Output};

use mutrepair_test_helpers::{make_test_tmpdir, toy};
use test_case::test_case;

fn run_driver(args: &[&str]) -> Output {
    let driver = env!("CARGO_BIN_EXE_mutrepair-driver");
    let output = Command::new(driver)
        .args(args)
        .env("NO_COLOR", "1")
        .output()
        .expect("run driver");
    eprintln!("child.stdout:\n{}", String::from_utf8_lossy(&output.stdout));
    eprintln!("child.stderr:\n{}", String::from_utf8_lossy(&output.stderr));
    output
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

fn write_subject(root: &Path) -> String {
    let src = root.join("src");
    toy::write_subject(&src, "x + 2", "x - 1 - 1");
    src.display().to_string()
}

#[test]
fn test_help_lists_options() {
    let output = run_driver(&["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for flag in [
        "--config",
        "--max-depth",
        "--strategy",
        "--scope",
        "--deps",
        "--runtime-check",
        "--replay-timeout-ms",
        "--keep-sandbox",
    ] {
        assert!(stdout.contains(flag), "missing {} in help", flag);
    }
}

#[test]
fn test_missing_subject_is_an_init_error() {
    let tmp = make_test_tmpdir("mutrepair_driver");
    let root = tmp.path().display().to_string();
    let output = run_driver(&[&root, "demo.Missing", "addTwo"]);
    assert_eq!(output.status.code(), Some(2));
    let stderr = stderr(&output);
    assert!(
        stderr
            .lines()
            .any(|l| l.starts_with("mutrepair-driver: cannot read subject '")),
        "{}",
        stderr
    );
    assert!(stderr.contains("\n  kind: subject-not-readable\n"), "{}", stderr);
}

#[test]
fn test_unconfigured_tools_are_an_init_error() {
    let tmp = make_test_tmpdir("mutrepair_driver");
    let src = write_subject(tmp.path());
    let output = run_driver(&[&src, toy::CLASS_NAME, toy::ROUTINE]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("tools.mutate is not configured"));
}

#[test]
fn test_missing_tool_is_an_init_error() {
    let tmp = make_test_tmpdir("mutrepair_driver");
    let src = write_subject(tmp.path());
    let config = tmp.path().join("mutrepair.toml");
    std::fs::write(
        &config,
        r#"
[tools]
mutate = ["mutrepair-no-such-mutator", "{source}"]
build = ["mutrepair-no-such-builder"]
verify = ["mutrepair-no-such-verifier"]
"#,
    )
    .unwrap();
    let config = format!("--config={}", config.display());
    let output = run_driver(&[&config, &src, toy::CLASS_NAME, toy::ROUTINE]);
    assert_eq!(output.status.code(), Some(2));
    let stderr = stderr(&output);
    assert!(stderr.contains("tool 'mutrepair-no-such-mutator' not found"));
    assert!(stderr.contains("kind: tool-not-found"));
}

#[test_case("[tools]\nmutate = 3\n"; "wrong type")]
#[test_case("[paths]\ncompiling_sandbox = \"/tmp/fixed\"\n"; "sandbox without token")]
#[test_case("[typo]\n"; "unknown table")]
fn test_bad_config_is_an_init_error(text: &str) {
    let tmp = make_test_tmpdir("mutrepair_driver");
    let src = write_subject(tmp.path());
    let config = tmp.path().join("mutrepair.toml");
    std::fs::write(&config, text).unwrap();
    let config = format!("--config={}", config.display());
    let output = run_driver(&[&config, &src, toy::CLASS_NAME, toy::ROUTINE]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("kind: config"));
}

#[test_case("--strategy=sideways", "unknown search strategy"; "strategy")]
#[test_case("--scope=int:0", "bound"; "scope")]
#[test_case("--max-depth=-1", "--max-depth"; "depth")]
fn test_bad_flag_values_are_rejected(flag: &str, expected: &str) {
    let output = run_driver(&["src", "demo.Calc", "addTwo", flag]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains(expected));
}
