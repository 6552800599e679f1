// SPDX-License-Identifier: Apache-2.0

//! Command-line face of the toy oracles, for exercising the command-backed
//! tool adapters end to end.

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use mutrepair::tools::{EXIT_INIT_ERROR, EXIT_METHOD_EXCEPTION, EXIT_SPEC_VIOLATION, EXIT_VALID};
use mutrepair::{Argument, CancelToken, ExecutionOutcome, Program, Scope, Verdict};
use mutrepair_test_helpers::oracles;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct CliArgs {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Writes operator-flip variants and prints a JSON manifest.
    Mutate {
        #[clap(long)]
        source_root: PathBuf,
        #[clap(long)]
        class: String,
        #[clap(long)]
        routine: String,
        #[clap(long)]
        output: PathBuf,
        #[clap(long)]
        duplicates: bool,
    },
    Build {
        #[clap(long)]
        source: PathBuf,
        #[clap(long)]
        output: PathBuf,
        #[clap(long)]
        checked: bool,
    },
    /// Prints a JSON verdict.
    Verify {
        #[clap(long)]
        source: PathBuf,
        #[clap(long)]
        class: String,
        #[clap(long)]
        routine: String,
        #[clap(long)]
        scope: Option<String>,
    },
    Conforms {
        #[clap(long)]
        source: PathBuf,
        #[clap(long)]
        routine: String,
    },
    /// Reads an invocation and reports through the exit status.
    Replay {
        #[clap(long)]
        input: PathBuf,
        #[clap(long)]
        artifact: PathBuf,
    },
}

fn read(path: &PathBuf) -> String {
    match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("toy-tool: cannot read {}: {}", path.display(), e);
            std::process::exit(2);
        }
    }
}

fn main() {
    let _ = env_logger::try_init();
    let cli = CliArgs::parse();
    let code = match cli.command {
        Command::Mutate {
            source_root,
            class,
            routine,
            output,
            duplicates,
        } => {
            let program = Program::new(source_root, class);
            let source = read(&program.file_path());
            let records = oracles::mutate_into(
                &source,
                &program.class_name_as_path(),
                &routine,
                &output,
                duplicates,
            )
            .unwrap_or_else(|e| {
                eprintln!("toy-tool: {}", e);
                std::process::exit(2);
            });
            let manifest: Vec<Value> = records
                .into_iter()
                .map(|(path, operator, line)| {
                    json!({"path": path, "operator": operator, "line": line})
                })
                .collect();
            println!("{}", Value::Array(manifest));
            0
        }
        Command::Build {
            source,
            output,
            checked,
        } => {
            let text = read(&source);
            match oracles::build_into(&text, mutrepair_test_helpers::toy::ROUTINE, &output, checked) {
                Ok(()) => 0,
                Err(diagnostics) => {
                    eprintln!("{}", diagnostics);
                    1
                }
            }
        }
        Command::Verify {
            source,
            class,
            routine,
            scope,
        } => {
            let scope: Option<Scope> = match scope.filter(|s| !s.is_empty()).map(|s| s.parse()) {
                None => None,
                Some(Ok(scope)) => Some(scope),
                Some(Err(e)) => {
                    eprintln!("toy-tool: {}", e);
                    std::process::exit(2);
                }
            };
            let text = read(&source);
            let report = match oracles::verify_source(&text, &class, &routine, scope.as_ref()) {
                Verdict::Unsat => json!({"verdict": "unsat"}),
                Verdict::Sat(ce) => json!({"verdict": "sat", "counterexample": ce}),
                Verdict::NotDecidable(reason) => {
                    json!({"verdict": "not_decidable", "reason": reason})
                }
            };
            println!("{}", report);
            0
        }
        Command::Conforms { source, routine } => {
            let text = read(&source);
            if mutrepair_test_helpers::toy::ensures_expr(&text, &routine).is_some() {
                0
            } else {
                eprintln!("no ensures clause for {}", routine);
                1
            }
        }
        Command::Replay { input, artifact } => {
            let invocation: Value = serde_json::from_str(&read(&input)).unwrap_or(Value::Null);
            let class_name = invocation["class_name"].as_str().unwrap_or_default().to_string();
            let arguments: Vec<Argument> =
                serde_json::from_value(invocation["arguments"].clone()).unwrap_or_default();
            let statics: BTreeMap<String, BTreeMap<String, Value>> =
                serde_json::from_value(invocation["statics"].clone()).unwrap_or_default();
            let outcome = oracles::replay_artifact(
                &artifact,
                &class_name,
                &arguments,
                &statics,
                &CancelToken::new(),
            );
            match outcome {
                ExecutionOutcome::Valid => EXIT_VALID,
                ExecutionOutcome::SpecViolation(msg) => {
                    eprintln!("{}", msg);
                    EXIT_SPEC_VIOLATION
                }
                ExecutionOutcome::MethodException(msg) => {
                    eprintln!("{}", msg);
                    EXIT_METHOD_EXCEPTION
                }
                ExecutionOutcome::InitError(msg) => {
                    eprintln!("{}", msg);
                    EXIT_INIT_ERROR
                }
                other => {
                    eprintln!("{}", other);
                    3
                }
            }
        }
    };
    std::process::exit(code);
}
