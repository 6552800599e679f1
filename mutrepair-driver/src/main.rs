// SPDX-License-Identifier: Apache-2.0

//! Command line driver for repairing one routine of a subject program.
//!
//! ```text
//! mutrepair-driver [--config FILE] <SOURCE_ROOT> <CLASS> <ROUTINE> [options]
//! ```
//!
//! The repair report goes to stdout. Exit status is 0 when a fix was found,
//! 1 when the search was exhausted without one, and 2 when the run could not
//! start (bad arguments, unreadable subject, missing tools, ...).
//!
//! Sample usage:
//!
//! ```shell
//! $ cargo run -p mutrepair-driver -- --config=$HOME/mutrepair.toml \
//!     src/ demo.Calc addTwo --max-depth=2 --runtime-check --scope=int:4
//! ```

mod report_cli_error;

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use mutrepair::{
    CheckStrategy, Program, ProgramRepairer, RepairConfig, RepairError, RepairRequest, Scope,
    Toolchain,
};
use mutrepair_search::{SearchStrategy, DEFAULT_MAX_DEPTH};
use report_cli_error::report_cli_error_and_exit;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct CliArgs {
    /// Path to a mutrepair TOML configuration file.
    #[clap(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Root directory of the subject's source tree.
    source_root: PathBuf,

    /// Fully qualified name of the class holding the routine, e.g. demo.Calc.
    class: String,

    /// Name of the routine to repair.
    routine: String,

    /// Maximum number of mutations applied on top of the subject.
    #[clap(long, default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: usize,

    /// Search order: dfs or bfs.
    #[clap(long, default_value_t = SearchStrategy::DepthFirst)]
    strategy: SearchStrategy,

    /// Verifier bounds per type, e.g. int:4,Node:3
    #[clap(long)]
    scope: Option<Scope>,

    /// Further classes the verifier should consider.
    #[clap(long, value_delimiter = ',')]
    deps: Vec<String>,

    /// Replay cached counterexamples before calling the verifier.
    #[clap(long)]
    runtime_check: bool,

    /// Per-replay deadline; overrides limits.replay_timeout_ms.
    #[clap(long, value_name = "MS")]
    replay_timeout_ms: Option<u64>,

    /// Leave the sandbox on disk after the run.
    #[clap(long)]
    keep_sandbox: bool,
}

fn load_config(cli: &CliArgs) -> RepairConfig {
    let config = match &cli.config {
        Some(path) => match RepairConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => report_repair_error(&e),
        },
        None => RepairConfig::default(),
    };
    match cli.replay_timeout_ms {
        Some(ms) => config.with_replay_timeout(Duration::from_millis(ms)),
        None => config,
    }
}

fn report_repair_error(e: &RepairError) -> ! {
    let cause = match e {
        RepairError::Search(inner) => Some(format!("{:?}", inner)),
        _ => None,
    };
    let mut details = vec![("kind", e.kind())];
    if let Some(cause) = &cause {
        details.push(("cause", cause.as_str()));
    }
    report_cli_error_and_exit(&e.to_string(), details)
}

fn main() {
    let _ = env_logger::try_init();

    log::info!(
        "mutrepair-driver starting; version: {}",
        env!("CARGO_PKG_VERSION")
    );

    let cli = CliArgs::parse();
    log::debug!("main; args: {:?}", cli);

    // An unreadable subject is reported before any tool is resolved.
    let subject = Program::new(&cli.source_root, &cli.class);
    if Program::is_valid_class_name(&cli.class) {
        if let Err(e) = subject.check_readable() {
            report_repair_error(&e);
        }
    }

    let config = load_config(&cli);
    let toolchain = match Toolchain::from_config(&config) {
        Ok(toolchain) => toolchain,
        Err(e) => report_repair_error(&e),
    };

    let mut request = RepairRequest::new(&cli.source_root, &cli.class, &cli.routine);
    request.max_depth = cli.max_depth;
    request.strategy = cli.strategy;
    request.check = if cli.runtime_check {
        CheckStrategy::RuntimeAssisted
    } else {
        CheckStrategy::Direct
    };
    request.scope = cli.scope.clone();
    request.dependencies = cli.deps.clone();
    request.keep_sandbox = cli.keep_sandbox;

    let repairer = ProgramRepairer::new(config, toolchain);
    match repairer.repair(&request) {
        Ok(outcome) => {
            println!("{}", outcome);
            std::process::exit(if outcome.is_repaired() { 0 } else { 1 });
        }
        Err(e) => report_repair_error(&e),
    }
}
