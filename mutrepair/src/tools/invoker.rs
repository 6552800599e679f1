// SPDX-License-Identifier: Apache-2.0

use std::io::{Read, Seek, SeekFrom, Write};
use std::process::Stdio;
use std::time::Duration;

use super::builder::join_classpath;
use super::command::{CommandTemplate, Vars};
use crate::executor::{CancelToken, ExecutionOutcome};
use crate::runtime::{Invocation, Invoker};

/// Exit statuses of the `replay` tool.
pub const EXIT_VALID: i32 = 0;
pub const EXIT_SPEC_VIOLATION: i32 = 10;
pub const EXIT_METHOD_EXCEPTION: i32 = 11;
pub const EXIT_INIT_ERROR: i32 = 12;

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Runs the `replay` tool on a JSON description of the call.
///
/// The tool reads `{input}`, runs the routine from `{artifact}` with
/// `{classpath}`, and reports through its exit status. Other non-zero
/// statuses are classified from stderr: any configured violation marker
/// means a specification violation, anything else a runtime fault.
pub struct CommandInvoker {
    template: CommandTemplate,
    violation_markers: Vec<String>,
}

impl CommandInvoker {
    pub fn new(template: CommandTemplate, violation_markers: Vec<String>) -> Self {
        Self {
            template,
            violation_markers,
        }
    }

    fn run(
        &self,
        invocation: &Invocation,
        cancel: &CancelToken,
    ) -> std::io::Result<ExecutionOutcome> {
        let artifact = &invocation.artifact;
        let mut input = tempfile::Builder::new()
            .prefix("replay-")
            .suffix(".json")
            .tempfile_in(&artifact.output_dir)?;
        serde_json::to_writer(&mut input, invocation)?;
        input.flush()?;

        let mut stderr_file = tempfile::tempfile()?;
        let vars = Vars::new()
            .set("input", input.path().display().to_string())
            .set("artifact", artifact.output_dir.display().to_string())
            .set("classpath", join_classpath(&artifact.classpath))
            .set("class", invocation.class_name.as_str())
            .set("routine", invocation.routine.as_str());
        let mut command = self.template.command(&vars);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(stderr_file.try_clone()?));
        log::trace!("CommandInvoker::run; running command: {:?}", command);
        let mut child = command.spawn()?;

        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if cancel.is_cancelled() {
                let _ = child.kill();
                let _ = child.wait();
                return Ok(ExecutionOutcome::RuntimeFault(
                    "replay cancelled".to_string(),
                ));
            }
            std::thread::sleep(POLL_INTERVAL);
        };

        let mut stderr = String::new();
        stderr_file.seek(SeekFrom::Start(0))?;
        stderr_file.read_to_string(&mut stderr)?;
        Ok(classify(status.code(), &stderr, &self.violation_markers))
    }
}

fn classify(code: Option<i32>, stderr: &str, violation_markers: &[String]) -> ExecutionOutcome {
    let message = stderr.trim().to_string();
    match code {
        Some(EXIT_VALID) => ExecutionOutcome::Valid,
        Some(EXIT_SPEC_VIOLATION) => ExecutionOutcome::SpecViolation(message),
        Some(EXIT_METHOD_EXCEPTION) => ExecutionOutcome::MethodException(message),
        Some(EXIT_INIT_ERROR) => ExecutionOutcome::InitError(message),
        _ if violation_markers.iter().any(|m| stderr.contains(m.as_str())) => {
            ExecutionOutcome::SpecViolation(message)
        }
        Some(code) => ExecutionOutcome::RuntimeFault(format!("exit {}: {}", code, message)),
        None => ExecutionOutcome::RuntimeFault(format!("killed by signal: {}", message)),
    }
}

impl Invoker for CommandInvoker {
    fn invoke(&self, invocation: &Invocation, cancel: &CancelToken) -> ExecutionOutcome {
        match self.run(invocation, cancel) {
            Ok(outcome) => outcome,
            Err(e) => ExecutionOutcome::InitError(format!(
                "could not run {}: {}",
                self.template.program().display(),
                e
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_VIOLATION_MARKERS;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn markers() -> Vec<String> {
        DEFAULT_VIOLATION_MARKERS
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test_case(Some(0), "", ExecutionOutcome::Valid; "valid")]
    #[test_case(Some(10), "post\n", ExecutionOutcome::SpecViolation("post".to_string()); "spec exit code")]
    #[test_case(Some(11), "npe", ExecutionOutcome::MethodException("npe".to_string()); "method exception")]
    #[test_case(Some(12), "no such method", ExecutionOutcome::InitError("no such method".to_string()); "init error")]
    #[test_case(
        Some(1),
        "org.jmlspecs.JMLInternalNormalPostconditionError: x",
        ExecutionOutcome::SpecViolation("org.jmlspecs.JMLInternalNormalPostconditionError: x".to_string());
        "marker"
    )]
    #[test_case(Some(3), "boom", ExecutionOutcome::RuntimeFault("exit 3: boom".to_string()); "other exit")]
    fn test_classify(code: Option<i32>, stderr: &str, want: ExecutionOutcome) {
        assert_eq!(classify(code, stderr, &markers()), want);
    }
}
