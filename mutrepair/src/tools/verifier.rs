// SPDX-License-Identifier: Apache-2.0

use anyhow::Context;
use serde::Deserialize;

use super::command::{CommandTemplate, Vars};
use crate::counterexample::CounterExample;
use crate::verify::{VerificationOracle, VerificationRequest, Verdict};

#[derive(Debug, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
enum VerifierReport {
    Unsat,
    Sat { counterexample: CounterExample },
    NotDecidable {
        #[serde(default)]
        reason: Option<String>,
    },
}

/// Runs the `verify` tool and reads a JSON verdict from its stdout, plus the
/// optional `conforms` tool whose exit status answers the static check.
pub struct CommandVerifier {
    verify: CommandTemplate,
    conforms: Option<CommandTemplate>,
}

impl CommandVerifier {
    pub fn new(verify: CommandTemplate, conforms: Option<CommandTemplate>) -> Self {
        Self { verify, conforms }
    }
}

fn vars_for(request: &VerificationRequest<'_>) -> Vars {
    let program = request.candidate.program();
    Vars::new()
        .set("source", request.source.display().to_string())
        .set("sandbox", request.sandbox.display().to_string())
        .set("class", program.class_name())
        .set("routine", request.candidate.routine())
        .set("relevant", request.relevant_classes.join(","))
        .set(
            "scope",
            request.scope.map(|s| s.to_string()).unwrap_or_default(),
        )
}

/// Maps a verifier's stdout onto a verdict. Output that is not a verdict is
/// treated as inconclusive.
fn parse_report(stdout: &[u8], stderr: &[u8]) -> Verdict {
    match serde_json::from_slice::<VerifierReport>(stdout) {
        Ok(VerifierReport::Unsat) => Verdict::Unsat,
        Ok(VerifierReport::Sat { counterexample }) => Verdict::Sat(counterexample),
        Ok(VerifierReport::NotDecidable { reason }) => {
            Verdict::NotDecidable(reason.unwrap_or_else(|| "unsupported construct".to_string()))
        }
        Err(e) => Verdict::NotDecidable(format!(
            "unreadable verifier output ({}); stderr: {}",
            e,
            String::from_utf8_lossy(stderr).trim()
        )),
    }
}

impl VerificationOracle for CommandVerifier {
    fn check(&self, request: &VerificationRequest<'_>) -> anyhow::Result<Verdict> {
        let mut command = self.verify.command(&vars_for(request));
        log::info!("CommandVerifier::check; running command: {:?}", command);
        let output = command
            .output()
            .with_context(|| format!("launching {}", self.verify.program().display()))?;
        if !output.status.success() {
            log::debug!("CommandVerifier::check; verifier exited with {}", output.status);
        }
        Ok(parse_report(&output.stdout, &output.stderr))
    }

    fn conforms(&self, request: &VerificationRequest<'_>) -> anyhow::Result<bool> {
        let Some(template) = &self.conforms else {
            return Ok(true);
        };
        let mut command = template.command(&vars_for(request));
        log::debug!("CommandVerifier::conforms; running command: {:?}", command);
        let output = command
            .output()
            .with_context(|| format!("launching {}", template.program().display()))?;
        if !output.status.success() {
            log::info!(
                "CommandVerifier::conforms; rejected: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(output.status.success())
    }
}
