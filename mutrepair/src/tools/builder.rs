// SPDX-License-Identifier: Apache-2.0

use anyhow::Context;

use super::command::{CommandTemplate, Vars};
use crate::loader::{BuildMode, BuildOutcome, BuildRequest, Builder};

/// Compiles through the `build` tool, or `build_checked` for runtime-checked
/// builds. A non-zero exit is a failed build whose stderr becomes the
/// diagnostics.
pub struct CommandBuilder {
    plain: CommandTemplate,
    checked: Option<CommandTemplate>,
}

impl CommandBuilder {
    pub fn new(plain: CommandTemplate, checked: Option<CommandTemplate>) -> Self {
        Self { plain, checked }
    }
}

pub fn join_classpath(paths: &[std::path::PathBuf]) -> String {
    let separator = if cfg!(windows) { ";" } else { ":" };
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(separator)
}

impl Builder for CommandBuilder {
    fn supports(&self, mode: BuildMode) -> bool {
        match mode {
            BuildMode::Plain => true,
            BuildMode::RuntimeChecked => self.checked.is_some(),
        }
    }

    fn build(&self, request: &BuildRequest<'_>) -> anyhow::Result<BuildOutcome> {
        let template = match request.mode {
            BuildMode::Plain => &self.plain,
            BuildMode::RuntimeChecked => self.checked.as_ref().ok_or_else(|| {
                anyhow::anyhow!("tools.build_checked is required for runtime-checked builds")
            })?,
        };
        let vars = Vars::new()
            .set("source", request.source.display().to_string())
            .set("sandbox", request.sandbox.display().to_string())
            .set("output", request.output_dir.display().to_string())
            .set("classpath", join_classpath(request.classpath))
            .set("class", request.unit);
        let mut command = template.command(&vars);
        command.current_dir(request.sandbox);
        log::debug!("CommandBuilder::build; running command: {:?}", command);
        let output = command
            .output()
            .with_context(|| format!("launching {}", template.program().display()))?;
        if output.status.success() {
            Ok(BuildOutcome::Built)
        } else {
            Ok(BuildOutcome::Failed {
                diagnostics: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}
