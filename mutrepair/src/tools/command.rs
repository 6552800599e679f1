// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Command;

use crate::error::RepairError;

/// An argument vector with `{name}` placeholders, program resolved up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    key: String,
    program: PathBuf,
    args: Vec<String>,
}

/// Placeholder values for one invocation.
#[derive(Debug, Default, Clone)]
pub struct Vars(BTreeMap<&'static str, String>);

impl Vars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.0.insert(name, value.into());
        self
    }
}

impl CommandTemplate {
    /// Resolves the program named by `argv[0]` on `PATH` (or as a path).
    /// `key` names the configuration entry, for error messages.
    pub fn resolve(key: &str, argv: &[String]) -> Result<Self, RepairError> {
        let (program, args) = argv.split_first().ok_or_else(|| {
            RepairError::Config(format!("tools.{} must name a program", key))
        })?;
        let program = which::which(program).map_err(|e| RepairError::ToolNotFound {
            tool: program.clone(),
            reason: format!("tools.{}: {}", key, e),
        })?;
        log::debug!(
            "CommandTemplate::resolve; {} -> {}",
            key,
            program.display()
        );
        Ok(Self {
            key: key.to_string(),
            program,
            args: args.to_vec(),
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn program(&self) -> &std::path::Path {
        &self.program
    }

    /// Substitutes `vars` into every argument. Unknown placeholders are left
    /// as written.
    pub fn expand_args(&self, vars: &Vars) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                let mut arg = arg.clone();
                for (name, value) in vars.0.iter() {
                    arg = arg.replace(&format!("{{{}}}", name), value);
                }
                arg
            })
            .collect()
    }

    pub fn command(&self, vars: &Vars) -> Command {
        let mut command = Command::new(&self.program);
        command.args(self.expand_args(vars));
        command
    }
}
