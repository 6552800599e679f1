// SPDX-License-Identifier: Apache-2.0

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use super::command::{CommandTemplate, Vars};
use crate::mutation::{Mutant, MutationGenerator, MutationId};
use crate::program::Program;

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    path: PathBuf,
    operator: String,
    #[serde(default)]
    line: Option<u32>,
}

/// Runs the `mutate` tool, which writes variants below `{output}` and prints
/// a JSON array of `{"path", "operator", "line"}` entries on stdout.
pub struct CommandMutator {
    template: CommandTemplate,
}

impl CommandMutator {
    pub fn new(template: CommandTemplate) -> Self {
        Self { template }
    }
}

/// Recovers the source root of `path`, which must end with the class path.
fn root_for(path: &Path, class_path: &Path) -> Option<PathBuf> {
    let mut root = path;
    for _ in class_path.components() {
        root = root.parent()?;
    }
    if root.join(class_path) == path {
        Some(root.to_path_buf())
    } else {
        None
    }
}

impl MutationGenerator for CommandMutator {
    fn generate(
        &self,
        program: &Program,
        routine: &str,
        out_dir: &Path,
    ) -> anyhow::Result<Vec<Mutant>> {
        let vars = Vars::new()
            .set("source", program.file_path().display().to_string())
            .set("source_root", program.source_root().display().to_string())
            .set("class", program.class_name())
            .set("routine", routine)
            .set("extension", program.extension())
            .set("output", out_dir.display().to_string());
        let mut command = self.template.command(&vars);
        log::info!("CommandMutator::generate; running command: {:?}", command);
        let output = command
            .output()
            .with_context(|| format!("launching {}", self.template.program().display()))?;
        if !output.status.success() {
            log::warn!(
                "CommandMutator::generate; mutator exited with {}; stderr: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            );
            return Ok(vec![]);
        }
        let entries: Vec<ManifestEntry> = serde_json::from_slice(&output.stdout)
            .context("parsing mutator manifest")?;

        let class_path = program.class_name_as_path();
        let mut mutants = Vec::with_capacity(entries.len());
        for entry in entries {
            let path = if entry.path.is_absolute() {
                entry.path
            } else {
                out_dir.join(entry.path)
            };
            let Some(root) = root_for(&path, &class_path) else {
                log::warn!(
                    "CommandMutator::generate; {} does not end with {}; skipping",
                    path.display(),
                    class_path.display()
                );
                continue;
            };
            mutants.push(Mutant {
                program: program.relocated(root),
                id: MutationId::new(entry.operator, entry.line, Some(routine.to_string())),
            });
        }
        log::debug!("CommandMutator::generate; mutants: {}", mutants.len());
        Ok(mutants)
    }
}
