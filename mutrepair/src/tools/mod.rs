// SPDX-License-Identifier: Apache-2.0

//! Adapters that drive the external mutation, build, verification and replay
//! tools named in the `[tools]` configuration table.

mod builder;
mod command;
mod invoker;
mod mutator;
mod verifier;

use std::sync::Arc;

pub use builder::{join_classpath, CommandBuilder};
pub use command::{CommandTemplate, Vars};
pub use invoker::{
    CommandInvoker, EXIT_INIT_ERROR, EXIT_METHOD_EXCEPTION, EXIT_SPEC_VIOLATION, EXIT_VALID,
};
pub use mutator::CommandMutator;
pub use verifier::CommandVerifier;

use crate::config::RepairConfig;
use crate::error::RepairError;
use crate::loader::Builder;
use crate::mutation::MutationGenerator;
use crate::runtime::Invoker;
use crate::verify::VerificationOracle;

/// The collaborators one repair run talks to.
#[derive(Clone)]
pub struct Toolchain {
    pub mutator: Arc<dyn MutationGenerator>,
    pub verifier: Arc<dyn VerificationOracle>,
    pub builder: Arc<dyn Builder>,
    /// Only needed for runtime-assisted checking.
    pub invoker: Option<Arc<dyn Invoker>>,
}

fn required(key: &str, argv: &Option<Vec<String>>) -> Result<CommandTemplate, RepairError> {
    let argv = argv
        .as_ref()
        .ok_or_else(|| RepairError::Config(format!("tools.{} is not configured", key)))?;
    CommandTemplate::resolve(key, argv)
}

fn optional(
    key: &str,
    argv: &Option<Vec<String>>,
) -> Result<Option<CommandTemplate>, RepairError> {
    argv.as_ref()
        .map(|argv| CommandTemplate::resolve(key, argv))
        .transpose()
}

impl Toolchain {
    /// Resolves every configured tool. `mutate`, `build` and `verify` are
    /// mandatory; the rest are picked up when present.
    pub fn from_config(config: &RepairConfig) -> Result<Self, RepairError> {
        let tools = config.tools();
        let mutator = CommandMutator::new(required("mutate", &tools.mutate)?);
        let builder = CommandBuilder::new(
            required("build", &tools.build)?,
            optional("build_checked", &tools.build_checked)?,
        );
        let verifier = CommandVerifier::new(
            required("verify", &tools.verify)?,
            optional("conforms", &tools.conforms)?,
        );
        let invoker = optional("replay", &tools.replay)?.map(|template| {
            Arc::new(CommandInvoker::new(template, config.violation_markers())) as Arc<dyn Invoker>
        });
        Ok(Toolchain {
            mutator: Arc::new(mutator),
            verifier: Arc::new(verifier),
            builder: Arc::new(builder),
            invoker,
        })
    }
}
