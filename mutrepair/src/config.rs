// SPDX-License-Identifier: Apache-2.0

//! Run configuration loaded from TOML.
//!
//! Path values may contain two placeholders that are substituted when the
//! path is read:
//!
//! * `{sep}`: the platform path separator.
//! * `{token}`: a ten character `[0-9A-Z]` token generated when the
//!   configuration is created. It stays fixed for the lifetime of the value
//!   and only changes through [`RepairConfig::reset_sandbox_token`].

use std::path::{PathBuf, MAIN_SEPARATOR_STR};
use std::time::Duration;

use rand::Rng;
use serde::Deserialize;

use crate::error::RepairError;

const TOKEN_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const TOKEN_LEN: usize = 10;

pub const DEFAULT_REPLAY_TIMEOUT_MS: u64 = 300_000;
pub const DEFAULT_REPLAY_GRACE_MS: u64 = 500;

/// Markers in a replay tool's stderr that denote a postcondition violation.
pub const DEFAULT_VIOLATION_MARKERS: &[&str] = &[
    "JMLInternalNormalPostconditionError",
    "JMLExitExceptionalPostconditionError",
];

/// Returns a fresh random token drawn from uppercase letters and digits.
pub fn random_token(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| TOKEN_CHARSET[rng.gen_range(0..TOKEN_CHARSET.len())] as char)
        .collect()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathsConfig {
    /// Where an accepted fix is exported. No export when unset.
    pub output: Option<String>,

    /// Root under which generated mutants are written.
    #[serde(default = "default_mutants")]
    pub mutants: String,

    /// Sandbox directory for one run. Must contain `{token}`.
    #[serde(default = "default_compiling_sandbox")]
    pub compiling_sandbox: String,

    /// Supporting libraries added to every build and replay classpath.
    #[serde(default)]
    pub support_libs: Vec<String>,

    /// Reserved for test generation, which lives outside the repair run.
    /// The next three keys are parsed and expanded so that existing
    /// configuration files load, but nothing in this crate reads them.
    #[serde(default = "default_tests_output")]
    pub tests_output: String,

    /// Reserved, see `tests_output`.
    #[serde(default = "default_tests_namespace")]
    pub tests_namespace: String,

    /// Reserved, see `tests_output`.
    pub test_template: Option<String>,
}

fn temp_root() -> String {
    format!(
        "{}{{sep}}mutrepair",
        std::env::temp_dir().display().to_string().trim_end_matches(MAIN_SEPARATOR_STR)
    )
}

fn default_mutants() -> String {
    format!("{}{{sep}}mutants", temp_root())
}

fn default_compiling_sandbox() -> String {
    format!("{}{{sep}}sandbox-{{token}}", temp_root())
}

fn default_tests_output() -> String {
    format!("{}{{sep}}tests-{{token}}", temp_root())
}

fn default_tests_namespace() -> String {
    "mutrepair.tests".to_string()
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            output: None,
            mutants: default_mutants(),
            compiling_sandbox: default_compiling_sandbox(),
            support_libs: vec![],
            tests_output: default_tests_output(),
            tests_namespace: default_tests_namespace(),
            test_template: None,
        }
    }
}

/// Argument vectors for the external tools. Each entry is a list whose first
/// element names the program; `{placeholder}` tokens in any element are
/// substituted per invocation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolsConfig {
    pub mutate: Option<Vec<String>>,
    pub build: Option<Vec<String>>,
    /// Build with runtime specification checks compiled in.
    pub build_checked: Option<Vec<String>>,
    pub verify: Option<Vec<String>>,
    /// Static conformance check against the specification; optional.
    pub conforms: Option<Vec<String>>,
    pub replay: Option<Vec<String>>,
    pub violation_markers: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LimitsConfig {
    #[serde(default = "default_replay_timeout_ms")]
    pub replay_timeout_ms: u64,
    #[serde(default = "default_replay_grace_ms")]
    pub replay_grace_ms: u64,
}

fn default_replay_timeout_ms() -> u64 {
    DEFAULT_REPLAY_TIMEOUT_MS
}

fn default_replay_grace_ms() -> u64 {
    DEFAULT_REPLAY_GRACE_MS
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            replay_timeout_ms: DEFAULT_REPLAY_TIMEOUT_MS,
            replay_grace_ms: DEFAULT_REPLAY_GRACE_MS,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    paths: PathsConfig,
    #[serde(default)]
    tools: ToolsConfig,
    #[serde(default)]
    limits: LimitsConfig,
}

/// Configuration for one repair run, passed by reference to every component.
#[derive(Debug, Clone)]
pub struct RepairConfig {
    paths: PathsConfig,
    tools: ToolsConfig,
    limits: LimitsConfig,
    token: String,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self::from_raw(RawConfig::default())
    }
}

impl RepairConfig {
    fn from_raw(raw: RawConfig) -> Self {
        Self {
            paths: raw.paths,
            tools: raw.tools,
            limits: raw.limits,
            token: random_token(TOKEN_LEN),
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self, RepairError> {
        let raw: RawConfig =
            toml::from_str(text).map_err(|e| RepairError::Config(e.to_string()))?;
        let config = Self::from_raw(raw);
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &std::path::Path) -> Result<Self, RepairError> {
        log::info!("RepairConfig::from_file; path: {}", path.display());
        let text = std::fs::read_to_string(path).map_err(|e| {
            RepairError::Config(format!("cannot read '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    fn validate(&self) -> Result<(), RepairError> {
        if !self.paths.compiling_sandbox.contains("{token}") {
            return Err(RepairError::Config(format!(
                "paths.compiling_sandbox must contain {{token}}; got '{}'",
                self.paths.compiling_sandbox
            )));
        }
        if self.limits.replay_timeout_ms == 0 {
            return Err(RepairError::Config(
                "limits.replay_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    fn expand(&self, raw: &str) -> PathBuf {
        PathBuf::from(
            raw.replace("{sep}", MAIN_SEPARATOR_STR)
                .replace("{token}", &self.token),
        )
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Draws a new run token and returns the previous one. Every path read
    /// afterwards reflects the new token.
    pub fn reset_sandbox_token(&mut self) -> String {
        let previous = std::mem::replace(&mut self.token, random_token(TOKEN_LEN));
        log::info!(
            "RepairConfig::reset_sandbox_token; {} -> {}",
            previous,
            self.token
        );
        previous
    }

    pub fn output_dir(&self) -> Option<PathBuf> {
        self.paths.output.as_deref().map(|p| self.expand(p))
    }

    pub fn mutants_dir(&self) -> PathBuf {
        self.expand(&self.paths.mutants)
    }

    pub fn sandbox_dir(&self) -> PathBuf {
        self.expand(&self.paths.compiling_sandbox)
    }

    pub fn support_libs(&self) -> Vec<PathBuf> {
        self.paths
            .support_libs
            .iter()
            .map(|p| self.expand(p))
            .collect()
    }

    pub fn tests_output_dir(&self) -> PathBuf {
        self.expand(&self.paths.tests_output)
    }

    pub fn tests_namespace(&self) -> &str {
        &self.paths.tests_namespace
    }

    pub fn test_template(&self) -> Option<PathBuf> {
        self.paths.test_template.as_deref().map(|p| self.expand(p))
    }

    pub fn tools(&self) -> &ToolsConfig {
        &self.tools
    }

    pub fn violation_markers(&self) -> Vec<String> {
        match &self.tools.violation_markers {
            Some(markers) => markers.clone(),
            None => DEFAULT_VIOLATION_MARKERS
                .iter()
                .map(|m| m.to_string())
                .collect(),
        }
    }

    pub fn replay_timeout(&self) -> Duration {
        Duration::from_millis(self.limits.replay_timeout_ms)
    }

    pub fn replay_grace(&self) -> Duration {
        Duration::from_millis(self.limits.replay_grace_ms)
    }

    pub fn with_replay_timeout(mut self, timeout: Duration) -> Self {
        self.limits.replay_timeout_ms = timeout.as_millis().max(1) as u64;
        self
    }

    pub fn with_output_dir(mut self, output: Option<String>) -> Self {
        self.paths.output = output;
        self
    }

    pub fn with_mutants_dir(mut self, mutants: impl Into<String>) -> Self {
        self.paths.mutants = mutants.into();
        self
    }

    /// Overrides the sandbox location; `{token}` is appended as a final
    /// component when the value does not already contain it.
    pub fn with_sandbox_dir(mut self, sandbox: impl Into<String>) -> Self {
        let mut sandbox = sandbox.into();
        if !sandbox.contains("{token}") {
            sandbox.push_str("{sep}{token}");
        }
        self.paths.compiling_sandbox = sandbox;
        self
    }

    pub fn with_tools(mut self, tools: ToolsConfig) -> Self {
        self.tools = tools;
        self
    }
}
