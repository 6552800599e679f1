// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::path::PathBuf;

/// Errors that abort a repair run before or during the search.
///
/// Rejections of individual candidates (failed builds, inconclusive
/// verification, falsifying replays) are verdicts, not errors.
#[derive(Debug)]
pub enum RepairError {
    /// The subject source file is missing, not a regular file, or unreadable.
    SubjectNotReadable { path: PathBuf, reason: String },
    /// The subject does not declare the requested routine.
    RoutineNotFound { class_name: String, routine: String },
    InvalidArgument(String),
    /// The unmodified subject does not build or does not conform to its
    /// specification's static requirements.
    SubjectInvalid { class_name: String, diagnostics: String },
    /// Sandbox creation, population, or teardown failed.
    Sandbox { path: PathBuf, reason: String },
    Config(String),
    ToolNotFound { tool: String, reason: String },
    /// A collaborator failed mid-search (tool could not be launched, I/O).
    Search(anyhow::Error),
}

impl fmt::Display for RepairError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepairError::SubjectNotReadable { path, reason } => {
                write!(f, "cannot read subject '{}': {}", path.display(), reason)
            }
            RepairError::RoutineNotFound {
                class_name,
                routine,
            } => write!(
                f,
                "routine '{}' is not declared in '{}'",
                routine, class_name
            ),
            RepairError::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            RepairError::SubjectInvalid {
                class_name,
                diagnostics,
            } => write!(
                f,
                "subject '{}' does not compile or conform: {}",
                class_name, diagnostics
            ),
            RepairError::Sandbox { path, reason } => {
                write!(f, "sandbox '{}': {}", path.display(), reason)
            }
            RepairError::Config(msg) => write!(f, "configuration error: {}", msg),
            RepairError::ToolNotFound { tool, reason } => {
                write!(f, "tool '{}' not found: {}", tool, reason)
            }
            RepairError::Search(e) => write!(f, "search aborted: {:#}", e),
        }
    }
}

impl std::error::Error for RepairError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RepairError::Search(e) => Some(&**e),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for RepairError {
    fn from(e: anyhow::Error) -> Self {
        RepairError::Search(e)
    }
}

impl RepairError {
    pub(crate) fn sandbox(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        RepairError::Sandbox {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Short machine-friendly category, used by the driver's error report.
    pub fn kind(&self) -> &'static str {
        match self {
            RepairError::SubjectNotReadable { .. } => "subject-not-readable",
            RepairError::RoutineNotFound { .. } => "routine-not-found",
            RepairError::InvalidArgument(_) => "invalid-argument",
            RepairError::SubjectInvalid { .. } => "subject-invalid",
            RepairError::Sandbox { .. } => "sandbox",
            RepairError::Config(_) => "config",
            RepairError::ToolNotFound { .. } => "tool-not-found",
            RepairError::Search(_) => "search",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_mentions_routine_and_class() {
        let e = RepairError::RoutineNotFound {
            class_name: "demo.Calc".to_string(),
            routine: "addTwo".to_string(),
        };
        assert_eq!(
            e.to_string(),
            "routine 'addTwo' is not declared in 'demo.Calc'"
        );
        assert_eq!(e.kind(), "routine-not-found");
    }

    #[test]
    fn test_search_error_exposes_source() {
        use std::error::Error;
        let e = RepairError::from(anyhow::anyhow!("mutator crashed"));
        assert!(e.source().is_some());
        assert!(e.to_string().contains("mutator crashed"));
    }
}
