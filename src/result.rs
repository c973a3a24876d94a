use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::BumplineError;

/// Outcome classification of a single target run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    /// Nothing to do, the target is already in the desired state.
    Success,
    /// A change was detected (and applied unless running in dry-run mode).
    Attention,
    /// Something went wrong, the target requires action.
    Failure,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "SUCCESS",
            Outcome::Attention => "ATTENTION",
            Outcome::Failure => "FAILURE",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable report produced by one `Target::run`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetReport {
    pub name: String,
    pub outcome: Outcome,
    pub changed: bool,
    pub dry_run: bool,
    /// Files modified by the target, relative to the SCM working directory.
    pub files: Vec<String>,
    /// Human readable change description, used as commit message.
    pub description: String,
}

impl TargetReport {
    pub fn new(name: &str, dry_run: bool) -> Self {
        Self {
            name: name.to_string(),
            outcome: Outcome::Success,
            changed: false,
            dry_run,
            files: Vec::new(),
            description: String::new(),
        }
    }

    pub fn with_outcome(self, outcome: Outcome) -> Self {
        Self { outcome, ..self }
    }

    pub fn with_change(self, changed: bool, files: Vec<String>, description: String) -> Self {
        let outcome = if changed {
            Outcome::Attention
        } else {
            Outcome::Success
        };
        Self {
            outcome,
            changed,
            files,
            description,
            ..self
        }
    }

    pub fn failed(self) -> Self {
        Self {
            outcome: Outcome::Failure,
            description: "something went wrong during pipeline execution".to_string(),
            ..self
        }
    }

    /// Markdown fragment used as the "Report" section of a pull request body.
    pub fn render(&self) -> String {
        let mut report = format!("* {} - {}", self.outcome, self.name);
        if !self.description.is_empty() {
            report.push_str(&format!("\n\n  {}", self.description.replace('\n', "\n  ")));
        }
        report
    }
}

/// A failed target run: the FAILURE report together with the stage error.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct TargetFailure {
    pub report: TargetReport,
    #[source]
    pub error: BumplineError,
}

impl TargetFailure {
    pub fn new(report: TargetReport, error: BumplineError) -> Self {
        Self {
            report: report.failed(),
            error,
        }
    }

    pub fn outcome(&self) -> Outcome {
        self.report.outcome
    }
}
