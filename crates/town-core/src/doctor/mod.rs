//! Diagnostic checks
//!
//! A [`Check`] scans live state read-only in `run` and may repair what it
//! found in `fix`. `fix` must re-verify its preconditions: arbitrary time and
//! activity can pass between the two calls.
//!
//! [`Doctor`] runs an ordered list of checks and, when asked to fix, re-runs
//! each repaired check so the report reflects the post-fix state.

mod session_name;

pub use session_name::{MalformedSessionNameCheck, SessionRename};

use crate::registry::PrefixRegistry;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Doctor errors
#[derive(Debug, Error)]
pub enum DoctorError {
    #[error("check '{check}' cannot fix problems automatically")]
    NotFixable { check: &'static str },

    /// One or more renames failed; the others were still attempted
    #[error("{} session rename(s) failed: {}", failures.len(), failures.join("; "))]
    RenameFailed { failures: Vec<String> },
}

/// Check outcome severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

/// Grouping used when reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckCategory {
    Core,
    Infrastructure,
    Rig,
    Config,
    Cleanup,
}

impl std::fmt::Display for CheckCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Core => "core",
            Self::Infrastructure => "infrastructure",
            Self::Rig => "rig",
            Self::Config => "config",
            Self::Cleanup => "cleanup",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub status: CheckStatus,
    pub message: String,
    pub details: Vec<String>,
}

impl CheckResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Ok,
            message: message.into(),
            details: Vec::new(),
        }
    }

    pub fn warning(message: impl Into<String>, details: Vec<String>) -> Self {
        Self {
            status: CheckStatus::Warning,
            message: message.into(),
            details,
        }
    }

    pub fn error(message: impl Into<String>, details: Vec<String>) -> Self {
        Self {
            status: CheckStatus::Error,
            message: message.into(),
            details,
        }
    }
}

/// Inputs shared by every check.
#[derive(Debug, Clone)]
pub struct CheckContext {
    pub town_root: PathBuf,
    pub registry: Arc<PrefixRegistry>,
    pub verbose: bool,
}

/// A diagnostic check.
pub trait Check: Send {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn category(&self) -> CheckCategory;

    fn can_fix(&self) -> bool {
        false
    }

    /// Scan live state. Must not mutate it.
    fn run(&mut self, ctx: &CheckContext) -> CheckResult;

    /// Repair what the last `run` found.
    fn fix(&mut self, _ctx: &CheckContext) -> Result<(), DoctorError> {
        Err(DoctorError::NotFixable { check: self.name() })
    }
}

/// One check's entry in a [`DoctorReport`].
#[derive(Debug, Clone, Serialize)]
pub struct CheckOutcome {
    pub name: &'static str,
    pub description: &'static str,
    pub category: CheckCategory,
    pub result: CheckResult,
    /// `true` when `fix` ran for this check
    pub fix_attempted: bool,
    /// Error returned by `fix`, if any
    pub fix_error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DoctorReport {
    pub outcomes: Vec<CheckOutcome>,
}

impl DoctorReport {
    fn count(&self, status: CheckStatus) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.result.status == status)
            .count()
    }

    pub fn ok_count(&self) -> usize {
        self.count(CheckStatus::Ok)
    }

    pub fn warning_count(&self) -> usize {
        self.count(CheckStatus::Warning)
    }

    pub fn error_count(&self) -> usize {
        self.count(CheckStatus::Error)
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }
}

impl std::fmt::Display for DoctorReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} passed, {} warnings, {} failures",
            self.ok_count(),
            self.warning_count(),
            self.error_count()
        )
    }
}

/// Ordered set of checks.
#[derive(Default)]
pub struct Doctor {
    checks: Vec<Box<dyn Check>>,
}

impl Doctor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_check(mut self, check: Box<dyn Check>) -> Self {
        self.checks.push(check);
        self
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Run every check in order; with `fix`, repair fixable findings and re-run.
    pub fn run(&mut self, ctx: &CheckContext, fix: bool) -> DoctorReport {
        let mut report = DoctorReport::default();
        for check in &mut self.checks {
            let mut result = check.run(ctx);
            let mut fix_attempted = false;
            let mut fix_error = None;

            if fix && check.can_fix() && result.status != CheckStatus::Ok {
                fix_attempted = true;
                info!("Fixing {}", check.name());
                if let Err(e) = check.fix(ctx) {
                    warn!("Fix for {} failed: {e}", check.name());
                    fix_error = Some(e.to_string());
                }
                result = check.run(ctx);
            }

            report.outcomes.push(CheckOutcome {
                name: check.name(),
                description: check.description(),
                category: check.category(),
                result,
                fix_attempted,
                fix_error,
            });
        }
        report
    }
}
