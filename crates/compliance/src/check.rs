use serde::{Deserialize, Serialize};

use crate::state::CheckState;

/// Result of a single evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Pass,
    Fail,
    /// Evaluation could not complete. The stored verdict is chosen by
    /// [`Checkable::error_fallback`] and the error flag is raised.
    Error(String),
}

impl Outcome {
    pub fn from_bool(passed: bool) -> Self {
        if passed {
            Self::Pass
        } else {
            Self::Fail
        }
    }
}

/// Verdict stored when evaluation reports [`Outcome::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorFallback {
    #[default]
    Fail,
    PreviousVerdict,
}

/// Check-specific runnability gate, evaluated after the generic ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
    Met,
    Unmet(String),
}

impl Precondition {
    pub fn is_met(&self) -> bool {
        matches!(self, Self::Met)
    }
}

/// OS permissions a check needs before it can be evaluated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Requirements {
    pub full_disk_access: bool,
    pub automation_access: bool,
    pub privileged_helper: bool,
}

/// Global user preferences consulted by checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    /// Only check applications used within the last week.
    #[serde(default = "default_true")]
    pub check_recently_used_only: bool,
    /// Load user-authored rules into the "My Checks" claim.
    #[serde(default)]
    pub my_checks: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            check_recently_used_only: true,
            my_checks: false,
        }
    }
}

fn default_true() -> bool {
    true
}

/// What an evaluation can see: the cached state from the previous run and
/// the global preferences.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub previous: &'a CheckState,
    pub preferences: &'a Preferences,
    pub now_millis: i64,
}

/// A single security assertion.
///
/// Implementations hold definition data only. Everything that changes over
/// time is owned by the registry and handed in through [`EvalContext`].
pub trait Checkable: Send + Sync {
    fn id(&self) -> &str;

    fn title_pass(&self) -> String;

    fn title_fail(&self) -> String;

    /// Title matching a persisted state.
    fn title_for(&self, state: &CheckState) -> String {
        if state.last_verdict {
            self.title_pass()
        } else {
            self.title_fail()
        }
    }

    fn evaluate(&self, ctx: &EvalContext<'_>) -> Outcome;

    /// Diagnostic text describing the latest evaluation.
    fn detail(&self) -> String {
        "None".to_string()
    }

    fn preconditions(&self, _preferences: &Preferences) -> Precondition {
        Precondition::Met
    }

    /// Id of a check that must be active and runnable for this one to run.
    fn required_check_id(&self) -> Option<&str> {
        None
    }

    fn requirements(&self) -> Requirements {
        Requirements::default()
    }

    fn error_fallback(&self) -> ErrorFallback {
        ErrorFallback::Fail
    }

    /// Whether a non-runnable instance is counted as "off" in reports.
    fn report_if_disabled(&self) -> bool {
        true
    }
}
