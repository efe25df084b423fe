//! Security check lifecycle.
//!
//! A [`Checkable`] is a single security assertion. Its persisted state
//! (enabled flag, last verdict, timestamps, snooze, diagnostic detail) lives
//! in a [`KeyValueStore`] keyed by the check id and is only ever mutated
//! through the [`CheckRegistry`]. Checks are grouped into [`Claim`]s whose
//! aggregate verdict is derived from cached state on every access.

use std::fmt;

mod check;
mod claim;
mod clock;
mod command;
mod custom;
mod device;
mod reason;
mod registry;
mod report;
mod state;
mod store;
mod team;

pub use check::{
    Checkable, ErrorFallback, EvalContext, Outcome, Precondition, Preferences, Requirements,
};
pub use claim::Claim;
pub use clock::{Clock, ManualClock, SystemClock};
pub use command::{CommandRunner, ShellCommandRunner};
pub use custom::{
    load_custom_rules, parse_custom_rule, register_custom_checks, CustomCheck, CustomRule,
    ExpectedResult, MY_CHECKS_CLAIM_TITLE,
};
pub use device::{ReportingDevice, HARDWARE_INFO_DISABLED};
pub use reason::{DisabledReason, Permissions};
pub use registry::{CheckRegistry, StateObserver};
pub use report::{CheckSnapshot, Report, ReportStatus};
pub use state::{CheckState, StateKeys, SNOOZE_ONE_DAY, SNOOZE_ONE_HOUR, SNOOZE_ONE_WEEK};
pub use store::{KeyValueStore, MemoryStore, SqliteStore, StoreValue};
pub use team::{NoTeam, StaticTeamPolicy, TeamPolicy};

#[derive(Debug)]
pub enum ComplianceError {
    UnknownCheck(String),
    DuplicateCheckId(String),
    Store(String),
    RuleParse(String),
}

impl fmt::Display for ComplianceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownCheck(id) => write!(f, "unknown check {}", id),
            Self::DuplicateCheckId(id) => write!(f, "duplicate check id {}", id),
            Self::Store(msg) => write!(f, "settings store failure: {}", msg),
            Self::RuleParse(msg) => write!(f, "failed parsing custom rule: {}", msg),
        }
    }
}

impl std::error::Error for ComplianceError {}

impl From<rusqlite::Error> for ComplianceError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Store(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ComplianceError>;

/// Compares dotted numeric versions component-wise; missing components are zero.
pub fn version_gte(current: &str, minimum: &str) -> bool {
    fn parse_parts(raw: &str) -> Vec<u64> {
        raw.split('.')
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .map(|p| p.parse::<u64>().unwrap_or(0))
            .collect()
    }

    let a = parse_parts(current);
    let b = parse_parts(minimum);
    let len = a.len().max(b.len());
    for i in 0..len {
        let av = a.get(i).copied().unwrap_or(0);
        let bv = b.get(i).copied().unwrap_or(0);
        if av > bv {
            return true;
        }
        if av < bv {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests;
