use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::store::{KeyValueStore, StoreValue};
use crate::Result;

pub const SNOOZE_ONE_HOUR: Duration = Duration::from_secs(3600);
pub const SNOOZE_ONE_DAY: Duration = Duration::from_secs(3600 * 24);
pub const SNOOZE_ONE_WEEK: Duration = Duration::from_secs(3600 * 24 * 7);

const DEFAULT_DETAIL: &str = "None";

/// Store keys owned by one check. Changing these requires a migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateKeys {
    pub enabled: String,
    pub passes: String,
    pub timestamp: String,
    pub snooze: String,
    pub details: String,
}

impl StateKeys {
    pub fn for_check(id: &str) -> Self {
        Self {
            enabled: format!("{id}-Enabled"),
            passes: format!("{id}-Passes"),
            timestamp: format!("{id}-TS"),
            snooze: format!("{id}-Snooze"),
            details: format!("{id}-Details"),
        }
    }
}

/// Cached state of one check as seen by the UI and the reporter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckState {
    /// Stored user preference; team policy may override it.
    pub enabled: bool,
    pub snooze_until_secs: i64,
    pub last_verdict: bool,
    pub last_run_millis: i64,
    /// Transient; never persisted.
    pub last_error: bool,
    pub detail: String,
}

impl Default for CheckState {
    fn default() -> Self {
        Self {
            enabled: true,
            snooze_until_secs: 0,
            last_verdict: false,
            last_run_millis: 0,
            last_error: false,
            detail: DEFAULT_DETAIL.to_string(),
        }
    }
}

impl CheckState {
    pub(crate) fn load(store: &dyn KeyValueStore, id: &str, last_error: bool) -> Result<Self> {
        let keys = StateKeys::for_check(id);
        let defaults = Self::default();
        Ok(Self {
            enabled: store
                .get(&keys.enabled)?
                .and_then(|v| v.as_bool())
                .unwrap_or(defaults.enabled),
            snooze_until_secs: store
                .get(&keys.snooze)?
                .and_then(|v| v.as_int())
                .unwrap_or(defaults.snooze_until_secs),
            last_verdict: store
                .get(&keys.passes)?
                .and_then(|v| v.as_bool())
                .unwrap_or(defaults.last_verdict),
            last_run_millis: store
                .get(&keys.timestamp)?
                .and_then(|v| v.as_int())
                .unwrap_or(defaults.last_run_millis),
            last_error,
            detail: store
                .get(&keys.details)?
                .and_then(|v| v.into_text())
                .unwrap_or(defaults.detail),
        })
    }

    /// Snooze is active while its deadline is in the future.
    pub fn is_snoozed(&self, now_secs: i64) -> bool {
        self.snooze_until_secs > 0 && self.snooze_until_secs > now_secs
    }

    pub fn has_run(&self) -> bool {
        self.last_run_millis > 0
    }
}

pub(crate) fn store_run_result(
    store: &dyn KeyValueStore,
    id: &str,
    verdict: bool,
    run_millis: i64,
    detail: &str,
) -> Result<()> {
    let keys = StateKeys::for_check(id);
    store.set(&keys.passes, StoreValue::Bool(verdict))?;
    store.set(&keys.timestamp, StoreValue::Int(run_millis))?;
    store.set(&keys.details, StoreValue::Text(detail.to_string()))?;
    Ok(())
}
