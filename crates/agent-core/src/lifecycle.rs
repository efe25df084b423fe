mod team;
mod tick;
mod timing;

use std::sync::Arc;
use std::time::Duration;

use compliance::{CheckRegistry, ReportingDevice, StaticTeamPolicy};
use tracing::info;

use crate::config::AgentConfig;

pub use team::TeamClient;
pub(crate) use timing::now_unix;
use timing::interval_due;

/// Store key holding the millisecond timestamp of the last full run.
pub const LAST_CHECK_KEY: &str = "lastCheck";
/// How long the run loop idles between ticks.
pub const TICK_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Outcome of one full pass over every claim.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub claims: usize,
    pub passed_claims: usize,
    pub failed_claims: usize,
}

pub struct AgentRuntime {
    config: AgentConfig,
    registry: Arc<CheckRegistry>,
    team_policy: Arc<StaticTeamPolicy>,
    team_client: Option<TeamClient>,
    device: Option<ReportingDevice>,
    device_linked: bool,
    last_run_unix: Option<i64>,
    tick_count: u64,
}

impl AgentRuntime {
    pub fn new(
        config: AgentConfig,
        registry: CheckRegistry,
        team_policy: Arc<StaticTeamPolicy>,
        team_client: Option<TeamClient>,
    ) -> Self {
        info!(
            enrolled = team_client.is_some(),
            interval_secs = config.check_interval_secs,
            "agent runtime ready"
        );
        Self {
            config,
            registry: Arc::new(registry),
            team_policy,
            team_client,
            device: None,
            device_linked: false,
            last_run_unix: None,
            tick_count: 0,
        }
    }

    /// Identity attached to reports and linked to the team on first tick.
    pub fn with_device(mut self, device: ReportingDevice) -> Self {
        self.device = Some(device);
        self
    }

    fn interval_secs(&self) -> i64 {
        i64::try_from(self.config.check_interval_secs.max(1)).unwrap_or(i64::MAX)
    }

    pub(crate) fn run_due(&self, now_unix: i64) -> bool {
        interval_due(self.last_run_unix, now_unix, self.interval_secs())
    }

    #[cfg(test)]
    pub(crate) fn registry(&self) -> &Arc<CheckRegistry> {
        &self.registry
    }

    #[cfg(test)]
    pub(crate) fn last_run_unix(&self) -> Option<i64> {
        self.last_run_unix
    }

    #[cfg(test)]
    pub(crate) fn tick_count(&self) -> u64 {
        self.tick_count
    }
}

#[cfg(test)]
mod tests;
