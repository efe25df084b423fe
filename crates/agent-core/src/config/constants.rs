#[cfg(target_os = "macos")]
pub(super) const AGENT_CONFIG_CANDIDATES: [&str; 3] = [
    "/Library/Application Support/PostureAgent/agent.toml",
    "./conf/agent.toml",
    "./agent.toml",
];

#[cfg(not(target_os = "macos"))]
pub(super) const AGENT_CONFIG_CANDIDATES: [&str; 3] = [
    "/etc/posture-agent/agent.toml",
    "./conf/agent.toml",
    "./agent.toml",
];

pub(super) const DEFAULT_TEAM_API: &str = "https://dash.paretosecurity.com/api/v1/team";
pub(super) const DEFAULT_CHECK_INTERVAL_SECS: u64 = 3600;
pub(super) const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;
