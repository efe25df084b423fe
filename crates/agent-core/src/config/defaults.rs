use std::path::PathBuf;

use super::constants::{DEFAULT_CHECK_INTERVAL_SECS, DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_TEAM_API};
use super::types::{AgentConfig, PermissionsConfig, StorageBackend, TeamConfig};
use super::util::{default_device_id, home_dir};

#[cfg(target_os = "macos")]
fn default_data_root() -> &'static str {
    "/Library/Application Support/PostureAgent"
}

#[cfg(not(target_os = "macos"))]
fn default_data_root() -> &'static str {
    "/var/lib/posture-agent"
}

impl Default for AgentConfig {
    fn default() -> Self {
        let home = home_dir();
        Self {
            device_id: default_device_id(),
            my_checks_dir: home.join(".config").join("posture-agent").join("checks"),
            home_dir: home,
            check_interval_secs: DEFAULT_CHECK_INTERVAL_SECS,
            check_recently_used_only: true,
            my_checks: false,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            ignored_ssh_keys: Vec::new(),
            ignored_user_accounts: Vec::new(),
            storage_backend: StorageBackend::Sqlite,
            storage_path: PathBuf::from(default_data_root()).join("settings.db"),
            team: TeamConfig {
                api_url: DEFAULT_TEAM_API.to_string(),
                id: None,
                auth: None,
                enforced: Vec::new(),
                disabled: Vec::new(),
                send_hw_info: false,
            },
            permissions: PermissionsConfig::default(),
        }
    }
}
