use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

use super::paths::resolve_config_path;
use super::types::AgentConfig;
use super::util::{non_empty, parse_backend};

impl AgentConfig {
    pub(super) fn apply_file_config(&mut self) -> Result<bool> {
        let Some(path) = resolve_config_path()? else {
            return Ok(false);
        };

        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("failed reading config file {}", path.display()))?;
        let file_cfg: FileConfig = toml::from_str(&raw)
            .with_context(|| format!("failed parsing TOML config {}", path.display()))?;

        self.apply_file_agent(file_cfg.agent);
        self.apply_file_checks(file_cfg.checks);
        self.apply_file_storage(file_cfg.storage);
        self.apply_file_team(file_cfg.team);
        self.apply_file_permissions(file_cfg.permissions);

        Ok(true)
    }

    fn apply_file_agent(&mut self, agent: Option<FileAgentConfig>) {
        let Some(agent) = agent else {
            return;
        };
        if let Some(v) = non_empty(agent.device_id) {
            self.device_id = v;
        }
        if let Some(v) = non_empty(agent.home_dir) {
            self.home_dir = PathBuf::from(v);
        }
    }

    fn apply_file_checks(&mut self, checks: Option<FileChecksConfig>) {
        let Some(checks) = checks else {
            return;
        };
        if let Some(v) = checks.interval_secs.filter(|v| *v > 0) {
            self.check_interval_secs = v;
        }
        if let Some(v) = checks.recently_used_only {
            self.check_recently_used_only = v;
        }
        if let Some(v) = checks.my_checks {
            self.my_checks = v;
        }
        if let Some(v) = non_empty(checks.my_checks_dir) {
            self.my_checks_dir = PathBuf::from(v);
        }
        if let Some(v) = checks.fetch_timeout_secs.filter(|v| *v > 0) {
            self.fetch_timeout_secs = v;
        }
        if let Some(v) = checks.ignored_ssh_keys {
            self.ignored_ssh_keys = v;
        }
        if let Some(v) = checks.ignored_user_accounts {
            self.ignored_user_accounts = v;
        }
    }

    fn apply_file_storage(&mut self, storage: Option<FileStorageConfig>) {
        let Some(storage) = storage else {
            return;
        };
        if let Some(raw) = non_empty(storage.backend) {
            match parse_backend(&raw) {
                Some(backend) => self.storage_backend = backend,
                None => warn!(backend = %raw, "unknown storage backend in config, keeping default"),
            }
        }
        if let Some(v) = non_empty(storage.path) {
            self.storage_path = PathBuf::from(v);
        }
    }

    fn apply_file_team(&mut self, team: Option<FileTeamConfig>) {
        let Some(team) = team else {
            return;
        };
        if let Some(v) = non_empty(team.api_url) {
            self.team.api_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = non_empty(team.id) {
            self.team.id = Some(v);
        }
        if let Some(v) = non_empty(team.auth) {
            self.team.auth = Some(v);
        }
        if let Some(v) = team.enforced {
            self.team.enforced = v;
        }
        if let Some(v) = team.disabled {
            self.team.disabled = v;
        }
        if let Some(v) = team.send_hw_info {
            self.team.send_hw_info = v;
        }
    }

    fn apply_file_permissions(&mut self, permissions: Option<FilePermissionsConfig>) {
        let Some(permissions) = permissions else {
            return;
        };
        if let Some(v) = permissions.full_disk_access {
            self.permissions.full_disk_access = v;
        }
        if let Some(v) = permissions.automation_access {
            self.permissions.automation_access = v;
        }
        if let Some(v) = permissions.helper_authorized {
            self.permissions.helper_authorized = v;
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
struct FileConfig {
    #[serde(default)]
    agent: Option<FileAgentConfig>,
    #[serde(default)]
    checks: Option<FileChecksConfig>,
    #[serde(default)]
    storage: Option<FileStorageConfig>,
    #[serde(default)]
    team: Option<FileTeamConfig>,
    #[serde(default)]
    permissions: Option<FilePermissionsConfig>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct FileAgentConfig {
    #[serde(default)]
    device_id: Option<String>,
    #[serde(default)]
    home_dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct FileChecksConfig {
    #[serde(default)]
    interval_secs: Option<u64>,
    #[serde(default)]
    recently_used_only: Option<bool>,
    #[serde(default)]
    my_checks: Option<bool>,
    #[serde(default)]
    my_checks_dir: Option<String>,
    #[serde(default)]
    fetch_timeout_secs: Option<u64>,
    #[serde(default)]
    ignored_ssh_keys: Option<Vec<String>>,
    #[serde(default)]
    ignored_user_accounts: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct FileStorageConfig {
    #[serde(default)]
    backend: Option<String>,
    #[serde(default)]
    path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct FileTeamConfig {
    #[serde(default)]
    api_url: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    auth: Option<String>,
    #[serde(default)]
    enforced: Option<Vec<String>>,
    #[serde(default)]
    disabled: Option<Vec<String>>,
    #[serde(default)]
    send_hw_info: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct FilePermissionsConfig {
    #[serde(default)]
    full_disk_access: Option<bool>,
    #[serde(default)]
    automation_access: Option<bool>,
    #[serde(default)]
    helper_authorized: Option<bool>,
}
