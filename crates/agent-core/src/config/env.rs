use std::path::PathBuf;

use tracing::warn;

use super::types::AgentConfig;
use super::util::{env_bool, env_non_empty, env_u64, parse_backend, split_csv};

impl AgentConfig {
    pub(super) fn apply_env_overrides(&mut self) {
        self.apply_env_agent();
        self.apply_env_checks();
        self.apply_env_storage();
        self.apply_env_team();
        self.apply_env_permissions();
    }

    fn apply_env_agent(&mut self) {
        if let Some(v) = env_non_empty("POSTURE_DEVICE_ID") {
            self.device_id = v;
        }
        if let Some(v) = env_non_empty("POSTURE_HOME_DIR") {
            self.home_dir = PathBuf::from(v);
        }
    }

    fn apply_env_checks(&mut self) {
        if let Some(v) = env_u64("POSTURE_CHECK_INTERVAL_SECS").filter(|v| *v > 0) {
            self.check_interval_secs = v;
        }
        if let Some(v) = env_bool("POSTURE_CHECK_RECENTLY_USED_ONLY") {
            self.check_recently_used_only = v;
        }
        if let Some(v) = env_bool("POSTURE_MY_CHECKS") {
            self.my_checks = v;
        }
        if let Some(v) = env_non_empty("POSTURE_MY_CHECKS_DIR") {
            self.my_checks_dir = PathBuf::from(v);
        }
        if let Some(v) = env_u64("POSTURE_FETCH_TIMEOUT_SECS").filter(|v| *v > 0) {
            self.fetch_timeout_secs = v;
        }
        if let Some(v) = env_non_empty("POSTURE_IGNORED_SSH_KEYS") {
            self.ignored_ssh_keys = split_csv(&v);
        }
        if let Some(v) = env_non_empty("POSTURE_IGNORED_USER_ACCOUNTS") {
            self.ignored_user_accounts = split_csv(&v);
        }
    }

    fn apply_env_storage(&mut self) {
        if let Some(raw) = env_non_empty("POSTURE_STORAGE_BACKEND") {
            match parse_backend(&raw) {
                Some(backend) => self.storage_backend = backend,
                None => warn!(backend = %raw, "invalid POSTURE_STORAGE_BACKEND ignored"),
            }
        }
        if let Some(v) = env_non_empty("POSTURE_STORAGE_PATH") {
            self.storage_path = PathBuf::from(v);
        }
    }

    fn apply_env_team(&mut self) {
        if let Some(v) = env_non_empty("POSTURE_TEAM_API") {
            self.team.api_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = env_non_empty("POSTURE_TEAM_ID") {
            self.team.id = Some(v);
        }
        if let Some(v) = env_non_empty("POSTURE_TEAM_AUTH") {
            self.team.auth = Some(v);
        }
        if let Some(v) = env_non_empty("POSTURE_TEAM_ENFORCED") {
            self.team.enforced = split_csv(&v);
        }
        if let Some(v) = env_non_empty("POSTURE_TEAM_DISABLED") {
            self.team.disabled = split_csv(&v);
        }
        if let Some(v) = env_bool("POSTURE_TEAM_SEND_HW_INFO") {
            self.team.send_hw_info = v;
        }
    }

    fn apply_env_permissions(&mut self) {
        if let Some(v) = env_bool("POSTURE_FULL_DISK_ACCESS") {
            self.permissions.full_disk_access = v;
        }
        if let Some(v) = env_bool("POSTURE_AUTOMATION_ACCESS") {
            self.permissions.automation_access = v;
        }
        if let Some(v) = env_bool("POSTURE_HELPER_AUTHORIZED") {
            self.permissions.helper_authorized = v;
        }
    }
}
