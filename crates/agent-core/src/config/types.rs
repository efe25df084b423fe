use std::path::PathBuf;
use std::time::Duration;

use compliance::{Permissions, Preferences};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Sqlite,
    Memory,
}

/// Dashboard enrollment. Reports are only sent when both `id` and `auth`
/// are set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamConfig {
    pub api_url: String,
    pub id: Option<String>,
    pub auth: Option<String>,
    pub enforced: Vec<String>,
    pub disabled: Vec<String>,
    /// Share the hardware model and serial number with the dashboard.
    pub send_hw_info: bool,
}

impl TeamConfig {
    pub fn is_enrolled(&self) -> bool {
        self.id.is_some() && self.auth.is_some()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PermissionsConfig {
    pub full_disk_access: bool,
    pub automation_access: bool,
    pub helper_authorized: bool,
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub device_id: String,
    pub home_dir: PathBuf,
    pub check_interval_secs: u64,
    pub check_recently_used_only: bool,
    pub my_checks: bool,
    pub my_checks_dir: PathBuf,
    pub fetch_timeout_secs: u64,
    pub ignored_ssh_keys: Vec<String>,
    /// Local accounts the unused-accounts check leaves alone.
    pub ignored_user_accounts: Vec<String>,
    pub storage_backend: StorageBackend,
    pub storage_path: PathBuf,
    pub team: TeamConfig,
    pub permissions: PermissionsConfig,
}

impl AgentConfig {
    pub fn preferences(&self) -> Preferences {
        Preferences {
            check_recently_used_only: self.check_recently_used_only,
            my_checks: self.my_checks,
        }
    }

    pub fn permissions(&self) -> Permissions {
        Permissions {
            full_disk_access: self.permissions.full_disk_access,
            automation_access: self.permissions.automation_access,
            helper_authorized: self.permissions.helper_authorized,
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }
}
