use std::path::PathBuf;

use crate::catalog::AppDefinition;

/// Days without use after which an app no longer counts as recently used.
pub const RECENT_USE_DAYS: u64 = 7;

/// Reads what is installed on this device.
pub trait InstallInspector: Send + Sync {
    /// Path of the bundle's `Info.plist`, if the app is installed.
    fn install_path(&self, app: &AppDefinition) -> Option<PathBuf>;

    fn installed_version(&self, app: &AppDefinition) -> Option<String>;

    /// `None` when the system does not know.
    fn days_since_last_use(&self, app: &AppDefinition) -> Option<u64>;

    /// Installed through the App Store, so the App Store is the source of
    /// truth for the latest version.
    fn from_app_store(&self, _app: &AppDefinition) -> bool {
        false
    }
}

/// Unknown last use counts as recent.
pub fn used_recently(days_since_last_use: Option<u64>) -> bool {
    days_since_last_use.map_or(true, |days| days <= RECENT_USE_DAYS)
}
