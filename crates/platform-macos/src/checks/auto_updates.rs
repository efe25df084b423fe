//! Software Update and App Store update preferences.

use std::sync::Arc;

use compliance::CommandRunner;

use super::preferences::{key, PreferenceCheck};
use super::command::CheckText;

const SOFTWARE_UPDATE_DOMAIN: &str = "/Library/Preferences/com.apple.SoftwareUpdate";
const APP_STORE_DOMAIN: &str = "/Library/Preferences/com.apple.commerce";

pub const AUTO_INSTALL: CheckText = CheckText {
    id: "dba1dea4-8c96-4b33-95f4-63d68bd0387e",
    pass: "macOS updates are auto-installed",
    fail: "macOS updates are not auto-installed",
};

pub const AUTO_DOWNLOAD: CheckText = CheckText {
    id: "1fa68e99-e152-4ac1-8362-e6b7c54cc4b4",
    pass: "Downloading new updates is enabled",
    fail: "Downloading new updates is disabled",
};

pub const SECURITY_UPDATES: CheckText = CheckText {
    id: "c491097c-6b8a-4cad-ae08-87c8bdfce100",
    pass: "Security updates are enabled",
    fail: "Security updates are disabled",
};

pub const SYSTEM_UPDATES: CheckText = CheckText {
    id: "b56b3b65-b296-489d-bbf2-defc9fee8abd",
    pass: "Security updates are auto-installed",
    fail: "Security updates are not auto-installed",
};

pub const APP_STORE_UPDATES: CheckText = CheckText {
    id: "940e7a88-2dd4-4a50-bf9c-3d842e0a2c94",
    pass: "App Store updates are automatic",
    fail: "App Store updates are not automatic",
};

pub fn auto_install_check(runner: Arc<dyn CommandRunner>) -> PreferenceCheck {
    PreferenceCheck::new(
        AUTO_INSTALL,
        SOFTWARE_UPDATE_DOMAIN,
        &[key("AutomaticallyInstallMacOSUpdates", true)],
        runner,
    )
}

pub fn auto_download_check(runner: Arc<dyn CommandRunner>) -> PreferenceCheck {
    PreferenceCheck::new(
        AUTO_DOWNLOAD,
        SOFTWARE_UPDATE_DOMAIN,
        &[key("AutomaticDownload", false)],
        runner,
    )
}

pub fn security_updates_check(runner: Arc<dyn CommandRunner>) -> PreferenceCheck {
    PreferenceCheck::new(
        SECURITY_UPDATES,
        SOFTWARE_UPDATE_DOMAIN,
        &[key("AutomaticCheckEnabled", false)],
        runner,
    )
}

/// Critical updates and XProtect/MRT data files.
pub fn system_updates_check(runner: Arc<dyn CommandRunner>) -> PreferenceCheck {
    PreferenceCheck::new(
        SYSTEM_UPDATES,
        SOFTWARE_UPDATE_DOMAIN,
        &[key("CriticalUpdateInstall", true), key("ConfigDataInstall", true)],
        runner,
    )
}

pub fn app_store_updates_check(runner: Arc<dyn CommandRunner>) -> PreferenceCheck {
    PreferenceCheck::new(
        APP_STORE_UPDATES,
        APP_STORE_DOMAIN,
        &[key("AutoUpdate", true)],
        runner,
    )
}
