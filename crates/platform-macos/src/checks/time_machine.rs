//! Time Machine configuration and backup state.
//!
//! The backup checks read `/Library/Preferences/com.apple.TimeMachine`,
//! which needs full disk access, and only run while Time Machine itself is
//! enabled and configured.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use compliance::{Checkable, CommandRunner, EvalContext, Outcome, Requirements};
use tracing::debug;

use super::command::{run_program, CheckText};
use crate::plist::{self, PlistValue};

const TMUTIL: &str = "/usr/bin/tmutil";
const TIME_MACHINE_DOMAIN: &str = "/Library/Preferences/com.apple.TimeMachine";

/// Oldest backup that still counts as up to date.
pub const BACKUP_MAX_AGE_DAYS: i64 = 7;

pub const TIME_MACHINE: CheckText = CheckText {
    id: "355a56c1-1098-4b5d-ac8a-a1e8fc52dcfd",
    pass: "Time Machine is on",
    fail: "Time Machine is off",
};

pub const TIME_MACHINE_HAS_BACKUP: CheckText = CheckText {
    id: "455a56c1-1098-4b5d-ac8a-a1e8fc52dcfd",
    pass: "Time Machine has up to date backup",
    fail: "Time Machine is missing up to date backup",
};

pub const TIME_MACHINE_ENCRYPTED: CheckText = CheckText {
    id: "555a56c1-1098-4b5d-ac8a-a1e8fc52dcfd",
    pass: "Time Machine backup is encrypted",
    fail: "Time Machine backup is not encrypted",
};

#[derive(Debug, Clone, PartialEq)]
pub struct BackupDestination {
    pub id: String,
    pub encrypted: bool,
    pub last_scan: Option<DateTime<Utc>>,
}

/// The parts of the Time Machine preferences the checks look at.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeMachineConfig {
    pub auto_backup: bool,
    pub last_destination_id: String,
    pub destinations: Vec<BackupDestination>,
}

impl TimeMachineConfig {
    pub fn from_plist(root: &PlistValue) -> Self {
        let destinations = root
            .get("Destinations")
            .and_then(PlistValue::as_array)
            .unwrap_or_default()
            .iter()
            .map(|dest| BackupDestination {
                id: dest
                    .get("DestinationID")
                    .and_then(PlistValue::as_str)
                    .unwrap_or_default()
                    .to_string(),
                encrypted: dest
                    .get("LastKnownEncryptionState")
                    .and_then(PlistValue::as_str)
                    == Some("Encrypted"),
                last_scan: dest
                    .get("ConsistencyScanDate")
                    .and_then(PlistValue::as_date),
            })
            .collect();

        Self {
            auto_backup: root
                .get("AutoBackup")
                .and_then(PlistValue::as_bool)
                .unwrap_or(false),
            last_destination_id: root
                .get("LastDestinationID")
                .and_then(PlistValue::as_str)
                .unwrap_or_default()
                .to_string(),
            destinations,
        }
    }

    /// Destination of the most recent backup; none before the first backup.
    pub fn last_destination(&self) -> Option<&BackupDestination> {
        if self.last_destination_id.is_empty() {
            return None;
        }
        self.destinations
            .iter()
            .find(|dest| dest.id == self.last_destination_id)
    }

    pub fn has_recent_backup(&self, now: DateTime<Utc>) -> bool {
        let cutoff = now - Duration::days(BACKUP_MAX_AGE_DAYS);
        self.auto_backup
            && self
                .last_destination()
                .and_then(|dest| dest.last_scan)
                .is_some_and(|scan| scan >= cutoff)
    }

    pub fn is_encrypted(&self) -> bool {
        self.auto_backup && self.last_destination().is_some_and(|dest| dest.encrypted)
    }
}

/// Time Machine has a destination and is not being switched off.
pub struct TimeMachineCheck {
    runner: Arc<dyn CommandRunner>,
}

impl TimeMachineCheck {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

impl Checkable for TimeMachineCheck {
    fn id(&self) -> &str {
        TIME_MACHINE.id
    }

    fn title_pass(&self) -> String {
        TIME_MACHINE.pass.to_string()
    }

    fn title_fail(&self) -> String {
        TIME_MACHINE.fail.to_string()
    }

    fn evaluate(&self, _ctx: &EvalContext<'_>) -> Outcome {
        let destinations = match run_program(self.runner.as_ref(), TMUTIL, &["destinationinfo"]) {
            Ok(out) => out,
            Err(err) => return Outcome::Error(format!("tmutil destinationinfo failed: {}", err)),
        };
        let configured = destinations.contains("ID") && destinations.contains("Name");
        if !configured {
            return Outcome::Fail;
        }
        match run_program(self.runner.as_ref(), TMUTIL, &["status"]) {
            Ok(status) => Outcome::from_bool(!status.contains("Stopping = 1")),
            Err(err) => Outcome::Error(format!("tmutil status failed: {}", err)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupProperty {
    UpToDate,
    Encrypted,
}

/// A property of the latest Time Machine backup.
pub struct TimeMachineBackupCheck {
    property: BackupProperty,
    runner: Arc<dyn CommandRunner>,
    last_config: Mutex<Option<TimeMachineConfig>>,
}

impl TimeMachineBackupCheck {
    pub fn new(property: BackupProperty, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            property,
            runner,
            last_config: Mutex::new(None),
        }
    }

    fn text(&self) -> CheckText {
        match self.property {
            BackupProperty::UpToDate => TIME_MACHINE_HAS_BACKUP,
            BackupProperty::Encrypted => TIME_MACHINE_ENCRYPTED,
        }
    }
}

impl Checkable for TimeMachineBackupCheck {
    fn id(&self) -> &str {
        self.text().id
    }

    fn title_pass(&self) -> String {
        self.text().pass.to_string()
    }

    fn title_fail(&self) -> String {
        self.text().fail.to_string()
    }

    fn evaluate(&self, ctx: &EvalContext<'_>) -> Outcome {
        let config = plist::read_domain(self.runner.as_ref(), TIME_MACHINE_DOMAIN)
            .map(|root| TimeMachineConfig::from_plist(&root));
        let passed = match (&config, self.property) {
            (None, _) => {
                debug!(check_id = self.id(), "Time Machine preferences unreadable");
                false
            }
            (Some(config), BackupProperty::UpToDate) => {
                let now = DateTime::from_timestamp_millis(ctx.now_millis).unwrap_or_default();
                config.has_recent_backup(now)
            }
            (Some(config), BackupProperty::Encrypted) => config.is_encrypted(),
        };
        *self
            .last_config
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = config;
        Outcome::from_bool(passed)
    }

    fn detail(&self) -> String {
        let last = self
            .last_config
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(config) = last.as_ref() else {
            return "Time Machine preferences unreadable".to_string();
        };
        let scan = config
            .last_destination()
            .and_then(|dest| dest.last_scan)
            .map_or_else(|| "never".to_string(), |scan| scan.to_rfc3339());
        format!(
            "autoBackup={} destination={} lastBackup={}",
            config.auto_backup,
            if config.last_destination_id.is_empty() {
                "none"
            } else {
                config.last_destination_id.as_str()
            },
            scan
        )
    }

    fn required_check_id(&self) -> Option<&str> {
        Some(TIME_MACHINE.id)
    }

    fn requirements(&self) -> Requirements {
        Requirements {
            full_disk_access: true,
            ..Requirements::default()
        }
    }
}
