//! Installed application discovery for update checks.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use app_updates::{AppDefinition, InstallInspector};
use chrono::{DateTime, Utc};
use compliance::{Clock, CommandRunner};
use tracing::debug;

use crate::checks::command::run_program;
use crate::plist::{self, PlistValue};

const MDLS_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";

/// Finds `<name>.app` bundles under the application folders.
pub struct MacInstallInspector {
    roots: Vec<PathBuf>,
    runner: Arc<dyn CommandRunner>,
    clock: Arc<dyn Clock>,
}

impl MacInstallInspector {
    /// Searches `/Applications`, then `~/Applications`.
    pub fn new(home: &Path, runner: Arc<dyn CommandRunner>, clock: Arc<dyn Clock>) -> Self {
        Self {
            roots: vec![PathBuf::from("/Applications"), home.join("Applications")],
            runner,
            clock,
        }
    }

    pub fn with_roots(mut self, roots: Vec<PathBuf>) -> Self {
        self.roots = roots;
        self
    }

    fn bundle(&self, app: &AppDefinition) -> Option<PathBuf> {
        let name = format!("{}.app", app.app_name);
        self.roots
            .iter()
            .map(|root| root.join(&name))
            .find(|bundle| info_plist(bundle).is_file())
    }
}

fn info_plist(bundle: &Path) -> PathBuf {
    bundle.join("Contents").join("Info.plist")
}

/// `kMDItemLastUsedDate` as printed by `mdls -raw`; `(null)` when unknown.
pub fn parse_last_used(output: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(output.trim(), MDLS_DATE_FORMAT)
        .ok()
        .map(|date| date.with_timezone(&Utc))
}

impl InstallInspector for MacInstallInspector {
    fn install_path(&self, app: &AppDefinition) -> Option<PathBuf> {
        self.bundle(app).map(|bundle| info_plist(&bundle))
    }

    fn installed_version(&self, app: &AppDefinition) -> Option<String> {
        let path = self.install_path(app)?;
        let info = plist::read_file(self.runner.as_ref(), &path)?;
        let version = info.get(&app.version_key).and_then(PlistValue::as_str);
        if version.is_none() {
            debug!(app = %app.app_name, key = %app.version_key, "bundle has no version key");
        }
        version.map(str::to_string)
    }

    fn days_since_last_use(&self, app: &AppDefinition) -> Option<u64> {
        let bundle = self.bundle(app)?.display().to_string();
        let output = run_program(
            self.runner.as_ref(),
            "/usr/bin/mdls",
            &["-raw", "-name", "kMDItemLastUsedDate", &bundle],
        )
        .ok()?;
        let last_used = parse_last_used(&output)?;
        let now = DateTime::from_timestamp_millis(self.clock.now_millis()).unwrap_or_default();
        Some(u64::try_from((now - last_used).num_days()).unwrap_or(0))
    }

    fn from_app_store(&self, app: &AppDefinition) -> bool {
        self.bundle(app).is_some_and(|bundle| {
            bundle
                .join("Contents")
                .join("_MASReceipt")
                .join("receipt")
                .is_file()
        })
    }
}
