use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use compliance::{Checkable, ErrorFallback, EvalContext, Outcome, Precondition, Preferences};
use tracing::{debug, info, warn};

use crate::catalog::AppDefinition;
use crate::connectivity::Connectivity;
use crate::fetch::{CachedFetcher, HttpFetcher};
use crate::install::{used_recently, InstallInspector};
use crate::latest::LatestVersionCache;
use crate::source::VendorSource;
use crate::version::AppVersion;

/// Collaborators shared by every [`AppCheck`].
pub struct UpdateServices {
    pub install: Arc<dyn InstallInspector>,
    pub connectivity: Arc<dyn Connectivity>,
    pub fetcher: Arc<CachedFetcher>,
    pub latest: Arc<LatestVersionCache>,
}

#[derive(Debug, Default)]
struct LastLookup {
    install_path: Option<PathBuf>,
    installed: Option<AppVersion>,
    latest: Option<AppVersion>,
}

/// "Is this installed application up to date?"
pub struct AppCheck {
    app: AppDefinition,
    services: Arc<UpdateServices>,
    last: Mutex<LastLookup>,
}

impl AppCheck {
    pub fn new(app: AppDefinition, services: Arc<UpdateServices>) -> Self {
        Self {
            app,
            services,
            last: Mutex::new(LastLookup::default()),
        }
    }

    pub fn app(&self) -> &AppDefinition {
        &self.app
    }

    pub fn is_installed(&self) -> bool {
        self.services.install.install_path(&self.app).is_some()
    }

    pub fn used_recently(&self) -> bool {
        used_recently(self.services.install.days_since_last_use(&self.app))
    }

    pub fn installed_version(&self) -> Option<AppVersion> {
        self.services
            .install
            .installed_version(&self.app)
            .map(|raw| self.app.scheme.installed(&raw))
    }

    fn source(&self) -> VendorSource {
        if self.services.install.from_app_store(&self.app) {
            VendorSource::AppStore
        } else {
            self.app.source.clone()
        }
    }

    /// Latest published version: the day cache first, then the vendor.
    /// Any lookup failure resolves to the sentinel.
    pub fn latest_version(&self) -> AppVersion {
        let bundle = &self.app.bundle_id;
        match self.services.latest.get(bundle) {
            Ok(Some(version)) => return version,
            Ok(None) => {}
            Err(err) => warn!(bundle = %bundle, error = %err, "latest version cache read failed"),
        }

        let source = self.source();
        let url = source.url(bundle);
        let version = match self.services.fetcher.fetch(&url) {
            Ok(body) => self.app.scheme.published(source.parse(&body)),
            Err(err) => {
                let reason = format!("{:#}", err);
                warn!(bundle = %bundle, url = %url, error = %reason, "version lookup failed");
                AppVersion::sentinel()
            }
        };
        if let Err(err) = self.services.latest.put(bundle, &version) {
            warn!(bundle = %bundle, error = %err, "latest version cache write failed");
        }
        info!(bundle = %bundle, source = source.kind(), latest = %version, "resolved latest version");
        version
    }

    /// A moved or reinstalled bundle invalidates both caches.
    fn observe_install_path(&self, path: Option<PathBuf>) {
        let mut last = self
            .last
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let changed = last.install_path.is_some() && last.install_path != path;
        if changed {
            debug!(app = %self.app.app_name, "install path changed, forcing recheck");
            self.services
                .fetcher
                .invalidate(&self.source().url(&self.app.bundle_id));
            if let Err(err) = self.services.latest.forget(&self.app.bundle_id) {
                warn!(bundle = %self.app.bundle_id, error = %err, "latest version cache reset failed");
            }
        }
        last.install_path = path;
    }

    fn remember(&self, installed: Option<AppVersion>, latest: Option<AppVersion>) {
        let mut last = self
            .last
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        last.installed = installed;
        last.latest = latest;
    }
}

impl Checkable for AppCheck {
    fn id(&self) -> &str {
        &self.app.id
    }

    fn title_pass(&self) -> String {
        format!("{} is up-to-date", self.app.marketing_name)
    }

    fn title_fail(&self) -> String {
        format!("{} has an available update", self.app.marketing_name)
    }

    fn evaluate(&self, ctx: &EvalContext<'_>) -> Outcome {
        self.observe_install_path(self.services.install.install_path(&self.app));

        // The bundle is present but its Info.plist has no readable version.
        let Some(installed) = self.installed_version() else {
            self.remember(None, None);
            return Outcome::Error(format!(
                "{} version unreadable from {}",
                self.app.app_name, self.app.version_key
            ));
        };

        if !self.services.connectivity.is_online() {
            debug!(app = %self.app.app_name, "offline, keeping verdict");
            self.remember(Some(installed), None);
            return Outcome::from_bool(ctx.previous.last_verdict);
        }

        let latest = self.latest_version();
        let passed = installed >= latest;
        self.remember(Some(installed), Some(latest));
        Outcome::from_bool(passed)
    }

    fn detail(&self) -> String {
        let last = self
            .last
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let show = |v: &Option<AppVersion>| {
            v.as_ref()
                .map_or_else(|| "unknown".to_string(), |v| v.to_string())
        };
        format!(
            "local={} online={} applicationPath={}",
            show(&last.installed),
            show(&last.latest),
            last.install_path
                .as_ref()
                .map_or_else(|| "none".to_string(), |p| p.display().to_string())
        )
    }

    fn preconditions(&self, preferences: &Preferences) -> Precondition {
        if !self.is_installed() {
            return Precondition::Unmet(format!("{} is not installed", self.app.marketing_name));
        }
        if self.app.supports_recently_used
            && preferences.check_recently_used_only
            && !self.used_recently()
        {
            return Precondition::Unmet("Not used in the last week".to_string());
        }
        Precondition::Met
    }

    fn error_fallback(&self) -> ErrorFallback {
        ErrorFallback::PreviousVerdict
    }

    fn report_if_disabled(&self) -> bool {
        false
    }
}
