//! Installed macOS release against the latest one Apple lists.

use std::sync::{Arc, Mutex, OnceLock};

use app_updates::{AppVersion, HttpFetcher};
use compliance::{Checkable, CommandRunner, EvalContext, Outcome};
use regex::Regex;
use tracing::{info, warn};

use super::command::{run_program, CheckText};

pub const MACOS_VERSION: CheckText = CheckText {
    id: "284162c2-f911-4b5e-8c81-30b2cf1ba73f",
    pass: "macOS is up-to-date",
    fail: "macOS is not up-to-date",
};

/// Apple's "latest versions of macOS" support article.
pub const RELEASES_URL: &str = "https://support.apple.com/en-us/HT212585";

static RELEASE_HEADING: OnceLock<Option<Regex>> = OnceLock::new();

/// First `<h2>macOS <name> <version></h2>` heading; the sentinel when the
/// page has none.
pub fn parse_latest_release(html: &str) -> AppVersion {
    let Some(re) = RELEASE_HEADING
        .get_or_init(|| Regex::new(r"<h2[^>]*>macOS[^<]+ ([.\d]+)</h2>").ok())
        .as_ref()
    else {
        return AppVersion::sentinel();
    };
    re.captures(html)
        .and_then(|caps| caps.get(1))
        .map_or_else(AppVersion::sentinel, |m| AppVersion::normalize(m.as_str()))
}

pub struct MacOsVersionCheck {
    runner: Arc<dyn CommandRunner>,
    fetcher: Arc<dyn HttpFetcher>,
    url: String,
    last: Mutex<(Option<AppVersion>, Option<AppVersion>)>,
}

impl MacOsVersionCheck {
    pub fn new(runner: Arc<dyn CommandRunner>, fetcher: Arc<dyn HttpFetcher>) -> Self {
        Self {
            runner,
            fetcher,
            url: RELEASES_URL.to_string(),
            last: Mutex::new((None, None)),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    fn latest(&self) -> AppVersion {
        match self.fetcher.fetch(&self.url) {
            Ok(body) => parse_latest_release(&String::from_utf8_lossy(&body)),
            Err(err) => {
                let reason = format!("{:#}", err);
                warn!(url = %self.url, error = %reason, "macOS release lookup failed");
                AppVersion::sentinel()
            }
        }
    }
}

impl Checkable for MacOsVersionCheck {
    fn id(&self) -> &str {
        MACOS_VERSION.id
    }

    fn title_pass(&self) -> String {
        MACOS_VERSION.pass.to_string()
    }

    fn title_fail(&self) -> String {
        MACOS_VERSION.fail.to_string()
    }

    fn evaluate(&self, _ctx: &EvalContext<'_>) -> Outcome {
        let installed = match run_program(self.runner.as_ref(), "/usr/bin/sw_vers", &["-productVersion"]) {
            Ok(out) => AppVersion::normalize(out.trim()),
            Err(err) => return Outcome::Error(format!("sw_vers failed: {}", err)),
        };
        let latest = self.latest();
        info!(installed = %installed, latest = %latest, "macOS release compared");
        let passed = installed >= latest;
        *self.last.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) =
            (Some(installed), Some(latest));
        Outcome::from_bool(passed)
    }

    fn detail(&self) -> String {
        let last = self.last.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match &*last {
            (Some(installed), Some(latest)) => format!("local={} online={}", installed, latest),
            _ => "None".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::parse_latest_release;

    #[test]
    fn reads_first_release_heading() {
        let html = r#"<div><h2 class="gb-header">macOS Sonoma 14.4</h2><h2>macOS Ventura 13.6.5</h2></div>"#;
        assert_eq!(parse_latest_release(html).to_string(), "14.4.0");
        assert!(parse_latest_release("<html>nothing here</html>").is_sentinel());
    }
}
