//! "Is this agent the latest release?"

use std::sync::{Arc, Mutex};

use compliance::{Checkable, EvalContext, Outcome};
use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, info};

use crate::check::UpdateServices;
use crate::fetch::HttpFetcher;
use crate::version::AppVersion;

pub const AGENT_RELEASE_ID: &str = "44e4754a-0b42-4964-9cc2-b88b2023cb1e";
pub const AGENT_RELEASES_URL: &str = "https://paretosecurity.com/api/updates";

/// Who is asking; sent as query parameters so the release channel can be
/// picked per install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseQuery {
    pub machine_uuid: String,
    pub version: String,
    pub os_version: String,
    pub team_enrolled: bool,
}

impl ReleaseQuery {
    fn distribution(&self) -> &'static str {
        if self.team_enrolled {
            "app-live-team"
        } else {
            "app-live-opensource"
        }
    }
}

#[derive(Debug, Deserialize)]
struct Release {
    tag_name: String,
}

/// Newest release tag from the releases listing; `None` when the list is
/// empty or not a release list at all.
pub fn latest_release_tag(payload: &[u8]) -> Option<String> {
    let releases: Vec<Release> = serde_json::from_slice(payload).ok()?;
    releases.into_iter().next().map(|release| release.tag_name)
}

/// Up to date when the running version is at least the newest tag. Tags
/// that are not versions must match exactly.
pub fn is_current(running: &str, latest_tag: &str) -> bool {
    match (AppVersion::parse(running), AppVersion::parse(latest_tag)) {
        (Some(running), Some(latest)) => running >= latest,
        _ => running.trim() == latest_tag.trim(),
    }
}

pub struct AgentReleaseCheck {
    endpoint: String,
    query: ReleaseQuery,
    services: Arc<UpdateServices>,
    latest: Mutex<Option<String>>,
}

impl AgentReleaseCheck {
    pub fn new(query: ReleaseQuery, services: Arc<UpdateServices>) -> Self {
        Self {
            endpoint: AGENT_RELEASES_URL.to_string(),
            query,
            services,
            latest: Mutex::new(None),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn url(&self) -> Result<Url, String> {
        Url::parse_with_params(
            &self.endpoint,
            &[
                ("uuid", self.query.machine_uuid.as_str()),
                ("version", self.query.version.as_str()),
                ("os_version", self.query.os_version.as_str()),
                ("platform", "macos"),
                ("app", "auditor"),
                ("distribution", self.query.distribution()),
            ],
        )
        .map_err(|err| format!("invalid releases endpoint {}: {}", self.endpoint, err))
    }

    fn remember(&self, tag: Option<String>) {
        *self
            .latest
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = tag;
    }
}

impl Checkable for AgentReleaseCheck {
    fn id(&self) -> &str {
        AGENT_RELEASE_ID
    }

    fn title_pass(&self) -> String {
        "Pareto Security is up-to-date".to_string()
    }

    fn title_fail(&self) -> String {
        "Pareto Security is outdated".to_string()
    }

    fn evaluate(&self, ctx: &EvalContext<'_>) -> Outcome {
        if !self.services.connectivity.is_online() {
            debug!("offline, keeping release verdict");
            return Outcome::from_bool(ctx.previous.last_verdict);
        }
        let url = match self.url() {
            Ok(url) => url,
            Err(reason) => return Outcome::Error(reason),
        };
        let body = match self.services.fetcher.fetch(url.as_str()) {
            Ok(body) => body,
            Err(err) => return Outcome::Error(format!("release lookup failed: {:#}", err)),
        };
        let Some(tag) = latest_release_tag(&body) else {
            debug!("no releases published");
            self.remember(None);
            return Outcome::Fail;
        };
        let current = is_current(&self.query.version, &tag);
        info!(running = %self.query.version, latest = %tag, current, "agent release checked");
        self.remember(Some(tag));
        Outcome::from_bool(current)
    }

    fn detail(&self) -> String {
        let latest = self
            .latest
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
            .unwrap_or_else(|| "unknown".to_string());
        format!("running={} latest={}", self.query.version, latest)
    }
}
