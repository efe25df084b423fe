//! Vendor sources for the latest published version of an application.
//!
//! Every parser is total: a payload it does not understand resolves to
//! [`AppVersion::sentinel`].

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::version::AppVersion;

const APP_STORE_LOOKUP: &str = "https://itunes.apple.com/lookup";

/// Which regex match to take when a page lists several versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPick {
    First,
    Last,
    Highest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VendorSource {
    /// iTunes lookup API, `results[0].version`.
    AppStore,
    /// Sparkle appcast feed.
    Sparkle { url: String },
    /// First capture group of `pattern` over an HTML, markdown or text page.
    Pattern {
        url: String,
        pattern: String,
        pick: MatchPick,
    },
    /// A string field of a JSON document, addressed by JSON pointer.
    JsonPointer { url: String, pointer: String },
    /// The highest key of a JSON object whose keys are versions.
    JsonMaxKey { url: String },
}

impl VendorSource {
    pub fn url(&self, bundle_id: &str) -> String {
        match self {
            Self::AppStore => format!(
                "{}?bundleId={}&country=us&entity=macSoftware&limit=1",
                APP_STORE_LOOKUP, bundle_id
            ),
            Self::Sparkle { url }
            | Self::Pattern { url, .. }
            | Self::JsonPointer { url, .. }
            | Self::JsonMaxKey { url } => url.clone(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::AppStore => "app_store",
            Self::Sparkle { .. } => "sparkle",
            Self::Pattern { .. } => "pattern",
            Self::JsonPointer { .. } => "json_pointer",
            Self::JsonMaxKey { .. } => "json_max_key",
        }
    }

    pub fn parse(&self, payload: &[u8]) -> AppVersion {
        let version = match self {
            Self::AppStore => parse_app_store(payload),
            Self::Sparkle { .. } => parse_sparkle(&String::from_utf8_lossy(payload)),
            Self::Pattern { pattern, pick, .. } => {
                parse_pattern(&String::from_utf8_lossy(payload), pattern, *pick)
            }
            Self::JsonPointer { pointer, .. } => parse_json_pointer(payload, pointer),
            Self::JsonMaxKey { .. } => parse_json_max_key(payload),
        };
        let version = version.unwrap_or_else(AppVersion::sentinel);
        debug!(source = self.kind(), version = %version, "parsed vendor version");
        version
    }
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    results: Vec<LookupResult>,
}

#[derive(Debug, Deserialize)]
struct LookupResult {
    version: Option<String>,
}

fn parse_app_store(payload: &[u8]) -> Option<AppVersion> {
    let response: LookupResponse = serde_json::from_slice(payload).ok()?;
    let raw = response.results.into_iter().next()?.version?;
    AppVersion::parse(&raw)
}

/// Highest `sparkle:shortVersionString`; `sparkle:version` only when no
/// item carries a short version. Both attribute and element forms are read.
fn parse_sparkle(feed: &str) -> Option<AppVersion> {
    highest_capture(feed, r#"sparkle:shortVersionString="([^"]+)""#)
        .or_else(|| {
            highest_capture(
                feed,
                r"<sparkle:shortVersionString>\s*([^<\s]+)\s*</sparkle:shortVersionString>",
            )
        })
        .or_else(|| highest_capture(feed, r#"sparkle:version="([^"]+)""#))
        .or_else(|| {
            highest_capture(
                feed,
                r"<sparkle:version>\s*([^<\s]+)\s*</sparkle:version>",
            )
        })
}

fn highest_capture(haystack: &str, pattern: &str) -> Option<AppVersion> {
    let re = Regex::new(pattern).ok()?;
    re.captures_iter(haystack)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| AppVersion::parse(m.as_str()))
        .max()
}

fn parse_pattern(page: &str, pattern: &str, pick: MatchPick) -> Option<AppVersion> {
    let re = match Regex::new(pattern) {
        Ok(re) => re,
        Err(err) => {
            debug!(pattern, error = %err, "invalid version pattern");
            return None;
        }
    };
    let mut versions = re
        .captures_iter(page)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| AppVersion::parse(m.as_str()));
    match pick {
        MatchPick::First => versions.next(),
        MatchPick::Last => versions.last(),
        MatchPick::Highest => versions.max(),
    }
}

fn parse_json_pointer(payload: &[u8], pointer: &str) -> Option<AppVersion> {
    let value: Value = serde_json::from_slice(payload).ok()?;
    let raw = value.pointer(pointer)?.as_str()?;
    AppVersion::parse(raw)
}

fn parse_json_max_key(payload: &[u8]) -> Option<AppVersion> {
    let value: Value = serde_json::from_slice(payload).ok()?;
    value
        .as_object()?
        .keys()
        .filter_map(|key| AppVersion::parse(key))
        .max()
}
