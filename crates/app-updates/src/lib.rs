//! Update checks for installed third-party applications.
//!
//! An [`AppCheck`] compares the installed bundle version against the latest
//! version a vendor publishes. Vendor lookups go through a URL-keyed
//! response cache ([`CachedFetcher`]) and a day-long per-bundle cache
//! ([`LatestVersionCache`]); any lookup failure resolves to the sentinel
//! version `0.0.0`, which never marks an app outdated.

mod catalog;
mod check;
mod connectivity;
mod fetch;
mod install;
mod latest;
mod release;
mod retry;
mod source;
mod version;

pub use catalog::{default_catalog, AppDefinition, VersionScheme, DEFAULT_VERSION_KEY};
pub use check::{AppCheck, UpdateServices};
pub use connectivity::{Connectivity, StaticConnectivity, TcpConnectivity};
pub use fetch::{
    CachedFetcher, HttpFetcher, ReqwestFetcher, DEFAULT_FETCH_TIMEOUT, RESPONSE_CACHE_TTL,
};
pub use install::{used_recently, InstallInspector, RECENT_USE_DAYS};
pub use latest::{LatestVersionCache, LATEST_VERSION_TTL};
pub use release::{
    is_current, latest_release_tag, AgentReleaseCheck, ReleaseQuery, AGENT_RELEASES_URL,
    AGENT_RELEASE_ID,
};
pub use retry::RetryPolicy;
pub use source::{MatchPick, VendorSource};
pub use version::AppVersion;
