//! Assembles the check registry from configuration.

use std::sync::Arc;

use anyhow::{Context, Result};
use app_updates::{
    default_catalog, AgentReleaseCheck, AppCheck, CachedFetcher, HttpFetcher, LatestVersionCache,
    ReleaseQuery, TcpConnectivity, UpdateServices,
};
use compliance::{
    load_custom_rules, register_custom_checks, CheckRegistry, Checkable, Clock, CommandRunner,
    KeyValueStore, MemoryStore, ReportingDevice, SqliteStore, StaticTeamPolicy,
};
use platform_macos::checks::auto_updates::app_store_updates_check;
use platform_macos::{system_claims, MacInstallInspector, HostContext};
use tracing::info;

use crate::config::{AgentConfig, StorageBackend};

pub const APP_UPDATES_CLAIM: &str = "Application Updates";

/// The registry plus the handles the run loop keeps mutating.
pub struct Catalog {
    pub registry: CheckRegistry,
    pub team: Arc<StaticTeamPolicy>,
}

pub fn open_store(config: &AgentConfig) -> Result<Arc<dyn KeyValueStore>> {
    match config.storage_backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StorageBackend::Sqlite => {
            let path = config.storage_path.to_string_lossy();
            let store = SqliteStore::open(&path)
                .with_context(|| format!("failed opening settings store {}", path))?;
            Ok(Arc::new(store))
        }
    }
}

pub fn build_catalog(
    config: &AgentConfig,
    device: &ReportingDevice,
    store: Arc<dyn KeyValueStore>,
    runner: Arc<dyn CommandRunner>,
    http: Arc<dyn HttpFetcher>,
    clock: Arc<dyn Clock>,
) -> Result<Catalog> {
    let team = Arc::new(StaticTeamPolicy::new(
        config.team.enforced.iter().cloned(),
        config.team.disabled.iter().cloned(),
    ));
    let mut registry = CheckRegistry::new(Arc::clone(&store), team.clone())
        .with_clock(Arc::clone(&clock))
        .with_permissions(config.permissions())
        .with_preferences(config.preferences());

    let fetcher = Arc::new(CachedFetcher::new(http, Arc::clone(&clock)));
    let host = HostContext {
        runner: Arc::clone(&runner),
        fetcher: fetcher.clone(),
        home: config.home_dir.clone(),
        ignored_ssh_keys: config.ignored_ssh_keys.clone(),
        ignored_user_accounts: config.ignored_user_accounts.clone(),
    };
    for (title, checks) in system_claims(&host) {
        registry
            .add_claim(title, checks)
            .with_context(|| format!("failed registering claim {}", title))?;
    }

    let services = Arc::new(UpdateServices {
        install: Arc::new(MacInstallInspector::new(
            &config.home_dir,
            Arc::clone(&runner),
            Arc::clone(&clock),
        )),
        connectivity: Arc::new(TcpConnectivity::default()),
        fetcher,
        latest: Arc::new(LatestVersionCache::new(store, clock)),
    });
    let release = ReleaseQuery {
        machine_uuid: device.machine_uuid.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        os_version: device.macos_version.clone(),
        team_enrolled: config.team.is_enrolled(),
    };
    let mut app_checks: Vec<Arc<dyn Checkable>> = vec![
        Arc::new(app_store_updates_check(Arc::clone(&runner))),
        Arc::new(AgentReleaseCheck::new(release, services.clone())),
    ];
    app_checks.extend(
        default_catalog()
            .into_iter()
            .map(|app| Arc::new(AppCheck::new(app, services.clone())) as Arc<dyn Checkable>),
    );
    registry
        .add_claim(APP_UPDATES_CLAIM, app_checks)
        .context("failed registering application update checks")?;

    let custom = register_custom_checks(&mut registry, custom_rules(config), runner)
        .context("failed registering custom checks")?;

    info!(
        checks = registry.ids().len(),
        claims = registry.claims().len(),
        custom,
        "check catalog assembled"
    );
    Ok(Catalog { registry, team })
}

fn custom_rules(config: &AgentConfig) -> Vec<compliance::CustomRule> {
    if !config.my_checks || !config.my_checks_dir.is_dir() {
        return Vec::new();
    }
    load_custom_rules(&config.my_checks_dir)
}
