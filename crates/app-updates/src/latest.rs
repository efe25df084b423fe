use std::sync::Arc;
use std::time::Duration;

use compliance::{Clock, KeyValueStore, StoreValue};

use crate::version::AppVersion;

pub const LATEST_VERSION_TTL: Duration = Duration::from_secs(24 * 3600);

/// Last resolved vendor version per bundle id, persisted next to the check
/// state so a restart does not refetch every vendor.
pub struct LatestVersionCache {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl LatestVersionCache {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            ttl: LATEST_VERSION_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn get(&self, bundle_id: &str) -> compliance::Result<Option<AppVersion>> {
        let stamped = self
            .store
            .get(&timestamp_key(bundle_id))?
            .and_then(|v| v.as_int());
        let Some(stamped) = stamped else {
            return Ok(None);
        };
        let age = self.clock.now_millis().saturating_sub(stamped);
        if age < 0 || age as u128 >= self.ttl.as_millis() {
            return Ok(None);
        }
        Ok(self
            .store
            .get(&version_key(bundle_id))?
            .and_then(|v| v.into_text())
            .and_then(|raw| AppVersion::parse(&raw)))
    }

    /// The sentinel is never stored, so a failed lookup is retried on the
    /// next run instead of a day later.
    pub fn put(&self, bundle_id: &str, version: &AppVersion) -> compliance::Result<()> {
        if version.is_sentinel() {
            return Ok(());
        }
        self.store.set(
            &version_key(bundle_id),
            StoreValue::Text(version.to_string()),
        )?;
        self.store.set(
            &timestamp_key(bundle_id),
            StoreValue::Int(self.clock.now_millis()),
        )
    }

    pub fn forget(&self, bundle_id: &str) -> compliance::Result<()> {
        self.store.remove(&version_key(bundle_id))?;
        self.store.remove(&timestamp_key(bundle_id))
    }
}

fn version_key(bundle_id: &str) -> String {
    format!("{bundle_id}-LatestVersion")
}

fn timestamp_key(bundle_id: &str) -> String {
    format!("{bundle_id}-LatestVersionTS")
}

#[cfg(test)]
mod tests {
    use super::*;

    use compliance::{ManualClock, MemoryStore};

    fn cache() -> (LatestVersionCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        (
            LatestVersionCache::new(Arc::new(MemoryStore::new()), clock.clone()),
            clock,
        )
    }

    #[test]
    fn stored_version_expires_after_a_day() {
        let (cache, clock) = cache();
        cache
            .put("com.example", &AppVersion::new(2, 1, 0))
            .expect("put");
        assert_eq!(
            cache.get("com.example").expect("get"),
            Some(AppVersion::new(2, 1, 0))
        );

        clock.advance_secs(24 * 3600);
        assert_eq!(cache.get("com.example").expect("get"), None);
    }

    #[test]
    fn sentinel_is_not_cached() {
        let (cache, _) = cache();
        cache
            .put("com.example", &AppVersion::sentinel())
            .expect("put");
        assert_eq!(cache.get("com.example").expect("get"), None);
    }

    #[test]
    fn forget_clears_entry() {
        let (cache, _) = cache();
        cache
            .put("com.example", &AppVersion::new(1, 0, 0))
            .expect("put");
        cache.forget("com.example").expect("forget");
        assert_eq!(cache.get("com.example").expect("get"), None);
    }
}
