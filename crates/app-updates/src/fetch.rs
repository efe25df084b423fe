use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{Context, Result};
use compliance::Clock;
use reqwest::Client as HttpClient;
use tokio::runtime::Handle;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::retry::RetryPolicy;

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);
pub const RESPONSE_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

const USER_AGENT: &str = concat!("posture-agent/", env!("CARGO_PKG_VERSION"));

/// Synchronous GET used from inside `Checkable::evaluate`.
pub trait HttpFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Runs reqwest on the agent's runtime and blocks the calling thread until
/// the response arrives or the timeout fires.
///
/// `fetch` must be called from a thread that is not driving async tasks,
/// such as a `spawn_blocking` worker.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    http: HttpClient,
    handle: Handle,
    timeout: Duration,
    retry: RetryPolicy,
}

impl ReqwestFetcher {
    pub fn new(handle: Handle, timeout: Duration) -> Result<Self> {
        let http = HttpClient::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .context("failed building version lookup HTTP client")?;
        Ok(Self {
            http,
            handle,
            timeout,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn with_retry<T, F, Fut>(&self, url: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1u32;
        loop {
            match op().await {
                Ok(result) => return Ok(result),
                Err(err) => {
                    if attempt >= self.retry.max_attempts {
                        return Err(err).with_context(|| {
                            format!("version lookup {} failed after {} attempts", url, attempt)
                        });
                    }

                    let delay = self.retry.next_delay(attempt.saturating_sub(1));
                    warn!(
                        url,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "version lookup failed, retrying"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn get_bytes_request(&self, url: &str) -> Result<Vec<u8>> {
        let payload = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("failed fetching {}", url))?
            .error_for_status()
            .with_context(|| format!("version lookup rejected by {}", url))?
            .bytes()
            .await
            .with_context(|| format!("failed reading response body from {}", url))?;
        Ok(payload.to_vec())
    }
}

impl HttpFetcher for ReqwestFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let lookup = self.with_retry(url, || self.get_bytes_request(url));
        match self
            .handle
            .block_on(async { tokio::time::timeout(self.timeout, lookup).await })
        {
            Ok(result) => result,
            Err(_) => anyhow::bail!(
                "version lookup {} timed out after {} ms",
                url,
                self.timeout.as_millis()
            ),
        }
    }
}

#[derive(Debug, Clone)]
struct CachedResponse {
    body: Vec<u8>,
    fetched_at_millis: i64,
}

/// Raw response bodies keyed by URL. Failed fetches are not cached.
pub struct CachedFetcher {
    inner: Arc<dyn HttpFetcher>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    entries: Mutex<HashMap<String, CachedResponse>>,
}

impl CachedFetcher {
    pub fn new(inner: Arc<dyn HttpFetcher>, clock: Arc<dyn Clock>) -> Self {
        Self::with_ttl(inner, clock, RESPONSE_CACHE_TTL)
    }

    pub fn with_ttl(inner: Arc<dyn HttpFetcher>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            inner,
            clock,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn invalidate(&self, url: &str) {
        if self.entries().remove(url).is_some() {
            debug!(url, "response cache entry invalidated");
        }
    }

    /// Drops every cached response.
    pub fn force_recheck(&self) {
        self.entries().clear();
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, CachedResponse>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn fresh(&self, entry: &CachedResponse, now_millis: i64) -> bool {
        let age = now_millis.saturating_sub(entry.fetched_at_millis);
        age >= 0 && (age as u128) < self.ttl.as_millis()
    }
}

impl HttpFetcher for CachedFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let now = self.clock.now_millis();
        if let Some(entry) = self.entries().get(url) {
            if self.fresh(entry, now) {
                debug!(url, "response cache hit");
                return Ok(entry.body.clone());
            }
        }

        let body = self.inner.fetch(url)?;
        self.entries().insert(
            url.to_string(),
            CachedResponse {
                body: body.clone(),
                fetched_at_millis: now,
            },
        );
        Ok(body)
    }
}
