use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use app_updates::RetryPolicy;
use compliance::{Report, ReportingDevice};
use reqwest::Client as HttpClient;
use serde::Deserialize;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::TeamConfig;

const DEVICE_AUTH_HEADER: &str = "X-Device-Auth";

/// Team settings as served by the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamSettings {
    #[serde(default)]
    pub disabled_checks: Vec<DisabledCheck>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DisabledCheck {
    pub id: String,
}

impl TeamSettings {
    pub fn disabled_ids(&self) -> impl Iterator<Item = String> + '_ {
        self.disabled_checks
            .iter()
            .map(|check| check.id.trim().to_string())
            .filter(|id| !id.is_empty())
    }
}

/// Talks to the team dashboard on behalf of an enrolled device.
#[derive(Debug, Clone)]
pub struct TeamClient {
    http: HttpClient,
    base_url: String,
    team_id: String,
    auth: String,
    retry: RetryPolicy,
}

impl TeamClient {
    /// `None` when the device is not enrolled.
    pub fn from_config(team: &TeamConfig, timeout: Duration) -> Result<Option<Self>> {
        let (Some(team_id), Some(auth)) = (team.id.clone(), team.auth.clone()) else {
            return Ok(None);
        };
        let http = HttpClient::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .context("failed building team HTTP client")?;
        Ok(Some(Self {
            http,
            base_url: team.api_url.trim_end_matches('/').to_string(),
            team_id,
            auth,
            retry: RetryPolicy::default(),
        }))
    }

    pub(crate) fn url_for(&self, path: &str) -> String {
        format!("{}/{}{}", self.base_url, self.team_id, path)
    }

    async fn with_retry<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T>
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
                            format!("{} failed after {} attempts", operation, attempt)
                        });
                    }

                    let delay = self.retry.next_delay(attempt.saturating_sub(1));
                    warn!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "team request failed, retrying"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    pub async fn fetch_settings(&self) -> Result<TeamSettings> {
        let url = self.url_for("/settings");
        self.with_retry("team settings", || async {
            let settings = self
                .http
                .get(&url)
                .header(DEVICE_AUTH_HEADER, &self.auth)
                .send()
                .await
                .with_context(|| format!("failed fetching team settings from {}", url))?
                .error_for_status()
                .with_context(|| format!("team settings rejected by {}", url))?
                .json::<TeamSettings>()
                .await
                .with_context(|| format!("failed decoding team settings from {}", url))?;
            Ok::<_, anyhow::Error>(settings)
        })
        .await
    }

    /// Registers this device with the team. Sent once per enrollment.
    pub async fn link_device(&self, device: &ReportingDevice) -> Result<()> {
        let url = self.url_for("/device");
        self.with_retry("device link", || async {
            self.http
                .put(&url)
                .header(DEVICE_AUTH_HEADER, &self.auth)
                .json(device)
                .send()
                .await
                .with_context(|| format!("failed linking device at {}", url))?
                .error_for_status()
                .with_context(|| format!("device link rejected by {}", url))?;
            Ok::<_, anyhow::Error>(())
        })
        .await?;
        info!(machine = %device.machine_uuid, "device linked to team");
        Ok(())
    }

    pub async fn send_report(&self, report: &Report) -> Result<()> {
        let url = self.url_for("/device");
        self.with_retry("device report", || async {
            self.http
                .patch(&url)
                .header(DEVICE_AUTH_HEADER, &self.auth)
                .json(report)
                .send()
                .await
                .with_context(|| format!("failed sending device report to {}", url))?
                .error_for_status()
                .with_context(|| format!("device report rejected by {}", url))?;
            Ok::<_, anyhow::Error>(())
        })
        .await?;
        info!(
            passed = report.passed_count,
            failed = report.failed_count,
            disabled = report.disabled_count,
            "device report sent"
        );
        Ok(())
    }
}
