use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use compliance::{CheckRegistry, Report, StoreValue};
use tracing::{debug, info, warn};

use super::{AgentRuntime, RunSummary, LAST_CHECK_KEY};

impl AgentRuntime {
    pub async fn tick(&mut self, now_unix: i64) -> Result<()> {
        self.tick_count = self.tick_count.saturating_add(1);
        if !self.run_due(now_unix) {
            return Ok(());
        }

        let started = Instant::now();
        self.link_device().await;
        self.refresh_team_policy().await;
        let summary = self.run_all_claims().await?;

        let last_check_millis = self.registry.now_millis();
        self.registry
            .store()
            .set(LAST_CHECK_KEY, StoreValue::Int(last_check_millis))
            .context("failed persisting last check time")?;
        self.last_run_unix = Some(now_unix);

        info!(
            tick = self.tick_count,
            claims = summary.claims,
            passed = summary.passed_claims,
            failed = summary.failed_claims,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "checks finished"
        );

        let report = self.build_report(last_check_millis)?;
        self.send_report(&report).await;
        Ok(())
    }

    /// Until the dashboard accepts the device, every due tick retries.
    async fn link_device(&mut self) {
        if self.device_linked {
            return;
        }
        let (Some(client), Some(device)) = (&self.team_client, &self.device) else {
            return;
        };
        match client.link_device(device).await {
            Ok(()) => self.device_linked = true,
            Err(err) => warn!(error = %err, "device link failed, retrying next run"),
        }
    }

    async fn refresh_team_policy(&self) {
        let Some(client) = &self.team_client else {
            return;
        };
        match client.fetch_settings().await {
            Ok(settings) => {
                let disabled: Vec<String> = self
                    .config
                    .team
                    .disabled
                    .iter()
                    .cloned()
                    .chain(settings.disabled_ids())
                    .collect();
                debug!(disabled = disabled.len(), "team policy refreshed");
                self.team_policy
                    .replace(self.config.team.enforced.iter().cloned(), disabled);
            }
            Err(err) => warn!(error = %err, "team settings refresh failed, keeping previous policy"),
        }
    }

    pub(crate) async fn run_all_claims(&self) -> Result<RunSummary> {
        let registry = Arc::clone(&self.registry);
        tokio::task::spawn_blocking(move || run_claims(&registry))
            .await
            .context("check worker terminated")?
    }

    pub(crate) fn build_report(&self, last_check_millis: i64) -> Result<Report> {
        let report = Report::build(&self.registry, &self.config.device_id, last_check_millis)
            .context("failed building device report")?;
        Ok(match &self.device {
            Some(device) => report.with_device(device.clone()),
            None => report,
        })
    }

    async fn send_report(&self, report: &Report) {
        let Some(client) = &self.team_client else {
            debug!(
                passed = report.passed_count,
                failed = report.failed_count,
                "device not enrolled, report kept local"
            );
            return;
        };
        if let Err(err) = client.send_report(report).await {
            warn!(error = %err, "device report not delivered");
        }
    }
}

fn run_claims(registry: &CheckRegistry) -> Result<RunSummary> {
    let mut summary = RunSummary::default();
    for claim in registry.claims() {
        claim.run(registry);
        summary.claims += 1;
        if claim.passed(registry)? {
            summary.passed_claims += 1;
        } else {
            summary.failed_claims += 1;
        }
    }
    Ok(summary)
}
