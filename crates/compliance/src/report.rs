use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::device::ReportingDevice;
use crate::registry::CheckRegistry;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Off,
    Pass,
    Fail,
}

/// Read-only view of one check for the reporting collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckSnapshot {
    pub id: String,
    pub title: String,
    pub claim: String,
    pub enabled: bool,
    pub runnable: bool,
    pub passed: bool,
    pub error: bool,
    #[serde(skip)]
    pub report_if_disabled: bool,
}

impl CheckSnapshot {
    /// One row per check, claims ordered by title. A check listed by two
    /// claims appears once.
    pub fn collect(registry: &CheckRegistry) -> Result<Vec<Self>> {
        let mut claims: Vec<_> = registry.claims().iter().collect();
        claims.sort_by(|a, b| a.title().cmp(b.title()));

        let mut seen = HashSet::new();
        let mut rows = Vec::new();
        for claim in claims {
            for id in claim.check_ids() {
                if !seen.insert(id.as_str()) {
                    continue;
                }
                let check = registry.check(id)?;
                let state = registry.state(id)?;
                rows.push(Self {
                    id: id.clone(),
                    title: registry.title(id)?,
                    claim: claim.title().to_string(),
                    enabled: registry.is_active(id)?,
                    runnable: registry.is_runnable(id)?,
                    passed: state.last_verdict,
                    error: state.last_error,
                    report_if_disabled: check.report_if_disabled(),
                });
            }
        }
        Ok(rows)
    }

    pub fn status(&self) -> ReportStatus {
        if !self.runnable {
            ReportStatus::Off
        } else if self.passed {
            ReportStatus::Pass
        } else {
            ReportStatus::Fail
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Version of the agent that produced the report.
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<ReportingDevice>,
    pub passed_count: usize,
    pub failed_count: usize,
    pub disabled_count: usize,
    pub last_check: String,
    pub significant_change: String,
    pub state: BTreeMap<String, ReportStatus>,
}

impl Report {
    pub fn build(registry: &CheckRegistry, device_id: &str, last_check_millis: i64) -> Result<Self> {
        let rows = CheckSnapshot::collect(registry)?;
        Ok(Self::from_snapshots(&rows, device_id, last_check_millis))
    }

    pub fn with_device(mut self, device: ReportingDevice) -> Self {
        self.device = Some(device);
        self
    }

    /// Non-runnable checks that opt out of disabled reporting are omitted.
    pub fn from_snapshots(rows: &[CheckSnapshot], device_id: &str, last_check_millis: i64) -> Self {
        let mut passed_count = 0;
        let mut failed_count = 0;
        let mut disabled_count = 0;
        let mut disabled_seed = device_id.to_string();
        let mut failed_seed = device_id.to_string();
        let mut state = BTreeMap::new();

        for row in rows {
            match row.status() {
                ReportStatus::Pass => passed_count += 1,
                ReportStatus::Fail => {
                    failed_count += 1;
                    failed_seed.push_str(&row.id);
                }
                ReportStatus::Off => {
                    if !row.report_if_disabled {
                        continue;
                    }
                    disabled_count += 1;
                    disabled_seed.push_str(&row.id);
                }
            }
            state.insert(row.id.clone(), row.status());
        }

        let digest = Sha256::digest(format!("{}.{}", disabled_seed, failed_seed).as_bytes());
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            device: None,
            passed_count,
            failed_count,
            disabled_count,
            last_check: format_rfc3339(last_check_millis),
            significant_change: encode_hex(&digest),
            state,
        }
    }
}

fn format_rfc3339(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Uppercase, two digits per byte.
fn encode_hex(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}
