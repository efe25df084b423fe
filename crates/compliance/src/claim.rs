use std::time::Instant;

use tracing::{debug, warn};

use crate::registry::CheckRegistry;
use crate::Result;

/// Named group of checks. Holds ids only; the registry owns the checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    title: String,
    check_ids: Vec<String>,
}

impl Claim {
    pub fn new(title: impl Into<String>, check_ids: Vec<String>) -> Self {
        Self {
            title: title.into(),
            check_ids,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn check_ids(&self) -> &[String] {
        &self.check_ids
    }

    /// Runs every member independently. A failure on one member is logged
    /// and does not stop the others.
    pub fn run(&self, registry: &CheckRegistry) {
        for id in &self.check_ids {
            let started = Instant::now();
            match registry.run(id) {
                Ok(passed) => debug!(
                    claim = %self.title,
                    check_id = %id,
                    passed,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "claim member finished"
                ),
                Err(err) => warn!(claim = %self.title, check_id = %id, error = %err, "claim member failed"),
            }
        }
    }

    /// AND over the cached verdicts of runnable members. Vacuously true.
    pub fn passed(&self, registry: &CheckRegistry) -> Result<bool> {
        for id in &self.check_ids {
            if registry.is_runnable(id)? && !registry.state(id)?.last_verdict {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Member ids ordered case-insensitively by their current title.
    pub fn sorted_ids(&self, registry: &CheckRegistry) -> Result<Vec<String>> {
        let mut titled = Vec::with_capacity(self.check_ids.len());
        for id in &self.check_ids {
            titled.push((registry.title(id)?.to_lowercase(), id.clone()));
        }
        titled.sort();
        Ok(titled.into_iter().map(|(_, id)| id).collect())
    }
}
