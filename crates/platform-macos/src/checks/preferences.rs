//! Boolean keys of a preference domain, read with one `defaults export`.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use compliance::{Checkable, CommandRunner, EvalContext, Outcome, Precondition, Preferences};
use tracing::debug;

use super::command::CheckText;
use crate::plist::{self, PlistValue};

/// A key and the verdict it stands for when it was never written.
#[derive(Debug, Clone, Copy)]
pub struct PreferenceKey {
    pub name: &'static str,
    pub when_missing: bool,
}

pub const fn key(name: &'static str, when_missing: bool) -> PreferenceKey {
    PreferenceKey { name, when_missing }
}

/// Passes when every listed key is true.
pub struct PreferenceCheck {
    text: CheckText,
    domain: &'static str,
    keys: Vec<PreferenceKey>,
    required_app: Option<PathBuf>,
    runner: Arc<dyn CommandRunner>,
    last_values: Mutex<Vec<Option<bool>>>,
}

impl PreferenceCheck {
    pub fn new(
        text: CheckText,
        domain: &'static str,
        keys: &[PreferenceKey],
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            text,
            domain,
            keys: keys.to_vec(),
            required_app: None,
            runner,
            last_values: Mutex::new(Vec::new()),
        }
    }

    /// Only runnable while the bundle at `path` is installed.
    pub fn requiring_app(mut self, path: impl Into<PathBuf>) -> Self {
        self.required_app = Some(path.into());
        self
    }
}

impl Checkable for PreferenceCheck {
    fn id(&self) -> &str {
        self.text.id
    }

    fn title_pass(&self) -> String {
        self.text.pass.to_string()
    }

    fn title_fail(&self) -> String {
        self.text.fail.to_string()
    }

    fn evaluate(&self, _ctx: &EvalContext<'_>) -> Outcome {
        let domain = plist::read_domain(self.runner.as_ref(), self.domain);
        let values: Vec<Option<bool>> = self
            .keys
            .iter()
            .map(|key| {
                domain
                    .as_ref()
                    .and_then(|d| d.get(key.name))
                    .and_then(PlistValue::as_bool)
            })
            .collect();
        let passed = self
            .keys
            .iter()
            .zip(&values)
            .all(|(key, value)| value.unwrap_or(key.when_missing));
        debug!(check_id = self.text.id, domain = self.domain, passed, "preferences read");
        *self
            .last_values
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = values;
        Outcome::from_bool(passed)
    }

    fn detail(&self) -> String {
        let values = self
            .last_values
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        self.keys
            .iter()
            .enumerate()
            .map(|(i, key)| match values.get(i).copied().flatten() {
                Some(value) => format!("{}={}", key.name, value),
                None => format!("{} not set", key.name),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn preconditions(&self, _preferences: &Preferences) -> Precondition {
        match &self.required_app {
            Some(path) if !path.exists() => {
                Precondition::Unmet(format!("{} is not installed", path.display()))
            }
            _ => Precondition::Met,
        }
    }
}
