//! User-authored rules shown under the "My Checks" claim.
//!
//! Each rule is a YAML file holding a shell command and the output it is
//! expected to print:
//!
//! ```yaml
//! id: ssh-agent-running
//! title: SSH agent
//! check: pgrep -c ssh-agent
//! result:
//!   integer: 1
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::check::{Checkable, EvalContext, Outcome};
use crate::claim::Claim;
use crate::command::CommandRunner;
use crate::registry::CheckRegistry;
use crate::{version_gte, ComplianceError, Result};

pub const MY_CHECKS_CLAIM_TITLE: &str = "My Checks";

const SHELL: &str = "/bin/sh";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomRule {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub title_pass: Option<String>,
    #[serde(default)]
    pub title_fail: Option<String>,
    pub check: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub discussion: Option<String>,
    #[serde(default)]
    pub fix: Option<String>,
    pub result: ExpectedResult,
}

impl CustomRule {
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.id)
    }

    pub fn command(&self) -> &str {
        self.check.trim()
    }
}

/// Expected command output. `integer` wins when both are given. `op`
/// defaults to exact equality.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ExpectedResult {
    #[serde(default)]
    pub integer: Option<i64>,
    #[serde(default)]
    pub string: Option<String>,
    #[serde(default)]
    pub op: Option<String>,
}

impl ExpectedResult {
    /// Comparison errors count as a mismatch.
    pub fn matches_output(&self, actual: &str) -> bool {
        self.matches(actual).unwrap_or(false)
    }

    fn matches(&self, actual: &str) -> std::result::Result<bool, String> {
        let op = self.op.as_deref().unwrap_or("eq");
        if let Some(expected) = self.integer {
            let Ok(value) = actual.parse::<i64>() else {
                return Ok(op == "neq");
            };
            return match op {
                "eq" => Ok(value == expected),
                "neq" => Ok(value != expected),
                "gte" => Ok(value >= expected),
                "lte" => Ok(value <= expected),
                _ => Err(format!("unsupported op {} for integer result", op)),
            };
        }
        if let Some(expected) = &self.string {
            return evaluate_string_op(actual, expected, op);
        }
        Ok(false)
    }
}

fn evaluate_string_op(actual: &str, expected: &str, op: &str) -> std::result::Result<bool, String> {
    match op {
        "eq" => Ok(actual == expected),
        "neq" => Ok(actual != expected),
        "contains" => Ok(actual.contains(expected)),
        "not_contains" => Ok(!actual.contains(expected)),
        "regex" => {
            let re = regex::Regex::new(expected).map_err(|err| format!("regex error: {}", err))?;
            Ok(re.is_match(actual))
        }
        "gte" => Ok(version_gte(actual, expected)),
        "lte" => Ok(version_gte(expected, actual)),
        "present" => Ok(!actual.trim().is_empty()),
        _ => Err(format!("unsupported op {}", op)),
    }
}

pub fn parse_custom_rule(raw: &str) -> Result<CustomRule> {
    let rule: CustomRule =
        serde_yaml::from_str(raw).map_err(|err| ComplianceError::RuleParse(err.to_string()))?;
    if rule.id.trim().is_empty() {
        return Err(ComplianceError::RuleParse("rule id is empty".to_string()));
    }
    if rule.command().is_empty() {
        return Err(ComplianceError::RuleParse(format!(
            "rule {} has an empty check command",
            rule.id
        )));
    }
    Ok(rule)
}

/// Reads every `*.yaml`/`*.yml` file in `dir`, in file name order.
/// Unreadable or malformed files are skipped.
pub fn load_custom_rules(dir: &Path) -> Vec<CustomRule> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            debug!(dir = %dir.display(), error = %err, "custom rules directory unavailable");
            return Vec::new();
        }
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            matches!(
                path.extension().and_then(|ext| ext.to_str()),
                Some("yaml") | Some("yml")
            )
        })
        .collect();
    paths.sort();

    let mut rules = Vec::with_capacity(paths.len());
    for path in paths {
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed reading custom rule");
                continue;
            }
        };
        match parse_custom_rule(&raw) {
            Ok(rule) => rules.push(rule),
            Err(err) => warn!(path = %path.display(), error = %err, "skipping custom rule"),
        }
    }
    rules
}

/// Registers the rules as the "My Checks" claim when the preference allows
/// it. Rules whose id is already taken are skipped. Returns how many were
/// registered.
pub fn register_custom_checks(
    registry: &mut CheckRegistry,
    rules: Vec<CustomRule>,
    runner: Arc<dyn CommandRunner>,
) -> Result<usize> {
    if !registry.preferences().my_checks {
        debug!("custom checks disabled by preference");
        return Ok(0);
    }

    let mut ids = Vec::with_capacity(rules.len());
    for rule in rules {
        let id = rule.id.clone();
        match registry.register(Arc::new(CustomCheck::new(rule, Arc::clone(&runner)))) {
            Ok(()) => ids.push(id),
            Err(ComplianceError::DuplicateCheckId(dup)) => {
                warn!(check_id = %dup, "custom rule id already registered, skipping")
            }
            Err(err) => return Err(err),
        }
    }
    let count = ids.len();
    registry.add_claim_of(Claim::new(MY_CHECKS_CLAIM_TITLE, ids))?;
    info!(count, "custom checks registered");
    Ok(count)
}

/// Check wrapping a [`CustomRule`].
pub struct CustomCheck {
    rule: CustomRule,
    runner: Arc<dyn CommandRunner>,
    last_output: Mutex<Option<String>>,
}

impl CustomCheck {
    pub fn new(rule: CustomRule, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            rule,
            runner,
            last_output: Mutex::new(None),
        }
    }

    pub fn rule(&self) -> &CustomRule {
        &self.rule
    }
}

impl Checkable for CustomCheck {
    fn id(&self) -> &str {
        &self.rule.id
    }

    fn title_pass(&self) -> String {
        self.rule
            .title_pass
            .clone()
            .unwrap_or_else(|| format!("{} is passing", self.rule.display_title()))
    }

    fn title_fail(&self) -> String {
        self.rule
            .title_fail
            .clone()
            .unwrap_or_else(|| format!("{} is failing", self.rule.display_title()))
    }

    fn evaluate(&self, _ctx: &EvalContext<'_>) -> Outcome {
        let args = vec!["-c".to_string(), self.rule.command().to_string()];
        let output = match self.runner.output(SHELL, &args) {
            Ok(output) => output.trim().to_string(),
            Err(err) => return Outcome::Error(format!("command failed: {}", err)),
        };
        debug!(check_id = %self.rule.id, output = %output, "custom rule output");
        *self
            .last_output
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(output.clone());

        match self.rule.result.matches(&output) {
            Ok(passed) => Outcome::from_bool(passed),
            Err(err) => Outcome::Error(err),
        }
    }

    fn detail(&self) -> String {
        match self
            .last_output
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_deref()
        {
            Some(output) => format!("out={}", output),
            None => "None".to_string(),
        }
    }
}
