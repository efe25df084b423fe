//! Boot arguments and the current WiFi network.

use std::sync::{Arc, Mutex};

use compliance::{Checkable, CommandRunner, EvalContext, Outcome};
use tracing::debug;

use super::command::{run_program, CheckText, CommandCheck};

pub const BOOT: CheckText = CheckText {
    id: "b96524e0-850b-4bb9-abc7-517051b6c14e",
    pass: "Boot is secure",
    fail: "Boot is not secure",
};

pub const OPEN_WIFI: CheckText = CheckText {
    id: "bcf5196e-6757-422d-8ac3-99ebdb243afa",
    pass: "WiFi connection is secure",
    fail: "WiFi connection is not secure",
};

/// `boot-args` is only set when something like AMFI has been switched off.
/// `nvram` prints an error instead of the variable when it is unset.
pub(crate) fn boot_args_unset(output: &str) -> bool {
    output
        .lines()
        .find_map(|line| line.strip_prefix("boot-args"))
        .map_or(true, |value| value.trim().is_empty())
}

pub fn boot_check(runner: Arc<dyn CommandRunner>) -> CommandCheck {
    CommandCheck::new(BOOT, runner, "/usr/sbin/nvram", &["boot-args"], boot_args_unset)
}

/// Security of the network WiFi is joined to, from
/// `system_profiler SPAirPortDataType`. `None` when not joined.
pub(crate) fn current_network_security(output: &str) -> Option<String> {
    let mut inside = false;
    let mut indent = 0;
    for line in output.lines() {
        let depth = line.len() - line.trim_start().len();
        let trimmed = line.trim();
        if trimmed == "Current Network Information:" {
            inside = true;
            indent = depth;
            continue;
        }
        if !inside || trimmed.is_empty() {
            continue;
        }
        if depth <= indent {
            break;
        }
        if let Some(security) = trimmed.strip_prefix("Security:") {
            return Some(security.trim().to_string());
        }
    }
    None
}

pub(crate) fn is_open_network(security: &str) -> bool {
    matches!(security.trim(), "" | "None" | "Open")
}

/// Whether the routing table sends everything through a VPN tunnel.
pub(crate) fn routed_via_vpn(netstat: &str) -> bool {
    netstat.lines().any(|line| {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() <= 3 {
            return false;
        }
        (fields[0] == "default" && fields[1].contains("link#"))
            || (fields[0] == "0/1" && fields[3].contains("utun"))
    })
}

pub struct OpenWifiCheck {
    runner: Arc<dyn CommandRunner>,
    last: Mutex<Option<String>>,
}

impl OpenWifiCheck {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            last: Mutex::new(None),
        }
    }

    fn remember(&self, detail: String) {
        *self.last.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(detail);
    }
}

impl Checkable for OpenWifiCheck {
    fn id(&self) -> &str {
        OPEN_WIFI.id
    }

    fn title_pass(&self) -> String {
        OPEN_WIFI.pass.to_string()
    }

    fn title_fail(&self) -> String {
        OPEN_WIFI.fail.to_string()
    }

    fn evaluate(&self, _ctx: &EvalContext<'_>) -> Outcome {
        let profile = match run_program(
            self.runner.as_ref(),
            "/usr/sbin/system_profiler",
            &["SPAirPortDataType"],
        ) {
            Ok(profile) => profile,
            Err(err) => return Outcome::Error(format!("system_profiler failed: {}", err)),
        };
        let Some(security) = current_network_security(&profile) else {
            self.remember("not connected".to_string());
            return Outcome::Pass;
        };
        if !is_open_network(&security) {
            self.remember(format!("Security: {}", security));
            return Outcome::Pass;
        }
        let vpn = run_program(self.runner.as_ref(), "/usr/sbin/netstat", &["-rnt"])
            .map(|routes| routed_via_vpn(&routes))
            .unwrap_or(false);
        debug!(vpn, "open WiFi network joined");
        self.remember(format!("Security: {} vpn={}", security, vpn));
        Outcome::from_bool(vpn)
    }

    fn detail(&self) -> String {
        self.last
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
            .unwrap_or_else(|| "None".to_string())
    }
}
