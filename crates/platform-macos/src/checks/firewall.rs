//! Application Firewall checks via `socketfilterfw`.

use std::sync::{Arc, OnceLock};

use compliance::CommandRunner;
use regex::Regex;

use super::command::{CheckText, CommandCheck};

const SOCKETFILTERFW: &str = "/usr/libexec/ApplicationFirewall/socketfilterfw";

pub const FIREWALL: CheckText = CheckText {
    id: "2e46c89a-5461-4865-a92e-3b799c12034a",
    pass: "Firewall is on",
    fail: "Firewall is off",
};

pub const FIREWALL_STEALTH: CheckText = CheckText {
    id: "2e46c89a-5461-4865-a92e-3b799c12034b",
    pass: "Firewall stealth mode is enabled",
    fail: "Firewall stealth mode is disabled",
};

static STATE: OnceLock<Option<Regex>> = OnceLock::new();

/// `State = N` from `--getglobalstate`; 1 is on, 2 blocks all incoming.
fn global_state(output: &str) -> Option<u8> {
    let re = STATE
        .get_or_init(|| Regex::new(r"State = (\d)").ok())
        .as_ref()?;
    re.captures(output)?.get(1)?.as_str().parse().ok()
}

fn says_enabled(output: &str) -> bool {
    let lower = output.to_ascii_lowercase();
    !lower.contains("disabled") && (lower.contains("enabled") || lower.contains(" is on"))
}

pub(crate) fn firewall_on(output: &str) -> bool {
    match global_state(output) {
        Some(state) => state >= 1,
        None => says_enabled(output),
    }
}

pub(crate) fn stealth_on(output: &str) -> bool {
    says_enabled(output)
}

pub fn firewall_check(runner: Arc<dyn CommandRunner>) -> CommandCheck {
    CommandCheck::new(
        FIREWALL,
        runner,
        SOCKETFILTERFW,
        &["--getglobalstate"],
        firewall_on,
    )
}

pub fn stealth_check(runner: Arc<dyn CommandRunner>) -> CommandCheck {
    CommandCheck::new(
        FIREWALL_STEALTH,
        runner,
        SOCKETFILTERFW,
        &["--getstealthmode"],
        stealth_on,
    )
}

#[cfg(test)]
mod tests {
    use super::{firewall_on, stealth_on};

    #[test]
    fn firewall_state_is_read_from_socketfilterfw() {
        assert!(firewall_on("Firewall is enabled. (State = 1)\n"));
        assert!(firewall_on("Firewall is blocking all incoming. (State = 2)"));
        assert!(!firewall_on("Firewall is disabled. (State = 0)"));
        assert!(!firewall_on(""));
    }

    #[test]
    fn stealth_mode_wording_variants() {
        assert!(stealth_on("Firewall stealth mode is on"));
        assert!(stealth_on("Stealth mode enabled"));
        assert!(!stealth_on("Firewall stealth mode is off"));
        assert!(!stealth_on("Stealth mode disabled"));
    }
}
