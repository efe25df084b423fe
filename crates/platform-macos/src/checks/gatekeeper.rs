//! Gatekeeper via `spctl --status`.

use std::sync::Arc;

use compliance::CommandRunner;

use super::command::{CheckText, CommandCheck};

pub const GATEKEEPER: CheckText = CheckText {
    id: "b59e172e-6a2d-4309-94ed-11e8722836b3",
    pass: "Gatekeeper is on",
    fail: "Gatekeeper is off",
};

pub(crate) fn assessments_enabled(output: &str) -> bool {
    output.contains("assessments enabled")
}

pub fn gatekeeper_check(runner: Arc<dyn CommandRunner>) -> CommandCheck {
    CommandCheck::new(
        GATEKEEPER,
        runner,
        "/usr/sbin/spctl",
        &["--status"],
        assessments_enabled,
    )
}
