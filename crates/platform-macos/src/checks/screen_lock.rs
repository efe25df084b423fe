//! Screen lock and login checks.

use std::sync::Arc;

use compliance::{CommandRunner, Requirements};

use super::command::{CheckText, CommandCheck};

/// Longest screen saver delay that still passes.
pub const MAX_SCREENSAVER_DELAY_SECS: u32 = 300;

pub const SCREENSAVER: CheckText = CheckText {
    id: "13e4dbf1-f87f-4bd9-8a82-f62044f002f4",
    pass: "Screen saver shows in under 5min",
    fail: "Screen saver shows in more than 5min",
};

pub const PASSWORD_AFTER_SLEEP: CheckText = CheckText {
    id: "37dee029-605b-4aab-96b9-5438e5aa44d8",
    pass: "Password after sleep or screensaver is on",
    fail: "Password after sleep or screensaver is off",
};

pub const AUTOLOGIN: CheckText = CheckText {
    id: "f962c423-fdf5-428a-a57a-816abc9b253e",
    pass: "Automatic login is off",
    fail: "Automatic login is on",
};

const REQUIRE_PASSWORD_SCRIPT: &str =
    "tell application \"System Events\" to tell security preferences to get require password to wake";

pub(crate) fn delay_within_limit(output: &str) -> bool {
    output
        .trim()
        .parse::<u32>()
        .is_ok_and(|secs| secs > 0 && secs <= MAX_SCREENSAVER_DELAY_SECS)
}

pub(crate) fn osascript_true(output: &str) -> bool {
    output.trim() == "true"
}

/// `defaults` reports a missing `autoLoginUser` key when nobody logs in
/// automatically.
pub(crate) fn no_autologin_user(output: &str) -> bool {
    output.contains("does not exist")
}

pub fn screensaver_check(runner: Arc<dyn CommandRunner>) -> CommandCheck {
    CommandCheck::new(
        SCREENSAVER,
        runner,
        "/usr/bin/defaults",
        &["-currentHost", "read", "com.apple.screensaver", "idleTime"],
        delay_within_limit,
    )
}

pub fn password_after_sleep_check(runner: Arc<dyn CommandRunner>) -> CommandCheck {
    CommandCheck::new(
        PASSWORD_AFTER_SLEEP,
        runner,
        "/usr/bin/osascript",
        &["-e", REQUIRE_PASSWORD_SCRIPT],
        osascript_true,
    )
    .with_requirements(Requirements {
        automation_access: true,
        ..Requirements::default()
    })
}

pub fn autologin_check(runner: Arc<dyn CommandRunner>) -> CommandCheck {
    CommandCheck::new(
        AUTOLOGIN,
        runner,
        "/usr/bin/defaults",
        &["read", "/Library/Preferences/com.apple.loginwindow", "autoLoginUser"],
        no_autologin_user,
    )
}
