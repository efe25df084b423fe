//! Secure keyboard entry in the terminal emulators.

use std::sync::Arc;

use compliance::CommandRunner;

use super::preferences::{key, PreferenceCheck};
use super::command::CheckText;

pub const SECURE_TERMINAL: CheckText = CheckText {
    id: "5cbe1cfd-ff28-4cc7-8998-5d72e608b28d",
    pass: "Terminal uses secure entry",
    fail: "Terminal is not using secure entry",
};

pub const SECURE_ITERM: CheckText = CheckText {
    id: "6cbe1cfd-ff28-4cc7-8998-5d72e608b28d",
    pass: "iTerm uses secure entry",
    fail: "iTerm is not using secure entry",
};

pub const ITERM_BUNDLE: &str = "/Applications/iTerm.app";

pub fn secure_terminal_check(runner: Arc<dyn CommandRunner>) -> PreferenceCheck {
    PreferenceCheck::new(
        SECURE_TERMINAL,
        "com.apple.Terminal",
        &[key("SecureKeyboardEntry", false)],
        runner,
    )
}

pub fn secure_iterm_check(runner: Arc<dyn CommandRunner>) -> PreferenceCheck {
    PreferenceCheck::new(
        SECURE_ITERM,
        "com.googlecode.iterm2",
        &[key("Secure Input", false)],
        runner,
    )
    .requiring_app(ITERM_BUNDLE)
}
