//! FileVault disk encryption via `fdesetup status`.

use std::sync::Arc;

use compliance::CommandRunner;

use super::command::{CheckText, CommandCheck};

pub const FILEVAULT: CheckText = CheckText {
    id: "c3aee29a-f16d-4573-a861-b3ba0d860067",
    pass: "FileVault is on",
    fail: "FileVault is off",
};

pub(crate) fn filevault_on(output: &str) -> bool {
    output.contains("FileVault is On")
}

pub fn filevault_check(runner: Arc<dyn CommandRunner>) -> CommandCheck {
    CommandCheck::new(FILEVAULT, runner, "/usr/bin/fdesetup", &["status"], filevault_on)
}

#[cfg(test)]
mod tests {
    use super::filevault_on;

    #[test]
    fn encryption_in_progress_is_not_on() {
        assert!(filevault_on("FileVault is On.\n"));
        assert!(!filevault_on("FileVault is Off."));
        assert!(!filevault_on("Encryption in progress: Percent completed = 12.3"));
    }
}
