use std::process::Command;

/// Runs an external program and returns its combined output.
pub trait CommandRunner: Send + Sync {
    fn output(&self, command: &str, args: &[String]) -> std::io::Result<String>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ShellCommandRunner;

impl CommandRunner for ShellCommandRunner {
    fn output(&self, command: &str, args: &[String]) -> std::io::Result<String> {
        let output = Command::new(command).args(args).output()?;
        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&stderr);
        }
        if output.status.success() || !text.trim().is_empty() {
            Ok(text)
        } else {
            Err(std::io::Error::other(format!(
                "command exited with status {}",
                output.status
            )))
        }
    }
}
