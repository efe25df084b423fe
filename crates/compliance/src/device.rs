use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::command::CommandRunner;

/// Stand-in for hardware fields the user chose not to share.
pub const HARDWARE_INFO_DISABLED: &str = "Disabled";

/// Identity of the device a report describes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportingDevice {
    #[serde(rename = "machineUUID")]
    pub machine_uuid: String,
    #[serde(rename = "machineName")]
    pub machine_name: String,
    #[serde(rename = "macOSVersion")]
    pub macos_version: String,
    #[serde(rename = "modelName")]
    pub model_name: String,
    #[serde(rename = "modelSerial")]
    pub model_serial: String,
}

impl ReportingDevice {
    /// Reads the host through `sw_vers`, `scutil`, `sysctl` and `ioreg`.
    /// Model and serial are only read when `include_hardware` is set.
    pub fn collect(
        runner: &dyn CommandRunner,
        machine_uuid: &str,
        include_hardware: bool,
    ) -> Self {
        let macos_version = command_line(runner, "/usr/bin/sw_vers", &["-productVersion"])
            .unwrap_or_default();
        let machine_name = command_line(runner, "/usr/sbin/scutil", &["--get", "ComputerName"])
            .unwrap_or_default();
        let (model_name, model_serial) = if include_hardware {
            (
                command_line(runner, "/usr/sbin/sysctl", &["-n", "hw.model"]).unwrap_or_default(),
                run(runner, "/usr/sbin/ioreg", &["-c", "IOPlatformExpertDevice", "-d", "2"])
                    .and_then(|out| parse_serial(&out))
                    .unwrap_or_default(),
            )
        } else {
            (
                HARDWARE_INFO_DISABLED.to_string(),
                HARDWARE_INFO_DISABLED.to_string(),
            )
        };
        Self {
            machine_uuid: machine_uuid.to_string(),
            machine_name,
            macos_version,
            model_name,
            model_serial,
        }
    }
}

fn run(runner: &dyn CommandRunner, program: &str, args: &[&str]) -> Option<String> {
    let args: Vec<String> = args.iter().map(|arg| arg.to_string()).collect();
    match runner.output(program, &args) {
        Ok(output) => Some(output),
        Err(err) => {
            debug!(program, error = %err, "device query failed");
            None
        }
    }
}

fn command_line(runner: &dyn CommandRunner, program: &str, args: &[&str]) -> Option<String> {
    run(runner, program, args)?
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

static SERIAL: OnceLock<Option<Regex>> = OnceLock::new();

/// `"IOPlatformSerialNumber" = "C02XG2JHJG5J"` from `ioreg`.
pub(crate) fn parse_serial(output: &str) -> Option<String> {
    let re = SERIAL
        .get_or_init(|| Regex::new(r#""IOPlatformSerialNumber"\s*=\s*"([^"]*)""#).ok())
        .as_ref()?;
    re.captures(output)?
        .get(1)
        .map(|m| m.as_str().to_string())
        .filter(|serial| !serial.is_empty())
}
