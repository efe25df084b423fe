//! Sharing services. Most are detected by their listening ports, AirDrop
//! and Internet Sharing by their preferences.

use std::net::{Ipv4Addr, SocketAddr, TcpStream};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use compliance::{Checkable, CommandRunner, EvalContext, Outcome};
use tracing::debug;

use super::command::{CheckText, CommandCheck};
use crate::plist::{self, PlistValue};

pub const NAT_PREFERENCES: &str = "/Library/Preferences/SystemConfiguration/com.apple.nat.plist";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

pub const FILE_SHARING: CheckText = CheckText {
    id: "b96524e0-850b-4bb8-abc7-517051b6c14e",
    pass: "Sharing files is off",
    fail: "Sharing files is on",
};

pub const REMOTE_LOGIN: CheckText = CheckText {
    id: "4ced961d-7cfc-4e7b-8f80-195f6379446e",
    pass: "Remote Login is off",
    fail: "Remote Login is on",
};

pub const REMOTE_MANAGEMENT: CheckText = CheckText {
    id: "05423213-50e7-4535-ac88-60cc21626378",
    pass: "Remote Management is off",
    fail: "Remote Management is on",
};

pub const AIRPLAY_RECEIVER: CheckText = CheckText {
    id: "0cd3ad3c-c41f-4291-82f8-c05dd23c0a9b",
    pass: "AirPlay receiver is off",
    fail: "AirPlay receiver is on",
};

pub const MEDIA_SHARE: CheckText = CheckText {
    id: "0cd3ad3c-c41f-4291-82f8-c05dd23c0a9a",
    pass: "Media Share is off",
    fail: "Media Share is on",
};

pub const PRINTER_SHARING: CheckText = CheckText {
    id: "b96524e0-150b-4bb8-abc7-517051b6c14e",
    pass: "Sharing printers is off",
    fail: "Sharing printers is on",
};

pub const AIRDROP: CheckText = CheckText {
    id: "58e8267b-05eb-490a-9c91-77ac6499af8f",
    pass: "AirDrop is secured",
    fail: "AirDrop is not secured",
};

pub const INTERNET_SHARING: CheckText = CheckText {
    id: "2ed19e08-6ea7-4c53-b735-321cebefa1b4",
    pass: "Sharing internet is off",
    fail: "Sharing internet is on",
};

/// Passes while none of the service's ports accept local connections.
pub struct PortSharingCheck {
    text: CheckText,
    ports: Vec<u16>,
    timeout: Duration,
    open: Mutex<Vec<u16>>,
}

impl PortSharingCheck {
    pub fn new(text: CheckText, ports: &[u16]) -> Self {
        Self {
            text,
            ports: ports.to_vec(),
            timeout: CONNECT_TIMEOUT,
            open: Mutex::new(Vec::new()),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn is_listening(&self, port: u16) -> bool {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
        TcpStream::connect_timeout(&addr, self.timeout).is_ok()
    }
}

impl Checkable for PortSharingCheck {
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
        let open: Vec<u16> = self
            .ports
            .iter()
            .copied()
            .filter(|port| self.is_listening(*port))
            .collect();
        debug!(check_id = self.text.id, open = ?open, "sharing ports scanned");
        let passed = open.is_empty();
        *self.open.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = open;
        Outcome::from_bool(passed)
    }

    fn detail(&self) -> String {
        let open = self.open.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if open.is_empty() {
            return "None".to_string();
        }
        let ports: Vec<String> = open.iter().map(u16::to_string).collect();
        format!("listening on {}", ports.join(","))
    }
}

pub fn file_sharing_check() -> PortSharingCheck {
    PortSharingCheck::new(FILE_SHARING, &[445])
}

pub fn remote_login_check() -> PortSharingCheck {
    PortSharingCheck::new(REMOTE_LOGIN, &[22])
}

pub fn remote_management_check() -> PortSharingCheck {
    PortSharingCheck::new(REMOTE_MANAGEMENT, &[3283])
}

pub fn airplay_receiver_check() -> PortSharingCheck {
    PortSharingCheck::new(AIRPLAY_RECEIVER, &[5000, 7000])
}

pub fn media_share_check() -> PortSharingCheck {
    PortSharingCheck::new(MEDIA_SHARE, &[3689])
}

pub(crate) fn printers_private(output: &str) -> bool {
    ["_share_printers=0", "_remote_admin=0", "_remote_any=0"]
        .iter()
        .all(|setting| output.contains(setting))
}

pub fn printer_sharing_check(runner: Arc<dyn CommandRunner>) -> CommandCheck {
    CommandCheck::new(
        PRINTER_SHARING,
        runner,
        "/usr/sbin/cupsctl",
        &[],
        printers_private,
    )
}

/// Discoverable by contacts only, or not at all. A missing key means the
/// default, which is contacts only.
pub(crate) fn airdrop_restricted(output: &str) -> bool {
    ["Contacts Only", "Off", "does not exist"]
        .iter()
        .any(|mode| output.contains(mode))
}

pub fn airdrop_check(runner: Arc<dyn CommandRunner>) -> CommandCheck {
    CommandCheck::new(
        AIRDROP,
        runner,
        "/usr/bin/defaults",
        &["read", "com.apple.sharingd", "DiscoverableMode"],
        airdrop_restricted,
    )
}

const NAT_SWITCHES: [&str; 3] = ["Enabled", "AirPort.Enabled", "PrimaryInterface.Enabled"];

/// Names of the NAT switches that are turned on. A switch that is not
/// written counts as off.
pub(crate) fn nat_switches_on(root: &PlistValue) -> Vec<&'static str> {
    let Some(nat) = root.get("NAT") else {
        return Vec::new();
    };
    NAT_SWITCHES
        .iter()
        .copied()
        .filter(|switch| {
            let value = match switch.split_once('.') {
                Some((section, key)) => nat.get(section).and_then(|s| s.get(key)),
                None => nat.get(switch),
            };
            value.and_then(PlistValue::as_i64).unwrap_or(0) != 0
        })
        .collect()
}

pub struct InternetSharingCheck {
    runner: Arc<dyn CommandRunner>,
    path: PathBuf,
    enabled: Mutex<Vec<&'static str>>,
}

impl InternetSharingCheck {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            path: PathBuf::from(NAT_PREFERENCES),
            enabled: Mutex::new(Vec::new()),
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }
}

impl Checkable for InternetSharingCheck {
    fn id(&self) -> &str {
        INTERNET_SHARING.id
    }

    fn title_pass(&self) -> String {
        INTERNET_SHARING.pass.to_string()
    }

    fn title_fail(&self) -> String {
        INTERNET_SHARING.fail.to_string()
    }

    fn evaluate(&self, _ctx: &EvalContext<'_>) -> Outcome {
        let enabled = if self.path.exists() {
            plist::read_file(self.runner.as_ref(), &self.path)
                .map(|root| nat_switches_on(&root))
                .unwrap_or_default()
        } else {
            Vec::new()
        };
        debug!(enabled = ?enabled, "nat preferences read");
        let passed = enabled.is_empty();
        *self.enabled.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = enabled;
        Outcome::from_bool(passed)
    }

    fn detail(&self) -> String {
        let enabled = self.enabled.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if enabled.is_empty() {
            "None".to_string()
        } else {
            format!("NAT {} on", enabled.join(","))
        }
    }
}
