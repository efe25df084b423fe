//! macOS side of the posture agent.
//!
//! Built-in checks read system settings through a [`compliance::CommandRunner`]
//! so they can be exercised off-device, and [`MacInstallInspector`] tells the
//! application update checks what is installed.

pub mod apps;
pub mod checks;
pub mod plist;

pub use apps::{parse_last_used, MacInstallInspector};
pub use checks::{system_claims, ClaimChecks, HostContext};
pub use plist::PlistValue;

pub fn platform_name() -> &'static str {
    "macos"
}
