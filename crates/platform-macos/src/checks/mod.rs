//! Built-in macOS posture checks, grouped into the claims the agent shows.

pub mod accounts;
pub mod auto_updates;
pub mod command;
pub mod filevault;
pub mod firewall;
pub mod gatekeeper;
pub mod integrity;
pub mod macos_version;
pub mod preferences;
pub mod screen_lock;
pub mod sharing;
pub mod ssh_keys;
pub mod terminal;
pub mod time_machine;

use std::path::PathBuf;
use std::sync::Arc;

use app_updates::HttpFetcher;
use compliance::{Checkable, CommandRunner};

use accounts::{NoUnusedUsersCheck, PasswordManagerCheck};
use integrity::OpenWifiCheck;
use macos_version::MacOsVersionCheck;
use sharing::InternetSharingCheck;
use ssh_keys::{SshEnvironment, SshKeysPassphraseCheck, SshKeysStrengthCheck};
use time_machine::{BackupProperty, TimeMachineBackupCheck, TimeMachineCheck};

pub const MACOS_UPDATES_CLAIM: &str = "macOS Updates";
pub const ACCESS_SECURITY_CLAIM: &str = "Access Security";
pub const FIREWALL_SHARING_CLAIM: &str = "Firewall & Sharing";
pub const SYSTEM_INTEGRITY_CLAIM: &str = "System Integrity";

/// What the built-in checks need from the host.
pub struct HostContext {
    pub runner: Arc<dyn CommandRunner>,
    pub fetcher: Arc<dyn HttpFetcher>,
    pub home: PathBuf,
    pub ignored_ssh_keys: Vec<String>,
    pub ignored_user_accounts: Vec<String>,
}

pub type ClaimChecks = (&'static str, Vec<Arc<dyn Checkable>>);

pub fn system_claims(ctx: &HostContext) -> Vec<ClaimChecks> {
    let runner = &ctx.runner;
    let ssh = Arc::new(
        SshEnvironment::new(&ctx.home, runner.clone()).with_ignored(ctx.ignored_ssh_keys.clone()),
    );

    vec![
        (
            MACOS_UPDATES_CLAIM,
            vec![
                Arc::new(MacOsVersionCheck::new(runner.clone(), ctx.fetcher.clone())) as Arc<dyn Checkable>,
                Arc::new(auto_updates::auto_install_check(runner.clone())),
                Arc::new(auto_updates::auto_download_check(runner.clone())),
                Arc::new(auto_updates::security_updates_check(runner.clone())),
                Arc::new(auto_updates::system_updates_check(runner.clone())),
            ],
        ),
        (
            ACCESS_SECURITY_CLAIM,
            vec![
                Arc::new(screen_lock::autologin_check(runner.clone())) as Arc<dyn Checkable>,
                Arc::new(screen_lock::password_after_sleep_check(runner.clone())),
                Arc::new(screen_lock::screensaver_check(runner.clone())),
                Arc::new(SshKeysPassphraseCheck::new(ssh.clone())),
                Arc::new(SshKeysStrengthCheck::new(ssh)),
                Arc::new(PasswordManagerCheck::new(&ctx.home, runner.clone())),
                Arc::new(accounts::password_to_unlock_check(runner.clone())),
                Arc::new(NoUnusedUsersCheck::new(
                    runner.clone(),
                    ctx.ignored_user_accounts.clone(),
                )),
                Arc::new(accounts::no_admin_user_check(runner.clone())),
            ],
        ),
        (
            FIREWALL_SHARING_CLAIM,
            vec![
                Arc::new(firewall::firewall_check(runner.clone())) as Arc<dyn Checkable>,
                Arc::new(firewall::stealth_check(runner.clone())),
                Arc::new(sharing::file_sharing_check()),
                Arc::new(sharing::printer_sharing_check(runner.clone())),
                Arc::new(sharing::remote_management_check()),
                Arc::new(sharing::remote_login_check()),
                Arc::new(sharing::airplay_receiver_check()),
                Arc::new(sharing::media_share_check()),
                Arc::new(sharing::airdrop_check(runner.clone())),
                Arc::new(InternetSharingCheck::new(runner.clone())),
            ],
        ),
        (
            SYSTEM_INTEGRITY_CLAIM,
            vec![
                Arc::new(gatekeeper::gatekeeper_check(runner.clone())) as Arc<dyn Checkable>,
                Arc::new(filevault::filevault_check(runner.clone())),
                Arc::new(TimeMachineCheck::new(runner.clone())),
                Arc::new(TimeMachineBackupCheck::new(BackupProperty::UpToDate, runner.clone())),
                Arc::new(TimeMachineBackupCheck::new(BackupProperty::Encrypted, runner.clone())),
                Arc::new(integrity::boot_check(runner.clone())),
                Arc::new(OpenWifiCheck::new(runner.clone())),
                Arc::new(terminal::secure_terminal_check(runner.clone())),
                Arc::new(terminal::secure_iterm_check(runner.clone())),
            ],
        ),
    ]
}
