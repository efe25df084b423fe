//! Local accounts and credential hygiene.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use compliance::{Checkable, CommandRunner, EvalContext, Outcome, Requirements};
use tracing::debug;

use super::command::{run_program, CheckText, CommandCheck};

const DSCL: &str = "/usr/bin/dscl";

/// Group id of `admin` when the directory does not say otherwise.
pub const DEFAULT_ADMIN_GID: u32 = 80;

/// First uid handed to a person rather than a service.
pub const FIRST_HUMAN_UID: u32 = 501;

pub const NO_ADMIN_USER: CheckText = CheckText {
    id: "0659aa04-b81f-7cb9-8000-f8e76dc9185a",
    pass: "Current user is not admin",
    fail: "Current user is admin",
};

pub const NO_UNUSED_USERS: CheckText = CheckText {
    id: "c6559a48-c7ad-450b-a9eb-765f031ef49e",
    pass: "No unused user accounts are present",
    fail: "Unused user accounts are present",
};

pub const PASSWORD_MANAGER: CheckText = CheckText {
    id: "f962c423-fdf5-428a-a57a-827abc9b253e",
    pass: "Password manager is installed",
    fail: "Password manager is not installed",
};

pub const PASSWORD_TO_UNLOCK: CheckText = CheckText {
    id: "f962c423-fdf5-428a-a57a-816abc9b252d",
    pass: "Password to unlock preferences",
    fail: "No password to unlock preferences",
};

const REQUIRE_PASSWORD_TO_UNLOCK_SCRIPT: &str =
    "tell application \"System Events\" to tell security preferences to get require password to unlock";

pub(crate) fn not_in_admin_group(output: &str) -> bool {
    !output.split_whitespace().any(|group| group == "admin")
}

pub fn no_admin_user_check(runner: Arc<dyn CommandRunner>) -> CommandCheck {
    CommandCheck::new(NO_ADMIN_USER, runner, "/usr/bin/id", &["-Gn"], not_in_admin_group)
}

pub(crate) fn unlock_needs_password(output: &str) -> bool {
    output.contains("true")
}

pub fn password_to_unlock_check(runner: Arc<dyn CommandRunner>) -> CommandCheck {
    CommandCheck::new(
        PASSWORD_TO_UNLOCK,
        runner,
        "/usr/bin/osascript",
        &["-e", REQUIRE_PASSWORD_TO_UNLOCK_SCRIPT],
        unlock_needs_password,
    )
    .with_requirements(Requirements {
        automation_access: true,
        ..Requirements::default()
    })
}

/// Names that look like service accounts even with a human uid.
pub(crate) fn is_person_name(name: &str) -> bool {
    !name.starts_with('_')
        && name.chars().count() > 1
        && !matches!(name, "root" | "nobody" | "daemon")
}

/// `dscl . -list /Users <attribute>` rows: a name and a number.
pub(crate) fn parse_user_numbers(output: &str) -> Vec<(String, u32)> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let name = fields.next()?;
            let number = fields.next()?.parse::<u32>().ok()?;
            Some((name.to_string(), number))
        })
        .collect()
}

/// Values after `Attribute:` in `dscl . -read` output, including the
/// continuation lines `dscl` wraps long values onto.
pub(crate) fn parse_attribute_values(output: &str, attribute: &str) -> Vec<String> {
    let prefix = format!("{}:", attribute);
    let mut values = Vec::new();
    let mut inside = false;
    for line in output.lines() {
        if let Some(rest) = line.strip_prefix(&prefix) {
            inside = true;
            values.extend(rest.split_whitespace().map(str::to_string));
        } else if inside && line.starts_with(' ') {
            values.extend(line.split_whitespace().map(str::to_string));
        } else {
            inside = false;
        }
    }
    values
}

/// Local accounts as the unused-account check sees them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalAccounts {
    pub people: BTreeSet<String>,
    pub admins: BTreeSet<String>,
    pub current_user: String,
}

impl LocalAccounts {
    pub fn read(runner: &dyn CommandRunner) -> std::io::Result<Self> {
        let uids = run_program(runner, DSCL, &[".", "-list", "/Users", "UniqueID"])?;
        let people: BTreeSet<String> = parse_user_numbers(&uids)
            .into_iter()
            .filter(|(name, uid)| *uid >= FIRST_HUMAN_UID && is_person_name(name))
            .map(|(name, _)| name)
            .collect();

        let admin_gid = run_program(runner, DSCL, &[".", "-read", "/Groups/admin", "PrimaryGroupID"])
            .ok()
            .and_then(|out| parse_attribute_values(&out, "PrimaryGroupID").first()?.parse().ok())
            .unwrap_or(DEFAULT_ADMIN_GID);
        let mut admins: BTreeSet<String> =
            run_program(runner, DSCL, &[".", "-read", "/Groups/admin", "GroupMembership"])
                .map(|out| parse_attribute_values(&out, "GroupMembership"))
                .unwrap_or_default()
                .into_iter()
                .filter(|name| is_person_name(name))
                .collect();
        let gids = run_program(runner, DSCL, &[".", "-list", "/Users", "PrimaryGroupID"])
            .unwrap_or_default();
        admins.extend(
            parse_user_numbers(&gids)
                .into_iter()
                .filter(|(name, gid)| *gid == admin_gid && is_person_name(name))
                .map(|(name, _)| name),
        );

        let current_user = run_program(runner, "/usr/bin/id", &["-un"])?
            .trim()
            .to_string();
        Ok(Self {
            people,
            admins,
            current_user,
        })
    }

    /// People without admin rights, split into counted and ignored.
    pub fn non_admins(&self, ignored: &[String]) -> (Vec<String>, Vec<String>) {
        self.people
            .iter()
            .filter(|name| !self.admins.contains(*name))
            .cloned()
            .partition(|name| !ignored.contains(name))
    }

    /// A non-admin may only see their own account; an admin none at all.
    pub fn passes(&self, ignored: &[String]) -> bool {
        let (active, _) = self.non_admins(ignored);
        if self.admins.contains(&self.current_user) {
            active.is_empty()
        } else {
            active.len() == 1
        }
    }
}

pub struct NoUnusedUsersCheck {
    runner: Arc<dyn CommandRunner>,
    ignored: Vec<String>,
    last: Mutex<Option<LocalAccounts>>,
}

impl NoUnusedUsersCheck {
    pub fn new(runner: Arc<dyn CommandRunner>, ignored: Vec<String>) -> Self {
        Self {
            runner,
            ignored,
            last: Mutex::new(None),
        }
    }
}

impl Checkable for NoUnusedUsersCheck {
    fn id(&self) -> &str {
        NO_UNUSED_USERS.id
    }

    fn title_pass(&self) -> String {
        NO_UNUSED_USERS.pass.to_string()
    }

    fn title_fail(&self) -> String {
        NO_UNUSED_USERS.fail.to_string()
    }

    fn evaluate(&self, _ctx: &EvalContext<'_>) -> Outcome {
        let accounts = match LocalAccounts::read(self.runner.as_ref()) {
            Ok(accounts) => accounts,
            Err(err) => return Outcome::Error(format!("reading local accounts failed: {}", err)),
        };
        let passed = accounts.passes(&self.ignored);
        debug!(people = accounts.people.len(), admins = accounts.admins.len(), passed, "local accounts read");
        *self.last.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(accounts);
        Outcome::from_bool(passed)
    }

    fn detail(&self) -> String {
        let last = self.last.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(accounts) = last.as_ref() else {
            return "None".to_string();
        };
        let (active, ignored) = accounts.non_admins(&self.ignored);
        let mut lines = Vec::new();
        if !active.is_empty() {
            lines.push("Active unused accounts:".to_string());
            lines.extend(active.iter().map(|name| format!("- {}", name)));
        }
        if !ignored.is_empty() {
            if !lines.is_empty() {
                lines.push(String::new());
            }
            lines.push("Ignored accounts:".to_string());
            lines.extend(ignored.iter().map(|name| format!("- {} (ignored)", name)));
        }
        if lines.is_empty() {
            "None".to_string()
        } else {
            lines.join("\n")
        }
    }
}

pub const PASSWORD_MANAGER_PROCESSES: &[&str] = &[
    "1Password",
    "1Password 8",
    "1Password 7",
    "Bitwarden",
    "Dashlane",
    "KeePassXC",
    "KeePassX",
    "KeePassium",
    "LastPass",
    "RoboForm",
    "Enpass",
    "NordPass",
    "Keeper Password Manager",
    "Keeper",
];

pub const PASSWORD_MANAGER_BUNDLES: &[&str] = &[
    "1Password.app",
    "1Password 8.app",
    "1Password 7.app",
    "Bitwarden.app",
    "Dashlane.app",
    "KeePassXC.app",
    "KeePassX.app",
    "KeePassium.app",
];

/// Chromium extension ids of password managers.
pub const PASSWORD_MANAGER_EXTENSIONS: &[(&str, &str)] = &[
    ("hdokiejnpimakedhajhdlcegeplioahd", "LastPass"),
    ("ghmbeldphafepmbegfdlkpapadhbakde", "ProtonPass"),
    ("eiaeiblijfjekdanodkjadfinkhbfgcd", "NordPass"),
    ("nngceckbapebfimnlniiiahkandclblb", "Bitwarden"),
    ("aeblfdkhhhdcdjpifhhbdiojplfjncoa", "1Password"),
    ("fdjamakpfbbddfjaooikfcpapjohcfmg", "Dashlane"),
    ("pejdijmoenmkgeppbflobdenhhabjlaj", "Apple Passwords"),
];

/// Browser profiles under `~/Library/Application Support`.
pub const BROWSER_PROFILES: &[(&str, &str)] = &[
    ("Google/Chrome/Default", "Chrome"),
    ("BraveSoftware/Brave-Browser/Default", "Brave"),
    ("Microsoft Edge/Default", "Edge"),
    ("Arc/User Data/Default", "Arc"),
];

pub(crate) fn running_password_managers(ps_output: &str) -> Vec<String> {
    let mut found: Vec<String> = ps_output
        .lines()
        .map(str::trim)
        .filter(|name| PASSWORD_MANAGER_PROCESSES.contains(name))
        .map(str::to_string)
        .collect();
    found.sort();
    found.dedup();
    found
}

/// Passes when a password manager runs, is installed, or lives in a
/// browser as an extension.
pub struct PasswordManagerCheck {
    runner: Arc<dyn CommandRunner>,
    app_roots: Vec<PathBuf>,
    browser_root: PathBuf,
    found: Mutex<Vec<String>>,
}

impl PasswordManagerCheck {
    pub fn new(home: &Path, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            app_roots: vec![
                PathBuf::from("/Applications"),
                PathBuf::from("/System/Applications"),
                PathBuf::from("/Applications/Setapp"),
                home.join("Applications"),
            ],
            browser_root: home.join("Library").join("Application Support"),
            found: Mutex::new(Vec::new()),
        }
    }

    pub fn with_app_roots(mut self, roots: Vec<PathBuf>) -> Self {
        self.app_roots = roots;
        self
    }

    pub fn with_browser_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.browser_root = root.into();
        self
    }

    fn installed(&self) -> Vec<String> {
        self.app_roots
            .iter()
            .flat_map(|root| {
                PASSWORD_MANAGER_BUNDLES
                    .iter()
                    .map(move |bundle| root.join(bundle))
            })
            .filter(|path| path.exists())
            .map(|path| path.display().to_string())
            .collect()
    }

    fn extensions(&self) -> Vec<String> {
        BROWSER_PROFILES
            .iter()
            .flat_map(|(profile, browser)| {
                let dir = self.browser_root.join(profile).join("Extensions");
                PASSWORD_MANAGER_EXTENSIONS
                    .iter()
                    .filter(move |(id, _)| dir.join(id).exists())
                    .map(move |(_, name)| format!("{} in {}", name, browser))
            })
            .collect()
    }
}

impl Checkable for PasswordManagerCheck {
    fn id(&self) -> &str {
        PASSWORD_MANAGER.id
    }

    fn title_pass(&self) -> String {
        PASSWORD_MANAGER.pass.to_string()
    }

    fn title_fail(&self) -> String {
        PASSWORD_MANAGER.fail.to_string()
    }

    fn evaluate(&self, _ctx: &EvalContext<'_>) -> Outcome {
        let mut found: Vec<String> = match run_program(self.runner.as_ref(), "/bin/ps", &["-axco", "comm"]) {
            Ok(output) => running_password_managers(&output)
                .into_iter()
                .map(|name| format!("{} (running)", name))
                .collect(),
            Err(err) => {
                debug!(error = %err, "process list unavailable");
                Vec::new()
            }
        };
        found.extend(self.installed());
        found.extend(self.extensions());
        debug!(found = ?found, "password managers scanned");
        let passed = !found.is_empty();
        *self.found.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = found;
        Outcome::from_bool(passed)
    }

    fn detail(&self) -> String {
        let found = self.found.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if found.is_empty() {
            "None".to_string()
        } else {
            found.join("\n")
        }
    }
}
