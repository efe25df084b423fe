use std::fmt;

use serde::{Deserialize, Serialize};

use crate::check::{Precondition, Requirements};

/// Permissions granted to the auditor on this device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    #[serde(default)]
    pub full_disk_access: bool,
    #[serde(default)]
    pub automation_access: bool,
    #[serde(default)]
    pub helper_authorized: bool,
}

impl Permissions {
    pub fn all() -> Self {
        Self {
            full_disk_access: true,
            automation_access: true,
            helper_authorized: true,
        }
    }

    pub fn satisfy(&self, req: &Requirements) -> bool {
        (!req.full_disk_access || self.full_disk_access)
            && (!req.automation_access || self.automation_access)
            && (!req.privileged_helper || self.helper_authorized)
    }
}

/// Why a check is not running, in display priority order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisabledReason {
    ManuallyDisabled,
    TeamDisabled,
    DependencyNotConfigured { dependency: String },
    MissingDiskAccess,
    MissingAutomationAccess,
    HelperNotAuthorized,
    Precondition(String),
    NotApplicable,
}

impl fmt::Display for DisabledReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ManuallyDisabled => write!(f, "Manually disabled"),
            Self::TeamDisabled => write!(f, "Disabled by your team"),
            Self::DependencyNotConfigured { dependency } => {
                write!(f, "Requires \"{}\" to be enabled and configured", dependency)
            }
            Self::MissingDiskAccess => write!(f, "Requires full disk access permission"),
            Self::MissingAutomationAccess => {
                write!(f, "Requires System Events automation permission")
            }
            Self::HelperNotAuthorized => {
                write!(f, "Requires the privileged helper to be authorized")
            }
            Self::Precondition(text) => write!(f, "{}", text),
            Self::NotApplicable => write!(f, "Not applicable on this device"),
        }
    }
}

/// Facts the decision table is evaluated over.
#[derive(Debug, Clone)]
pub(crate) struct ReasonInputs<'a> {
    pub stored_enabled: bool,
    pub team_enforced: bool,
    pub team_disabled: bool,
    /// Pass title of the dependency when it is inactive or not runnable.
    pub unmet_dependency: Option<String>,
    pub requirements: Requirements,
    pub permissions: Permissions,
    pub precondition: &'a Precondition,
}

/// First matching row wins.
pub(crate) fn derive_disabled_reason(inputs: &ReasonInputs<'_>) -> DisabledReason {
    if !inputs.team_enforced {
        if inputs.team_disabled {
            return DisabledReason::TeamDisabled;
        }
        if !inputs.stored_enabled {
            return DisabledReason::ManuallyDisabled;
        }
    }
    if let Some(dependency) = &inputs.unmet_dependency {
        return DisabledReason::DependencyNotConfigured {
            dependency: dependency.clone(),
        };
    }
    let req = &inputs.requirements;
    let granted = &inputs.permissions;
    if req.full_disk_access && !granted.full_disk_access {
        return DisabledReason::MissingDiskAccess;
    }
    if req.automation_access && !granted.automation_access {
        return DisabledReason::MissingAutomationAccess;
    }
    if req.privileged_helper && !granted.helper_authorized {
        return DisabledReason::HelperNotAuthorized;
    }
    if let Precondition::Unmet(text) = inputs.precondition {
        return DisabledReason::Precondition(text.clone());
    }
    DisabledReason::NotApplicable
}
