use std::collections::HashSet;
use std::sync::RwLock;

/// Organisation policy applied on top of local preferences.
pub trait TeamPolicy: Send + Sync {
    /// Checks that are always active, whatever the user stored.
    fn enforced_check_ids(&self) -> HashSet<String>;

    /// Checks the organisation switched off for every member.
    fn disabled_check_ids(&self) -> HashSet<String> {
        HashSet::new()
    }
}

/// Device that is not enrolled in a team.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTeam;

impl TeamPolicy for NoTeam {
    fn enforced_check_ids(&self) -> HashSet<String> {
        HashSet::new()
    }
}

/// Team policy held in memory and replaced wholesale on every refresh.
#[derive(Debug, Default)]
pub struct StaticTeamPolicy {
    enforced: RwLock<HashSet<String>>,
    disabled: RwLock<HashSet<String>>,
}

impl StaticTeamPolicy {
    pub fn new<I, J>(enforced: I, disabled: J) -> Self
    where
        I: IntoIterator<Item = String>,
        J: IntoIterator<Item = String>,
    {
        Self {
            enforced: RwLock::new(enforced.into_iter().collect()),
            disabled: RwLock::new(disabled.into_iter().collect()),
        }
    }

    pub fn replace<I, J>(&self, enforced: I, disabled: J)
    where
        I: IntoIterator<Item = String>,
        J: IntoIterator<Item = String>,
    {
        *self
            .enforced
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = enforced.into_iter().collect();
        *self
            .disabled
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = disabled.into_iter().collect();
    }
}

impl TeamPolicy for StaticTeamPolicy {
    fn enforced_check_ids(&self) -> HashSet<String> {
        self.enforced
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn disabled_check_ids(&self) -> HashSet<String> {
        self.disabled
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}
