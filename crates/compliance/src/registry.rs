use std::collections::{HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::check::{Checkable, ErrorFallback, EvalContext, Outcome, Preferences};
use crate::claim::Claim;
use crate::clock::{Clock, SystemClock};
use crate::reason::{derive_disabled_reason, DisabledReason, Permissions, ReasonInputs};
use crate::state::{store_run_result, CheckState, StateKeys};
use crate::store::{KeyValueStore, StoreValue};
use crate::team::TeamPolicy;
use crate::{ComplianceError, Result};

/// Receives the new cached state after every completed run and every
/// settings change.
pub trait StateObserver: Send + Sync {
    fn check_updated(&self, id: &str, state: &CheckState);
}

/// Owns every check definition and mediates all access to their state.
pub struct CheckRegistry {
    checks: HashMap<String, Arc<dyn Checkable>>,
    order: Vec<String>,
    claims: Vec<Claim>,
    store: Arc<dyn KeyValueStore>,
    team: Arc<dyn TeamPolicy>,
    clock: Arc<dyn Clock>,
    permissions: RwLock<Permissions>,
    preferences: RwLock<Preferences>,
    errors: Mutex<HashSet<String>>,
    in_flight: Mutex<HashSet<String>>,
    observers: RwLock<Vec<Arc<dyn StateObserver>>>,
}

impl CheckRegistry {
    pub fn new(store: Arc<dyn KeyValueStore>, team: Arc<dyn TeamPolicy>) -> Self {
        Self {
            checks: HashMap::new(),
            order: Vec::new(),
            claims: Vec::new(),
            store,
            team,
            clock: Arc::new(SystemClock),
            permissions: RwLock::new(Permissions::default()),
            preferences: RwLock::new(Preferences::default()),
            errors: Mutex::new(HashSet::new()),
            in_flight: Mutex::new(HashSet::new()),
            observers: RwLock::new(Vec::new()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_permissions(self, permissions: Permissions) -> Self {
        self.set_permissions(permissions);
        self
    }

    pub fn with_preferences(self, preferences: Preferences) -> Self {
        self.set_preferences(preferences);
        self
    }

    pub fn register(&mut self, check: Arc<dyn Checkable>) -> Result<()> {
        let id = check.id().to_string();
        if self.checks.contains_key(&id) {
            return Err(ComplianceError::DuplicateCheckId(id));
        }
        self.order.push(id.clone());
        self.checks.insert(id, check);
        Ok(())
    }

    /// Registers each check and groups them under `title`.
    pub fn add_claim(&mut self, title: &str, checks: Vec<Arc<dyn Checkable>>) -> Result<()> {
        let mut ids = Vec::with_capacity(checks.len());
        for check in checks {
            ids.push(check.id().to_string());
            self.register(check)?;
        }
        self.claims.push(Claim::new(title, ids));
        Ok(())
    }

    /// Groups already registered checks; unknown ids are rejected.
    pub fn add_claim_of(&mut self, claim: Claim) -> Result<()> {
        if let Some(missing) = claim.check_ids().iter().find(|id| !self.checks.contains_key(*id)) {
            return Err(ComplianceError::UnknownCheck(missing.clone()));
        }
        self.claims.push(claim);
        Ok(())
    }

    pub fn claims(&self) -> &[Claim] {
        &self.claims
    }

    pub fn claim(&self, title: &str) -> Option<&Claim> {
        self.claims.iter().find(|claim| claim.title() == title)
    }

    pub fn check(&self, id: &str) -> Result<&Arc<dyn Checkable>> {
        self.checks
            .get(id)
            .ok_or_else(|| ComplianceError::UnknownCheck(id.to_string()))
    }

    /// Registered ids in registration order.
    pub fn ids(&self) -> &[String] {
        &self.order
    }

    /// True when no check id is registered twice or listed by two claims.
    pub fn unique_ids(&self) -> bool {
        let mut seen = HashSet::new();
        let claimed_unique = self
            .claims
            .iter()
            .flat_map(|claim| claim.check_ids())
            .all(|id| seen.insert(id.as_str()));
        claimed_unique && self.order.len() == self.checks.len()
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    pub fn now_millis(&self) -> i64 {
        self.clock.now_millis()
    }

    pub fn permissions(&self) -> Permissions {
        *self
            .permissions
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_permissions(&self, permissions: Permissions) {
        *self
            .permissions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = permissions;
    }

    pub fn preferences(&self) -> Preferences {
        self.preferences
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn set_preferences(&self, preferences: Preferences) {
        *self
            .preferences
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = preferences;
    }

    pub fn subscribe(&self, observer: Arc<dyn StateObserver>) {
        self.observers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(observer);
    }

    pub fn state(&self, id: &str) -> Result<CheckState> {
        self.check(id)?;
        CheckState::load(self.store.as_ref(), id, self.has_error(id))
    }

    /// Title matching the cached verdict.
    pub fn title(&self, id: &str) -> Result<String> {
        let check = self.check(id)?;
        Ok(check.title_for(&self.state(id)?))
    }

    pub fn is_team_enforced(&self, id: &str) -> bool {
        self.team.enforced_check_ids().contains(id)
    }

    pub fn is_team_disabled(&self, id: &str) -> bool {
        self.team.disabled_check_ids().contains(id)
    }

    /// Effective-enabled: team enforcement wins over both the stored
    /// preference and a team-wide disable.
    pub fn is_active(&self, id: &str) -> Result<bool> {
        if self.is_team_enforced(id) {
            return Ok(true);
        }
        let stored = self.state(id)?.enabled;
        Ok(stored && !self.is_team_disabled(id))
    }

    pub fn is_runnable(&self, id: &str) -> Result<bool> {
        let check = self.check(id)?;
        if !self.is_active(id)? {
            return Ok(false);
        }
        if self.unmet_dependency(check.as_ref())?.is_some() {
            return Ok(false);
        }
        if !self.permissions().satisfy(&check.requirements()) {
            return Ok(false);
        }
        Ok(check.preconditions(&self.preferences()).is_met())
    }

    /// Whether the settings surface may offer an enable toggle.
    pub fn show_settings(&self, id: &str) -> Result<bool> {
        self.check(id)?;
        Ok(!self.is_team_enforced(id) && !self.is_team_disabled(id))
    }

    pub fn set_enabled(&self, id: &str, enabled: bool) -> Result<()> {
        self.check(id)?;
        let keys = StateKeys::for_check(id);
        self.store.set(&keys.enabled, StoreValue::Bool(enabled))?;
        info!(check_id = %id, enabled, "check preference changed");
        self.notify(id)
    }

    pub fn snooze_for(&self, id: &str, duration: Duration) -> Result<()> {
        self.check(id)?;
        let until = self
            .clock
            .now_secs()
            .saturating_add(duration.as_secs() as i64);
        let keys = StateKeys::for_check(id);
        self.store.set(&keys.snooze, StoreValue::Int(until))?;
        info!(check_id = %id, until, "check snoozed");
        self.notify(id)
    }

    pub fn unsnooze(&self, id: &str) -> Result<()> {
        self.check(id)?;
        let keys = StateKeys::for_check(id);
        self.store.set(&keys.snooze, StoreValue::Int(0))?;
        self.notify(id)
    }

    /// Human explanation of why the check is not runnable.
    pub fn disabled_reason(&self, id: &str) -> Result<DisabledReason> {
        let check = self.check(id)?;
        let preferences = self.preferences();
        let precondition = check.preconditions(&preferences);
        let inputs = ReasonInputs {
            stored_enabled: self.state(id)?.enabled,
            team_enforced: self.is_team_enforced(id),
            team_disabled: self.is_team_disabled(id),
            unmet_dependency: self.unmet_dependency(check.as_ref())?,
            requirements: check.requirements(),
            permissions: self.permissions(),
            precondition: &precondition,
        };
        Ok(derive_disabled_reason(&inputs))
    }

    /// Runs one check and returns the verdict now cached for it.
    ///
    /// Only an unknown id or a store failure is reported as an error; every
    /// evaluation failure is absorbed into the error flag.
    pub fn run(&self, id: &str) -> Result<bool> {
        let check = Arc::clone(self.check(id)?);

        let Some(_guard) = InFlight::enter(&self.in_flight, id) else {
            debug!(check_id = %id, "run already in flight, skipping");
            return Ok(self.state(id)?.last_verdict);
        };

        if !self.is_runnable(id)? {
            debug!(check_id = %id, "check not runnable, skipping");
            return Ok(false);
        }

        let previous = self.state(id)?;
        if previous.snooze_until_secs != 0 {
            if previous.is_snoozed(self.clock.now_secs()) {
                debug!(check_id = %id, until = previous.snooze_until_secs, "check snoozed");
                return Ok(previous.last_verdict);
            }
            let keys = StateKeys::for_check(id);
            self.store.set(&keys.snooze, StoreValue::Int(0))?;
        }

        self.set_error(id, false);
        let preferences = self.preferences();
        let now_millis = self.clock.now_millis();
        let ctx = EvalContext {
            previous: &previous,
            preferences: &preferences,
            now_millis,
        };

        let started = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| check.evaluate(&ctx)))
            .unwrap_or_else(|_| Outcome::Error("evaluation panicked".to_string()));

        let (verdict, errored) = match outcome {
            Outcome::Pass => (true, false),
            Outcome::Fail => (false, false),
            Outcome::Error(reason) => {
                warn!(check_id = %id, reason = %reason, "check evaluation failed");
                let fallback = match check.error_fallback() {
                    ErrorFallback::Fail => false,
                    ErrorFallback::PreviousVerdict => previous.last_verdict,
                };
                (fallback, true)
            }
        };
        if errored {
            self.set_error(id, true);
        }

        let detail = panic::catch_unwind(AssertUnwindSafe(|| check.detail()))
            .unwrap_or_else(|_| "None".to_string());
        let run_millis = now_millis.max(previous.last_run_millis);
        store_run_result(self.store.as_ref(), id, verdict, run_millis, &detail)?;

        info!(
            check_id = %id,
            passed = verdict,
            error = errored,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "check finished"
        );
        self.notify(id)?;
        Ok(verdict)
    }

    fn unmet_dependency(&self, check: &dyn Checkable) -> Result<Option<String>> {
        let Some(required) = check.required_check_id() else {
            return Ok(None);
        };
        let dependency = self.check(required)?;
        if dependency.required_check_id().is_some() {
            warn!(
                check_id = %check.id(),
                dependency = %required,
                "nested check dependency ignored"
            );
        }
        let configured = self.is_active(required)?
            && self.permissions().satisfy(&dependency.requirements())
            && dependency.preconditions(&self.preferences()).is_met();
        if configured {
            Ok(None)
        } else {
            Ok(Some(dependency.title_pass()))
        }
    }

    fn has_error(&self, id: &str) -> bool {
        self.errors
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(id)
    }

    fn set_error(&self, id: &str, errored: bool) {
        let mut errors = self
            .errors
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if errored {
            errors.insert(id.to_string());
        } else {
            errors.remove(id);
        }
    }

    fn notify(&self, id: &str) -> Result<()> {
        let observers = self
            .observers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        if observers.is_empty() {
            return Ok(());
        }
        let state = self.state(id)?;
        for observer in observers {
            observer.check_updated(id, &state);
        }
        Ok(())
    }
}

struct InFlight<'a> {
    set: &'a Mutex<HashSet<String>>,
    id: String,
}

impl<'a> InFlight<'a> {
    fn enter(set: &'a Mutex<HashSet<String>>, id: &str) -> Option<Self> {
        let inserted = set
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(id.to_string());
        inserted.then(|| Self {
            set,
            id: id.to_string(),
        })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&self.id);
    }
}
