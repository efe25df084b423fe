use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;

use compliance::{
    load_custom_rules, register_custom_checks, CheckRegistry, CheckState, Checkable, Claim,
    CommandRunner, DisabledReason, ErrorFallback, EvalContext, ManualClock, MemoryStore, NoTeam,
    Outcome, Permissions, Precondition, Preferences, Requirements, StateObserver,
    StaticTeamPolicy, SNOOZE_ONE_HOUR,
};

const T0: i64 = 1_700_000_000_000;

struct FixedCheck {
    id: String,
    outcome: Mutex<Outcome>,
    runs: AtomicUsize,
    required: Option<String>,
    precondition: Mutex<Precondition>,
    requirements: Requirements,
    fallback: ErrorFallback,
}

impl FixedCheck {
    fn new(id: &str, outcome: Outcome) -> Self {
        Self {
            id: id.to_string(),
            outcome: Mutex::new(outcome),
            runs: AtomicUsize::new(0),
            required: None,
            precondition: Mutex::new(Precondition::Met),
            requirements: Requirements::default(),
            fallback: ErrorFallback::Fail,
        }
    }

    fn set_outcome(&self, outcome: Outcome) {
        *self.outcome.lock().unwrap() = outcome;
    }

    fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

impl Checkable for FixedCheck {
    fn id(&self) -> &str {
        &self.id
    }

    fn title_pass(&self) -> String {
        format!("{} passes", self.id)
    }

    fn title_fail(&self) -> String {
        format!("{} fails", self.id)
    }

    fn evaluate(&self, _ctx: &EvalContext<'_>) -> Outcome {
        self.runs.fetch_add(1, Ordering::SeqCst);
        self.outcome.lock().unwrap().clone()
    }

    fn detail(&self) -> String {
        format!("runs={}", self.runs())
    }

    fn preconditions(&self, _preferences: &Preferences) -> Precondition {
        self.precondition.lock().unwrap().clone()
    }

    fn required_check_id(&self) -> Option<&str> {
        self.required.as_deref()
    }

    fn requirements(&self) -> Requirements {
        self.requirements
    }

    fn error_fallback(&self) -> ErrorFallback {
        self.fallback
    }
}

struct Fixture {
    registry: CheckRegistry,
    clock: Arc<ManualClock>,
}

fn fixture_with_team(team: Arc<StaticTeamPolicy>, checks: Vec<Arc<FixedCheck>>) -> Fixture {
    let clock = Arc::new(ManualClock::new(T0));
    let mut registry = CheckRegistry::new(Arc::new(MemoryStore::new()), team)
        .with_clock(clock.clone())
        .with_permissions(Permissions::all());
    let dyn_checks: Vec<Arc<dyn Checkable>> = checks
        .into_iter()
        .map(|c| c as Arc<dyn Checkable>)
        .collect();
    registry.add_claim("Test", dyn_checks).expect("add claim");
    Fixture { registry, clock }
}

fn fixture(checks: Vec<Arc<FixedCheck>>) -> Fixture {
    fixture_with_team(Arc::new(StaticTeamPolicy::default()), checks)
}

#[test]
fn first_run_records_pass_with_timestamp() {
    let check = Arc::new(FixedCheck::new("X", Outcome::Pass));
    let f = fixture(vec![check.clone()]);

    let before = f.registry.state("X").expect("state");
    assert_eq!(before.last_run_millis, 0);

    assert!(f.registry.run("X").expect("run"));
    let after = f.registry.state("X").expect("state");
    assert!(after.last_verdict);
    assert!(after.last_run_millis > 0);
    assert!(!after.last_error);
    assert_eq!(after.detail, "runs=1");
}

#[test]
fn disabled_check_run_leaves_state_untouched() {
    let check = Arc::new(FixedCheck::new("X", Outcome::Pass));
    let f = fixture(vec![check.clone()]);
    f.registry.run("X").expect("run");
    let before = f.registry.state("X").expect("state");

    f.registry.set_enabled("X", false).expect("disable");
    check.set_outcome(Outcome::Fail);
    f.clock.advance_secs(60);

    assert!(!f.registry.run("X").expect("run"));
    let after = f.registry.state("X").expect("state");
    assert_eq!(after.last_verdict, before.last_verdict);
    assert_eq!(after.last_run_millis, before.last_run_millis);
    assert_eq!(after.detail, before.detail);
    assert!(!after.enabled);
    assert_eq!(check.runs(), 1);
    assert_eq!(
        f.registry.disabled_reason("X").expect("reason"),
        DisabledReason::ManuallyDisabled
    );
}

#[test]
fn snoozed_check_is_skipped_until_snooze_elapses() {
    let check = Arc::new(FixedCheck::new("X", Outcome::Pass));
    let f = fixture(vec![check.clone()]);
    f.registry.run("X").expect("run");
    let before = f.registry.state("X").expect("state");

    f.registry.snooze_for("X", SNOOZE_ONE_HOUR).expect("snooze");
    check.set_outcome(Outcome::Fail);
    f.clock.advance_secs(60);

    assert!(f.registry.run("X").expect("run"));
    let during = f.registry.state("X").expect("state");
    assert_eq!(during.last_verdict, before.last_verdict);
    assert_eq!(during.last_run_millis, before.last_run_millis);
    assert_eq!(check.runs(), 1);

    f.clock.advance_secs(3600);
    assert!(!f.registry.run("X").expect("run"));
    let after = f.registry.state("X").expect("state");
    assert!(!after.last_verdict);
    assert_eq!(after.snooze_until_secs, 0);
    assert!(after.last_run_millis > before.last_run_millis);
    assert!(after.enabled);
}

#[test]
fn unsnooze_lets_next_run_proceed() {
    let check = Arc::new(FixedCheck::new("X", Outcome::Pass));
    let f = fixture(vec![check.clone()]);
    f.registry.snooze_for("X", SNOOZE_ONE_HOUR).expect("snooze");
    f.registry.run("X").expect("run");
    assert_eq!(check.runs(), 0);

    f.registry.unsnooze("X").expect("unsnooze");
    assert!(f.registry.run("X").expect("run"));
    assert_eq!(check.runs(), 1);
}

#[test]
fn team_enforced_check_stays_active_without_overwriting_preference() {
    let team = Arc::new(StaticTeamPolicy::new(vec!["X".to_string()], Vec::new()));
    let check = Arc::new(FixedCheck::new("X", Outcome::Pass));
    let f = fixture_with_team(team.clone(), vec![check.clone()]);

    f.registry.set_enabled("X", false).expect("disable");
    assert!(f.registry.is_team_enforced("X"));
    assert!(f.registry.is_active("X").expect("active"));
    assert!(!f.registry.show_settings("X").expect("settings"));
    assert!(f.registry.run("X").expect("run"));

    let stored = f.registry.state("X").expect("state");
    assert!(!stored.enabled);

    team.replace(Vec::new(), Vec::new());
    assert!(!f.registry.is_active("X").expect("active"));
    assert!(f.registry.show_settings("X").expect("settings"));
}

#[test]
fn team_disabled_check_does_not_run() {
    let team = Arc::new(StaticTeamPolicy::new(Vec::new(), vec!["X".to_string()]));
    let check = Arc::new(FixedCheck::new("X", Outcome::Pass));
    let f = fixture_with_team(team, vec![check.clone()]);

    assert!(!f.registry.run("X").expect("run"));
    assert_eq!(check.runs(), 0);
    assert!(!f.registry.show_settings("X").expect("settings"));
    assert_eq!(
        f.registry.disabled_reason("X").expect("reason"),
        DisabledReason::TeamDisabled
    );
}

#[test]
fn claim_passes_over_runnable_members_only() {
    let failing = Arc::new(FixedCheck::new("failing", Outcome::Fail));
    let passing = Arc::new(FixedCheck::new("passing", Outcome::Pass));
    let f = fixture(vec![failing.clone(), passing.clone()]);
    f.registry.set_enabled("failing", false).expect("disable");

    let claim = f.registry.claim("Test").expect("claim").clone();
    claim.run(&f.registry);
    assert_eq!(failing.runs(), 0);
    assert!(claim.passed(&f.registry).expect("passed"));

    f.registry.set_enabled("failing", true).expect("enable");
    claim.run(&f.registry);
    assert!(!claim.passed(&f.registry).expect("passed"));
}

#[test]
fn claim_without_runnable_members_is_vacuously_passed() {
    let check = Arc::new(FixedCheck::new("X", Outcome::Fail));
    *check.precondition.lock().unwrap() = Precondition::Unmet("Tool is not installed".to_string());
    let f = fixture(vec![check.clone()]);

    let claim = f.registry.claim("Test").expect("claim").clone();
    claim.run(&f.registry);
    assert!(claim.passed(&f.registry).expect("passed"));
    assert_eq!(check.runs(), 0);
    assert_eq!(
        f.registry.disabled_reason("X").expect("reason").to_string(),
        "Tool is not installed"
    );

    let empty = Claim::new("Empty", Vec::new());
    assert!(empty.passed(&f.registry).expect("passed"));
}

#[test]
fn claim_sorts_members_by_current_title() {
    let b = Arc::new(FixedCheck::new("b", Outcome::Pass));
    let a = Arc::new(FixedCheck::new("A", Outcome::Pass));
    let f = fixture(vec![b, a]);
    let claim = f.registry.claim("Test").expect("claim");
    assert_eq!(claim.sorted_ids(&f.registry).expect("sorted"), vec!["A", "b"]);
}

#[test]
fn evaluation_error_sets_flag_and_falls_back() {
    let strict = Arc::new(FixedCheck::new("strict", Outcome::Pass));
    let lenient = Arc::new(FixedCheck {
        fallback: ErrorFallback::PreviousVerdict,
        ..FixedCheck::new("lenient", Outcome::Pass)
    });
    let f = fixture(vec![strict.clone(), lenient.clone()]);
    f.registry.run("strict").expect("run");
    f.registry.run("lenient").expect("run");

    strict.set_outcome(Outcome::Error("evaluation failed".to_string()));
    lenient.set_outcome(Outcome::Error("offline".to_string()));
    f.clock.advance_secs(1);

    assert!(!f.registry.run("strict").expect("run"));
    assert!(f.registry.run("lenient").expect("run"));
    assert!(f.registry.state("strict").expect("state").last_error);
    assert!(f.registry.state("lenient").expect("state").last_error);

    strict.set_outcome(Outcome::Pass);
    assert!(f.registry.run("strict").expect("run"));
    assert!(!f.registry.state("strict").expect("state").last_error);
}

struct PanickingCheck;

impl Checkable for PanickingCheck {
    fn id(&self) -> &str {
        "panics"
    }

    fn title_pass(&self) -> String {
        "never".to_string()
    }

    fn title_fail(&self) -> String {
        "always".to_string()
    }

    fn evaluate(&self, _ctx: &EvalContext<'_>) -> Outcome {
        panic!("check blew up")
    }
}

#[test]
fn panicking_evaluation_is_absorbed_as_error() {
    let mut registry = CheckRegistry::new(Arc::new(MemoryStore::new()), Arc::new(NoTeam));
    registry.register(Arc::new(PanickingCheck)).expect("register");

    assert!(!registry.run("panics").expect("run"));
    let state = registry.state("panics").expect("state");
    assert!(state.last_error);
    assert!(state.has_run());
}

#[test]
fn run_timestamp_never_moves_backwards() {
    let check = Arc::new(FixedCheck::new("X", Outcome::Pass));
    let f = fixture(vec![check]);
    f.registry.run("X").expect("run");

    f.clock.set_millis(T0 - 60_000);
    f.registry.run("X").expect("run");
    assert_eq!(f.registry.state("X").expect("state").last_run_millis, T0);
}

#[test]
fn dependent_check_requires_configured_dependency() {
    let configured = Arc::new(FixedCheck::new("time-machine", Outcome::Pass));
    let dependent = Arc::new(FixedCheck {
        required: Some("time-machine".to_string()),
        ..FixedCheck::new("backup-recent", Outcome::Pass)
    });
    let f = fixture(vec![configured, dependent.clone()]);

    assert!(f.registry.is_runnable("backup-recent").expect("runnable"));

    f.registry.set_enabled("time-machine", false).expect("disable");
    assert!(!f.registry.is_runnable("backup-recent").expect("runnable"));
    assert!(!f.registry.run("backup-recent").expect("run"));
    assert_eq!(dependent.runs(), 0);
    assert_eq!(
        f.registry.disabled_reason("backup-recent").expect("reason"),
        DisabledReason::DependencyNotConfigured {
            dependency: "time-machine passes".to_string()
        }
    );
}

#[test]
fn missing_permission_blocks_run_and_explains_why() {
    let check = Arc::new(FixedCheck {
        requirements: Requirements {
            full_disk_access: true,
            ..Requirements::default()
        },
        ..FixedCheck::new("X", Outcome::Pass)
    });
    let f = fixture(vec![check.clone()]);
    f.registry.set_permissions(Permissions::default());

    assert!(!f.registry.run("X").expect("run"));
    assert_eq!(
        f.registry.disabled_reason("X").expect("reason"),
        DisabledReason::MissingDiskAccess
    );

    f.registry.set_permissions(Permissions::all());
    assert!(f.registry.run("X").expect("run"));
}

#[test]
fn duplicate_ids_are_rejected() {
    let mut registry = CheckRegistry::new(Arc::new(MemoryStore::new()), Arc::new(NoTeam));
    registry
        .register(Arc::new(FixedCheck::new("X", Outcome::Pass)))
        .expect("register");
    let err = registry
        .register(Arc::new(FixedCheck::new("X", Outcome::Fail)))
        .expect_err("duplicate");
    assert_eq!(err.to_string(), "duplicate check id X");
    assert!(registry.unique_ids());

    registry
        .add_claim_of(Claim::new("One", vec!["X".to_string()]))
        .expect("claim");
    registry
        .add_claim_of(Claim::new("Two", vec!["X".to_string()]))
        .expect("claim");
    assert!(!registry.unique_ids());

    assert!(registry
        .add_claim_of(Claim::new("Three", vec!["missing".to_string()]))
        .is_err());
}

#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<(String, bool)>>,
}

impl StateObserver for Recorder {
    fn check_updated(&self, id: &str, state: &CheckState) {
        self.seen
            .lock()
            .unwrap()
            .push((id.to_string(), state.last_verdict));
    }
}

#[test]
fn observers_see_completed_runs() {
    let check = Arc::new(FixedCheck::new("X", Outcome::Pass));
    let f = fixture(vec![check]);
    let recorder = Arc::new(Recorder::default());
    f.registry.subscribe(recorder.clone());

    f.registry.run("X").expect("run");
    assert_eq!(
        recorder.seen.lock().unwrap().as_slice(),
        &[("X".to_string(), true)]
    );
}

struct BlockingCheck {
    started: Mutex<Sender<()>>,
    release: Mutex<Receiver<()>>,
    runs: AtomicUsize,
}

impl Checkable for BlockingCheck {
    fn id(&self) -> &str {
        "slow"
    }

    fn title_pass(&self) -> String {
        "slow passes".to_string()
    }

    fn title_fail(&self) -> String {
        "slow fails".to_string()
    }

    fn evaluate(&self, _ctx: &EvalContext<'_>) -> Outcome {
        self.runs.fetch_add(1, Ordering::SeqCst);
        self.started.lock().unwrap().send(()).unwrap();
        self.release.lock().unwrap().recv().unwrap();
        Outcome::Pass
    }
}

#[test]
fn concurrent_run_of_same_check_is_skipped() {
    let (started_tx, started_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let check = Arc::new(BlockingCheck {
        started: Mutex::new(started_tx),
        release: Mutex::new(release_rx),
        runs: AtomicUsize::new(0),
    });

    let mut registry = CheckRegistry::new(Arc::new(MemoryStore::new()), Arc::new(NoTeam));
    registry.register(check.clone()).expect("register");
    let registry = Arc::new(registry);

    let worker = {
        let registry = Arc::clone(&registry);
        thread::spawn(move || registry.run("slow").expect("run"))
    };
    started_rx.recv().expect("evaluation started");

    assert!(!registry.run("slow").expect("second run"));
    release_tx.send(()).expect("release");
    assert!(worker.join().expect("join"));
    assert_eq!(check.runs.load(Ordering::SeqCst), 1);
}

struct EchoRunner;

impl CommandRunner for EchoRunner {
    fn output(&self, _command: &str, args: &[String]) -> std::io::Result<String> {
        let script = args.last().cloned().unwrap_or_default();
        Ok(script.trim_start_matches("echo ").to_string())
    }
}

#[test]
fn custom_rules_load_skip_malformed_and_register_when_enabled() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(
        dir.path().join("a.yaml"),
        "id: answer\ntitle: Answer\ncheck: echo 42\nresult:\n  integer: 42\n",
    )
    .expect("write rule");
    std::fs::write(
        dir.path().join("b.yml"),
        "id: greeting\ncheck: echo hello\nresult:\n  string: bye\n",
    )
    .expect("write rule");
    std::fs::write(dir.path().join("c.yaml"), "id: [broken").expect("write rule");
    std::fs::write(dir.path().join("notes.txt"), "id: ignored").expect("write note");

    let rules = load_custom_rules(dir.path());
    assert_eq!(rules.len(), 2);

    let mut disabled = CheckRegistry::new(Arc::new(MemoryStore::new()), Arc::new(NoTeam));
    let count = register_custom_checks(&mut disabled, rules.clone(), Arc::new(EchoRunner))
        .expect("register");
    assert_eq!(count, 0);
    assert!(disabled.claims().is_empty());

    let mut registry = CheckRegistry::new(Arc::new(MemoryStore::new()), Arc::new(NoTeam))
        .with_preferences(Preferences {
            my_checks: true,
            ..Preferences::default()
        });
    let count =
        register_custom_checks(&mut registry, rules, Arc::new(EchoRunner)).expect("register");
    assert_eq!(count, 2);

    let claim = registry.claim("My Checks").expect("claim").clone();
    claim.run(&registry);
    assert!(registry.state("answer").expect("state").last_verdict);
    assert!(!registry.state("greeting").expect("state").last_verdict);
    assert_eq!(registry.state("answer").expect("state").detail, "out=42");
    assert_eq!(registry.title("answer").expect("title"), "Answer is passing");
    assert_eq!(registry.title("greeting").expect("title"), "greeting is failing");
    assert!(!claim.passed(&registry).expect("passed"));
}
