use super::*;

use crate::reason::{derive_disabled_reason, ReasonInputs};
use crate::state::store_run_result;

fn inputs(precondition: &Precondition) -> ReasonInputs<'_> {
    ReasonInputs {
        stored_enabled: true,
        team_enforced: false,
        team_disabled: false,
        unmet_dependency: None,
        requirements: Requirements::default(),
        permissions: Permissions::default(),
        precondition,
    }
}

#[test]
fn version_gte_compares_numeric_components() {
    assert!(version_gte("14.2.1", "14.2"));
    assert!(version_gte("14.2", "14.2.0"));
    assert!(!version_gte("13.9", "14.0"));
    assert!(version_gte("10", "9.9.9"));
}

#[test]
fn state_keys_follow_check_id() {
    let keys = StateKeys::for_check("abc");
    assert_eq!(keys.enabled, "abc-Enabled");
    assert_eq!(keys.passes, "abc-Passes");
    assert_eq!(keys.timestamp, "abc-TS");
    assert_eq!(keys.snooze, "abc-Snooze");
    assert_eq!(keys.details, "abc-Details");
}

#[test]
fn missing_state_loads_defaults() {
    let store = MemoryStore::new();
    let state = CheckState::load(&store, "never-seen", false).expect("load state");
    assert_eq!(state, CheckState::default());
    assert!(state.enabled);
    assert!(!state.has_run());
    assert_eq!(state.detail, "None");
}

#[test]
fn stored_run_result_round_trips_through_sqlite() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nested").join("settings.db");
    let store = SqliteStore::open(path.to_string_lossy().as_ref()).expect("open store");

    store_run_result(&store, "x", true, 1_700_000_000_123, "key ok").expect("store result");
    let state = CheckState::load(&store, "x", false).expect("load state");
    assert!(state.last_verdict);
    assert_eq!(state.last_run_millis, 1_700_000_000_123);
    assert_eq!(state.detail, "key ok");

    drop(store);
    let reopened = SqliteStore::open(path.to_string_lossy().as_ref()).expect("reopen store");
    let state = CheckState::load(&reopened, "x", false).expect("load state");
    assert!(state.last_verdict);
}

#[test]
fn sqlite_store_overwrites_and_removes() {
    let store = SqliteStore::in_memory().expect("store");
    store.set("k", StoreValue::Int(1)).expect("set");
    store.set("k", StoreValue::Text("two".to_string())).expect("set");
    assert_eq!(
        store.get("k").expect("get"),
        Some(StoreValue::Text("two".to_string()))
    );
    store.remove("k").expect("remove");
    assert_eq!(store.get("k").expect("get"), None);
}

#[test]
fn snooze_is_active_only_until_deadline() {
    let state = CheckState {
        snooze_until_secs: 100,
        ..CheckState::default()
    };
    assert!(state.is_snoozed(99));
    assert!(!state.is_snoozed(100));
    assert!(!CheckState::default().is_snoozed(0));
}

#[test]
fn disabled_reason_prefers_manual_disable_over_everything() {
    let unmet = Precondition::Unmet("Slack is not installed".to_string());
    let reason = derive_disabled_reason(&ReasonInputs {
        stored_enabled: false,
        unmet_dependency: Some("Time Machine is on".to_string()),
        requirements: Requirements {
            full_disk_access: true,
            ..Requirements::default()
        },
        ..inputs(&unmet)
    });
    assert_eq!(reason, DisabledReason::ManuallyDisabled);
}

#[test]
fn disabled_reason_walks_priority_table() {
    let unmet = Precondition::Unmet("Slack is not installed".to_string());

    let dependency = derive_disabled_reason(&ReasonInputs {
        unmet_dependency: Some("Time Machine is on".to_string()),
        requirements: Requirements {
            full_disk_access: true,
            ..Requirements::default()
        },
        ..inputs(&unmet)
    });
    assert_eq!(
        dependency.to_string(),
        "Requires \"Time Machine is on\" to be enabled and configured"
    );

    let disk = derive_disabled_reason(&ReasonInputs {
        requirements: Requirements {
            full_disk_access: true,
            automation_access: true,
            ..Requirements::default()
        },
        ..inputs(&unmet)
    });
    assert_eq!(disk, DisabledReason::MissingDiskAccess);

    let helper = derive_disabled_reason(&ReasonInputs {
        requirements: Requirements {
            privileged_helper: true,
            ..Requirements::default()
        },
        ..inputs(&unmet)
    });
    assert_eq!(helper, DisabledReason::HelperNotAuthorized);

    let precondition = derive_disabled_reason(&inputs(&unmet));
    assert_eq!(precondition.to_string(), "Slack is not installed");

    let met = Precondition::Met;
    assert_eq!(
        derive_disabled_reason(&inputs(&met)).to_string(),
        "Not applicable on this device"
    );
}

#[test]
fn team_enforcement_masks_manual_disable_reason() {
    let met = Precondition::Met;
    let reason = derive_disabled_reason(&ReasonInputs {
        stored_enabled: false,
        team_enforced: true,
        requirements: Requirements {
            automation_access: true,
            ..Requirements::default()
        },
        ..inputs(&met)
    });
    assert_eq!(reason, DisabledReason::MissingAutomationAccess);
}

#[test]
fn granted_permissions_satisfy_requirements() {
    let req = Requirements {
        full_disk_access: true,
        privileged_helper: true,
        ..Requirements::default()
    };
    assert!(!Permissions::default().satisfy(&req));
    assert!(Permissions::all().satisfy(&req));
    assert!(Permissions::default().satisfy(&Requirements::default()));
}

#[test]
fn parse_custom_rule_reads_camel_case_fields() {
    let raw = r#"
id: firewall-log
title: Firewall logging
titlePass: Firewall logging is on
check: "  /usr/libexec/ApplicationFirewall/socketfilterfw --getloggingmode  "
result:
  string: "Log mode is on"
"#;
    let rule = parse_custom_rule(raw).expect("parse rule");
    assert_eq!(rule.id, "firewall-log");
    assert_eq!(rule.title_pass.as_deref(), Some("Firewall logging is on"));
    assert_eq!(rule.title_fail, None);
    assert_eq!(
        rule.command(),
        "/usr/libexec/ApplicationFirewall/socketfilterfw --getloggingmode"
    );
    assert_eq!(rule.result.string.as_deref(), Some("Log mode is on"));
}

#[test]
fn parse_custom_rule_rejects_missing_command() {
    let err = parse_custom_rule("id: x\nresult:\n  integer: 1\n").expect_err("missing check");
    assert!(matches!(err, ComplianceError::RuleParse(_)));

    let err = parse_custom_rule("id: x\ncheck: '   '\nresult: {}\n").expect_err("empty check");
    assert!(err.to_string().contains("empty check command"));
}

#[test]
fn expected_result_supports_integer_and_string_ops() {
    let integer = ExpectedResult {
        integer: Some(1),
        ..ExpectedResult::default()
    };
    assert!(integer.matches_output("1"));
    assert!(!integer.matches_output("0"));
    assert!(!integer.matches_output("one"));

    let at_least = ExpectedResult {
        integer: Some(600),
        op: Some("lte".to_string()),
        ..ExpectedResult::default()
    };
    assert!(at_least.matches_output("300"));
    assert!(!at_least.matches_output("900"));

    let pattern = ExpectedResult {
        string: Some(r"^Firewall is enabled".to_string()),
        op: Some("regex".to_string()),
        ..ExpectedResult::default()
    };
    assert!(pattern.matches_output("Firewall is enabled. (State = 1)"));

    assert!(!ExpectedResult::default().matches_output("anything"));
}

#[test]
fn report_marks_failures_and_skips_silent_disabled() {
    let row = |id: &str, runnable: bool, passed: bool, report_if_disabled: bool| CheckSnapshot {
        id: id.to_string(),
        title: id.to_string(),
        claim: "Claim".to_string(),
        enabled: true,
        runnable,
        passed,
        error: false,
        report_if_disabled,
    };
    let rows = vec![
        row("a", true, true, true),
        row("b", true, false, true),
        row("c", false, false, true),
        row("d", false, false, false),
    ];

    let report = Report::from_snapshots(&rows, "device-1", 0);
    assert_eq!(report.passed_count, 1);
    assert_eq!(report.failed_count, 1);
    assert_eq!(report.disabled_count, 1);
    assert_eq!(report.state.get("b"), Some(&ReportStatus::Fail));
    assert_eq!(report.state.get("c"), Some(&ReportStatus::Off));
    assert!(!report.state.contains_key("d"));
    assert_eq!(report.last_check, "1970-01-01T00:00:00Z");
    assert_eq!(report.significant_change.len(), 64);

    let other_device = Report::from_snapshots(&rows, "device-2", 0);
    assert_ne!(report.significant_change, other_device.significant_change);

    let json = serde_json::to_value(&report).expect("serialize report");
    assert_eq!(json["passedCount"], 1);
    assert_eq!(json["state"]["a"], "pass");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[test]
fn significant_change_is_uppercase_hex() {
    let report = Report::from_snapshots(&[], "dev", 0);
    assert_eq!(
        report.significant_change,
        "836602E23DEF7968F69B9FEB18C6CE09DBAF067EDB76CC7D71DE4DBF26352E7B"
    );
    assert!(!report
        .significant_change
        .chars()
        .any(|c| c.is_ascii_lowercase()));
}

struct HostRunner {
    answers: Vec<(&'static str, &'static str)>,
}

impl crate::CommandRunner for HostRunner {
    fn output(&self, command: &str, args: &[String]) -> std::io::Result<String> {
        let line = std::iter::once(command.to_string())
            .chain(args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ");
        self.answers
            .iter()
            .find(|(cmd, _)| *cmd == line)
            .map(|(_, out)| out.to_string())
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, line))
    }
}

fn host_runner() -> HostRunner {
    HostRunner {
        answers: vec![
            ("/usr/bin/sw_vers -productVersion", "14.4.1\n"),
            ("/usr/sbin/scutil --get ComputerName", "Build Mac\n"),
            ("/usr/sbin/sysctl -n hw.model", "MacBookPro18,3\n"),
            (
                "/usr/sbin/ioreg -c IOPlatformExpertDevice -d 2",
                "+-o J314sAP  <class IOPlatformExpertDevice>\n    {\n      \"IOPlatformSerialNumber\" = \"C02XG2JHJG5J\"\n      \"IOPlatformUUID\" = \"0000\"\n    }\n",
            ),
        ],
    }
}

#[test]
fn reporting_device_reads_host_identity() {
    let device = ReportingDevice::collect(&host_runner(), "machine-1", true);
    assert_eq!(device.machine_uuid, "machine-1");
    assert_eq!(device.machine_name, "Build Mac");
    assert_eq!(device.macos_version, "14.4.1");
    assert_eq!(device.model_name, "MacBookPro18,3");
    assert_eq!(device.model_serial, "C02XG2JHJG5J");

    let json = serde_json::to_value(&device).expect("serialize device");
    assert_eq!(json["machineUUID"], "machine-1");
    assert_eq!(json["macOSVersion"], "14.4.1");
    assert_eq!(json["modelSerial"], "C02XG2JHJG5J");
}

#[test]
fn reporting_device_hides_hardware_unless_shared() {
    let device = ReportingDevice::collect(&host_runner(), "machine-1", false);
    assert_eq!(device.model_name, HARDWARE_INFO_DISABLED);
    assert_eq!(device.model_serial, HARDWARE_INFO_DISABLED);

    let report = Report::from_snapshots(&[], "machine-1", 0);
    assert!(serde_json::to_value(&report).expect("json").get("device").is_none());
    let json = serde_json::to_value(report.with_device(device)).expect("json");
    assert_eq!(json["device"]["machineName"], "Build Mac");
}
