use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use compliance::{
    CheckRegistry, Checkable, EvalContext, ManualClock, MemoryStore, Outcome, ReportStatus,
    ReportingDevice, StaticTeamPolicy,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use super::team::TeamSettings;
use super::timing::interval_due;
use super::*;
use crate::config::TeamConfig;

const T0_MILLIS: i64 = 1_709_300_000_000;
const T0: i64 = T0_MILLIS / 1000;

struct CountingCheck {
    id: &'static str,
    passes: bool,
    runs: AtomicUsize,
}

impl CountingCheck {
    fn new(id: &'static str, passes: bool) -> Arc<Self> {
        Arc::new(Self {
            id,
            passes,
            runs: AtomicUsize::new(0),
        })
    }

    fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

impl Checkable for CountingCheck {
    fn id(&self) -> &str {
        self.id
    }

    fn title_pass(&self) -> String {
        format!("{} ok", self.id)
    }

    fn title_fail(&self) -> String {
        format!("{} broken", self.id)
    }

    fn evaluate(&self, _ctx: &EvalContext<'_>) -> Outcome {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Outcome::from_bool(self.passes)
    }
}

fn runtime_with(
    checks: Vec<Arc<CountingCheck>>,
    interval_secs: u64,
) -> (AgentRuntime, Arc<StaticTeamPolicy>) {
    let team = Arc::new(StaticTeamPolicy::default());
    let mut registry = CheckRegistry::new(Arc::new(MemoryStore::new()), team.clone())
        .with_clock(Arc::new(ManualClock::new(T0_MILLIS)));
    let members = checks
        .into_iter()
        .map(|check| check as Arc<dyn Checkable>)
        .collect();
    registry.add_claim("Lifecycle", members).expect("claim");

    let mut config = AgentConfig::default();
    config.device_id = "device-1".to_string();
    config.check_interval_secs = interval_secs;
    (AgentRuntime::new(config, registry, team.clone(), None), team)
}

#[test]
fn interval_due_handles_first_run_and_clock_skew() {
    assert!(interval_due(None, 100, 3600));
    assert!(!interval_due(Some(100), 200, 3600));
    assert!(interval_due(Some(100), 3700, 3600));
    assert!(!interval_due(Some(500), 100, 10));
}

#[tokio::test]
async fn first_tick_runs_every_claim_and_records_last_check() {
    let firewall = CountingCheck::new("firewall", true);
    let filevault = CountingCheck::new("filevault", false);
    let (mut runtime, _) = runtime_with(vec![firewall.clone(), filevault.clone()], 3600);

    runtime.tick(T0).await.expect("tick");

    assert_eq!(firewall.runs(), 1);
    assert_eq!(filevault.runs(), 1);
    assert_eq!(runtime.last_run_unix(), Some(T0));
    let stored = runtime
        .registry()
        .store()
        .get(LAST_CHECK_KEY)
        .expect("store")
        .and_then(|v| v.as_int());
    assert_eq!(stored, Some(T0_MILLIS));
}

#[tokio::test]
async fn ticks_inside_the_interval_skip_the_run() {
    let check = CountingCheck::new("screensaver", true);
    let (mut runtime, _) = runtime_with(vec![check.clone()], 3600);

    runtime.tick(T0).await.expect("first tick");
    runtime.tick(T0 + 60).await.expect("second tick");
    assert_eq!(check.runs(), 1);
    assert_eq!(runtime.tick_count(), 2);

    runtime.tick(T0 + 3600).await.expect("due tick");
    assert_eq!(check.runs(), 2);
}

#[tokio::test]
async fn run_summary_counts_claim_verdicts() {
    let ok = CountingCheck::new("gatekeeper", true);
    let bad = CountingCheck::new("autologin", false);
    let (runtime, _) = runtime_with(vec![ok, bad], 3600);

    let summary = runtime.run_all_claims().await.expect("run");
    assert_eq!(
        summary,
        RunSummary {
            claims: 1,
            passed_claims: 0,
            failed_claims: 1,
        }
    );
}

#[tokio::test]
async fn report_reflects_team_disabled_checks() {
    let ok = CountingCheck::new("gatekeeper", true);
    let bad = CountingCheck::new("autologin", false);
    let (mut runtime, team) = runtime_with(vec![ok.clone(), bad.clone()], 3600);
    team.replace(Vec::<String>::new(), vec!["autologin".to_string()]);

    runtime.tick(T0).await.expect("tick");

    assert_eq!(bad.runs(), 0);
    let report = runtime.build_report(T0_MILLIS).expect("report");
    assert_eq!(report.passed_count, 1);
    assert_eq!(report.failed_count, 0);
    assert_eq!(report.state.get("gatekeeper"), Some(&ReportStatus::Pass));
    assert_eq!(report.state.get("autologin"), Some(&ReportStatus::Off));

    let json = serde_json::to_value(&report).expect("json");
    assert_eq!(json["passedCount"], 1);
    assert_eq!(json["state"]["autologin"], "off");
}

#[test]
fn team_client_requires_enrollment() {
    let mut team = TeamConfig {
        api_url: "https://dash.example.test/api/v1/team/".to_string(),
        id: Some("team-9".to_string()),
        auth: None,
        enforced: Vec::new(),
        disabled: Vec::new(),
        send_hw_info: false,
    };
    let timeout = Duration::from_secs(5);
    assert!(TeamClient::from_config(&team, timeout)
        .expect("client")
        .is_none());

    team.auth = Some("device-token".to_string());
    let client = TeamClient::from_config(&team, timeout)
        .expect("client")
        .expect("enrolled");
    assert_eq!(
        client.url_for("/device"),
        "https://dash.example.test/api/v1/team/team-9/device"
    );
}

#[test]
fn team_settings_collect_disabled_ids() {
    let raw = r#"{"disabledChecks":[{"id":"a"},{"id":" "},{"id":"b"}],"name":"Team"}"#;
    let settings: TeamSettings = serde_json::from_str(raw).expect("settings");
    let ids: Vec<String> = settings.disabled_ids().collect();
    assert_eq!(ids, vec!["a", "b"]);

    let empty: TeamSettings = serde_json::from_str("{}").expect("empty settings");
    assert_eq!(empty.disabled_ids().count(), 0);
}

/// One request as the dashboard saw it.
#[derive(Debug, Clone)]
struct SeenRequest {
    method: String,
    path: String,
    auth: Option<String>,
    body: String,
}

impl SeenRequest {
    fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("json body")
    }
}

async fn read_request(socket: &mut TcpStream) -> Option<SeenRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.lines();
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let mut content_length = 0usize;
    let mut auth = None;
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        match name.trim().to_ascii_lowercase().as_str() {
            "content-length" => content_length = value.trim().parse().unwrap_or(0),
            "x-device-auth" => auth = Some(value.trim().to_string()),
            _ => {}
        }
    }
    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let end = buf.len().min(header_end + content_length);
    Some(SeenRequest {
        method,
        path,
        auth,
        body: String::from_utf8_lossy(&buf[header_end..end]).to_string(),
    })
}

/// Answers every request with `200 {}` and records it.
async fn spawn_dashboard() -> (String, Arc<Mutex<Vec<SeenRequest>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let log = log.clone();
            tokio::spawn(async move {
                if let Some(request) = read_request(&mut socket).await {
                    log.lock().unwrap().push(request);
                }
                let _ = socket
                    .write_all(
                        b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 2\r\nConnection: close\r\n\r\n{}",
                    )
                    .await;
            });
        }
    });
    (format!("http://{}/api/v1/team", addr), seen)
}

fn test_device() -> ReportingDevice {
    ReportingDevice {
        machine_uuid: "device-1".to_string(),
        machine_name: "Build Mac".to_string(),
        macos_version: "14.4.1".to_string(),
        model_name: "MacBookPro18,3".to_string(),
        model_serial: "C02XG2JHJG5J".to_string(),
    }
}

#[tokio::test]
async fn enrolled_device_is_linked_once_then_reported() {
    let (api_url, seen) = spawn_dashboard().await;
    let check = CountingCheck::new("gatekeeper", true);
    let team = Arc::new(StaticTeamPolicy::default());
    let mut registry = CheckRegistry::new(Arc::new(MemoryStore::new()), team.clone())
        .with_clock(Arc::new(ManualClock::new(T0_MILLIS)));
    registry
        .add_claim("Lifecycle", vec![check as Arc<dyn Checkable>])
        .expect("claim");

    let mut config = AgentConfig::default();
    config.device_id = "device-1".to_string();
    config.check_interval_secs = 3600;
    config.team = TeamConfig {
        api_url,
        id: Some("team-9".to_string()),
        auth: Some("device-token".to_string()),
        enforced: Vec::new(),
        disabled: Vec::new(),
        send_hw_info: true,
    };
    let client = TeamClient::from_config(&config.team, Duration::from_secs(5))
        .expect("client")
        .expect("enrolled");
    let mut runtime =
        AgentRuntime::new(config, registry, team, Some(client)).with_device(test_device());

    runtime.tick(T0).await.expect("first tick");
    runtime.tick(T0 + 3600).await.expect("second tick");

    let requests = seen.lock().unwrap().clone();
    let calls: Vec<(&str, &str)> = requests
        .iter()
        .map(|r| (r.method.as_str(), r.path.as_str()))
        .collect();
    assert_eq!(
        calls,
        vec![
            ("PUT", "/api/v1/team/team-9/device"),
            ("GET", "/api/v1/team/team-9/settings"),
            ("PATCH", "/api/v1/team/team-9/device"),
            ("GET", "/api/v1/team/team-9/settings"),
            ("PATCH", "/api/v1/team/team-9/device"),
        ]
    );
    assert!(requests
        .iter()
        .all(|r| r.auth.as_deref() == Some("device-token")));

    let link = requests[0].json();
    assert_eq!(link["machineUUID"], "device-1");
    assert_eq!(link["machineName"], "Build Mac");
    assert_eq!(link["macOSVersion"], "14.4.1");
    assert_eq!(link["modelName"], "MacBookPro18,3");
    assert_eq!(link["modelSerial"], "C02XG2JHJG5J");

    let report = requests[2].json();
    assert_eq!(report["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(report["passedCount"], 1);
    assert_eq!(report["device"]["machineUUID"], "device-1");
    assert_eq!(report["state"]["gatekeeper"], "pass");
}
