use super::*;
use std::io::Write;
use std::sync::{Mutex, OnceLock};

fn env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

fn clear_env() {
    let vars = [
        "POSTURE_AGENT_CONFIG",
        "POSTURE_DEVICE_ID",
        "POSTURE_HOME_DIR",
        "POSTURE_CHECK_INTERVAL_SECS",
        "POSTURE_CHECK_RECENTLY_USED_ONLY",
        "POSTURE_MY_CHECKS",
        "POSTURE_MY_CHECKS_DIR",
        "POSTURE_FETCH_TIMEOUT_SECS",
        "POSTURE_IGNORED_SSH_KEYS",
        "POSTURE_IGNORED_USER_ACCOUNTS",
        "POSTURE_STORAGE_BACKEND",
        "POSTURE_STORAGE_PATH",
        "POSTURE_TEAM_API",
        "POSTURE_TEAM_ID",
        "POSTURE_TEAM_AUTH",
        "POSTURE_TEAM_ENFORCED",
        "POSTURE_TEAM_DISABLED",
        "POSTURE_TEAM_SEND_HW_INFO",
        "POSTURE_FULL_DISK_ACCESS",
        "POSTURE_AUTOMATION_ACCESS",
        "POSTURE_HELPER_AUTHORIZED",
    ];
    for v in vars {
        std::env::remove_var(v);
    }
}

fn write_config(body: &str) -> tempfile::NamedTempFile {
    let mut f = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("create config file");
    f.write_all(body.as_bytes()).expect("write config");
    f
}

#[test]
fn file_config_is_loaded() {
    let _guard = env_lock().lock().expect("env lock");
    clear_env();

    let file = write_config(
        "[agent]\ndevice_id=\"laptop-7\"\n\
         [checks]\ninterval_secs=900\nrecently_used_only=false\nmy_checks=true\nmy_checks_dir=\"/opt/checks\"\nignored_ssh_keys=[\"deploy\"]\nignored_user_accounts=[\"guest\"]\n\
         [storage]\nbackend=\"memory\"\n\
         [team]\napi_url=\"https://dash.example.test/api/v1/team/\"\nid=\"team-1\"\nauth=\"token\"\nenforced=[\"a\"]\ndisabled=[\"b\",\"c\"]\nsend_hw_info=true\n\
         [permissions]\nfull_disk_access=true\n",
    );
    std::env::set_var("POSTURE_AGENT_CONFIG", file.path());

    let cfg = AgentConfig::load().expect("load config");

    assert_eq!(cfg.device_id, "laptop-7");
    assert_eq!(cfg.check_interval_secs, 900);
    assert!(!cfg.check_recently_used_only);
    assert!(cfg.my_checks);
    assert_eq!(cfg.my_checks_dir, std::path::PathBuf::from("/opt/checks"));
    assert_eq!(cfg.ignored_ssh_keys, vec!["deploy".to_string()]);
    assert_eq!(cfg.ignored_user_accounts, vec!["guest".to_string()]);
    assert_eq!(cfg.storage_backend, StorageBackend::Memory);
    assert_eq!(cfg.team.api_url, "https://dash.example.test/api/v1/team");
    assert!(cfg.team.is_enrolled());
    assert_eq!(cfg.team.enforced, vec!["a".to_string()]);
    assert_eq!(cfg.team.disabled.len(), 2);
    assert!(cfg.team.send_hw_info);
    assert!(cfg.permissions.full_disk_access);
    assert!(!cfg.permissions.automation_access);

    let prefs = cfg.preferences();
    assert!(!prefs.check_recently_used_only);
    assert!(prefs.my_checks);

    clear_env();
}

#[test]
fn env_overrides_file_config() {
    let _guard = env_lock().lock().expect("env lock");
    clear_env();

    let file = write_config("[checks]\ninterval_secs=900\n[storage]\nbackend=\"memory\"\n");
    std::env::set_var("POSTURE_AGENT_CONFIG", file.path());
    std::env::set_var("POSTURE_CHECK_INTERVAL_SECS", "60");
    std::env::set_var("POSTURE_STORAGE_BACKEND", "sqlite");
    std::env::set_var("POSTURE_STORAGE_PATH", "/tmp/posture.db");
    std::env::set_var("POSTURE_TEAM_DISABLED", "x, y,,z");
    std::env::set_var("POSTURE_AUTOMATION_ACCESS", "yes");
    std::env::set_var("POSTURE_IGNORED_USER_ACCOUNTS", "kiosk,guest");

    let cfg = AgentConfig::load().expect("load config");

    assert_eq!(cfg.check_interval_secs, 60);
    assert_eq!(cfg.storage_backend, StorageBackend::Sqlite);
    assert_eq!(cfg.storage_path, std::path::PathBuf::from("/tmp/posture.db"));
    assert_eq!(cfg.team.disabled, vec!["x", "y", "z"]);
    assert!(cfg.permissions().automation_access);
    assert_eq!(cfg.ignored_user_accounts, vec!["kiosk", "guest"]);

    clear_env();
}

#[test]
fn invalid_values_keep_defaults() {
    let _guard = env_lock().lock().expect("env lock");
    clear_env();

    let file = write_config("[checks]\ninterval_secs=0\n[storage]\nbackend=\"redis\"\n");
    std::env::set_var("POSTURE_AGENT_CONFIG", file.path());
    std::env::set_var("POSTURE_FETCH_TIMEOUT_SECS", "soon");

    let cfg = AgentConfig::load().expect("load config");
    let defaults = AgentConfig::default();

    assert_eq!(cfg.check_interval_secs, defaults.check_interval_secs);
    assert_eq!(cfg.storage_backend, StorageBackend::Sqlite);
    assert_eq!(cfg.fetch_timeout_secs, defaults.fetch_timeout_secs);
    assert!(!cfg.team.is_enrolled());

    clear_env();
}

#[test]
fn missing_configured_path_is_an_error() {
    let _guard = env_lock().lock().expect("env lock");
    clear_env();

    std::env::set_var("POSTURE_AGENT_CONFIG", "/nonexistent/posture/agent.toml");
    let err = resolve_config_path().expect_err("missing file must fail");
    assert!(err.to_string().contains("POSTURE_AGENT_CONFIG"));
    assert!(AgentConfig::load().is_err());

    clear_env();
}

#[test]
fn malformed_toml_is_reported() {
    let _guard = env_lock().lock().expect("env lock");
    clear_env();

    let file = write_config("[checks\ninterval_secs=");
    std::env::set_var("POSTURE_AGENT_CONFIG", file.path());
    let err = AgentConfig::load().expect_err("malformed toml");
    assert!(format!("{:#}", err).contains("failed parsing TOML config"));

    clear_env();
}

#[test]
fn bool_and_csv_parsing() {
    for raw in ["1", "true", "YES", " on ", "enabled"] {
        assert!(parse_bool(raw), "{raw}");
    }
    for raw in ["0", "false", "off", "", "maybe"] {
        assert!(!parse_bool(raw), "{raw}");
    }
    assert_eq!(split_csv(" a ,b,, c "), vec!["a", "b", "c"]);
    assert!(split_csv(" , ").is_empty());
}
