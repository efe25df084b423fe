use std::path::PathBuf;

use super::types::StorageBackend;

pub(super) fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

pub(super) fn env_non_empty(name: &str) -> Option<String> {
    non_empty(std::env::var(name).ok())
}

pub(super) fn env_u64(name: &str) -> Option<u64> {
    env_non_empty(name).and_then(|v| v.parse::<u64>().ok())
}

pub(super) fn env_bool(name: &str) -> Option<bool> {
    env_non_empty(name).map(|v| parse_bool(&v))
}

pub(super) fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
        .collect()
}

pub(super) fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "enabled" | "on"
    )
}

pub(super) fn parse_backend(raw: &str) -> Option<StorageBackend> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "sqlite" => Some(StorageBackend::Sqlite),
        "memory" => Some(StorageBackend::Memory),
        _ => None,
    }
}

pub(super) fn default_device_id() -> String {
    env_non_empty("HOSTNAME").unwrap_or_else(|| "posture-device".to_string())
}

pub(super) fn home_dir() -> PathBuf {
    env_non_empty("HOME").map_or_else(|| PathBuf::from("/"), PathBuf::from)
}
