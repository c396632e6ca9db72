//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`SwitchboardSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over the defaults
//! 3. Apply `SWITCHBOARD_*` environment variable overrides
//! 4. Validate the result
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::SwitchboardSettings;

/// Resolve the path to the settings file (`~/.switchboard/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".switchboard").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<SwitchboardSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON or the merged values fail validation, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<SwitchboardSettings> {
    let defaults = serde_json::to_value(SwitchboardSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: SwitchboardSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// Invalid values are ignored with a warning (fall back to file/default).
pub fn apply_env_overrides(settings: &mut SwitchboardSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply overrides from an arbitrary variable source.
///
/// Split out from [`apply_env_overrides`] so the mapping is testable without
/// mutating the process environment.
pub fn apply_overrides<F>(settings: &mut SwitchboardSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let server = &mut settings.server;
    if let Some(v) = read_string(&lookup, "SWITCHBOARD_HOST") {
        server.host = v;
    }
    if let Some(v) = read_parsed(&lookup, "SWITCHBOARD_PORT", |s| parse_u16_range(s, 0, 65535)) {
        server.port = v;
    }
    if let Some(v) = read_parsed(&lookup, "SWITCHBOARD_MAX_CONNECTIONS", |s| {
        parse_usize_range(s, 1, 1_000_000)
    }) {
        server.max_connections = v;
    }
    if let Some(v) = read_parsed(&lookup, "SWITCHBOARD_SEND_QUEUE_SIZE", |s| {
        parse_usize_range(s, 1, 1_000_000)
    }) {
        server.send_queue_size = v;
    }
    if let Some(v) = read_parsed(&lookup, "SWITCHBOARD_HEARTBEAT_INTERVAL_MS", |s| {
        parse_u64_range(s, 100, 600_000)
    }) {
        server.heartbeat_interval_ms = v;
    }
    if let Some(v) = read_parsed(&lookup, "SWITCHBOARD_HEARTBEAT_TIMEOUT_MS", |s| {
        parse_u64_range(s, 100, 3_600_000)
    }) {
        server.heartbeat_timeout_ms = v;
    }

    if let Some(v) = read_string(&lookup, "SWITCHBOARD_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read_string(&lookup, "SWITCHBOARD_LOG_FORMAT") {
        settings.logging.format = v;
    }
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Variable readers ────────────────────────────────────────────────────────

fn read_string<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name).filter(|v| !v.is_empty())
}

fn read_parsed<F, T>(lookup: &F, name: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
{
    let val = lookup(name)?;
    let result = parse(&val);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid numeric env var, ignoring");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SettingsError;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"server": {"port": 8065, "host": "localhost"}});
        let source = serde_json::json!({"server": {"port": 9090}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["server"]["port"], 9090);
        assert_eq!(merged["server"]["host"], "localhost");
    }

    #[test]
    fn merge_array_replace() {
        let target = serde_json::json!({"channels": {"c1": ["a", "b"]}});
        let source = serde_json::json!({"channels": {"c1": ["c"]}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["channels"]["c1"], serde_json::json!(["c"]));
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let source = serde_json::json!({"a": null});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_new_keys_added() {
        let merged = deep_merge(serde_json::json!({"a": 1}), serde_json::json!({"b": 2}));
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_primitive_replaces_object() {
        let target = serde_json::json!({"a": {"nested": true}});
        let merged = deep_merge(target, serde_json::json!({"a": 42}));
        assert_eq!(merged["a"], 42);
    }

    // ── load_settings_from_path ─────────────────────────────────────

    #[test]
    fn load_missing_file_returns_defaults() {
        let settings = load_settings_from_path(Path::new("/nonexistent/settings.json")).unwrap();
        assert_eq!(settings.server.port, 8065);
    }

    #[test]
    fn load_partial_json_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"server": {"port": 9000, "sendQueueSize": 8}, "auth": {"tokens": {"t1": "alice"}}}"#,
        )
        .unwrap();

        let settings = load_settings_from_path(&path).unwrap();
        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.server.send_queue_size, 8);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.auth.tokens["t1"], "alice");
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not valid json").unwrap();

        let result = load_settings_from_path(&path);
        assert!(matches!(result.unwrap_err(), SettingsError::Json(_)));
    }

    #[test]
    fn load_invalid_value_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"server": {"sendQueueSize": 0}}"#).unwrap();

        let result = load_settings_from_path(&path);
        assert!(matches!(result.unwrap_err(), SettingsError::InvalidValue(_)));
    }

    // ── overrides ───────────────────────────────────────────────────

    #[test]
    fn overrides_apply() {
        let mut settings = SwitchboardSettings::default();
        apply_overrides(
            &mut settings,
            vars(&[
                ("SWITCHBOARD_HOST", "0.0.0.0"),
                ("SWITCHBOARD_PORT", "9999"),
                ("SWITCHBOARD_SEND_QUEUE_SIZE", "16"),
                ("SWITCHBOARD_LOG_LEVEL", "debug"),
                ("SWITCHBOARD_LOG_FORMAT", "json"),
            ]),
        );
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 9999);
        assert_eq!(settings.server.send_queue_size, 16);
        assert_eq!(settings.logging.level, "debug");
        assert_eq!(settings.logging.format, "json");
    }

    #[test]
    fn invalid_overrides_ignored() {
        let mut settings = SwitchboardSettings::default();
        apply_overrides(
            &mut settings,
            vars(&[
                ("SWITCHBOARD_PORT", "not-a-port"),
                ("SWITCHBOARD_SEND_QUEUE_SIZE", "0"),
                ("SWITCHBOARD_HOST", ""),
            ]),
        );
        assert_eq!(settings.server.port, 8065);
        assert_eq!(settings.server.send_queue_size, 256);
        assert_eq!(settings.server.host, "127.0.0.1");
    }

    // ── range parsers ───────────────────────────────────────────────

    #[test]
    fn parse_u16_bounds() {
        assert_eq!(parse_u16_range("9090", 1, 65535), Some(9090));
        assert_eq!(parse_u16_range("0", 1, 65535), None);
        assert_eq!(parse_u16_range("99999", 1, 65535), None);
    }

    #[test]
    fn parse_u64_bounds() {
        assert_eq!(parse_u64_range("30000", 100, 600_000), Some(30_000));
        assert_eq!(parse_u64_range("50", 100, 600_000), None);
        assert_eq!(parse_u64_range("abc", 100, 600_000), None);
    }

    #[test]
    fn parse_usize_bounds() {
        assert_eq!(parse_usize_range("50", 1, 10_000), Some(50));
        assert_eq!(parse_usize_range("0", 1, 10_000), None);
    }
}
