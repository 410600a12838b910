//! Environment-driven configuration

use crate::runtime::DEFAULT_AUDIT_CAPACITY;
use std::path::PathBuf;

/// Which storage backend to run against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    Memory,
    Sqlite,
}

impl StoreBackend {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "mem" => Some(Self::Memory),
            "sqlite" | "db" => Some(Self::Sqlite),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub store: StoreBackend,
    pub db_path: PathBuf,
    pub audit_capacity: usize,
    pub enforce_trust: bool,
    /// Demo sessions created at startup
    pub seed: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8000,
            store: StoreBackend::Memory,
            db_path: default_db_path(None),
            audit_capacity: DEFAULT_AUDIT_CAPACITY,
            enforce_trust: true,
            seed: 0,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source; unparseable values fall back to defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let store = match lookup("FIRE_STORE") {
            Some(raw) => StoreBackend::parse(&raw).unwrap_or_else(|| {
                tracing::warn!(value = %raw, "Unknown FIRE_STORE, using in-memory store");
                StoreBackend::Memory
            }),
            None => defaults.store,
        };

        Self {
            port: parse_var("FIRE_PORT", lookup("FIRE_PORT"), |p| p.parse().ok())
                .unwrap_or(defaults.port),
            store,
            db_path: lookup("FIRE_DB_PATH")
                .map_or_else(|| default_db_path(lookup("HOME")), PathBuf::from),
            audit_capacity: parse_var("FIRE_AUDIT_CAPACITY", lookup("FIRE_AUDIT_CAPACITY"), |c| {
                c.parse().ok().filter(|c: &usize| *c > 0)
            })
            .unwrap_or(defaults.audit_capacity),
            enforce_trust: parse_var("FIRE_ENFORCE_TRUST", lookup("FIRE_ENFORCE_TRUST"), parse_bool)
                .unwrap_or(defaults.enforce_trust),
            seed: parse_var("FIRE_SEED", lookup("FIRE_SEED"), |s| s.parse().ok())
                .unwrap_or(defaults.seed),
        }
    }
}

/// Parse a set variable, warning when the value is rejected
fn parse_var<T>(key: &str, raw: Option<String>, parse: impl FnOnce(&str) -> Option<T>) -> Option<T> {
    let raw = raw?;
    let parsed = parse(raw.trim());
    if parsed.is_none() {
        tracing::warn!(key, value = %raw, "Invalid value, using default");
    }
    parsed
}

fn default_db_path(home: Option<String>) -> PathBuf {
    let home = home.unwrap_or_else(|| "/tmp".to_string());
    PathBuf::from(home).join(".fire-sessions").join("fire.db")
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = config_from(&[]);
        assert_eq!(config.port, 8000);
        assert_eq!(config.store, StoreBackend::Memory);
        assert_eq!(config.audit_capacity, 1000);
        assert!(config.enforce_trust);
        assert_eq!(config.seed, 0);
        assert_eq!(config.db_path, PathBuf::from("/tmp/.fire-sessions/fire.db"));
    }

    #[test]
    fn test_reads_overrides() {
        let config = config_from(&[
            ("FIRE_PORT", "9100"),
            ("FIRE_STORE", "SQLite"),
            ("FIRE_DB_PATH", "/var/lib/fire/fire.db"),
            ("FIRE_AUDIT_CAPACITY", "250"),
            ("FIRE_ENFORCE_TRUST", "off"),
            ("FIRE_SEED", "8"),
        ]);
        assert_eq!(config.port, 9100);
        assert_eq!(config.store, StoreBackend::Sqlite);
        assert_eq!(config.db_path, PathBuf::from("/var/lib/fire/fire.db"));
        assert_eq!(config.audit_capacity, 250);
        assert!(!config.enforce_trust);
        assert_eq!(config.seed, 8);
    }

    #[test]
    fn test_parse_var_distinguishes_unset_from_invalid() {
        assert_eq!(parse_var::<u16>("FIRE_PORT", None, |p| p.parse().ok()), None);
        assert_eq!(
            parse_var::<u16>("FIRE_PORT", Some(" 9000 ".into()), |p| p.parse().ok()),
            Some(9000)
        );
        assert_eq!(
            parse_var::<u16>("FIRE_PORT", Some("70000".into()), |p| p.parse().ok()),
            None
        );
    }

    #[test]
    fn test_bad_values_fall_back() {
        let config = config_from(&[
            ("FIRE_PORT", "eighty"),
            ("FIRE_STORE", "redis"),
            ("FIRE_AUDIT_CAPACITY", "0"),
            ("FIRE_ENFORCE_TRUST", "maybe"),
            ("HOME", "/home/lounge"),
        ]);
        assert_eq!(config.port, 8000);
        assert_eq!(config.store, StoreBackend::Memory);
        assert_eq!(config.audit_capacity, 1000);
        assert!(config.enforce_trust);
        assert_eq!(
            config.db_path,
            PathBuf::from("/home/lounge/.fire-sessions/fire.db")
        );
    }
}
