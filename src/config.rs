//! Configuration module for dbmonitor.
//!
//! Loads configuration from environment variables with sensible defaults.
//! A missing or unparsable variable falls back to its default; it never
//! aborts startup.

use crate::targets::{
    DriverKind, TargetConfig, DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_HOST, DEFAULT_PASSWORD,
    DEFAULT_PORT, DEFAULT_USER,
};

use std::env;
use std::str::FromStr;

/// Name of the target configured when `DB_TARGETS` is unset.
pub const DEFAULT_TARGET_NAME: &str = "default";

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port for the web server (default: 5000)
    pub http_port: u16,
    /// Targets in the order they were listed
    pub targets: Vec<TargetConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 5000,
            targets: vec![TargetConfig::new(DEFAULT_TARGET_NAME, "ORCLPDB1")],
        }
    }
}

impl ServerConfig {
    /// Load configuration from the process environment, after merging in a
    /// `.env` file from the working directory or its parents when present.
    /// Variables already set in the environment win over the file.
    ///
    /// Environment variables:
    /// - `PORT`: HTTP port (default: 5000)
    /// - `DB_TARGETS`: comma-separated target names. When unset a single
    ///   `default` target is read from the unprefixed `DB_*` variables.
    /// - `[<NAME>_]DB_DRIVER`, `DB_HOST`, `DB_PORT`, `DB_SERVICE_NAME`,
    ///   `DB_USER`, `DB_PASSWORD`, `DB_CONNECT_TIMEOUT_MS`: per-target
    ///   connection parameters, where `<NAME>` is the uppercased target name.
    pub fn load() -> Self {
        // Load .env file if present (silently ignore if not found)
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(port) = parse_var(&lookup, "PORT") {
            cfg.http_port = port;
        }

        let names: Vec<String> = lookup("DB_TARGETS")
            .map(|list| {
                list.split(',')
                    .map(|n| n.trim().to_string())
                    .filter(|n| !n.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        cfg.targets = if names.is_empty() {
            vec![load_target(&lookup, DEFAULT_TARGET_NAME, "", "ORCLPDB1")]
        } else {
            names
                .iter()
                .map(|name| {
                    let prefix = format!("{}_", name.to_uppercase().replace('-', "_"));
                    load_target(&lookup, name, &prefix, &format!("ORCLPDB_{}", name))
                })
                .collect()
        };

        cfg
    }
}

fn load_target<F>(lookup: &F, name: &str, prefix: &str, default_service: &str) -> TargetConfig
where
    F: Fn(&str) -> Option<String>,
{
    let var = |suffix: &str| lookup(&format!("{}DB_{}", prefix, suffix));

    let driver = match var("DRIVER") {
        Some(raw) => raw.parse().unwrap_or_else(|e| {
            tracing::warn!("Target {}: {}, using oracle", name, e);
            DriverKind::Oracle
        }),
        None => DriverKind::Oracle,
    };

    TargetConfig {
        name: name.to_string(),
        driver,
        host: var("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
        port: parse_var(lookup, &format!("{}DB_PORT", prefix)).unwrap_or(DEFAULT_PORT),
        service_name: var("SERVICE_NAME").unwrap_or_else(|| default_service.to_string()),
        user: var("USER").unwrap_or_else(|| DEFAULT_USER.to_string()),
        password: var("PASSWORD").unwrap_or_else(|| DEFAULT_PASSWORD.to_string()),
        connect_timeout_ms: parse_var(lookup, &format!("{}DB_CONNECT_TIMEOUT_MS", prefix))
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT_MS),
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring unparsable {}={:?}, using default", key, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let cfg = ServerConfig::from_lookup(|_| None);
        assert_eq!(cfg.http_port, 5000);
        assert_eq!(cfg.targets.len(), 1);

        let target = &cfg.targets[0];
        assert_eq!(target.name, "default");
        assert_eq!(target.driver, DriverKind::Oracle);
        assert_eq!(target.host, "localhost");
        assert_eq!(target.port, 1521);
        assert_eq!(target.service_name, "ORCLPDB1");
        assert_eq!(target.user, "system");
        assert_eq!(target.connect_timeout_ms, 5000);
    }

    #[test]
    fn test_single_target_from_unprefixed_vars() {
        let cfg = ServerConfig::from_lookup(lookup_from(&[
            ("PORT", "8081"),
            ("DB_HOST", "db1.example.com"),
            ("DB_PORT", "1522"),
            ("DB_SERVICE_NAME", "SALES"),
            ("DB_CONNECT_TIMEOUT_MS", "750"),
        ]));
        assert_eq!(cfg.http_port, 8081);
        let target = &cfg.targets[0];
        assert_eq!(target.database_identifier(), "db1.example.com:1522/SALES");
        assert_eq!(target.connect_timeout_ms, 750);
    }

    #[test]
    fn test_named_targets_use_prefixed_vars() {
        let cfg = ServerConfig::from_lookup(lookup_from(&[
            ("DB_TARGETS", "dev, uat,,reg"),
            ("DEV_DB_HOST", "dev-db"),
            ("UAT_DB_DRIVER", "sqlite"),
            ("UAT_DB_SERVICE_NAME", "/var/lib/uat.db"),
        ]));

        let names: Vec<&str> = cfg.targets.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["dev", "uat", "reg"]);
        assert_eq!(cfg.targets[0].host, "dev-db");
        assert_eq!(cfg.targets[1].driver, DriverKind::Sqlite);
        assert_eq!(cfg.targets[1].service_name, "/var/lib/uat.db");
        assert_eq!(cfg.targets[2].service_name, "ORCLPDB_reg");
        assert_eq!(cfg.targets[2].host, "localhost");
    }

    #[test]
    fn test_unparsable_values_fall_back() {
        let cfg = ServerConfig::from_lookup(lookup_from(&[
            ("PORT", "http"),
            ("DB_PORT", "-1"),
            ("DB_DRIVER", "mysql"),
        ]));
        assert_eq!(cfg.http_port, 5000);
        assert_eq!(cfg.targets[0].port, 1521);
        assert_eq!(cfg.targets[0].driver, DriverKind::Oracle);
    }

    #[test]
    fn test_dotenv_values_reach_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(
            &path,
            "DB_TARGETS=envfile\nENVFILE_DB_SERVICE_NAME=FROMFILE\nENVFILE_DB_HOST=file-host\n",
        )
        .unwrap();

        env::set_var("ENVFILE_DB_HOST", "process-host");
        dotenvy::from_path(&path).unwrap();
        let cfg = ServerConfig::load();

        assert_eq!(cfg.targets.len(), 1);
        let target = &cfg.targets[0];
        assert_eq!(target.name, "envfile");
        assert_eq!(target.service_name, "FROMFILE");
        // Variables already in the environment are not overridden.
        assert_eq!(target.host, "process-host");
    }
}
