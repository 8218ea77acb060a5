//! Database targets and the registry that holds them.

use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

/// Registry error types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("duplicate target: {0}")]
    DuplicateTarget(String),
    #[error("unknown target: {0}")]
    UnknownTarget(String),
    #[error("invalid target name: {0:?}")]
    InvalidName(String),
}

/// The database engine family a target speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    #[default]
    Oracle,
    Sqlite,
}

impl FromStr for DriverKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "oracle" => Ok(Self::Oracle),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(format!("unknown driver: {}", other)),
        }
    }
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Oracle => f.write_str("oracle"),
            Self::Sqlite => f.write_str("sqlite"),
        }
    }
}

/// Connection parameters for one named database.
///
/// For the sqlite driver `service_name` holds the database file path.
#[derive(Clone, PartialEq, Eq)]
pub struct TargetConfig {
    pub name: String,
    pub driver: DriverKind,
    pub host: String,
    pub port: u16,
    pub service_name: String,
    pub user: String,
    pub password: String,
    pub connect_timeout_ms: u64,
}

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 1521;
pub const DEFAULT_USER: &str = "system";
pub const DEFAULT_PASSWORD: &str = "oracle";
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5000;

impl TargetConfig {
    /// A target with default connection parameters.
    pub fn new(name: &str, service_name: &str) -> Self {
        Self {
            name: name.to_string(),
            driver: DriverKind::default(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            service_name: service_name.to_string(),
            user: DEFAULT_USER.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
        }
    }

    /// The identifier reported back to callers: `host:port/service_name`.
    pub fn database_identifier(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.service_name)
    }
}

impl fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetConfig")
            .field("name", &self.name)
            .field("driver", &self.driver)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("service_name", &self.service_name)
            .field("user", &self.user)
            .field("password", &"********")
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .finish()
    }
}

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*$").expect("valid regex"))
}

/// Immutable set of named targets, kept in registration order.
///
/// Built once at startup and shared read-only afterwards.
#[derive(Debug, Default)]
pub struct TargetRegistry {
    targets: Vec<TargetConfig>,
    index: HashMap<String, usize>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a list of configs, failing on the first duplicate.
    pub fn from_configs<I>(configs: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = TargetConfig>,
    {
        let mut registry = Self::new();
        for config in configs {
            registry.register(config)?;
        }
        Ok(registry)
    }

    /// Add a target. Names must be unique and usable as a URL path segment.
    pub fn register(&mut self, config: TargetConfig) -> Result<(), RegistryError> {
        if !name_pattern().is_match(&config.name) {
            return Err(RegistryError::InvalidName(config.name));
        }
        if self.index.contains_key(&config.name) {
            return Err(RegistryError::DuplicateTarget(config.name));
        }
        self.index.insert(config.name.clone(), self.targets.len());
        self.targets.push(config);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<&TargetConfig, RegistryError> {
        self.index
            .get(name)
            .map(|&i| &self.targets[i])
            .ok_or_else(|| RegistryError::UnknownTarget(name.to_string()))
    }

    /// All targets in registration order.
    pub fn list(&self) -> &[TargetConfig] {
        &self.targets
    }

    /// The first registered target, served by the unqualified endpoints.
    pub fn default_target(&self) -> Option<&TargetConfig> {
        self.targets.first()
    }
}
