//! Configuration model.
//!
//! These are the validated, in-memory shapes the rest of the crate works
//! with. The on-disk representation lives in `raw.rs` and is converted into
//! [`Settings`] after loading.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Which kind of store the pools connect to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// Distributed record store (namespaces map to server-side namespaces).
    #[default]
    Aerospike,
    /// In-memory cache store with optional read replicas.
    Redis,
}

impl StoreKind {
    /// Port assumed when a host entry omits one.
    pub fn default_port(self) -> u16 {
        match self {
            StoreKind::Aerospike => 3000,
            StoreKind::Redis => 6379,
        }
    }

    /// Whether this store keeps separate read and write pools.
    pub fn splits_roles(self) -> bool {
        matches!(self, StoreKind::Redis)
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreKind::Aerospike => f.write_str("aerospike"),
            StoreKind::Redis => f.write_str("redis"),
        }
    }
}

/// A host entry could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid endpoint `{input}`: {reason}")]
pub struct EndpointError {
    pub input: String,
    pub reason: &'static str,
}

/// A single `{host, port}` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HostEndpoint {
    pub host: String,
    pub port: u16,
}

impl HostEndpoint {
    /// Create an endpoint. `localhost` is rewritten to `127.0.0.1`.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: normalize_host(host.into()),
            port,
        }
    }

    /// Parse `host`, `host:port`, `[v6]:port` or a bare IPv6 literal.
    pub fn parse(input: &str, default_port: u16) -> Result<Self, EndpointError> {
        let trimmed = input.trim();
        let error = |reason| EndpointError {
            input: input.to_string(),
            reason,
        };

        if trimmed.is_empty() {
            return Err(error("empty host"));
        }

        if let Some(rest) = trimmed.strip_prefix('[') {
            let (host, tail) = rest.split_once(']').ok_or_else(|| error("unterminated bracket"))?;
            let port = match tail.strip_prefix(':') {
                Some(port) => parse_port(port).ok_or_else(|| error("port must be 1-65535"))?,
                None if tail.is_empty() => default_port,
                None => return Err(error("unexpected characters after bracket")),
            };
            return Ok(Self::new(host, port));
        }

        if trimmed.parse::<IpAddr>().is_ok() {
            return Ok(Self::new(trimmed, default_port));
        }

        match trimmed.rsplit_once(':') {
            Some((host, _)) if host.is_empty() => Err(error("empty host")),
            Some((host, port)) => {
                let port = parse_port(port).ok_or_else(|| error("port must be 1-65535"))?;
                Ok(Self::new(host, port))
            }
            None => Ok(Self::new(trimmed, default_port)),
        }
    }

    /// True when the host is an IP literal rather than a DNS name.
    pub fn is_ip(&self) -> bool {
        self.host.parse::<IpAddr>().is_ok()
    }
}

impl fmt::Display for HostEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

fn parse_port(raw: &str) -> Option<u16> {
    raw.trim().parse::<u16>().ok().filter(|port| *port > 0)
}

fn normalize_host(host: String) -> String {
    if host.eq_ignore_ascii_case("localhost") {
        "127.0.0.1".to_string()
    } else {
        host
    }
}

/// Per-operation deadlines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutConfig {
    /// Establishing a client connection.
    pub connect: Duration,
    /// Socket read.
    pub socket: Duration,
    /// Socket write.
    pub write: Duration,
    /// Whole operation including retries.
    pub total: Duration,
}

/// Pool sizing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Upper bound on live connections per pool.
    pub max_connections: usize,
    /// How long `acquire` waits for a free connection.
    pub acquire_timeout: Duration,
}

/// A credential kept out of `Debug` output and logs.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The plain value, for handing to a client library.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Session settings a client applies to every connection it opens.
///
/// `db` and the credentials only mean something to the cache store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionConfig {
    /// Logical database index selected after connecting.
    pub db: u32,
    pub username: Option<String>,
    pub password: Option<Secret>,
    /// Connect over TLS.
    pub tls: bool,
    /// TLS options passed to the client library untouched.
    pub tls_params: BTreeMap<String, String>,
}

/// Session fields carried by a `read_url` or `write_url`.
///
/// Set fields replace the namespace's session for pools of that role.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlCredentials {
    pub db: Option<u32>,
    pub username: Option<String>,
    pub password: Option<Secret>,
    /// The URL used the `rediss` scheme.
    pub tls: bool,
}

impl UrlCredentials {
    /// `base` with this URL's fields laid over it.
    pub fn apply(&self, base: &SessionConfig) -> SessionConfig {
        SessionConfig {
            db: self.db.unwrap_or(base.db),
            username: self.username.clone().or_else(|| base.username.clone()),
            password: self.password.clone().or_else(|| base.password.clone()),
            tls: base.tls || self.tls,
            tls_params: base.tls_params.clone(),
        }
    }
}

/// Logging and metrics settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level used when `RUST_LOG` is unset.
    pub log_level: String,
    /// Emit JSON log lines instead of the human-readable format.
    pub json_logs: bool,
    /// Prometheus exporter bind address; no exporter when unset.
    pub metrics_address: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_address: None,
        }
    }
}

/// Process-wide defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalConfig {
    pub store: StoreKind,
    pub hosts: Vec<HostEndpoint>,
    /// Replica endpoints for read pools; `hosts` when unset.
    pub read_hosts: Option<Vec<HostEndpoint>>,
    /// Primary endpoints for write pools; `hosts` when unset.
    pub write_hosts: Option<Vec<HostEndpoint>>,
    /// Session fields from `read_url`.
    pub read_credentials: Option<UrlCredentials>,
    /// Session fields from `write_url`.
    pub write_credentials: Option<UrlCredentials>,
    pub session: SessionConfig,
    pub default_namespace: String,
    /// Every namespace the configuration declares.
    pub namespaces: BTreeSet<String>,
    pub timeouts: TimeoutConfig,
    pub pool: PoolConfig,
    /// Extra connection attempts after the first one fails.
    pub max_retries: u32,
}

impl GlobalConfig {
    /// Built-in defaults for the given store.
    pub fn for_store(store: StoreKind) -> Self {
        let (timeouts, max_retries) = match store {
            StoreKind::Aerospike => (
                TimeoutConfig {
                    connect: Duration::from_secs(1),
                    socket: Duration::from_millis(500),
                    write: Duration::from_millis(500),
                    total: Duration::from_secs(2),
                },
                2,
            ),
            StoreKind::Redis => (
                TimeoutConfig {
                    connect: Duration::from_secs(5),
                    socket: Duration::from_secs(5),
                    write: Duration::from_secs(5),
                    total: Duration::from_secs(5),
                },
                3,
            ),
        };

        Self {
            store,
            hosts: vec![HostEndpoint::new("127.0.0.1", store.default_port())],
            read_hosts: None,
            write_hosts: None,
            read_credentials: None,
            write_credentials: None,
            session: SessionConfig::default(),
            default_namespace: "test".to_string(),
            namespaces: BTreeSet::from(["test".to_string()]),
            timeouts,
            pool: PoolConfig {
                max_connections: 5,
                acquire_timeout: Duration::from_secs(5),
            },
            max_retries,
        }
    }
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self::for_store(StoreKind::default())
    }
}

/// Partial settings for one namespace. `Some` fields win over the global value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamespaceOverride {
    pub hosts: Option<Vec<HostEndpoint>>,
    pub read_hosts: Option<Vec<HostEndpoint>>,
    pub write_hosts: Option<Vec<HostEndpoint>>,
    pub read_credentials: Option<UrlCredentials>,
    pub write_credentials: Option<UrlCredentials>,
    pub db: Option<u32>,
    pub username: Option<String>,
    pub password: Option<Secret>,
    pub tls: Option<bool>,
    pub tls_params: Option<BTreeMap<String, String>>,
    pub connect_timeout: Option<Duration>,
    pub socket_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
    pub total_timeout: Option<Duration>,
    pub max_connections: Option<usize>,
    pub pool_timeout: Option<Duration>,
    pub max_retries: Option<u32>,
}

impl NamespaceOverride {
    /// Override that only replaces the host list.
    pub fn with_hosts(hosts: Vec<HostEndpoint>) -> Self {
        Self {
            hosts: Some(hosts),
            ..Self::default()
        }
    }
}

/// Where the active configuration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigProvenance {
    #[default]
    Static,
    Dynamic,
}

impl fmt::Display for ConfigProvenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigProvenance::Static => f.write_str("static"),
            ConfigProvenance::Dynamic => f.write_str("dynamic"),
        }
    }
}

/// A complete configuration snapshot: defaults, overrides and provenance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    pub global: GlobalConfig,
    pub overrides: BTreeMap<String, NamespaceOverride>,
    pub provenance: ConfigProvenance,
    pub observability: ObservabilityConfig,
}

impl Settings {
    pub fn new(global: GlobalConfig) -> Self {
        Self {
            global,
            ..Self::default()
        }
    }

    /// Add an override and declare its namespace.
    pub fn with_override(mut self, namespace: impl Into<String>, overrides: NamespaceOverride) -> Self {
        let namespace = namespace.into();
        self.global.namespaces.insert(namespace.clone());
        self.overrides.insert(namespace, overrides);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_host_and_port() {
        let ep = HostEndpoint::parse("10.0.0.1:3100", 3000).unwrap();
        assert_eq!(ep, HostEndpoint::new("10.0.0.1", 3100));
    }

    #[test]
    fn test_parse_defaults_port() {
        assert_eq!(HostEndpoint::parse("db1", 6379).unwrap().port, 6379);
        assert_eq!(HostEndpoint::parse("::1", 3000).unwrap(), HostEndpoint::new("::1", 3000));
    }

    #[test]
    fn test_localhost_is_loopback() {
        let ep = HostEndpoint::parse("localhost:3000", 3000).unwrap();
        assert_eq!(ep.host, "127.0.0.1");
        assert!(ep.is_ip());
    }

    #[test]
    fn test_bracketed_ipv6() {
        let ep = HostEndpoint::parse("[fe80::1]:3001", 3000).unwrap();
        assert_eq!(ep.host, "fe80::1");
        assert_eq!(ep.port, 3001);
        assert_eq!(ep.to_string(), "[fe80::1]:3001");
    }

    #[test]
    fn test_rejects_bad_ports() {
        assert!(HostEndpoint::parse("10.0.0.1:0", 3000).is_err());
        assert!(HostEndpoint::parse("10.0.0.1:abc", 3000).is_err());
        assert!(HostEndpoint::parse("10.0.0.1:70000", 3000).is_err());
        assert!(HostEndpoint::parse("  ", 3000).is_err());
        assert!(HostEndpoint::parse(":3000", 3000).is_err());
    }

    #[test]
    fn test_store_defaults() {
        let redis = GlobalConfig::for_store(StoreKind::Redis);
        assert_eq!(redis.hosts, vec![HostEndpoint::new("127.0.0.1", 6379)]);
        assert!(StoreKind::Redis.splits_roles());
        assert!(!StoreKind::Aerospike.splits_roles());
    }

    #[test]
    fn test_with_override_declares_namespace() {
        let settings = Settings::default()
            .with_override("users", NamespaceOverride::with_hosts(vec![HostEndpoint::new("10.0.0.5", 3000)]));
        assert!(settings.global.namespaces.contains("users"));
        assert!(settings.global.namespaces.contains("test"));
    }

    #[test]
    fn test_secret_is_redacted() {
        let session = SessionConfig {
            password: Some(Secret::new("hunter2")),
            ..SessionConfig::default()
        };
        assert!(!format!("{session:?}").contains("hunter2"));
        assert_eq!(session.password.unwrap().expose(), "hunter2");
    }

    #[test]
    fn test_url_credentials_overlay_session() {
        let base = SessionConfig {
            db: 1,
            password: Some(Secret::new("base")),
            tls_params: BTreeMap::from([("ca_file".to_string(), "/etc/ca.pem".to_string())]),
            ..SessionConfig::default()
        };
        let url = UrlCredentials {
            db: Some(4),
            tls: true,
            ..UrlCredentials::default()
        };

        let merged = url.apply(&base);
        assert_eq!(merged.db, 4);
        assert_eq!(merged.password, base.password);
        assert!(merged.tls);
        assert_eq!(merged.tls_params, base.tls_params);
    }
}
