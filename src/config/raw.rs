//! File representation of the configuration.
//!
//! Mirrors the keys accepted in the TOML file, including the aliases older
//! deployments use (`socket_timeout`, `reconnect_attempts`, `pool_size`,
//! `ssl`).
//! Every field is optional; [`RawConfig::into_settings`] fills the gaps from
//! the store defaults.

use std::collections::BTreeMap;
use std::time::Duration;

use percent_encoding::percent_decode_str;
use serde::Deserialize;
use url::Url;

use crate::config::loader::ConfigError;
use crate::config::schema::{
    EndpointError, GlobalConfig, HostEndpoint, NamespaceOverride, ObservabilityConfig, Secret,
    Settings, StoreKind, UrlCredentials,
};

/// One host entry: `"host:port"` or `{ host = "...", port = 3000 }`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum HostSpec {
    Address(String),
    Table {
        host: String,
        #[serde(default)]
        port: Option<u16>,
    },
}

impl HostSpec {
    fn to_endpoint(&self, default_port: u16) -> Result<HostEndpoint, EndpointError> {
        match self {
            HostSpec::Address(address) => HostEndpoint::parse(address, default_port),
            HostSpec::Table { host, port } => {
                if host.trim().is_empty() {
                    return Err(EndpointError {
                        input: host.clone(),
                        reason: "empty host",
                    });
                }
                Ok(HostEndpoint::new(host.trim(), port.unwrap_or(default_port)))
            }
        }
    }
}

/// A single host or a list of hosts.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum HostList {
    One(HostSpec),
    Many(Vec<HostSpec>),
}

impl HostList {
    pub fn from_endpoints(endpoints: Vec<HostEndpoint>) -> Self {
        HostList::Many(
            endpoints
                .into_iter()
                .map(|ep| HostSpec::Table {
                    host: ep.host,
                    port: Some(ep.port),
                })
                .collect(),
        )
    }

    fn to_endpoints(&self, default_port: u16) -> Result<Vec<HostEndpoint>, EndpointError> {
        match self {
            HostList::One(spec) => Ok(vec![spec.to_endpoint(default_port)?]),
            HostList::Many(specs) => specs.iter().map(|s| s.to_endpoint(default_port)).collect(),
        }
    }
}

/// Registry location of a namespace's seed list.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RegistryNamespace {
    pub zk_path: Option<String>,
}

/// `namespaces` is either a plain list or a table of registry paths.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum NamespaceDecl {
    List(Vec<String>),
    Registry(BTreeMap<String, RegistryNamespace>),
}

/// Per-namespace section under `namespace_configs`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawOverride {
    pub hosts: Option<HostList>,
    pub read_hosts: Option<HostList>,
    pub read_url: Option<String>,
    pub write_hosts: Option<HostList>,
    pub write_url: Option<String>,
    pub db: Option<u32>,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(alias = "tls")]
    pub ssl: Option<bool>,
    #[serde(alias = "tls_params")]
    pub ssl_params: Option<BTreeMap<String, String>>,
    pub connect_timeout: Option<f64>,
    #[serde(alias = "socket_timeout")]
    pub timeout: Option<f64>,
    pub write_timeout: Option<f64>,
    pub total_timeout: Option<f64>,
    #[serde(alias = "reconnect_attempts")]
    pub max_retries: Option<u32>,
    #[serde(alias = "pool_size")]
    pub max_connections: Option<usize>,
    pub pool_timeout: Option<f64>,
}

/// The environment section of a configuration file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawConfig {
    pub store: Option<StoreKind>,
    pub hosts: Option<HostList>,
    pub read_hosts: Option<HostList>,
    pub read_url: Option<String>,
    pub write_hosts: Option<HostList>,
    pub write_url: Option<String>,
    pub db: Option<u32>,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(alias = "tls")]
    pub ssl: Option<bool>,
    #[serde(alias = "tls_params")]
    pub ssl_params: Option<BTreeMap<String, String>>,
    pub default_namespace: Option<String>,
    pub namespaces: Option<NamespaceDecl>,
    pub namespace_configs: BTreeMap<String, RawOverride>,
    pub connect_timeout: Option<f64>,
    #[serde(alias = "socket_timeout")]
    pub timeout: Option<f64>,
    pub write_timeout: Option<f64>,
    pub total_timeout: Option<f64>,
    #[serde(alias = "reconnect_attempts")]
    pub max_retries: Option<u32>,
    #[serde(alias = "pool_size")]
    pub max_connections: Option<usize>,
    pub pool_timeout: Option<f64>,
    pub registry_address: Option<String>,
    /// `static`, `dynamic` or `auto`; consulted when the caller left the mode on auto.
    pub config_source: Option<String>,
    pub observability: Option<ObservabilityConfig>,
}

impl RawConfig {
    /// True when `namespaces` is a table, i.e. hosts come from the registry.
    pub fn has_registry_namespaces(&self) -> bool {
        matches!(self.namespaces, Some(NamespaceDecl::Registry(_)))
    }

    /// `(namespace, zk_path)` pairs for every namespace with a registry path.
    pub fn registry_paths(&self) -> Vec<(String, String)> {
        match &self.namespaces {
            Some(NamespaceDecl::Registry(entries)) => entries
                .iter()
                .filter_map(|(name, entry)| {
                    entry.zk_path.as_ref().map(|path| (name.clone(), path.clone()))
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Convert into [`Settings`], filling unset fields from the store defaults.
    pub fn into_settings(self) -> Result<Settings, ConfigError> {
        let store = self.store.unwrap_or_default();
        let port = store.default_port();
        let mut global = GlobalConfig::for_store(store);

        if let Some(hosts) = &self.hosts {
            global.hosts = hosts.to_endpoints(port)?;
        }
        (global.read_hosts, global.read_credentials) =
            replica(self.read_hosts.as_ref(), self.read_url.as_deref(), port, "read_url")?;
        (global.write_hosts, global.write_credentials) =
            replica(self.write_hosts.as_ref(), self.write_url.as_deref(), port, "write_url")?;

        if let Some(db) = self.db {
            global.session.db = db;
        }
        global.session.username = self.username;
        global.session.password = self.password.map(Secret::from);
        if let Some(tls) = self.ssl {
            global.session.tls = tls;
        }
        if let Some(params) = self.ssl_params {
            global.session.tls_params = params;
        }

        if let Some(name) = self.default_namespace {
            global.default_namespace = name;
        }
        match self.namespaces {
            Some(NamespaceDecl::List(names)) => global.namespaces = names.into_iter().collect(),
            Some(NamespaceDecl::Registry(entries)) => global.namespaces = entries.into_keys().collect(),
            None => {}
        }

        if let Some(secs) = self.connect_timeout {
            global.timeouts.connect = seconds("connect_timeout", secs)?;
        }
        if let Some(secs) = self.timeout {
            global.timeouts.socket = seconds("timeout", secs)?;
        }
        if let Some(secs) = self.write_timeout {
            global.timeouts.write = seconds("write_timeout", secs)?;
        }
        if let Some(secs) = self.total_timeout {
            global.timeouts.total = seconds("total_timeout", secs)?;
        }
        if let Some(retries) = self.max_retries {
            global.max_retries = retries;
        }
        if let Some(max) = self.max_connections {
            global.pool.max_connections = max;
        }
        if let Some(secs) = self.pool_timeout {
            global.pool.acquire_timeout = seconds("pool_timeout", secs)?;
        }

        let mut overrides = BTreeMap::new();
        for (namespace, raw) in self.namespace_configs {
            let converted = raw
                .into_override(port)
                .map_err(|e| e.in_namespace(&namespace))?;
            global.namespaces.insert(namespace.clone());
            overrides.insert(namespace, converted);
        }

        Ok(Settings {
            global,
            overrides,
            provenance: Default::default(),
            observability: self.observability.unwrap_or_default(),
        })
    }
}

impl RawOverride {
    fn into_override(self, port: u16) -> Result<NamespaceOverride, ConfigError> {
        let (read_hosts, read_credentials) =
            replica(self.read_hosts.as_ref(), self.read_url.as_deref(), port, "read_url")?;
        let (write_hosts, write_credentials) =
            replica(self.write_hosts.as_ref(), self.write_url.as_deref(), port, "write_url")?;

        Ok(NamespaceOverride {
            hosts: self.hosts.map(|h| h.to_endpoints(port)).transpose()?,
            read_hosts,
            write_hosts,
            read_credentials,
            write_credentials,
            db: self.db,
            username: self.username,
            password: self.password.map(Secret::from),
            tls: self.ssl,
            tls_params: self.ssl_params,
            connect_timeout: self.connect_timeout.map(|s| seconds("connect_timeout", s)).transpose()?,
            socket_timeout: self.timeout.map(|s| seconds("timeout", s)).transpose()?,
            write_timeout: self.write_timeout.map(|s| seconds("write_timeout", s)).transpose()?,
            total_timeout: self.total_timeout.map(|s| seconds("total_timeout", s)).transpose()?,
            max_connections: self.max_connections,
            pool_timeout: self.pool_timeout.map(|s| seconds("pool_timeout", s)).transpose()?,
            max_retries: self.max_retries,
        })
    }
}

type Replica = (Option<Vec<HostEndpoint>>, Option<UrlCredentials>);

// An explicit host list wins over a URL.
fn replica(hosts: Option<&HostList>, url: Option<&str>, port: u16, field: &str) -> Result<Replica, ConfigError> {
    if let Some(hosts) = hosts {
        return Ok((Some(hosts.to_endpoints(port)?), None));
    }
    match url {
        Some(url) => {
            let (endpoint, credentials) = target_from_url(url, port, field)?;
            Ok((Some(vec![endpoint]), Some(credentials)))
        }
        None => Ok((None, None)),
    }
}

/// Endpoint and session fields of `redis[s]://[user][:password@]host[:port][/db]`.
fn target_from_url(
    raw: &str,
    default_port: u16,
    field: &str,
) -> Result<(HostEndpoint, UrlCredentials), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidValue {
        field: field.to_string(),
        reason,
    };
    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    let host = url
        .host_str()
        .ok_or_else(|| invalid(format!("`{}` has no host", redact(&url))))?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    let endpoint = HostEndpoint::new(host, url.port().unwrap_or(default_port));

    let decode = |part: &str| -> Result<Option<String>, ConfigError> {
        if part.is_empty() {
            return Ok(None);
        }
        percent_decode_str(part)
            .decode_utf8()
            .map(|decoded| Some(decoded.into_owned()))
            .map_err(|_| invalid("credentials are not valid UTF-8".to_string()))
    };

    let db = match url.path().trim_matches('/') {
        "" => None,
        db => Some(
            db.parse::<u32>()
                .map_err(|_| invalid(format!("`{db}` is not a database index")))?,
        ),
    };

    let credentials = UrlCredentials {
        db,
        username: decode(url.username())?,
        password: decode(url.password().unwrap_or_default())?.map(Secret::from),
        tls: url.scheme() == "rediss",
    };
    Ok((endpoint, credentials))
}

fn redact(url: &Url) -> String {
    let mut shown = url.clone();
    if shown.password().is_some() {
        let _ = shown.set_password(Some("***"));
    }
    shown.to_string()
}

fn seconds(field: &str, secs: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(secs).map_err(|_| ConfigError::InvalidValue {
        field: field.to_string(),
        reason: format!("{secs} is not a non-negative number of seconds"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(doc: &str) -> RawConfig {
        toml::from_str(doc).unwrap()
    }

    #[test]
    fn test_mixed_host_forms() {
        let raw = parse(
            r#"
            hosts = ["10.0.0.1:3000", { host = "10.0.0.2" }, "localhost"]
            "#,
        );
        let settings = raw.into_settings().unwrap();
        assert_eq!(
            settings.global.hosts,
            vec![
                HostEndpoint::new("10.0.0.1", 3000),
                HostEndpoint::new("10.0.0.2", 3000),
                HostEndpoint::new("127.0.0.1", 3000),
            ]
        );
    }

    #[test]
    fn test_single_host_string() {
        let settings = parse(r#"hosts = "10.1.1.1:4000""#).into_settings().unwrap();
        assert_eq!(settings.global.hosts, vec![HostEndpoint::new("10.1.1.1", 4000)]);
    }

    #[test]
    fn test_aliases() {
        let settings = parse(
            r#"
            socket_timeout = 0.25
            reconnect_attempts = 7
            pool_size = 12
            pool_timeout = 1
            "#,
        )
        .into_settings()
        .unwrap();
        assert_eq!(settings.global.timeouts.socket, Duration::from_millis(250));
        assert_eq!(settings.global.max_retries, 7);
        assert_eq!(settings.global.pool.max_connections, 12);
        assert_eq!(settings.global.pool.acquire_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_registry_namespaces() {
        let raw = parse(
            r#"
            [namespaces.users]
            zk_path = "/seeds/users"
            [namespaces.events]
            "#,
        );
        assert!(raw.has_registry_namespaces());
        assert_eq!(raw.registry_paths(), vec![("users".to_string(), "/seeds/users".to_string())]);

        let settings = raw.into_settings().unwrap();
        assert!(settings.global.namespaces.contains("events"));
        assert!(settings.global.namespaces.contains("users"));
    }

    #[test]
    fn test_namespace_configs_are_declared() {
        let settings = parse(
            r#"
            namespaces = ["test"]
            [namespace_configs.users]
            hosts = ["10.0.0.5:3000"]
            pool_size = 2
            "#,
        )
        .into_settings()
        .unwrap();
        assert!(settings.global.namespaces.contains("users"));
        let users = &settings.overrides["users"];
        assert_eq!(users.hosts, Some(vec![HostEndpoint::new("10.0.0.5", 3000)]));
        assert_eq!(users.max_connections, Some(2));
        assert_eq!(users.socket_timeout, None);
    }

    #[test]
    fn test_read_write_urls() {
        let settings = parse(
            r#"
            store = "redis"
            read_url = "redis://10.0.0.7:6380/0"
            write_url = "redis://localhost"
            "#,
        )
        .into_settings()
        .unwrap();
        assert_eq!(settings.global.read_hosts, Some(vec![HostEndpoint::new("10.0.0.7", 6380)]));
        assert_eq!(settings.global.write_hosts, Some(vec![HostEndpoint::new("127.0.0.1", 6379)]));
        assert_eq!(settings.global.hosts, vec![HostEndpoint::new("127.0.0.1", 6379)]);
    }

    #[test]
    fn test_url_keeps_credentials_and_database() {
        let settings = parse(
            r#"
            store = "redis"
            password = "global"
            db = 1
            read_url = "rediss://:s%40cret@10.0.0.7:6380/2"
            write_url = "redis://10.0.0.8"
            "#,
        )
        .into_settings()
        .unwrap();

        let global = &settings.global;
        assert_eq!(global.read_hosts, Some(vec![HostEndpoint::new("10.0.0.7", 6380)]));
        let read = global.read_credentials.as_ref().unwrap();
        assert_eq!(read.db, Some(2));
        assert_eq!(read.password.as_ref().map(Secret::expose), Some("s@cret"));
        assert_eq!(read.username, None);
        assert!(read.tls);

        let write = global.write_credentials.as_ref().unwrap();
        assert_eq!(write, &UrlCredentials::default());
        assert_eq!(global.session.db, 1);
        assert_eq!(global.session.password.as_ref().map(Secret::expose), Some("global"));
    }

    #[test]
    fn test_bad_database_index_rejected() {
        let err = parse(r#"read_url = "redis://:pw@10.0.0.7/cache""#)
            .into_settings()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "read_url"));
        assert!(!err.to_string().contains("pw"));
    }

    #[test]
    fn test_session_fields_in_overrides() {
        let settings = parse(
            r#"
            store = "redis"
            [namespace_configs.sessions]
            db = 3
            ssl = true
            ssl_params = { ca_file = "/etc/ca.pem" }
            "#,
        )
        .into_settings()
        .unwrap();

        let sessions = &settings.overrides["sessions"];
        assert_eq!(sessions.db, Some(3));
        assert_eq!(sessions.tls, Some(true));
        assert_eq!(
            sessions.tls_params.as_ref().and_then(|p| p.get("ca_file")).map(String::as_str),
            Some("/etc/ca.pem")
        );
        assert_eq!(sessions.password, None);
        assert_eq!(settings.global.session, Default::default());
    }

    #[test]
    fn test_negative_timeout_rejected() {
        let err = parse("connect_timeout = -1.0").into_settings().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "connect_timeout"));
    }
}
