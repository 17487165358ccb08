//! Configuration source selection.
//!
//! # Responsibilities
//! - Decide between the static file and the registry (caller's choice, the
//!   file's `config_source` key, or automatic)
//! - Pull seed lists from the registry and overlay them on the static file
//! - Fall back to the static file when the registry is unreachable
//! - Record which source produced the active configuration
//!
//! # Design Decisions
//! - The static file is always read first; it names the registry paths
//! - Registry failures never fail a load, they only downgrade provenance
//! - A registry seed list replaces only the `hosts` of its namespace

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::config::loader::{active_environment, load_static, ConfigError};
use crate::config::raw::{HostList, RawConfig};
use crate::config::schema::{ConfigProvenance, Settings};
use crate::config::seed::parse_seed_list;
use crate::config::validation::validate_settings;
use crate::registry::{NoRegistry, RegistryConnector, RegistryError, RegistrySession};

/// Registry address used when the file does not set `registry_address`.
pub const DEFAULT_REGISTRY_ADDRESS: &str = "127.0.0.1:2181";

/// Upper bound on establishing the registry session.
pub const REGISTRY_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// How the source picks between static and dynamic configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfigMode {
    /// Static file only.
    Static,
    /// Registry first, static file on failure.
    Dynamic,
    /// Dynamic when `namespaces` is a table of registry paths, static otherwise.
    #[default]
    Auto,
}

impl FromStr for ConfigMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "static" | "yml" | "yaml" | "toml" | "file" => Ok(ConfigMode::Static),
            "dynamic" | "zookeeper" | "registry" => Ok(ConfigMode::Dynamic),
            "auto" => Ok(ConfigMode::Auto),
            other => Err(ConfigError::InvalidValue {
                field: "config_mode".to_string(),
                reason: format!("unknown mode `{other}`"),
            }),
        }
    }
}

/// Loads [`Settings`] from a file, optionally enriched from a registry.
#[derive(Debug, Clone)]
pub struct ConfigSource<C = NoRegistry> {
    path: PathBuf,
    environment: String,
    mode: ConfigMode,
    connector: C,
}

impl ConfigSource<NoRegistry> {
    /// Source for `path` using the active environment and no registry.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            environment: active_environment(),
            mode: ConfigMode::Auto,
            connector: NoRegistry,
        }
    }
}

impl<C: RegistryConnector> ConfigSource<C> {
    /// Attach a registry client.
    pub fn with_registry<R: RegistryConnector>(self, connector: R) -> ConfigSource<R> {
        ConfigSource {
            path: self.path,
            environment: self.environment,
            mode: self.mode,
            connector,
        }
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    pub fn with_mode(mut self, mode: ConfigMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Load, overlay registry seeds when selected, convert and validate.
    pub async fn load(&self) -> Result<Settings, ConfigError> {
        let raw = load_static(&self.path, &self.environment)?;

        let mode = match (self.mode, raw.config_source.as_deref()) {
            (ConfigMode::Auto, Some(selected)) => selected.parse()?,
            (mode, _) => mode,
        };
        let use_registry = match mode {
            ConfigMode::Static => false,
            ConfigMode::Dynamic => true,
            ConfigMode::Auto => raw.has_registry_namespaces(),
        };

        let (raw, provenance) = if use_registry {
            let address = raw
                .registry_address
                .clone()
                .unwrap_or_else(|| DEFAULT_REGISTRY_ADDRESS.to_string());
            match load_dynamic(&self.connector, &address, &raw).await {
                Ok(dynamic) => (dynamic, ConfigProvenance::Dynamic),
                Err(e) => {
                    tracing::warn!(
                        address = %address,
                        error = %e,
                        "Registry unavailable, falling back to static configuration"
                    );
                    (raw, ConfigProvenance::Static)
                }
            }
        } else {
            (raw, ConfigProvenance::Static)
        };

        let mut settings = raw.into_settings()?;
        settings.provenance = provenance;
        validate_settings(&settings).map_err(ConfigError::Validation)?;

        tracing::info!(
            path = %self.path.display(),
            environment = %self.environment,
            config_source = %settings.provenance,
            store = %settings.global.store,
            namespaces = settings.global.namespaces.len(),
            "Configuration loaded"
        );
        Ok(settings)
    }
}

/// Overlay registry seed lists onto `base`.
///
/// Fails only when the registry cannot be reached at all. A missing,
/// unreadable or fully invalid seed list leaves that namespace on its
/// static hosts.
pub async fn load_dynamic<C: RegistryConnector>(
    connector: &C,
    address: &str,
    base: &RawConfig,
) -> Result<RawConfig, RegistryError> {
    let session = match tokio::time::timeout(REGISTRY_CONNECT_TIMEOUT, connector.connect(address)).await {
        Ok(session) => session?,
        Err(_) => {
            return Err(RegistryError::Unavailable {
                address: address.to_string(),
                reason: format!("connect timed out after {REGISTRY_CONNECT_TIMEOUT:?}"),
            })
        }
    };

    let default_port = base.store.unwrap_or_default().default_port();
    let mut converted = base.clone();

    for (namespace, path) in base.registry_paths() {
        let data = match session.get(&path).await {
            Ok(Some(data)) if !data.is_empty() => data,
            Ok(_) => {
                tracing::warn!(namespace = %namespace, path = %path, "Registry path missing or empty, keeping static hosts");
                continue;
            }
            Err(e) => {
                tracing::warn!(namespace = %namespace, error = %e, "Failed to read seed list, keeping static hosts");
                continue;
            }
        };

        let hosts = parse_seed_list(&String::from_utf8_lossy(&data), default_port);
        if hosts.is_empty() {
            tracing::warn!(namespace = %namespace, path = %path, "Seed list has no valid entries, keeping static hosts");
            continue;
        }

        tracing::debug!(namespace = %namespace, seeds = hosts.len(), "Applied registry seed list");
        converted
            .namespace_configs
            .entry(namespace)
            .or_default()
            .hosts = Some(HostList::from_endpoints(hosts));
    }

    Ok(converted)
}
