//! Effective configuration per namespace.
//!
//! Merges the global defaults with a namespace override field by field. The
//! resolver holds an immutable snapshot, so it can be shared across tasks
//! without locking.

use std::sync::Arc;

use crate::config::schema::{
    ConfigProvenance, HostEndpoint, PoolConfig, SessionConfig, Settings, StoreKind, TimeoutConfig,
    UrlCredentials,
};
use crate::pool::PoolRole;

/// Fully merged settings for one namespace.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveConfig {
    pub namespace: String,
    pub store: StoreKind,
    pub hosts: Vec<HostEndpoint>,
    pub read_hosts: Vec<HostEndpoint>,
    pub write_hosts: Vec<HostEndpoint>,
    pub session: SessionConfig,
    /// `session` with the read URL's fields applied.
    pub read_session: SessionConfig,
    /// `session` with the write URL's fields applied.
    pub write_session: SessionConfig,
    pub timeouts: TimeoutConfig,
    pub pool: PoolConfig,
    pub max_retries: u32,
    pub provenance: ConfigProvenance,
}

impl EffectiveConfig {
    /// Hosts a pool with the given role connects to.
    pub fn hosts_for(&self, role: PoolRole) -> &[HostEndpoint] {
        match role {
            PoolRole::Default => &self.hosts,
            PoolRole::Read => &self.read_hosts,
            PoolRole::Write => &self.write_hosts,
        }
    }

    /// Session settings for connections of the given role.
    pub fn session_for(&self, role: PoolRole) -> &SessionConfig {
        match role {
            PoolRole::Default => &self.session,
            PoolRole::Read => &self.read_session,
            PoolRole::Write => &self.write_session,
        }
    }
}

/// Resolves [`EffectiveConfig`] values from a [`Settings`] snapshot.
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    settings: Arc<Settings>,
}

impl ConfigResolver {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: Arc::new(settings),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> StoreKind {
        self.settings.global.store
    }

    pub fn default_namespace(&self) -> &str {
        &self.settings.global.default_namespace
    }

    /// Whether the namespace was declared in the configuration.
    pub fn is_declared(&self, namespace: &str) -> bool {
        self.settings.global.namespaces.contains(namespace)
            || self.settings.overrides.contains_key(namespace)
    }

    /// Merge defaults and the namespace's override.
    ///
    /// Unknown namespaces get the global defaults; deciding whether a
    /// namespace exists is left to the store.
    pub fn resolve(&self, namespace: &str) -> EffectiveConfig {
        let global = &self.settings.global;
        let o = self.settings.overrides.get(namespace);

        // An empty override list never replaces a usable default.
        let hosts = o
            .and_then(|o| o.hosts.clone())
            .filter(|hosts| !hosts.is_empty())
            .unwrap_or_else(|| global.hosts.clone());
        let session = SessionConfig {
            db: o.and_then(|o| o.db).unwrap_or(global.session.db),
            username: o
                .and_then(|o| o.username.clone())
                .or_else(|| global.session.username.clone()),
            password: o
                .and_then(|o| o.password.clone())
                .or_else(|| global.session.password.clone()),
            tls: o.and_then(|o| o.tls).unwrap_or(global.session.tls),
            tls_params: o
                .and_then(|o| o.tls_params.clone())
                .unwrap_or_else(|| global.session.tls_params.clone()),
        };

        // A namespace's replica list carries its own URL fields; the global
        // ones only come along with the global list.
        let (read_hosts, read_session) = replica_target(
            o.and_then(|o| o.read_hosts.as_ref().map(|h| (h, o.read_credentials.as_ref())))
                .or_else(|| global.read_hosts.as_ref().map(|h| (h, global.read_credentials.as_ref()))),
            &hosts,
            &session,
        );
        let (write_hosts, write_session) = replica_target(
            o.and_then(|o| o.write_hosts.as_ref().map(|h| (h, o.write_credentials.as_ref())))
                .or_else(|| global.write_hosts.as_ref().map(|h| (h, global.write_credentials.as_ref()))),
            &hosts,
            &session,
        );

        let timeouts = TimeoutConfig {
            connect: o.and_then(|o| o.connect_timeout).unwrap_or(global.timeouts.connect),
            socket: o.and_then(|o| o.socket_timeout).unwrap_or(global.timeouts.socket),
            write: o.and_then(|o| o.write_timeout).unwrap_or(global.timeouts.write),
            total: o.and_then(|o| o.total_timeout).unwrap_or(global.timeouts.total),
        };
        let pool = PoolConfig {
            max_connections: o
                .and_then(|o| o.max_connections)
                .unwrap_or(global.pool.max_connections),
            acquire_timeout: o
                .and_then(|o| o.pool_timeout)
                .unwrap_or(global.pool.acquire_timeout),
        };

        EffectiveConfig {
            namespace: namespace.to_string(),
            store: global.store,
            hosts,
            read_hosts,
            write_hosts,
            session,
            read_session,
            write_session,
            timeouts,
            pool,
            max_retries: o.and_then(|o| o.max_retries).unwrap_or(global.max_retries),
            provenance: self.settings.provenance,
        }
    }
}

// An empty replica list never replaces a usable default.
fn replica_target(
    source: Option<(&Vec<HostEndpoint>, Option<&UrlCredentials>)>,
    hosts: &[HostEndpoint],
    session: &SessionConfig,
) -> (Vec<HostEndpoint>, SessionConfig) {
    match source {
        Some((replicas, credentials)) if !replicas.is_empty() => {
            let session = credentials.map_or_else(|| session.clone(), |c| c.apply(session));
            (replicas.clone(), session)
        }
        _ => (hosts.to_vec(), session.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{GlobalConfig, NamespaceOverride, Secret};
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn scenario() -> ConfigResolver {
        let mut global = GlobalConfig::default();
        global.hosts = vec![HostEndpoint::new("127.0.0.1", 3000)];
        global.default_namespace = "test".to_string();
        global.pool.max_connections = 5;

        ConfigResolver::new(Settings::new(global).with_override(
            "users",
            NamespaceOverride::with_hosts(vec![HostEndpoint::new("10.0.0.5", 3000)]),
        ))
    }

    #[test]
    fn test_users_and_test_scenario() {
        let resolver = scenario();
        assert_eq!(resolver.resolve("users").hosts, vec![HostEndpoint::new("10.0.0.5", 3000)]);
        assert_eq!(resolver.resolve("test").hosts, vec![HostEndpoint::new("127.0.0.1", 3000)]);
        assert_eq!(resolver.resolve("users").pool.max_connections, 5);
    }

    #[test]
    fn test_no_override_equals_defaults() {
        let resolver = scenario();
        let global = &resolver.settings().global;
        for namespace in ["test", "unknown", ""] {
            let effective = resolver.resolve(namespace);
            assert_eq!(effective.hosts, global.hosts);
            assert_eq!(effective.timeouts, global.timeouts);
            assert_eq!(effective.pool, global.pool);
            assert_eq!(effective.max_retries, global.max_retries);
        }
        assert!(!resolver.is_declared("unknown"));
    }

    #[test]
    fn test_field_by_field_merge() {
        let resolver = ConfigResolver::new(Settings::default().with_override(
            "events",
            NamespaceOverride {
                socket_timeout: Some(Duration::from_millis(50)),
                max_connections: Some(20),
                ..NamespaceOverride::default()
            },
        ));
        let global = resolver.settings().global.clone();
        let effective = resolver.resolve("events");

        assert_eq!(effective.timeouts.socket, Duration::from_millis(50));
        assert_eq!(effective.pool.max_connections, 20);
        assert_eq!(effective.timeouts.connect, global.timeouts.connect);
        assert_eq!(effective.pool.acquire_timeout, global.pool.acquire_timeout);
        assert_eq!(effective.hosts, global.hosts);
    }

    #[test]
    fn test_empty_override_hosts_fall_back() {
        let resolver = ConfigResolver::new(
            Settings::default().with_override("empty", NamespaceOverride::with_hosts(Vec::new())),
        );
        assert_eq!(resolver.resolve("empty").hosts, resolver.settings().global.hosts);
    }

    #[test]
    fn test_replica_hosts_by_role() {
        let mut global = GlobalConfig::for_store(StoreKind::Redis);
        global.read_hosts = Some(vec![HostEndpoint::new("10.0.1.1", 6379)]);
        let resolver = ConfigResolver::new(Settings::new(global));
        let effective = resolver.resolve("cache");

        assert_eq!(effective.hosts_for(PoolRole::Read), [HostEndpoint::new("10.0.1.1", 6379)]);
        assert_eq!(effective.hosts_for(PoolRole::Write), effective.hosts.as_slice());
    }

    #[test]
    fn test_session_fields_merge_by_field() {
        let mut global = GlobalConfig::for_store(StoreKind::Redis);
        global.session.db = 1;
        global.session.password = Some(Secret::new("global"));
        global.session.tls_params = BTreeMap::from([("ca_file".to_string(), "/etc/ca.pem".to_string())]);
        global.read_hosts = Some(vec![HostEndpoint::new("10.0.1.1", 6380)]);
        global.read_credentials = Some(UrlCredentials {
            db: Some(2),
            password: Some(Secret::new("replica")),
            ..UrlCredentials::default()
        });

        let resolver = ConfigResolver::new(Settings::new(global).with_override(
            "sessions",
            NamespaceOverride {
                db: Some(5),
                tls: Some(true),
                ..NamespaceOverride::default()
            },
        ));

        let plain = resolver.resolve("cache");
        assert_eq!(plain.session.db, 1);
        assert!(!plain.session.tls);
        assert_eq!(plain.session_for(PoolRole::Read).db, 2);
        assert_eq!(plain.session_for(PoolRole::Read).password, Some(Secret::new("replica")));
        assert_eq!(plain.session_for(PoolRole::Write), &plain.session);

        let sessions = resolver.resolve("sessions");
        assert_eq!(sessions.session.db, 5);
        assert!(sessions.session.tls);
        assert_eq!(sessions.session.password, Some(Secret::new("global")));
        assert_eq!(sessions.session.tls_params.len(), 1);
        // The global read URL still picks its own database and password.
        assert_eq!(sessions.read_session.db, 2);
        assert!(sessions.read_session.tls);
        assert_eq!(sessions.write_session.db, 5);
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let resolver = scenario();
        assert_eq!(resolver.resolve("users"), resolver.resolve("users"));
    }
}
