//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, pool size > 0, ports valid)
//! - Check every namespace override, not just the global section
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: Settings → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::time::Duration;

use crate::config::schema::{HostEndpoint, Settings};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{scope}: `{field}` must not be empty")]
    EmptyHosts { scope: String, field: &'static str },

    #[error("default_namespace must not be empty")]
    EmptyDefaultNamespace,

    #[error("{scope}: `{field}` must be greater than zero")]
    NotPositive { scope: String, field: &'static str },

    #[error("{scope}: host `{host}` has port 0")]
    ZeroPort { scope: String, host: String },
}

/// Check a loaded configuration.
pub fn validate_settings(settings: &Settings) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let global = &settings.global;
    let scope = "global";

    if global.default_namespace.trim().is_empty() {
        errors.push(ValidationError::EmptyDefaultNamespace);
    }

    check_hosts(&mut errors, scope, "hosts", Some(&global.hosts));
    check_hosts(&mut errors, scope, "read_hosts", global.read_hosts.as_deref());
    check_hosts(&mut errors, scope, "write_hosts", global.write_hosts.as_deref());

    let timeouts = &global.timeouts;
    check_positive(&mut errors, scope, "connect_timeout", Some(timeouts.connect));
    check_positive(&mut errors, scope, "timeout", Some(timeouts.socket));
    check_positive(&mut errors, scope, "write_timeout", Some(timeouts.write));
    check_positive(&mut errors, scope, "total_timeout", Some(timeouts.total));

    if global.pool.max_connections == 0 {
        errors.push(ValidationError::NotPositive {
            scope: scope.to_string(),
            field: "max_connections",
        });
    }

    for (namespace, o) in &settings.overrides {
        let scope = format!("namespace `{namespace}`");
        check_hosts(&mut errors, &scope, "hosts", o.hosts.as_deref());
        check_hosts(&mut errors, &scope, "read_hosts", o.read_hosts.as_deref());
        check_hosts(&mut errors, &scope, "write_hosts", o.write_hosts.as_deref());
        check_positive(&mut errors, &scope, "connect_timeout", o.connect_timeout);
        check_positive(&mut errors, &scope, "timeout", o.socket_timeout);
        check_positive(&mut errors, &scope, "write_timeout", o.write_timeout);
        check_positive(&mut errors, &scope, "total_timeout", o.total_timeout);
        if o.max_connections == Some(0) {
            errors.push(ValidationError::NotPositive {
                scope: scope.clone(),
                field: "max_connections",
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_hosts(
    errors: &mut Vec<ValidationError>,
    scope: &str,
    field: &'static str,
    hosts: Option<&[HostEndpoint]>,
) {
    let Some(hosts) = hosts else { return };
    if hosts.is_empty() {
        errors.push(ValidationError::EmptyHosts {
            scope: scope.to_string(),
            field,
        });
    }
    for host in hosts.iter().filter(|h| h.port == 0) {
        errors.push(ValidationError::ZeroPort {
            scope: scope.to_string(),
            host: host.host.clone(),
        });
    }
}

fn check_positive(
    errors: &mut Vec<ValidationError>,
    scope: &str,
    field: &'static str,
    value: Option<Duration>,
) {
    if value == Some(Duration::ZERO) {
        errors.push(ValidationError::NotPositive {
            scope: scope.to_string(),
            field,
        });
    }
}
