//! Seed list validation.
//!
//! Registry values are either `"ip:port,ip:port"` or a JSON array of the same
//! strings. Only entries whose host is an IP literal are trusted; anything
//! else is logged and dropped.

use std::net::IpAddr;

use crate::config::schema::HostEndpoint;

/// Parse and filter a raw seed list.
///
/// An empty result means the caller should keep its static hosts.
pub fn parse_seed_list(raw: &str, default_port: u16) -> Vec<HostEndpoint> {
    let joined = flatten_json_array(raw);

    joined
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| validate_entry(entry, default_port))
        .collect()
}

fn flatten_json_array(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.starts_with('[') {
        return trimmed.to_string();
    }

    match serde_json::from_str::<Vec<serde_json::Value>>(trimmed) {
        Ok(items) => items
            .into_iter()
            .map(|item| match item {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(","),
        Err(e) => {
            tracing::warn!(error = %e, "Seed list looks like JSON but does not parse, treating as plain text");
            trimmed.to_string()
        }
    }
}

fn validate_entry(entry: &str, default_port: u16) -> Option<HostEndpoint> {
    let Some((host, port)) = split_entry(entry) else {
        tracing::warn!(entry, "Dropping seed entry: unterminated bracket");
        return None;
    };

    if host.parse::<IpAddr>().is_err() {
        tracing::warn!(entry, "Dropping seed entry: host is not an IP address");
        return None;
    }

    let port = match port {
        None => default_port,
        Some(raw) => match raw.trim().parse::<u16>() {
            Ok(port) if port > 0 => port,
            _ => {
                tracing::warn!(entry, "Dropping seed entry: port must be 1-65535");
                return None;
            }
        },
    };
    Some(HostEndpoint::new(host, port))
}

/// Split an entry into host and optional port at its last colon.
///
/// `[addr]` and `[addr]:port` keep their brackets out of the host.
fn split_entry(entry: &str) -> Option<(&str, Option<&str>)> {
    if let Some(rest) = entry.strip_prefix('[') {
        let (host, tail) = rest.split_once(']')?;
        if tail.is_empty() {
            return Some((host, None));
        }
        return tail.strip_prefix(':').map(|port| (host, Some(port)));
    }

    Some(match entry.rsplit_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (entry, None),
    })
}
