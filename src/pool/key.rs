//! Pool identity.

use std::fmt;
use std::str::FromStr;

use crate::config::schema::StoreKind;

/// Which side of a store a pool talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum PoolRole {
    #[default]
    Default,
    Read,
    Write,
}

impl PoolRole {
    pub fn as_str(self) -> &'static str {
        match self {
            PoolRole::Default => "default",
            PoolRole::Read => "read",
            PoolRole::Write => "write",
        }
    }

    /// Map a requested role onto the pool that actually serves it.
    ///
    /// Stores without a read/write split keep a single pool per namespace.
    /// Stores with one serve `Default` from the read pool.
    pub fn normalize(self, store: StoreKind) -> PoolRole {
        match (store.splits_roles(), self) {
            (false, _) => PoolRole::Default,
            (true, PoolRole::Default) => PoolRole::Read,
            (true, role) => role,
        }
    }
}

impl fmt::Display for PoolRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PoolRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "default" => Ok(PoolRole::Default),
            "read" => Ok(PoolRole::Read),
            "write" => Ok(PoolRole::Write),
            other => Err(format!("unknown pool role `{other}`")),
        }
    }
}

/// Identifies one pool: a namespace and a normalized role.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolKey {
    pub namespace: String,
    pub role: PoolRole,
}

impl PoolKey {
    pub fn new(namespace: impl Into<String>, role: PoolRole) -> Self {
        Self {
            namespace: namespace.into(),
            role,
        }
    }
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        for role in [PoolRole::Default, PoolRole::Read, PoolRole::Write] {
            assert_eq!(role.normalize(StoreKind::Aerospike), PoolRole::Default);
        }
        assert_eq!(PoolRole::Default.normalize(StoreKind::Redis), PoolRole::Read);
        assert_eq!(PoolRole::Write.normalize(StoreKind::Redis), PoolRole::Write);
    }

    #[test]
    fn test_display_and_parse() {
        assert_eq!(PoolKey::new("users", PoolRole::Write).to_string(), "users/write");
        assert_eq!("READ".parse::<PoolRole>().unwrap(), PoolRole::Read);
        assert!("primary".parse::<PoolRole>().is_err());
    }
}
