//! Zone identity, change tokens, and subscriptions

use serde::{Deserialize, Serialize};
use std::fmt;

/// A named, owner-scoped partition of the remote record store.
///
/// Immutable once a zone exists. Also names the local change-token key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ZoneIdentity {
    /// Zone name (e.g. `Articles`)
    pub name: String,
    /// Owner of the zone, usually the signed-in account
    pub owner: String,
}

impl ZoneIdentity {
    /// Create a zone identity
    pub fn new(name: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner: owner.into(),
        }
    }
}

impl fmt::Display for ZoneIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.name, self.owner)
    }
}

/// Zone metadata returned by the remote service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneInfo {
    pub zone: ZoneIdentity,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
}

/// Opaque, server-issued checkpoint into a zone's change history.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChangeToken(Vec<u8>);

impl ChangeToken {
    #[must_use]
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for ChangeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChangeToken({} bytes)", self.0.len())
    }
}

/// Zone-level change subscription
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub zone: ZoneIdentity,
}

/// "Something changed remotely" wake-up signal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneNotification {
    /// Name of the zone that changed, when the signal carries one
    pub zone_name: Option<String>,
}

impl ZoneNotification {
    pub fn for_zone(zone_name: impl Into<String>) -> Self {
        Self {
            zone_name: Some(zone_name.into()),
        }
    }
}
