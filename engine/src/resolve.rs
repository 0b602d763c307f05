//! Conflict resolution between a local record and its remote counterpart.
//!
//! Resolution is a pure function of the policy and the two records. It never
//! touches the store; the caller applies the outcome.

use crate::{RemoteRecord, SyncableRecord};
use serde::{Deserialize, Serialize};

/// Policy for choosing between competing versions of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConflictPolicy {
    /// The remote version always wins
    ServerWins,
    /// The local version always wins
    ClientWins,
    /// The strictly newer `updated_at` wins; ties keep the local version
    #[default]
    NewestWins,
}

impl std::fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictPolicy::ServerWins => write!(f, "serverWins"),
            ConflictPolicy::ClientWins => write!(f, "clientWins"),
            ConflictPolicy::NewestWins => write!(f, "newestWins"),
        }
    }
}

impl std::str::FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['_', '-'], "").as_str() {
            "serverwins" => Ok(ConflictPolicy::ServerWins),
            "clientwins" => Ok(ConflictPolicy::ClientWins),
            "newestwins" => Ok(ConflictPolicy::NewestWins),
            _ => Err(format!("unknown conflict policy: {s}")),
        }
    }
}

/// Outcome of resolving one conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    /// Whether the remote version replaces the local one
    pub use_remote: bool,
}

/// Decide which side of a conflict wins.
pub fn resolve(policy: ConflictPolicy, local: &SyncableRecord, remote: &RemoteRecord) -> Resolution {
    let use_remote = match policy {
        ConflictPolicy::ServerWins => true,
        ConflictPolicy::ClientWins => false,
        ConflictPolicy::NewestWins => remote.updated_at > local.updated_at,
    };
    Resolution { use_remote }
}
