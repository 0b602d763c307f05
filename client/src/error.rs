//! Error types for the sync client.

use stocksync_engine::EntityType;

/// Errors that stop a sync operation before it starts, or while persisting.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("sync is not configured: an API base URL and API key are required")]
    NotConfigured,

    #[error("a sync cycle is already in progress")]
    AlreadyInProgress,

    #[error("store error: {0}")]
    Store(#[from] stocksync_engine::Error),

    #[error("snapshot persistence failed: {0}")]
    Persist(String),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Why a single remote call failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteFailure {
    /// The remote answered with a 4xx or 5xx status, or a success status
    /// whose body could not be decoded.
    #[error("remote rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// DNS, connect, timeout, or a connection reset mid-response.
    #[error("network unreachable: {0}")]
    Unreachable(String),
}

impl RemoteFailure {
    /// Report line for a failed push of one record.
    pub(crate) fn push_context(&self, entity: EntityType, id: &str) -> String {
        format!("push {entity}/{id}: {self}")
    }

    /// Report line for a failed pull of one entity type.
    pub(crate) fn pull_context(&self, entity: EntityType) -> String {
        format!("pull {entity}: {self}")
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("API base URL must include http:// or https://, got {0:?}")]
    InvalidUrl(String),

    #[error("invalid value for {name}: {value:?}")]
    InvalidNumber { name: &'static str, value: String },

    #[error("sync interval must be at least 1 minute")]
    IntervalTooShort,

    #[error("request timeout must be at least 1 second")]
    TimeoutTooShort,

    #[error("{0}")]
    InvalidPolicy(String),
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_display_prefixes() {
        let rejected = RemoteFailure::Rejected {
            status: 422,
            message: "quantity must be an integer".into(),
        };
        assert_eq!(
            rejected.push_context(EntityType::InventoryItems, "a1"),
            "push inventory/a1: remote rejected (422): quantity must be an integer"
        );

        let unreachable = RemoteFailure::Unreachable("connection refused".into());
        assert_eq!(
            unreachable.pull_context(EntityType::Categories),
            "pull categories: network unreachable: connection refused"
        );
    }

    #[test]
    fn engine_errors_convert() {
        let err: SyncError = stocksync_engine::Error::InvalidPayload("x".into()).into();
        assert!(matches!(err, SyncError::Store(_)));
    }
}
