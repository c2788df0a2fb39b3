//! Error types for zonesync-core

use thiserror::Error;

use crate::remote::{ItemError, RemoteError};

/// Result type alias using zonesync-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in zonesync-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Terminal remote failure, carrying the raw cause
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// The zone owner removed the zone; the account needs to be re-authorized
    #[error(
        "The remote data for zone {zone} was deleted. Remove the account and add it again to continue syncing."
    )]
    UserDeletedZone {
        zone: String,
        #[source]
        source: RemoteError,
    },

    /// An atomic batch was rejected as a whole
    #[error("Atomic batch for zone {zone} was rejected: {} record(s) failed", items.len())]
    PartialFailure { zone: String, items: Vec<ItemError> },

    /// Local account state can not be used to address remote data
    #[error("Corrupt account: {0}")]
    CorruptAccount(String),

    /// Caller broke an API contract
    #[error("Contract violation: {0}")]
    Contract(String),

    /// Operation chain was cancelled before it finished
    #[error("Operation cancelled: {0}")]
    Cancelled(&'static str),

    /// Field payload could not be compressed or decompressed
    #[error("Compression error: {0}")]
    Compression(String),
}

impl Error {
    /// Whether this error asks the user to re-authorize the account.
    #[must_use]
    pub const fn is_user_deleted_zone(&self) -> bool {
        matches!(self, Self::UserDeletedZone { .. })
    }

    /// Whether this error is the result of cooperative cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}
