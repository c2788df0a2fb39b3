use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] zonesync_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Article ID cannot be empty")]
    EmptyArticleId,
    #[error("Zone name and owner cannot be empty")]
    EmptyZone,
    #[error("Batch limit must be at least 1")]
    InvalidBatchLimit,
}
