//! zonesync-core - Core library for zonesync
//!
//! This crate contains the zone client that keeps a local store in sync with
//! a remote, zone-partitioned record service, the local persistence for
//! change tokens and pending changes, and the account and article adapters
//! built on top.

pub mod account;
pub mod articles;
pub mod chunk;
pub mod classify;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod remote;
pub mod retry;
pub mod token_store;
pub mod zone;

pub use classify::{classify, ErrorCategory};
pub use config::SyncConfig;
pub use error::{Error, Result};
pub use models::{ChangeToken, Record, RecordId, ZoneIdentity};
pub use remote::{MemoryRemote, RemoteError, RemoteErrorCode, RemoteService};
pub use retry::{RecordingScheduler, RetryScheduler, TokioScheduler};
pub use token_store::ChangeTokenStore;
pub use zone::{SaveOutcome, ZoneClient, ZoneDelegate};
