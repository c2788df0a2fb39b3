//! Local sync-state persistence

mod connection;
mod kv_repository;
mod migrations;
mod status_repository;

pub use connection::Database;
pub use kv_repository::{KeyValueStore, LibSqlKeyValueStore, MemoryKeyValueStore};
pub use status_repository::{LibSqlSyncStatusRepository, SyncStatusRepository};
