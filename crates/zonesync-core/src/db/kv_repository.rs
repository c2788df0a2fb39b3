//! Durable key-value storage used for change tokens

use std::collections::HashMap;
use std::sync::Arc;

use libsql::Connection;
use tokio::sync::Mutex;

use crate::error::Result;

/// Trait for byte-valued key-value storage (async)
#[allow(async_fn_in_trait)]
pub trait KeyValueStore {
    /// Read a value; `None` when the key is absent
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Insert or replace a value
    async fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Remove a key; removing a missing key is not an error
    async fn remove(&self, key: &str) -> Result<()>;
}

/// libSQL implementation of `KeyValueStore`
#[derive(Clone)]
pub struct LibSqlKeyValueStore {
    conn: Connection,
}

impl LibSqlKeyValueStore {
    /// Create a store over the given connection
    #[must_use]
    pub fn new(conn: &Connection) -> Self {
        Self { conn: conn.clone() }
    }
}

impl KeyValueStore for LibSqlKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut rows = self
            .conn
            .query("SELECT value FROM kv_store WHERE key = ?", [key])
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(row.get::<Vec<u8>>(0)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO kv_store (key, value) VALUES (?, ?)",
                libsql::params![key, value.to_vec()],
            )
            .await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM kv_store WHERE key = ?", [key])
            .await?;
        Ok(())
    }
}

/// In-memory implementation of `KeyValueStore`
#[derive(Debug, Clone, Default)]
pub struct MemoryKeyValueStore {
    values: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryKeyValueStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sorted list of stored keys
    pub async fn keys(&self) -> Vec<String> {
        let mut keys = self.values.lock().await.keys().cloned().collect::<Vec<_>>();
        keys.sort();
        keys
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.values
            .lock()
            .await
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.values.lock().await.remove(key);
        Ok(())
    }
}

impl<K: KeyValueStore> KeyValueStore for Arc<K> {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.as_ref().get(key).await
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.as_ref().set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.as_ref().remove(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    async fn exercise(store: &impl KeyValueStore) {
        assert_eq!(store.get("token.Articles").await.unwrap(), None);

        store.set("token.Articles", b"abc").await.unwrap();
        assert_eq!(
            store.get("token.Articles").await.unwrap(),
            Some(b"abc".to_vec())
        );

        store.set("token.Articles", b"xyz").await.unwrap();
        assert_eq!(
            store.get("token.Articles").await.unwrap(),
            Some(b"xyz".to_vec())
        );

        store.remove("token.Articles").await.unwrap();
        store.remove("token.Articles").await.unwrap();
        assert_eq!(store.get("token.Articles").await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_libsql_store() {
        let db = Database::open_in_memory().await.unwrap();
        exercise(&LibSqlKeyValueStore::new(db.connection())).await;
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryKeyValueStore::new();
        exercise(&store).await;
        assert!(store.keys().await.is_empty());
    }
}
