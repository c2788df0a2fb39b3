//! Per-zone change-token persistence
//!
//! Tokens live under `"<prefix>.<zone>.<owner>"`. Older installs stored them
//! under `"<prefix>.<zone>"`; that key is migrated once and then deleted.
//! Stored bytes that can not be decoded read as "no token", which forces a
//! full re-fetch instead of failing the sync.

use serde::{Deserialize, Serialize};

use crate::db::KeyValueStore;
use crate::models::{ChangeToken, ZoneIdentity};
use crate::Result;

const ENVELOPE_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct TokenEnvelope {
    version: u32,
    token: ChangeToken,
}

/// Change-token storage over any [`KeyValueStore`]
pub struct ChangeTokenStore<K> {
    store: K,
    prefix: String,
}

impl<K: KeyValueStore> ChangeTokenStore<K> {
    pub fn new(store: K, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    /// Storage key for a zone's token
    #[must_use]
    pub fn key(&self, zone: &ZoneIdentity) -> String {
        format!("{}.{}.{}", self.prefix, zone.name, zone.owner)
    }

    /// Pre-owner storage key for a zone's token
    #[must_use]
    pub fn legacy_key(&self, zone: &ZoneIdentity) -> String {
        format!("{}.{}", self.prefix, zone.name)
    }

    /// Stored token, or `None` when absent or unreadable
    pub async fn get(&self, zone: &ZoneIdentity) -> Result<Option<ChangeToken>> {
        let key = self.key(zone);
        let bytes = self.store.get(&key).await?;
        Ok(bytes.and_then(|bytes| decode(&key, &bytes)))
    }

    /// Store a token; `None` clears it
    pub async fn set(&self, zone: &ZoneIdentity, token: Option<&ChangeToken>) -> Result<()> {
        let key = self.key(zone);
        match token {
            Some(token) => self.store.set(&key, &encode(token)?).await,
            None => self.store.remove(&key).await,
        }
    }

    /// Move a token stored under the legacy key to the current key.
    ///
    /// Returns whether a legacy entry existed. The legacy key is removed even
    /// when its contents are unreadable, and an existing current token is
    /// never overwritten.
    pub async fn migrate_legacy_if_present(&self, zone: &ZoneIdentity) -> Result<bool> {
        let legacy_key = self.legacy_key(zone);
        let Some(bytes) = self.store.get(&legacy_key).await? else {
            return Ok(false);
        };

        if let Some(token) = decode(&legacy_key, &bytes) {
            if self.get(zone).await?.is_none() {
                self.set(zone, Some(&token)).await?;
                tracing::info!(zone = %zone, "Migrated change token from legacy key");
            }
        }
        self.store.remove(&legacy_key).await?;
        Ok(true)
    }

    /// The underlying key-value store
    pub const fn store(&self) -> &K {
        &self.store
    }
}

fn encode(token: &ChangeToken) -> Result<Vec<u8>> {
    let envelope = TokenEnvelope {
        version: ENVELOPE_VERSION,
        token: token.clone(),
    };
    Ok(serde_json::to_vec(&envelope)?)
}

fn decode(key: &str, bytes: &[u8]) -> Option<ChangeToken> {
    match serde_json::from_slice::<TokenEnvelope>(bytes) {
        Ok(envelope) if envelope.version == ENVELOPE_VERSION => Some(envelope.token),
        Ok(envelope) => {
            tracing::warn!(
                key,
                version = envelope.version,
                "Ignoring change token with unsupported version"
            );
            None
        }
        Err(error) => {
            tracing::warn!(key, %error, "Ignoring unreadable change token");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryKeyValueStore;
    use pretty_assertions::assert_eq;

    fn zone() -> ZoneIdentity {
        ZoneIdentity::new("Articles", "owner")
    }

    fn store() -> ChangeTokenStore<MemoryKeyValueStore> {
        ChangeTokenStore::new(MemoryKeyValueStore::new(), "token")
    }

    #[tokio::test]
    async fn set_get_and_clear() {
        let tokens = store();
        let token = ChangeToken::from_bytes(vec![1, 2, 3]);

        tokens.set(&zone(), Some(&token)).await.unwrap();
        assert_eq!(tokens.get(&zone()).await.unwrap(), Some(token));
        assert_eq!(tokens.key(&zone()), "token.Articles.owner");

        tokens.set(&zone(), None).await.unwrap();
        assert_eq!(tokens.get(&zone()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn corrupt_bytes_read_as_absent() {
        let tokens = store();
        tokens
            .store()
            .set("token.Articles.owner", b"\xff\x00garbage")
            .await
            .unwrap();
        assert_eq!(tokens.get(&zone()).await.unwrap(), None);

        tokens
            .store()
            .set(
                "token.Articles.owner",
                br#"{"version":99,"token":[1,2]}"#,
            )
            .await
            .unwrap();
        assert_eq!(tokens.get(&zone()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn legacy_token_moves_to_the_owner_key() {
        let tokens = store();
        let token = ChangeToken::from_bytes(vec![9, 9]);
        tokens
            .store()
            .set("token.Articles", &encode(&token).unwrap())
            .await
            .unwrap();

        assert!(tokens.migrate_legacy_if_present(&zone()).await.unwrap());
        assert_eq!(tokens.get(&zone()).await.unwrap(), Some(token));
        assert_eq!(tokens.store().keys().await, vec!["token.Articles.owner"]);

        assert!(!tokens.migrate_legacy_if_present(&zone()).await.unwrap());
    }

    #[tokio::test]
    async fn corrupt_legacy_token_is_dropped() {
        let tokens = store();
        tokens
            .store()
            .set("token.Articles", b"not json")
            .await
            .unwrap();

        assert!(tokens.migrate_legacy_if_present(&zone()).await.unwrap());
        assert!(tokens.store().keys().await.is_empty());
    }

    #[tokio::test]
    async fn migration_keeps_a_newer_current_token() {
        let tokens = store();
        let current = ChangeToken::from_bytes(vec![2]);
        tokens.set(&zone(), Some(&current)).await.unwrap();
        tokens
            .store()
            .set(
                "token.Articles",
                &encode(&ChangeToken::from_bytes(vec![1])).unwrap(),
            )
            .await
            .unwrap();

        tokens.migrate_legacy_if_present(&zone()).await.unwrap();
        assert_eq!(tokens.get(&zone()).await.unwrap(), Some(current));
    }
}
