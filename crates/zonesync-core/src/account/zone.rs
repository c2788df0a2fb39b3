//! The `Account` zone

use crate::config::SyncConfig;
use crate::db::KeyValueStore;
use crate::models::{Container, NewFeed, Query, RecordId, ZoneIdentity};
use crate::remote::{RemoteErrorCode, RemoteService};
use crate::retry::{RetryScheduler, TokioScheduler};
use crate::zone::{ZoneClient, ZoneDelegate};
use crate::{Error, Result};

use super::records::{
    container_ids, container_record, fields, new_feed_record, set_container_ids,
    ACCOUNT_CONTAINER_NAME, CONTAINER_RECORD_TYPE, FEED_RECORD_TYPE,
};

/// Name of the zone holding feed and container records
pub const ACCOUNT_ZONE_NAME: &str = "Account";

/// Feed and folder operations over a [`ZoneClient`]
pub struct AccountZone<R, K, S = TokioScheduler> {
    client: ZoneClient<R, K, S>,
}

impl<R, K> AccountZone<R, K, TokioScheduler>
where
    R: RemoteService,
    K: KeyValueStore,
{
    /// Account zone of `owner`
    pub fn new(owner: impl Into<String>, remote: R, store: K, config: SyncConfig) -> Self {
        let zone = ZoneIdentity::new(ACCOUNT_ZONE_NAME, owner);
        Self {
            client: ZoneClient::new(zone, remote, store, config),
        }
    }
}

impl<R, K, S> AccountZone<R, K, S>
where
    R: RemoteService,
    K: KeyValueStore,
    S: RetryScheduler,
{
    /// Wrap an existing client
    pub const fn from_client(client: ZoneClient<R, K, S>) -> Self {
        Self { client }
    }

    pub const fn client(&self) -> &ZoneClient<R, K, S> {
        &self.client
    }

    /// Create a feed listed in one container; returns its external id.
    pub async fn create_feed(&self, feed: &NewFeed, container_external_id: &str) -> Result<String> {
        let record = new_feed_record(self.client.zone(), feed, container_external_id);
        let external_id = record.id.name.clone();
        self.client.save(vec![record], true).await?;
        tracing::info!(feed = %external_id, url = %feed.url, "Created feed record");
        Ok(external_id)
    }

    /// Set or clear the user-given name of a feed.
    pub async fn rename_feed(&self, external_id: &str, edited_name: Option<&str>) -> Result<()> {
        let mut record = self.client.fetch_record(external_id).await?;
        match edited_name {
            Some(name) => record.set(fields::EDITED_NAME, name),
            None => {
                record.remove(fields::EDITED_NAME);
            }
        }
        self.client.save(vec![record], true).await
    }

    /// Take a feed out of one container.
    ///
    /// A feed left in no container is deleted. Returns whether the feed is
    /// gone, which includes a feed the server no longer knows.
    pub async fn remove_feed(&self, external_id: &str, container_external_id: &str) -> Result<bool> {
        let mut record = match self.client.fetch_record(external_id).await {
            Ok(record) => record,
            Err(error) if is_unknown_item(&error) => return Ok(true),
            Err(error) => return Err(error),
        };
        let Some(mut ids) = container_ids(&record) else {
            return Ok(false);
        };

        ids.retain(|id| id != container_external_id);
        if ids.is_empty() {
            let id = RecordId::new(external_id, self.client.zone().clone());
            self.client.delete(vec![id]).await?;
            return Ok(true);
        }

        set_container_ids(&mut record, ids);
        self.client.save(vec![record], true).await?;
        Ok(false)
    }

    /// Move a feed from one container to another.
    pub async fn move_feed(&self, external_id: &str, from: &str, to: &str) -> Result<()> {
        self.update_containers(external_id, |ids| {
            ids.retain(|id| id != from);
            if !ids.iter().any(|id| id == to) {
                ids.push(to.to_string());
            }
        })
        .await
    }

    /// List a feed in one more container.
    pub async fn add_feed(&self, external_id: &str, container_external_id: &str) -> Result<()> {
        self.update_containers(external_id, |ids| {
            if !ids.iter().any(|id| id == container_external_id) {
                ids.push(container_external_id.to_string());
            }
        })
        .await
    }

    /// External ids of the feeds listed in a folder.
    pub async fn find_feed_external_ids(&self, folder_external_id: &str) -> Result<Vec<String>> {
        let query = Query::list_contains(
            FEED_RECORD_TYPE,
            fields::CONTAINER_EXTERNAL_IDS,
            folder_external_id,
        );
        let records = self.client.query(query, Some(Vec::new())).await?;
        Ok(records.into_iter().map(|record| record.id.name).collect())
    }

    /// External id of the account's root container, created on first use.
    pub async fn find_or_create_account(&self) -> Result<String> {
        let query = Query::field_equals(CONTAINER_RECORD_TYPE, fields::IS_ACCOUNT, "1");
        let records = self.client.query(query, Some(Vec::new())).await?;
        if let Some(record) = records.into_iter().next() {
            return Ok(record.id.name);
        }

        tracing::info!(zone = %self.client.zone(), "No account container yet, creating one");
        self.create_container(ACCOUNT_CONTAINER_NAME, true).await
    }

    /// Create a folder; returns its external id.
    pub async fn create_folder(&self, name: &str) -> Result<String> {
        self.create_container(name, false).await
    }

    pub async fn rename_folder(&self, external_id: &str, name: &str) -> Result<()> {
        let mut record = self.client.fetch_record(external_id).await?;
        record.set(fields::NAME, name);
        self.client.save(vec![record], true).await
    }

    /// Delete a folder record. Feeds listing it are left alone.
    pub async fn remove_folder(&self, external_id: &str) -> Result<()> {
        let id = RecordId::new(external_id, self.client.zone().clone());
        self.client.delete(vec![id]).await
    }

    /// Pull remote feed and folder changes into `delegate`.
    pub async fn refresh<D: ZoneDelegate>(&self, delegate: &D) -> Result<()> {
        self.client.fetch_incremental_changes(delegate).await
    }

    async fn create_container(&self, name: &str, is_account: bool) -> Result<String> {
        let container = Container {
            external_id: self.client.generate_record_id().name,
            name: name.to_string(),
            is_account,
        };
        let record = container_record(self.client.zone(), &container);
        self.client.save(vec![record], true).await?;
        Ok(container.external_id)
    }

    /// Rewrite the container list of a feed; feeds without one are left alone
    async fn update_containers(
        &self,
        external_id: &str,
        update: impl FnOnce(&mut Vec<String>),
    ) -> Result<()> {
        let mut record = self.client.fetch_record(external_id).await?;
        let Some(mut ids) = container_ids(&record) else {
            tracing::warn!(feed = %external_id, "Feed record has no container list");
            return Ok(());
        };
        update(&mut ids);
        set_container_ids(&mut record, ids);
        self.client.save(vec![record], true).await
    }
}

fn is_unknown_item(error: &Error) -> bool {
    matches!(error, Error::Remote(remote) if remote.code == RemoteErrorCode::UnknownItem)
}
