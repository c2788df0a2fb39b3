//! The `Articles` zone

use crate::config::SyncConfig;
use crate::db::KeyValueStore;
use crate::models::{Article, ModifyRequest, Query, RecordId, SavePolicy, ZoneIdentity};
use crate::remote::RemoteService;
use crate::retry::{RetryScheduler, TokioScheduler};
use crate::zone::{SaveOutcome, ZoneClient, ZoneDelegate};
use crate::Result;

use super::compression::compress_records;
use super::records::{
    article_record, article_record_name, fields, status_record_for_article,
    status_record_for_update, status_record_name, STATUS_RECORD_TYPE,
};
use super::status_update::{ArticleStatusUpdate, RecordShape};

/// Name of the zone holding article and status records
pub const ARTICLES_ZONE_NAME: &str = "Articles";

/// Article-specific operations over a [`ZoneClient`]
pub struct ArticlesZone<R, K, S = TokioScheduler> {
    client: ZoneClient<R, K, S>,
}

impl<R, K> ArticlesZone<R, K, TokioScheduler>
where
    R: RemoteService,
    K: KeyValueStore,
{
    /// Articles zone of `owner`
    pub fn new(owner: impl Into<String>, remote: R, store: K, config: SyncConfig) -> Self {
        let zone = ZoneIdentity::new(ARTICLES_ZONE_NAME, owner);
        Self {
            client: ZoneClient::new(zone, remote, store, config),
        }
    }
}

impl<R, K, S> ArticlesZone<R, K, S>
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

    /// Push status updates.
    ///
    /// Full and status-only changes plus deletions go out as one atomic
    /// batch. First writes follow in the same session as an if-unchanged save
    /// so that a copy another device already uploaded is kept.
    pub async fn modify_articles(&self, updates: &[ArticleStatusUpdate]) -> Result<()> {
        if updates.is_empty() {
            return Ok(());
        }

        let zone = self.client.zone();
        let mut to_save = Vec::new();
        let mut to_delete = Vec::new();
        let mut new_records = Vec::new();

        for update in updates {
            match update.shape() {
                RecordShape::All => {
                    to_save.push(status_record_for_update(zone, update));
                    if let Some(article) = &update.article {
                        to_save.push(article_record(zone, article)?);
                    }
                }
                RecordShape::New => {
                    new_records.push(status_record_for_update(zone, update));
                    if let Some(article) = &update.article {
                        new_records.push(article_record(zone, article)?);
                    }
                }
                RecordShape::StatusOnly => {
                    to_save.push(status_record_for_update(zone, update));
                    to_delete.push(RecordId::new(
                        article_record_name(&update.article_id),
                        zone.clone(),
                    ));
                }
                RecordShape::Delete => {
                    to_delete.push(RecordId::new(
                        status_record_name(&update.article_id),
                        zone.clone(),
                    ));
                }
            }
        }

        let threshold = self.client.config().compression_threshold;
        tracing::debug!(
            zone = %zone,
            saves = to_save.len(),
            deletes = to_delete.len(),
            new = new_records.len(),
            "Sending article changes"
        );

        let outcome = self
            .client
            .modify_then_save_new(
                ModifyRequest {
                    to_save: compress_records(to_save, threshold),
                    to_delete,
                    atomic: true,
                    policy: SavePolicy::ChangedKeys,
                },
                compress_records(new_records, threshold),
            )
            .await?;
        if outcome == SaveOutcome::AlreadyMatched {
            tracing::debug!(zone = %zone, "New articles were already uploaded");
        }

        Ok(())
    }

    /// Upload new articles that are unread or starred; the rest stay local.
    pub async fn save_new_articles(&self, articles: &[Article]) -> Result<()> {
        let zone = self.client.zone();
        let mut records = Vec::new();
        for article in articles
            .iter()
            .filter(|article| !article.status.read || article.status.starred)
        {
            records.push(status_record_for_article(zone, article));
            records.push(article_record(zone, article)?);
        }

        if records.is_empty() {
            return Ok(());
        }
        let records = compress_records(records, self.client.config().compression_threshold);
        self.client.save(records, false).await
    }

    /// Delete the remote records of every article of a feed.
    pub async fn delete_articles(&self, feed_external_id: &str) -> Result<usize> {
        let query = Query::field_equals(
            STATUS_RECORD_TYPE,
            fields::FEED_EXTERNAL_ID,
            feed_external_id,
        );
        self.client.delete_matching(query).await
    }

    /// Pull remote article changes into `delegate`.
    pub async fn refresh_articles<D: ZoneDelegate>(&self, delegate: &D) -> Result<()> {
        self.client.fetch_incremental_changes(delegate).await
    }
}
