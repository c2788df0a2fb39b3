//! Pushes pending local status changes to the articles zone

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::db::{KeyValueStore, SyncStatusRepository};
use crate::models::{Article, SyncStatus};
use crate::remote::RemoteService;
use crate::retry::RetryScheduler;
use crate::{Error, Result};

use super::status_update::ArticleStatusUpdate;
use super::zone::ArticlesZone;

/// Local article lookup used while sending statuses
#[allow(async_fn_in_trait)]
pub trait ArticleProvider {
    /// Articles with the given ids; unknown ids are left out
    async fn fetch_articles(&self, article_ids: &HashSet<String>) -> Result<Vec<Article>>;

    /// The zone owner deleted the zone; the account must be re-added
    async fn user_deleted_zone(&self, error: &Error);
}

/// One run of draining the pending status table
pub struct SendStatusOperation<'a, R, K, S, P, Q> {
    zone: &'a ArticlesZone<R, K, S>,
    provider: &'a P,
    statuses: &'a Q,
}

impl<'a, R, K, S, P, Q> SendStatusOperation<'a, R, K, S, P, Q>
where
    R: RemoteService,
    K: KeyValueStore,
    S: RetryScheduler,
    P: ArticleProvider,
    Q: SyncStatusRepository,
{
    pub const fn new(zone: &'a ArticlesZone<R, K, S>, provider: &'a P, statuses: &'a Q) -> Self {
        Self {
            zone,
            provider,
            statuses,
        }
    }

    /// Send every pending status; returns how many were sent.
    ///
    /// A failed block keeps its rows pending for the next run.
    pub async fn run(&self) -> Result<usize> {
        let block_size = self.zone.client().config().status_block_size;
        let mut sent = 0usize;

        loop {
            let block = self.statuses.select_for_processing(block_size).await?;
            if block.is_empty() {
                break;
            }

            let count = block.len();
            let article_ids = block
                .iter()
                .map(|status| status.article_id.clone())
                .collect::<HashSet<_>>()
                .into_iter()
                .collect::<Vec<_>>();

            let updates = match self.build_updates(block).await {
                Ok(updates) => updates,
                Err(error) => return Err(self.fail_block(&article_ids, error).await),
            };

            if updates.is_empty() {
                tracing::debug!(count, "No sendable status updates");
                self.statuses
                    .delete_selected_for_processing(&article_ids)
                    .await?;
                break;
            }

            if let Err(error) = self.zone.modify_articles(&updates).await {
                return Err(self.fail_block(&article_ids, error).await);
            }

            self.statuses
                .delete_selected_for_processing(&article_ids)
                .await?;
            sent += count;
            tracing::info!(count, total = sent, "Sent article statuses");
        }

        Ok(sent)
    }

    /// Group statuses per article and pair them with their articles
    async fn build_updates(&self, block: Vec<SyncStatus>) -> Result<Vec<ArticleStatusUpdate>> {
        let mut grouped: BTreeMap<String, Vec<SyncStatus>> = BTreeMap::new();
        for status in block {
            grouped
                .entry(status.article_id.clone())
                .or_default()
                .push(status);
        }

        let ids = grouped.keys().cloned().collect::<HashSet<_>>();
        let mut articles = self
            .provider
            .fetch_articles(&ids)
            .await?
            .into_iter()
            .map(|article| (article.article_id.clone(), article))
            .collect::<HashMap<_, _>>();

        let mut updates = Vec::with_capacity(grouped.len());
        for (article_id, statuses) in grouped {
            let article = articles.remove(&article_id);
            match ArticleStatusUpdate::new(article_id, statuses, article) {
                Ok(update) => updates.push(update),
                Err(Error::Contract(reason)) => {
                    tracing::warn!(%reason, "Dropping unsendable status update");
                }
                Err(error) => return Err(error),
            }
        }
        Ok(updates)
    }

    /// Release a block after a failure and hand back the error to surface
    async fn fail_block(&self, article_ids: &[String], error: Error) -> Error {
        tracing::error!(%error, "Failed to send article statuses");
        if let Err(reset_error) = self
            .statuses
            .reset_selected_for_processing(article_ids)
            .await
        {
            tracing::error!(error = %reset_error, "Failed to release pending statuses");
        }
        if error.is_user_deleted_zone() {
            self.provider.user_deleted_zone(&error).await;
        }
        error
    }
}
