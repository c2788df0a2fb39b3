//! Applies remote article changes to the local store

use std::collections::{BTreeMap, HashSet};

use crate::db::SyncStatusRepository;
use crate::models::{Article, DeletedRecord, Record, StatusKey, SyncStatus};
use crate::zone::ZoneDelegate;
use crate::Result;

use super::records::{
    article_from_record, article_id_from_name, fields, status_flag, STATUS_RECORD_TYPE,
};

/// What a local update did besides storing the articles
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleChanges {
    /// Articles the local store dropped instead of keeping
    pub deleted_article_ids: Vec<String>,
}

/// Local article store as seen by the sync delegate
#[allow(async_fn_in_trait)]
pub trait ArticleSupport {
    /// Remove articles locally
    async fn delete_articles(&self, article_ids: &HashSet<String>) -> Result<()>;

    /// Set the `read` or `starred` flag of articles
    async fn mark_articles(
        &self,
        article_ids: &HashSet<String>,
        key: StatusKey,
        flag: bool,
    ) -> Result<()>;

    /// Insert or update the articles of one feed
    async fn update_articles(&self, feed_url: &str, articles: Vec<Article>)
        -> Result<ArticleChanges>;
}

/// [`ZoneDelegate`] for the articles zone
pub struct ArticlesZoneDelegate<A, S> {
    articles: A,
    statuses: S,
}

impl<A, S> ArticlesZoneDelegate<A, S>
where
    A: ArticleSupport,
    S: SyncStatusRepository,
{
    pub const fn new(articles: A, statuses: S) -> Self {
        Self { articles, statuses }
    }

    pub const fn articles(&self) -> &A {
        &self.articles
    }

    /// Delete articles whose status record is gone, unless a star is pending
    async fn apply_deletions(
        &self,
        deleted: &[DeletedRecord],
        pending_starred: &HashSet<String>,
    ) -> Result<()> {
        let article_ids = deleted
            .iter()
            .filter(|key| key.record_type == STATUS_RECORD_TYPE)
            .map(|key| article_id_from_name(&key.id.name).to_string())
            .filter(|article_id| !pending_starred.contains(article_id))
            .collect::<HashSet<_>>();

        if article_ids.is_empty() {
            return Ok(());
        }

        let ids = article_ids.iter().cloned().collect::<Vec<_>>();
        self.statuses.delete_selected_for_processing(&ids).await?;
        self.articles.delete_articles(&article_ids).await?;
        tracing::debug!(count = article_ids.len(), "Deleted articles removed remotely");
        Ok(())
    }

    /// Apply remote read/starred flags where no local change is pending
    async fn apply_statuses(
        &self,
        changed: &[Record],
        pending_read: &HashSet<String>,
        pending_starred: &HashSet<String>,
    ) -> Result<()> {
        for (field, key, pending) in [
            (fields::READ, StatusKey::Read, pending_read),
            (fields::STARRED, StatusKey::Starred, pending_starred),
        ] {
            let mut on = HashSet::new();
            let mut off = HashSet::new();
            for record in changed {
                let Some(flag) = status_flag(record, field) else {
                    continue;
                };
                let article_id = article_id_from_name(&record.id.name);
                if pending.contains(article_id) {
                    continue;
                }
                if flag {
                    on.insert(article_id.to_string());
                } else {
                    off.insert(article_id.to_string());
                }
            }

            if !on.is_empty() {
                self.articles.mark_articles(&on, key, true).await?;
            }
            if !off.is_empty() {
                self.articles.mark_articles(&off, key, false).await?;
            }
        }
        Ok(())
    }

    /// Store decoded articles per feed; tombstone the ones the store dropped
    async fn apply_articles(&self, changed: &[Record]) -> Result<()> {
        let mut by_feed: BTreeMap<String, Vec<Article>> = BTreeMap::new();
        for article in changed.iter().filter_map(article_from_record) {
            by_feed
                .entry(article.feed_url.clone())
                .or_default()
                .push(article);
        }

        let mut first_error = None;
        for (feed_url, articles) in by_feed {
            match self.articles.update_articles(&feed_url, articles).await {
                Ok(changes) => {
                    if changes.deleted_article_ids.is_empty() {
                        continue;
                    }
                    let tombstones = changes
                        .deleted_article_ids
                        .iter()
                        .map(|article_id| SyncStatus::new(article_id, StatusKey::Deleted, true))
                        .collect::<Vec<_>>();
                    self.statuses.insert_statuses(&tombstones).await?;
                }
                Err(error) => {
                    tracing::error!(feed = %feed_url, %error, "Failed to update feed articles");
                    first_error.get_or_insert(error);
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}

impl<A, S> ZoneDelegate for ArticlesZoneDelegate<A, S>
where
    A: ArticleSupport,
    S: SyncStatusRepository,
{
    async fn on_zone_changed(
        &self,
        changed: Vec<Record>,
        deleted: Vec<DeletedRecord>,
    ) -> Result<()> {
        let pending_read = self.statuses.pending_read_article_ids().await?;
        let pending_starred = self.statuses.pending_starred_article_ids().await?;

        self.apply_deletions(&deleted, &pending_starred).await?;
        self.apply_statuses(&changed, &pending_read, &pending_starred)
            .await?;
        self.apply_articles(&changed).await
    }
}
