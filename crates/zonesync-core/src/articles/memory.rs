//! In-memory local article store

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::models::{Article, ArticleStatus, StatusKey};
use crate::{Error, Result};

use super::delegate::{ArticleChanges, ArticleSupport};
use super::send_status::ArticleProvider;

#[derive(Debug, Default)]
struct StoreState {
    articles: BTreeMap<String, Article>,
    /// Statuses live apart from articles; a status may arrive first
    statuses: HashMap<String, ArticleStatus>,
    retired: HashSet<String>,
    failing_feeds: HashSet<String>,
    user_deleted_notices: usize,
}

impl StoreState {
    fn merged(&self, article: &Article) -> Article {
        let mut article = article.clone();
        article.status = self
            .statuses
            .get(&article.article_id)
            .copied()
            .unwrap_or_default();
        article
    }
}

/// Article store kept in memory, shared between clones
#[derive(Debug, Clone, Default)]
pub struct MemoryArticleStore {
    state: Arc<Mutex<StoreState>>,
}

impl MemoryArticleStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store articles together with their statuses
    pub async fn insert(&self, articles: Vec<Article>) {
        let mut state = self.state.lock().await;
        for article in articles {
            state
                .statuses
                .insert(article.article_id.clone(), article.status);
            state.articles.insert(article.article_id.clone(), article);
        }
    }

    pub async fn get(&self, article_id: &str) -> Option<Article> {
        let state = self.state.lock().await;
        state
            .articles
            .get(article_id)
            .map(|article| state.merged(article))
    }

    /// Every stored article, ordered by id
    pub async fn all(&self) -> Vec<Article> {
        let state = self.state.lock().await;
        state
            .articles
            .values()
            .map(|article| state.merged(article))
            .collect()
    }

    /// Refuse to keep this article when it arrives; it is reported deleted instead
    pub async fn retire(&self, article_id: &str) {
        self.state
            .lock()
            .await
            .retired
            .insert(article_id.to_string());
    }

    /// Make updates of this feed fail
    pub async fn fail_feed(&self, feed_url: &str) {
        self.state
            .lock()
            .await
            .failing_feeds
            .insert(feed_url.to_string());
    }

    /// How often a user-deleted zone was reported
    pub async fn user_deleted_notices(&self) -> usize {
        self.state.lock().await.user_deleted_notices
    }
}

impl ArticleSupport for MemoryArticleStore {
    async fn delete_articles(&self, article_ids: &HashSet<String>) -> Result<()> {
        let mut state = self.state.lock().await;
        for article_id in article_ids {
            state.articles.remove(article_id);
            state.statuses.remove(article_id);
        }
        Ok(())
    }

    async fn mark_articles(
        &self,
        article_ids: &HashSet<String>,
        key: StatusKey,
        flag: bool,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        for article_id in article_ids {
            let status = state.statuses.entry(article_id.clone()).or_default();
            match key {
                StatusKey::Read => status.read = flag,
                StatusKey::Starred => status.starred = flag,
                StatusKey::Deleted | StatusKey::New => {
                    return Err(Error::Contract(format!("articles can not be marked {key}")));
                }
            }
        }
        Ok(())
    }

    async fn update_articles(
        &self,
        feed_url: &str,
        articles: Vec<Article>,
    ) -> Result<ArticleChanges> {
        let mut state = self.state.lock().await;
        if state.failing_feeds.contains(feed_url) {
            return Err(Error::Database(format!("feed {feed_url} can not be updated")));
        }

        let mut changes = ArticleChanges::default();
        for article in articles {
            if state.retired.contains(&article.article_id) {
                changes.deleted_article_ids.push(article.article_id);
                continue;
            }
            state.articles.insert(article.article_id.clone(), article);
        }
        Ok(changes)
    }
}

impl ArticleProvider for MemoryArticleStore {
    async fn fetch_articles(&self, article_ids: &HashSet<String>) -> Result<Vec<Article>> {
        let state = self.state.lock().await;
        Ok(article_ids
            .iter()
            .filter_map(|article_id| state.articles.get(article_id))
            .map(|article| state.merged(article))
            .collect())
    }

    async fn user_deleted_zone(&self, error: &Error) {
        tracing::error!(%error, "Articles zone was deleted by its owner");
        self.state.lock().await.user_deleted_notices += 1;
    }
}
