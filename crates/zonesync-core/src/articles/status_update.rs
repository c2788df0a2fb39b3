//! Pending status changes of one article, ready to be pushed

use crate::models::{Article, StatusKey, SyncStatus};
use crate::{Error, Result};

/// Which remote records an update produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordShape {
    /// Status record plus full article record
    All,
    /// First write of status and article; sent only if the server lacks them
    New,
    /// Status record only; the article record is removed remotely
    StatusOnly,
    /// Remove the status record (the article record cascades)
    Delete,
}

/// Pending statuses of one article plus the article itself when it still exists
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleStatusUpdate {
    pub article_id: String,
    pub statuses: Vec<SyncStatus>,
    pub article: Option<Article>,
}

impl ArticleStatusUpdate {
    /// Build an update; shapes that carry the article require one.
    pub fn new(
        article_id: impl Into<String>,
        statuses: Vec<SyncStatus>,
        article: Option<Article>,
    ) -> Result<Self> {
        let update = Self {
            article_id: article_id.into(),
            statuses,
            article,
        };

        let shape = update.shape();
        if matches!(shape, RecordShape::All | RecordShape::New) && update.article.is_none() {
            return Err(Error::Contract(format!(
                "status update for {} has shape {shape:?} but no article",
                update.article_id
            )));
        }
        Ok(update)
    }

    /// Record shape for the current flags.
    ///
    /// Computed on every call; a retried send may see different flags than
    /// the first attempt.
    pub fn shape(&self) -> RecordShape {
        if self
            .statuses
            .iter()
            .any(|status| status.key == StatusKey::Deleted)
        {
            return RecordShape::Delete;
        }

        if let [only] = self.statuses.as_slice() {
            if only.key == StatusKey::New {
                return RecordShape::New;
            }
        }

        match &self.article {
            Some(article) if !article.status.read || article.status.starred => RecordShape::All,
            _ => RecordShape::StatusOnly,
        }
    }

    pub fn is_read(&self) -> bool {
        self.article
            .as_ref()
            .map_or(true, |article| article.status.read)
    }

    pub fn is_starred(&self) -> bool {
        self.article
            .as_ref()
            .is_some_and(|article| article.status.starred)
    }
}
