//! Article, article status, and pending sync status models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Read/starred state of one article
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleStatus {
    pub read: bool,
    pub starred: bool,
}

/// Author as carried inside an article record
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
}

/// A locally stored article
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub article_id: String,
    /// External id of the feed, used to delete a feed's articles remotely
    pub feed_external_id: Option<String>,
    pub feed_url: String,
    pub unique_id: String,
    pub title: Option<String>,
    pub content_html: Option<String>,
    pub content_text: Option<String>,
    pub url: Option<String>,
    pub external_url: Option<String>,
    pub summary: Option<String>,
    pub image_url: Option<String>,
    pub date_published: Option<DateTime<Utc>>,
    pub date_modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub authors: Vec<Author>,
    #[serde(default)]
    pub status: ArticleStatus,
}

impl Article {
    pub fn new(
        article_id: impl Into<String>,
        feed_url: impl Into<String>,
        unique_id: impl Into<String>,
    ) -> Self {
        Self {
            article_id: article_id.into(),
            feed_url: feed_url.into(),
            unique_id: unique_id.into(),
            ..Self::default()
        }
    }
}

/// Kind of a pending local status change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKey {
    Read,
    Starred,
    /// Tombstone: the article was removed locally
    Deleted,
    /// First write of a status for the article
    New,
}

impl StatusKey {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Starred => "starred",
            Self::Deleted => "deleted",
            Self::New => "new",
        }
    }
}

impl fmt::Display for StatusKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatusKey {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "read" => Ok(Self::Read),
            "starred" => Ok(Self::Starred),
            "deleted" => Ok(Self::Deleted),
            "new" => Ok(Self::New),
            other => Err(Error::InvalidInput(format!("unknown status key: {other}"))),
        }
    }
}

/// One pending local status change waiting to be pushed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub article_id: String,
    pub key: StatusKey,
    pub flag: bool,
    /// Claimed by a running send; reset if the send fails
    #[serde(default)]
    pub selected: bool,
}

impl SyncStatus {
    pub fn new(article_id: impl Into<String>, key: StatusKey, flag: bool) -> Self {
        Self {
            article_id: article_id.into(),
            key,
            flag,
            selected: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_key_round_trips_through_text() {
        for key in [
            StatusKey::Read,
            StatusKey::Starred,
            StatusKey::Deleted,
            StatusKey::New,
        ] {
            assert_eq!(key.as_str().parse::<StatusKey>().unwrap(), key);
        }
        assert!("archived".parse::<StatusKey>().is_err());
    }

    #[test]
    fn author_json_uses_camel_case_and_skips_missing_fields() {
        let author = Author {
            name: Some("Ada".into()),
            avatar_url: Some("https://example.com/a.png".into()),
            ..Author::default()
        };
        let json = serde_json::to_string(&author).unwrap();
        assert_eq!(
            json,
            r#"{"name":"Ada","avatarUrl":"https://example.com/a.png"}"#
        );
    }
}
