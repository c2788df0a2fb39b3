//! Feed and container models of the account zone

use serde::{Deserialize, Serialize};

/// A subscribed feed and the containers it is listed in
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feed {
    /// Remote record name of the feed
    pub external_id: String,
    pub url: String,
    pub name: Option<String>,
    /// Name given by the user; shown instead of `name` when set
    pub edited_name: Option<String>,
    pub home_page_url: Option<String>,
    pub container_external_ids: Vec<String>,
}

impl Feed {
    pub fn new(external_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            url: url.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.edited_name.as_deref().or(self.name.as_deref())
    }
}

/// Fields of a feed that is about to be created remotely
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewFeed {
    pub url: String,
    pub name: Option<String>,
    pub edited_name: Option<String>,
    pub home_page_url: Option<String>,
}

impl NewFeed {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

/// A folder, or the account itself, that feeds are listed in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    pub external_id: String,
    pub name: String,
    /// The account root; there is one per account and it is never a folder
    pub is_account: bool,
}

impl Container {
    pub fn folder(external_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            name: name.into(),
            is_account: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_prefers_the_edited_name() {
        let mut feed = Feed::new("f1", "https://example.com/feed.xml");
        assert_eq!(feed.display_name(), None);

        feed.name = Some("Example".into());
        assert_eq!(feed.display_name(), Some("Example"));

        feed.edited_name = Some("Mine".into());
        assert_eq!(feed.display_name(), Some("Mine"));
    }
}
