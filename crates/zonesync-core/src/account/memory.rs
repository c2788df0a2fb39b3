//! In-memory local account

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::models::{Container, Feed};
use crate::Result;

use super::delegate::AccountSupport;

#[derive(Debug, Default)]
struct AccountState {
    folders: BTreeMap<String, Container>,
    feeds: BTreeMap<String, Feed>,
    /// Containers each feed is listed in, by feed external id
    memberships: BTreeMap<String, BTreeSet<String>>,
}

/// Feeds and folders kept in memory, shared between clones
#[derive(Debug, Clone)]
pub struct MemoryAccountStore {
    account_external_id: Arc<str>,
    state: Arc<Mutex<AccountState>>,
}

impl MemoryAccountStore {
    /// Empty account whose root container has `account_external_id`
    pub fn new(account_external_id: &str) -> Self {
        Self {
            account_external_id: Arc::from(account_external_id),
            state: Arc::default(),
        }
    }

    pub async fn insert_folder(&self, folder: Container) {
        self.state
            .lock()
            .await
            .folders
            .insert(folder.external_id.clone(), folder);
    }

    pub async fn folder(&self, external_id: &str) -> Option<Container> {
        self.state.lock().await.folders.get(external_id).cloned()
    }

    pub async fn feed(&self, external_id: &str) -> Option<Feed> {
        self.state.lock().await.feeds.get(external_id).cloned()
    }

    /// Containers a feed is listed in, ordered by id
    pub async fn containers_of(&self, feed_external_id: &str) -> Vec<String> {
        self.state
            .lock()
            .await
            .memberships
            .get(feed_external_id)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn is_container(&self, state: &AccountState, external_id: &str) -> bool {
        external_id == &*self.account_external_id || state.folders.contains_key(external_id)
    }
}

impl AccountSupport for MemoryAccountStore {
    async fn has_container(&self, external_id: &str) -> Result<bool> {
        let state = self.state.lock().await;
        Ok(self.is_container(&state, external_id))
    }

    async fn has_feed(&self, external_id: &str) -> Result<bool> {
        Ok(self.state.lock().await.feeds.contains_key(external_id))
    }

    async fn update_feed(&self, feed: &Feed) -> Result<()> {
        let mut state = self.state.lock().await;
        let known = feed
            .container_external_ids
            .iter()
            .filter(|id| self.is_container(&state, id))
            .cloned()
            .collect::<BTreeSet<_>>();
        state
            .memberships
            .insert(feed.external_id.clone(), known);
        state.feeds.insert(feed.external_id.clone(), feed.clone());
        Ok(())
    }

    async fn add_feed(&self, feed: &Feed, container_external_id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state
            .feeds
            .entry(feed.external_id.clone())
            .or_insert_with(|| feed.clone());
        state
            .memberships
            .entry(feed.external_id.clone())
            .or_default()
            .insert(container_external_id.to_string());
        Ok(())
    }

    async fn remove_feed(&self, external_id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.memberships.remove(external_id);
        state.feeds.remove(external_id);
        Ok(())
    }

    async fn upsert_folder(&self, folder: &Container) -> Result<()> {
        let mut state = self.state.lock().await;
        state
            .folders
            .entry(folder.external_id.clone())
            .and_modify(|existing| existing.name.clone_from(&folder.name))
            .or_insert_with(|| folder.clone());
        Ok(())
    }

    async fn remove_folder(&self, external_id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.folders.remove(external_id);
        for containers in state.memberships.values_mut() {
            containers.remove(external_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn removing_a_folder_unlists_its_feeds() {
        let store = MemoryAccountStore::new("root");
        store.insert_folder(Container::folder("news", "News")).await;
        let feed = Feed {
            container_external_ids: vec!["root".into(), "news".into()],
            ..Feed::new("f1", "https://example.com/feed.xml")
        };
        store.update_feed(&feed).await.unwrap();
        assert_eq!(store.containers_of("f1").await, vec!["news", "root"]);

        store.remove_folder("news").await.unwrap();

        assert_eq!(store.containers_of("f1").await, vec!["root"]);
        assert!(store.has_feed("f1").await.unwrap());
    }

    #[tokio::test]
    async fn upserting_a_folder_renames_it() {
        let store = MemoryAccountStore::new("root");
        store
            .upsert_folder(&Container::folder("news", "News"))
            .await
            .unwrap();
        store
            .upsert_folder(&Container::folder("news", "Headlines"))
            .await
            .unwrap();

        assert_eq!(store.folder("news").await.unwrap().name, "Headlines");
        assert!(store.has_container("root").await.unwrap());
        assert!(!store.has_container("other").await.unwrap());
    }
}
