//! Applies remote feed and folder changes to the local account

use std::collections::HashMap;

use tokio::sync::Mutex;

use crate::models::{Container, DeletedRecord, Feed, Record};
use crate::zone::ZoneDelegate;
use crate::Result;

use super::records::{
    container_from_record, feed_from_record, CONTAINER_RECORD_TYPE, FEED_RECORD_TYPE,
};

/// Local feeds and folders as seen by the sync delegate
#[allow(async_fn_in_trait)]
pub trait AccountSupport {
    /// Whether a folder, or the account root, with this external id exists
    async fn has_container(&self, external_id: &str) -> Result<bool>;

    async fn has_feed(&self, external_id: &str) -> Result<bool>;

    /// Update the names of a known feed and list it in exactly the known
    /// containers among `feed.container_external_ids`
    async fn update_feed(&self, feed: &Feed) -> Result<()>;

    /// Create the feed if needed and list it in one existing container
    async fn add_feed(&self, feed: &Feed, container_external_id: &str) -> Result<()>;

    /// Take a feed out of every container
    async fn remove_feed(&self, external_id: &str) -> Result<()>;

    /// Rename the folder with this external id, or create it
    async fn upsert_folder(&self, folder: &Container) -> Result<()>;

    async fn remove_folder(&self, external_id: &str) -> Result<()>;
}

/// [`ZoneDelegate`] for the account zone.
///
/// A feed can arrive before the folder it is listed in. Such feeds are held
/// until the folder record shows up, in the same page or a later one.
pub struct AccountZoneDelegate<A> {
    account: A,
    unclaimed: Mutex<HashMap<String, Vec<Feed>>>,
}

impl<A: AccountSupport> AccountZoneDelegate<A> {
    pub fn new(account: A) -> Self {
        Self {
            account,
            unclaimed: Mutex::new(HashMap::new()),
        }
    }

    pub const fn account(&self) -> &A {
        &self.account
    }

    /// Number of feeds still waiting for their folder
    pub async fn unclaimed_count(&self) -> usize {
        self.unclaimed.lock().await.values().map(Vec::len).sum()
    }

    async fn apply_deleted(&self, key: &DeletedRecord) -> Result<()> {
        match key.record_type.as_str() {
            FEED_RECORD_TYPE => self.account.remove_feed(&key.id.name).await,
            CONTAINER_RECORD_TYPE => self.account.remove_folder(&key.id.name).await,
            other => {
                tracing::warn!(record_type = other, record = %key.id, "Unknown deleted record type");
                Ok(())
            }
        }
    }

    async fn apply_changed(&self, record: &Record) -> Result<()> {
        match record.record_type.as_str() {
            FEED_RECORD_TYPE => match feed_from_record(record) {
                Some(feed) => self.apply_feed(&feed).await,
                None => {
                    tracing::warn!(record = %record.id, "Skipping incomplete feed record");
                    Ok(())
                }
            },
            CONTAINER_RECORD_TYPE => match container_from_record(record) {
                Some(container) if !container.is_account => self.apply_folder(&container).await,
                Some(_) => Ok(()),
                None => {
                    tracing::warn!(record = %record.id, "Skipping incomplete container record");
                    Ok(())
                }
            },
            other => {
                tracing::warn!(record_type = other, record = %record.id, "Unknown record type");
                Ok(())
            }
        }
    }

    async fn apply_feed(&self, feed: &Feed) -> Result<()> {
        if self.account.has_feed(&feed.external_id).await? {
            return self.account.update_feed(feed).await;
        }

        for container_external_id in &feed.container_external_ids {
            if self.account.has_container(container_external_id).await? {
                self.account.add_feed(feed, container_external_id).await?;
            } else {
                tracing::debug!(
                    feed = %feed.external_id,
                    container = %container_external_id,
                    "Holding feed until its folder arrives"
                );
                self.unclaimed
                    .lock()
                    .await
                    .entry(container_external_id.clone())
                    .or_default()
                    .push(feed.clone());
            }
        }
        Ok(())
    }

    async fn apply_folder(&self, folder: &Container) -> Result<()> {
        self.account.upsert_folder(folder).await?;

        let waiting = self.unclaimed.lock().await.remove(&folder.external_id);
        for feed in waiting.unwrap_or_default() {
            self.account.add_feed(&feed, &folder.external_id).await?;
        }
        Ok(())
    }
}

impl<A: AccountSupport> ZoneDelegate for AccountZoneDelegate<A> {
    async fn on_zone_changed(&self, changed: Vec<Record>, deleted: Vec<DeletedRecord>) -> Result<()> {
        for key in &deleted {
            self.apply_deleted(key).await?;
        }
        for record in &changed {
            self.apply_changed(record).await?;
        }
        tracing::debug!(
            changed = changed.len(),
            deleted = deleted.len(),
            "Applied account changes"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::memory::MemoryAccountStore;
    use crate::account::records::{container_record, fields, new_feed_record, set_container_ids};
    use crate::models::{NewFeed, RecordId, ZoneIdentity};
    use pretty_assertions::assert_eq;

    fn zone() -> ZoneIdentity {
        ZoneIdentity::new("Account", "owner")
    }

    fn feed_record(url: &str, containers: &[&str]) -> Record {
        let mut record = new_feed_record(&zone(), &NewFeed::new(url), containers[0]);
        set_container_ids(
            &mut record,
            containers.iter().map(|id| (*id).to_string()).collect(),
        );
        record
    }

    fn deleted(record: &Record) -> DeletedRecord {
        DeletedRecord {
            record_type: record.record_type.clone(),
            id: record.id.clone(),
        }
    }

    #[tokio::test]
    async fn feeds_wait_for_folders_that_arrive_later() {
        let store = MemoryAccountStore::new("root");
        let delegate = AccountZoneDelegate::new(store.clone());
        let feed = feed_record("https://example.com/feed.xml", &["root", "news"]);

        delegate
            .on_zone_changed(vec![feed.clone()], Vec::new())
            .await
            .unwrap();
        assert_eq!(store.containers_of(&feed.id.name).await, vec!["root"]);
        assert_eq!(delegate.unclaimed_count().await, 1);

        let folder = container_record(&zone(), &Container::folder("news", "News"));
        delegate
            .on_zone_changed(vec![folder], Vec::new())
            .await
            .unwrap();
        assert_eq!(store.containers_of(&feed.id.name).await, vec!["news", "root"]);
        assert_eq!(delegate.unclaimed_count().await, 0);
    }

    #[tokio::test]
    async fn known_feeds_follow_the_remote_container_list() {
        let store = MemoryAccountStore::new("root");
        store.insert_folder(Container::folder("news", "News")).await;
        let delegate = AccountZoneDelegate::new(store.clone());
        let mut feed = feed_record("https://example.com/feed.xml", &["root"]);
        delegate
            .on_zone_changed(vec![feed.clone()], Vec::new())
            .await
            .unwrap();

        set_container_ids(&mut feed, vec!["news".to_string()]);
        feed.set(fields::EDITED_NAME, "Mine");
        delegate
            .on_zone_changed(vec![feed.clone()], Vec::new())
            .await
            .unwrap();

        assert_eq!(store.containers_of(&feed.id.name).await, vec!["news"]);
        let local = store.feed(&feed.id.name).await.unwrap();
        assert_eq!(local.display_name(), Some("Mine"));
    }

    #[tokio::test]
    async fn deletions_remove_feeds_and_folders() {
        let store = MemoryAccountStore::new("root");
        let delegate = AccountZoneDelegate::new(store.clone());
        let folder = container_record(&zone(), &Container::folder("news", "News"));
        let feed = feed_record("https://example.com/feed.xml", &["news"]);
        delegate
            .on_zone_changed(vec![folder.clone(), feed.clone()], Vec::new())
            .await
            .unwrap();
        assert_eq!(store.containers_of(&feed.id.name).await, vec!["news"]);

        delegate
            .on_zone_changed(Vec::new(), vec![deleted(&feed), deleted(&folder)])
            .await
            .unwrap();

        assert!(store.containers_of(&feed.id.name).await.is_empty());
        assert!(store.folder("news").await.is_none());
    }

    #[tokio::test]
    async fn account_container_and_unknown_types_are_ignored() {
        let store = MemoryAccountStore::new("root");
        let delegate = AccountZoneDelegate::new(store.clone());
        let account = container_record(
            &zone(),
            &Container {
                external_id: "root".into(),
                name: "Account".into(),
                is_account: true,
            },
        );
        let other = Record::new(RecordId::new("x", zone()), "Unexpected");

        delegate
            .on_zone_changed(vec![account, other], Vec::new())
            .await
            .unwrap();

        assert!(store.folder("root").await.is_none());
    }
}
