//! Feed and container record layout

use crate::models::{Container, Feed, NewFeed, Record, RecordId, Value, ZoneIdentity};

pub const FEED_RECORD_TYPE: &str = "AccountWebFeed";
pub const CONTAINER_RECORD_TYPE: &str = "AccountContainer";

/// Name of the account's root container
pub const ACCOUNT_CONTAINER_NAME: &str = "Account";

/// Field names of feed and container records
pub mod fields {
    pub const URL: &str = "url";
    pub const NAME: &str = "name";
    pub const EDITED_NAME: &str = "editedName";
    pub const HOME_PAGE_URL: &str = "homePageURL";
    pub const CONTAINER_EXTERNAL_IDS: &str = "containerExternalIDs";

    pub const IS_ACCOUNT: &str = "isAccount";
}

/// Record name of a feed: the md5 of its url, so every device derives the same one
pub fn feed_record_name(url: &str) -> String {
    format!("{:x}", md5::compute(url.as_bytes()))
}

pub fn new_feed_record(zone: &ZoneIdentity, feed: &NewFeed, container_external_id: &str) -> Record {
    let id = RecordId::new(feed_record_name(&feed.url), zone.clone());
    let mut record = Record::new(id, FEED_RECORD_TYPE);
    record.set(fields::URL, feed.url.as_str());
    record.set_opt(fields::NAME, feed.name.as_deref());
    record.set_opt(fields::EDITED_NAME, feed.edited_name.as_deref());
    record.set_opt(fields::HOME_PAGE_URL, feed.home_page_url.as_deref());
    set_container_ids(&mut record, vec![container_external_id.to_string()]);
    record
}

pub fn container_record(zone: &ZoneIdentity, container: &Container) -> Record {
    let id = RecordId::new(container.external_id.clone(), zone.clone());
    let mut record = Record::new(id, CONTAINER_RECORD_TYPE);
    record.set(fields::NAME, container.name.as_str());
    record.set(fields::IS_ACCOUNT, if container.is_account { "1" } else { "0" });
    record
}

/// Containers a feed record lists; `None` when the field is missing
pub fn container_ids(record: &Record) -> Option<Vec<String>> {
    record
        .get(fields::CONTAINER_EXTERNAL_IDS)
        .and_then(Value::as_string_list)
        .map(<[String]>::to_vec)
}

pub fn set_container_ids(record: &mut Record, ids: Vec<String>) {
    record.set(fields::CONTAINER_EXTERNAL_IDS, Value::StringList(ids));
}

/// Decode a feed record; `None` unless it has a url and a container list
pub fn feed_from_record(record: &Record) -> Option<Feed> {
    if record.record_type != FEED_RECORD_TYPE {
        return None;
    }
    let url = record.get_str(fields::URL)?;
    let container_external_ids = container_ids(record)?;
    Some(Feed {
        external_id: record.id.name.clone(),
        url: url.to_string(),
        name: record.get_str(fields::NAME).map(str::to_string),
        edited_name: record.get_str(fields::EDITED_NAME).map(str::to_string),
        home_page_url: record.get_str(fields::HOME_PAGE_URL).map(str::to_string),
        container_external_ids,
    })
}

pub fn container_from_record(record: &Record) -> Option<Container> {
    if record.record_type != CONTAINER_RECORD_TYPE {
        return None;
    }
    Some(Container {
        external_id: record.id.name.clone(),
        name: record.get_str(fields::NAME)?.to_string(),
        is_account: record.get_str(fields::IS_ACCOUNT)? == "1",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn zone() -> ZoneIdentity {
        ZoneIdentity::new("Account", "owner")
    }

    #[test]
    fn feed_names_are_stable_per_url() {
        let first = feed_record_name("https://example.com/feed.xml");
        assert_eq!(first, feed_record_name("https://example.com/feed.xml"));
        assert_ne!(first, feed_record_name("https://example.com/other.xml"));
        assert_eq!(first.len(), 32);
    }

    #[test]
    fn new_feed_record_decodes_back() {
        let new_feed = NewFeed {
            name: Some("Example".into()),
            home_page_url: Some("https://example.com".into()),
            ..NewFeed::new("https://example.com/feed.xml")
        };
        let record = new_feed_record(&zone(), &new_feed, "root");

        let feed = feed_from_record(&record).unwrap();
        assert_eq!(feed.external_id, feed_record_name(&new_feed.url));
        assert_eq!(feed.name.as_deref(), Some("Example"));
        assert_eq!(feed.edited_name, None);
        assert_eq!(feed.container_external_ids, vec!["root".to_string()]);
    }

    #[test]
    fn feed_without_containers_is_not_decoded() {
        let mut record = Record::new(RecordId::new("f1", zone()), FEED_RECORD_TYPE);
        record.set(fields::URL, "https://example.com/feed.xml");
        assert!(feed_from_record(&record).is_none());
    }

    #[test]
    fn container_flags_round_trip() {
        let record = container_record(&zone(), &Container::folder("c1", "News"));
        assert_eq!(record.get_str(fields::IS_ACCOUNT), Some("0"));
        assert_eq!(
            container_from_record(&record),
            Some(Container::folder("c1", "News"))
        );
        assert!(feed_from_record(&record).is_none());
    }
}
