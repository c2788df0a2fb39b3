//! Feed and folder sync over the `Account` zone
//!
//! Feeds are stored under the md5 of their url and list the external ids of
//! the containers (folders, or the account root) they belong to.

mod delegate;
mod memory;
mod records;
mod zone;

pub use delegate::{AccountSupport, AccountZoneDelegate};
pub use memory::MemoryAccountStore;
pub use records::{
    container_from_record, container_record, feed_from_record, feed_record_name, fields,
    new_feed_record, ACCOUNT_CONTAINER_NAME, CONTAINER_RECORD_TYPE, FEED_RECORD_TYPE,
};
pub use zone::{AccountZone, ACCOUNT_ZONE_NAME};
