//! Data models for zonesync

mod article;
mod feed;
mod record;
mod request;
mod zone;

pub use article::{Article, ArticleStatus, Author, StatusKey, SyncStatus};
pub use feed::{Container, Feed, NewFeed};
pub use record::{Cursor, DeletedRecord, Record, RecordId, Reference, Value};
pub use request::{ModifyRequest, Predicate, Query, SavePolicy};
pub use zone::{ChangeToken, Subscription, ZoneIdentity, ZoneInfo, ZoneNotification};
