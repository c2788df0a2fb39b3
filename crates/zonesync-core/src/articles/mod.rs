//! Article sync over the `Articles` zone
//!
//! Each article is stored remotely as a status record (`s|<id>`) and, while
//! it is unread or starred, an article record (`a|<id>`) that references the
//! status record and is deleted with it.

mod compression;
mod delegate;
mod memory;
mod records;
mod send_status;
mod status_update;
mod zone;

pub use compression::{compress_record, compress_records, restore_text};
pub use delegate::{ArticleChanges, ArticleSupport, ArticlesZoneDelegate};
pub use memory::MemoryArticleStore;
pub use records::{
    article_from_record, article_id_from_name, article_record, article_record_name, fields,
    status_from_record, status_record_for_article, status_record_for_update, status_record_name,
    ARTICLE_RECORD_TYPE, STATUS_RECORD_TYPE,
};
pub use send_status::{ArticleProvider, SendStatusOperation};
pub use status_update::{ArticleStatusUpdate, RecordShape};
pub use zone::{ArticlesZone, ARTICLES_ZONE_NAME};
