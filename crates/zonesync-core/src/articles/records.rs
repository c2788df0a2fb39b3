//! Article and status record layout

use crate::models::{
    Article, ArticleStatus, Author, Record, RecordId, Reference, Value, ZoneIdentity,
};
use crate::Result;

use super::compression::restore_text;
use super::status_update::ArticleStatusUpdate;

pub const ARTICLE_RECORD_TYPE: &str = "Article";
pub const STATUS_RECORD_TYPE: &str = "ArticleStatus";

const STATUS_PREFIX: &str = "s|";
const ARTICLE_PREFIX: &str = "a|";

/// Field names of article and status records
pub mod fields {
    pub const FEED_EXTERNAL_ID: &str = "feedExternalID";
    pub const READ: &str = "read";
    pub const STARRED: &str = "starred";

    pub const ARTICLE_STATUS: &str = "articleStatus";
    pub const FEED_URL: &str = "feedURL";
    pub const UNIQUE_ID: &str = "uniqueID";
    pub const TITLE: &str = "title";
    pub const CONTENT_HTML: &str = "contentHTML";
    pub const CONTENT_HTML_DATA: &str = "contentHTMLData";
    pub const CONTENT_TEXT: &str = "contentText";
    pub const CONTENT_TEXT_DATA: &str = "contentTextData";
    pub const URL: &str = "url";
    pub const EXTERNAL_URL: &str = "externalURL";
    pub const SUMMARY: &str = "summary";
    pub const IMAGE_URL: &str = "imageURL";
    pub const DATE_PUBLISHED: &str = "datePublished";
    pub const DATE_MODIFIED: &str = "dateModified";
    pub const PARSED_AUTHORS: &str = "parsedAuthors";
}

pub fn status_record_name(article_id: &str) -> String {
    format!("{STATUS_PREFIX}{article_id}")
}

pub fn article_record_name(article_id: &str) -> String {
    format!("{ARTICLE_PREFIX}{article_id}")
}

/// Article id encoded in a status or article record name
pub fn article_id_from_name(name: &str) -> &str {
    name.strip_prefix(STATUS_PREFIX)
        .or_else(|| name.strip_prefix(ARTICLE_PREFIX))
        .unwrap_or(name)
}

fn flag_text(flag: bool) -> &'static str {
    if flag {
        "1"
    } else {
        "0"
    }
}

fn parse_flag(record: &Record, field: &str) -> Option<bool> {
    match record.get_str(field)? {
        "1" => Some(true),
        "0" => Some(false),
        _ => None,
    }
}

fn status_record(
    zone: &ZoneIdentity,
    article_id: &str,
    feed_external_id: Option<&str>,
    status: ArticleStatus,
) -> Record {
    let id = RecordId::new(status_record_name(article_id), zone.clone());
    let mut record = Record::new(id, STATUS_RECORD_TYPE);
    record.set_opt(fields::FEED_EXTERNAL_ID, feed_external_id);
    record.set(fields::READ, flag_text(status.read));
    record.set(fields::STARRED, flag_text(status.starred));
    record
}

/// Status record for a pending update
pub fn status_record_for_update(zone: &ZoneIdentity, update: &ArticleStatusUpdate) -> Record {
    let feed_external_id = update
        .article
        .as_ref()
        .and_then(|article| article.feed_external_id.as_deref());
    status_record(
        zone,
        &update.article_id,
        feed_external_id,
        ArticleStatus {
            read: update.is_read(),
            starred: update.is_starred(),
        },
    )
}

/// Status record carrying an article's own flags
pub fn status_record_for_article(zone: &ZoneIdentity, article: &Article) -> Record {
    status_record(
        zone,
        &article.article_id,
        article.feed_external_id.as_deref(),
        article.status,
    )
}

/// Article record referencing its status record; deleted with it
pub fn article_record(zone: &ZoneIdentity, article: &Article) -> Result<Record> {
    let id = RecordId::new(article_record_name(&article.article_id), zone.clone());
    let mut record = Record::new(id, ARTICLE_RECORD_TYPE);

    record.set(
        fields::ARTICLE_STATUS,
        Value::Reference(Reference {
            target: RecordId::new(status_record_name(&article.article_id), zone.clone()),
            delete_cascade: true,
        }),
    );
    record.set(fields::FEED_URL, article.feed_url.as_str());
    record.set(fields::UNIQUE_ID, article.unique_id.as_str());
    record.set_opt(fields::TITLE, article.title.as_deref());
    record.set_opt(fields::CONTENT_HTML, article.content_html.as_deref());
    record.set_opt(fields::CONTENT_TEXT, article.content_text.as_deref());
    record.set_opt(fields::URL, article.url.as_deref());
    record.set_opt(fields::EXTERNAL_URL, article.external_url.as_deref());
    record.set_opt(fields::SUMMARY, article.summary.as_deref());
    record.set_opt(fields::IMAGE_URL, article.image_url.as_deref());
    record.set_opt(fields::DATE_PUBLISHED, article.date_published);
    record.set_opt(fields::DATE_MODIFIED, article.date_modified);

    if !article.authors.is_empty() {
        let authors = article
            .authors
            .iter()
            .map(serde_json::to_string)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        record.set(fields::PARSED_AUTHORS, Value::StringList(authors));
    }

    Ok(record)
}

/// Read/starred flags of a status record; `None` unless both are present
pub fn status_from_record(record: &Record) -> Option<ArticleStatus> {
    if record.record_type != STATUS_RECORD_TYPE {
        return None;
    }
    Some(ArticleStatus {
        read: parse_flag(record, fields::READ)?,
        starred: parse_flag(record, fields::STARRED)?,
    })
}

/// Flag of a status record, when it is set
pub fn status_flag(record: &Record, field: &str) -> Option<bool> {
    if record.record_type == STATUS_RECORD_TYPE {
        parse_flag(record, field)
    } else {
        None
    }
}

/// Decode an article record (compressed fields included).
///
/// Returns `None` for other record types and for article records missing
/// their unique id or feed URL. Unreadable authors are skipped.
pub fn article_from_record(record: &Record) -> Option<Article> {
    if record.record_type != ARTICLE_RECORD_TYPE {
        return None;
    }

    let unique_id = record.get_str(fields::UNIQUE_ID)?;
    let feed_url = record.get_str(fields::FEED_URL)?;

    let authors = record
        .get(fields::PARSED_AUTHORS)
        .and_then(Value::as_string_list)
        .unwrap_or_default()
        .iter()
        .filter_map(|encoded| serde_json::from_str::<Author>(encoded).ok())
        .collect();

    let text = |field: &str| record.get_str(field).map(str::to_string);
    let date = |field: &str| record.get(field).and_then(Value::as_date);

    Some(Article {
        article_id: article_id_from_name(&record.id.name).to_string(),
        feed_external_id: None,
        feed_url: feed_url.to_string(),
        unique_id: unique_id.to_string(),
        title: text(fields::TITLE),
        content_html: restore_text(record, fields::CONTENT_HTML, fields::CONTENT_HTML_DATA),
        content_text: restore_text(record, fields::CONTENT_TEXT, fields::CONTENT_TEXT_DATA),
        url: text(fields::URL),
        external_url: text(fields::EXTERNAL_URL),
        summary: text(fields::SUMMARY),
        image_url: text(fields::IMAGE_URL),
        date_published: date(fields::DATE_PUBLISHED),
        date_modified: date(fields::DATE_MODIFIED),
        authors,
        status: ArticleStatus::default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::articles::compression::compress_record;
    use crate::models::{StatusKey, SyncStatus};
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn zone() -> ZoneIdentity {
        ZoneIdentity::new("Articles", "owner")
    }

    fn sample_article() -> Article {
        Article {
            feed_external_id: Some("feed-1".into()),
            title: Some("Hello".into()),
            content_html: Some("<p>body</p>".repeat(200)),
            url: Some("https://example.com/hello".into()),
            date_published: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).single(),
            authors: vec![Author {
                name: Some("Ada".into()),
                ..Author::default()
            }],
            status: ArticleStatus {
                read: false,
                starred: true,
            },
            ..Article::new("a1", "https://example.com/feed.xml", "guid-1")
        }
    }

    #[test]
    fn record_names_use_prefixes() {
        assert_eq!(status_record_name("42"), "s|42");
        assert_eq!(article_record_name("42"), "a|42");
        assert_eq!(article_id_from_name("s|42"), "42");
        assert_eq!(article_id_from_name("a|x|y"), "x|y");
        assert_eq!(article_id_from_name("plain"), "plain");
    }

    #[test]
    fn status_flags_round_trip_through_a_record() {
        for (read, starred) in [(false, false), (false, true), (true, false), (true, true)] {
            let article = Article {
                status: ArticleStatus { read, starred },
                ..sample_article()
            };
            let update = ArticleStatusUpdate::new(
                "a1",
                vec![SyncStatus::new("a1", StatusKey::Read, read)],
                Some(article),
            )
            .unwrap();

            let record = status_record_for_update(&zone(), &update);
            assert_eq!(
                status_from_record(&record),
                Some(ArticleStatus { read, starred })
            );
        }
    }

    #[test]
    fn article_record_references_its_status_with_cascade() {
        let record = article_record(&zone(), &sample_article()).unwrap();
        let reference = record
            .get(fields::ARTICLE_STATUS)
            .and_then(Value::as_reference)
            .unwrap();

        assert_eq!(reference.target.name, "s|a1");
        assert!(reference.delete_cascade);
    }

    #[test]
    fn article_survives_compression_and_decoding() {
        let article = sample_article();
        let mut record = article_record(&zone(), &article).unwrap();
        compress_record(&mut record, 512);
        assert!(record.get(fields::CONTENT_HTML).is_none());

        let decoded = article_from_record(&record).unwrap();
        assert_eq!(decoded.article_id, "a1");
        assert_eq!(decoded.content_html, article.content_html);
        assert_eq!(decoded.title, article.title);
        assert_eq!(decoded.date_published, article.date_published);
        assert_eq!(decoded.authors, article.authors);
    }

    #[test]
    fn incomplete_article_records_are_skipped() {
        let mut record = article_record(&zone(), &sample_article()).unwrap();
        record.remove(fields::UNIQUE_ID);
        assert!(article_from_record(&record).is_none());

        let status = status_record_for_article(&zone(), &sample_article());
        assert!(article_from_record(&status).is_none());
    }
}
