//! Compression of large article text fields
//!
//! Article bodies above the threshold travel LZ4-compressed (size-prepended)
//! in a sibling `...Data` field; the plain field is removed.

use lz4_flex::{compress_prepend_size, decompress_size_prepended};

use super::records::{fields, ARTICLE_RECORD_TYPE};
use crate::models::{Record, Value};
use crate::{Error, Result};

/// Text fields paired with the field holding their compressed form
const COMPRESSIBLE: [(&str, &str); 2] = [
    (fields::CONTENT_HTML, fields::CONTENT_HTML_DATA),
    (fields::CONTENT_TEXT, fields::CONTENT_TEXT_DATA),
];

/// Compress the large text fields of article records
pub fn compress_records(records: Vec<Record>, threshold: usize) -> Vec<Record> {
    records
        .into_iter()
        .map(|mut record| {
            compress_record(&mut record, threshold);
            record
        })
        .collect()
}

/// Compress the large text fields of one article record in place
pub fn compress_record(record: &mut Record, threshold: usize) {
    if record.record_type != ARTICLE_RECORD_TYPE {
        return;
    }

    for (field, data_field) in COMPRESSIBLE {
        let Some(text) = record.get_str(field) else {
            continue;
        };
        if text.len() < threshold {
            continue;
        }

        let data = compress_prepend_size(text.as_bytes());
        record.remove(field);
        record.set(data_field, Value::Bytes(data));
    }
}

/// Read a text field, preferring its compressed form when present and readable
pub fn restore_text(record: &Record, field: &str, data_field: &str) -> Option<String> {
    if let Some(data) = record.get(data_field).and_then(Value::as_bytes) {
        match decompress(data) {
            Ok(text) => return Some(text),
            Err(error) => tracing::warn!(
                record = %record.id,
                field = data_field,
                %error,
                "Falling back to the uncompressed field"
            ),
        }
    }
    record.get_str(field).map(str::to_string)
}

fn decompress(data: &[u8]) -> Result<String> {
    let bytes =
        decompress_size_prepended(data).map_err(|error| Error::Compression(error.to_string()))?;
    String::from_utf8(bytes).map_err(|error| Error::Compression(error.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RecordId, ZoneIdentity};

    fn article_record(html: &str) -> Record {
        let mut record = Record::new(
            RecordId::new("a|1", ZoneIdentity::new("Articles", "owner")),
            ARTICLE_RECORD_TYPE,
        );
        record.set(fields::CONTENT_HTML, html);
        record.set(fields::CONTENT_TEXT, "short");
        record
    }

    #[test]
    fn large_fields_move_to_compressed_data() {
        let html = "<p>lorem ipsum</p>".repeat(100);
        let mut record = article_record(&html);

        compress_record(&mut record, 512);

        assert!(record.get(fields::CONTENT_HTML).is_none());
        assert!(record.get(fields::CONTENT_HTML_DATA).is_some());
        assert_eq!(record.get_str(fields::CONTENT_TEXT), Some("short"));
        assert_eq!(
            restore_text(&record, fields::CONTENT_HTML, fields::CONTENT_HTML_DATA),
            Some(html)
        );
    }

    #[test]
    fn status_records_are_left_alone() {
        let mut record = article_record(&"x".repeat(1000));
        record.record_type = "ArticleStatus".to_string();

        compress_record(&mut record, 10);
        assert!(record.get(fields::CONTENT_HTML_DATA).is_none());
    }

    #[test]
    fn undecodable_data_falls_back_to_plain_text() {
        let mut record = article_record("plain");
        record.set(fields::CONTENT_HTML_DATA, Value::Bytes(vec![0xff, 0xff, 0xff]));

        assert_eq!(
            restore_text(&record, fields::CONTENT_HTML, fields::CONTENT_HTML_DATA),
            Some("plain".to_string())
        );
    }
}
