//! Query and modify requests

use serde::{Deserialize, Serialize};

use super::{Record, RecordId, Value};

/// Filter applied to records of one type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    /// Every record of the type
    All,
    /// Records whose string field equals the value
    FieldEquals { field: String, value: String },
    /// Records whose string-list field contains the value
    ListContains { field: String, value: String },
}

impl Predicate {
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Self::All => true,
            Self::FieldEquals { field, value } => record.get_str(field) == Some(value.as_str()),
            Self::ListContains { field, value } => record
                .get(field)
                .and_then(Value::as_string_list)
                .is_some_and(|list| list.contains(value)),
        }
    }
}

/// Record query within a zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub record_type: String,
    pub predicate: Predicate,
}

impl Query {
    pub fn all(record_type: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
            predicate: Predicate::All,
        }
    }

    pub fn field_equals(
        record_type: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            record_type: record_type.into(),
            predicate: Predicate::FieldEquals {
                field: field.into(),
                value: value.into(),
            },
        }
    }

    pub fn list_contains(
        record_type: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            record_type: record_type.into(),
            predicate: Predicate::ListContains {
                field: field.into(),
                value: value.into(),
            },
        }
    }
}

/// How the server treats a saved record that already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SavePolicy {
    /// Overwrite the server copy
    ChangedKeys,
    /// Reject the write when the server copy differs from the client's version
    IfServerRecordUnchanged,
}

/// One batch of saves and deletes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifyRequest {
    pub to_save: Vec<Record>,
    pub to_delete: Vec<RecordId>,
    /// All-or-nothing when true; best effort with per-record results otherwise
    pub atomic: bool,
    pub policy: SavePolicy,
}

impl ModifyRequest {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_save.is_empty() && self.to_delete.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.to_save.len() + self.to_delete.len()
    }
}
