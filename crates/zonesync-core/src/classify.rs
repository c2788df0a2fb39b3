//! Remote error classification
//!
//! [`classify`] maps any [`RemoteError`] to exactly one recovery category.
//! It is total and pure; when several categories could apply the most
//! specific one wins (a retry hint on a missing zone still means "recreate
//! the zone").

use std::time::Duration;

use crate::remote::{ItemError, RemoteError, RemoteErrorCode, DEFAULT_RETRY_AFTER};

/// Recovery category for a remote failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Nothing to recover; the server already holds the requested state
    Success,
    /// Some records of a batch failed for reasons that will not clear on retry
    PartialFailure(Vec<ItemError>),
    ZoneNotFound,
    /// The owner deleted the zone; needs user action
    UserDeletedZone,
    /// Wait, then resend unchanged
    RetryAfter(Duration),
    /// Split into smaller batches
    BatchTooLarge,
    /// The change token is no longer accepted; fetch from scratch
    TokenExpired,
    /// Terminal
    Unknown(RemoteErrorCode),
}

impl ErrorCategory {
    /// Short name for logs
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::PartialFailure(_) => "partial_failure",
            Self::ZoneNotFound => "zone_not_found",
            Self::UserDeletedZone => "user_deleted_zone",
            Self::RetryAfter(_) => "retry_after",
            Self::BatchTooLarge => "batch_too_large",
            Self::TokenExpired => "token_expired",
            Self::Unknown(_) => "unknown",
        }
    }
}

/// Classify a remote error.
#[must_use]
pub fn classify(error: &RemoteError) -> ErrorCategory {
    match error.code {
        RemoteErrorCode::ZoneNotFound => ErrorCategory::ZoneNotFound,
        RemoteErrorCode::UserDeletedZone => ErrorCategory::UserDeletedZone,
        RemoteErrorCode::ChangeTokenExpired => ErrorCategory::TokenExpired,
        RemoteErrorCode::LimitExceeded => ErrorCategory::BatchTooLarge,
        RemoteErrorCode::PartialFailure => classify_items(&error.items),
        RemoteErrorCode::ServerRecordChanged => ErrorCategory::Success,
        code if code.is_transient() => {
            ErrorCategory::RetryAfter(error.retry_after.unwrap_or(DEFAULT_RETRY_AFTER))
        }
        code => ErrorCategory::Unknown(code),
    }
}

fn classify_items(items: &[ItemError]) -> ErrorCategory {
    let any = |code: RemoteErrorCode| items.iter().any(|item| item.code == code);

    if any(RemoteErrorCode::ZoneNotFound) {
        return ErrorCategory::ZoneNotFound;
    }
    if any(RemoteErrorCode::UserDeletedZone) {
        return ErrorCategory::UserDeletedZone;
    }
    if any(RemoteErrorCode::LimitExceeded) {
        return ErrorCategory::BatchTooLarge;
    }

    // A rejected if-unchanged write means the server already holds a version
    // of the record; collateral batch failures around it are not errors.
    let already_matched = any(RemoteErrorCode::ServerRecordChanged)
        && items.iter().all(|item| {
            matches!(
                item.code,
                RemoteErrorCode::ServerRecordChanged | RemoteErrorCode::BatchRequestFailed
            )
        });
    if already_matched {
        return ErrorCategory::Success;
    }

    let transient = items
        .iter()
        .filter(|item| item.code.is_transient())
        .collect::<Vec<_>>();
    if !transient.is_empty() {
        let delay = transient
            .iter()
            .filter_map(|item| item.retry_after)
            .max()
            .unwrap_or(DEFAULT_RETRY_AFTER);
        return ErrorCategory::RetryAfter(delay);
    }

    ErrorCategory::PartialFailure(items.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RecordId, ZoneIdentity};
    use pretty_assertions::assert_eq;

    fn item(name: &str, code: RemoteErrorCode) -> ItemError {
        ItemError::new(
            RecordId::new(name, ZoneIdentity::new("Articles", "owner")),
            code,
        )
    }

    #[test]
    fn zone_not_found_beats_retry_hint() {
        let error = RemoteError::new(RemoteErrorCode::ZoneNotFound, "gone")
            .with_retry_after(Duration::from_secs(30));
        assert_eq!(classify(&error), ErrorCategory::ZoneNotFound);
    }

    #[test]
    fn transient_codes_wait_with_hint_or_default() {
        let hinted = RemoteError::new(RemoteErrorCode::RequestRateLimited, "slow down")
            .with_retry_after(Duration::from_secs(12));
        assert_eq!(
            classify(&hinted),
            ErrorCategory::RetryAfter(Duration::from_secs(12))
        );

        let bare = RemoteError::from(RemoteErrorCode::NetworkFailure);
        assert_eq!(
            classify(&bare),
            ErrorCategory::RetryAfter(DEFAULT_RETRY_AFTER)
        );
    }

    #[test]
    fn top_level_codes_map_to_their_category() {
        let cases = [
            (RemoteErrorCode::UserDeletedZone, ErrorCategory::UserDeletedZone),
            (RemoteErrorCode::ChangeTokenExpired, ErrorCategory::TokenExpired),
            (RemoteErrorCode::LimitExceeded, ErrorCategory::BatchTooLarge),
            (RemoteErrorCode::ServerRecordChanged, ErrorCategory::Success),
            (
                RemoteErrorCode::QuotaExceeded,
                ErrorCategory::Unknown(RemoteErrorCode::QuotaExceeded),
            ),
        ];
        for (code, expected) in cases {
            assert_eq!(classify(&code.into()), expected, "{code:?}");
        }
    }

    #[test]
    fn partial_failure_with_missing_zone_recreates() {
        let error = RemoteError::partial(
            "batch",
            vec![
                item("s|1", RemoteErrorCode::BatchRequestFailed),
                item("s|2", RemoteErrorCode::ZoneNotFound),
            ],
        );
        assert_eq!(classify(&error), ErrorCategory::ZoneNotFound);
    }

    #[test]
    fn partial_failure_of_only_already_matching_records_is_success() {
        let error = RemoteError::partial(
            "batch",
            vec![
                item("s|1", RemoteErrorCode::ServerRecordChanged),
                item("s|2", RemoteErrorCode::BatchRequestFailed),
            ],
        );
        assert_eq!(classify(&error), ErrorCategory::Success);

        let only_collateral =
            RemoteError::partial("batch", vec![item("s|1", RemoteErrorCode::BatchRequestFailed)]);
        assert!(matches!(
            classify(&only_collateral),
            ErrorCategory::PartialFailure(_)
        ));
    }

    #[test]
    fn partial_failure_with_transient_items_waits_for_longest_hint() {
        let mut first = item("s|1", RemoteErrorCode::ZoneBusy);
        first.retry_after = Some(Duration::from_secs(3));
        let mut second = item("s|2", RemoteErrorCode::RequestRateLimited);
        second.retry_after = Some(Duration::from_secs(9));

        let error = RemoteError::partial("batch", vec![first, second]);
        assert_eq!(
            classify(&error),
            ErrorCategory::RetryAfter(Duration::from_secs(9))
        );
    }

    #[test]
    fn other_partial_failures_keep_their_items() {
        let items = vec![item("s|1", RemoteErrorCode::PermissionFailure)];
        let error = RemoteError::partial("batch", items.clone());
        assert_eq!(classify(&error), ErrorCategory::PartialFailure(items));
    }
}
