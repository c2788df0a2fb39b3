//! Structured remote errors

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::models::RecordId;

/// Error codes a remote record service reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteErrorCode {
    ZoneNotFound,
    UserDeletedZone,
    ChangeTokenExpired,
    LimitExceeded,
    PartialFailure,
    ServerRecordChanged,
    BatchRequestFailed,
    UnknownItem,
    RequestRateLimited,
    ServiceUnavailable,
    ZoneBusy,
    NetworkUnavailable,
    NetworkFailure,
    ServerResponseLost,
    QuotaExceeded,
    NotAuthenticated,
    PermissionFailure,
    InvalidArguments,
    InternalError,
}

impl RemoteErrorCode {
    /// Human-readable explanation of the code
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::ZoneNotFound => "Zone Not Found: the specified record zone does not exist on the server.",
            Self::UserDeletedZone => "User Deleted Zone: the owner has deleted this zone.",
            Self::ChangeTokenExpired => "Change Token Expired: the previous server change token is too old.",
            Self::LimitExceeded => "Limit Exceeded: the request to the server is too large.",
            Self::PartialFailure => "Partial Failure: some items failed, but the operation succeeded overall.",
            Self::ServerRecordChanged => "Server Record Changed: the record was rejected because the version on the server is different.",
            Self::BatchRequestFailed => "Batch Request Failed: the entire batch was rejected.",
            Self::UnknownItem => "Unknown Item: the specified record does not exist.",
            Self::RequestRateLimited => "Request Rate Limited: transfers to and from the server are being rate limited at this time.",
            Self::ServiceUnavailable => "Service Unavailable: please try again.",
            Self::ZoneBusy => "Zone Busy: the server is too busy to handle the zone operation.",
            Self::NetworkUnavailable => "Network Unavailable: the internet connection appears to be offline.",
            Self::NetworkFailure => "Network Failure: the internet connection appears to be offline.",
            Self::ServerResponseLost => "Server Response Lost",
            Self::QuotaExceeded => "Quota Exceeded: saving would exceed your current storage quota.",
            Self::NotAuthenticated => "Not Authenticated: sign in to the sync account to continue.",
            Self::PermissionFailure => "Permission Failure: the account is not allowed to access this data.",
            Self::InvalidArguments => "Invalid Arguments: the specified request contains bad information.",
            Self::InternalError => "Internal Error: a nonrecoverable error was encountered by the server.",
        }
    }

    /// Codes the server may clear on its own after a wait
    #[must_use]
    pub const fn is_transient(self) -> bool {
        matches!(
            self,
            Self::RequestRateLimited
                | Self::ServiceUnavailable
                | Self::ZoneBusy
                | Self::NetworkUnavailable
                | Self::NetworkFailure
                | Self::ServerResponseLost
        )
    }
}

impl fmt::Display for RemoteErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Failure of one record inside a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemError {
    pub id: RecordId,
    pub code: RemoteErrorCode,
    pub retry_after: Option<Duration>,
}

impl ItemError {
    #[must_use]
    pub const fn new(id: RecordId, code: RemoteErrorCode) -> Self {
        Self {
            id,
            code,
            retry_after: None,
        }
    }
}

/// Structured error returned by a remote call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code} {message}")]
pub struct RemoteError {
    pub code: RemoteErrorCode,
    pub message: String,
    /// Server-suggested wait before retrying
    pub retry_after: Option<Duration>,
    /// Per-record failures of a partially failed batch
    pub items: Vec<ItemError>,
}

impl RemoteError {
    pub fn new(code: RemoteErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            retry_after: None,
            items: Vec::new(),
        }
    }

    /// Error with a server-suggested retry delay
    #[must_use]
    pub const fn with_retry_after(mut self, delay: Duration) -> Self {
        self.retry_after = Some(delay);
        self
    }

    /// Partial failure carrying per-record results
    pub fn partial(message: impl Into<String>, items: Vec<ItemError>) -> Self {
        Self {
            code: RemoteErrorCode::PartialFailure,
            message: message.into(),
            retry_after: None,
            items,
        }
    }
}

impl From<RemoteErrorCode> for RemoteError {
    fn from(code: RemoteErrorCode) -> Self {
        Self::new(code, String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_description_and_message() {
        let error = RemoteError::new(RemoteErrorCode::ZoneBusy, "try later");
        let rendered = error.to_string();
        assert!(rendered.starts_with("Zone Busy"));
        assert!(rendered.ends_with("try later"));
    }

    #[test]
    fn transient_codes_are_limited_to_wait_and_retry_cases() {
        assert!(RemoteErrorCode::RequestRateLimited.is_transient());
        assert!(RemoteErrorCode::NetworkFailure.is_transient());
        assert!(!RemoteErrorCode::ZoneNotFound.is_transient());
        assert!(!RemoteErrorCode::QuotaExceeded.is_transient());
    }
}
