//! Remote record service boundary
//!
//! The zone client talks to any zone/record/change-token store through
//! [`RemoteService`]. Responses are a success value or a structured
//! [`RemoteError`]; batch modifies report per-record failures through
//! [`RemoteError::items`].

mod error;
mod memory;

pub use error::{ItemError, RemoteError, RemoteErrorCode};
pub use memory::{MemoryRemote, MemoryRemoteConfig, RemoteOperation};

use std::time::Duration;

use crate::models::{
    ChangeToken, Cursor, DeletedRecord, ModifyRequest, Query, Record, RecordId, Subscription,
    ZoneIdentity, ZoneInfo,
};

/// Result of a single remote call
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Where a query page starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryStart {
    /// First page of a new query
    Query(Query),
    /// Continuation of an earlier page
    Cursor(Cursor),
}

/// One query page request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub zone: ZoneIdentity,
    pub start: QueryStart,
    /// Restrict returned fields; `None` returns every field
    pub desired_fields: Option<Vec<String>>,
}

/// One page of query results
#[derive(Debug, Clone, Default)]
pub struct QueryPage {
    pub records: Vec<Record>,
    /// Records that matched but could not be returned
    pub record_errors: Vec<ItemError>,
    /// Present when more pages follow
    pub cursor: Option<Cursor>,
}

/// Successful modify response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModifyResponse {
    pub saved: Vec<Record>,
    pub deleted: Vec<RecordId>,
}

/// One page of zone changes
#[derive(Debug, Clone)]
pub struct ChangePage {
    pub changed: Vec<Record>,
    pub deleted: Vec<DeletedRecord>,
    /// Token covering everything up to and including this page
    pub token: ChangeToken,
    pub more_coming: bool,
}

/// Operations a zone/record/change-token store must offer
#[allow(async_fn_in_trait)]
pub trait RemoteService {
    /// Fetch zone metadata; `Ok(None)` when the service reports no such zone
    async fn fetch_zone(&self, zone: &ZoneIdentity) -> RemoteResult<Option<ZoneInfo>>;

    /// Create the zone (idempotent when it already exists)
    async fn create_zone(&self, zone: &ZoneIdentity) -> RemoteResult<ZoneInfo>;

    /// Fetch one query page
    async fn query(&self, request: &QueryRequest) -> RemoteResult<QueryPage>;

    /// Fetch a single record by id
    async fn fetch_record(&self, id: &RecordId) -> RemoteResult<Record>;

    /// Save and delete records in one batch
    async fn modify_records(
        &self,
        zone: &ZoneIdentity,
        request: &ModifyRequest,
    ) -> RemoteResult<ModifyResponse>;

    /// Create or replace a change subscription
    async fn save_subscription(&self, subscription: &Subscription) -> RemoteResult<Subscription>;

    /// Remove a change subscription
    async fn delete_subscription(&self, subscription_id: &str) -> RemoteResult<()>;

    /// Fetch the next page of changes since `since` (`None` fetches from the start)
    async fn fetch_zone_changes(
        &self,
        zone: &ZoneIdentity,
        since: Option<&ChangeToken>,
    ) -> RemoteResult<ChangePage>;
}

/// Default wait when the server asks for a retry without a hint
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(5);

impl<R: RemoteService> RemoteService for std::sync::Arc<R> {
    async fn fetch_zone(&self, zone: &ZoneIdentity) -> RemoteResult<Option<ZoneInfo>> {
        self.as_ref().fetch_zone(zone).await
    }

    async fn create_zone(&self, zone: &ZoneIdentity) -> RemoteResult<ZoneInfo> {
        self.as_ref().create_zone(zone).await
    }

    async fn query(&self, request: &QueryRequest) -> RemoteResult<QueryPage> {
        self.as_ref().query(request).await
    }

    async fn fetch_record(&self, id: &RecordId) -> RemoteResult<Record> {
        self.as_ref().fetch_record(id).await
    }

    async fn modify_records(
        &self,
        zone: &ZoneIdentity,
        request: &ModifyRequest,
    ) -> RemoteResult<ModifyResponse> {
        self.as_ref().modify_records(zone, request).await
    }

    async fn save_subscription(&self, subscription: &Subscription) -> RemoteResult<Subscription> {
        self.as_ref().save_subscription(subscription).await
    }

    async fn delete_subscription(&self, subscription_id: &str) -> RemoteResult<()> {
        self.as_ref().delete_subscription(subscription_id).await
    }

    async fn fetch_zone_changes(
        &self,
        zone: &ZoneIdentity,
        since: Option<&ChangeToken>,
    ) -> RemoteResult<ChangePage> {
        self.as_ref().fetch_zone_changes(zone, since).await
    }
}
