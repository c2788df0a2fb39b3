//! In-memory remote record service
//!
//! Behaves like an eventually-consistent zone store for tests and local
//! simulation: zones can vanish (or be deleted by their owner), batches
//! above a ceiling are rejected, change tokens expire when a zone is
//! recreated or its history purged, and any operation can be told to fail.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::{
    ChangePage, ItemError, ModifyResponse, QueryPage, QueryRequest, QueryStart, RemoteError,
    RemoteErrorCode, RemoteResult, RemoteService,
};
use crate::models::{
    ChangeToken, Cursor, DeletedRecord, ModifyRequest, Query, Record, RecordId, SavePolicy,
    Subscription, Value, ZoneIdentity, ZoneInfo,
};

/// Remote operations, used for fault injection and call counting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOperation {
    FetchZone,
    CreateZone,
    Query,
    FetchRecord,
    ModifyRecords,
    SaveSubscription,
    DeleteSubscription,
    FetchZoneChanges,
}

/// Limits of the simulated service
#[derive(Debug, Clone)]
pub struct MemoryRemoteConfig {
    /// Largest accepted modify batch (saves + deletes)
    pub max_batch_size: usize,
    pub query_page_size: usize,
    /// Log entries covered by one change page
    pub change_page_size: usize,
}

impl Default for MemoryRemoteConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 400,
            query_page_size: 100,
            change_page_size: 100,
        }
    }
}

/// In-memory [`RemoteService`]
pub struct MemoryRemote {
    config: MemoryRemoteConfig,
    state: Mutex<RemoteState>,
}

#[derive(Default)]
struct RemoteState {
    zones: HashMap<ZoneIdentity, ZoneState>,
    user_deleted: HashSet<ZoneIdentity>,
    subscriptions: BTreeMap<String, Subscription>,
    faults: VecDeque<Fault>,
    calls: HashMap<RemoteOperation, usize>,
    generation: u64,
    next_tag: u64,
}

struct Fault {
    operation: RemoteOperation,
    /// Matching calls to let through before failing
    skip: usize,
    error: RemoteError,
}

struct ZoneState {
    info: ZoneInfo,
    generation: u64,
    records: BTreeMap<String, Record>,
    log: Vec<ChangeEntry>,
}

enum ChangeEntry {
    Saved(String),
    Deleted { name: String, record_type: String },
}

#[derive(Serialize, Deserialize)]
struct CursorState {
    query: Query,
    offset: usize,
}

impl MemoryRemote {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MemoryRemoteConfig::default())
    }

    #[must_use]
    pub fn with_config(config: MemoryRemoteConfig) -> Self {
        Self {
            config,
            state: Mutex::new(RemoteState::default()),
        }
    }

    /// Make the next call of `operation` fail with `error`
    pub async fn inject(&self, operation: RemoteOperation, error: RemoteError) {
        self.inject_after(operation, 0, error).await;
    }

    /// Let `skip` calls of `operation` through, then fail the next one with `error`
    pub async fn inject_after(&self, operation: RemoteOperation, skip: usize, error: RemoteError) {
        self.state.lock().await.faults.push_back(Fault {
            operation,
            skip,
            error,
        });
    }

    /// Number of times `operation` was called
    pub async fn calls(&self, operation: RemoteOperation) -> usize {
        self.state
            .lock()
            .await
            .calls
            .get(&operation)
            .copied()
            .unwrap_or(0)
    }

    /// Remove a zone as the server would when purging it
    pub async fn delete_zone(&self, zone: &ZoneIdentity) {
        self.state.lock().await.zones.remove(zone);
    }

    /// Remove a zone as its owner would; operations report a user-deleted zone until recreated
    pub async fn delete_zone_by_owner(&self, zone: &ZoneIdentity) {
        let mut state = self.state.lock().await;
        state.zones.remove(zone);
        state.user_deleted.insert(zone.clone());
    }

    /// Expire every change token issued so far for the zone
    pub async fn expire_change_tokens(&self, zone: &ZoneIdentity) {
        let mut state = self.state.lock().await;
        state.generation += 1;
        let generation = state.generation;
        if let Some(zone_state) = state.zones.get_mut(zone) {
            zone_state.generation = generation;
        }
    }

    /// Snapshot of the records currently stored in a zone
    pub async fn records(&self, zone: &ZoneIdentity) -> Vec<Record> {
        self.state
            .lock()
            .await
            .zones
            .get(zone)
            .map(|zone_state| zone_state.records.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Single stored record, if present
    pub async fn record(&self, id: &RecordId) -> Option<Record> {
        self.state
            .lock()
            .await
            .zones
            .get(&id.zone)
            .and_then(|zone_state| zone_state.records.get(&id.name).cloned())
    }

    /// Write records as another client would, creating the zone when needed
    pub async fn put_records(&self, zone: &ZoneIdentity, records: Vec<Record>) {
        let mut state = self.state.lock().await;
        state.ensure_zone(zone);
        for record in records {
            state.save_record(zone, record);
        }
    }

    pub async fn subscriptions(&self) -> Vec<Subscription> {
        self.state
            .lock()
            .await
            .subscriptions
            .values()
            .cloned()
            .collect()
    }
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteState {
    fn begin(&mut self, operation: RemoteOperation) -> RemoteResult<()> {
        *self.calls.entry(operation).or_insert(0) += 1;
        let Some(position) = self
            .faults
            .iter()
            .position(|fault| fault.operation == operation)
        else {
            return Ok(());
        };

        if let Some(fault) = self.faults.get_mut(position) {
            if fault.skip > 0 {
                fault.skip -= 1;
                return Ok(());
            }
        }
        match self.faults.remove(position) {
            Some(fault) => Err(fault.error),
            None => Ok(()),
        }
    }

    fn zone(&self, zone: &ZoneIdentity) -> RemoteResult<&ZoneState> {
        self.zones.get(zone).ok_or_else(|| self.missing_zone(zone))
    }

    fn zone_mut(&mut self, zone: &ZoneIdentity) -> RemoteResult<&mut ZoneState> {
        let missing = self.missing_zone(zone);
        self.zones.get_mut(zone).ok_or(missing)
    }

    fn missing_zone(&self, zone: &ZoneIdentity) -> RemoteError {
        if self.user_deleted.contains(zone) {
            RemoteError::new(RemoteErrorCode::UserDeletedZone, zone.to_string())
        } else {
            RemoteError::new(RemoteErrorCode::ZoneNotFound, zone.to_string())
        }
    }

    fn ensure_zone(&mut self, zone: &ZoneIdentity) -> ZoneInfo {
        self.user_deleted.remove(zone);
        if let Some(existing) = self.zones.get(zone) {
            return existing.info.clone();
        }

        self.generation += 1;
        let info = ZoneInfo {
            zone: zone.clone(),
            created_at: chrono::Utc::now().timestamp_millis(),
        };
        self.zones.insert(
            zone.clone(),
            ZoneState {
                info: info.clone(),
                generation: self.generation,
                records: BTreeMap::new(),
                log: Vec::new(),
            },
        );
        info
    }

    fn save_record(&mut self, zone: &ZoneIdentity, mut record: Record) -> Record {
        self.next_tag += 1;
        record.change_tag = Some(format!("tag-{}", self.next_tag));
        if let Some(zone_state) = self.zones.get_mut(zone) {
            zone_state
                .records
                .insert(record.id.name.clone(), record.clone());
            zone_state
                .log
                .push(ChangeEntry::Saved(record.id.name.clone()));
        }
        record
    }

    /// Delete a record and everything that cascades from it
    fn delete_record(&mut self, id: &RecordId) -> bool {
        let Some(zone_state) = self.zones.get_mut(&id.zone) else {
            return false;
        };

        let mut pending = vec![id.clone()];
        let mut deleted_any = false;
        while let Some(target) = pending.pop() {
            let Some(removed) = zone_state.records.remove(&target.name) else {
                continue;
            };
            deleted_any = true;
            zone_state.log.push(ChangeEntry::Deleted {
                name: removed.id.name.clone(),
                record_type: removed.record_type.clone(),
            });

            pending.extend(
                zone_state
                    .records
                    .values()
                    .filter(|record| references(record, &target))
                    .map(|record| record.id.clone()),
            );
        }
        deleted_any
    }
}

fn references(record: &Record, target: &RecordId) -> bool {
    record.fields.values().any(|value| {
        matches!(value, Value::Reference(reference) if reference.delete_cascade && reference.target == *target)
    })
}

fn encode_token(generation: u64, position: usize) -> ChangeToken {
    let mut bytes = Vec::with_capacity(16);
    bytes.extend_from_slice(&generation.to_be_bytes());
    bytes.extend_from_slice(&(position as u64).to_be_bytes());
    ChangeToken::from_bytes(bytes)
}

fn decode_token(token: &ChangeToken) -> Option<(u64, usize)> {
    let bytes = token.as_bytes();
    if bytes.len() != 16 {
        return None;
    }
    let generation = u64::from_be_bytes(bytes[..8].try_into().ok()?);
    let position = u64::from_be_bytes(bytes[8..].try_into().ok()?);
    Some((generation, usize::try_from(position).ok()?))
}

fn project(mut record: Record, desired_fields: Option<&[String]>) -> Record {
    if let Some(fields) = desired_fields {
        record.fields.retain(|name, _| fields.contains(name));
    }
    record
}

impl RemoteService for MemoryRemote {
    async fn fetch_zone(&self, zone: &ZoneIdentity) -> RemoteResult<Option<ZoneInfo>> {
        let mut state = self.state.lock().await;
        state.begin(RemoteOperation::FetchZone)?;
        Ok(Some(state.zone(zone)?.info.clone()))
    }

    async fn create_zone(&self, zone: &ZoneIdentity) -> RemoteResult<ZoneInfo> {
        let mut state = self.state.lock().await;
        state.begin(RemoteOperation::CreateZone)?;
        Ok(state.ensure_zone(zone))
    }

    async fn query(&self, request: &QueryRequest) -> RemoteResult<QueryPage> {
        let mut state = self.state.lock().await;
        state.begin(RemoteOperation::Query)?;
        let zone_state = state.zone(&request.zone)?;

        let (query, offset) = match &request.start {
            QueryStart::Query(query) => (query.clone(), 0),
            QueryStart::Cursor(cursor) => {
                let cursor_state: CursorState = serde_json::from_slice(cursor.as_bytes())
                    .map_err(|error| {
                        RemoteError::new(RemoteErrorCode::InvalidArguments, error.to_string())
                    })?;
                (cursor_state.query, cursor_state.offset)
            }
        };

        let matching = zone_state
            .records
            .values()
            .filter(|record| {
                record.record_type == query.record_type && query.predicate.matches(record)
            })
            .collect::<Vec<_>>();

        let page_size = self.config.query_page_size.max(1);
        let end = (offset + page_size).min(matching.len());
        let records = matching
            .get(offset..end)
            .unwrap_or_default()
            .iter()
            .map(|record| project((*record).clone(), request.desired_fields.as_deref()))
            .collect();

        let cursor = if end < matching.len() {
            let next = CursorState { query, offset: end };
            let bytes = serde_json::to_vec(&next).map_err(|error| {
                RemoteError::new(RemoteErrorCode::InternalError, error.to_string())
            })?;
            Some(Cursor::from_bytes(bytes))
        } else {
            None
        };

        Ok(QueryPage {
            records,
            record_errors: Vec::new(),
            cursor,
        })
    }

    async fn fetch_record(&self, id: &RecordId) -> RemoteResult<Record> {
        let mut state = self.state.lock().await;
        state.begin(RemoteOperation::FetchRecord)?;
        state
            .zone(&id.zone)?
            .records
            .get(&id.name)
            .cloned()
            .ok_or_else(|| RemoteError::new(RemoteErrorCode::UnknownItem, id.to_string()))
    }

    async fn modify_records(
        &self,
        zone: &ZoneIdentity,
        request: &ModifyRequest,
    ) -> RemoteResult<ModifyResponse> {
        let mut state = self.state.lock().await;
        state.begin(RemoteOperation::ModifyRecords)?;
        let zone_state = state.zone(zone)?;

        if request.len() > self.config.max_batch_size {
            return Err(RemoteError::new(
                RemoteErrorCode::LimitExceeded,
                format!(
                    "{} items exceeds the batch limit of {}",
                    request.len(),
                    self.config.max_batch_size
                ),
            ));
        }

        let mut failures = Vec::new();
        for record in &request.to_save {
            if record.id.zone != *zone {
                failures.push(ItemError::new(
                    record.id.clone(),
                    RemoteErrorCode::InvalidArguments,
                ));
                continue;
            }
            if request.policy == SavePolicy::IfServerRecordUnchanged {
                if let Some(existing) = zone_state.records.get(&record.id.name) {
                    if existing.change_tag != record.change_tag {
                        failures.push(ItemError::new(
                            record.id.clone(),
                            RemoteErrorCode::ServerRecordChanged,
                        ));
                    }
                }
            }
        }

        if !failures.is_empty() && request.atomic {
            let failed = failures
                .iter()
                .map(|item| item.id.clone())
                .collect::<HashSet<_>>();
            let collateral = request
                .to_save
                .iter()
                .map(|record| &record.id)
                .chain(request.to_delete.iter())
                .filter(|id| !failed.contains(*id))
                .map(|id| ItemError::new(id.clone(), RemoteErrorCode::BatchRequestFailed))
                .collect::<Vec<_>>();
            failures.extend(collateral);
            return Err(RemoteError::partial("atomic batch rejected", failures));
        }

        let failed = failures
            .iter()
            .map(|item| item.id.clone())
            .collect::<HashSet<_>>();
        let mut response = ModifyResponse::default();
        for record in &request.to_save {
            if !failed.contains(&record.id) {
                response.saved.push(state.save_record(zone, record.clone()));
            }
        }
        for id in &request.to_delete {
            if id.zone == *zone {
                state.delete_record(id);
                response.deleted.push(id.clone());
            }
        }

        if failures.is_empty() {
            Ok(response)
        } else {
            Err(RemoteError::partial("some records were rejected", failures))
        }
    }

    async fn save_subscription(&self, subscription: &Subscription) -> RemoteResult<Subscription> {
        let mut state = self.state.lock().await;
        state.begin(RemoteOperation::SaveSubscription)?;
        state.zone(&subscription.zone)?;
        state
            .subscriptions
            .insert(subscription.id.clone(), subscription.clone());
        Ok(subscription.clone())
    }

    async fn delete_subscription(&self, subscription_id: &str) -> RemoteResult<()> {
        let mut state = self.state.lock().await;
        state.begin(RemoteOperation::DeleteSubscription)?;
        state
            .subscriptions
            .remove(subscription_id)
            .map(|_| ())
            .ok_or_else(|| RemoteError::new(RemoteErrorCode::UnknownItem, subscription_id))
    }

    async fn fetch_zone_changes(
        &self,
        zone: &ZoneIdentity,
        since: Option<&ChangeToken>,
    ) -> RemoteResult<ChangePage> {
        let mut state = self.state.lock().await;
        state.begin(RemoteOperation::FetchZoneChanges)?;
        let zone_state = state.zone_mut(zone)?;

        let start = match since {
            None => 0,
            Some(token) => {
                let (generation, position) = decode_token(token).ok_or_else(|| {
                    RemoteError::new(RemoteErrorCode::InvalidArguments, "malformed change token")
                })?;
                if generation != zone_state.generation {
                    return Err(RemoteError::new(
                        RemoteErrorCode::ChangeTokenExpired,
                        zone.to_string(),
                    ));
                }
                if position > zone_state.log.len() {
                    return Err(RemoteError::new(
                        RemoteErrorCode::InvalidArguments,
                        "change token from the future",
                    ));
                }
                position
            }
        };

        let end = (start + self.config.change_page_size.max(1)).min(zone_state.log.len());
        let mut seen = BTreeSet::new();
        let mut changed = Vec::new();
        let mut deleted = Vec::new();
        for entry in &zone_state.log[start..end] {
            match entry {
                ChangeEntry::Saved(name) => {
                    if let Some(record) = zone_state.records.get(name) {
                        if seen.insert(name.clone()) {
                            changed.push(record.clone());
                        }
                    }
                }
                ChangeEntry::Deleted { name, record_type } => {
                    if !zone_state.records.contains_key(name) && seen.insert(name.clone()) {
                        deleted.push(DeletedRecord {
                            record_type: record_type.clone(),
                            id: RecordId::new(name.clone(), zone.clone()),
                        });
                    }
                }
            }
        }

        Ok(ChangePage {
            changed,
            deleted,
            token: encode_token(zone_state.generation, end),
            more_coming: end < zone_state.log.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Reference;

    fn zone() -> ZoneIdentity {
        ZoneIdentity::new("Articles", "owner")
    }

    fn record(name: &str) -> Record {
        Record::new(RecordId::new(name, zone()), "ArticleStatus")
    }

    fn request(to_save: Vec<Record>, to_delete: Vec<RecordId>, atomic: bool) -> ModifyRequest {
        ModifyRequest {
            to_save,
            to_delete,
            atomic,
            policy: SavePolicy::ChangedKeys,
        }
    }

    #[tokio::test]
    async fn operations_on_missing_zone_report_zone_not_found() {
        let remote = MemoryRemote::new();
        let error = remote
            .modify_records(&zone(), &request(vec![record("s|1")], vec![], true))
            .await
            .unwrap_err();
        assert_eq!(error.code, RemoteErrorCode::ZoneNotFound);

        remote.create_zone(&zone()).await.unwrap();
        remote.delete_zone_by_owner(&zone()).await;
        let error = remote.fetch_zone(&zone()).await.unwrap_err();
        assert_eq!(error.code, RemoteErrorCode::UserDeletedZone);
    }

    #[tokio::test]
    async fn deleting_a_target_cascades_to_referencing_records() {
        let remote = MemoryRemote::new();
        let status = record("s|1");
        let mut article = Record::new(RecordId::new("a|1", zone()), "Article");
        article.set(
            "articleStatus",
            Value::Reference(Reference {
                target: status.id.clone(),
                delete_cascade: true,
            }),
        );
        remote.put_records(&zone(), vec![status.clone(), article]).await;

        remote
            .modify_records(&zone(), &request(vec![], vec![status.id.clone()], true))
            .await
            .unwrap();

        assert!(remote.records(&zone()).await.is_empty());
    }

    #[tokio::test]
    async fn oversized_batches_are_rejected() {
        let remote = MemoryRemote::with_config(MemoryRemoteConfig {
            max_batch_size: 2,
            ..MemoryRemoteConfig::default()
        });
        remote.create_zone(&zone()).await.unwrap();
        let records = (0..3).map(|i| record(&format!("s|{i}"))).collect();

        let error = remote
            .modify_records(&zone(), &request(records, vec![], true))
            .await
            .unwrap_err();
        assert_eq!(error.code, RemoteErrorCode::LimitExceeded);
        assert!(remote.records(&zone()).await.is_empty());
    }

    #[tokio::test]
    async fn if_unchanged_saves_reject_stale_copies_individually() {
        let remote = MemoryRemote::new();
        remote.put_records(&zone(), vec![record("s|1")]).await;

        let request = ModifyRequest {
            to_save: vec![record("s|1"), record("s|2")],
            to_delete: vec![],
            atomic: false,
            policy: SavePolicy::IfServerRecordUnchanged,
        };
        let error = remote.modify_records(&zone(), &request).await.unwrap_err();

        assert_eq!(error.code, RemoteErrorCode::PartialFailure);
        assert_eq!(error.items.len(), 1);
        assert_eq!(error.items[0].code, RemoteErrorCode::ServerRecordChanged);
        assert_eq!(remote.records(&zone()).await.len(), 2);
    }

    #[tokio::test]
    async fn change_pages_follow_the_log_and_expire_after_purge() {
        let remote = MemoryRemote::with_config(MemoryRemoteConfig {
            change_page_size: 2,
            ..MemoryRemoteConfig::default()
        });
        let records = (0..3).map(|i| record(&format!("s|{i}"))).collect();
        remote.put_records(&zone(), records).await;

        let first = remote.fetch_zone_changes(&zone(), None).await.unwrap();
        assert_eq!(first.changed.len(), 2);
        assert!(first.more_coming);

        let second = remote
            .fetch_zone_changes(&zone(), Some(&first.token))
            .await
            .unwrap();
        assert_eq!(second.changed.len(), 1);
        assert!(!second.more_coming);

        remote.expire_change_tokens(&zone()).await;
        let error = remote
            .fetch_zone_changes(&zone(), Some(&first.token))
            .await
            .unwrap_err();
        assert_eq!(error.code, RemoteErrorCode::ChangeTokenExpired);
    }

    #[tokio::test]
    async fn injected_faults_fire_once_per_operation() {
        let remote = MemoryRemote::new();
        remote
            .inject(
                RemoteOperation::CreateZone,
                RemoteErrorCode::ServiceUnavailable.into(),
            )
            .await;

        assert!(remote.create_zone(&zone()).await.is_err());
        assert!(remote.create_zone(&zone()).await.is_ok());
        assert_eq!(remote.calls(RemoteOperation::CreateZone).await, 2);
    }
}
