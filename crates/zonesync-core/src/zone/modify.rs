//! Record saves and deletes

use super::recovery::Settled;
use super::ZoneClient;
use crate::chunk::chunk;
use crate::classify::ErrorCategory;
use crate::db::KeyValueStore;
use crate::models::{ModifyRequest, Query, Record, RecordId, SavePolicy};
use crate::remote::{ItemError, RemoteError, RemoteErrorCode, RemoteService};
use crate::retry::RetryScheduler;
use crate::{Error, Result};

/// How a modify call ended when it did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Every record was written
    Applied,
    /// The server already held versions of the records
    AlreadyMatched,
    /// Best-effort batch where some records were rejected
    PartiallyApplied { rejected: Vec<ItemError> },
}

impl SaveOutcome {
    /// Combine the outcomes of two sub-batches
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        match (self, other) {
            (
                Self::PartiallyApplied { mut rejected },
                Self::PartiallyApplied { rejected: more },
            ) => {
                rejected.extend(more);
                Self::PartiallyApplied { rejected }
            }
            (partial @ Self::PartiallyApplied { .. }, _)
            | (_, partial @ Self::PartiallyApplied { .. }) => partial,
            (Self::AlreadyMatched, _) | (_, Self::AlreadyMatched) => Self::AlreadyMatched,
            (Self::Applied, Self::Applied) => Self::Applied,
        }
    }

    /// Records the server refused
    #[must_use]
    pub fn rejected(&self) -> &[ItemError] {
        match self {
            Self::PartiallyApplied { rejected } => rejected,
            _ => &[],
        }
    }
}

/// Result of sending one batch
enum Sent {
    Settled(SaveOutcome),
    TooLarge(RemoteError),
}

impl<R, K, S> ZoneClient<R, K, S>
where
    R: RemoteService,
    K: KeyValueStore,
    S: RetryScheduler,
{
    /// Save records, overwriting the server copies.
    pub async fn save(&self, records: Vec<Record>, atomic: bool) -> Result<()> {
        let _session = self.begin().await?;
        self.modify_inner(ModifyRequest {
            to_save: records,
            to_delete: Vec::new(),
            atomic,
            policy: SavePolicy::ChangedKeys,
        })
        .await
        .map(|_| ())
    }

    /// Delete records in one atomic batch.
    pub async fn delete(&self, ids: Vec<RecordId>) -> Result<()> {
        let _session = self.begin().await?;
        self.modify_inner(ModifyRequest {
            to_save: Vec::new(),
            to_delete: ids,
            atomic: true,
            policy: SavePolicy::ChangedKeys,
        })
        .await
        .map(|_| ())
    }

    /// Save records that the server does not hold yet.
    ///
    /// Records whose server copy differs are left alone. Both "already
    /// matches" and per-record rejections count as success; the outcome says
    /// which happened.
    pub async fn save_if_unchanged(&self, records: Vec<Record>) -> Result<SaveOutcome> {
        let _session = self.begin().await?;
        self.modify_inner(ModifyRequest {
            to_save: records,
            to_delete: Vec::new(),
            atomic: false,
            policy: SavePolicy::IfServerRecordUnchanged,
        })
        .await
    }

    /// Send a batch of saves and deletes.
    pub async fn modify(&self, request: ModifyRequest) -> Result<SaveOutcome> {
        let _session = self.begin().await?;
        self.modify_inner(request).await
    }

    /// Send `request`, then save `new_records` if unchanged, without letting
    /// another caller run in between.
    ///
    /// Returns the outcome of the if-unchanged save.
    pub async fn modify_then_save_new(
        &self,
        request: ModifyRequest,
        new_records: Vec<Record>,
    ) -> Result<SaveOutcome> {
        let _session = self.begin().await?;
        self.modify_inner(request).await?;
        self.modify_inner(ModifyRequest {
            to_save: new_records,
            to_delete: Vec::new(),
            atomic: false,
            policy: SavePolicy::IfServerRecordUnchanged,
        })
        .await
    }

    /// Delete every record matching `query`; returns how many were deleted.
    pub async fn delete_matching(&self, query: Query) -> Result<usize> {
        let _session = self.begin().await?;
        let ids = self
            .query_inner(query, Some(Vec::new()))
            .await?
            .into_iter()
            .map(|record| record.id)
            .collect::<Vec<_>>();

        let count = ids.len();
        self.modify_inner(ModifyRequest {
            to_save: Vec::new(),
            to_delete: ids,
            atomic: true,
            policy: SavePolicy::ChangedKeys,
        })
        .await?;
        tracing::info!(zone = %self.zone, count, "Deleted records by query");
        Ok(count)
    }

    pub(crate) async fn modify_inner(&self, request: ModifyRequest) -> Result<SaveOutcome> {
        if request.is_empty() {
            return Ok(SaveOutcome::Applied);
        }

        match self.send_batch(&request).await? {
            Sent::Settled(outcome) => Ok(outcome),
            Sent::TooLarge(_) => self.modify_in_chunks(request).await,
        }
    }

    async fn send_batch(&self, request: &ModifyRequest) -> Result<Sent> {
        let settled = self
            .with_recovery("modify records", || {
                self.remote.modify_records(&self.zone, request)
            })
            .await?;

        match settled {
            Settled::Done(response) => {
                tracing::debug!(
                    zone = %self.zone,
                    saved = response.saved.len(),
                    deleted = response.deleted.len(),
                    "Modified records"
                );
                Ok(Sent::Settled(SaveOutcome::Applied))
            }
            Settled::Deferred(ErrorCategory::BatchTooLarge, error) => Ok(Sent::TooLarge(error)),
            Settled::Deferred(category, error) => {
                self.settle_modify(request, category, error).map(Sent::Settled)
            }
        }
    }

    fn settle_modify(
        &self,
        request: &ModifyRequest,
        category: ErrorCategory,
        error: RemoteError,
    ) -> Result<SaveOutcome> {
        match category {
            ErrorCategory::Success
                if request.atomic && error.code == RemoteErrorCode::PartialFailure =>
            {
                tracing::error!(
                    zone = %self.zone,
                    count = error.items.len(),
                    "Atomic batch rejected over changed server records"
                );
                Err(Error::PartialFailure {
                    zone: self.zone.to_string(),
                    items: error.items,
                })
            }
            ErrorCategory::Success => {
                tracing::debug!(zone = %self.zone, "Server already holds the records");
                Ok(SaveOutcome::AlreadyMatched)
            }
            ErrorCategory::PartialFailure(items) if request.atomic => {
                tracing::error!(zone = %self.zone, count = items.len(), "Atomic batch rejected");
                Err(Error::PartialFailure {
                    zone: self.zone.to_string(),
                    items,
                })
            }
            ErrorCategory::PartialFailure(items) => {
                for item in &items {
                    tracing::warn!(
                        zone = %self.zone,
                        record = %item.id,
                        code = ?item.code,
                        "Record rejected by server"
                    );
                }
                Ok(SaveOutcome::PartiallyApplied { rejected: items })
            }
            _ => Err(Error::Remote(error)),
        }
    }

    /// Send saves, then deletes, in chunks of `chunk_size`.
    ///
    /// Chunks go out in order and the first failing chunk ends the call.
    async fn modify_in_chunks(&self, request: ModifyRequest) -> Result<SaveOutcome> {
        let ModifyRequest {
            to_save,
            to_delete,
            atomic,
            policy,
        } = request;

        let save_chunks = chunk(to_save, self.config.chunk_size);
        let delete_chunks = chunk(to_delete, self.config.chunk_size);
        let total = save_chunks.len() + delete_chunks.len();
        tracing::info!(zone = %self.zone, chunks = total, "Batch too large, sending in chunks");

        let batches = save_chunks
            .into_iter()
            .map(|records| ModifyRequest {
                to_save: records,
                to_delete: Vec::new(),
                atomic,
                policy,
            })
            .chain(delete_chunks.into_iter().map(|ids| ModifyRequest {
                to_save: Vec::new(),
                to_delete: ids,
                atomic,
                policy,
            }));

        let mut outcome = SaveOutcome::Applied;
        for (index, batch) in batches.enumerate() {
            tracing::info!(
                zone = %self.zone,
                chunk = index + 1,
                of = total,
                count = batch.len(),
                "Sending chunk"
            );
            match self.send_batch(&batch).await? {
                Sent::Settled(result) => outcome = outcome.merge(result),
                Sent::TooLarge(error) => {
                    return Err(Error::Remote(RemoteError {
                        code: RemoteErrorCode::LimitExceeded,
                        message: format!(
                            "chunk of {} records still exceeds the server limit: {}",
                            batch.len(),
                            error.message
                        ),
                        ..error
                    }));
                }
            }
        }
        Ok(outcome)
    }
}
