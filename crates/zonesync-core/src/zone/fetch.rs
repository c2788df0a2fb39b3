//! Queries and incremental change fetches

use super::recovery::Settled;
use super::ZoneClient;
use crate::classify::ErrorCategory;
use crate::db::KeyValueStore;
use crate::models::{DeletedRecord, Query, Record};
use crate::remote::{QueryRequest, QueryStart, RemoteService};
use crate::retry::RetryScheduler;
use crate::{Error, Result};

/// Receiver of remote changes.
///
/// Must be idempotent: a page may be delivered again after a failed or
/// interrupted fetch.
#[allow(async_fn_in_trait)]
pub trait ZoneDelegate {
    /// Apply one page of changed records and deleted record keys locally
    async fn on_zone_changed(&self, changed: Vec<Record>, deleted: Vec<DeletedRecord>)
        -> Result<()>;
}

impl<R, K, S> ZoneClient<R, K, S>
where
    R: RemoteService,
    K: KeyValueStore,
    S: RetryScheduler,
{
    /// Fetch every record matching `query`, following cursors.
    ///
    /// `desired_fields` limits the returned fields; `None` returns all of them.
    pub async fn query(
        &self,
        query: Query,
        desired_fields: Option<Vec<String>>,
    ) -> Result<Vec<Record>> {
        let _session = self.begin().await?;
        self.query_inner(query, desired_fields).await
    }

    pub(crate) async fn query_inner(
        &self,
        query: Query,
        desired_fields: Option<Vec<String>>,
    ) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        let mut request = QueryRequest {
            zone: self.zone.clone(),
            start: QueryStart::Query(query),
            desired_fields,
        };

        loop {
            let page = match self
                .with_recovery("query", || self.remote.query(&request))
                .await?
            {
                Settled::Done(page) => page,
                Settled::Deferred(_, error) => return Err(Error::Remote(error)),
            };

            for item in &page.record_errors {
                tracing::warn!(
                    zone = %self.zone,
                    record = %item.id,
                    code = ?item.code,
                    "Skipping record that failed to fetch"
                );
            }

            tracing::debug!(
                zone = %self.zone,
                count = page.records.len(),
                total = records.len() + page.records.len(),
                "Fetched query page"
            );
            records.extend(page.records);

            match page.cursor {
                Some(cursor) => request.start = QueryStart::Cursor(cursor),
                None => return Ok(records),
            }
        }
    }

    /// Pull changes since the stored token and hand them to `delegate`.
    ///
    /// The token of each page is stored only after the delegate accepted the
    /// page, so a failure re-delivers that page on the next fetch instead of
    /// skipping it. An expired token is cleared and the fetch restarts from
    /// the beginning of the zone's history.
    pub async fn fetch_incremental_changes<D: ZoneDelegate>(&self, delegate: &D) -> Result<()> {
        let _session = self.begin().await?;
        self.fetch_changes_inner(delegate).await
    }

    async fn fetch_changes_inner<D: ZoneDelegate>(&self, delegate: &D) -> Result<()> {
        let mut token = self.tokens.get(&self.zone).await?;
        let mut pages = 0usize;

        loop {
            let settled = self
                .with_recovery("fetch zone changes", || {
                    self.remote.fetch_zone_changes(&self.zone, token.as_ref())
                })
                .await?;

            let page = match settled {
                Settled::Done(page) => page,
                Settled::Deferred(ErrorCategory::TokenExpired, _) => {
                    tracing::warn!(zone = %self.zone, "Change token expired, fetching all changes");
                    self.tokens.set(&self.zone, None).await?;
                    token = None;
                    continue;
                }
                Settled::Deferred(_, error) => return Err(Error::Remote(error)),
            };

            pages += 1;
            tracing::debug!(
                zone = %self.zone,
                page = pages,
                changed = page.changed.len(),
                deleted = page.deleted.len(),
                more_coming = page.more_coming,
                "Fetched zone changes"
            );

            if let Err(error) = delegate.on_zone_changed(page.changed, page.deleted).await {
                tracing::error!(zone = %self.zone, %error, "Failed to apply zone changes");
                return Err(error);
            }

            self.tokens.set(&self.zone, Some(&page.token)).await?;
            token = Some(page.token);

            if !page.more_coming {
                tracing::info!(zone = %self.zone, pages, "Zone changes applied");
                return Ok(());
            }
        }
    }
}
