//! Zone client
//!
//! [`ZoneClient`] owns one zone identity and drives every remote operation on
//! it through a shared recovery loop: missing zones are recreated, throttled
//! calls wait for the server's hint, oversized batches are chunked and expired
//! change tokens restart the change feed. Operations on one client are
//! serialized by a session lock; separate clients (one per zone or account)
//! share nothing and run in parallel.

mod fetch;
mod modify;
mod recovery;


pub use fetch::ZoneDelegate;
pub use modify::SaveOutcome;

use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::SyncConfig;
use crate::db::KeyValueStore;
use crate::models::{ChangeToken, Record, RecordId, Subscription, ZoneIdentity, ZoneInfo, ZoneNotification};
use crate::remote::RemoteService;
use crate::retry::{RetryScheduler, TokioScheduler};
use crate::token_store::ChangeTokenStore;
use crate::{Error, Result};

use recovery::Settled;

#[derive(Default)]
struct SessionState {
    legacy_checked: bool,
}

/// Client for one remote zone
pub struct ZoneClient<R, K, S = TokioScheduler> {
    zone: ZoneIdentity,
    remote: R,
    tokens: ChangeTokenStore<K>,
    scheduler: S,
    config: SyncConfig,
    cancel: CancellationToken,
    session: Mutex<SessionState>,
}

impl<R, K> ZoneClient<R, K, TokioScheduler>
where
    R: RemoteService,
    K: KeyValueStore,
{
    /// Create a client that waits on real timers
    pub fn new(zone: ZoneIdentity, remote: R, store: K, config: SyncConfig) -> Self {
        let tokens = ChangeTokenStore::new(store, config.token_key_prefix.clone());
        Self {
            zone,
            remote,
            tokens,
            scheduler: TokioScheduler,
            config,
            cancel: CancellationToken::new(),
            session: Mutex::new(SessionState::default()),
        }
    }
}

impl<R, K, S> ZoneClient<R, K, S>
where
    R: RemoteService,
    K: KeyValueStore,
    S: RetryScheduler,
{
    /// Replace the retry scheduler
    pub fn with_scheduler<S2: RetryScheduler>(self, scheduler: S2) -> ZoneClient<R, K, S2> {
        ZoneClient {
            zone: self.zone,
            remote: self.remote,
            tokens: self.tokens,
            scheduler,
            config: self.config,
            cancel: self.cancel,
            session: self.session,
        }
    }

    /// Use an externally owned cancellation token
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub const fn zone(&self) -> &ZoneIdentity {
        &self.zone
    }

    pub const fn remote(&self) -> &R {
        &self.remote
    }

    pub const fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Handle that stops the current and every later operation chain
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Start a session: queue behind other callers and run one-time setup
    async fn begin(&self) -> Result<MutexGuard<'_, SessionState>> {
        let mut session = self.session.lock().await;
        if !session.legacy_checked {
            self.tokens.migrate_legacy_if_present(&self.zone).await?;
            session.legacy_checked = true;
        }
        Ok(session)
    }

    /// Fetch zone metadata, creating the zone when it is missing.
    pub async fn ensure_zone(&self) -> Result<ZoneInfo> {
        let _session = self.begin().await?;
        self.ensure_zone_inner().await
    }

    /// Fetch a single record by its name.
    pub async fn fetch_record(&self, name: &str) -> Result<Record> {
        if name.is_empty() {
            return Err(Error::CorruptAccount(
                "record name is empty; the account cannot address remote data".to_string(),
            ));
        }

        let _session = self.begin().await?;
        let id = RecordId::new(name, self.zone.clone());
        match self
            .with_recovery("fetch record", || self.remote.fetch_record(&id))
            .await?
        {
            Settled::Done(record) => Ok(record),
            Settled::Deferred(_, error) => Err(Error::Remote(error)),
        }
    }

    /// Create or replace a change subscription.
    pub async fn save_subscription(&self, subscription: &Subscription) -> Result<Subscription> {
        let _session = self.begin().await?;
        match self
            .with_recovery("save subscription", || {
                self.remote.save_subscription(subscription)
            })
            .await?
        {
            Settled::Done(saved) => {
                tracing::info!(zone = %self.zone, subscription = %saved.id, "Saved subscription");
                Ok(saved)
            }
            Settled::Deferred(_, error) => Err(Error::Remote(error)),
        }
    }

    /// Subscribe to changes of this zone, keyed by the zone name.
    ///
    /// Failure is logged and otherwise ignored; polling still picks changes up.
    pub async fn subscribe_to_zone_changes(&self) {
        let subscription = Subscription {
            id: self.zone.name.clone(),
            zone: self.zone.clone(),
        };
        if let Err(error) = self.save_subscription(&subscription).await {
            tracing::error!(zone = %self.zone, %error, "Failed to subscribe to zone changes");
        }
    }

    /// Remove a change subscription.
    pub async fn delete_subscription(&self, subscription_id: &str) -> Result<()> {
        let _session = self.begin().await?;
        match self
            .with_recovery("delete subscription", || {
                self.remote.delete_subscription(subscription_id)
            })
            .await?
        {
            Settled::Done(()) => Ok(()),
            Settled::Deferred(_, error) => Err(Error::Remote(error)),
        }
    }

    /// React to a "something changed remotely" signal.
    ///
    /// Runs one incremental fetch when the signal names this zone and returns
    /// whether it did. Signals for other zones are ignored.
    pub async fn receive_remote_notification<D: ZoneDelegate>(
        &self,
        notification: &ZoneNotification,
        delegate: &D,
    ) -> Result<bool> {
        if notification.zone_name.as_deref() != Some(self.zone.name.as_str()) {
            tracing::debug!(
                zone = %self.zone,
                notified = ?notification.zone_name,
                "Ignoring notification for another zone"
            );
            return Ok(false);
        }

        self.fetch_incremental_changes(delegate).await?;
        Ok(true)
    }

    /// New record id with a time-ordered unique name
    pub fn generate_record_id(&self) -> RecordId {
        RecordId::new(Uuid::now_v7().to_string(), self.zone.clone())
    }

    /// Stored change token of this zone
    pub async fn change_token(&self) -> Result<Option<ChangeToken>> {
        let _session = self.begin().await?;
        self.tokens.get(&self.zone).await
    }

    /// Forget the stored change token so the next fetch starts from scratch
    pub async fn reset_change_token(&self) -> Result<()> {
        let _session = self.begin().await?;
        self.tokens.set(&self.zone, None).await?;
        tracing::info!(zone = %self.zone, "Reset change token");
        Ok(())
    }
}
