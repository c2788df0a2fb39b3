//! Shared recovery loop for remote calls

use std::future::Future;
use std::time::Duration;

use super::ZoneClient;
use crate::classify::{classify, ErrorCategory};
use crate::db::KeyValueStore;
use crate::models::ZoneInfo;
use crate::remote::{RemoteError, RemoteErrorCode, RemoteResult, RemoteService};
use crate::retry::RetryScheduler;
use crate::{Error, Result};

/// Outcome of a remote call after the shared recovery steps ran
pub(crate) enum Settled<T> {
    /// The call succeeded
    Done(T),
    /// The call failed in a way only the calling operation knows how to handle
    Deferred(ErrorCategory, RemoteError),
}

impl<R, K, S> ZoneClient<R, K, S>
where
    R: RemoteService,
    K: KeyValueStore,
    S: RetryScheduler,
{
    /// Run `attempt` until it succeeds or fails in an operation-specific way.
    ///
    /// A missing zone is recreated and a throttled call waits before the same
    /// attempt is sent again. A zone deleted by its owner and unknown failures
    /// end the chain. `Success`, `PartialFailure`, `BatchTooLarge` and
    /// `TokenExpired` are handed back to the caller. Cancellation is checked
    /// before every attempt and interrupts waits.
    pub(crate) async fn with_recovery<T, F, Fut>(
        &self,
        operation: &'static str,
        mut attempt: F,
    ) -> Result<Settled<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = RemoteResult<T>>,
    {
        loop {
            self.check_cancelled(operation)?;

            let error = match attempt().await {
                Ok(value) => return Ok(Settled::Done(value)),
                Err(error) => error,
            };

            match classify(&error) {
                ErrorCategory::ZoneNotFound => {
                    tracing::warn!(zone = %self.zone, operation, "Zone not found, recreating");
                    self.create_zone_inner().await?;
                }
                ErrorCategory::RetryAfter(delay) => self.wait(operation, delay).await?,
                ErrorCategory::UserDeletedZone => return Err(self.user_deleted(error)),
                ErrorCategory::Unknown(code) => {
                    tracing::error!(zone = %self.zone, operation, ?code, %error, "Remote call failed");
                    return Err(Error::Remote(error));
                }
                category => return Ok(Settled::Deferred(category, error)),
            }
        }
    }

    /// Fetch the zone; create it once if the server does not know it.
    pub(crate) async fn ensure_zone_inner(&self) -> Result<ZoneInfo> {
        let mut created = false;
        loop {
            self.check_cancelled("ensure zone")?;

            let error = match self.remote.fetch_zone(&self.zone).await {
                Ok(Some(info)) => return Ok(info),
                Ok(None) => RemoteError::new(RemoteErrorCode::ZoneNotFound, self.zone.to_string()),
                Err(error) => error,
            };

            match classify(&error) {
                ErrorCategory::ZoneNotFound | ErrorCategory::UserDeletedZone if !created => {
                    self.create_zone_inner().await?;
                    created = true;
                }
                ErrorCategory::RetryAfter(delay) => self.wait("ensure zone", delay).await?,
                ErrorCategory::UserDeletedZone => return Err(self.user_deleted(error)),
                _ => return Err(Error::Remote(error)),
            }
        }
    }

    /// Create the zone, waiting out throttling.
    pub(crate) async fn create_zone_inner(&self) -> Result<ZoneInfo> {
        loop {
            self.check_cancelled("create zone")?;

            match self.remote.create_zone(&self.zone).await {
                Ok(info) => {
                    tracing::info!(zone = %self.zone, "Created zone");
                    return Ok(info);
                }
                Err(error) => match classify(&error) {
                    ErrorCategory::RetryAfter(delay) => self.wait("create zone", delay).await?,
                    ErrorCategory::UserDeletedZone => return Err(self.user_deleted(error)),
                    _ => {
                        tracing::error!(zone = %self.zone, %error, "Zone creation failed");
                        return Err(Error::Remote(error));
                    }
                },
            }
        }
    }

    /// Wait for a (clamped) server-suggested delay unless cancelled first.
    async fn wait(&self, operation: &'static str, delay: Duration) -> Result<()> {
        let delay = self.config.clamp_delay(delay);
        tracing::warn!(
            zone = %self.zone,
            operation,
            delay_secs = delay.as_secs_f64(),
            "Remote asked to retry later"
        );

        tokio::select! {
            () = self.cancel.cancelled() => Err(Error::Cancelled(operation)),
            () = self.scheduler.wait(delay) => Ok(()),
        }
    }

    pub(crate) fn check_cancelled(&self, operation: &'static str) -> Result<()> {
        if self.cancel.is_cancelled() {
            tracing::debug!(zone = %self.zone, operation, "Operation cancelled");
            return Err(Error::Cancelled(operation));
        }
        Ok(())
    }

    fn user_deleted(&self, source: RemoteError) -> Error {
        tracing::error!(zone = %self.zone, "Zone was deleted by its owner");
        Error::UserDeletedZone {
            zone: self.zone.to_string(),
            source,
        }
    }
}
