//! Periodic garbage collection of expired ledger rows.

use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info};

use crate::AuthResult;
use crate::audit::{AuditSink, SecurityEvent};
use crate::storage::TokenLedger;
use crate::types::CleanupReport;

/// Deletes blacklist and tracking rows whose `expires_at` has passed.
#[derive(Clone)]
pub struct CleanupSweeper {
    ledger: Arc<dyn TokenLedger>,
    audit: Arc<dyn AuditSink>,
}

impl CleanupSweeper {
    /// Creates a sweeper over `ledger`.
    pub fn new(ledger: Arc<dyn TokenLedger>, audit: Arc<dyn AuditSink>) -> Self {
        Self { ledger, audit }
    }

    /// Runs one cleanup pass. Safe to run repeatedly and concurrently.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::StorageUnavailable` if the ledger fails.
    pub async fn cleanup(&self) -> AuthResult<CleanupReport> {
        self.cleanup_at(OffsetDateTime::now_utc()).await
    }

    /// Runs one cleanup pass with an explicit cutoff.
    ///
    /// Rows with `expires_at < now` are deleted.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::StorageUnavailable` if the ledger fails.
    pub async fn cleanup_at(&self, now: OffsetDateTime) -> AuthResult<CleanupReport> {
        let report = self.ledger.delete_expired(now).await?;

        if report.total() > 0 {
            info!(
                blacklist_removed = report.blacklist_removed,
                tracking_removed = report.tracking_removed,
                "Cleaned up expired token records"
            );
        } else {
            debug!("No expired token records to clean up");
        }
        self.audit.record(&SecurityEvent::swept(report));

        Ok(report)
    }

    /// Start the sweeper in a background task.
    ///
    /// Returns a shutdown sender; publishing `true` stops the loop. A failed
    /// pass is logged and retried on the next tick.
    pub fn start(self: Arc<Self>, every: Duration) -> watch::Sender<bool> {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        tokio::spawn(async move {
            info!(interval_secs = every.as_secs(), "Token cleanup sweeper started");

            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.cleanup().await {
                            error!(error = %e, "Token cleanup pass failed");
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            info!("Token cleanup sweeper shutting down");
                            break;
                        }
                    }
                }
            }
        });

        shutdown_tx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::TracingAuditSink;
    use crate::storage::InMemoryTokenLedger;
    use crate::types::{
        BlacklistEntry, RefreshTokenRecord, RevocationReason, SessionContext, TokenType,
    };

    fn sweeper(ledger: Arc<InMemoryTokenLedger>) -> CleanupSweeper {
        CleanupSweeper::new(ledger, Arc::new(TracingAuditSink::default()))
    }

    #[tokio::test]
    async fn test_cleanup_removes_expired_only() {
        let ledger = Arc::new(InMemoryTokenLedger::new());
        let now = OffsetDateTime::now_utc();
        let ctx = SessionContext::default();
        let expired = RefreshTokenRecord::issue(
            "user-1",
            None,
            time::Duration::hours(1),
            &ctx,
            now - time::Duration::hours(2),
        );
        let live = RefreshTokenRecord::issue("user-1", None, time::Duration::hours(1), &ctx, now);
        ledger.track_refresh_token(&expired).await.unwrap();
        ledger.track_refresh_token(&live).await.unwrap();
        ledger
            .add_to_blacklist(&BlacklistEntry::new(
                "a-1",
                TokenType::Access,
                "user-1",
                RevocationReason::Logout,
                now - time::Duration::hours(2),
                now - time::Duration::hours(1),
            ))
            .await
            .unwrap();

        let sweeper = sweeper(ledger.clone());
        let report = sweeper.cleanup_at(now).await.unwrap();
        assert_eq!(
            report,
            CleanupReport {
                blacklist_removed: 1,
                tracking_removed: 1,
            }
        );
        assert!(ledger.find_by_jti(&live.jti).await.unwrap().is_some());

        let again = sweeper.cleanup_at(now).await.unwrap();
        assert_eq!(again.total(), 0);
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_shutdown() {
        let ledger = Arc::new(InMemoryTokenLedger::new());
        let shutdown = Arc::new(sweeper(ledger)).start(Duration::from_millis(10));

        tokio::time::sleep(Duration::from_millis(30)).await;
        shutdown.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), shutdown.closed())
            .await
            .unwrap();
    }
}
