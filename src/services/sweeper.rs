//! Expiration sweeper: the only component that physically deletes messages.
//!
//! Each pass is stateless and idempotent, and works in independent
//! per-message read-evaluate-write cycles so one slow or failing message
//! never blocks the rest of the batch.

use crate::error::{AppError, AppResult};
use crate::services::evaluator::should_expire;
use crate::store::VisibilityStore;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// Messages newly flagged by the defensive re-check
    pub flagged: usize,
    /// Flagged messages physically deleted
    pub deleted: usize,
    /// Media payloads removed by the hard wall-clock TTL
    pub media_purged: u64,
}

pub struct ExpirationSweeper {
    store: Arc<dyn VisibilityStore>,
    interval: Duration,
    media_ttl: chrono::Duration,
}

impl ExpirationSweeper {
    pub fn new(store: Arc<dyn VisibilityStore>, interval_secs: u64, media_ttl_hours: i64) -> Self {
        Self {
            store,
            interval: Duration::from_secs(interval_secs),
            media_ttl: chrono::Duration::hours(media_ttl_hours),
        }
    }

    /// One full sweep: re-evaluate all live messages, delete flagged ones,
    /// purge stale media. Per-message failures are logged and skipped; a
    /// missed message stays un-expired for one more cycle, which is always
    /// safer than a wrong delete.
    pub async fn run_once(&self) -> AppResult<SweepReport> {
        let mut report = SweepReport::default();

        // (a) Defensive re-check: catch ledger mutations that were applied
        // without a follow-up evaluation (partial failures in the hot path)
        for message in self.store.unexpired_messages().await? {
            let conversation = match self.store.fetch_conversation(message.conversation_id).await {
                Ok(c) => c,
                Err(AppError::NotFound) => {
                    debug!(
                        message_id = %message.id,
                        conversation_id = %message.conversation_id,
                        "conversation gone, leaving message for a later pass"
                    );
                    continue;
                }
                Err(e) => {
                    warn!(message_id = %message.id, error = %e, "participant resolution failed, skipping");
                    continue;
                }
            };

            if should_expire(&message, &conversation.participant_ids) {
                match self.store.set_expired(message.id, true).await {
                    Ok(()) => report.flagged += 1,
                    Err(AppError::NotFound) => {}
                    Err(e) => {
                        warn!(message_id = %message.id, error = %e, "failed to flag message, skipping");
                    }
                }
            }
        }

        // (b) Physical deletion. delete_if_expired re-validates the flag and
        // saved_by emptiness at delete time, so a save landing between the
        // flag and this point wins.
        for message_id in self.store.expired_message_ids().await? {
            match self.store.delete_if_expired(message_id).await {
                Ok(true) => report.deleted += 1,
                Ok(false) => {
                    debug!(message_id = %message_id, "flagged message saved or already gone, not deleted");
                }
                Err(e) => {
                    warn!(message_id = %message_id, error = %e, "delete failed, will retry next cycle");
                }
            }
        }

        // (c) Hard-TTL purge for media payloads, an absolute deadline
        // unrelated to view tracking
        let cutoff = Utc::now() - self.media_ttl;
        match self.store.purge_media_before(cutoff).await {
            Ok(purged) => report.media_purged = purged,
            Err(e) => {
                warn!(error = %e, "media TTL purge failed, will retry next cycle");
            }
        }

        Ok(report)
    }

    /// Run the sweep on an interval until the shutdown channel flips.
    pub fn spawn(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(interval_secs = self.interval.as_secs(), "starting expiration sweeper");

            // Initial pass on startup
            match self.run_once().await {
                Ok(report) => info!(?report, "initial sweep completed"),
                Err(e) => error!(error = %e, "initial sweep failed"),
            }

            let mut interval = tokio::time::interval(self.interval);
            interval.tick().await; // Skip first tick (we just ran)

            loop {
                tokio::select! {
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            info!("expiration sweeper shutting down");
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        match self.run_once().await {
                            Ok(report) => {
                                if report != SweepReport::default() {
                                    info!(
                                        flagged = report.flagged,
                                        deleted = report.deleted,
                                        media_purged = report.media_purged,
                                        "sweep completed"
                                    );
                                }
                            }
                            Err(e) => {
                                warn!(error = %e, "sweep failed, will retry next interval");
                            }
                        }
                    }
                }
            }
        })
    }
}
