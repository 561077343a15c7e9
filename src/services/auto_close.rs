//! # Auto-Close Sweep
//!
//! Finds published tenders whose deadline has passed and closes them:
//! opening report first, then the `published -> closed` transition,
//! then a system audit entry (`actor = None`).
//!
//! One run processes at most `batch_limit` tenders (oldest deadline
//! first); a larger backlog drains across successive runs. A failure
//! on one tender is logged and counted, never propagated — the sweep
//! itself never fails, so the scheduler keeps ticking.

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{debug, error, info};

use crate::db::models::{TenderRecord, TenderStatus};
use crate::error::EngineError;
use crate::services::audit::{actions, entities, AuditLog};
use crate::services::opening_report::ensure_opening_report;
use crate::store::{CasOutcome, TenderStore};

/// Counts from one sweep run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    /// Tenders this run closed.
    pub closed: usize,
    /// Tenders another actor transitioned first (benign).
    pub skipped: usize,
    /// Tenders that errored; they stay eligible for the next run.
    pub errors: usize,
}

/// Closes published tenders past their deadline.
#[derive(Clone)]
pub struct AutoCloseSweep<S> {
    store: S,
    audit: AuditLog<S>,
    batch_limit: i64,
}

impl<S: TenderStore + Clone> AutoCloseSweep<S> {
    pub fn new(store: S, batch_limit: i64) -> Self {
        Self {
            audit: AuditLog::new(store.clone()),
            store,
            batch_limit,
        }
    }

    /// One sweep pass over the expired backlog. Infallible: every
    /// per-tender failure is contained and counted.
    pub async fn run_once(&self, now: DateTime<Utc>) -> SweepOutcome {
        let expired = match self.store.list_expired_published(now, self.batch_limit).await {
            Ok(tenders) => tenders,
            Err(e) => {
                error!("Auto-close sweep could not list expired tenders: {}", e);
                return SweepOutcome {
                    errors: 1,
                    ..Default::default()
                };
            }
        };

        if expired.is_empty() {
            debug!("Auto-close sweep found no expired tenders");
            return SweepOutcome::default();
        }

        let mut outcome = SweepOutcome::default();
        for tender in &expired {
            match self.close_one(tender, now).await {
                Ok(true) => outcome.closed += 1,
                Ok(false) => outcome.skipped += 1,
                Err(e) => {
                    error!("Auto-close of tender {} failed: {}", tender.reference, e);
                    outcome.errors += 1;
                }
            }
        }

        info!(
            "Auto-close sweep: {} closed, {} skipped, {} errors (batch of {})",
            outcome.closed,
            outcome.skipped,
            outcome.errors,
            expired.len()
        );
        outcome
    }

    /// Returns `Ok(true)` when this run performed the close, `Ok(false)`
    /// when another actor got there first.
    async fn close_one(&self, tender: &TenderRecord, now: DateTime<Utc>) -> Result<bool, EngineError> {
        ensure_opening_report(&self.store, tender, now).await?;

        match self
            .store
            .compare_and_swap_status(tender.id, TenderStatus::Published, TenderStatus::Closed, None)
            .await?
        {
            CasOutcome::Applied(closed) => {
                self.audit
                    .record_system(
                        actions::AUTO_CLOSE,
                        entities::TENDER,
                        closed.id,
                        json!({
                            "previous_status": TenderStatus::Published.as_str(),
                            "new_status": TenderStatus::Closed.as_str(),
                            "deadline": tender.deadline,
                        }),
                    )
                    .await?;
                Ok(true)
            }
            CasOutcome::Conflict => {
                debug!(
                    "Tender {} already transitioned, sweep skipping",
                    tender.reference
                );
                Ok(false)
            }
        }
    }
}
