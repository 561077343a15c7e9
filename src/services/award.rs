//! # Award Orchestrator
//!
//! Applies the award decision on a closed tender. The durable part —
//! winners marked awarded, every other live offer rejected, the tender
//! moved `closed -> awarded`, and the audit entry — commits in one
//! store transaction. If anything in that set cannot apply (most
//! commonly a racing award landing first) the whole set rolls back and
//! the caller sees a state conflict.
//!
//! Notifications and the encrypted decision archive run after commit
//! and are best-effort: their failure is logged, never unwinds the
//! award.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::models::{TenderRecord, TenderStatus};
use crate::error::EngineError;
use crate::services::archive::{ArchiveCipher, ArchiveService};
use crate::services::audit::{actions, entities, AuditLog};
use crate::services::clock::Clock;
use crate::services::notification::NotificationFanout;
use crate::store::{AwardOutcome, NotificationSink, TenderStore};

/// Outcome of a committed award.
#[derive(Debug, Clone)]
pub struct AwardResult {
    pub tender: TenderRecord,
    pub awarded_offers: Vec<Uuid>,
    pub rejected_offers: Vec<Uuid>,
    /// Notifications delivered post-commit.
    pub notified: usize,
    /// Archive id of the encrypted decision document, when archival
    /// succeeded.
    pub archive_id: Option<String>,
}

/// Runs the award decision end to end.
#[derive(Clone)]
pub struct AwardOrchestrator<S, N, C> {
    store: S,
    fanout: NotificationFanout<S, N>,
    archive: ArchiveService<S, C>,
    clock: Arc<dyn Clock>,
}

impl<S, N, C> AwardOrchestrator<S, N, C>
where
    S: TenderStore + Clone,
    N: NotificationSink,
    C: ArchiveCipher,
{
    pub fn new(
        store: S,
        sink: N,
        archive: ArchiveService<S, C>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            fanout: NotificationFanout::new(store.clone(), sink),
            store,
            archive,
            clock,
        }
    }

    /// Award `winner_offer_ids` on a closed tender owned by `actor_id`.
    ///
    /// Multiple winners are permitted (split awards); every winner must
    /// be a live offer on this tender.
    pub async fn award(
        &self,
        actor_id: Uuid,
        tender_id: Uuid,
        winner_offer_ids: Vec<Uuid>,
    ) -> Result<AwardResult, EngineError> {
        if winner_offer_ids.is_empty() {
            return Err(EngineError::Validation(
                "at least one winning offer is required".to_string(),
            ));
        }

        let tender = self
            .store
            .get_tender(tender_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("tender {}", tender_id)))?;
        if tender.buyer_id != actor_id {
            return Err(EngineError::Authorization(format!(
                "actor {} does not own tender {}",
                actor_id, tender.reference
            )));
        }
        if tender.status != TenderStatus::Closed {
            return Err(EngineError::StateConflict(format!(
                "tender {} is {}, only closed tenders can be awarded",
                tender.reference,
                tender.status.as_str()
            )));
        }

        let live_offers = self.store.list_offers(tender_id, true).await?;
        let live_ids: HashSet<Uuid> = live_offers.iter().map(|o| o.id).collect();
        for winner in &winner_offer_ids {
            if !live_ids.contains(winner) {
                return Err(EngineError::Validation(format!(
                    "offer {} is not a live offer on tender {}",
                    winner, tender.reference
                )));
            }
        }

        let audit = AuditLog::<S>::entry(
            Some(actor_id),
            actions::AWARD,
            entities::TENDER,
            Some(tender_id),
            json!({
                "previous_status": TenderStatus::Closed.as_str(),
                "new_status": TenderStatus::Awarded.as_str(),
                "winner_offer_ids": winner_offer_ids,
            }),
        );

        let (awarded_tender, awarded, rejected) = match self
            .store
            .apply_award(tender_id, winner_offer_ids.clone(), audit)
            .await?
        {
            AwardOutcome::Applied {
                tender,
                awarded,
                rejected,
            } => (tender, awarded, rejected),
            AwardOutcome::Conflict => {
                return Err(EngineError::StateConflict(format!(
                    "tender {} changed state during award",
                    tender.reference
                )))
            }
        };

        info!(
            "Tender {} awarded: {} winning, {} rejected offers",
            awarded_tender.reference,
            awarded.len(),
            rejected.len()
        );

        // Post-commit side effects. The award already stands. One
        // notice per supplier, even with several offers on the tender.
        let winner_suppliers: Vec<Uuid> = live_offers
            .iter()
            .filter(|o| awarded.contains(&o.id))
            .map(|o| o.supplier_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let loser_suppliers: Vec<Uuid> = live_offers
            .iter()
            .filter(|o| rejected.contains(&o.id))
            .map(|o| o.supplier_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let report = self
            .fanout
            .notify_award_results(&awarded_tender, &winner_suppliers, &loser_suppliers)
            .await;

        let archive_id = match self
            .archive
            .archive(
                "award_decision",
                tender_id,
                &json!({
                    "tender_id": tender_id,
                    "tender_reference": awarded_tender.reference,
                    "buyer_id": actor_id,
                    "winner_offer_ids": awarded,
                    "rejected_offer_ids": rejected,
                    "decided_at": self.clock.now(),
                }),
                None,
            )
            .await
        {
            Ok(record) => Some(record.archive_id),
            Err(e) => {
                warn!(
                    "Archiving award decision for tender {} failed: {}",
                    awarded_tender.reference, e
                );
                None
            }
        };

        Ok(AwardResult {
            tender: awarded_tender,
            awarded_offers: awarded,
            rejected_offers: rejected,
            notified: report.notified,
            archive_id,
        })
    }
}
