//! # Cancellation
//!
//! Withdraws a draft or published tender. A reason is mandatory and is
//! preserved twice: in the audit trail and in an encrypted archive
//! document. Closed tenders cannot be cancelled — their offers have
//! been opened and the process must finish in an award.

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
use crate::store::{CasOutcome, NotificationSink, TenderStore};

/// Outcome of a committed cancellation.
#[derive(Debug, Clone)]
pub struct CancellationResult {
    pub tender: TenderRecord,
    /// Suppliers with live offers who were told about the withdrawal.
    pub notified: usize,
    pub archive_id: Option<String>,
}

/// Withdraws tenders before their offers are opened.
#[derive(Clone)]
pub struct CancellationService<S, N, C> {
    store: S,
    fanout: NotificationFanout<S, N>,
    audit: AuditLog<S>,
    archive: ArchiveService<S, C>,
    clock: Arc<dyn Clock>,
}

impl<S, N, C> CancellationService<S, N, C>
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
            audit: AuditLog::new(store.clone()),
            store,
            archive,
            clock,
        }
    }

    /// Cancel a draft or published tender owned by `actor_id`.
    pub async fn cancel(
        &self,
        actor_id: Uuid,
        tender_id: Uuid,
        reason: &str,
    ) -> Result<CancellationResult, EngineError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(EngineError::Validation(
                "a cancellation reason is required".to_string(),
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
        if !matches!(tender.status, TenderStatus::Draft | TenderStatus::Published) {
            return Err(EngineError::StateConflict(format!(
                "tender {} is {}, only drafts and published tenders can be cancelled",
                tender.reference,
                tender.status.as_str()
            )));
        }

        let cancelled = match self
            .store
            .compare_and_swap_status(tender_id, tender.status, TenderStatus::Cancelled, None)
            .await?
        {
            CasOutcome::Applied(t) => t,
            CasOutcome::Conflict => {
                return Err(EngineError::StateConflict(format!(
                    "tender {} changed state during cancellation",
                    tender.reference
                )))
            }
        };

        self.audit
            .record_user(
                actor_id,
                actions::CANCEL,
                entities::TENDER,
                tender_id,
                json!({
                    "previous_status": tender.status.as_str(),
                    "new_status": TenderStatus::Cancelled.as_str(),
                    "reason": reason,
                }),
            )
            .await?;

        info!(
            "Tender {} cancelled by buyer {}: {}",
            cancelled.reference, actor_id, reason
        );

        // Post-commit: tell every supplier with a live offer, once.
        // The cancellation already stands; a store failure here is
        // logged, never surfaced as a failed cancellation.
        let supplier_ids: Vec<Uuid> = match self.store.list_offers(tender_id, true).await {
            Ok(live_offers) => live_offers
                .iter()
                .map(|o| o.supplier_id)
                .collect::<HashSet<_>>()
                .into_iter()
                .collect(),
            Err(e) => {
                warn!(
                    "Listing offers for cancelled tender {} failed, skipping fan-out: {}",
                    cancelled.reference, e
                );
                Vec::new()
            }
        };
        let report = self
            .fanout
            .notify_tender_cancelled(&cancelled, &supplier_ids)
            .await;

        let archive_id = match self
            .archive
            .archive(
                "tender_cancellation",
                tender_id,
                &json!({
                    "tender_id": tender_id,
                    "tender_reference": cancelled.reference,
                    "buyer_id": actor_id,
                    "previous_status": tender.status.as_str(),
                    "reason": reason,
                    "cancelled_at": self.clock.now(),
                }),
                None,
            )
            .await
        {
            Ok(record) => Some(record.archive_id),
            Err(e) => {
                warn!(
                    "Archiving cancellation of tender {} failed: {}",
                    cancelled.reference, e
                );
                None
            }
        };

        Ok(CancellationResult {
            tender: cancelled,
            notified: report.notified,
            archive_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{NotificationKind, OfferRecord, OfferStatus};
    use crate::services::archive::AesGcmCipher;
    use crate::services::clock::SystemClock;
    use crate::store::MemoryStore;
    use chrono::Utc;

    fn service(
        store: &MemoryStore,
    ) -> CancellationService<MemoryStore, MemoryStore, AesGcmCipher> {
        let cipher = AesGcmCipher::from_secret("cancel-test-secret").unwrap();
        let archive = ArchiveService::new(store.clone(), cipher, Arc::new(SystemClock), 7);
        CancellationService::new(store.clone(), store.clone(), archive, Arc::new(SystemClock))
    }

    fn tender(buyer_id: Uuid, status: TenderStatus) -> TenderRecord {
        TenderRecord {
            id: Uuid::new_v4(),
            reference: "TND-20260823-0BADF00D".to_string(),
            title: "Catering framework".to_string(),
            description: String::new(),
            category: "catering".to_string(),
            location: "Vienna".to_string(),
            budget_min: 30_000,
            budget_max: 60_000,
            deadline: Some(Utc::now()),
            status,
            buyer_id,
            is_public: true,
            is_deleted: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn offer(tender_id: Uuid, supplier_id: Uuid) -> OfferRecord {
        OfferRecord {
            id: Uuid::new_v4(),
            tender_id,
            supplier_id,
            amount: 35_000,
            status: OfferStatus::Submitted,
            submitted_at: Utc::now(),
            is_deleted: false,
        }
    }

    #[tokio::test]
    async fn cancels_published_tender_and_notifies_offerers() {
        let store = MemoryStore::new();
        let buyer = Uuid::new_v4();
        let t = tender(buyer, TenderStatus::Published);
        store.create_tender(t.clone()).await.unwrap();
        let supplier = Uuid::new_v4();
        store.insert_offer(offer(t.id, supplier)).await.unwrap();
        // A second offer from the same supplier must not double-notify.
        store.insert_offer(offer(t.id, supplier)).await.unwrap();

        let result = service(&store)
            .cancel(buyer, t.id, "Budget withdrawn")
            .await
            .unwrap();

        assert_eq!(result.tender.status, TenderStatus::Cancelled);
        assert_eq!(result.notified, 1);
        let notifications = store.notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].kind, NotificationKind::TenderCancelled);
        assert!(result.archive_id.is_some());

        let entries = store.audit_for_entity(t.id).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, actions::CANCEL);
    }

    #[tokio::test]
    async fn requires_a_reason() {
        let store = MemoryStore::new();
        let buyer = Uuid::new_v4();
        let t = tender(buyer, TenderStatus::Draft);
        store.create_tender(t.clone()).await.unwrap();

        assert!(matches!(
            service(&store).cancel(buyer, t.id, "  ").await,
            Err(EngineError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn closed_and_terminal_tenders_cannot_be_cancelled() {
        let store = MemoryStore::new();
        let buyer = Uuid::new_v4();
        let svc = service(&store);

        for status in [
            TenderStatus::Closed,
            TenderStatus::Awarded,
            TenderStatus::Cancelled,
        ] {
            let t = tender(buyer, status);
            store.create_tender(t.clone()).await.unwrap();
            assert!(
                matches!(
                    svc.cancel(buyer, t.id, "too late").await,
                    Err(EngineError::StateConflict(_))
                ),
                "cancel must fail from {:?}",
                status
            );
        }
    }

    #[tokio::test]
    async fn fan_out_failure_does_not_undo_the_cancellation() {
        let store = MemoryStore::new();
        let buyer = Uuid::new_v4();
        let t = tender(buyer, TenderStatus::Published);
        store.create_tender(t.clone()).await.unwrap();
        store.insert_offer(offer(t.id, Uuid::new_v4())).await.unwrap();
        store.fail_offer_listing(true);

        let result = service(&store)
            .cancel(buyer, t.id, "supplier base too thin")
            .await
            .unwrap();

        assert_eq!(result.tender.status, TenderStatus::Cancelled);
        assert_eq!(result.notified, 0);
        assert!(store.notifications().is_empty());

        store.fail_offer_listing(false);
        assert_eq!(
            store.get_tender(t.id).await.unwrap().unwrap().status,
            TenderStatus::Cancelled
        );
        let entries = store.audit_for_entity(t.id).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, actions::CANCEL);
    }

    #[tokio::test]
    async fn only_the_owner_can_cancel() {
        let store = MemoryStore::new();
        let buyer = Uuid::new_v4();
        let t = tender(buyer, TenderStatus::Draft);
        store.create_tender(t.clone()).await.unwrap();

        assert!(matches!(
            service(&store).cancel(Uuid::new_v4(), t.id, "not mine").await,
            Err(EngineError::Authorization(_))
        ));
    }
}
