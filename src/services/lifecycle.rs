//! # Tender Lifecycle
//!
//! Draft creation, publication, closing, and offer submission. Every
//! transition goes through the store's compare-and-swap so concurrent
//! actors cannot double-apply a move; the loser of a race gets a
//! state-conflict error and the tender is left exactly once-moved.
//!
//! | Operation | Transition | Side effects |
//! |-----------|------------|--------------|
//! | `create_tender` | (new) -> draft | — |
//! | `publish_tender` | draft -> published | audit, supplier fan-out |
//! | `close_tender` | published -> closed | opening report, audit |
//! | `submit_offer` | — | offer row, audit |

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::models::{OfferRecord, OfferStatus, TenderRecord, TenderStatus};
use crate::error::EngineError;
use crate::services::audit::{actions, entities, AuditLog};
use crate::services::clock::Clock;
use crate::services::notification::NotificationFanout;
use crate::services::opening_report::ensure_opening_report;
use crate::store::{CasOutcome, NotificationSink, TenderStore};
use crate::utils;

/// Input for draft creation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTender {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: String,
    pub location: String,
    pub budget_min: i64,
    pub budget_max: i64,
    #[serde(default = "default_public")]
    pub is_public: bool,
}

fn default_public() -> bool {
    true
}

/// Runs the tender state machine.
#[derive(Clone)]
pub struct TenderLifecycle<S, N> {
    store: S,
    fanout: NotificationFanout<S, N>,
    audit: AuditLog<S>,
    clock: Arc<dyn Clock>,
}

impl<S: TenderStore + Clone, N: NotificationSink> TenderLifecycle<S, N> {
    pub fn new(store: S, sink: N, clock: Arc<dyn Clock>) -> Self {
        Self {
            fanout: NotificationFanout::new(store.clone(), sink),
            audit: AuditLog::new(store.clone()),
            store,
            clock,
        }
    }

    /// Create a tender in `draft`. Drafts are invisible to suppliers
    /// and carry no deadline until published.
    pub async fn create_tender(
        &self,
        buyer_id: Uuid,
        input: NewTender,
    ) -> Result<TenderRecord, EngineError> {
        let title = input.title.trim();
        if title.is_empty() {
            return Err(EngineError::Validation("title must not be empty".to_string()));
        }
        if input.budget_min < 0 || input.budget_max < input.budget_min {
            return Err(EngineError::Validation(
                "budget range must satisfy 0 <= min <= max".to_string(),
            ));
        }

        let now = self.clock.now();
        let tender = TenderRecord {
            id: Uuid::new_v4(),
            reference: utils::tender_reference(now),
            title: title.to_string(),
            description: input.description,
            category: input.category,
            location: input.location,
            budget_min: input.budget_min,
            budget_max: input.budget_max,
            deadline: None,
            status: TenderStatus::Draft,
            buyer_id,
            is_public: input.is_public,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        };
        self.store.create_tender(tender.clone()).await?;
        info!("Created tender {} (draft) for buyer {}", tender.reference, buyer_id);
        Ok(tender)
    }

    /// Publish a draft, setting its offer deadline and fanning the
    /// opportunity out to matching suppliers.
    ///
    /// The fan-out runs after the transition commits and is
    /// best-effort: a delivery failure never unpublishes the tender.
    pub async fn publish_tender(
        &self,
        actor_id: Uuid,
        tender_id: Uuid,
        deadline: DateTime<Utc>,
    ) -> Result<TenderRecord, EngineError> {
        let tender = self.fetch(tender_id).await?;
        self.require_owner(&tender, actor_id)?;

        let now = self.clock.now();
        if deadline <= now {
            return Err(EngineError::Validation(
                "deadline must be in the future".to_string(),
            ));
        }

        let published = match self
            .store
            .compare_and_swap_status(
                tender_id,
                TenderStatus::Draft,
                TenderStatus::Published,
                Some(deadline),
            )
            .await?
        {
            CasOutcome::Applied(t) => t,
            CasOutcome::Conflict => {
                return Err(EngineError::StateConflict(format!(
                    "tender {} is not a draft",
                    tender.reference
                )))
            }
        };

        self.audit
            .record_user(
                actor_id,
                actions::PUBLISH,
                entities::TENDER,
                tender_id,
                json!({
                    "previous_status": TenderStatus::Draft.as_str(),
                    "new_status": TenderStatus::Published.as_str(),
                    "deadline": deadline,
                }),
            )
            .await?;

        if let Err(e) = self.fanout.notify_tender_published(&published).await {
            warn!(
                "Supplier fan-out for tender {} failed: {}",
                published.reference, e
            );
        }

        Ok(published)
    }

    /// Close a published tender manually, ahead of (or at) its
    /// deadline. The opening report is generated before the transition
    /// lands, so a closed tender always has its report.
    pub async fn close_tender(
        &self,
        actor_id: Uuid,
        tender_id: Uuid,
    ) -> Result<TenderRecord, EngineError> {
        let tender = self.fetch(tender_id).await?;
        self.require_owner(&tender, actor_id)?;
        if tender.status != TenderStatus::Published {
            return Err(EngineError::StateConflict(format!(
                "tender {} is {}, only published tenders close",
                tender.reference,
                tender.status.as_str()
            )));
        }

        let now = self.clock.now();
        ensure_opening_report(&self.store, &tender, now).await?;

        let closed = match self
            .store
            .compare_and_swap_status(tender_id, TenderStatus::Published, TenderStatus::Closed, None)
            .await?
        {
            CasOutcome::Applied(t) => t,
            // Lost a race against the sweep; the tender is closed
            // either way, but this caller did not perform it.
            CasOutcome::Conflict => {
                return Err(EngineError::StateConflict(format!(
                    "tender {} was already closed",
                    tender.reference
                )))
            }
        };

        self.audit
            .record_user(
                actor_id,
                actions::CLOSE,
                entities::TENDER,
                tender_id,
                json!({
                    "previous_status": TenderStatus::Published.as_str(),
                    "new_status": TenderStatus::Closed.as_str(),
                }),
            )
            .await?;

        info!("Tender {} closed by buyer {}", closed.reference, actor_id);
        Ok(closed)
    }

    /// Submit an offer on a published tender whose deadline has not
    /// passed.
    pub async fn submit_offer(
        &self,
        supplier_id: Uuid,
        tender_id: Uuid,
        amount: i64,
    ) -> Result<OfferRecord, EngineError> {
        if amount <= 0 {
            return Err(EngineError::Validation(
                "offer amount must be positive".to_string(),
            ));
        }

        let tender = self.fetch(tender_id).await?;
        if tender.status != TenderStatus::Published {
            return Err(EngineError::StateConflict(format!(
                "tender {} is not accepting offers",
                tender.reference
            )));
        }
        let now = self.clock.now();
        if let Some(deadline) = tender.deadline {
            if now > deadline {
                return Err(EngineError::StateConflict(format!(
                    "tender {} deadline has passed",
                    tender.reference
                )));
            }
        }

        let offer = OfferRecord {
            id: Uuid::new_v4(),
            tender_id,
            supplier_id,
            amount,
            status: OfferStatus::Submitted,
            submitted_at: now,
            is_deleted: false,
        };
        self.store.insert_offer(offer.clone()).await?;

        self.audit
            .record_user(
                supplier_id,
                actions::OFFER_SUBMIT,
                entities::OFFER,
                offer.id,
                json!({ "tender_id": tender_id, "amount": amount }),
            )
            .await?;

        Ok(offer)
    }

    /// Mark a notification read. Only the recipient may do so.
    pub async fn mark_notification_read(
        &self,
        recipient_id: Uuid,
        notification_id: Uuid,
    ) -> Result<(), EngineError> {
        let updated = self
            .store
            .mark_notification_read(notification_id, recipient_id)
            .await?;
        if !updated {
            return Err(EngineError::NotFound(format!(
                "notification {} for recipient {}",
                notification_id, recipient_id
            )));
        }
        Ok(())
    }

    async fn fetch(&self, tender_id: Uuid) -> Result<TenderRecord, EngineError> {
        self.store
            .get_tender(tender_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("tender {}", tender_id)))
    }

    fn require_owner(&self, tender: &TenderRecord, actor_id: Uuid) -> Result<(), EngineError> {
        if tender.buyer_id != actor_id {
            return Err(EngineError::Authorization(format!(
                "actor {} does not own tender {}",
                actor_id, tender.reference
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::clock::ManualClock;
    use crate::store::MemoryStore;
    use chrono::Duration;

    fn lifecycle(
        store: &MemoryStore,
        clock: &ManualClock,
    ) -> TenderLifecycle<MemoryStore, MemoryStore> {
        TenderLifecycle::new(store.clone(), store.clone(), Arc::new(clock.clone()))
    }

    fn draft_input() -> NewTender {
        NewTender {
            title: "Warehouse security".to_string(),
            description: "24/7 coverage".to_string(),
            category: "security".to_string(),
            location: "Munich".to_string(),
            budget_min: 20_000,
            budget_max: 80_000,
            is_public: true,
        }
    }

    #[tokio::test]
    async fn create_validates_title_and_budget() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(Utc::now());
        let svc = lifecycle(&store, &clock);
        let buyer = Uuid::new_v4();

        let mut bad = draft_input();
        bad.title = "   ".to_string();
        assert!(matches!(
            svc.create_tender(buyer, bad).await,
            Err(EngineError::Validation(_))
        ));

        let mut bad = draft_input();
        bad.budget_max = bad.budget_min - 1;
        assert!(matches!(
            svc.create_tender(buyer, bad).await,
            Err(EngineError::Validation(_))
        ));

        let tender = svc.create_tender(buyer, draft_input()).await.unwrap();
        assert_eq!(tender.status, TenderStatus::Draft);
        assert!(tender.reference.starts_with("TND-"));
        assert!(tender.deadline.is_none());
    }

    #[tokio::test]
    async fn publish_requires_ownership_and_future_deadline() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(Utc::now());
        let svc = lifecycle(&store, &clock);
        let buyer = Uuid::new_v4();
        let tender = svc.create_tender(buyer, draft_input()).await.unwrap();

        let stranger = Uuid::new_v4();
        assert!(matches!(
            svc.publish_tender(stranger, tender.id, clock.now() + Duration::days(7))
                .await,
            Err(EngineError::Authorization(_))
        ));

        assert!(matches!(
            svc.publish_tender(buyer, tender.id, clock.now() - Duration::hours(1))
                .await,
            Err(EngineError::Validation(_))
        ));

        let published = svc
            .publish_tender(buyer, tender.id, clock.now() + Duration::days(7))
            .await
            .unwrap();
        assert_eq!(published.status, TenderStatus::Published);
        assert!(published.deadline.is_some());

        // Double publish conflicts.
        assert!(matches!(
            svc.publish_tender(buyer, tender.id, clock.now() + Duration::days(7))
                .await,
            Err(EngineError::StateConflict(_))
        ));
    }

    #[tokio::test]
    async fn offers_are_gated_by_status_and_deadline() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(Utc::now());
        let svc = lifecycle(&store, &clock);
        let buyer = Uuid::new_v4();
        let supplier = Uuid::new_v4();
        let tender = svc.create_tender(buyer, draft_input()).await.unwrap();

        // Draft tenders accept nothing.
        assert!(matches!(
            svc.submit_offer(supplier, tender.id, 25_000).await,
            Err(EngineError::StateConflict(_))
        ));

        svc.publish_tender(buyer, tender.id, clock.now() + Duration::days(3))
            .await
            .unwrap();
        let offer = svc.submit_offer(supplier, tender.id, 25_000).await.unwrap();
        assert_eq!(offer.status, OfferStatus::Submitted);

        assert!(matches!(
            svc.submit_offer(supplier, tender.id, 0).await,
            Err(EngineError::Validation(_))
        ));

        clock.advance(Duration::days(4));
        assert!(matches!(
            svc.submit_offer(supplier, tender.id, 30_000).await,
            Err(EngineError::StateConflict(_))
        ));
    }

    #[tokio::test]
    async fn close_generates_report_then_transitions() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(Utc::now());
        let svc = lifecycle(&store, &clock);
        let buyer = Uuid::new_v4();
        let tender = svc.create_tender(buyer, draft_input()).await.unwrap();
        svc.publish_tender(buyer, tender.id, clock.now() + Duration::days(3))
            .await
            .unwrap();
        svc.submit_offer(Uuid::new_v4(), tender.id, 30_000)
            .await
            .unwrap();

        let closed = svc.close_tender(buyer, tender.id).await.unwrap();
        assert_eq!(closed.status, TenderStatus::Closed);
        let report = store.opening_report(tender.id).await.unwrap().unwrap();
        assert_eq!(report.offers.len(), 1);

        // Closing twice conflicts.
        assert!(matches!(
            svc.close_tender(buyer, tender.id).await,
            Err(EngineError::StateConflict(_))
        ));
    }

    #[tokio::test]
    async fn mark_read_is_recipient_scoped() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(Utc::now());
        let svc = lifecycle(&store, &clock);

        let recipient = Uuid::new_v4();
        let notification = crate::db::models::NotificationRecord {
            id: Uuid::new_v4(),
            recipient_id: recipient,
            kind: crate::db::models::NotificationKind::TenderPublished,
            title: "t".to_string(),
            message: "m".to_string(),
            entity_type: "tender".to_string(),
            entity_id: Uuid::new_v4(),
            is_read: false,
            created_at: Utc::now(),
        };
        store.deliver(notification.clone()).await.unwrap();

        assert!(matches!(
            svc.mark_notification_read(Uuid::new_v4(), notification.id)
                .await,
            Err(EngineError::NotFound(_))
        ));
        svc.mark_notification_read(recipient, notification.id)
            .await
            .unwrap();
        assert!(store.notifications()[0].is_read);
    }
}
