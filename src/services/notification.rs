//! # Notification Fan-out
//!
//! Matches a tender-lifecycle event against the supplier population
//! and emits one notification record per match.
//!
//! ## Matching Rules (tender-published events)
//!
//! A supplier matches when ALL of the following hold:
//!
//! 1. preferred-category list is empty OR contains the tender's category
//! 2. preferred-location list is empty OR contains the tender's location
//! 3. tender's minimum budget >= supplier's minimum-acceptable budget
//! 4. the supplier is verified
//!
//! An empty preference list is "no constraint", not "matches nothing":
//! suppliers who have not configured preferences still receive
//! opportunities.
//!
//! ## Failure Isolation
//!
//! A failure delivering to one recipient never prevents attempts for
//! the rest; failures are logged and counted in the returned report.

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::models::{
    NotificationKind, NotificationRecord, SupplierProfile, TenderRecord,
};
use crate::error::EngineError;
use crate::store::{NotificationSink, TenderStore};

/// Outcome of one fan-out pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutReport {
    /// Notifications successfully delivered.
    pub notified: usize,
    /// Size of the population considered.
    pub total: usize,
    /// Deliveries that failed (logged, not raised).
    pub failed: usize,
}

/// Whether a supplier's affinity rules match a tender.
pub fn supplier_matches(supplier: &SupplierProfile, tender: &TenderRecord) -> bool {
    if !supplier.is_verified {
        return false;
    }
    let category_ok = supplier.preferred_categories.is_empty()
        || supplier.preferred_categories.contains(&tender.category);
    let location_ok = supplier.preferred_locations.is_empty()
        || supplier.preferred_locations.contains(&tender.location);
    let budget_ok = tender.budget_min >= supplier.min_budget;
    category_ok && location_ok && budget_ok
}

/// Fans tender events out to interested suppliers.
#[derive(Clone)]
pub struct NotificationFanout<S, N> {
    store: S,
    sink: N,
}

impl<S: TenderStore, N: NotificationSink> NotificationFanout<S, N> {
    pub fn new(store: S, sink: N) -> Self {
        Self { store, sink }
    }

    /// Notify every matching supplier that a tender was published.
    ///
    /// Returns `{notified, total}` over the active-supplier
    /// population for observability.
    pub async fn notify_tender_published(
        &self,
        tender: &TenderRecord,
    ) -> Result<FanoutReport, EngineError> {
        let suppliers = self.store.list_active_suppliers().await?;
        let total = suppliers.len();

        let mut report = FanoutReport {
            total,
            ..Default::default()
        };

        for supplier in suppliers {
            if !supplier_matches(&supplier, tender) {
                continue;
            }
            let notification = self.build(
                supplier.id,
                NotificationKind::TenderPublished,
                "New tender opportunity",
                format!(
                    "Tender {} \"{}\" in category {} is open for offers.",
                    tender.reference, tender.title, tender.category
                ),
                tender.id,
            );
            self.try_deliver(notification, &mut report).await;
        }

        info!(
            "Tender {} published: notified {}/{} suppliers",
            tender.reference, report.notified, report.total
        );
        Ok(report)
    }

    /// Notify winners and losers after an award commits.
    ///
    /// The rejection notice is deliberately neutral: it never reveals
    /// competitor identities or prices.
    pub async fn notify_award_results(
        &self,
        tender: &TenderRecord,
        winner_suppliers: &[Uuid],
        loser_suppliers: &[Uuid],
    ) -> FanoutReport {
        let mut report = FanoutReport {
            total: winner_suppliers.len() + loser_suppliers.len(),
            ..Default::default()
        };

        for &supplier_id in winner_suppliers {
            let notification = self.build(
                supplier_id,
                NotificationKind::OfferAwarded,
                "Offer awarded",
                format!(
                    "Congratulations: your offer on tender {} \"{}\" was awarded.",
                    tender.reference, tender.title
                ),
                tender.id,
            );
            self.try_deliver(notification, &mut report).await;
        }

        for &supplier_id in loser_suppliers {
            let notification = self.build(
                supplier_id,
                NotificationKind::OfferRejected,
                "Tender awarded",
                format!(
                    "Tender {} \"{}\" has been awarded. Your offer was not selected.",
                    tender.reference, tender.title
                ),
                tender.id,
            );
            self.try_deliver(notification, &mut report).await;
        }

        report
    }

    /// Notify suppliers with live offers that a tender was withdrawn.
    pub async fn notify_tender_cancelled(
        &self,
        tender: &TenderRecord,
        supplier_ids: &[Uuid],
    ) -> FanoutReport {
        let mut report = FanoutReport {
            total: supplier_ids.len(),
            ..Default::default()
        };

        for &supplier_id in supplier_ids {
            let notification = self.build(
                supplier_id,
                NotificationKind::TenderCancelled,
                "Tender withdrawn",
                format!(
                    "Tender {} \"{}\" has been withdrawn by the buyer.",
                    tender.reference, tender.title
                ),
                tender.id,
            );
            self.try_deliver(notification, &mut report).await;
        }

        report
    }

    fn build(
        &self,
        recipient_id: Uuid,
        kind: NotificationKind,
        title: &str,
        message: String,
        tender_id: Uuid,
    ) -> NotificationRecord {
        NotificationRecord {
            id: Uuid::new_v4(),
            recipient_id,
            kind,
            title: title.to_string(),
            message,
            entity_type: "tender".to_string(),
            entity_id: tender_id,
            is_read: false,
            created_at: Utc::now(),
        }
    }

    async fn try_deliver(&self, notification: NotificationRecord, report: &mut FanoutReport) {
        let recipient = notification.recipient_id;
        match self.sink.deliver(notification).await {
            Ok(()) => {
                debug!("Notified supplier {}", recipient);
                report.notified += 1;
            }
            Err(e) => {
                warn!("Failed to notify supplier {}: {}", recipient, e);
                report.failed += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, StoreError, StoreResult};
    use chrono::Utc;

    /// Sink that refuses delivery to one recipient and passes the rest
    /// through to the backing store.
    struct FlakySink {
        store: MemoryStore,
        failing_recipient: Uuid,
    }

    impl NotificationSink for FlakySink {
        async fn deliver(&self, notification: NotificationRecord) -> StoreResult<()> {
            if notification.recipient_id == self.failing_recipient {
                return Err(StoreError::Backend("delivery refused".to_string()));
            }
            self.store.deliver(notification).await
        }
    }

    fn supplier(
        categories: &[&str],
        locations: &[&str],
        min_budget: i64,
        verified: bool,
    ) -> SupplierProfile {
        SupplierProfile {
            id: Uuid::new_v4(),
            preferred_categories: categories.iter().map(|s| s.to_string()).collect(),
            preferred_locations: locations.iter().map(|s| s.to_string()).collect(),
            min_budget,
            is_verified: verified,
            is_active: true,
        }
    }

    fn tender(category: &str, location: &str, budget_min: i64) -> TenderRecord {
        TenderRecord {
            id: Uuid::new_v4(),
            reference: "TND-20260823-00FF00FF".to_string(),
            title: "Office refurbishment".to_string(),
            description: String::new(),
            category: category.to_string(),
            location: location.to_string(),
            budget_min,
            budget_max: budget_min * 2,
            deadline: Some(Utc::now()),
            status: crate::db::models::TenderStatus::Published,
            buyer_id: Uuid::new_v4(),
            is_public: true,
            is_deleted: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn empty_preference_lists_match_everything() {
        let s = supplier(&[], &[], 0, true);
        assert!(supplier_matches(&s, &tender("construction", "Berlin", 10_000)));
        assert!(supplier_matches(&s, &tender("catering", "Lagos", 1)));
    }

    #[test]
    fn category_and_location_must_both_match_when_set() {
        let s = supplier(&["construction"], &["Berlin"], 0, true);
        assert!(supplier_matches(&s, &tender("construction", "Berlin", 100)));
        assert!(!supplier_matches(&s, &tender("catering", "Berlin", 100)));
        assert!(!supplier_matches(&s, &tender("construction", "Hamburg", 100)));
    }

    #[test]
    fn budget_threshold_is_inclusive() {
        let s = supplier(&[], &[], 5_000, true);
        assert!(supplier_matches(&s, &tender("any", "any", 5_000)));
        assert!(!supplier_matches(&s, &tender("any", "any", 4_999)));
    }

    #[test]
    fn unverified_suppliers_never_match() {
        let s = supplier(&[], &[], 0, false);
        assert!(!supplier_matches(&s, &tender("construction", "Berlin", 10_000)));
    }

    #[tokio::test]
    async fn one_failed_delivery_does_not_block_the_rest() {
        let store = MemoryStore::new();
        let s1 = supplier(&[], &[], 0, true);
        let s2 = supplier(&[], &[], 0, true);
        let s3 = supplier(&[], &[], 0, true);
        for s in [&s1, &s2, &s3] {
            store.add_supplier(s.clone());
        }

        let sink = FlakySink {
            store: store.clone(),
            failing_recipient: s2.id,
        };
        let fanout = NotificationFanout::new(store.clone(), sink);
        let report = fanout
            .notify_tender_published(&tender("construction", "Berlin", 10_000))
            .await
            .unwrap();

        assert_eq!(report.total, 3);
        assert_eq!(report.notified, 2);
        assert_eq!(report.failed, 1);

        let recipients: Vec<Uuid> = store
            .notifications()
            .iter()
            .map(|n| n.recipient_id)
            .collect();
        assert!(recipients.contains(&s1.id));
        assert!(recipients.contains(&s3.id));
        assert!(!recipients.contains(&s2.id));
    }
}
