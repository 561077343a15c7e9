//! # Opening Report
//!
//! Snapshots the live offers of a tender at the moment it closes. The
//! report is generated exactly once per tender: a second generation
//! attempt (manual close racing the sweep, a retried sweep run) finds
//! the existing report and does nothing. Offers edited after closing
//! never alter the snapshot.

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::models::{OfferSnapshot, OpeningReportRecord, TenderRecord};
use crate::error::EngineError;
use crate::store::TenderStore;

/// Generate the opening report for `tender` if none exists yet.
///
/// Returns `true` when this call created the report, `false` when a
/// report was already present. Both outcomes are success: the caller
/// only needs the report to exist before the close transition lands.
pub async fn ensure_opening_report<S: TenderStore>(
    store: &S,
    tender: &TenderRecord,
    now: DateTime<Utc>,
) -> Result<bool, EngineError> {
    if store.opening_report(tender.id).await?.is_some() {
        debug!("Opening report for tender {} already exists", tender.reference);
        return Ok(false);
    }

    let offers = store.list_offers(tender.id, true).await?;
    let snapshots: Vec<OfferSnapshot> = offers
        .iter()
        .map(|o| OfferSnapshot {
            offer_id: o.id,
            supplier_id: o.supplier_id,
            amount: o.amount,
            submitted_at: o.submitted_at,
        })
        .collect();
    let count = snapshots.len();

    let created = store
        .insert_opening_report(OpeningReportRecord {
            id: Uuid::new_v4(),
            tender_id: tender.id,
            buyer_id: tender.buyer_id,
            offers: snapshots,
            generated_at: now,
        })
        .await?;

    if created {
        info!(
            "Generated opening report for tender {} ({} offers)",
            tender.reference, count
        );
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{OfferRecord, OfferStatus, TenderStatus};
    use crate::store::MemoryStore;

    fn tender() -> TenderRecord {
        TenderRecord {
            id: Uuid::new_v4(),
            reference: "TND-20260823-0A0B0C0D".to_string(),
            title: "Fleet maintenance".to_string(),
            description: String::new(),
            category: "logistics".to_string(),
            location: "Rotterdam".to_string(),
            budget_min: 10_000,
            budget_max: 50_000,
            deadline: Some(Utc::now()),
            status: TenderStatus::Published,
            buyer_id: Uuid::new_v4(),
            is_public: true,
            is_deleted: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn offer(tender_id: Uuid, amount: i64, status: OfferStatus) -> OfferRecord {
        OfferRecord {
            id: Uuid::new_v4(),
            tender_id,
            supplier_id: Uuid::new_v4(),
            amount,
            status,
            submitted_at: Utc::now(),
            is_deleted: false,
        }
    }

    #[tokio::test]
    async fn snapshots_only_live_offers() {
        let store = MemoryStore::new();
        let t = tender();
        store.create_tender(t.clone()).await.unwrap();
        store
            .insert_offer(offer(t.id, 12_000, OfferStatus::Submitted))
            .await
            .unwrap();
        store
            .insert_offer(offer(t.id, 14_000, OfferStatus::Received))
            .await
            .unwrap();
        store
            .insert_offer(offer(t.id, 9_000, OfferStatus::Rejected))
            .await
            .unwrap();

        assert!(ensure_opening_report(&store, &t, Utc::now()).await.unwrap());
        let report = store.opening_report(t.id).await.unwrap().unwrap();
        assert_eq!(report.offers.len(), 2);
        assert_eq!(report.buyer_id, t.buyer_id);
    }

    #[tokio::test]
    async fn second_generation_is_a_no_op() {
        let store = MemoryStore::new();
        let t = tender();
        store.create_tender(t.clone()).await.unwrap();
        store
            .insert_offer(offer(t.id, 12_000, OfferStatus::Submitted))
            .await
            .unwrap();

        assert!(ensure_opening_report(&store, &t, Utc::now()).await.unwrap());
        let first = store.opening_report(t.id).await.unwrap().unwrap();

        // A later offer must not leak into the frozen snapshot.
        store
            .insert_offer(offer(t.id, 1, OfferStatus::Submitted))
            .await
            .unwrap();
        assert!(!ensure_opening_report(&store, &t, Utc::now()).await.unwrap());

        let second = store.opening_report(t.id).await.unwrap().unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.offers, first.offers);
    }

    #[tokio::test]
    async fn empty_offer_set_still_produces_a_report() {
        let store = MemoryStore::new();
        let t = tender();
        store.create_tender(t.clone()).await.unwrap();

        assert!(ensure_opening_report(&store, &t, Utc::now()).await.unwrap());
        let report = store.opening_report(t.id).await.unwrap().unwrap();
        assert!(report.offers.is_empty());
    }
}
