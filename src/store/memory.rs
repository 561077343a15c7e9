//! In-memory implementation of the store seam.
//!
//! Backs the test suite and local demos. Mutations take a single
//! process-wide lock, which gives the same observable atomicity as
//! the Postgres transactions: a CAS conflict leaves nothing changed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::models::{
    ArchiveRecord, ArchiveStatus, AuditLogRecord, NotificationRecord, OfferRecord,
    OpeningReportRecord, SupplierProfile, TenderRecord, TenderStatus,
};

use super::{AwardOutcome, CasOutcome, NotificationSink, StoreError, StoreResult, TenderStore};

#[derive(Default)]
struct Inner {
    tenders: HashMap<Uuid, TenderRecord>,
    offers: HashMap<Uuid, OfferRecord>,
    reports: HashMap<Uuid, OpeningReportRecord>,
    archives: HashMap<String, ArchiveRecord>,
    notifications: Vec<NotificationRecord>,
    audits: Vec<AuditLogRecord>,
    suppliers: Vec<SupplierProfile>,
    fail_offer_listing: bool,
}

/// Shared-handle in-memory store. Cloning shares the same state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Seed a supplier row (test/demo helper; in production the
    /// marketplace's user management owns these).
    pub fn add_supplier(&self, supplier: SupplierProfile) {
        self.lock().suppliers.push(supplier);
    }

    /// Force a tender into an arbitrary status, bypassing the state
    /// machine. Test/demo helper for constructing race scenarios.
    pub fn force_status(&self, id: Uuid, status: TenderStatus) {
        if let Some(tender) = self.lock().tenders.get_mut(&id) {
            tender.status = status;
        }
    }

    /// Snapshot of every delivered notification.
    pub fn notifications(&self) -> Vec<NotificationRecord> {
        self.lock().notifications.clone()
    }

    /// Snapshot of one offer row.
    pub fn offer(&self, id: Uuid) -> Option<OfferRecord> {
        self.lock().offers.get(&id).cloned()
    }

    /// Replace a stored archive record (test helper for tamper cases).
    pub fn overwrite_archive(&self, record: ArchiveRecord) {
        self.lock()
            .archives
            .insert(record.archive_id.clone(), record);
    }

    /// Make subsequent offer listings fail (test helper for exercising
    /// post-commit fault handling).
    pub fn fail_offer_listing(&self, fail: bool) {
        self.lock().fail_offer_listing = fail;
    }
}

impl TenderStore for MemoryStore {
    async fn create_tender(&self, tender: TenderRecord) -> StoreResult<()> {
        self.lock().tenders.insert(tender.id, tender);
        Ok(())
    }

    async fn get_tender(&self, id: Uuid) -> StoreResult<Option<TenderRecord>> {
        Ok(self
            .lock()
            .tenders
            .get(&id)
            .filter(|t| !t.is_deleted)
            .cloned())
    }

    async fn compare_and_swap_status(
        &self,
        id: Uuid,
        expected: TenderStatus,
        new: TenderStatus,
        deadline: Option<DateTime<Utc>>,
    ) -> StoreResult<CasOutcome> {
        if !expected.can_transition_to(new) {
            return Ok(CasOutcome::Conflict);
        }
        let mut inner = self.lock();
        match inner.tenders.get_mut(&id) {
            Some(tender) if !tender.is_deleted && tender.status == expected => {
                tender.status = new;
                if deadline.is_some() {
                    tender.deadline = deadline;
                }
                tender.updated_at = Utc::now();
                Ok(CasOutcome::Applied(tender.clone()))
            }
            _ => Ok(CasOutcome::Conflict),
        }
    }

    async fn list_expired_published(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> StoreResult<Vec<TenderRecord>> {
        let inner = self.lock();
        let mut expired: Vec<TenderRecord> = inner
            .tenders
            .values()
            .filter(|t| {
                !t.is_deleted
                    && t.status == TenderStatus::Published
                    && t.deadline.map(|d| d < now).unwrap_or(false)
            })
            .cloned()
            .collect();
        expired.sort_by_key(|t| t.deadline);
        expired.truncate(limit.max(0) as usize);
        Ok(expired)
    }

    async fn insert_offer(&self, offer: OfferRecord) -> StoreResult<()> {
        self.lock().offers.insert(offer.id, offer);
        Ok(())
    }

    async fn list_offers(&self, tender_id: Uuid, live_only: bool) -> StoreResult<Vec<OfferRecord>> {
        let inner = self.lock();
        if inner.fail_offer_listing {
            return Err(StoreError::Backend("offer listing unavailable".to_string()));
        }
        let mut offers: Vec<OfferRecord> = inner
            .offers
            .values()
            .filter(|o| {
                o.tender_id == tender_id
                    && !o.is_deleted
                    && (!live_only || o.status.is_live())
            })
            .cloned()
            .collect();
        offers.sort_by_key(|o| o.submitted_at);
        Ok(offers)
    }

    async fn opening_report(&self, tender_id: Uuid) -> StoreResult<Option<OpeningReportRecord>> {
        Ok(self.lock().reports.get(&tender_id).cloned())
    }

    async fn insert_opening_report(&self, report: OpeningReportRecord) -> StoreResult<bool> {
        let mut inner = self.lock();
        if inner.reports.contains_key(&report.tender_id) {
            return Ok(false);
        }
        inner.reports.insert(report.tender_id, report);
        Ok(true)
    }

    async fn apply_award(
        &self,
        tender_id: Uuid,
        winner_ids: Vec<Uuid>,
        audit: AuditLogRecord,
    ) -> StoreResult<AwardOutcome> {
        let mut inner = self.lock();

        // The CAS guard runs before any offer is touched, mirroring
        // the transactional rollback of the SQL implementation.
        let awardable = inner
            .tenders
            .get(&tender_id)
            .map(|t| !t.is_deleted && t.status == TenderStatus::Closed)
            .unwrap_or(false);
        if !awardable {
            return Ok(AwardOutcome::Conflict);
        }

        let live_winner_count = winner_ids
            .iter()
            .filter(|id| {
                inner
                    .offers
                    .get(id)
                    .map(|o| o.tender_id == tender_id && !o.is_deleted && o.status.is_live())
                    .unwrap_or(false)
            })
            .count();
        if live_winner_count != winner_ids.len() {
            return Ok(AwardOutcome::Conflict);
        }

        let mut awarded = Vec::new();
        let mut rejected = Vec::new();
        for offer in inner.offers.values_mut() {
            if offer.tender_id != tender_id || offer.is_deleted || !offer.status.is_live() {
                continue;
            }
            if winner_ids.contains(&offer.id) {
                offer.status = crate::db::models::OfferStatus::Awarded;
                awarded.push(offer.id);
            } else {
                offer.status = crate::db::models::OfferStatus::Rejected;
                rejected.push(offer.id);
            }
        }

        let tender = inner
            .tenders
            .get_mut(&tender_id)
            .ok_or_else(|| StoreError::NotFound(format!("tender {}", tender_id)))?;
        tender.status = TenderStatus::Awarded;
        tender.updated_at = Utc::now();
        let tender = tender.clone();

        inner.audits.push(audit);

        Ok(AwardOutcome::Applied {
            tender,
            awarded,
            rejected,
        })
    }

    async fn append_audit(&self, entry: AuditLogRecord) -> StoreResult<()> {
        self.lock().audits.push(entry);
        Ok(())
    }

    async fn audit_for_entity(&self, entity_id: Uuid) -> StoreResult<Vec<AuditLogRecord>> {
        Ok(self
            .lock()
            .audits
            .iter()
            .filter(|a| a.entity_id == Some(entity_id))
            .cloned()
            .collect())
    }

    async fn insert_archive(&self, record: ArchiveRecord) -> StoreResult<()> {
        self.lock()
            .archives
            .insert(record.archive_id.clone(), record);
        Ok(())
    }

    async fn get_archive(&self, archive_id: &str) -> StoreResult<Option<ArchiveRecord>> {
        Ok(self.lock().archives.get(archive_id).cloned())
    }

    async fn expire_archives(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut inner = self.lock();
        let mut flipped = 0;
        for record in inner.archives.values_mut() {
            if record.status == ArchiveStatus::Active && record.expires_at <= now {
                record.status = ArchiveStatus::Expired;
                flipped += 1;
            }
        }
        Ok(flipped)
    }

    async fn mark_notification_read(&self, id: Uuid, recipient_id: Uuid) -> StoreResult<bool> {
        let mut inner = self.lock();
        for notification in inner.notifications.iter_mut() {
            if notification.id == id && notification.recipient_id == recipient_id {
                notification.is_read = true;
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn list_active_suppliers(&self) -> StoreResult<Vec<SupplierProfile>> {
        Ok(self
            .lock()
            .suppliers
            .iter()
            .filter(|s| s.is_active)
            .cloned()
            .collect())
    }
}

impl NotificationSink for MemoryStore {
    async fn deliver(&self, notification: NotificationRecord) -> StoreResult<()> {
        self.lock().notifications.push(notification);
        Ok(())
    }
}
