//! PostgreSQL implementation of the store seam, delegating to the
//! query layer in [`crate::db::queries`].

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::models::{
    ArchiveRecord, AuditLogRecord, NotificationRecord, OfferRecord, OpeningReportRecord,
    SupplierProfile, TenderRecord, TenderStatus,
};
use crate::db::{queries, Database};

use super::{AwardOutcome, CasOutcome, NotificationSink, StoreResult, TenderStore};

/// Production store backed by the PostgreSQL pool.
#[derive(Clone)]
pub struct PgStore {
    db: Database,
}

impl PgStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

impl TenderStore for PgStore {
    async fn create_tender(&self, tender: TenderRecord) -> StoreResult<()> {
        queries::create_tender(self.db.pool(), &tender).await?;
        Ok(())
    }

    async fn get_tender(&self, id: Uuid) -> StoreResult<Option<TenderRecord>> {
        Ok(queries::get_tender(self.db.pool(), id).await?)
    }

    async fn compare_and_swap_status(
        &self,
        id: Uuid,
        expected: TenderStatus,
        new: TenderStatus,
        deadline: Option<DateTime<Utc>>,
    ) -> StoreResult<CasOutcome> {
        // Illegal transitions never reach SQL.
        if !expected.can_transition_to(new) {
            return Ok(CasOutcome::Conflict);
        }
        match queries::cas_update_status(self.db.pool(), id, expected, new, deadline).await? {
            Some(tender) => Ok(CasOutcome::Applied(tender)),
            None => Ok(CasOutcome::Conflict),
        }
    }

    async fn list_expired_published(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> StoreResult<Vec<TenderRecord>> {
        Ok(queries::list_expired_published(self.db.pool(), now, limit).await?)
    }

    async fn insert_offer(&self, offer: OfferRecord) -> StoreResult<()> {
        queries::insert_offer(self.db.pool(), &offer).await?;
        Ok(())
    }

    async fn list_offers(&self, tender_id: Uuid, live_only: bool) -> StoreResult<Vec<OfferRecord>> {
        Ok(queries::list_offers(self.db.pool(), tender_id, live_only).await?)
    }

    async fn opening_report(&self, tender_id: Uuid) -> StoreResult<Option<OpeningReportRecord>> {
        Ok(queries::get_opening_report(self.db.pool(), tender_id).await?)
    }

    async fn insert_opening_report(&self, report: OpeningReportRecord) -> StoreResult<bool> {
        Ok(queries::insert_opening_report(self.db.pool(), &report).await?)
    }

    async fn apply_award(
        &self,
        tender_id: Uuid,
        winner_ids: Vec<Uuid>,
        audit: AuditLogRecord,
    ) -> StoreResult<AwardOutcome> {
        match queries::apply_award(self.db.pool(), tender_id, &winner_ids, &audit).await? {
            Some((tender, awarded, rejected)) => Ok(AwardOutcome::Applied {
                tender,
                awarded,
                rejected,
            }),
            None => Ok(AwardOutcome::Conflict),
        }
    }

    async fn append_audit(&self, entry: AuditLogRecord) -> StoreResult<()> {
        queries::insert_audit(self.db.pool(), &entry).await?;
        Ok(())
    }

    async fn audit_for_entity(&self, entity_id: Uuid) -> StoreResult<Vec<AuditLogRecord>> {
        Ok(queries::list_audit_for_entity(self.db.pool(), entity_id).await?)
    }

    async fn insert_archive(&self, record: ArchiveRecord) -> StoreResult<()> {
        queries::insert_archive(self.db.pool(), &record).await?;
        Ok(())
    }

    async fn get_archive(&self, archive_id: &str) -> StoreResult<Option<ArchiveRecord>> {
        Ok(queries::get_archive(self.db.pool(), archive_id).await?)
    }

    async fn expire_archives(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        Ok(queries::expire_archives(self.db.pool(), now).await?)
    }

    async fn mark_notification_read(&self, id: Uuid, recipient_id: Uuid) -> StoreResult<bool> {
        Ok(queries::mark_notification_read(self.db.pool(), id, recipient_id).await?)
    }

    async fn list_active_suppliers(&self) -> StoreResult<Vec<SupplierProfile>> {
        Ok(queries::list_active_suppliers(self.db.pool()).await?)
    }
}

impl NotificationSink for PgStore {
    async fn deliver(&self, notification: NotificationRecord) -> StoreResult<()> {
        queries::insert_notification(self.db.pool(), &notification).await?;
        Ok(())
    }
}
