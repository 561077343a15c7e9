//! # Store Seam
//!
//! Trait definitions for the engine's transactional state store. The
//! services are written against these traits, not against Postgres,
//! so tests can run on [`MemoryStore`] while production runs on
//! [`PgStore`].
//!
//! The one primitive everything leans on is
//! [`TenderStore::compare_and_swap_status`]: a conditional update that
//! only applies when the tender is still in the expected status.
//! Concurrent callers (a buyer closing manually while the sweep closes
//! the same tender) cannot double-apply a transition — the loser
//! observes a conflict, which is a no-op for idempotent callers.

pub mod memory;
pub mod postgres;

use std::future::Future;

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::db::models::{
    ArchiveRecord, AuditLogRecord, NotificationRecord, OfferRecord, OpeningReportRecord,
    SupplierProfile, TenderRecord, TenderStatus,
};
use crate::db::DatabaseError;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Errors from the state store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Referenced record does not exist.
    #[error("record not found: {0}")]
    NotFound(String),

    /// The backing store failed (connection, query, serialization).
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<DatabaseError> for StoreError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound(msg) => StoreError::NotFound(msg),
            other => StoreError::Backend(other.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Result of a compare-and-swap status transition.
#[derive(Debug, Clone)]
pub enum CasOutcome {
    /// The transition applied; the updated tender row is returned.
    Applied(TenderRecord),
    /// The tender was not in the expected status (or the transition is
    /// not legal). Nothing changed.
    Conflict,
}

/// Result of the transactional award application.
#[derive(Debug, Clone)]
pub enum AwardOutcome {
    /// Winners marked awarded, the rest rejected, tender awarded and
    /// the audit entry appended — all committed together.
    Applied {
        tender: TenderRecord,
        awarded: Vec<Uuid>,
        rejected: Vec<Uuid>,
    },
    /// A racing caller got there first (or an offer changed state
    /// under us). The transaction rolled back; nothing changed.
    Conflict,
}

/// Transactional persistence of tenders, offers, reports, archives
/// and audit entries.
///
/// Implementations must exclude soft-deleted tenders and offers from
/// every query, and must make `insert_opening_report` first-writer-
/// wins so report generation is idempotent.
pub trait TenderStore: Send + Sync {
    fn create_tender(
        &self,
        tender: TenderRecord,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    fn get_tender(
        &self,
        id: Uuid,
    ) -> impl Future<Output = StoreResult<Option<TenderRecord>>> + Send;

    /// Compare-and-swap the tender status. `deadline`, when given, is
    /// set atomically with the transition (publish uses this).
    ///
    /// Implementations must also refuse transitions the state machine
    /// does not permit ([`TenderStatus::can_transition_to`]), so a
    /// terminal tender can never move again regardless of caller bugs.
    fn compare_and_swap_status(
        &self,
        id: Uuid,
        expected: TenderStatus,
        new: TenderStatus,
        deadline: Option<DateTime<Utc>>,
    ) -> impl Future<Output = StoreResult<CasOutcome>> + Send;

    /// Published tenders whose deadline has passed, oldest-expired
    /// first, bounded by `limit`.
    fn list_expired_published(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> impl Future<Output = StoreResult<Vec<TenderRecord>>> + Send;

    fn insert_offer(
        &self,
        offer: OfferRecord,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Offers on a tender; `live_only` restricts to submitted/received.
    fn list_offers(
        &self,
        tender_id: Uuid,
        live_only: bool,
    ) -> impl Future<Output = StoreResult<Vec<OfferRecord>>> + Send;

    fn opening_report(
        &self,
        tender_id: Uuid,
    ) -> impl Future<Output = StoreResult<Option<OpeningReportRecord>>> + Send;

    /// Returns `false` if a report already exists for the tender.
    fn insert_opening_report(
        &self,
        report: OpeningReportRecord,
    ) -> impl Future<Output = StoreResult<bool>> + Send;

    /// Apply an award atomically: winners awarded, other live offers
    /// rejected, tender `closed -> awarded`, audit appended. On CAS
    /// conflict everything rolls back.
    fn apply_award(
        &self,
        tender_id: Uuid,
        winner_ids: Vec<Uuid>,
        audit: AuditLogRecord,
    ) -> impl Future<Output = StoreResult<AwardOutcome>> + Send;

    /// Append-only; no update or delete exists.
    fn append_audit(
        &self,
        entry: AuditLogRecord,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    fn audit_for_entity(
        &self,
        entity_id: Uuid,
    ) -> impl Future<Output = StoreResult<Vec<AuditLogRecord>>> + Send;

    fn insert_archive(
        &self,
        record: ArchiveRecord,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    fn get_archive(
        &self,
        archive_id: &str,
    ) -> impl Future<Output = StoreResult<Option<ArchiveRecord>>> + Send;

    /// Flip overdue active archives to expired; returns the count.
    fn expire_archives(
        &self,
        now: DateTime<Utc>,
    ) -> impl Future<Output = StoreResult<u64>> + Send;

    /// The one permitted notification mutation.
    fn mark_notification_read(
        &self,
        id: Uuid,
        recipient_id: Uuid,
    ) -> impl Future<Output = StoreResult<bool>> + Send;

    /// The full active-supplier population for fan-out matching.
    fn list_active_suppliers(
        &self,
    ) -> impl Future<Output = StoreResult<Vec<SupplierProfile>>> + Send;
}

/// Destination for fan-out notifications.
///
/// Kept separate from [`TenderStore`] so tests can observe or fail
/// deliveries independently of tender state.
pub trait NotificationSink: Send + Sync {
    fn deliver(
        &self,
        notification: NotificationRecord,
    ) -> impl Future<Output = StoreResult<()>> + Send;
}
