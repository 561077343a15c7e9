//! # Database Queries
//!
//! All SQL for the engine lives here. Each function performs one
//! database operation against a pooled connection.
//!
//! ## Query Organization
//!
//! - `*_tender` / CAS status updates — tenders table
//! - `*_offer` — offers table
//! - `*_opening_report` — opening_reports table
//! - `*_archive` — document_archives table
//! - `*_notification`, `*_audit` — fan-out and audit tables
//!
//! ## Concurrency
//!
//! Every status transition goes through `cas_update_status`: an
//! `UPDATE ... WHERE id = $1 AND status = $2`. A concurrent caller that
//! loses the race observes zero rows affected and gets `None` back —
//! a no-op, not an error. The award path wraps its offer updates, the
//! CAS and the audit append in a single transaction so partial
//! awarding is impossible.

use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use tokio_postgres::Row;
use tracing::{debug, info};
use uuid::Uuid;

use super::models::*;
use super::DatabaseError;

// ============================================
// ROW CONVERSION HELPERS
// ============================================

fn row_to_tender(row: &Row) -> Result<TenderRecord, DatabaseError> {
    let status: String = row.get("status");
    Ok(TenderRecord {
        id: row.get("id"),
        reference: row.get("reference"),
        title: row.get("title"),
        description: row.get("description"),
        category: row.get("category"),
        location: row.get("location"),
        budget_min: row.get("budget_min"),
        budget_max: row.get("budget_max"),
        deadline: row.get("deadline"),
        status: TenderStatus::parse(&status)
            .ok_or_else(|| DatabaseError::NotFound(format!("unknown tender status: {}", status)))?,
        buyer_id: row.get("buyer_id"),
        is_public: row.get("is_public"),
        is_deleted: row.get("is_deleted"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn row_to_offer(row: &Row) -> Result<OfferRecord, DatabaseError> {
    let status: String = row.get("status");
    Ok(OfferRecord {
        id: row.get("id"),
        tender_id: row.get("tender_id"),
        supplier_id: row.get("supplier_id"),
        amount: row.get("amount"),
        status: OfferStatus::parse(&status)
            .ok_or_else(|| DatabaseError::NotFound(format!("unknown offer status: {}", status)))?,
        submitted_at: row.get("submitted_at"),
        is_deleted: row.get("is_deleted"),
    })
}

fn row_to_opening_report(row: &Row) -> Result<OpeningReportRecord, DatabaseError> {
    let offers: serde_json::Value = row.get("offers");
    let offers: Vec<OfferSnapshot> = serde_json::from_value(offers)
        .map_err(|e| DatabaseError::NotFound(format!("corrupt opening report snapshot: {}", e)))?;
    Ok(OpeningReportRecord {
        id: row.get("id"),
        tender_id: row.get("tender_id"),
        buyer_id: row.get("buyer_id"),
        offers,
        generated_at: row.get("generated_at"),
    })
}

fn row_to_archive(row: &Row) -> Result<ArchiveRecord, DatabaseError> {
    let status: String = row.get("status");
    let retention: i32 = row.get("retention_years");
    Ok(ArchiveRecord {
        archive_id: row.get("archive_id"),
        doc_type: row.get("doc_type"),
        ref_id: row.get("ref_id"),
        ciphertext: row.get("ciphertext"),
        iv: row.get("iv"),
        tag: row.get("tag"),
        retention_years: retention as u32,
        expires_at: row.get("expires_at"),
        status: ArchiveStatus::parse(&status)
            .ok_or_else(|| DatabaseError::NotFound(format!("unknown archive status: {}", status)))?,
        created_at: row.get("created_at"),
    })
}

fn row_to_audit(row: &Row) -> Result<AuditLogRecord, DatabaseError> {
    Ok(AuditLogRecord {
        id: row.get("id"),
        actor_id: row.get("actor_id"),
        action: row.get("action"),
        entity_type: row.get("entity_type"),
        entity_id: row.get("entity_id"),
        detail: row.get("detail"),
        ip_address: row.get("ip_address"),
        user_agent: row.get("user_agent"),
        created_at: row.get("created_at"),
    })
}

fn row_to_supplier(row: &Row) -> Result<SupplierProfile, DatabaseError> {
    Ok(SupplierProfile {
        id: row.get("id"),
        preferred_categories: row.get("preferred_categories"),
        preferred_locations: row.get("preferred_locations"),
        min_budget: row.get("min_budget"),
        is_verified: row.get("is_verified"),
        is_active: row.get("is_active"),
    })
}

const TENDER_COLUMNS: &str = "id, reference, title, description, category, location, \
     budget_min, budget_max, deadline, status, buyer_id, is_public, is_deleted, \
     created_at, updated_at";

// ============================================
// TENDER QUERIES
// ============================================

/// Insert a new tender row (status `draft`).
pub async fn create_tender(pool: &Pool, tender: &TenderRecord) -> Result<(), DatabaseError> {
    debug!("Creating tender {} ({})", tender.id, tender.reference);

    let client = pool
        .get()
        .await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    client
        .execute(
            r#"
            INSERT INTO tenders (
                id, reference, title, description, category, location,
                budget_min, budget_max, deadline, status, buyer_id,
                is_public, is_deleted, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
            &[
                &tender.id,
                &tender.reference,
                &tender.title,
                &tender.description,
                &tender.category,
                &tender.location,
                &tender.budget_min,
                &tender.budget_max,
                &tender.deadline,
                &tender.status.as_str(),
                &tender.buyer_id,
                &tender.is_public,
                &tender.is_deleted,
                &tender.created_at,
                &tender.updated_at,
            ],
        )
        .await?;

    info!("Tender created: {} ({})", tender.reference, tender.id);
    Ok(())
}

/// Get a tender by id. Soft-deleted rows are invisible.
pub async fn get_tender(pool: &Pool, id: Uuid) -> Result<Option<TenderRecord>, DatabaseError> {
    let client = pool
        .get()
        .await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let row = client
        .query_opt(
            &format!(
                "SELECT {} FROM tenders WHERE id = $1 AND is_deleted = FALSE",
                TENDER_COLUMNS
            ),
            &[&id],
        )
        .await?;

    row.as_ref().map(row_to_tender).transpose()
}

/// Compare-and-swap a tender's status.
///
/// Applies `expected -> new` only if the row is still in `expected`;
/// a losing racer observes zero rows affected and gets `None`. The
/// optional `deadline` is set atomically with the transition (used by
/// publish).
pub async fn cas_update_status(
    pool: &Pool,
    id: Uuid,
    expected: TenderStatus,
    new: TenderStatus,
    deadline: Option<DateTime<Utc>>,
) -> Result<Option<TenderRecord>, DatabaseError> {
    debug!(
        "CAS tender {} status {} -> {}",
        id,
        expected.as_str(),
        new.as_str()
    );

    let client = pool
        .get()
        .await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let row = client
        .query_opt(
            &format!(
                r#"
                UPDATE tenders
                SET status = $3,
                    deadline = COALESCE($4, deadline),
                    updated_at = NOW()
                WHERE id = $1 AND status = $2 AND is_deleted = FALSE
                RETURNING {}
                "#,
                TENDER_COLUMNS
            ),
            &[&id, &expected.as_str(), &new.as_str(), &deadline],
        )
        .await?;

    row.as_ref().map(row_to_tender).transpose()
}

/// Tenders whose deadline has passed and are still published.
///
/// Ordered deadline ascending (oldest-expired-first) so worst-case
/// staleness is bounded under load; the limit bounds sweep duration.
pub async fn list_expired_published(
    pool: &Pool,
    now: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<TenderRecord>, DatabaseError> {
    let client = pool
        .get()
        .await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let rows = client
        .query(
            &format!(
                r#"
                SELECT {}
                FROM tenders
                WHERE status = 'published' AND deadline < $1 AND is_deleted = FALSE
                ORDER BY deadline ASC
                LIMIT $2
                "#,
                TENDER_COLUMNS
            ),
            &[&now, &limit],
        )
        .await?;

    rows.iter().map(row_to_tender).collect()
}

// ============================================
// OFFER QUERIES
// ============================================

/// Insert a supplier offer.
pub async fn insert_offer(pool: &Pool, offer: &OfferRecord) -> Result<(), DatabaseError> {
    let client = pool
        .get()
        .await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    client
        .execute(
            r#"
            INSERT INTO offers (
                id, tender_id, supplier_id, amount, status, submitted_at, is_deleted
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
            &[
                &offer.id,
                &offer.tender_id,
                &offer.supplier_id,
                &offer.amount,
                &offer.status.as_str(),
                &offer.submitted_at,
                &offer.is_deleted,
            ],
        )
        .await?;

    Ok(())
}

/// List offers for a tender. `live_only` restricts to
/// submitted/received offers (the population that opening reports
/// snapshot and the award path rejects).
pub async fn list_offers(
    pool: &Pool,
    tender_id: Uuid,
    live_only: bool,
) -> Result<Vec<OfferRecord>, DatabaseError> {
    let client = pool
        .get()
        .await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let sql = if live_only {
        r#"
        SELECT id, tender_id, supplier_id, amount, status, submitted_at, is_deleted
        FROM offers
        WHERE tender_id = $1 AND is_deleted = FALSE AND status IN ('submitted', 'received')
        ORDER BY submitted_at ASC
        "#
    } else {
        r#"
        SELECT id, tender_id, supplier_id, amount, status, submitted_at, is_deleted
        FROM offers
        WHERE tender_id = $1 AND is_deleted = FALSE
        ORDER BY submitted_at ASC
        "#
    };

    let rows = client.query(sql, &[&tender_id]).await?;
    rows.iter().map(row_to_offer).collect()
}

// ============================================
// OPENING REPORT QUERIES
// ============================================

/// Get the opening report for a tender, if one was generated.
pub async fn get_opening_report(
    pool: &Pool,
    tender_id: Uuid,
) -> Result<Option<OpeningReportRecord>, DatabaseError> {
    let client = pool
        .get()
        .await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let row = client
        .query_opt(
            r#"
            SELECT id, tender_id, buyer_id, offers, generated_at
            FROM opening_reports
            WHERE tender_id = $1
            "#,
            &[&tender_id],
        )
        .await?;

    row.as_ref().map(row_to_opening_report).transpose()
}

/// Insert an opening report. Returns `false` if a report already
/// exists for the tender (first writer wins — this is what makes
/// report generation idempotent across sweep re-runs and crashes).
pub async fn insert_opening_report(
    pool: &Pool,
    report: &OpeningReportRecord,
) -> Result<bool, DatabaseError> {
    let client = pool
        .get()
        .await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let offers = serde_json::to_value(&report.offers)
        .map_err(|e| DatabaseError::NotFound(format!("unserializable snapshot: {}", e)))?;

    let inserted = client
        .execute(
            r#"
            INSERT INTO opening_reports (id, tender_id, buyer_id, offers, generated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (tender_id) DO NOTHING
            "#,
            &[
                &report.id,
                &report.tender_id,
                &report.buyer_id,
                &offers,
                &report.generated_at,
            ],
        )
        .await?;

    Ok(inserted == 1)
}

// ============================================
// AWARD TRANSACTION
// ============================================

/// Apply an award atomically.
///
/// Inside one transaction: mark the winning offers `awarded`, mark all
/// other live offers `rejected`, CAS the tender `closed -> awarded`,
/// and append the audit entry. If the CAS fails (a racing call already
/// awarded the tender) everything rolls back and `None` is returned —
/// no offer is left flipped without the tender being awarded.
///
/// Returns `(tender, awarded_offer_ids, rejected_offer_ids)` on
/// success.
pub async fn apply_award(
    pool: &Pool,
    tender_id: Uuid,
    winner_ids: &[Uuid],
    audit: &AuditLogRecord,
) -> Result<Option<(TenderRecord, Vec<Uuid>, Vec<Uuid>)>, DatabaseError> {
    let mut client = pool
        .get()
        .await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let tx = client.transaction().await?;

    let winner_vec: Vec<Uuid> = winner_ids.to_vec();

    let awarded_rows = tx
        .query(
            r#"
            UPDATE offers
            SET status = 'awarded'
            WHERE tender_id = $1 AND id = ANY($2)
              AND is_deleted = FALSE AND status IN ('submitted', 'received')
            RETURNING id
            "#,
            &[&tender_id, &winner_vec],
        )
        .await?;

    if awarded_rows.len() != winner_ids.len() {
        // An offer vanished or changed state since validation; treat
        // as a conflict rather than award a partial winner set.
        tx.rollback().await?;
        return Ok(None);
    }

    let rejected_rows = tx
        .query(
            r#"
            UPDATE offers
            SET status = 'rejected'
            WHERE tender_id = $1 AND NOT (id = ANY($2))
              AND is_deleted = FALSE AND status IN ('submitted', 'received')
            RETURNING id
            "#,
            &[&tender_id, &winner_vec],
        )
        .await?;

    let tender_row = tx
        .query_opt(
            &format!(
                r#"
                UPDATE tenders
                SET status = 'awarded', updated_at = NOW()
                WHERE id = $1 AND status = 'closed' AND is_deleted = FALSE
                RETURNING {}
                "#,
                TENDER_COLUMNS
            ),
            &[&tender_id],
        )
        .await?;

    let tender_row = match tender_row {
        Some(row) => row,
        None => {
            tx.rollback().await?;
            return Ok(None);
        }
    };
    let tender = row_to_tender(&tender_row)?;

    tx.execute(
        r#"
        INSERT INTO audit_logs (
            id, actor_id, action, entity_type, entity_id, detail,
            ip_address, user_agent, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
        &[
            &audit.id,
            &audit.actor_id,
            &audit.action,
            &audit.entity_type,
            &audit.entity_id,
            &audit.detail,
            &audit.ip_address,
            &audit.user_agent,
            &audit.created_at,
        ],
    )
    .await?;

    tx.commit().await?;

    let awarded = awarded_rows.iter().map(|r| r.get("id")).collect();
    let rejected = rejected_rows.iter().map(|r| r.get("id")).collect();
    info!("Tender {} awarded ({} winners)", tender_id, winner_ids.len());

    Ok(Some((tender, awarded, rejected)))
}

// ============================================
// AUDIT QUERIES
// ============================================

/// Append an audit log entry. The table is append-only; no update or
/// delete queries exist.
pub async fn insert_audit(pool: &Pool, entry: &AuditLogRecord) -> Result<(), DatabaseError> {
    let client = pool
        .get()
        .await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    client
        .execute(
            r#"
            INSERT INTO audit_logs (
                id, actor_id, action, entity_type, entity_id, detail,
                ip_address, user_agent, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
            &[
                &entry.id,
                &entry.actor_id,
                &entry.action,
                &entry.entity_type,
                &entry.entity_id,
                &entry.detail,
                &entry.ip_address,
                &entry.user_agent,
                &entry.created_at,
            ],
        )
        .await?;

    Ok(())
}

/// Audit entries for one entity, oldest first.
pub async fn list_audit_for_entity(
    pool: &Pool,
    entity_id: Uuid,
) -> Result<Vec<AuditLogRecord>, DatabaseError> {
    let client = pool
        .get()
        .await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let rows = client
        .query(
            r#"
            SELECT id, actor_id, action, entity_type, entity_id, detail,
                   ip_address, user_agent, created_at
            FROM audit_logs
            WHERE entity_id = $1
            ORDER BY created_at ASC
            "#,
            &[&entity_id],
        )
        .await?;

    rows.iter().map(row_to_audit).collect()
}

// ============================================
// NOTIFICATION QUERIES
// ============================================

/// Insert one notification row.
pub async fn insert_notification(
    pool: &Pool,
    notification: &NotificationRecord,
) -> Result<(), DatabaseError> {
    let client = pool
        .get()
        .await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    client
        .execute(
            r#"
            INSERT INTO notifications (
                id, recipient_id, kind, title, message,
                entity_type, entity_id, is_read, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
            &[
                &notification.id,
                &notification.recipient_id,
                &notification.kind.as_str(),
                &notification.title,
                &notification.message,
                &notification.entity_type,
                &notification.entity_id,
                &notification.is_read,
                &notification.created_at,
            ],
        )
        .await?;

    Ok(())
}

/// Mark a notification read. Scoped to the recipient so one user
/// cannot mark another's notifications.
pub async fn mark_notification_read(
    pool: &Pool,
    id: Uuid,
    recipient_id: Uuid,
) -> Result<bool, DatabaseError> {
    let client = pool
        .get()
        .await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let updated = client
        .execute(
            "UPDATE notifications SET is_read = TRUE WHERE id = $1 AND recipient_id = $2",
            &[&id, &recipient_id],
        )
        .await?;

    Ok(updated == 1)
}

// ============================================
// ARCHIVE QUERIES
// ============================================

/// Insert an encrypted archive record. Rows are never updated in
/// place; expiry flips the status column via `expire_archives`.
pub async fn insert_archive(pool: &Pool, record: &ArchiveRecord) -> Result<(), DatabaseError> {
    let client = pool
        .get()
        .await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    client
        .execute(
            r#"
            INSERT INTO document_archives (
                archive_id, doc_type, ref_id, ciphertext, iv, tag,
                retention_years, expires_at, status, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
            &[
                &record.archive_id,
                &record.doc_type,
                &record.ref_id,
                &record.ciphertext,
                &record.iv,
                &record.tag,
                &(record.retention_years as i32),
                &record.expires_at,
                &record.status.as_str(),
                &record.created_at,
            ],
        )
        .await?;

    info!("Archive record created: {}", record.archive_id);
    Ok(())
}

/// Fetch an archive record by its human-legible id.
pub async fn get_archive(
    pool: &Pool,
    archive_id: &str,
) -> Result<Option<ArchiveRecord>, DatabaseError> {
    let client = pool
        .get()
        .await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let row = client
        .query_opt(
            r#"
            SELECT archive_id, doc_type, ref_id, ciphertext, iv, tag,
                   retention_years, expires_at, status, created_at
            FROM document_archives
            WHERE archive_id = $1
            "#,
            &[&archive_id],
        )
        .await?;

    row.as_ref().map(row_to_archive).transpose()
}

/// Flip every overdue active archive to `expired`. Returns the number
/// of rows flipped.
pub async fn expire_archives(pool: &Pool, now: DateTime<Utc>) -> Result<u64, DatabaseError> {
    let client = pool
        .get()
        .await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let flipped = client
        .execute(
            "UPDATE document_archives SET status = 'expired' \
             WHERE status = 'active' AND expires_at <= $1",
            &[&now],
        )
        .await?;

    if flipped > 0 {
        info!("Expired {} archive records", flipped);
    }
    Ok(flipped)
}

// ============================================
// SUPPLIER QUERIES
// ============================================

/// The full active-supplier population the fan-out matches against.
pub async fn list_active_suppliers(pool: &Pool) -> Result<Vec<SupplierProfile>, DatabaseError> {
    let client = pool
        .get()
        .await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let rows = client
        .query(
            r#"
            SELECT id, preferred_categories, preferred_locations,
                   min_budget, is_verified, is_active
            FROM suppliers
            WHERE is_active = TRUE
            "#,
            &[],
        )
        .await?;

    rows.iter().map(row_to_supplier).collect()
}
