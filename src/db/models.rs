//! # Database Models
//!
//! Row structs for the engine's tables. Each struct maps to one table;
//! statuses are stored as snake_case text and round-trip through the
//! enums defined here.
//!
//! ## Table Overview
//!
//! | Table | Description |
//! |-------|-------------|
//! | `tenders` | Tender rows with status + deadline |
//! | `offers` | Supplier offers, lifecycle-gated by the parent tender |
//! | `opening_reports` | Immutable offer snapshots, one per closed tender |
//! | `document_archives` | Encrypted decision documents with retention |
//! | `notifications` | Per-recipient fan-out records |
//! | `audit_logs` | Append-only record of every state change |
//! | `suppliers` | Preference fields consulted by the fan-out matcher |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a tender.
///
/// The only legal transitions are:
///
/// ```text
/// draft ──────► published ──────► closed ──────► awarded
///   │               │
///   └───────────────┴──────► cancelled
/// ```
///
/// `awarded` and `cancelled` are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TenderStatus {
    Draft,
    Published,
    Closed,
    Awarded,
    Cancelled,
}

impl TenderStatus {
    /// All statuses, for exhaustive transition checks.
    pub const ALL: [TenderStatus; 5] = [
        TenderStatus::Draft,
        TenderStatus::Published,
        TenderStatus::Closed,
        TenderStatus::Awarded,
        TenderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TenderStatus::Draft => "draft",
            TenderStatus::Published => "published",
            TenderStatus::Closed => "closed",
            TenderStatus::Awarded => "awarded",
            TenderStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<TenderStatus> {
        match s {
            "draft" => Some(TenderStatus::Draft),
            "published" => Some(TenderStatus::Published),
            "closed" => Some(TenderStatus::Closed),
            "awarded" => Some(TenderStatus::Awarded),
            "cancelled" => Some(TenderStatus::Cancelled),
            _ => None,
        }
    }

    /// A terminal tender never transitions again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TenderStatus::Awarded | TenderStatus::Cancelled)
    }

    /// Whether the state machine permits `self → next`.
    pub fn can_transition_to(&self, next: TenderStatus) -> bool {
        use TenderStatus::*;
        matches!(
            (self, next),
            (Draft, Published)
                | (Draft, Cancelled)
                | (Published, Closed)
                | (Published, Cancelled)
                | (Closed, Awarded)
        )
    }
}

/// Status of a supplier offer.
///
/// `submitted` and `received` are the live states; `awarded` and
/// `rejected` are set by the award orchestrator and never reverted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    Submitted,
    Received,
    Awarded,
    Rejected,
}

impl OfferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OfferStatus::Submitted => "submitted",
            OfferStatus::Received => "received",
            OfferStatus::Awarded => "awarded",
            OfferStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<OfferStatus> {
        match s {
            "submitted" => Some(OfferStatus::Submitted),
            "received" => Some(OfferStatus::Received),
            "awarded" => Some(OfferStatus::Awarded),
            "rejected" => Some(OfferStatus::Rejected),
            _ => None,
        }
    }

    /// Live offers count toward opening reports and rejection fan-out.
    pub fn is_live(&self) -> bool {
        matches!(self, OfferStatus::Submitted | OfferStatus::Received)
    }
}

/// A tender row.
///
/// `deadline` is only meaningful once the tender reaches `published`;
/// it is set by the publish transition. Soft-deleted tenders are
/// excluded from every engine query but retained for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenderRecord {
    pub id: Uuid,

    /// Human-readable reference, format `TND-YYYYMMDD-HEXHEX`.
    /// Globally unique.
    pub reference: String,

    pub title: String,
    pub description: String,
    pub category: String,

    /// Service location used by the fan-out matcher.
    pub location: String,

    /// Budget range in minor currency units.
    pub budget_min: i64,
    pub budget_max: i64,

    /// Offer submission deadline. `None` until published.
    pub deadline: Option<DateTime<Utc>>,

    pub status: TenderStatus,

    /// Owning buyer. Award and cancellation require a match.
    pub buyer_id: Uuid,

    pub is_public: bool,
    pub is_deleted: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A supplier offer row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferRecord {
    pub id: Uuid,
    pub tender_id: Uuid,
    pub supplier_id: Uuid,

    /// Offered amount in minor currency units.
    pub amount: i64,

    pub status: OfferStatus,
    pub submitted_at: DateTime<Utc>,
    pub is_deleted: bool,
}

/// One line of an opening-report snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OfferSnapshot {
    pub offer_id: Uuid,
    pub supplier_id: Uuid,
    pub amount: i64,
    pub submitted_at: DateTime<Utc>,
}

/// Immutable snapshot of the live offers at the instant a tender
/// closed. Exactly one per tender; never mutated after creation.
/// Later offer edits must not retroactively alter this record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpeningReportRecord {
    pub id: Uuid,
    pub tender_id: Uuid,
    pub buyer_id: Uuid,
    pub offers: Vec<OfferSnapshot>,
    pub generated_at: DateTime<Utc>,
}

/// Archive record lifecycle. Expiry flips status; rows are never
/// deleted, preserving auditability.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveStatus {
    Active,
    Expired,
}

impl ArchiveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveStatus::Active => "active",
            ArchiveStatus::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<ArchiveStatus> {
        match s {
            "active" => Some(ArchiveStatus::Active),
            "expired" => Some(ArchiveStatus::Expired),
            _ => None,
        }
    }
}

/// An encrypted, retention-bounded copy of a lifecycle decision
/// document (award or cancellation).
///
/// Ciphertext, IV and authentication tag are stored base64-encoded.
/// Decryption requires the matching IV and tag; a tampered ciphertext
/// fails authentication rather than returning corrupted plaintext.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveRecord {
    /// Human-legible id, format `ARC-<epoch-millis>-<random>`. The
    /// random suffix prevents enumeration.
    pub archive_id: String,

    /// Document type, e.g. `award_decision` or `tender_cancellation`.
    pub doc_type: String,

    /// The entity the document refers to (tender id).
    pub ref_id: Uuid,

    pub ciphertext: String,
    pub iv: String,
    pub tag: String,

    pub retention_years: u32,

    /// Absolute expiration date, computed once at creation so the
    /// expiry sweep needs no recomputation.
    pub expires_at: DateTime<Utc>,

    pub status: ArchiveStatus,
    pub created_at: DateTime<Utc>,
}

/// Notification type, stored as snake_case text.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    TenderPublished,
    OfferAwarded,
    OfferRejected,
    TenderCancelled,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::TenderPublished => "tender_published",
            NotificationKind::OfferAwarded => "offer_awarded",
            NotificationKind::OfferRejected => "offer_rejected",
            NotificationKind::TenderCancelled => "tender_cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<NotificationKind> {
        match s {
            "tender_published" => Some(NotificationKind::TenderPublished),
            "offer_awarded" => Some(NotificationKind::OfferAwarded),
            "offer_rejected" => Some(NotificationKind::OfferRejected),
            "tender_cancelled" => Some(NotificationKind::TenderCancelled),
            _ => None,
        }
    }
}

/// A notification row. Created by the fan-out; mutated only by the
/// recipient marking it read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// An append-only audit log entry.
///
/// `actor_id = None` marks a system-originated action (the auto-close
/// sweep); `entity_id = None` marks a bulk action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogRecord {
    pub id: Uuid,
    pub actor_id: Option<Uuid>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub detail: serde_json::Value,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Supplier preference fields consulted by the fan-out matcher.
///
/// Read-only from the engine's point of view: the marketplace's user
/// management owns these rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplierProfile {
    pub id: Uuid,

    /// Empty list means "no constraint" (matches every category).
    pub preferred_categories: Vec<String>,

    /// Empty list means "no constraint" (matches every location).
    pub preferred_locations: Vec<String>,

    /// Minimum acceptable tender budget in minor units.
    pub min_budget: i64,

    pub is_verified: bool,
    pub is_active: bool,
}
