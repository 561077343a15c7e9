//! # Audit Log
//!
//! Append-only recorder of every state-changing action: who, what,
//! when, and a JSON detail blob carrying previous/next status.
//! `actor = None` marks system-originated actions (the auto-close
//! sweep). Mutating services record on success only; aborted
//! transactions leave no audit success entry.

use chrono::Utc;
use uuid::Uuid;

use crate::db::models::AuditLogRecord;
use crate::store::{StoreResult, TenderStore};

/// Audit action names.
pub mod actions {
    pub const PUBLISH: &str = "publish";
    pub const CLOSE: &str = "close";
    pub const AUTO_CLOSE: &str = "auto_close";
    pub const AWARD: &str = "award";
    pub const CANCEL: &str = "cancel";
    pub const OFFER_SUBMIT: &str = "offer_submit";
}

/// Entity type names used in audit entries.
pub mod entities {
    pub const TENDER: &str = "tender";
    pub const OFFER: &str = "offer";
}

/// Thin recorder over the store's append-only audit table.
#[derive(Clone)]
pub struct AuditLog<S> {
    store: S,
}

impl<S: TenderStore> AuditLog<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Record a user-originated action.
    pub async fn record_user(
        &self,
        actor_id: Uuid,
        action: &str,
        entity_type: &str,
        entity_id: Uuid,
        detail: serde_json::Value,
    ) -> StoreResult<()> {
        self.store
            .append_audit(Self::entry(Some(actor_id), action, entity_type, Some(entity_id), detail))
            .await
    }

    /// Record a system-originated action (`actor_id = NULL`).
    pub async fn record_system(
        &self,
        action: &str,
        entity_type: &str,
        entity_id: Uuid,
        detail: serde_json::Value,
    ) -> StoreResult<()> {
        self.store
            .append_audit(Self::entry(None, action, entity_type, Some(entity_id), detail))
            .await
    }

    /// Build an entry without persisting it. The award path hands the
    /// entry to the store so it commits inside the award transaction.
    pub fn entry(
        actor_id: Option<Uuid>,
        action: &str,
        entity_type: &str,
        entity_id: Option<Uuid>,
        detail: serde_json::Value,
    ) -> AuditLogRecord {
        AuditLogRecord {
            id: Uuid::new_v4(),
            actor_id,
            action: action.to_string(),
            entity_type: entity_type.to_string(),
            entity_id,
            detail,
            ip_address: None,
            user_agent: None,
            created_at: Utc::now(),
        }
    }
}
