//! # Engine Error Taxonomy
//!
//! All synchronous engine operations return `Result<T, EngineError>`.
//! The variants map one-to-one onto the error classes the API layer
//! reports to callers:
//!
//! | Variant | Meaning | Caller behavior |
//! |---------|---------|-----------------|
//! | `Validation` | Bad input, rejected before any mutation | Fix the request |
//! | `StateConflict` | CAS mismatch, tender already transitioned | Safe to retry or ignore |
//! | `Authorization` | Actor does not own the tender | Denied, logged |
//! | `NotFound` | Referenced entity does not exist | 404-style |
//! | `Persistence` | Store unreachable or query failed | Retry later |
//! | `Encryption` | Archive authentication failure | Treat record as tampered |

use thiserror::Error;

use crate::store::StoreError;

/// Errors surfaced by the lifecycle, award, cancellation, archive and
/// notification services.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Missing or malformed input. Rejected before any mutation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A compare-and-swap on tender status did not apply because the
    /// tender is no longer in the expected state. Non-fatal.
    #[error("state conflict: {0}")]
    StateConflict(String),

    /// The acting user does not own the tender.
    #[error("not authorized: {0}")]
    Authorization(String),

    /// The referenced tender, offer or archive record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The transactional store failed.
    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),

    /// Archive payload failed to encrypt, or failed authentication
    /// on decryption (tampered ciphertext or tag).
    #[error("encryption error: {0}")]
    Encryption(String),
}

impl EngineError {
    /// Stable machine-readable code for API error envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "validation_error",
            EngineError::StateConflict(_) => "state_conflict",
            EngineError::Authorization(_) => "authorization_error",
            EngineError::NotFound(_) => "not_found",
            EngineError::Persistence(_) => "persistence_error",
            EngineError::Encryption(_) => "encryption_error",
        }
    }
}
