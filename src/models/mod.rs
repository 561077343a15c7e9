//! # API Models
//!
//! Request and response envelopes for the engine's outward surface.
//! All wire fields are camelCase; internal row structs live in
//! [`crate::db::models`].

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;

/// Request to publish a draft tender.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
    pub tender_id: Uuid,
    /// Offer submission deadline, RFC 3339.
    pub deadline: chrono::DateTime<chrono::Utc>,
}

/// Request to award a closed tender.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardRequest {
    pub tender_id: Uuid,
    /// One or more winning offers (split awards permitted).
    pub winner_offer_ids: Vec<Uuid>,
}

/// Request to cancel a draft or published tender.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
    pub tender_id: Uuid,
    /// Mandatory; preserved in the audit trail and the archive.
    pub cancellation_reason: String,
}

/// Request to submit an offer on a published tender.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOfferRequest {
    pub tender_id: Uuid,
    /// Offered amount in minor currency units.
    pub amount: i64,
}

/// Machine-readable error envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Stable code, e.g. `state_conflict`.
    pub code: String,
    pub message: String,
}

impl From<&EngineError> for ErrorBody {
    fn from(err: &EngineError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

/// Uniform response envelope.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl<T> ApiResponse<T> {
    pub fn ok(result: T) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn err(err: &EngineError) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(ErrorBody::from(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_envelope_carries_stable_code() {
        let err = EngineError::StateConflict("tender already closed".to_string());
        let body = ErrorBody::from(&err);
        assert_eq!(body.code, "state_conflict");
        assert!(body.message.contains("already closed"));
    }

    #[test]
    fn responses_serialize_without_null_noise() {
        let ok = ApiResponse::ok(42u32);
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["result"], 42);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn camel_case_requests_deserialize() {
        let req: AwardRequest = serde_json::from_str(
            r#"{"tenderId":"00000000-0000-0000-0000-000000000001","winnerOfferIds":[]}"#,
        )
        .unwrap();
        assert!(req.winner_offer_ids.is_empty());
    }
}
