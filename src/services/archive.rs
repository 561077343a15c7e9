//! # Archive Service
//!
//! Encrypts and stores immutable copies of award/cancellation
//! decision documents with a retention horizon.
//!
//! ## Encryption
//!
//! Payloads are JSON-serialized and sealed with AES-256-GCM. The key
//! is derived once from the configured secret via Argon2id (slow KDF)
//! with a fixed context salt; each record gets a random 96-bit IV and
//! its authentication tag is stored alongside the ciphertext. A
//! tampered ciphertext or tag fails authentication loudly — decryption
//! never returns corrupted plaintext.
//!
//! ## Retention
//!
//! `expires_at = created_at + retention_years` is stored as an
//! absolute date, so the expiry sweep just flips overdue rows to
//! `expired` with no recomputation. Rows are never deleted.

use std::sync::Arc;

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, Nonce};
use argon2::Argon2;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use tracing::info;
use uuid::Uuid;

use crate::db::models::{ArchiveRecord, ArchiveStatus};
use crate::error::EngineError;
use crate::services::clock::Clock;
use crate::store::{StoreResult, TenderStore};
use crate::utils;

/// Domain-separation salt for the archive key derivation. The secret
/// itself is per-deployment configuration.
const KDF_SALT: &[u8] = b"tender-archive-kdf-v1";

/// GCM authentication tag length in bytes.
const TAG_LEN: usize = 16;

/// An encrypted payload: ciphertext, per-record IV, authentication tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedPayload {
    pub ciphertext: Vec<u8>,
    pub iv: Vec<u8>,
    pub tag: Vec<u8>,
}

/// Authenticated symmetric cipher for archive payloads.
///
/// A trait so tests can substitute implementations; production uses
/// [`AesGcmCipher`].
pub trait ArchiveCipher: Send + Sync {
    fn seal(&self, plaintext: &[u8]) -> Result<SealedPayload, EngineError>;
    fn open(&self, sealed: &SealedPayload) -> Result<Vec<u8>, EngineError>;
}

/// AES-256-GCM with an Argon2id-derived key.
#[derive(Clone)]
pub struct AesGcmCipher {
    key: [u8; 32],
}

impl AesGcmCipher {
    /// Derive the archive key from the configured secret. Runs the
    /// slow KDF once at startup, not per record.
    pub fn from_secret(secret: &str) -> Result<Self, EngineError> {
        if secret.trim().is_empty() {
            return Err(EngineError::Encryption(
                "archive secret must not be empty".to_string(),
            ));
        }
        let mut key = [0u8; 32];
        Argon2::default()
            .hash_password_into(secret.as_bytes(), KDF_SALT, &mut key)
            .map_err(|e| EngineError::Encryption(format!("key derivation failed: {}", e)))?;
        Ok(Self { key })
    }
}

impl ArchiveCipher for AesGcmCipher {
    fn seal(&self, plaintext: &[u8]) -> Result<SealedPayload, EngineError> {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let mut ciphertext = cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| EngineError::Encryption(format!("encryption failed: {}", e)))?;

        // aes-gcm appends the tag; store it as a separate field.
        let tag = ciphertext.split_off(ciphertext.len() - TAG_LEN);
        Ok(SealedPayload {
            ciphertext,
            iv: nonce.to_vec(),
            tag,
        })
    }

    fn open(&self, sealed: &SealedPayload) -> Result<Vec<u8>, EngineError> {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));
        let mut combined = sealed.ciphertext.clone();
        combined.extend_from_slice(&sealed.tag);
        cipher
            .decrypt(Nonce::from_slice(&sealed.iv), combined.as_ref())
            .map_err(|_| {
                EngineError::Encryption("authentication failed: ciphertext or tag tampered".to_string())
            })
    }
}

/// A decrypted archive document plus its metadata.
#[derive(Debug, Clone)]
pub struct DecryptedArchive {
    pub archive_id: String,
    pub doc_type: String,
    pub ref_id: Uuid,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Stores and retrieves encrypted decision documents.
#[derive(Clone)]
pub struct ArchiveService<S, C> {
    store: S,
    cipher: C,
    clock: Arc<dyn Clock>,
    default_retention_years: u32,
}

impl<S: TenderStore, C: ArchiveCipher> ArchiveService<S, C> {
    pub fn new(store: S, cipher: C, clock: Arc<dyn Clock>, default_retention_years: u32) -> Self {
        Self {
            store,
            cipher,
            clock,
            default_retention_years,
        }
    }

    /// Encrypt and persist a decision document.
    ///
    /// `retention_years = None` uses the configured default (7 unless
    /// overridden).
    pub async fn archive(
        &self,
        doc_type: &str,
        ref_id: Uuid,
        payload: &serde_json::Value,
        retention_years: Option<u32>,
    ) -> Result<ArchiveRecord, EngineError> {
        let retention_years = retention_years.unwrap_or(self.default_retention_years);
        let plaintext = serde_json::to_vec(payload)
            .map_err(|e| EngineError::Validation(format!("unserializable payload: {}", e)))?;
        let sealed = self.cipher.seal(&plaintext)?;

        let now = self.clock.now();
        let record = ArchiveRecord {
            archive_id: utils::archive_id(now),
            doc_type: doc_type.to_string(),
            ref_id,
            ciphertext: BASE64.encode(&sealed.ciphertext),
            iv: BASE64.encode(&sealed.iv),
            tag: BASE64.encode(&sealed.tag),
            retention_years,
            expires_at: now + Duration::days(365 * retention_years as i64),
            status: ArchiveStatus::Active,
            created_at: now,
        };

        self.store.insert_archive(record.clone()).await?;
        info!(
            "Archived {} document {} for {} ({}y retention)",
            doc_type, record.archive_id, ref_id, retention_years
        );
        Ok(record)
    }

    /// Decrypt an archived document.
    ///
    /// Fails with `NotFound` for unknown ids and for expired records;
    /// fails with `Encryption` when authentication does not check out.
    pub async fn retrieve(&self, archive_id: &str) -> Result<DecryptedArchive, EngineError> {
        let record = self
            .store
            .get_archive(archive_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("archive {}", archive_id)))?;

        if record.status == ArchiveStatus::Expired || record.expires_at <= self.clock.now() {
            return Err(EngineError::NotFound(format!(
                "archive {} has expired",
                archive_id
            )));
        }

        let sealed = SealedPayload {
            ciphertext: decode_b64(&record.ciphertext)?,
            iv: decode_b64(&record.iv)?,
            tag: decode_b64(&record.tag)?,
        };
        let plaintext = self.cipher.open(&sealed)?;
        let payload = serde_json::from_slice(&plaintext)
            .map_err(|e| EngineError::Encryption(format!("corrupt archived payload: {}", e)))?;

        Ok(DecryptedArchive {
            archive_id: record.archive_id,
            doc_type: record.doc_type,
            ref_id: record.ref_id,
            payload,
            created_at: record.created_at,
            expires_at: record.expires_at,
        })
    }

    /// Flip overdue active records to `expired`. Driven by the
    /// scheduler; rows are never deleted, preserving auditability.
    pub async fn expire_due(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        self.store.expire_archives(now).await
    }
}

fn decode_b64(value: &str) -> Result<Vec<u8>, EngineError> {
    BASE64
        .decode(value)
        .map_err(|e| EngineError::Encryption(format!("corrupt archive encoding: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::clock::{ManualClock, SystemClock};
    use crate::store::MemoryStore;
    use chrono::TimeZone;
    use serde_json::json;

    fn cipher() -> AesGcmCipher {
        AesGcmCipher::from_secret("unit-test-secret").unwrap()
    }

    fn service(store: MemoryStore) -> ArchiveService<MemoryStore, AesGcmCipher> {
        ArchiveService::new(store, cipher(), Arc::new(SystemClock), 7)
    }

    #[test]
    fn seal_open_round_trip() {
        let c = cipher();
        let payload = br#"{"winner":"supplier-7","amount":125000}"#;
        let sealed = c.seal(payload).unwrap();
        assert_eq!(c.open(&sealed).unwrap(), payload.to_vec());
    }

    #[test]
    fn tampered_ciphertext_fails_authentication() {
        let c = cipher();
        let mut sealed = c.seal(b"decision document").unwrap();
        sealed.ciphertext[0] ^= 0x01;
        assert!(matches!(c.open(&sealed), Err(EngineError::Encryption(_))));
    }

    #[test]
    fn tampered_tag_fails_authentication() {
        let c = cipher();
        let mut sealed = c.seal(b"decision document").unwrap();
        let last = sealed.tag.len() - 1;
        sealed.tag[last] ^= 0x80;
        assert!(matches!(c.open(&sealed), Err(EngineError::Encryption(_))));
    }

    #[test]
    fn empty_secret_is_rejected() {
        assert!(matches!(
            AesGcmCipher::from_secret("  "),
            Err(EngineError::Encryption(_))
        ));
    }

    #[tokio::test]
    async fn archive_and_retrieve_round_trip() {
        let store = MemoryStore::new();
        let service = service(store);
        let ref_id = Uuid::new_v4();
        let payload = json!({"reason": "budget withdrawn", "offers": 3});

        let record = service
            .archive("tender_cancellation", ref_id, &payload, None)
            .await
            .unwrap();
        assert!(record.archive_id.starts_with("ARC-"));
        assert_eq!(record.retention_years, 7);
        assert_eq!(record.status, ArchiveStatus::Active);

        let decrypted = service.retrieve(&record.archive_id).await.unwrap();
        assert_eq!(decrypted.payload, payload);
        assert_eq!(decrypted.ref_id, ref_id);
    }

    #[tokio::test]
    async fn tampering_with_stored_ciphertext_is_detected() {
        let store = MemoryStore::new();
        let service = service(store.clone());
        let record = service
            .archive("award_decision", Uuid::new_v4(), &json!({"w": 1}), None)
            .await
            .unwrap();

        let mut tampered = record.clone();
        let mut raw = BASE64.decode(&tampered.ciphertext).unwrap();
        raw[0] ^= 0xff;
        tampered.ciphertext = BASE64.encode(&raw);
        store.overwrite_archive(tampered);

        assert!(matches!(
            service.retrieve(&record.archive_id).await,
            Err(EngineError::Encryption(_))
        ));
    }

    #[tokio::test]
    async fn expired_records_are_refused_and_swept() {
        let store = MemoryStore::new();
        let service = service(store.clone());
        let record = service
            .archive("award_decision", Uuid::new_v4(), &json!({"w": 1}), Some(0))
            .await
            .unwrap();

        // Zero-year retention expires immediately.
        assert!(matches!(
            service.retrieve(&record.archive_id).await,
            Err(EngineError::NotFound(_))
        ));

        let flipped = service.expire_due(Utc::now()).await.unwrap();
        assert_eq!(flipped, 1);
        let stored = store.get_archive(&record.archive_id).await.unwrap().unwrap();
        assert_eq!(stored.status, ArchiveStatus::Expired);
    }

    #[tokio::test]
    async fn unknown_archive_id_is_not_found() {
        let service = service(MemoryStore::new());
        assert!(matches!(
            service.retrieve("ARC-0-ffffff").await,
            Err(EngineError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn timestamps_come_from_the_injected_clock() {
        let store = MemoryStore::new();
        let start = Utc.with_ymd_and_hms(2026, 1, 15, 9, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        let service = ArchiveService::new(store, cipher(), Arc::new(clock), 7);

        let record = service
            .archive("award_decision", Uuid::new_v4(), &json!({"w": 1}), Some(2))
            .await
            .unwrap();

        assert_eq!(record.created_at, start);
        assert_eq!(record.expires_at, start + Duration::days(365 * 2));
    }
}
