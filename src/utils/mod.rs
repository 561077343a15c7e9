//! # Utilities Module
//!
//! Identifier generation helpers shared across services.

use chrono::{DateTime, Utc};
use rand::Rng;

/// Generate a human-readable tender reference.
///
/// Format: `TND-YYYYMMDD-HEXHEX`, e.g. `TND-20260823-4F9A2C1B`.
/// The date makes references sortable at a glance; the random
/// uppercase-hex suffix makes them globally unique in practice and
/// the database enforces uniqueness as a backstop.
pub fn tender_reference(now: DateTime<Utc>) -> String {
    let suffix: [u8; 4] = rand::thread_rng().gen();
    format!("TND-{}-{}", now.format("%Y%m%d"), hex::encode_upper(suffix))
}

/// Generate a human-legible archive id.
///
/// Format: `ARC-<epoch-millis>-<random>`, e.g. `ARC-1755907200000-3f9a2c`.
/// The timestamp gives operational traceability; the random suffix
/// prevents enumeration of neighboring records.
pub fn archive_id(now: DateTime<Utc>) -> String {
    let suffix: [u8; 3] = rand::thread_rng().gen();
    format!("ARC-{}-{}", now.timestamp_millis(), hex::encode(suffix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn tender_reference_format() {
        let now = Utc.with_ymd_and_hms(2026, 8, 23, 12, 0, 0).unwrap();
        let reference = tender_reference(now);
        assert!(reference.starts_with("TND-20260823-"));
        let suffix = reference.rsplit('-').next().unwrap();
        assert_eq!(suffix.len(), 8);
        assert!(suffix
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn archive_id_format() {
        let now = Utc.with_ymd_and_hms(2026, 8, 23, 12, 0, 0).unwrap();
        let id = archive_id(now);
        let parts: Vec<&str> = id.splitn(3, '-').collect();
        assert_eq!(parts[0], "ARC");
        assert_eq!(parts[1], now.timestamp_millis().to_string());
        assert_eq!(parts[2].len(), 6);
    }

    #[test]
    fn ids_do_not_collide_trivially() {
        let now = Utc::now();
        assert_ne!(tender_reference(now), tender_reference(now));
        assert_ne!(archive_id(now), archive_id(now));
    }
}
