//! # Services Module
//!
//! Business logic of the tender engine. Each service is written
//! against the store seam, so the whole layer runs identically on
//! Postgres and on the in-memory store used by tests.
//!
//! ## Services
//!
//! | Service | Responsibility |
//! |---------|----------------|
//! | [`lifecycle`] | Draft/publish/close transitions, offer intake |
//! | [`auto_close`] | Deadline sweep closing expired tenders |
//! | [`opening_report`] | Once-only offer snapshot at close |
//! | [`award`] | Transactional award of closed tenders |
//! | [`cancellation`] | Withdrawal of draft/published tenders |
//! | [`notification`] | Supplier matching and fan-out |
//! | [`archive`] | Encrypted decision documents with retention |
//! | [`audit`] | Append-only action trail |
//! | [`scheduler`] | Periodic job driver |
//! | [`clock`] | Injectable time source |

pub mod archive;
pub mod audit;
pub mod auto_close;
pub mod award;
pub mod cancellation;
pub mod clock;
pub mod lifecycle;
pub mod notification;
pub mod opening_report;
pub mod scheduler;

pub use archive::{AesGcmCipher, ArchiveCipher, ArchiveService, DecryptedArchive};
pub use audit::AuditLog;
pub use auto_close::{AutoCloseSweep, SweepOutcome};
pub use award::{AwardOrchestrator, AwardResult};
pub use cancellation::{CancellationResult, CancellationService};
pub use clock::{Clock, ManualClock, SystemClock};
pub use lifecycle::{NewTender, TenderLifecycle};
pub use notification::{FanoutReport, NotificationFanout};
pub use opening_report::ensure_opening_report;
pub use scheduler::Scheduler;
