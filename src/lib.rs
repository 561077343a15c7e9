//! # Tender Engine
//!
//! Lifecycle and award orchestration for a B2B procurement
//! marketplace. The engine owns the tender state machine
//! (`draft -> published -> closed -> awarded`, with cancellation from
//! the pre-closed states), the deadline sweep that closes expired
//! tenders, once-only opening reports, transactional awards, supplier
//! notification fan-out, encrypted decision archives, and the audit
//! trail behind all of it.
//!
//! ## Architecture
//!
//! ```text
//! scheduler ──► auto_close ──┐
//!                            ▼
//! lifecycle / award / cancel ──► store seam ──► Postgres | memory
//!        │                          ▲
//!        ├──► notification ─────────┘
//!        └──► archive (AES-256-GCM)
//! ```
//!
//! Services depend on the [`store::TenderStore`] trait, never on
//! Postgres directly; the in-memory implementation gives the test
//! suite the same atomicity semantics as the SQL transactions.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod store;
pub mod utils;

pub use error::EngineError;
