//! Snapsize Database Library
//!
//! PostgreSQL persistence for the quota ledger. Migrations live in the workspace
//! `migrations/` directory.

pub mod db;

pub use db::{connect, PgQuotaLedger};
