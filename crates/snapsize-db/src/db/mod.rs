//! Database repositories for data access layer
//
// Quota ledger (the only cross-request shared state)
pub mod quota;
//
// Pool setup and migrations
pub mod pool;

pub use pool::connect;
pub use quota::PgQuotaLedger;
