//! Quota ledger setup

use anyhow::Result;
use snapsize_core::{Config, QuotaLedger};
use snapsize_db::PgQuotaLedger;
use snapsize_services::InMemoryQuotaLedger;
use std::sync::Arc;

/// PostgreSQL ledger when `DATABASE_URL` is set, otherwise the in-process ledger.
///
/// The in-process ledger loses every counter on restart, so production refuses it.
pub async fn setup_ledger(config: &Config) -> Result<Arc<dyn QuotaLedger>> {
    match config.database_url() {
        Some(url) => {
            let pool = snapsize_db::connect(
                url,
                config.db_max_connections(),
                config.db_timeout_seconds(),
            )
            .await?;
            tracing::info!(backend = "postgres", "Quota ledger initialized");
            Ok(Arc::new(PgQuotaLedger::new(pool)))
        }
        None if config.is_production() => Err(anyhow::anyhow!(
            "DATABASE_URL must be set in production; the in-memory quota ledger is not durable"
        )),
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory quota ledger");
            Ok(Arc::new(InMemoryQuotaLedger::new()))
        }
    }
}
