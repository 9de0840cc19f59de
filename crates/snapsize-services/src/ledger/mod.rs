//! In-process quota ledger for development, tests and single-node deployments

use async_trait::async_trait;
use chrono::Utc;
use snapsize_core::ledger::debit_snapshot;
use snapsize_core::models::{PlanLimits, PlanUpdate, QuotaDebit, QuotaSnapshot};
use snapsize_core::{AppError, QuotaLedger};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

const SHARD_COUNT: usize = 16;

/// Quota ledger held in memory.
///
/// Accounts are spread over sharded mutexes. Each operation rolls windows, checks and
/// applies inside one critical section, which gives the same atomicity as the SQL
/// ledger's conditional update.
pub struct InMemoryQuotaLedger {
    shards: Vec<Mutex<HashMap<Uuid, QuotaSnapshot>>>,
}

impl Default for InMemoryQuotaLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryQuotaLedger {
    pub fn new() -> Self {
        Self {
            shards: (0..SHARD_COUNT).map(|_| Mutex::new(HashMap::new())).collect(),
        }
    }

    fn shard(&self, account_id: Uuid) -> &Mutex<HashMap<Uuid, QuotaSnapshot>> {
        &self.shards[(account_id.as_u128() % SHARD_COUNT as u128) as usize]
    }

    /// Run `f` on the account's row, provisioning it and rolling windows first.
    async fn with_account<T>(
        &self,
        account_id: Uuid,
        f: impl FnOnce(&mut QuotaSnapshot) -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let now = Utc::now();
        let mut shard = self.shard(account_id).lock().await;
        let snapshot = shard
            .entry(account_id)
            .or_insert_with(|| QuotaSnapshot::new_free(account_id, now));
        snapshot.roll_windows(now);
        f(snapshot)
    }
}

#[async_trait]
impl QuotaLedger for InMemoryQuotaLedger {
    async fn snapshot(&self, account_id: Uuid) -> Result<QuotaSnapshot, AppError> {
        self.with_account(account_id, |snapshot| Ok(snapshot.clone()))
            .await
    }

    #[tracing::instrument(skip(self, limits), fields(ledger = "memory"))]
    async fn debit(
        &self,
        account_id: Uuid,
        debit: QuotaDebit,
        limits: &PlanLimits,
    ) -> Result<QuotaSnapshot, AppError> {
        self.with_account(account_id, |snapshot| {
            debit_snapshot(snapshot, &debit, limits, Utc::now())?;
            Ok(snapshot.clone())
        })
        .await
    }

    async fn grant_credits(
        &self,
        account_id: Uuid,
        credits: u64,
    ) -> Result<QuotaSnapshot, AppError> {
        self.with_account(account_id, |snapshot| {
            snapshot.credit_balance = snapshot.credit_balance.saturating_add(credits);
            Ok(snapshot.clone())
        })
        .await
    }

    async fn set_plan(
        &self,
        account_id: Uuid,
        update: PlanUpdate,
    ) -> Result<QuotaSnapshot, AppError> {
        self.with_account(account_id, |snapshot| {
            snapshot.plan = update.plan;
            snapshot.billing_status = update.billing_status;
            snapshot.period_ends_at = update.period_ends_at;
            Ok(snapshot.clone())
        })
        .await
    }

    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
