//! Quota ledger interface
//!
//! The ledger is the only state shared across requests. Implementations must apply
//! every debit as one atomic conditional update so concurrent batches from the same
//! account can never push a counter past its limit or the credit balance below zero.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{LimitKind, PlanLimits, PlanUpdate, QuotaDebit, QuotaSnapshot};

#[async_trait]
pub trait QuotaLedger: Send + Sync {
    /// Current counters for an account. Unknown accounts are provisioned on the free
    /// plan; elapsed daily/period windows are rolled over before returning.
    async fn snapshot(&self, account_id: Uuid) -> Result<QuotaSnapshot, AppError>;

    /// Apply a debit only if every limit still holds, otherwise return
    /// `AdmissionDenied` for the first violated limit.
    async fn debit(
        &self,
        account_id: Uuid,
        debit: QuotaDebit,
        limits: &PlanLimits,
    ) -> Result<QuotaSnapshot, AppError>;

    async fn grant_credits(&self, account_id: Uuid, credits: u64)
        -> Result<QuotaSnapshot, AppError>;

    async fn set_plan(&self, account_id: Uuid, update: PlanUpdate)
        -> Result<QuotaSnapshot, AppError>;

    /// Readiness check
    async fn health_check(&self) -> Result<(), AppError>;

    fn backend_name(&self) -> &'static str;
}

/// Check a debit against a snapshot whose windows are already rolled for `now`.
///
/// Shared by ledgers that hold the row in memory; the SQL ledger encodes the same
/// conditions in its `WHERE` clause.
pub fn check_debit(
    snapshot: &QuotaSnapshot,
    debit: &QuotaDebit,
    limits: &PlanLimits,
) -> Result<(), AppError> {
    if let Some(limit) = limits.daily_limit {
        if snapshot.used_today + debit.allowance > limit {
            return Err(AppError::AdmissionDenied {
                kind: LimitKind::Daily,
                remaining: Some(limit.saturating_sub(snapshot.used_today)),
            });
        }
    }
    if let Some(limit) = limits.monthly_limit {
        if snapshot.used_this_period + debit.allowance > limit {
            return Err(AppError::AdmissionDenied {
                kind: LimitKind::Monthly,
                remaining: Some(limit.saturating_sub(snapshot.used_this_period)),
            });
        }
    }
    if snapshot.credit_balance < debit.credits {
        return Err(AppError::AdmissionDenied {
            kind: LimitKind::Scoops,
            remaining: Some(snapshot.credit_balance),
        });
    }
    Ok(())
}

/// Apply a debit that already passed [`check_debit`].
pub fn apply_debit(snapshot: &mut QuotaSnapshot, debit: &QuotaDebit) {
    snapshot.used_today += debit.allowance;
    snapshot.used_this_period += debit.allowance;
    snapshot.credit_balance -= debit.credits;
}

/// Roll windows, check and apply in one step.
pub fn debit_snapshot(
    snapshot: &mut QuotaSnapshot,
    debit: &QuotaDebit,
    limits: &PlanLimits,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    snapshot.roll_windows(now);
    check_debit(snapshot, debit, limits)?;
    apply_debit(snapshot, debit);
    Ok(())
}
