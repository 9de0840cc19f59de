use async_trait::async_trait;
use chrono::{DateTime, Utc};
use snapsize_core::ledger::check_debit;
use snapsize_core::models::{
    next_daily_reset, next_period_reset, PlanLimits, PlanUpdate, QuotaDebit, QuotaSnapshot,
};
use snapsize_core::{AppError, QuotaLedger};
use sqlx::PgPool;
use uuid::Uuid;

/// A refused debit whose limits still hold on re-read lost a race with a window
/// rollover or a grant; retry it this many times before giving up.
const DEBIT_ATTEMPTS: usize = 3;

/// Zero elapsed windows inside an `ON CONFLICT DO UPDATE`. Binds: $2 now, $3 next daily
/// reset, $4 next period reset.
macro_rules! roll_windows_on_conflict {
    () => {
        r#"
            used_today = CASE WHEN quota_accounts.daily_resets_at <= $2
                THEN 0 ELSE quota_accounts.used_today END,
            daily_resets_at = CASE WHEN quota_accounts.daily_resets_at <= $2
                THEN $3 ELSE quota_accounts.daily_resets_at END,
            used_this_period = CASE WHEN quota_accounts.period_resets_at <= $2
                THEN 0 ELSE quota_accounts.used_this_period END,
            period_resets_at = CASE WHEN quota_accounts.period_resets_at <= $2
                THEN $4 ELSE quota_accounts.period_resets_at END,
            updated_at = NOW()
        "#
    };
}

macro_rules! returning_snapshot {
    () => {
        r#"
        RETURNING account_id, plan, billing_status, period_ends_at, used_today,
                  used_this_period, credit_balance, daily_resets_at, period_resets_at
        "#
    };
}

#[derive(Debug, sqlx::FromRow)]
struct QuotaRow {
    account_id: Uuid,
    plan: String,
    billing_status: String,
    period_ends_at: Option<DateTime<Utc>>,
    used_today: i64,
    used_this_period: i64,
    credit_balance: i64,
    daily_resets_at: DateTime<Utc>,
    period_resets_at: DateTime<Utc>,
}

impl TryFrom<QuotaRow> for QuotaSnapshot {
    type Error = AppError;

    fn try_from(row: QuotaRow) -> Result<Self, Self::Error> {
        let counter = |value: i64, column: &str| {
            u64::try_from(value)
                .map_err(|_| AppError::Internal(format!("Negative {} in quota row", column)))
        };

        Ok(QuotaSnapshot {
            account_id: row.account_id,
            plan: row
                .plan
                .parse()
                .map_err(|e: anyhow::Error| AppError::Internal(e.to_string()))?,
            billing_status: row
                .billing_status
                .parse()
                .map_err(|e: anyhow::Error| AppError::Internal(e.to_string()))?,
            period_ends_at: row.period_ends_at,
            used_today: counter(row.used_today, "used_today")?,
            used_this_period: counter(row.used_this_period, "used_this_period")?,
            credit_balance: counter(row.credit_balance, "credit_balance")?,
            daily_resets_at: row.daily_resets_at,
            period_resets_at: row.period_resets_at,
        })
    }
}

fn to_i64(value: u64, what: &str) -> Result<i64, AppError> {
    i64::try_from(value).map_err(|_| AppError::InvalidInput(format!("{} is out of range", what)))
}

/// PostgreSQL quota ledger.
///
/// Every mutation is one statement: window rollover, limit checks and the counter
/// change happen in the same `UPDATE`, so concurrent debits serialize on the row lock
/// and re-check their `WHERE` clause against the committed values.
#[derive(Clone)]
pub struct PgQuotaLedger {
    pool: PgPool,
}

impl PgQuotaLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn try_debit(
        &self,
        account_id: Uuid,
        debit: &QuotaDebit,
        limits: &PlanLimits,
        now: DateTime<Utc>,
    ) -> Result<Option<QuotaSnapshot>, AppError> {
        let row = sqlx::query_as::<_, QuotaRow>(concat!(
            r#"
            UPDATE quota_accounts SET
                used_today = (CASE WHEN daily_resets_at <= $2 THEN 0 ELSE used_today END) + $5,
                daily_resets_at = CASE WHEN daily_resets_at <= $2 THEN $3 ELSE daily_resets_at END,
                used_this_period = (CASE WHEN period_resets_at <= $2
                    THEN 0 ELSE used_this_period END) + $5,
                period_resets_at = CASE WHEN period_resets_at <= $2
                    THEN $4 ELSE period_resets_at END,
                credit_balance = credit_balance - $6,
                updated_at = NOW()
            WHERE account_id = $1
              AND credit_balance >= $6
              AND ($7::BIGINT IS NULL
                   OR (CASE WHEN daily_resets_at <= $2 THEN 0 ELSE used_today END) + $5 <= $7)
              AND ($8::BIGINT IS NULL
                   OR (CASE WHEN period_resets_at <= $2
                       THEN 0 ELSE used_this_period END) + $5 <= $8)
            "#,
            returning_snapshot!()
        ))
        .bind(account_id)
        .bind(now)
        .bind(next_daily_reset(now))
        .bind(next_period_reset(now))
        .bind(to_i64(debit.allowance, "allowance")?)
        .bind(to_i64(debit.credits, "credits")?)
        .bind(limits.daily_limit.map(|l| to_i64(l, "daily_limit")).transpose()?)
        .bind(limits.monthly_limit.map(|l| to_i64(l, "monthly_limit")).transpose()?)
        .fetch_optional(&self.pool)
        .await?;

        row.map(QuotaSnapshot::try_from).transpose()
    }
}

#[async_trait]
impl QuotaLedger for PgQuotaLedger {
    #[tracing::instrument(skip(self), fields(db.table = "quota_accounts", db.operation = "upsert", db.record_id = %account_id))]
    async fn snapshot(&self, account_id: Uuid) -> Result<QuotaSnapshot, AppError> {
        let now = Utc::now();
        let row = sqlx::query_as::<_, QuotaRow>(concat!(
            r#"
            INSERT INTO quota_accounts (account_id, daily_resets_at, period_resets_at)
            VALUES ($1, $3, $4)
            ON CONFLICT (account_id) DO UPDATE SET
            "#,
            roll_windows_on_conflict!(),
            returning_snapshot!()
        ))
        .bind(account_id)
        .bind(now)
        .bind(next_daily_reset(now))
        .bind(next_period_reset(now))
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    #[tracing::instrument(skip(self, limits), fields(db.table = "quota_accounts", db.operation = "update", db.record_id = %account_id))]
    async fn debit(
        &self,
        account_id: Uuid,
        debit: QuotaDebit,
        limits: &PlanLimits,
    ) -> Result<QuotaSnapshot, AppError> {
        if debit.is_empty() {
            return self.snapshot(account_id).await;
        }

        for attempt in 1..=DEBIT_ATTEMPTS {
            if let Some(snapshot) = self.try_debit(account_id, &debit, limits, Utc::now()).await? {
                tracing::info!(
                    allowance = debit.allowance,
                    credits = debit.credits,
                    used_today = snapshot.used_today,
                    credit_balance = snapshot.credit_balance,
                    "Quota debited"
                );
                return Ok(snapshot);
            }

            // Refused: report the violated limit from a fresh read (this also provisions
            // an account that has never been seen).
            let current = self.snapshot(account_id).await?;
            check_debit(&current, &debit, limits)?;
            tracing::debug!(attempt, "Debit refused but limits hold on re-read, retrying");
        }

        Err(AppError::Internal(format!(
            "Quota debit for {} did not settle after {} attempts",
            account_id, DEBIT_ATTEMPTS
        )))
    }

    #[tracing::instrument(skip(self), fields(db.table = "quota_accounts", db.operation = "upsert", db.record_id = %account_id))]
    async fn grant_credits(
        &self,
        account_id: Uuid,
        credits: u64,
    ) -> Result<QuotaSnapshot, AppError> {
        let now = Utc::now();
        let row = sqlx::query_as::<_, QuotaRow>(concat!(
            r#"
            INSERT INTO quota_accounts (account_id, daily_resets_at, period_resets_at, credit_balance)
            VALUES ($1, $3, $4, $5)
            ON CONFLICT (account_id) DO UPDATE SET
                credit_balance = quota_accounts.credit_balance + EXCLUDED.credit_balance,
            "#,
            roll_windows_on_conflict!(),
            returning_snapshot!()
        ))
        .bind(account_id)
        .bind(now)
        .bind(next_daily_reset(now))
        .bind(next_period_reset(now))
        .bind(to_i64(credits, "credits")?)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    #[tracing::instrument(skip(self, update), fields(db.table = "quota_accounts", db.operation = "upsert", db.record_id = %account_id, plan = %update.plan))]
    async fn set_plan(
        &self,
        account_id: Uuid,
        update: PlanUpdate,
    ) -> Result<QuotaSnapshot, AppError> {
        let now = Utc::now();
        let row = sqlx::query_as::<_, QuotaRow>(concat!(
            r#"
            INSERT INTO quota_accounts (
                account_id, daily_resets_at, period_resets_at, plan, billing_status, period_ends_at
            )
            VALUES ($1, $3, $4, $5, $6, $7)
            ON CONFLICT (account_id) DO UPDATE SET
                plan = EXCLUDED.plan,
                billing_status = EXCLUDED.billing_status,
                period_ends_at = EXCLUDED.period_ends_at,
            "#,
            roll_windows_on_conflict!(),
            returning_snapshot!()
        ))
        .bind(account_id)
        .bind(now)
        .bind(next_daily_reset(now))
        .bind(next_period_reset(now))
        .bind(update.plan.to_string())
        .bind(update.billing_status.as_str())
        .bind(update.period_ends_at)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use snapsize_core::models::{BillingStatus, PlanKind};

    fn row() -> QuotaRow {
        let now = Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap();
        QuotaRow {
            account_id: Uuid::nil(),
            plan: "plus".to_string(),
            billing_status: "past_due".to_string(),
            period_ends_at: None,
            used_today: 3,
            used_this_period: 40,
            credit_balance: 7,
            daily_resets_at: next_daily_reset(now),
            period_resets_at: next_period_reset(now),
        }
    }

    #[test]
    fn test_row_converts_to_snapshot() {
        let snapshot = QuotaSnapshot::try_from(row()).unwrap();
        assert_eq!(snapshot.plan, PlanKind::Plus);
        assert_eq!(snapshot.billing_status, BillingStatus::PastDue);
        assert_eq!(snapshot.used_this_period, 40);
        assert_eq!(snapshot.credit_balance, 7);
    }

    #[test]
    fn test_corrupt_row_rejected() {
        let mut bad = row();
        bad.credit_balance = -1;
        assert!(QuotaSnapshot::try_from(bad).is_err());

        let mut bad = row();
        bad.plan = "enterprise".to_string();
        assert!(QuotaSnapshot::try_from(bad).is_err());
    }

    #[test]
    fn test_to_i64_rejects_overflow() {
        assert_eq!(to_i64(5, "x").unwrap(), 5);
        assert!(to_i64(u64::MAX, "x").is_err());
    }
}
