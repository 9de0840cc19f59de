use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use utoipa::ToSchema;
use uuid::Uuid;

use super::plan::{BillingStatus, PlanKind};

/// Reason an admission request was denied
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
pub enum LimitKind {
    #[serde(rename = "daily")]
    Daily,
    #[serde(rename = "monthly")]
    Monthly,
    #[serde(rename = "batch")]
    Batch,
    #[serde(rename = "fileSize")]
    FileSize,
    #[serde(rename = "scoops")]
    Scoops,
    #[serde(rename = "trial_expired")]
    TrialExpired,
    #[serde(rename = "subscription_ended")]
    SubscriptionEnded,
}

impl LimitKind {
    /// Wire name, identical to the serde representation.
    pub fn as_str(self) -> &'static str {
        match self {
            LimitKind::Daily => "daily",
            LimitKind::Monthly => "monthly",
            LimitKind::Batch => "batch",
            LimitKind::FileSize => "fileSize",
            LimitKind::Scoops => "scoops",
            LimitKind::TrialExpired => "trial_expired",
            LimitKind::SubscriptionEnded => "subscription_ended",
        }
    }
}

impl Display for LimitKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of an account's quota ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct QuotaSnapshot {
    pub account_id: Uuid,
    pub plan: PlanKind,
    pub billing_status: BillingStatus,
    /// End of the trial or paid period, when billing tracks one.
    pub period_ends_at: Option<DateTime<Utc>>,
    pub used_today: u64,
    pub used_this_period: u64,
    pub credit_balance: u64,
    pub daily_resets_at: DateTime<Utc>,
    pub period_resets_at: DateTime<Utc>,
}

impl QuotaSnapshot {
    /// Fresh free-tier ledger row with windows anchored at `now`.
    pub fn new_free(account_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            account_id,
            plan: PlanKind::Free,
            billing_status: BillingStatus::Active,
            period_ends_at: None,
            used_today: 0,
            used_this_period: 0,
            credit_balance: 0,
            daily_resets_at: next_daily_reset(now),
            period_resets_at: next_period_reset(now),
        }
    }

    /// Zero any counter whose window has elapsed and move its reset time forward.
    pub fn roll_windows(&mut self, now: DateTime<Utc>) -> bool {
        let mut rolled = false;
        if self.daily_resets_at <= now {
            self.used_today = 0;
            self.daily_resets_at = next_daily_reset(now);
            rolled = true;
        }
        if self.period_resets_at <= now {
            self.used_this_period = 0;
            self.period_resets_at = next_period_reset(now);
            rolled = true;
        }
        rolled
    }
}

/// Quota to consume once a batch completes.
///
/// `allowance` is added to both the daily and the period counters; `credits` is
/// subtracted from the prepaid balance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct QuotaDebit {
    pub allowance: u64,
    pub credits: u64,
}

impl QuotaDebit {
    pub fn is_empty(&self) -> bool {
        self.allowance == 0 && self.credits == 0
    }
}

/// Plan and billing state pushed by the billing collaborator
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct PlanUpdate {
    pub plan: PlanKind,
    #[serde(default = "default_billing_status")]
    pub billing_status: BillingStatus,
    #[serde(default)]
    pub period_ends_at: Option<DateTime<Utc>>,
}

fn default_billing_status() -> BillingStatus {
    BillingStatus::Active
}

/// Next UTC midnight strictly after `now`.
pub fn next_daily_reset(now: DateTime<Utc>) -> DateTime<Utc> {
    let tomorrow = now.date_naive() + Duration::days(1);
    Utc.from_utc_datetime(&tomorrow.and_time(NaiveTime::MIN))
}

/// First instant of the next UTC calendar month.
pub fn next_period_reset(now: DateTime<Utc>) -> DateTime<Utc> {
    let (year, month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .unwrap_or_else(|| next_daily_reset(now))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_limit_kind_wire_names() {
        assert_eq!(
            serde_json::to_string(&LimitKind::FileSize).unwrap(),
            "\"fileSize\""
        );
        assert_eq!(
            serde_json::to_string(&LimitKind::TrialExpired).unwrap(),
            "\"trial_expired\""
        );
        for kind in [
            LimitKind::Daily,
            LimitKind::Monthly,
            LimitKind::Batch,
            LimitKind::FileSize,
            LimitKind::Scoops,
            LimitKind::TrialExpired,
            LimitKind::SubscriptionEnded,
        ] {
            assert_eq!(
                serde_json::to_string(&kind).unwrap(),
                format!("\"{}\"", kind.as_str())
            );
        }
    }

    #[test]
    fn test_reset_boundaries() {
        assert_eq!(next_daily_reset(at(2026, 3, 14, 23)), at(2026, 3, 15, 0));
        assert_eq!(next_daily_reset(at(2026, 3, 15, 0)), at(2026, 3, 16, 0));
        assert_eq!(next_period_reset(at(2026, 3, 14, 9)), at(2026, 4, 1, 0));
        assert_eq!(next_period_reset(at(2026, 12, 31, 9)), at(2027, 1, 1, 0));
    }

    #[test]
    fn test_roll_windows_resets_elapsed_counters_only() {
        let mut snapshot = QuotaSnapshot::new_free(Uuid::new_v4(), at(2026, 3, 14, 9));
        snapshot.used_today = 5;
        snapshot.used_this_period = 40;

        assert!(!snapshot.roll_windows(at(2026, 3, 14, 22)));
        assert_eq!(snapshot.used_today, 5);

        assert!(snapshot.roll_windows(at(2026, 3, 15, 1)));
        assert_eq!(snapshot.used_today, 0);
        assert_eq!(snapshot.used_this_period, 40);
        assert_eq!(snapshot.daily_resets_at, at(2026, 3, 16, 0));

        assert!(snapshot.roll_windows(at(2026, 4, 2, 1)));
        assert_eq!(snapshot.used_this_period, 0);
        assert_eq!(snapshot.period_resets_at, at(2026, 5, 1, 0));
    }
}
