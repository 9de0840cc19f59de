//! Admission controller
//!
//! Decides whether a batch may proceed given the account's plan tier and a quota
//! snapshot. Everything here is pure: the same inputs always produce the same
//! decision, and nothing is debited. Debiting happens in the ledger once the batch
//! has actually completed.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::AppError;
use crate::models::{
    BillingStatus, CategoryLocks, LimitKind, OptionCategory, PlanTier, ProcessingOptions,
    QuotaDebit, QuotaSnapshot,
};

/// Shape of a batch as far as admission is concerned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionRequest {
    pub file_count: u64,
    pub file_sizes: Vec<u64>,
}

impl AdmissionRequest {
    pub fn from_sizes(file_sizes: Vec<u64>) -> Self {
        Self {
            file_count: file_sizes.len() as u64,
            file_sizes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct AdmissionDecision {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<LimitKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u64>,
    pub using_fallback: bool,
    /// What to debit once the batch completes. Present only when allowed.
    #[serde(skip)]
    pub debit: Option<QuotaDebit>,
}

impl AdmissionDecision {
    fn allow(remaining: Option<u64>, debit: QuotaDebit, using_fallback: bool) -> Self {
        Self {
            allowed: true,
            reason: None,
            remaining,
            using_fallback,
            debit: Some(debit),
        }
    }

    fn deny(reason: LimitKind, remaining: Option<u64>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
            remaining,
            using_fallback: false,
            debit: None,
        }
    }

    /// Convert into the debit to apply, or the typed denial.
    pub fn into_result(self) -> Result<QuotaDebit, AppError> {
        match (self.allowed, self.debit, self.reason) {
            (true, Some(debit), _) => Ok(debit),
            (_, _, Some(kind)) => Err(AppError::AdmissionDenied {
                kind,
                remaining: self.remaining,
            }),
            _ => Err(AppError::Internal(
                "admission decision without debit or reason".to_string(),
            )),
        }
    }
}

/// Evaluate admission in order, stopping at the first failing check.
pub fn evaluate(
    tier: &PlanTier,
    quota: &QuotaSnapshot,
    request: &AdmissionRequest,
    now: DateTime<Utc>,
) -> AdmissionDecision {
    if let Some(kind) = billing_denial(quota, now) {
        return AdmissionDecision::deny(kind, None);
    }

    if request.file_count > tier.batch_size_limit {
        return AdmissionDecision::deny(LimitKind::Batch, None);
    }

    if request
        .file_sizes
        .iter()
        .any(|size| *size > tier.max_file_size_bytes)
    {
        return AdmissionDecision::deny(LimitKind::FileSize, None);
    }

    let requested = request.file_count;

    if tier.credit_funded {
        return if tier.credit_balance >= requested {
            AdmissionDecision::allow(
                Some(tier.credit_balance),
                QuotaDebit {
                    allowance: 0,
                    credits: requested,
                },
                false,
            )
        } else {
            AdmissionDecision::deny(LimitKind::Scoops, Some(tier.credit_balance))
        };
    }

    if let Some(limit) = tier.daily_limit {
        return allowance_branch(
            LimitKind::Daily,
            limit,
            quota.used_today,
            tier.credit_balance,
            requested,
        );
    }

    if let Some(limit) = tier.monthly_limit {
        return allowance_branch(
            LimitKind::Monthly,
            limit,
            quota.used_this_period,
            tier.credit_balance,
            requested,
        );
    }

    // No daily or monthly limit and not credit-funded: unlimited.
    AdmissionDecision::allow(
        None,
        QuotaDebit {
            allowance: requested,
            credits: 0,
        },
        false,
    )
}

fn billing_denial(quota: &QuotaSnapshot, now: DateTime<Utc>) -> Option<LimitKind> {
    let period_over = quota.period_ends_at.map(|end| end <= now);
    match quota.billing_status {
        BillingStatus::TrialExpired => Some(LimitKind::TrialExpired),
        BillingStatus::Trialing if period_over == Some(true) => Some(LimitKind::TrialExpired),
        BillingStatus::Canceled if period_over.unwrap_or(true) => {
            Some(LimitKind::SubscriptionEnded)
        }
        _ => None,
    }
}

/// Spend the windowed allowance first, then fall back to credits for the shortfall.
fn allowance_branch(
    kind: LimitKind,
    limit: u64,
    used: u64,
    credit_balance: u64,
    requested: u64,
) -> AdmissionDecision {
    let remaining = limit.saturating_sub(used);
    if remaining >= requested {
        return AdmissionDecision::allow(
            Some(remaining),
            QuotaDebit {
                allowance: requested,
                credits: 0,
            },
            false,
        );
    }

    let shortfall = requested - remaining;
    if credit_balance >= shortfall {
        AdmissionDecision::allow(
            Some(remaining),
            QuotaDebit {
                allowance: remaining,
                credits: shortfall,
            },
            true,
        )
    } else {
        AdmissionDecision::deny(kind, Some(remaining))
    }
}

/// Reject options that set a non-default value in a category the plan locks.
///
/// Expects normalized options. Default values in a locked category pass.
pub fn check_category_gating(
    locks: &CategoryLocks,
    options: &ProcessingOptions,
) -> Result<(), AppError> {
    match options
        .non_default_categories()
        .into_iter()
        .find(|category| locks.is_locked(*category))
    {
        Some(category) => Err(AppError::LockedCategory(category)),
        None => Ok(()),
    }
}

pub fn usable_categories(locks: &CategoryLocks) -> Vec<OptionCategory> {
    locks.usable()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        OutputFormat, PlanKind, QualitySettings, SelectedVariants, SizeLabel,
    };
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    const MIB: u64 = 1024 * 1024;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap()
    }

    fn snapshot(plan: PlanKind) -> QuotaSnapshot {
        let mut s = QuotaSnapshot::new_free(Uuid::nil(), now());
        s.plan = plan;
        s
    }

    #[test]
    fn test_free_tier_daily_exhaustion_denied() {
        let tier = PlanTier::new(PlanKind::Free, 0);
        let mut quota = snapshot(PlanKind::Free);
        quota.used_today = 19;

        let decision = evaluate(
            &tier,
            &quota,
            &AdmissionRequest::from_sizes(vec![2 * MIB, MIB]),
            now(),
        );

        assert!(!decision.allowed);
        assert_eq!(decision.reason, Some(LimitKind::Daily));
        assert_eq!(decision.remaining, Some(1));
        assert!(decision.clone().into_result().is_err());
    }

    #[test]
    fn test_free_tier_single_file_fits_remaining() {
        let tier = PlanTier::new(PlanKind::Free, 0);
        let mut quota = snapshot(PlanKind::Free);
        quota.used_today = 19;

        let decision = evaluate(
            &tier,
            &quota,
            &AdmissionRequest::from_sizes(vec![MIB]),
            now(),
        );
        assert!(decision.allowed);
        assert_eq!(decision.remaining, Some(1));
        assert!(!decision.using_fallback);
    }

    #[test]
    fn test_free_tier_credit_fallback_covers_shortfall() {
        let tier = PlanTier::new(PlanKind::Free, 1);
        let mut quota = snapshot(PlanKind::Free);
        quota.used_today = 19;
        quota.credit_balance = 1;

        let decision = evaluate(
            &tier,
            &quota,
            &AdmissionRequest::from_sizes(vec![2 * MIB, MIB]),
            now(),
        );

        assert!(decision.allowed);
        assert!(decision.using_fallback);
        assert_eq!(decision.remaining, Some(1));
        assert_eq!(
            decision.into_result().unwrap(),
            QuotaDebit {
                allowance: 1,
                credits: 1
            }
        );
    }

    #[test]
    fn test_batch_size_checked_before_file_size() {
        let tier = PlanTier::new(PlanKind::Free, 0);
        let sizes = vec![100 * MIB; 11];
        let decision = evaluate(
            &tier,
            &snapshot(PlanKind::Free),
            &AdmissionRequest::from_sizes(sizes),
            now(),
        );
        assert_eq!(decision.reason, Some(LimitKind::Batch));
    }

    #[test]
    fn test_file_size_limit() {
        let tier = PlanTier::new(PlanKind::Plus, 0);
        let decision = evaluate(
            &tier,
            &snapshot(PlanKind::Plus),
            &AdmissionRequest::from_sizes(vec![MIB, 25 * MIB + 1]),
            now(),
        );
        assert_eq!(decision.reason, Some(LimitKind::FileSize));
        assert_eq!(decision.remaining, None);
    }

    #[test]
    fn test_payg_requires_credits() {
        let tier = PlanTier::new(PlanKind::Payg, 2);
        let quota = snapshot(PlanKind::Payg);

        let decision = evaluate(
            &tier,
            &quota,
            &AdmissionRequest::from_sizes(vec![MIB; 3]),
            now(),
        );
        assert_eq!(decision.reason, Some(LimitKind::Scoops));
        assert_eq!(decision.remaining, Some(2));

        let decision = evaluate(
            &tier,
            &quota,
            &AdmissionRequest::from_sizes(vec![MIB; 2]),
            now(),
        );
        assert_eq!(
            decision.into_result().unwrap(),
            QuotaDebit {
                allowance: 0,
                credits: 2
            }
        );
    }

    #[test]
    fn test_plus_monthly_limit() {
        let tier = PlanTier::new(PlanKind::Plus, 0);
        let mut quota = snapshot(PlanKind::Plus);
        quota.used_this_period = 999;

        let decision = evaluate(
            &tier,
            &quota,
            &AdmissionRequest::from_sizes(vec![MIB; 2]),
            now(),
        );
        assert_eq!(decision.reason, Some(LimitKind::Monthly));
        assert_eq!(decision.remaining, Some(1));
    }

    #[test]
    fn test_pro_is_unlimited() {
        let tier = PlanTier::new(PlanKind::Pro, 0);
        let mut quota = snapshot(PlanKind::Pro);
        quota.used_today = 1_000_000;

        let decision = evaluate(
            &tier,
            &quota,
            &AdmissionRequest::from_sizes(vec![MIB; 200]),
            now(),
        );
        assert!(decision.allowed);
        assert_eq!(decision.remaining, None);
    }

    #[test]
    fn test_billing_status_denials() {
        let tier = PlanTier::new(PlanKind::Pro, 0);
        let request = AdmissionRequest::from_sizes(vec![MIB]);

        let mut quota = snapshot(PlanKind::Pro);
        quota.billing_status = BillingStatus::TrialExpired;
        assert_eq!(
            evaluate(&tier, &quota, &request, now()).reason,
            Some(LimitKind::TrialExpired)
        );

        quota.billing_status = BillingStatus::Trialing;
        quota.period_ends_at = Some(now() - Duration::hours(1));
        assert_eq!(
            evaluate(&tier, &quota, &request, now()).reason,
            Some(LimitKind::TrialExpired)
        );

        quota.billing_status = BillingStatus::Canceled;
        assert_eq!(
            evaluate(&tier, &quota, &request, now()).reason,
            Some(LimitKind::SubscriptionEnded)
        );

        quota.period_ends_at = None;
        assert_eq!(
            evaluate(&tier, &quota, &request, now()).reason,
            Some(LimitKind::SubscriptionEnded)
        );

        // Canceled but still inside the paid period
        quota.period_ends_at = Some(now() + Duration::days(3));
        assert!(evaluate(&tier, &quota, &request, now()).allowed);

        quota.billing_status = BillingStatus::PastDue;
        assert!(evaluate(&tier, &quota, &request, now()).allowed);
    }

    #[test]
    fn test_evaluate_is_deterministic() {
        let tier = PlanTier::new(PlanKind::Free, 3);
        let mut quota = snapshot(PlanKind::Free);
        quota.used_today = 17;
        let request = AdmissionRequest::from_sizes(vec![MIB; 5]);

        let first = evaluate(&tier, &quota, &request, now());
        for _ in 0..10 {
            assert_eq!(evaluate(&tier, &quota, &request, now()), first);
        }
    }

    #[test]
    fn test_free_tier_locked_quality_rejected() {
        let locks = CategoryLocks::for_plan(PlanKind::Free);
        let options = ProcessingOptions {
            quality: QualitySettings {
                jpeg_quality: 95,
                ..Default::default()
            },
            ..Default::default()
        }
        .normalized();

        match check_category_gating(&locks, &options) {
            Err(AppError::LockedCategory(category)) => {
                assert_eq!(category, OptionCategory::Quality)
            }
            other => panic!("expected locked category, got {:?}", other),
        }

        let options = ProcessingOptions {
            selected_variants: SelectedVariants::new([SizeLabel::Xl]).unwrap(),
            ..Default::default()
        }
        .normalized();
        assert!(matches!(
            check_category_gating(&locks, &options),
            Err(AppError::LockedCategory(OptionCategory::Size))
        ));
    }

    #[test]
    fn test_default_values_in_locked_category_pass() {
        let locks = CategoryLocks::for_plan(PlanKind::Free);
        let options = ProcessingOptions {
            format: OutputFormat::Png,
            quality: QualitySettings::default(),
            ..Default::default()
        }
        .normalized();
        assert!(check_category_gating(&locks, &options).is_ok());

        let mut naming_only = options.clone();
        naming_only.naming.prefix = "thumb_".to_string();
        assert!(check_category_gating(&locks, &naming_only).is_ok());
    }

    #[test]
    fn test_gating_independent_of_admission() {
        let tier = PlanTier::new(PlanKind::Pro, 0);
        let options = ProcessingOptions {
            quality: QualitySettings {
                avif_quality: 30,
                ..Default::default()
            },
            ..Default::default()
        }
        .normalized();
        assert!(check_category_gating(&tier.category_locks, &options).is_ok());
        assert_eq!(usable_categories(&tier.category_locks).len(), 4);
    }
}
