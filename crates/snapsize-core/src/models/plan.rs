use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;

const MIB: u64 = 1024 * 1024;

/// Subscription plan kind
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PlanKind {
    Free,
    Payg,
    Plus,
    Pro,
}

impl PlanKind {
    pub const ALL: [PlanKind; 4] = [PlanKind::Free, PlanKind::Payg, PlanKind::Plus, PlanKind::Pro];

    /// Position in the tier order. Pay-as-you-go and plus share a rank.
    pub fn rank(self) -> u8 {
        match self {
            PlanKind::Free => 0,
            PlanKind::Payg | PlanKind::Plus => 1,
            PlanKind::Pro => 2,
        }
    }

    pub fn limits(self) -> PlanLimits {
        match self {
            PlanKind::Free => PlanLimits {
                daily_limit: Some(20),
                monthly_limit: None,
                batch_size_limit: 10,
                max_file_size_bytes: 10 * MIB,
                unlimited: false,
                credit_funded: false,
            },
            PlanKind::Payg => PlanLimits {
                daily_limit: None,
                monthly_limit: None,
                batch_size_limit: 50,
                max_file_size_bytes: 25 * MIB,
                unlimited: false,
                credit_funded: true,
            },
            PlanKind::Plus => PlanLimits {
                daily_limit: None,
                monthly_limit: Some(1000),
                batch_size_limit: 50,
                max_file_size_bytes: 25 * MIB,
                unlimited: false,
                credit_funded: false,
            },
            PlanKind::Pro => PlanLimits {
                daily_limit: None,
                monthly_limit: None,
                batch_size_limit: 200,
                max_file_size_bytes: 50 * MIB,
                unlimited: true,
                credit_funded: false,
            },
        }
    }
}

impl Display for PlanKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            PlanKind::Free => write!(f, "free"),
            PlanKind::Payg => write!(f, "payg"),
            PlanKind::Plus => write!(f, "plus"),
            PlanKind::Pro => write!(f, "pro"),
        }
    }
}

impl FromStr for PlanKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "free" => Ok(PlanKind::Free),
            "payg" | "pay-as-you-go" => Ok(PlanKind::Payg),
            "plus" => Ok(PlanKind::Plus),
            "pro" => Ok(PlanKind::Pro),
            _ => Err(anyhow::anyhow!("Invalid plan: {}", s)),
        }
    }
}

/// Billing status reported by the external billing system
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BillingStatus {
    Active,
    Trialing,
    TrialExpired,
    PastDue,
    Canceled,
}

impl BillingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BillingStatus::Active => "active",
            BillingStatus::Trialing => "trialing",
            BillingStatus::TrialExpired => "trial_expired",
            BillingStatus::PastDue => "past_due",
            BillingStatus::Canceled => "canceled",
        }
    }
}

impl FromStr for BillingStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(BillingStatus::Active),
            "trialing" => Ok(BillingStatus::Trialing),
            "trial_expired" => Ok(BillingStatus::TrialExpired),
            "past_due" => Ok(BillingStatus::PastDue),
            "canceled" => Ok(BillingStatus::Canceled),
            _ => Err(anyhow::anyhow!("Invalid billing status: {}", s)),
        }
    }
}

/// Groups of processing options that a plan can lock as a whole
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OptionCategory {
    Naming,
    Quality,
    Size,
    Processing,
}

impl OptionCategory {
    pub const ALL: [OptionCategory; 4] = [
        OptionCategory::Naming,
        OptionCategory::Quality,
        OptionCategory::Size,
        OptionCategory::Processing,
    ];
}

impl Display for OptionCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            OptionCategory::Naming => write!(f, "naming"),
            OptionCategory::Quality => write!(f, "quality"),
            OptionCategory::Size => write!(f, "size"),
            OptionCategory::Processing => write!(f, "processing"),
        }
    }
}

/// Locked (plan, category) pairs. Anything absent is open; `naming` never appears.
const CATEGORY_LOCK_TABLE: &[(PlanKind, OptionCategory)] = &[
    (PlanKind::Free, OptionCategory::Quality),
    (PlanKind::Free, OptionCategory::Size),
    (PlanKind::Free, OptionCategory::Processing),
    (PlanKind::Payg, OptionCategory::Processing),
    (PlanKind::Plus, OptionCategory::Processing),
];

/// Category locks for one plan, resolved once per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct CategoryLocks {
    pub naming: bool,
    pub quality: bool,
    pub size: bool,
    pub processing: bool,
}

impl CategoryLocks {
    pub fn for_plan(plan: PlanKind) -> Self {
        let locked = |category| {
            CATEGORY_LOCK_TABLE
                .iter()
                .any(|&(p, c)| p == plan && c == category)
        };
        Self {
            naming: false,
            quality: locked(OptionCategory::Quality),
            size: locked(OptionCategory::Size),
            processing: locked(OptionCategory::Processing),
        }
    }

    pub fn is_locked(&self, category: OptionCategory) -> bool {
        match category {
            OptionCategory::Naming => false,
            OptionCategory::Quality => self.quality,
            OptionCategory::Size => self.size,
            OptionCategory::Processing => self.processing,
        }
    }

    pub fn usable(&self) -> Vec<OptionCategory> {
        OptionCategory::ALL
            .into_iter()
            .filter(|c| !self.is_locked(*c))
            .collect()
    }
}

/// Static limits of a plan kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct PlanLimits {
    pub daily_limit: Option<u64>,
    pub monthly_limit: Option<u64>,
    pub batch_size_limit: u64,
    pub max_file_size_bytes: u64,
    pub unlimited: bool,
    pub credit_funded: bool,
}

/// A plan's limits combined with the account's credit balance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PlanTier {
    pub kind: PlanKind,
    pub daily_limit: Option<u64>,
    pub monthly_limit: Option<u64>,
    pub batch_size_limit: u64,
    pub max_file_size_bytes: u64,
    pub credit_balance: u64,
    pub unlimited: bool,
    pub credit_funded: bool,
    pub category_locks: CategoryLocks,
}

impl PlanTier {
    pub fn new(kind: PlanKind, credit_balance: u64) -> Self {
        let limits = kind.limits();
        Self {
            kind,
            daily_limit: limits.daily_limit,
            monthly_limit: limits.monthly_limit,
            batch_size_limit: limits.batch_size_limit,
            max_file_size_bytes: limits.max_file_size_bytes,
            credit_balance,
            unlimited: limits.unlimited,
            credit_funded: limits.credit_funded,
            category_locks: CategoryLocks::for_plan(kind),
        }
    }

    pub fn limits(&self) -> PlanLimits {
        PlanLimits {
            daily_limit: self.daily_limit,
            monthly_limit: self.monthly_limit,
            batch_size_limit: self.batch_size_limit,
            max_file_size_bytes: self.max_file_size_bytes,
            unlimited: self.unlimited,
            credit_funded: self.credit_funded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_naming_is_never_locked() {
        for plan in PlanKind::ALL {
            let locks = CategoryLocks::for_plan(plan);
            assert!(!locks.naming);
            assert!(!locks.is_locked(OptionCategory::Naming));
            assert!(locks.usable().contains(&OptionCategory::Naming));
        }
    }

    #[test]
    fn test_free_plan_locks() {
        let locks = CategoryLocks::for_plan(PlanKind::Free);
        assert!(locks.quality);
        assert!(locks.size);
        assert!(locks.processing);
        assert_eq!(locks.usable(), vec![OptionCategory::Naming]);
    }

    #[test]
    fn test_pro_plan_has_everything_open() {
        let locks = CategoryLocks::for_plan(PlanKind::Pro);
        assert_eq!(locks.usable().len(), 4);
    }

    #[test]
    fn test_tier_order() {
        assert!(PlanKind::Free.rank() < PlanKind::Payg.rank());
        assert_eq!(PlanKind::Payg.rank(), PlanKind::Plus.rank());
        assert!(PlanKind::Plus.rank() < PlanKind::Pro.rank());
    }

    #[test]
    fn test_plan_tier_carries_credit_balance() {
        let tier = PlanTier::new(PlanKind::Free, 7);
        assert_eq!(tier.daily_limit, Some(20));
        assert_eq!(tier.credit_balance, 7);
        assert!(!tier.unlimited);
        assert!(PlanTier::new(PlanKind::Payg, 0).credit_funded);
    }

    #[test]
    fn test_plan_kind_parse() {
        assert_eq!("FREE".parse::<PlanKind>().unwrap(), PlanKind::Free);
        assert_eq!("pay-as-you-go".parse::<PlanKind>().unwrap(), PlanKind::Payg);
        assert!("enterprise".parse::<PlanKind>().is_err());
    }
}
