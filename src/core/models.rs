use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const DEFAULT_TURBO_UNIT_PRICE: u64 = 150;
pub const DEFAULT_TURBO_UNIT_VOLUME_GB: u64 = 1;
pub const DEFAULT_INCLUDED_FREE_GB: u64 = 1;

/// Fixed per-plan figures the purchase decision depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanConstants {
    /// Price of one turbo unit in minor currency units.
    pub turbo_unit_price: u64,
    pub turbo_unit_volume_gb: u64,
    pub included_free_gb: u64,
}

impl PlanConstants {
    /// Turbo GB still purchasable under `cap_gb`, `None` when uncapped.
    pub fn headroom_gb(&self, cap_gb: Option<u64>, used_gb: u64) -> Option<u64> {
        cap_gb.map(|cap| {
            cap.saturating_sub(self.included_free_gb)
                .saturating_sub(used_gb)
        })
    }
}

impl Default for PlanConstants {
    fn default() -> Self {
        Self {
            turbo_unit_price: DEFAULT_TURBO_UNIT_PRICE,
            turbo_unit_volume_gb: DEFAULT_TURBO_UNIT_VOLUME_GB,
            included_free_gb: DEFAULT_INCLUDED_FREE_GB,
        }
    }
}

/// Account readings taken once per tick. Never cached by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    /// Balance in minor currency units.
    pub balance: u64,
    pub remaining_free_mb: u64,
    pub plan_name: String,
    pub plan: PlanConstants,
}

/// The three independent conditions that must all hold for a purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gates {
    pub no_high_speed_data_remaining: bool,
    pub sufficient_funds: bool,
    pub within_policy: bool,
}

impl Gates {
    pub fn evaluate(account: &AccountSnapshot, cap_gb: Option<u64>, used_gb: u64) -> Self {
        let plan = &account.plan;

        let within_policy = match cap_gb {
            None => true,
            Some(cap) => {
                let max_turbo_gb = cap.saturating_sub(plan.included_free_gb);
                used_gb.saturating_add(plan.turbo_unit_volume_gb) < max_turbo_gb
            }
        };

        Self {
            no_high_speed_data_remaining: account.remaining_free_mb == 0,
            sufficient_funds: account.balance > plan.turbo_unit_price,
            within_policy,
        }
    }

    pub fn allow_purchase(&self) -> bool {
        self.no_high_speed_data_remaining && self.sufficient_funds && self.within_policy
    }
}

/// Outcome of evaluating one tick, before any side effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub date: NaiveDate,
    pub cap_gb: Option<u64>,
    pub used_gb: u64,
    pub account: AccountSnapshot,
    pub gates: Gates,
}

impl Decision {
    pub fn allow_purchase(&self) -> bool {
        self.gates.allow_purchase()
    }

    pub fn headroom_gb(&self) -> Option<u64> {
        self.account.plan.headroom_gb(self.cap_gb, self.used_gb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(balance: u64, remaining_free_mb: u64) -> AccountSnapshot {
        AccountSnapshot {
            balance,
            remaining_free_mb,
            plan_name: "Stream 10".to_string(),
            plan: PlanConstants {
                turbo_unit_price: 10,
                turbo_unit_volume_gb: 1,
                included_free_gb: 1,
            },
        }
    }

    #[test]
    fn test_all_gates_open() {
        let gates = Gates::evaluate(&account(50, 0), Some(5), 2);
        assert!(gates.no_high_speed_data_remaining);
        assert!(gates.sufficient_funds);
        assert!(gates.within_policy);
        assert!(gates.allow_purchase());
    }

    #[test]
    fn test_single_gate_blocks_purchase() {
        let open = Gates {
            no_high_speed_data_remaining: true,
            sufficient_funds: true,
            within_policy: true,
        };
        assert!(open.allow_purchase());

        let mut closed = open;
        closed.no_high_speed_data_remaining = false;
        assert!(!closed.allow_purchase());

        let mut closed = open;
        closed.sufficient_funds = false;
        assert!(!closed.allow_purchase());

        let mut closed = open;
        closed.within_policy = false;
        assert!(!closed.allow_purchase());
    }

    #[test]
    fn test_remaining_data_must_be_exactly_zero() {
        assert!(!Gates::evaluate(&account(50, 1), Some(5), 0).no_high_speed_data_remaining);
        assert!(!Gates::evaluate(&account(50, 2048), Some(5), 0).no_high_speed_data_remaining);
    }

    #[test]
    fn test_balance_must_exceed_price() {
        assert!(!Gates::evaluate(&account(5, 0), Some(5), 0).sufficient_funds);
        assert!(!Gates::evaluate(&account(10, 0), Some(5), 0).sufficient_funds);
        assert!(Gates::evaluate(&account(11, 0), Some(5), 0).sufficient_funds);
    }

    #[test]
    fn test_cap_boundary() {
        // max turbo = 10 - 1 = 9; allowed while used + 1 < 9
        assert!(Gates::evaluate(&account(50, 0), Some(10), 7).within_policy);
        assert!(!Gates::evaluate(&account(50, 0), Some(10), 8).within_policy);
        assert!(!Gates::evaluate(&account(50, 0), Some(10), 9).within_policy);
    }

    #[test]
    fn test_cap_not_above_included_volume() {
        assert!(!Gates::evaluate(&account(50, 0), Some(1), 0).within_policy);
    }

    #[test]
    fn test_uncapped_ignores_usage() {
        for used in [0, 9, 500, u64::MAX] {
            assert!(Gates::evaluate(&account(50, 0), None, used).within_policy);
        }
    }

    #[test]
    fn test_headroom() {
        let decision = Decision {
            date: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
            cap_gb: Some(5),
            used_gb: 2,
            account: account(50, 0),
            gates: Gates::evaluate(&account(50, 0), Some(5), 2),
        };
        assert_eq!(decision.headroom_gb(), Some(2));

        let uncapped = Decision {
            cap_gb: None,
            ..decision
        };
        assert_eq!(uncapped.headroom_gb(), None);
    }
}
