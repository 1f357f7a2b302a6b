//! Vesting schedule: TGE + cliff + linear-vesting unlock semantics for one
//! agent's token allocation.

use serde::{Deserialize, Serialize};

/// Static parameters of a vesting schedule, as configured on a bucket.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VestingConfig {
    pub total_allocation: f64,
    /// Percentage of `total_allocation`, 0-100.
    pub tge_unlock_pct: f64,
    pub cliff_months: u32,
    pub vesting_months: u32,
}

/// Per-agent vesting state machine.
#[derive(Debug, Clone)]
pub struct VestingSchedule {
    config: VestingConfig,
    tge_amount: f64,
    monthly_unlock_rate: f64,
    current_month: u32,
    cumulative_unlocked: f64,
}

impl VestingSchedule {
    pub fn new(config: VestingConfig) -> Self {
        let tge_amount = config.total_allocation * (config.tge_unlock_pct / 100.0);
        let post_tge_amount = config.total_allocation - tge_amount;
        let monthly_unlock_rate = if config.vesting_months > 0 {
            post_tge_amount / config.vesting_months as f64
        } else {
            0.0
        };

        Self {
            config,
            tge_amount,
            monthly_unlock_rate,
            current_month: 0,
            cumulative_unlocked: 0.0,
        }
    }

    /// Tokens unlocking in `month_index` (0-indexed), without mutating state.
    pub fn unlock_for_month(&self, month_index: u32) -> f64 {
        if month_index == 0 {
            let mut unlock = self.tge_amount;
            if self.config.cliff_months == 0 && self.config.vesting_months > 0 {
                unlock += self.monthly_unlock_rate;
            }
            return unlock;
        }

        if month_index < self.config.cliff_months {
            return 0.0;
        }

        // cliff == 0: month 0 already paid vesting-month 1, so month_index
        // itself indexes the remaining vesting months (1, 2, ...).
        // cliff > 0: the cliff month pays vesting-month 1.
        let vesting_month_index = if self.config.cliff_months == 0 {
            month_index
        } else {
            month_index - self.config.cliff_months
        };

        if vesting_month_index < self.config.vesting_months {
            self.monthly_unlock_rate
        } else {
            0.0
        }
    }

    /// True iff `current_month` is the cliff boundary (used for the agent's
    /// cliff-shock sell multiplier).
    pub fn is_cliff_month(&self) -> bool {
        self.config.cliff_months > 0 && self.current_month == self.config.cliff_months
    }

    /// Advance to the next month, returning the amount unlocked this month.
    pub fn advance_month(&mut self) -> f64 {
        let unlock = self.unlock_for_month(self.current_month);
        self.cumulative_unlocked += unlock;
        self.current_month += 1;
        unlock
    }

    pub fn remaining_locked(&self) -> f64 {
        self.config.total_allocation - self.cumulative_unlocked
    }

    pub fn cumulative_unlocked(&self) -> f64 {
        self.cumulative_unlocked
    }

    pub fn current_month(&self) -> u32 {
        self.current_month
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule(tge_pct: f64, cliff: u32, vesting: u32) -> VestingSchedule {
        VestingSchedule::new(VestingConfig {
            total_allocation: 1_000_000.0,
            tge_unlock_pct: tge_pct,
            cliff_months: cliff,
            vesting_months: vesting,
        })
    }

    #[test]
    fn no_tge_with_cliff_unlocks_nothing_until_cliff() {
        let mut v = schedule(0.0, 12, 24);
        for _ in 0..12 {
            let unlocked = v.advance_month();
            assert_eq!(unlocked, 0.0);
        }
        assert!(v.is_cliff_month());
        let at_cliff = v.advance_month();
        assert!(at_cliff > 0.0);
    }

    #[test]
    fn full_schedule_unlocks_entire_allocation() {
        let mut v = schedule(0.0, 12, 24);
        for _ in 0..37 {
            v.advance_month();
        }
        assert!((v.cumulative_unlocked() - 1_000_000.0).abs() < 1e-6);
    }

    #[test]
    fn full_tge_zero_cliff_zero_vesting_unlocks_everything_at_month_zero() {
        let mut v = schedule(100.0, 0, 0);
        let unlocked = v.advance_month();
        assert!((unlocked - 1_000_000.0).abs() < 1e-9);
        assert_eq!(v.remaining_locked(), 0.0);
    }

    #[test]
    fn zero_cliff_pays_first_vesting_installment_at_month_zero() {
        let mut v = schedule(10.0, 0, 12);
        let month0 = v.advance_month();
        // TGE (10%) + one monthly installment of the remaining 90%.
        let expected_installment = 900_000.0 / 12.0;
        assert!((month0 - (100_000.0 + expected_installment)).abs() < 1e-6);

        // Eleven further installments complete the schedule exactly.
        for _ in 0..11 {
            v.advance_month();
        }
        assert!((v.cumulative_unlocked() - 1_000_000.0).abs() < 1e-6);
    }

    #[test]
    fn cumulative_unlock_never_exceeds_allocation() {
        let mut v = schedule(5.0, 3, 18);
        for i in 0..100 {
            v.advance_month();
            assert!(v.cumulative_unlocked() <= 1_000_000.0 + 1e-6, "month {i}");
        }
    }
}
