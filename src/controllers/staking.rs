//! StakingPool: variable-APY staking with capacity limits and lockups.
//!
//! Rewards are computed from the APY in effect at *lock time*, not at
//! unlock time — an intentional quirk carried over from the original
//! implementation (see DESIGN.md Open Question #3).

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::market_state::MarketState;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StakingConfig {
    pub base_apy: f64,
    pub max_capacity_pct: f64,
    pub lockup_months: u32,
    pub reward_source: RewardSource,
    pub apy_multiplier_at_empty: f64,
    pub apy_multiplier_at_full: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardSource {
    Emission,
    Treasury,
}

impl Default for StakingConfig {
    fn default() -> Self {
        Self {
            base_apy: 0.12,
            max_capacity_pct: 0.5,
            lockup_months: 6,
            reward_source: RewardSource::Emission,
            apy_multiplier_at_empty: 1.5,
            apy_multiplier_at_full: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct StakeLock {
    amount: f64,
    locked_until_month: u32,
    apy: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StakingTickResult {
    pub new_staked: f64,
    pub rejected_stake: f64,
    pub unlocked_principal: f64,
    pub rewards_paid: f64,
    pub total_staked: f64,
    pub current_apy: f64,
    pub utilization_pct: f64,
}

pub struct StakingPool {
    config: StakingConfig,
    max_capacity: f64,
    total_staked: f64,
    locked_stakes: Vec<StakeLock>,
    total_rewards_distributed: f64,
    iteration: u32,
}

impl StakingPool {
    pub fn new(config: StakingConfig, total_supply: f64) -> Self {
        let max_capacity = total_supply * config.max_capacity_pct;
        Self {
            config,
            max_capacity,
            total_staked: 0.0,
            locked_stakes: Vec::new(),
            total_rewards_distributed: 0.0,
            iteration: 0,
        }
    }

    pub fn remaining_capacity(&self) -> f64 {
        (self.max_capacity - self.total_staked).max(0.0)
    }

    pub fn utilization_pct(&self) -> f64 {
        if self.max_capacity == 0.0 {
            0.0
        } else {
            (self.total_staked / self.max_capacity) * 100.0
        }
    }

    pub fn current_apy(&self) -> f64 {
        let utilization = if self.max_capacity > 0.0 {
            self.total_staked / self.max_capacity
        } else {
            0.0
        };
        let multiplier = self.config.apy_multiplier_at_empty * (1.0 - utilization)
            + self.config.apy_multiplier_at_full * utilization;
        self.config.base_apy * multiplier
    }

    pub fn total_staked(&self) -> f64 {
        self.total_staked
    }

    pub fn total_rewards_distributed(&self) -> f64 {
        self.total_rewards_distributed
    }

    /// Run one tick: accept new stake up to capacity, unlock matured stakes
    /// (paying rewards at their lock-time APY), and return tokens + rewards
    /// to circulation.
    pub fn tick(&mut self, new_stake_amount: f64, market: &mut MarketState) -> StakingTickResult {
        let actual_staked = new_stake_amount.min(self.remaining_capacity());

        if actual_staked > 0.0 {
            let lock = StakeLock {
                amount: actual_staked,
                locked_until_month: self.iteration + self.config.lockup_months,
                apy: self.current_apy(),
            };
            debug!(
                amount = lock.amount,
                locked_until = lock.locked_until_month,
                apy = lock.apy,
                "new stake locked"
            );
            self.locked_stakes.push(lock);
            self.total_staked += actual_staked;
        }
        let rejected_stake = new_stake_amount - actual_staked;

        let (matured, still_locked): (Vec<_>, Vec<_>) = self
            .locked_stakes
            .drain(..)
            .partition(|s| s.locked_until_month <= self.iteration);
        self.locked_stakes = still_locked;

        let mut unlocked_principal = 0.0;
        let mut rewards_paid = 0.0;
        for stake in &matured {
            let monthly_rate = stake.apy / 12.0;
            let rewards = stake.amount * monthly_rate * self.config.lockup_months as f64;
            unlocked_principal += stake.amount;
            rewards_paid += rewards;
            self.total_staked -= stake.amount;
        }

        if unlocked_principal > 0.0 || rewards_paid > 0.0 {
            market.update_circulating_supply(unlocked_principal + rewards_paid);
            self.total_rewards_distributed += rewards_paid;
        }

        self.iteration += 1;

        StakingTickResult {
            new_staked: actual_staked,
            rejected_stake,
            unlocked_principal,
            rewards_paid,
            total_staked: self.total_staked,
            current_apy: self.current_apy(),
            utilization_pct: self.utilization_pct(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_state::TokenEconomyConfig;

    fn market() -> MarketState {
        MarketState::new(TokenEconomyConfig {
            total_supply: 1_000_000.0,
            initial_price: 1.0,
            initial_circulating_supply: 500_000.0,
        })
    }

    #[test]
    fn apy_decreases_as_pool_fills() {
        let mut pool = StakingPool::new(StakingConfig::default(), 1_000_000.0);
        let empty_apy = pool.current_apy();
        let mut m = market();
        pool.tick(pool.max_capacity, &mut m);
        let full_apy = pool.current_apy();
        assert!(full_apy < empty_apy);
    }

    #[test]
    fn stake_beyond_capacity_is_rejected() {
        let mut pool = StakingPool::new(StakingConfig::default(), 1_000_000.0);
        let mut m = market();
        let result = pool.tick(pool.max_capacity + 100_000.0, &mut m);
        assert!(result.rejected_stake > 0.0);
        assert!((pool.total_staked() - pool.max_capacity).abs() < 1e-6);
    }

    #[test]
    fn rewards_use_lock_time_apy_not_unlock_time_apy() {
        let mut pool = StakingPool::new(
            StakingConfig {
                lockup_months: 1,
                ..StakingConfig::default()
            },
            1_000_000.0,
        );
        let mut m = market();

        let apy_at_lock = pool.current_apy();
        pool.tick(10_000.0, &mut m);

        pool.tick(pool.max_capacity, &mut m);

        let result = pool.tick(0.0, &mut m);
        let expected_reward = 10_000.0 * (apy_at_lock / 12.0) * 1.0;
        assert!((result.rewards_paid - expected_reward).abs() < 1.0);
    }

    #[test]
    fn utilization_and_capacity_are_consistent() {
        let mut pool = StakingPool::new(StakingConfig::default(), 1_000_000.0);
        let mut m = market();
        pool.tick(100_000.0, &mut m);
        assert!(pool.utilization_pct() > 0.0);
        assert!(pool.remaining_capacity() < pool.max_capacity);
    }
}
