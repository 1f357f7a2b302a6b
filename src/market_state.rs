//! MarketState: process-local shared state for one simulation run.

use serde::{Deserialize, Serialize};

pub const MIN_PRICE: f64 = 0.01;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TokenEconomyConfig {
    pub total_supply: f64,
    pub initial_price: f64,
    pub initial_circulating_supply: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketState {
    pub total_supply: f64,
    pub circulating_supply: f64,
    pub price: f64,
    pub iteration: u32,

    pub total_sell_pressure: f64,
    pub total_stake_pressure: f64,
    pub total_unlock_this_month: f64,
    pub transactions_value_in_fiat: f64,

    pub price_history: Vec<f64>,
    pub supply_history: Vec<f64>,
}

impl MarketState {
    pub fn new(config: TokenEconomyConfig) -> Self {
        Self {
            total_supply: config.total_supply,
            circulating_supply: config.initial_circulating_supply,
            price: config.initial_price,
            iteration: 0,
            total_sell_pressure: 0.0,
            total_stake_pressure: 0.0,
            total_unlock_this_month: 0.0,
            transactions_value_in_fiat: 0.0,
            price_history: vec![config.initial_price],
            supply_history: vec![config.initial_circulating_supply],
        }
    }

    /// Reset the per-month aggregates. Called before agents execute each tick.
    pub fn reset_monthly_pressures(&mut self) {
        self.total_sell_pressure = 0.0;
        self.total_stake_pressure = 0.0;
        self.total_unlock_this_month = 0.0;
        self.transactions_value_in_fiat = 0.0;
    }

    pub fn update_price(&mut self, new_price: f64) {
        self.price = new_price.max(MIN_PRICE);
        self.price_history.push(self.price);
    }

    /// Apply a delta to circulating supply (negative for burns), floored at 0.
    /// May be called several times within one tick (engine supply update,
    /// staking unlocks, treasury burns); `record_supply_history` captures the
    /// post-tick value exactly once so `supply_history` stays parallel to
    /// `price_history`.
    pub fn update_circulating_supply(&mut self, delta: f64) {
        self.circulating_supply = (self.circulating_supply + delta).max(0.0);
    }

    /// Append the current circulating supply to the history. Called once per
    /// tick, after all of the tick's supply deltas have been applied.
    pub fn record_supply_history(&mut self) {
        self.supply_history.push(self.circulating_supply);
    }

    pub fn price_change_pct(&self, lookback_months: usize) -> f64 {
        if self.price_history.len() < lookback_months + 1 {
            return 0.0;
        }
        let old_price = self.price_history[self.price_history.len() - lookback_months - 1];
        if old_price == 0.0 {
            return 0.0;
        }
        (self.price - old_price) / old_price
    }

    pub fn current_market_cap(&self) -> f64 {
        self.circulating_supply * self.price
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> MarketState {
        MarketState::new(TokenEconomyConfig {
            total_supply: 1_000_000.0,
            initial_price: 1.0,
            initial_circulating_supply: 0.0,
        })
    }

    #[test]
    fn price_never_drops_below_floor() {
        let mut m = state();
        m.update_price(0.0001);
        assert_eq!(m.price, MIN_PRICE);
    }

    #[test]
    fn circulating_supply_never_negative() {
        let mut m = state();
        m.update_circulating_supply(-500.0);
        assert_eq!(m.circulating_supply, 0.0);
    }

    #[test]
    fn history_length_tracks_iteration() {
        let mut m = state();
        for _ in 0..5 {
            m.iteration += 1;
            m.update_price(m.price * 1.1);
        }
        assert_eq!(m.price_history.len() as u32, m.iteration + 1);
    }

    #[test]
    fn supply_history_gets_exactly_one_entry_per_recorded_tick_even_with_multiple_deltas() {
        let mut m = state();
        m.update_circulating_supply(1_000.0);
        m.update_circulating_supply(-200.0);
        m.update_circulating_supply(50.0);
        m.record_supply_history();
        assert_eq!(m.supply_history.len(), 2);
        assert_eq!(*m.supply_history.last().unwrap(), m.circulating_supply);
    }

    #[test]
    fn market_cap_is_supply_times_price() {
        let mut m = state();
        m.update_circulating_supply(100_000.0);
        m.update_price(2.0);
        assert_eq!(m.current_market_cap(), 200_000.0);
    }
}
