//! TreasuryController: collects transaction fees, deploys liquidity, and
//! executes token buyback-and-burn.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::market_state::MarketState;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TreasuryConfig {
    pub initial_balance_pct: f64,
    pub transaction_fee_pct: f64,
    pub hold_pct: f64,
    pub liquidity_pct: f64,
    pub buyback_pct: f64,
    pub burn_bought_tokens: bool,
}

impl Default for TreasuryConfig {
    fn default() -> Self {
        Self {
            initial_balance_pct: 0.15,
            transaction_fee_pct: 0.02,
            hold_pct: 0.50,
            liquidity_pct: 0.30,
            buyback_pct: 0.20,
            burn_bought_tokens: true,
        }
    }
}

impl TreasuryConfig {
    /// Allocation percentages must sum to ~1.0 (matches the original's 1%
    /// tolerance).
    pub fn validate(&self) -> Result<()> {
        let total_pct = self.hold_pct + self.liquidity_pct + self.buyback_pct;
        if (total_pct - 1.0).abs() > 0.01 {
            return Err(EngineError::Configuration(format!(
                "treasury allocation percentages must sum to 1.0, got {total_pct:.2}"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TreasuryTickResult {
    pub fees_collected: f64,
    pub fiat_balance: f64,
    pub token_balance: f64,
    pub liquidity_deployed_fiat: f64,
    pub liquidity_deployed_tokens: f64,
    pub tokens_bought: f64,
    pub tokens_burned: f64,
    pub total_fees_collected: f64,
    pub total_tokens_burned: f64,
}

pub struct TreasuryController {
    config: TreasuryConfig,
    token_balance: f64,
    fiat_balance: f64,
    liquidity_deployed_tokens: f64,
    liquidity_deployed_fiat: f64,
    total_fees_collected: f64,
    total_tokens_bought: f64,
    total_tokens_burned: f64,
}

impl TreasuryController {
    pub fn new(config: TreasuryConfig, total_supply: f64) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            token_balance: total_supply * config.initial_balance_pct,
            fiat_balance: 0.0,
            liquidity_deployed_tokens: 0.0,
            liquidity_deployed_fiat: 0.0,
            total_fees_collected: 0.0,
            total_tokens_bought: 0.0,
            total_tokens_burned: 0.0,
            config,
        })
    }

    pub fn token_balance(&self) -> f64 {
        self.token_balance
    }

    pub fn fiat_balance(&self) -> f64 {
        self.fiat_balance
    }

    pub fn total_tokens_burned(&self) -> f64 {
        self.total_tokens_burned
    }

    pub fn tick(
        &mut self,
        sell_volume_tokens: f64,
        current_price: f64,
        market: &mut MarketState,
    ) -> TreasuryTickResult {
        let fees_fiat = sell_volume_tokens * current_price * self.config.transaction_fee_pct;
        self.fiat_balance += fees_fiat;
        self.total_fees_collected += fees_fiat;

        let liquidity_amount = fees_fiat * self.config.liquidity_pct;
        let buyback_amount = fees_fiat * self.config.buyback_pct;

        if liquidity_amount > 0.0 {
            let liquidity_fiat = liquidity_amount / 2.0;
            let liquidity_tokens = if current_price > 0.0 {
                liquidity_fiat / current_price
            } else {
                0.0
            };

            if liquidity_tokens <= self.token_balance {
                self.liquidity_deployed_fiat += liquidity_fiat;
                self.liquidity_deployed_tokens += liquidity_tokens;
                self.token_balance -= liquidity_tokens;
                self.fiat_balance -= liquidity_fiat;
            } else {
                debug!("insufficient treasury tokens for liquidity deployment, holding as fiat");
            }
        }

        let mut tokens_bought = 0.0;
        let mut tokens_burned = 0.0;

        if buyback_amount > 0.0 && current_price > 0.0 {
            tokens_bought = buyback_amount / current_price;
            self.fiat_balance -= buyback_amount;
            self.total_tokens_bought += tokens_bought;

            if self.config.burn_bought_tokens {
                tokens_burned = tokens_bought;
                self.total_tokens_burned += tokens_burned;
                market.update_circulating_supply(-tokens_burned);
            } else {
                self.token_balance += tokens_bought;
            }
        }

        TreasuryTickResult {
            fees_collected: fees_fiat,
            fiat_balance: self.fiat_balance,
            token_balance: self.token_balance,
            liquidity_deployed_fiat: self.liquidity_deployed_fiat,
            liquidity_deployed_tokens: self.liquidity_deployed_tokens,
            tokens_bought,
            tokens_burned,
            total_fees_collected: self.total_fees_collected,
            total_tokens_burned: self.total_tokens_burned,
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
    fn allocation_percentages_must_sum_to_one() {
        let bad = TreasuryConfig {
            hold_pct: 0.5,
            liquidity_pct: 0.5,
            buyback_pct: 0.5,
            ..TreasuryConfig::default()
        };
        assert!(TreasuryController::new(bad, 1_000_000.0).is_err());
    }

    #[test]
    fn buyback_and_burn_reduces_circulating_supply() {
        let mut treasury = TreasuryController::new(TreasuryConfig::default(), 1_000_000.0).unwrap();
        let mut m = market();
        let supply_before = m.circulating_supply;
        let result = treasury.tick(100_000.0, 1.0, &mut m);
        assert!(result.tokens_burned > 0.0);
        assert!(m.circulating_supply < supply_before);
    }

    #[test]
    fn non_burning_buyback_returns_tokens_to_treasury_balance() {
        let config = TreasuryConfig {
            burn_bought_tokens: false,
            ..TreasuryConfig::default()
        };
        let mut treasury = TreasuryController::new(config, 1_000_000.0).unwrap();
        let mut m = market();
        let balance_before = treasury.token_balance();
        treasury.tick(100_000.0, 1.0, &mut m);
        assert!(treasury.token_balance() > balance_before);
        assert_eq!(treasury.total_tokens_burned(), 0.0);
    }

    #[test]
    fn zero_sell_volume_collects_no_fees() {
        let mut treasury = TreasuryController::new(TreasuryConfig::default(), 1_000_000.0).unwrap();
        let mut m = market();
        let result = treasury.tick(0.0, 1.0, &mut m);
        assert_eq!(result.fees_collected, 0.0);
    }
}
