//! VolumeController: feeds transaction volume estimates into the EOE pricing
//! model, either scaling with circulating supply or holding constant.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::market_state::MarketState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeModel {
    Proportional,
    Constant,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VolumeConfig {
    pub volume_model: VolumeModel,
    pub base_daily_volume: f64,
    pub volume_multiplier: f64,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            volume_model: VolumeModel::Proportional,
            base_daily_volume: 10_000_000.0,
            volume_multiplier: 1.0,
        }
    }
}

pub struct VolumeController {
    config: VolumeConfig,
}

impl VolumeController {
    pub fn new(config: VolumeConfig) -> Self {
        Self { config }
    }

    /// Estimated transaction volume in tokens for the current tick.
    pub fn tick(&self, market: &MarketState) -> f64 {
        let volume = match self.config.volume_model {
            VolumeModel::Proportional => {
                let supply_ratio = if market.total_supply > 0.0 {
                    market.circulating_supply / market.total_supply
                } else {
                    0.0
                };
                let volume = self.config.base_daily_volume * supply_ratio * self.config.volume_multiplier;
                debug!(supply_ratio, volume, "proportional volume");
                volume
            }
            VolumeModel::Constant => {
                let volume = self.config.base_daily_volume * self.config.volume_multiplier;
                debug!(volume, "constant volume");
                volume
            }
        };
        volume.max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_state::TokenEconomyConfig;

    fn market(circulating: f64) -> MarketState {
        MarketState::new(TokenEconomyConfig {
            total_supply: 1_000_000.0,
            initial_price: 1.0,
            initial_circulating_supply: circulating,
        })
    }

    #[test]
    fn proportional_volume_scales_with_circulating_supply() {
        let controller = VolumeController::new(VolumeConfig::default());
        let low = controller.tick(&market(100_000.0));
        let high = controller.tick(&market(900_000.0));
        assert!(high > low);
    }

    #[test]
    fn constant_volume_ignores_circulating_supply() {
        let config = VolumeConfig {
            volume_model: VolumeModel::Constant,
            ..VolumeConfig::default()
        };
        let controller = VolumeController::new(config);
        let a = controller.tick(&market(1_000.0));
        let b = controller.tick(&market(999_000.0));
        assert_eq!(a, b);
    }

    #[test]
    fn volume_is_never_negative() {
        let config = VolumeConfig {
            volume_multiplier: -1.0,
            ..VolumeConfig::default()
        };
        let controller = VolumeController::new(config);
        assert_eq!(controller.tick(&market(500_000.0)), 0.0);
    }
}
