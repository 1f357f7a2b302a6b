//! Pricing controllers: equation-of-exchange, bonding curve, issuance curve,
//! and constant price models, all driven by the month's `MarketState`.

use serde::{Deserialize, Serialize};

use crate::controllers::volume::VolumeController;
use crate::market_state::{MarketState, MIN_PRICE};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EoeConfig {
    pub holding_time: f64,
    pub smoothing_factor: f64,
    pub min_price: f64,
}

impl Default for EoeConfig {
    fn default() -> Self {
        Self {
            holding_time: 6.0,
            smoothing_factor: 0.7,
            min_price: MIN_PRICE,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BondingCurveConfig {
    pub initial_price: f64,
    pub initial_supply: f64,
    pub curve_exponent: f64,
    pub min_price: f64,
}

impl Default for BondingCurveConfig {
    fn default() -> Self {
        Self {
            initial_price: 1.0,
            initial_supply: 1_000_000.0,
            curve_exponent: 2.0,
            min_price: MIN_PRICE,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IssuanceCurveConfig {
    pub initial_price: f64,
    pub max_supply: f64,
    pub alpha: f64,
    pub min_price: f64,
}

impl Default for IssuanceCurveConfig {
    fn default() -> Self {
        Self {
            initial_price: 1.0,
            max_supply: 1_000_000_000.0,
            alpha: 0.5,
            min_price: MIN_PRICE,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConstantConfig {
    pub price: f64,
}

impl Default for ConstantConfig {
    fn default() -> Self {
        Self { price: 1.0 }
    }
}

/// The active pricing model, as a tagged-variant enum rather than a trait
/// object: the engine always knows which one it holds, and EOE is the only
/// variant that can hold an optional linked volume controller.
pub enum PricingController {
    Eoe {
        config: EoeConfig,
        velocity: f64,
        volume_controller: Option<VolumeController>,
    },
    BondingCurve {
        config: BondingCurveConfig,
        k: f64,
    },
    IssuanceCurve {
        config: IssuanceCurveConfig,
    },
    Constant {
        config: ConstantConfig,
    },
}

impl PricingController {
    pub fn eoe(config: EoeConfig) -> Self {
        let velocity = 12.0 / config.holding_time;
        Self::Eoe {
            config,
            velocity,
            volume_controller: None,
        }
    }

    pub fn bonding_curve(config: BondingCurveConfig) -> Self {
        let k = if config.initial_supply > 0.0 {
            config.initial_price / config.initial_supply.powf(config.curve_exponent)
        } else {
            config.initial_price
        };
        Self::BondingCurve { config, k }
    }

    pub fn issuance_curve(config: IssuanceCurveConfig) -> Self {
        Self::IssuanceCurve { config }
    }

    pub fn constant(config: ConstantConfig) -> Self {
        Self::Constant { config }
    }

    /// Link an external volume controller; ignored for non-EOE variants (the
    /// caller is expected to have already logged a warning in that case).
    pub fn set_volume_controller(&mut self, volume: VolumeController) {
        if let Self::Eoe {
            volume_controller, ..
        } = self
        {
            *volume_controller = Some(volume);
        }
    }

    pub fn is_eoe(&self) -> bool {
        matches!(self, Self::Eoe { .. })
    }

    /// Compute the new price for this tick from the current market state.
    /// Does not mutate `market` itself; the caller applies the result via
    /// `MarketState::update_price`.
    pub fn tick(&self, market: &MarketState) -> f64 {
        match self {
            Self::Eoe {
                config,
                velocity,
                volume_controller,
            } => {
                let demand_fiat = match volume_controller {
                    Some(vc) => vc.tick(market) * market.price,
                    None => market.total_sell_pressure * market.price,
                };

                let raw_price = if market.circulating_supply > 0.0 && *velocity > 0.0 {
                    demand_fiat / (market.circulating_supply * velocity)
                } else {
                    market.price
                };

                let smoothed = config.smoothing_factor * market.price
                    + (1.0 - config.smoothing_factor) * raw_price;

                smoothed.max(config.min_price)
            }
            Self::BondingCurve { config, k } => {
                let price = if market.circulating_supply > 0.0 {
                    k * market.circulating_supply.powf(config.curve_exponent)
                } else {
                    config.min_price
                };
                price.max(config.min_price)
            }
            Self::IssuanceCurve { config } => {
                let price = if config.max_supply > 0.0 {
                    config.initial_price
                        * (1.0 + market.circulating_supply / config.max_supply).powf(config.alpha)
                } else {
                    config.initial_price
                };
                price.max(config.min_price)
            }
            Self::Constant { config } => config.price,
        }
    }
}
