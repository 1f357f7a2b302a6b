//! SimulationEngine: the monthly tick loop tying agents, market state, and
//! the dynamics controllers together.

use std::collections::HashMap;

use chrono::{Duration, NaiveDate};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use crate::agent::{Agent, AgentAction};
use crate::cohort::{resolve_cohort_profile, Cohort};
use crate::config::{AgentGranularity, PricingModel, SimulationConfig};
use crate::controllers::pricing::{
    BondingCurveConfig, ConstantConfig, EoeConfig, IssuanceCurveConfig, PricingController,
};
use crate::controllers::staking::{StakingConfig, StakingPool};
use crate::controllers::treasury::{TreasuryConfig, TreasuryController};
use crate::controllers::volume::{VolumeConfig, VolumeController};
use crate::error::{EngineError, Result};
use crate::market_state::{MarketState, TokenEconomyConfig};
use crate::scaling::{estimate_holder_counts, ScalingPlanner};

const AGENT_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationResult {
    pub month_index: u32,
    pub date: NaiveDate,
    pub price: f64,
    pub circulating_supply: f64,
    pub total_unlocked: f64,
    pub total_sold: f64,
    pub total_staked: f64,
    pub total_held: f64,
    pub cohort_results: Option<HashMap<String, CohortMetrics>>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CohortMetrics {
    pub total_sell: f64,
    pub total_stake: f64,
    pub total_hold: f64,
    pub num_agents: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulationResults {
    pub global_metrics: Vec<IterationResult>,
    pub execution_time_seconds: f64,
    pub warnings: Vec<String>,
}

struct AggregatedActions {
    total_sell: f64,
    total_stake: f64,
    total_hold: f64,
}

fn aggregate_agent_actions(actions: &[AgentAction]) -> AggregatedActions {
    let mut total_sell = 0.0;
    let mut total_stake = 0.0;
    let mut total_hold = 0.0;
    for action in actions {
        total_sell += action.sell_tokens * action.scaling_weight;
        total_stake += action.stake_tokens * action.scaling_weight;
        total_hold += action.hold_tokens * action.scaling_weight;
    }
    AggregatedActions {
        total_sell,
        total_stake,
        total_hold,
    }
}

fn aggregate_by_cohort(
    actions: &[AgentAction],
    agents: &[Agent],
) -> HashMap<String, CohortMetrics> {
    let mut result: HashMap<String, CohortMetrics> = HashMap::new();
    for (action, agent) in actions.iter().zip(agents.iter()) {
        let entry = result.entry(agent.attrs.cohort.clone()).or_default();
        entry.total_sell += action.sell_tokens * action.scaling_weight;
        entry.total_stake += action.stake_tokens * action.scaling_weight;
        entry.total_hold += action.hold_tokens * action.scaling_weight;
        entry.num_agents += 1;
    }
    result
}

pub struct SimulationEngine {
    agents: Vec<Agent>,
    market: MarketState,
    pricing: PricingController,
    staking: Option<StakingPool>,
    treasury: Option<TreasuryController>,
    start_date: NaiveDate,
    store_cohort_details: bool,
    results: Vec<IterationResult>,
    warnings: Vec<String>,
    iteration: u32,
}

impl SimulationEngine {
    /// Construct a fully-wired engine from a [`SimulationConfig`], mirroring
    /// `ABMSimulationLoop.from_config` in the original: resolve cohort
    /// profiles, pick a scaling strategy, build agents per bucket, and
    /// construct whichever dynamics controllers are enabled.
    pub fn from_config(config: &SimulationConfig) -> Result<Self> {
        config.validate()?;

        let mut warnings = Vec::new();

        let market = MarketState::new(TokenEconomyConfig {
            total_supply: config.token.total_supply,
            initial_price: config.abm.initial_price,
            initial_circulating_supply: 0.0,
        });

        let forced_strategy = match config.abm.agent_granularity {
            AgentGranularity::FullIndividual => Some(crate::scaling::ScalingStrategy::FullIndividual),
            AgentGranularity::MetaAgents => Some(crate::scaling::ScalingStrategy::MetaAgents),
            AgentGranularity::Adaptive => None,
        };
        let planner = ScalingPlanner::new(forced_strategy);

        let holder_counts = estimate_holder_counts(&config.buckets, config.token.total_supply);
        let agent_counts = planner.calculate_agent_counts(&holder_counts);

        let mut all_agents = Vec::new();
        for bucket in &config.buckets {
            let profile = resolve_cohort_profile(&bucket.name, &config.abm.bucket_cohort_mapping);
            let mut cohort = Cohort::new(bucket.name.clone(), profile, config.abm.seed);

            let (num_agents, _default_weight) = agent_counts
                .get(&bucket.name)
                .copied()
                .unwrap_or((config.abm.agents_per_cohort, 1.0));

            let total_allocation = (bucket.allocation_pct / 100.0) * config.token.total_supply;
            let actual_holder_count = holder_counts.get(&bucket.name).copied().unwrap_or(num_agents);

            let agents = planner.create_scaled_agents(
                &mut cohort,
                num_agents,
                total_allocation,
                actual_holder_count,
                bucket,
            );
            all_agents.extend(agents);
        }

        info!(
            total_agents = all_agents.len(),
            cohorts = config.buckets.len(),
            "created agents across cohorts"
        );

        let mut pricing = build_pricing_controller(config.abm.pricing_model, &config.abm.pricing_config)?;

        if config.abm.enable_volume {
            let volume_config: VolumeConfig =
                serde_json::from_value(config.abm.volume_config.clone()).unwrap_or_default();
            let volume_controller = VolumeController::new(volume_config);

            if pricing.is_eoe() {
                pricing.set_volume_controller(volume_controller);
                info!("volume controller linked to EOE pricing model");
            } else {
                warn!(
                    pricing_model = ?config.abm.pricing_model,
                    "volume controller enabled but pricing model is not EOE; ignoring"
                );
                warnings.push(format!(
                    "volume controller enabled but pricing model is {:?}, not EOE. Volume controller will be ignored.",
                    config.abm.pricing_model
                ));
            }
        }

        let staking = if config.abm.enable_staking {
            let staking_config: StakingConfig =
                serde_json::from_value(config.abm.staking_config.clone()).unwrap_or_default();
            Some(StakingPool::new(staking_config, config.token.total_supply))
        } else {
            None
        };

        let treasury = if config.abm.enable_treasury {
            let treasury_config: TreasuryConfig =
                serde_json::from_value(config.abm.treasury_config.clone()).unwrap_or_default();
            Some(TreasuryController::new(
                treasury_config,
                config.token.total_supply,
            )?)
        } else {
            None
        };

        Ok(Self {
            agents: all_agents,
            market,
            pricing,
            staking,
            treasury,
            start_date: config.token.start_date,
            store_cohort_details: config.abm.store_cohort_details,
            results: Vec::new(),
            warnings,
            iteration: 0,
        })
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    /// Run one month: reset pressures, execute all agents (rayon-parallel in
    /// batches of [`AGENT_BATCH_SIZE`]), aggregate, update supply and price,
    /// then tick staking/treasury in that order.
    pub fn tick(&mut self, month_index: u32) -> IterationResult {
        self.market.reset_monthly_pressures();

        let market_snapshot = self.market.clone();
        let actions: Vec<AgentAction> = self
            .agents
            .par_chunks_mut(AGENT_BATCH_SIZE)
            .flat_map(|batch| {
                batch
                    .iter_mut()
                    .map(|agent| agent.execute(&market_snapshot))
                    .collect::<Vec<_>>()
            })
            .collect();

        let aggregated = aggregate_agent_actions(&actions);
        let cohort_results = if self.store_cohort_details {
            Some(aggregate_by_cohort(&actions, &self.agents))
        } else {
            None
        };

        self.market.total_sell_pressure = aggregated.total_sell;
        self.market.total_stake_pressure = aggregated.total_stake;
        self.market.total_unlock_this_month =
            aggregated.total_sell + aggregated.total_stake + aggregated.total_hold;

        let net_supply_change = aggregated.total_sell + aggregated.total_hold;
        self.market.update_circulating_supply(net_supply_change);

        let new_price = self.pricing.tick(&self.market);
        self.market.update_price(new_price);
        self.market.transactions_value_in_fiat = aggregated.total_sell * new_price;

        if let Some(staking) = &mut self.staking {
            staking.tick(aggregated.total_stake, &mut self.market);
        }

        if let Some(treasury) = &mut self.treasury {
            treasury.tick(aggregated.total_sell, new_price, &mut self.market);
        }

        self.market.record_supply_history();
        self.market.iteration += 1;
        self.iteration += 1;

        let current_date = self.start_date + Duration::days(30 * month_index as i64);

        IterationResult {
            month_index,
            date: current_date,
            price: new_price,
            circulating_supply: self.market.circulating_supply,
            total_unlocked: self.market.total_unlock_this_month,
            total_sold: aggregated.total_sell,
            total_staked: aggregated.total_stake,
            total_held: aggregated.total_hold,
            cohort_results,
        }
    }

    /// Run `months` ticks, invoking `progress_callback(month_idx + 1, months)`
    /// after each, and checking `cancel_flag` at the end of every month for
    /// cooperative cancellation.
    pub fn run_full(
        &mut self,
        months: u32,
        mut progress_callback: impl FnMut(u32, u32),
        cancel_flag: Option<Arc<AtomicBool>>,
    ) -> Result<SimulationResults> {
        info!(months, "starting ABM simulation");

        for month_idx in 0..months {
            if let Some(flag) = &cancel_flag {
                if flag.load(Ordering::Relaxed) {
                    return Err(EngineError::Cancelled);
                }
            }

            let result = self.tick(month_idx);
            self.results.push(result);
            progress_callback(month_idx + 1, months);

            if (month_idx + 1) % 12 == 0 || month_idx == months - 1 {
                let last = self.results.last().unwrap();
                info!(
                    month = month_idx + 1,
                    price = last.price,
                    circulating_supply = last.circulating_supply,
                    sold = last.total_sold,
                    "completed month"
                );
            }
        }

        Ok(SimulationResults {
            global_metrics: std::mem::take(&mut self.results),
            execution_time_seconds: 0.0,
            warnings: std::mem::take(&mut self.warnings),
        })
    }
}

fn build_pricing_controller(
    model: PricingModel,
    config: &serde_json::Value,
) -> Result<PricingController> {
    Ok(match model {
        PricingModel::Eoe => {
            let cfg: EoeConfig = serde_json::from_value(config.clone()).unwrap_or_default();
            PricingController::eoe(cfg)
        }
        PricingModel::BondingCurve => {
            let cfg: BondingCurveConfig = serde_json::from_value(config.clone()).unwrap_or_default();
            PricingController::bonding_curve(cfg)
        }
        PricingModel::IssuanceCurve => {
            let cfg: IssuanceCurveConfig = serde_json::from_value(config.clone()).unwrap_or_default();
            PricingController::issuance_curve(cfg)
        }
        PricingModel::Constant => {
            let cfg: ConstantConfig = serde_json::from_value(config.clone()).unwrap_or_default();
            PricingController::constant(cfg)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AbmConfig, BucketConfig, TokenConfig};

    fn config() -> SimulationConfig {
        SimulationConfig {
            token: TokenConfig {
                total_supply: 1_000_000_000.0,
                start_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
                horizon_months: 12,
            },
            buckets: vec![
                BucketConfig {
                    name: "Team".into(),
                    allocation_pct: 20.0,
                    tge_unlock_pct: 0.0,
                    cliff_months: 12,
                    vesting_months: 24,
                },
                BucketConfig {
                    name: "Community".into(),
                    allocation_pct: 80.0,
                    tge_unlock_pct: 20.0,
                    cliff_months: 0,
                    vesting_months: 12,
                },
            ],
            abm: AbmConfig {
                seed: Some(7),
                agent_granularity: AgentGranularity::FullIndividual,
                ..AbmConfig::default()
            },
            monte_carlo: None,
        }
    }

    #[test]
    fn from_config_builds_agents_for_every_bucket() {
        let engine = SimulationEngine::from_config(&config()).unwrap();
        assert!(engine.agent_count() > 0);
    }

    #[test]
    fn tick_never_produces_negative_price_or_supply() {
        let mut engine = SimulationEngine::from_config(&config()).unwrap();
        for month in 0..12 {
            let result = engine.tick(month);
            assert!(result.price > 0.0);
            assert!(result.circulating_supply >= 0.0);
        }
    }

    #[test]
    fn run_full_reports_progress_for_every_month() {
        let mut engine = SimulationEngine::from_config(&config()).unwrap();
        let mut calls = 0;
        let results = engine
            .run_full(6, |_current, _total| calls += 1, None)
            .unwrap();
        assert_eq!(calls, 6);
        assert_eq!(results.global_metrics.len(), 6);
    }

    #[test]
    fn cancellation_flag_stops_simulation_early() {
        let mut engine = SimulationEngine::from_config(&config()).unwrap();
        let flag = Arc::new(AtomicBool::new(true));
        let result = engine.run_full(6, |_, _| {}, Some(flag));
        assert!(matches!(result, Err(EngineError::Cancelled)));
    }

    #[test]
    fn enabling_volume_with_non_eoe_pricing_emits_a_warning() {
        let mut cfg = config();
        cfg.abm.pricing_model = PricingModel::Constant;
        cfg.abm.enable_volume = true;
        let engine = SimulationEngine::from_config(&cfg).unwrap();
        assert!(!engine.warnings.is_empty());
    }
}
