//! End-to-end scenarios tying vesting, agents, pricing, staking, treasury,
//! the job queue, and Monte Carlo together.

use chrono::NaiveDate;
use std::collections::HashMap;

use crate::config::{
    AbmConfig, AgentGranularity, BucketConfig, MonteCarloConfig, PricingModel, SimulationConfig,
    TokenConfig,
};
use crate::controllers::pricing::EoeConfig;
use crate::controllers::staking::StakingConfig;
use crate::controllers::treasury::TreasuryConfig;
use crate::engine::SimulationEngine;
use crate::job_queue::{JobQueue, JobStatus};
use crate::monte_carlo::MonteCarloOrchestrator;

fn base_config() -> SimulationConfig {
    SimulationConfig {
        token: TokenConfig {
            total_supply: 1_000_000.0,
            start_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            horizon_months: 36,
        },
        buckets: vec![BucketConfig {
            name: "Team".into(),
            allocation_pct: 100.0,
            tge_unlock_pct: 0.0,
            cliff_months: 12,
            vesting_months: 24,
        }],
        abm: AbmConfig {
            agent_granularity: AgentGranularity::FullIndividual,
            seed: Some(42),
            agents_per_cohort: 10,
            pricing_model: PricingModel::Constant,
            pricing_config: serde_json::json!({ "price": 1.0 }),
            ..AbmConfig::default()
        },
        monte_carlo: None,
    }
}

#[test]
fn scenario_1_team_vesting_cliff_and_linear_unlock() {
    let mut engine = SimulationEngine::from_config(&base_config()).unwrap();

    let mut results = Vec::new();
    for month in 0..36 {
        results.push(engine.tick(month));
    }

    assert_eq!(results[11].total_unlocked, 0.0, "month 11 (pre-cliff) should unlock nothing");
    assert!(results[12].total_unlocked > 0.0, "month 12 (cliff) should pay the first installment");

    let total_unlocked_through_35: f64 = results.iter().map(|r| r.total_unlocked).sum();
    assert!((total_unlocked_through_35 - 1_000_000.0).abs() < 1.0);
}

#[test]
fn scenario_2_full_tge_unlocks_everything_at_month_zero() {
    let mut config = base_config();
    config.token.horizon_months = 6;
    config.buckets = vec![BucketConfig {
        name: "Community".into(),
        allocation_pct: 100.0,
        tge_unlock_pct: 100.0,
        cliff_months: 0,
        vesting_months: 0,
    }];

    let mut engine = SimulationEngine::from_config(&config).unwrap();
    let month0 = engine.tick(0);
    assert!((month0.total_unlocked - 1_000_000.0).abs() < 1.0);

    let mut total_sold = month0.total_sold;
    for month in 1..6 {
        total_sold += engine.tick(month).total_sold;
    }
    assert!(total_sold > 0.0);
}

#[test]
fn scenario_3_three_cohort_eoe_pricing_produces_a_live_market() {
    let mut bucket_cohort_mapping = HashMap::new();
    bucket_cohort_mapping.insert("Team".to_string(), "Team".to_string());
    bucket_cohort_mapping.insert("VC".to_string(), "VC".to_string());
    bucket_cohort_mapping.insert("Community".to_string(), "Community".to_string());

    let config = SimulationConfig {
        token: TokenConfig {
            total_supply: 10_000_000.0,
            start_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            horizon_months: 12,
        },
        buckets: vec![
            BucketConfig {
                name: "Team".into(),
                allocation_pct: 30.0,
                tge_unlock_pct: 0.0,
                cliff_months: 6,
                vesting_months: 18,
            },
            BucketConfig {
                name: "VC".into(),
                allocation_pct: 15.0,
                tge_unlock_pct: 10.0,
                cliff_months: 3,
                vesting_months: 12,
            },
            BucketConfig {
                name: "Community".into(),
                allocation_pct: 40.0,
                tge_unlock_pct: 20.0,
                cliff_months: 0,
                vesting_months: 12,
            },
        ],
        abm: AbmConfig {
            agent_granularity: AgentGranularity::FullIndividual,
            seed: Some(42),
            agents_per_cohort: 20,
            bucket_cohort_mapping,
            pricing_model: PricingModel::Eoe,
            pricing_config: serde_json::to_value(EoeConfig {
                holding_time: 6.0,
                ..EoeConfig::default()
            })
            .unwrap(),
            ..AbmConfig::default()
        },
        monte_carlo: None,
    };

    let mut engine = SimulationEngine::from_config(&config).unwrap();
    let mut prices = Vec::new();
    let mut total_sold = 0.0;
    for month in 0..12 {
        let result = engine.tick(month);
        prices.push(result.price);
        total_sold += result.total_sold;
    }

    assert!(prices.iter().all(|&p| p > 0.0));
    assert!(prices.iter().any(|&p| (p - prices[0]).abs() > 1e-9), "price should vary across months");
    assert!(total_sold > 0.0);
}

#[test]
fn scenario_4_staking_pool_apy_and_utilization_move_with_demand() {
    let config = StakingConfig {
        base_apy: 0.12,
        max_capacity_pct: 0.5,
        lockup_months: 6,
        ..StakingConfig::default()
    };
    let mut pool = crate::controllers::staking::StakingPool::new(config, 1_000_000.0);
    let mut market = crate::market_state::MarketState::new(crate::market_state::TokenEconomyConfig {
        total_supply: 1_000_000.0,
        initial_price: 1.0,
        initial_circulating_supply: 500_000.0,
    });

    let monthly_stake = 1_000_000.0 * 0.01;
    let mut last_utilization = 0.0;
    let mut last_apy = pool.current_apy();

    for _ in 0..6 {
        let result = pool.tick(monthly_stake, &mut market);
        assert!(result.utilization_pct >= last_utilization);
        assert!(result.current_apy <= last_apy + 1e-9);
        last_utilization = result.utilization_pct;
        last_apy = result.current_apy;
    }

    let supply_before = market.circulating_supply;
    let result = pool.tick(0.0, &mut market);
    assert!(result.unlocked_principal > 0.0);
    assert!(market.circulating_supply > supply_before);
}

#[test]
fn scenario_5_treasury_full_buyback_burns_the_expected_amount() {
    let config = TreasuryConfig {
        initial_balance_pct: 0.0,
        transaction_fee_pct: 0.05,
        hold_pct: 0.0,
        liquidity_pct: 0.0,
        buyback_pct: 1.0,
        burn_bought_tokens: true,
    };
    let mut treasury = crate::controllers::treasury::TreasuryController::new(config, 1_000_000.0).unwrap();
    let mut market = crate::market_state::MarketState::new(crate::market_state::TokenEconomyConfig {
        total_supply: 10_000_000.0,
        initial_price: 1.0,
        initial_circulating_supply: 5_000_000.0,
    });

    let supply_before = market.circulating_supply;
    let result = treasury.tick(10_000_000.0, 1.0, &mut market);

    assert!((result.fees_collected - 500_000.0).abs() < 1e-6);
    assert!((result.tokens_bought - 500_000.0).abs() < 1e-6);
    assert!((result.tokens_burned - 500_000.0).abs() < 1e-6);
    assert!((supply_before - market.circulating_supply - 500_000.0).abs() < 1e-6);
}

#[tokio::test]
async fn scenario_6_job_queue_capacity_and_caching() {
    let queue = JobQueue::new(1);

    let mut config_a = base_config();
    config_a.token.horizon_months = 2;
    let mut config_b = config_a.clone();
    config_b.token.total_supply = 2_000_000.0;

    let job_a = queue.submit(config_a.clone()).await.unwrap();
    assert!(job_a.starts_with("abm_"));

    let running = matches!(
        queue.get_status(&job_a).await.unwrap().status,
        JobStatus::Running | JobStatus::Completed
    );
    assert!(running);

    for _ in 0..200 {
        if queue.get_status(&job_a).await.unwrap().status == JobStatus::Completed {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(queue.get_status(&job_a).await.unwrap().status, JobStatus::Completed);

    let cached = queue.submit(config_a).await.unwrap();
    assert!(cached.starts_with("cached_"));
    assert_eq!(queue.get_status(&cached).await.unwrap().status, JobStatus::Completed);
}

#[test]
fn scenario_7_monte_carlo_ten_trials_produce_ordered_percentiles() {
    let mut config = base_config();
    config.buckets = vec![BucketConfig {
        name: "Community".into(),
        allocation_pct: 50.0,
        tge_unlock_pct: 20.0,
        cliff_months: 0,
        vesting_months: 12,
    }];
    config.token.horizon_months = 6;
    config.abm.pricing_model = PricingModel::Eoe;
    config.abm.pricing_config = serde_json::to_value(EoeConfig::default()).unwrap();
    config.monte_carlo = Some(MonteCarloConfig {
        num_trials: 10,
        confidence_levels: vec![10.0, 50.0, 90.0],
        seed: Some(123),
        variance_level: None,
    });

    let orchestrator = MonteCarloOrchestrator::new(10, vec![10.0, 50.0, 90.0], 123);
    let results = orchestrator.run(&config, 6, |_, _| {}).unwrap();

    assert_eq!(results.trials.len(), 10);
    assert_eq!(results.percentiles.len(), 3);
    for p in &results.percentiles {
        assert_eq!(p.global_metrics.len(), 6);
    }
    assert_eq!(results.mean_metrics.len(), 6);

    assert!(results.summary.p10_final_price <= results.summary.p50_final_price);
    assert!(results.summary.p50_final_price <= results.summary.p90_final_price);
    assert!(results.summary.min_final_price <= results.summary.p10_final_price);
    assert!(results.summary.p90_final_price <= results.summary.max_final_price);
}

#[test]
fn determinism_same_seed_produces_identical_trajectories() {
    let config = base_config();

    let mut engine_a = SimulationEngine::from_config(&config).unwrap();
    let mut engine_b = SimulationEngine::from_config(&config).unwrap();

    for month in 0..12 {
        let a = engine_a.tick(month);
        let b = engine_b.tick(month);
        assert_eq!(a.price, b.price);
        assert_eq!(a.circulating_supply, b.circulating_supply);
        assert_eq!(a.total_sold, b.total_sold);
    }
}
