use std::fs;
use std::path::PathBuf;

use abm_engine::config::SimulationConfig;
use abm_engine::engine::SimulationEngine;
use abm_engine::monte_carlo::MonteCarloOrchestrator;
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "abm-engine", about = "CLI for the token-economy ABM simulation engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a simulation config file without running it.
    Validate { config: PathBuf },
    /// Run a single simulation and print the month-by-month trajectory.
    Run {
        config: PathBuf,
        #[arg(long)]
        months: Option<u32>,
    },
    /// Run the Monte Carlo orchestrator and print percentile summaries.
    MonteCarlo {
        config: PathBuf,
        #[arg(long)]
        months: Option<u32>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Validate { config } => validate_cmd(&config),
        Commands::Run { config, months } => run_cmd(&config, months),
        Commands::MonteCarlo { config, months } => monte_carlo_cmd(&config, months),
    }
}

fn load_config(path: &PathBuf) -> Result<SimulationConfig> {
    if !path.exists() {
        bail!("config file not found: {}", path.display());
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let config: SimulationConfig = serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse {} as a simulation config", path.display()))?;
    Ok(config)
}

fn validate_cmd(path: &PathBuf) -> Result<()> {
    let config = load_config(path)?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("{} is invalid: {e}", path.display()))?;
    println!("[PASS] {}", path.display());
    Ok(())
}

fn run_cmd(path: &PathBuf, months: Option<u32>) -> Result<()> {
    let config = load_config(path)?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("{} is invalid: {e}", path.display()))?;

    let horizon = months.unwrap_or(config.token.horizon_months);
    let mut engine = SimulationEngine::from_config(&config)
        .map_err(|e| anyhow::anyhow!("failed to build simulation engine: {e}"))?;

    println!("Agents created: {}", engine.agent_count());
    let results = engine
        .run_full(horizon, |current, total| {
            if current % 12 == 0 || current == total {
                eprintln!("  month {current}/{total}");
            }
        }, None)
        .map_err(|e| anyhow::anyhow!("simulation failed: {e}"))?;

    println!("\nMonth   Price        Circulating       Sold         Staked");
    println!("------------------------------------------------------------------");
    for r in &results.global_metrics {
        println!(
            "{:>5}   {:>8.4}   {:>14.2}   {:>10.2}   {:>10.2}",
            r.month_index, r.price, r.circulating_supply, r.total_sold, r.total_staked
        );
    }

    for warning in &results.warnings {
        eprintln!("warning: {warning}");
    }

    Ok(())
}

fn monte_carlo_cmd(path: &PathBuf, months: Option<u32>) -> Result<()> {
    let config = load_config(path)?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("{} is invalid: {e}", path.display()))?;

    let mc_config = config
        .monte_carlo
        .clone()
        .context("config has no monte_carlo section")?;
    let horizon = months.unwrap_or(config.token.horizon_months);

    let orchestrator = MonteCarloOrchestrator::new(
        mc_config.num_trials,
        mc_config.confidence_levels.clone(),
        mc_config.seed.unwrap_or(0),
    );

    let results = orchestrator
        .run(&config, horizon, |completed, total| {
            if completed % 10 == 0 || completed == total {
                eprintln!("  trial {completed}/{total}");
            }
        })
        .map_err(|e| anyhow::anyhow!("monte carlo run failed: {e}"))?;

    println!("\nTrials: {}", results.summary.num_trials);
    println!(
        "Final price: mean={:.4} std={:.4} p10={:.4} p50={:.4} p90={:.4}",
        results.summary.mean_final_price,
        results.summary.std_final_price,
        results.summary.p10_final_price,
        results.summary.p50_final_price,
        results.summary.p90_final_price
    );
    println!(
        "Total sold: mean={:.2} std={:.2}",
        results.summary.mean_total_sold, results.summary.std_total_sold
    );

    Ok(())
}
