//! Simulation configuration: token economics, bucket allocations, and the
//! ABM/Monte-Carlo knobs that `SimulationEngine::from_config` wires into a
//! running simulation.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    pub total_supply: f64,
    pub start_date: NaiveDate,
    pub horizon_months: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketConfig {
    #[serde(rename = "bucket")]
    pub name: String,
    #[serde(rename = "allocation")]
    pub allocation_pct: f64,
    pub tge_unlock_pct: f64,
    pub cliff_months: u32,
    pub vesting_months: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentGranularity {
    Adaptive,
    FullIndividual,
    MetaAgents,
}

impl Default for AgentGranularity {
    fn default() -> Self {
        Self::Adaptive
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingModel {
    Eoe,
    BondingCurve,
    IssuanceCurve,
    Constant,
}

impl Default for PricingModel {
    fn default() -> Self {
        Self::Eoe
    }
}

fn default_initial_price() -> f64 {
    1.0
}

fn default_store_cohort_details() -> bool {
    true
}

fn default_agents_per_cohort() -> usize {
    50
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbmConfig {
    #[serde(default)]
    pub agent_granularity: AgentGranularity,
    #[serde(default = "default_initial_price")]
    pub initial_price: f64,
    pub seed: Option<u64>,
    #[serde(default)]
    pub bucket_cohort_mapping: HashMap<String, String>,
    #[serde(default)]
    pub pricing_model: PricingModel,
    #[serde(default)]
    pub pricing_config: serde_json::Value,
    #[serde(default)]
    pub enable_volume: bool,
    #[serde(default)]
    pub volume_config: serde_json::Value,
    #[serde(default)]
    pub enable_staking: bool,
    #[serde(default)]
    pub staking_config: serde_json::Value,
    #[serde(default)]
    pub enable_treasury: bool,
    #[serde(default)]
    pub treasury_config: serde_json::Value,
    #[serde(default = "default_store_cohort_details")]
    pub store_cohort_details: bool,
    #[serde(default = "default_agents_per_cohort")]
    pub agents_per_cohort: usize,
}

impl Default for AbmConfig {
    fn default() -> Self {
        Self {
            agent_granularity: AgentGranularity::default(),
            initial_price: default_initial_price(),
            seed: None,
            bucket_cohort_mapping: HashMap::new(),
            pricing_model: PricingModel::default(),
            pricing_config: serde_json::Value::Null,
            enable_volume: false,
            volume_config: serde_json::Value::Null,
            enable_staking: false,
            staking_config: serde_json::Value::Null,
            enable_treasury: false,
            treasury_config: serde_json::Value::Null,
            store_cohort_details: default_store_cohort_details(),
            agents_per_cohort: default_agents_per_cohort(),
        }
    }
}

fn default_confidence_levels() -> Vec<f64> {
    vec![10.0, 50.0, 90.0]
}

fn default_num_trials() -> usize {
    100
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloConfig {
    #[serde(default = "default_num_trials")]
    pub num_trials: usize,
    #[serde(default = "default_confidence_levels")]
    pub confidence_levels: Vec<f64>,
    pub seed: Option<u64>,
    /// Reserved: neither spec.md nor the Python original define a numeric
    /// body for this field. Carried through for forward config compatibility
    /// but not read anywhere in this crate (see DESIGN.md Open Questions).
    #[serde(default)]
    pub variance_level: Option<f64>,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            num_trials: default_num_trials(),
            confidence_levels: default_confidence_levels(),
            seed: None,
            variance_level: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub token: TokenConfig,
    pub buckets: Vec<BucketConfig>,
    #[serde(default)]
    pub abm: AbmConfig,
    pub monte_carlo: Option<MonteCarloConfig>,
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.token.total_supply <= 0.0 {
            return Err(EngineError::Configuration(
                "token.total_supply must be positive".into(),
            ));
        }
        if self.token.horizon_months == 0 {
            return Err(EngineError::Configuration(
                "token.horizon_months must be at least 1".into(),
            ));
        }
        if self.buckets.is_empty() {
            return Err(EngineError::Configuration(
                "at least one bucket allocation is required".into(),
            ));
        }

        let total_allocation: f64 = self.buckets.iter().map(|b| b.allocation_pct).sum();
        if total_allocation > 100.01 {
            return Err(EngineError::Configuration(format!(
                "bucket allocations must not exceed 100%, got {total_allocation:.2}%"
            )));
        }

        for bucket in &self.buckets {
            if !(0.0..=100.0).contains(&bucket.tge_unlock_pct) {
                return Err(EngineError::Configuration(format!(
                    "bucket {}: tge_unlock_pct must be within 0-100",
                    bucket.name
                )));
            }
        }

        Ok(())
    }

    /// Deterministic fingerprint for job-queue result caching: canonical
    /// (sorted-key) JSON encoding, SHA-256, first 16 hex characters.
    pub fn fingerprint(&self) -> Result<String> {
        let value = serde_json::to_value(self)
            .map_err(|e| EngineError::Configuration(format!("config not serializable: {e}")))?;
        let canonical = canonicalize(&value);
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        let digest = hasher.finalize();
        Ok(hex_prefix(&digest, 16))
    }
}

/// Render a `serde_json::Value` with object keys sorted, matching Python's
/// `json.dumps(config, sort_keys=True)`.
fn canonicalize(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let parts: Vec<String> = keys
                .into_iter()
                .map(|k| format!("{:?}:{}", k, canonicalize(&map[k])))
                .collect();
            format!("{{{}}}", parts.join(","))
        }
        serde_json::Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(canonicalize).collect();
            format!("[{}]", parts.join(","))
        }
        other => other.to_string(),
    }
}

fn hex_prefix(bytes: &[u8], chars: usize) -> String {
    let mut s = String::with_capacity(chars);
    for byte in bytes {
        if s.len() >= chars {
            break;
        }
        s.push_str(&format!("{byte:02x}"));
    }
    s.truncate(chars);
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SimulationConfig {
        SimulationConfig {
            token: TokenConfig {
                total_supply: 1_000_000_000.0,
                start_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
                horizon_months: 24,
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
                    tge_unlock_pct: 10.0,
                    cliff_months: 0,
                    vesting_months: 12,
                },
            ],
            abm: AbmConfig::default(),
            monte_carlo: None,
        }
    }

    #[test]
    fn valid_config_passes_validation() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn allocations_exceeding_one_hundred_percent_are_rejected() {
        let mut c = config();
        c.buckets[0].allocation_pct = 50.0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn allocations_summing_to_less_than_one_hundred_percent_are_allowed() {
        let mut c = config();
        c.buckets[0].allocation_pct = 5.0;
        assert!(c.validate().is_ok());
    }

    #[test]
    fn fingerprint_is_deterministic_and_order_independent() {
        let a = config();
        let mut b = config();
        b.buckets.reverse();
        b.buckets.reverse();

        assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
        assert_eq!(a.fingerprint().unwrap().len(), 16);
    }

    #[test]
    fn fingerprint_changes_with_config() {
        let a = config();
        let mut b = config();
        b.token.total_supply *= 2.0;
        assert_ne!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
    }
}
