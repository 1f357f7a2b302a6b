//! Error taxonomy for the ABM engine.

use thiserror::Error;

/// Errors surfaced by the simulation engine, job queue, and Monte Carlo
/// orchestrator.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("maximum concurrent jobs reached ({running}/{max})")]
    OverCapacity { running: usize, max: usize },

    #[error("job not found: {0}")]
    NotFound(String),

    #[error("results not available for job {0}")]
    NotAvailable(String),

    #[error("agent {agent_id} decision failed: {reason}")]
    AgentDecisionFailure { agent_id: String, reason: String },

    #[error("tick {month_index} failed: {reason}")]
    TickFailure { month_index: usize, reason: String },

    #[error("job cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, EngineError>;
