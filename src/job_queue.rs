//! JobQueue: bounded-concurrency async execution of simulation and Monte
//! Carlo runs, with result caching by config fingerprint and cooperative
//! cancellation.
//!
//! CPU-bound work (the rayon-driven [`SimulationEngine`]/
//! [`MonteCarloOrchestrator`]) runs inside `tokio::task::spawn_blocking`, so
//! the outer job map uses a `tokio::sync::RwLock` (mutated from async
//! contexts: submit/cancel/cleanup) while each job's frequently-updated
//! progress fields live behind a `std::sync::Mutex` that the blocking
//! closure can lock synchronously without an executor underneath it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::SimulationConfig;
use crate::engine::SimulationEngine;
use crate::error::{EngineError, Result};
use crate::monte_carlo::{MonteCarloOrchestrator, MonteCarloResults};

const CACHE_TTL_HOURS: i64 = 2;
const DEFAULT_JOB_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Simulation,
    MonteCarlo,
}

#[derive(Debug, Clone)]
pub enum JobResults {
    Simulation(crate::engine::SimulationResults),
    MonteCarlo(MonteCarloResults),
}

struct JobState {
    status: JobStatus,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    current_unit: u32,
    total_units: u32,
    error: Option<String>,
    results: Option<JobResults>,
}

impl JobState {
    fn new(total_units: u32) -> Self {
        Self {
            status: JobStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            current_unit: 0,
            total_units,
            error: None,
            results: None,
        }
    }

    fn progress_pct(&self) -> f64 {
        if self.total_units == 0 {
            0.0
        } else {
            (self.current_unit as f64 / self.total_units as f64) * 100.0
        }
    }
}

pub struct JobHandle {
    pub job_id: String,
    pub kind: JobKind,
    state: Mutex<JobState>,
    cancel_flag: Arc<AtomicBool>,
    join_handle: Mutex<Option<JoinHandle<()>>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobInfo {
    pub job_id: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub current_unit: u32,
    pub total_units: u32,
    pub progress_pct: f64,
    pub error: Option<String>,
}

impl JobHandle {
    fn info(&self) -> JobInfo {
        let state = self.state.lock().expect("job state mutex poisoned");
        JobInfo {
            job_id: self.job_id.clone(),
            status: state.status,
            created_at: state.created_at,
            started_at: state.started_at,
            completed_at: state.completed_at,
            current_unit: state.current_unit,
            total_units: state.total_units,
            progress_pct: state.progress_pct(),
            error: state.error.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct QueueStats {
    pub total_jobs: usize,
    pub status_counts: HashMap<String, usize>,
    pub cache_size: usize,
    pub max_concurrent_jobs: usize,
}

struct CacheEntry {
    results: crate::engine::SimulationResults,
    cached_at: DateTime<Utc>,
}

pub struct JobQueue {
    jobs: RwLock<HashMap<String, Arc<JobHandle>>>,
    result_cache: RwLock<HashMap<String, CacheEntry>>,
    max_concurrent_jobs: usize,
    job_ttl_hours: i64,
}

impl JobQueue {
    pub fn new(max_concurrent_jobs: usize) -> Arc<Self> {
        Arc::new(Self {
            jobs: RwLock::new(HashMap::new()),
            result_cache: RwLock::new(HashMap::new()),
            max_concurrent_jobs,
            job_ttl_hours: DEFAULT_JOB_TTL_HOURS,
        })
    }

    async fn running_count(&self) -> usize {
        self.jobs
            .read()
            .await
            .values()
            .filter(|j| j.state.lock().expect("poisoned").status == JobStatus::Running)
            .count()
    }

    /// Submit a simulation job. Returns a cached, already-completed job id
    /// immediately if a result for this exact config is still within the
    /// cache TTL.
    pub async fn submit(self: &Arc<Self>, config: SimulationConfig) -> Result<String> {
        let fingerprint = config.fingerprint()?;

        {
            let cache = self.result_cache.read().await;
            if let Some(entry) = cache.get(&fingerprint) {
                if Utc::now() - entry.cached_at < ChronoDuration::hours(CACHE_TTL_HOURS) {
                    let job_id = format!("cached_{}", short_uuid());
                    let months = config.token.horizon_months;
                    let mut state = JobState::new(months);
                    state.status = JobStatus::Completed;
                    state.started_at = Some(Utc::now());
                    state.completed_at = Some(Utc::now());
                    state.current_unit = months;
                    state.results = Some(JobResults::Simulation(entry.results.clone()));

                    let handle = Arc::new(JobHandle {
                        job_id: job_id.clone(),
                        kind: JobKind::Simulation,
                        state: Mutex::new(state),
                        cancel_flag: Arc::new(AtomicBool::new(false)),
                        join_handle: Mutex::new(None),
                    });
                    self.jobs.write().await.insert(job_id.clone(), handle);
                    info!(%job_id, %fingerprint, "cache hit, returning cached job");
                    return Ok(job_id);
                }
            }
        }

        let running = self.running_count().await;
        if running >= self.max_concurrent_jobs {
            return Err(EngineError::OverCapacity {
                running,
                max: self.max_concurrent_jobs,
            });
        }

        let job_id = format!("abm_{}", short_uuid());
        let months = config.token.horizon_months;
        let cancel_flag = Arc::new(AtomicBool::new(false));
        let handle = Arc::new(JobHandle {
            job_id: job_id.clone(),
            kind: JobKind::Simulation,
            state: Mutex::new(JobState::new(months)),
            cancel_flag: cancel_flag.clone(),
            join_handle: Mutex::new(None),
        });

        self.jobs.write().await.insert(job_id.clone(), handle.clone());

        let queue = self.clone();
        let handle_for_task = handle.clone();
        let join = tokio::spawn(async move {
            queue
                .run_simulation_job(handle_for_task, config, fingerprint, cancel_flag)
                .await;
        });
        *handle.join_handle.lock().expect("poisoned") = Some(join);

        info!(%job_id, running = running + 1, "job submitted");
        Ok(job_id)
    }

    async fn run_simulation_job(
        self: Arc<Self>,
        handle: Arc<JobHandle>,
        config: SimulationConfig,
        fingerprint: String,
        cancel_flag: Arc<AtomicBool>,
    ) {
        {
            let mut state = handle.state.lock().expect("poisoned");
            state.status = JobStatus::Running;
            state.started_at = Some(Utc::now());
        }

        let handle_progress = handle.clone();
        let months = config.token.horizon_months;

        let outcome = tokio::task::spawn_blocking(move || -> Result<crate::engine::SimulationResults> {
            let mut engine = SimulationEngine::from_config(&config)?;
            engine.run_full(
                months,
                move |current, total| {
                    let mut state = handle_progress.state.lock().expect("poisoned");
                    state.current_unit = current;
                    state.total_units = total;
                },
                Some(cancel_flag),
            )
        })
        .await;

        let mut state = handle.state.lock().expect("poisoned");
        match outcome {
            Ok(Ok(results)) => {
                state.results = Some(JobResults::Simulation(results.clone()));
                state.status = JobStatus::Completed;
                state.completed_at = Some(Utc::now());
                drop(state);

                self.result_cache.write().await.insert(
                    fingerprint,
                    CacheEntry {
                        results,
                        cached_at: Utc::now(),
                    },
                );
            }
            Ok(Err(EngineError::Cancelled)) => {
                state.status = JobStatus::Cancelled;
                state.completed_at = Some(Utc::now());
            }
            Ok(Err(e)) => {
                state.status = JobStatus::Failed;
                state.error = Some(e.to_string());
                state.completed_at = Some(Utc::now());
            }
            Err(join_err) => {
                state.status = JobStatus::Failed;
                state.error = Some(format!("worker task panicked: {join_err}"));
                state.completed_at = Some(Utc::now());
            }
        }
    }

    /// Submit a Monte Carlo job. `months` comes from `config.token.horizon_months`.
    pub async fn submit_monte_carlo(self: &Arc<Self>, config: SimulationConfig) -> Result<String> {
        let mc_config = config.monte_carlo.clone().ok_or_else(|| {
            EngineError::Configuration("monte_carlo configuration is required".into())
        })?;

        let running = self.running_count().await;
        if running >= self.max_concurrent_jobs {
            return Err(EngineError::OverCapacity {
                running,
                max: self.max_concurrent_jobs,
            });
        }

        let job_id = format!("mc_{}", short_uuid());
        let cancel_flag = Arc::new(AtomicBool::new(false));
        let handle = Arc::new(JobHandle {
            job_id: job_id.clone(),
            kind: JobKind::MonteCarlo,
            state: Mutex::new(JobState::new(mc_config.num_trials as u32)),
            cancel_flag: cancel_flag.clone(),
            join_handle: Mutex::new(None),
        });

        self.jobs.write().await.insert(job_id.clone(), handle.clone());

        let handle_for_task = handle.clone();
        let join = tokio::spawn(async move {
            Self::run_monte_carlo_job(handle_for_task, config).await;
        });
        *handle.join_handle.lock().expect("poisoned") = Some(join);

        info!(%job_id, trials = mc_config.num_trials, "monte carlo job submitted");
        Ok(job_id)
    }

    async fn run_monte_carlo_job(handle: Arc<JobHandle>, config: SimulationConfig) {
        {
            let mut state = handle.state.lock().expect("poisoned");
            state.status = JobStatus::Running;
            state.started_at = Some(Utc::now());
        }

        let mc_config = config.monte_carlo.clone().expect("checked by caller");
        let months = config.token.horizon_months;
        let handle_progress = handle.clone();

        let outcome = tokio::task::spawn_blocking(move || -> Result<MonteCarloResults> {
            let orchestrator = MonteCarloOrchestrator::new(
                mc_config.num_trials,
                mc_config.confidence_levels.clone(),
                mc_config.seed.unwrap_or(0),
            );
            orchestrator.run(&config, months, move |completed, total| {
                let mut state = handle_progress.state.lock().expect("poisoned");
                state.current_unit = completed as u32;
                state.total_units = total as u32;
            })
        })
        .await;

        let mut state = handle.state.lock().expect("poisoned");
        match outcome {
            Ok(Ok(results)) => {
                state.results = Some(JobResults::MonteCarlo(results));
                state.status = JobStatus::Completed;
                state.completed_at = Some(Utc::now());
            }
            Ok(Err(EngineError::Cancelled)) => {
                state.status = JobStatus::Cancelled;
                state.completed_at = Some(Utc::now());
            }
            Ok(Err(e)) => {
                state.status = JobStatus::Failed;
                state.error = Some(e.to_string());
                state.completed_at = Some(Utc::now());
            }
            Err(join_err) => {
                state.status = JobStatus::Failed;
                state.error = Some(format!("worker task panicked: {join_err}"));
                state.completed_at = Some(Utc::now());
            }
        }
    }

    pub async fn get_status(&self, job_id: &str) -> Option<JobInfo> {
        let jobs = self.jobs.read().await;
        jobs.get(job_id).map(|h| h.info())
    }

    pub async fn get_results(&self, job_id: &str) -> Option<crate::engine::SimulationResults> {
        let jobs = self.jobs.read().await;
        let handle = jobs.get(job_id)?;
        let state = handle.state.lock().expect("poisoned");
        if state.status != JobStatus::Completed {
            return None;
        }
        match &state.results {
            Some(JobResults::Simulation(r)) => Some(r.clone()),
            _ => None,
        }
    }

    pub async fn get_monte_carlo_results(&self, job_id: &str) -> Option<MonteCarloResults> {
        let jobs = self.jobs.read().await;
        let handle = jobs.get(job_id)?;
        if handle.kind != JobKind::MonteCarlo {
            return None;
        }
        let state = handle.state.lock().expect("poisoned");
        if state.status != JobStatus::Completed {
            return None;
        }
        match &state.results {
            Some(JobResults::MonteCarlo(r)) => Some(r.clone()),
            _ => None,
        }
    }

    /// Request cancellation of a running job. Sets the cooperative flag the
    /// engine checks at month boundaries and aborts the task as a backup.
    pub async fn cancel(&self, job_id: &str) -> bool {
        let jobs = self.jobs.read().await;
        let Some(handle) = jobs.get(job_id) else {
            return false;
        };

        let is_running = handle.state.lock().expect("poisoned").status == JobStatus::Running;
        if !is_running {
            return false;
        }

        handle.cancel_flag.store(true, Ordering::Relaxed);
        if let Some(join) = handle.join_handle.lock().expect("poisoned").as_ref() {
            join.abort();
        }
        info!(%job_id, "job cancellation requested");
        true
    }

    pub async fn list_all(&self) -> Vec<JobInfo> {
        self.jobs.read().await.values().map(|h| h.info()).collect()
    }

    pub async fn stats(&self) -> QueueStats {
        let jobs = self.jobs.read().await;
        let mut status_counts = HashMap::new();
        for handle in jobs.values() {
            let status = handle.state.lock().expect("poisoned").status;
            *status_counts.entry(status_label(status).to_string()).or_insert(0) += 1;
        }

        QueueStats {
            total_jobs: jobs.len(),
            status_counts,
            cache_size: self.result_cache.read().await.len(),
            max_concurrent_jobs: self.max_concurrent_jobs,
        }
    }

    /// Remove completed/failed/cancelled jobs older than `job_ttl_hours`.
    /// Intended to be driven by a periodic `tokio::time::interval` in the
    /// hosting application (see `cleanup_loop`).
    pub async fn cleanup_old_jobs(&self) {
        let cutoff = Utc::now() - ChronoDuration::hours(self.job_ttl_hours);
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();

        jobs.retain(|_, handle| {
            let state = handle.state.lock().expect("poisoned");
            let terminal = matches!(
                state.status,
                JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
            );
            !(terminal && state.completed_at.is_some_and(|t| t < cutoff))
        });

        let removed = before - jobs.len();
        if removed > 0 {
            info!(removed, "cleaned up old jobs");
        }
    }

    /// Spawn the hourly cleanup sweep. Returns its `JoinHandle` so the caller
    /// can abort it on shutdown.
    pub fn spawn_cleanup_loop(self: &Arc<Self>) -> JoinHandle<()> {
        let queue = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(3600));
            loop {
                interval.tick().await;
                queue.cleanup_old_jobs().await;
            }
        })
    }

    /// Cancel all running jobs. Intended for graceful shutdown.
    pub async fn shutdown(&self) {
        let jobs = self.jobs.read().await;
        for handle in jobs.values() {
            let running = handle.state.lock().expect("poisoned").status == JobStatus::Running;
            if running {
                if let Some(join) = handle.join_handle.lock().expect("poisoned").as_ref() {
                    join.abort();
                }
            }
        }
        warn!("job queue shutdown: all running jobs aborted");
    }
}

fn status_label(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Pending => "pending",
        JobStatus::Running => "running",
        JobStatus::Completed => "completed",
        JobStatus::Failed => "failed",
        JobStatus::Cancelled => "cancelled",
    }
}

fn short_uuid() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}
