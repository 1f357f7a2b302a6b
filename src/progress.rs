//! ProgressStreamer: polling-based progress event production for jobs in a
//! [`JobQueue`].
//!
//! The Python original frames these events as Server-Sent Events text
//! (`data: {json}\n\n`); that text framing is an HTTP transport concern and
//! is deliberately left out here. What's reproduced is the underlying event
//! shape and polling cadence, delivered as a `tokio::sync::mpsc` stream of
//! [`ProgressEvent`] values that a caller can serialize (or SSE-frame) at
//! whatever boundary it owns.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;

use crate::job_queue::{JobQueue, JobStatus, QueueStats};

const DEFAULT_SINGLE_JOB_POLL_MS: u64 = 500;
const DEFAULT_MULTI_JOB_POLL_MS: u64 = 1000;
const DEFAULT_QUEUE_STATS_POLL_MS: u64 = 2000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Progress {
        job_id: String,
        status: JobStatus,
        progress_pct: f64,
        current_unit: u32,
        total_units: u32,
    },
    Done {
        job_id: String,
        status: JobStatus,
        error: Option<String>,
    },
    Error {
        message: String,
    },
    BatchProgress {
        jobs: Vec<JobProgressEntry>,
    },
    QueueStats {
        stats: QueueStats,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobProgressEntry {
    pub job_id: String,
    pub status: JobStatus,
    pub progress_pct: f64,
    pub current_unit: u32,
    pub total_units: u32,
}

fn is_terminal(status: JobStatus) -> bool {
    matches!(
        status,
        JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
    )
}

pub struct ProgressStreamer {
    job_queue: Arc<JobQueue>,
}

impl ProgressStreamer {
    pub fn new(job_queue: Arc<JobQueue>) -> Self {
        Self { job_queue }
    }

    /// Poll a single job until it reaches a terminal status, emitting a
    /// `Progress` event each tick and a final `Done` event. Returns a
    /// receiver the caller can `.recv()` from like an async stream.
    pub fn stream_job_progress(
        &self,
        job_id: String,
        poll_interval: Option<Duration>,
    ) -> mpsc::Receiver<ProgressEvent> {
        let poll_interval =
            poll_interval.unwrap_or(Duration::from_millis(DEFAULT_SINGLE_JOB_POLL_MS));
        let (tx, rx) = mpsc::channel(16);
        let job_queue = self.job_queue.clone();

        tokio::spawn(async move {
            info!(%job_id, "starting progress stream for job");

            if job_queue.get_status(&job_id).await.is_none() {
                let _ = tx
                    .send(ProgressEvent::Error {
                        message: format!("Job {job_id} not found"),
                    })
                    .await;
                return;
            }

            loop {
                let Some(status) = job_queue.get_status(&job_id).await else {
                    let _ = tx
                        .send(ProgressEvent::Error {
                            message: "Job disappeared".into(),
                        })
                        .await;
                    break;
                };

                if tx
                    .send(ProgressEvent::Progress {
                        job_id: job_id.clone(),
                        status: status.status,
                        progress_pct: status.progress_pct,
                        current_unit: status.current_unit,
                        total_units: status.total_units,
                    })
                    .await
                    .is_err()
                {
                    break;
                }

                if is_terminal(status.status) {
                    let _ = tx
                        .send(ProgressEvent::Done {
                            job_id: job_id.clone(),
                            status: status.status,
                            error: status.error,
                        })
                        .await;
                    info!(%job_id, status = ?status.status, "progress stream ended");
                    break;
                }

                tokio::time::sleep(poll_interval).await;
            }
        });

        rx
    }

    /// Poll a set of jobs until all have reached a terminal status, emitting
    /// one `BatchProgress` event per tick covering only the still-active
    /// jobs.
    pub fn stream_multiple_jobs(
        &self,
        job_ids: Vec<String>,
        poll_interval: Option<Duration>,
    ) -> mpsc::Receiver<ProgressEvent> {
        let poll_interval =
            poll_interval.unwrap_or(Duration::from_millis(DEFAULT_MULTI_JOB_POLL_MS));
        let (tx, rx) = mpsc::channel(16);
        let job_queue = self.job_queue.clone();

        tokio::spawn(async move {
            info!(count = job_ids.len(), "starting multi-job progress stream");
            let mut active: Vec<String> = job_ids;

            while !active.is_empty() {
                let mut updates = Vec::new();
                let mut still_active = Vec::new();

                for job_id in active {
                    let Some(status) = job_queue.get_status(&job_id).await else {
                        continue;
                    };

                    updates.push(JobProgressEntry {
                        job_id: job_id.clone(),
                        status: status.status,
                        progress_pct: status.progress_pct,
                        current_unit: status.current_unit,
                        total_units: status.total_units,
                    });

                    if !is_terminal(status.status) {
                        still_active.push(job_id);
                    }
                }

                active = still_active;

                if !updates.is_empty() && tx.send(ProgressEvent::BatchProgress { jobs: updates }).await.is_err() {
                    break;
                }

                if active.is_empty() {
                    break;
                }

                tokio::time::sleep(poll_interval).await;
            }

            info!("multi-job progress stream ended");
        });

        rx
    }

    /// Poll queue-wide stats indefinitely (intended for admin/monitoring
    /// dashboards). The stream runs until the receiver is dropped.
    pub fn stream_queue_stats(&self, poll_interval: Option<Duration>) -> mpsc::Receiver<ProgressEvent> {
        let poll_interval =
            poll_interval.unwrap_or(Duration::from_millis(DEFAULT_QUEUE_STATS_POLL_MS));
        let (tx, rx) = mpsc::channel(16);
        let job_queue = self.job_queue.clone();

        tokio::spawn(async move {
            info!("starting queue stats stream");
            loop {
                let stats = job_queue.stats().await;
                if tx.send(ProgressEvent::QueueStats { stats }).await.is_err() {
                    info!("queue stats stream cancelled");
                    break;
                }
                tokio::time::sleep(poll_interval).await;
            }
        });

        rx
    }
}
