//! Submission and polling of export jobs.
//!
//! The orchestrator owns the tracked jobs. Each poll round asks the service
//! about every job that is neither terminal nor abandoned in one batch, and
//! the loop in [`ExportOrchestrator::monitor`] sleeps a fixed interval
//! between rounds until nothing is left queued or running.

use crate::{
    error::ExportError,
    job::{Applied, ExportJob, JobState},
    request::ExportRequest,
    service::{ExportService, ServiceError},
};
use chrono::Utc;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub poll_interval_secs: u64,
    /// Stop monitoring after this long; `None` waits indefinitely.
    pub max_poll_secs: Option<u64>,
    pub max_consecutive_poll_failures: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        PollConfig {
            poll_interval_secs: 15,
            max_poll_secs: None,
            max_consecutive_poll_failures: 5,
        }
    }
}

/// Tally of tracked jobs by state. Abandoned jobs are counted only under
/// `abandoned`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StateCounts {
    pub queued: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub abandoned: usize,
}

impl fmt::Display for StateCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Running: {} | Queued: {} | Done: {} | Failed: {}",
            self.running, self.queued, self.completed, self.failed
        )?;
        if self.abandoned > 0 {
            write!(f, " | Abandoned: {}", self.abandoned)?;
        }
        Ok(())
    }
}

/// Result of one poll round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollRound {
    pub polled: usize,
    pub advanced: usize,
    pub counts: StateCounts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorOutcome {
    /// No tracked job is queued or running.
    Finished,
    DeadlineReached,
    Cancelled,
}

pub struct ExportOrchestrator<'a> {
    service: &'a dyn ExportService,
    config: PollConfig,
    jobs: Vec<ExportJob>,
}

impl<'a> ExportOrchestrator<'a> {
    pub fn new(service: &'a dyn ExportService, config: PollConfig) -> Self {
        ExportOrchestrator {
            service,
            config,
            jobs: Vec::new(),
        }
    }

    pub fn jobs(&self) -> &[ExportJob] {
        &self.jobs
    }

    pub fn job(&self, job_id: &str) -> Option<&ExportJob> {
        self.jobs.iter().find(|j| j.job_id() == job_id)
    }

    /// Validate and submit one request. On failure nothing is tracked.
    pub async fn submit(&mut self, request: &ExportRequest) -> Result<String, ExportError> {
        let rejected = |reason: String| ExportError::SubmissionFailed {
            description: request.description.clone(),
            reason,
        };
        request.validate().map_err(rejected)?;
        let handle = self
            .service
            .submit(request)
            .await
            .map_err(|ServiceError(message)| rejected(message))?;
        if self.job(&handle.job_id).is_some() {
            return Err(rejected(format!(
                "service returned duplicate job handle '{}'",
                handle.job_id
            )));
        }
        info!(
            "Started export: {} (scale={}m) as {}",
            request.description, request.scale_meters, handle.job_id
        );
        self.jobs.push(ExportJob::acknowledged(
            &handle.job_id,
            &request.description,
            request.region,
            request.scale_meters,
            handle.state,
            Utc::now(),
        ));
        Ok(handle.job_id)
    }

    /// Submit every request, collecting one result per request.
    pub async fn submit_all(
        &mut self,
        requests: &[ExportRequest],
    ) -> Vec<Result<String, ExportError>> {
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            let result = self.submit(request).await;
            if let Err(e) = &result {
                warn!("{e}");
            }
            results.push(result);
        }
        results
    }

    /// Stop tracking a job locally. The remote job is left alone.
    pub fn abandon(&mut self, job_id: &str) -> Result<(), ExportError> {
        let job = self
            .jobs
            .iter_mut()
            .find(|j| j.job_id() == job_id)
            .ok_or_else(|| ExportError::UnknownJob(job_id.to_string()))?;
        debug!("Abandoning {} ({})", job.job_id(), job.description());
        job.abandon();
        Ok(())
    }

    /// Ask the service to cancel a job. Local state changes only when a
    /// later poll reports the cancellation.
    pub async fn cancel_remote(&self, job_id: &str) -> Result<(), ExportError> {
        if self.job(job_id).is_none() {
            return Err(ExportError::UnknownJob(job_id.to_string()));
        }
        self.service
            .cancel(job_id)
            .await
            .map_err(|ServiceError(reason)| ExportError::CancelFailed {
                job_id: job_id.to_string(),
                reason,
            })
    }

    fn pending_ids(&self) -> Vec<String> {
        self.jobs
            .iter()
            .filter(|j| j.is_pending())
            .map(|j| j.job_id().to_string())
            .collect()
    }

    /// Whether any tracked, non-abandoned job is still queued or running.
    pub fn has_active(&self) -> bool {
        self.jobs.iter().any(ExportJob::is_pending)
    }

    pub fn counts(&self) -> StateCounts {
        let mut counts = StateCounts::default();
        for job in &self.jobs {
            if job.is_abandoned() {
                counts.abandoned += 1;
                continue;
            }
            match job.status() {
                JobState::Submitted | JobState::Queued => counts.queued += 1,
                JobState::Running => counts.running += 1,
                JobState::Completed => counts.completed += 1,
                JobState::Failed => counts.failed += 1,
            }
        }
        counts
    }

    /// One batch status query for all pending jobs.
    pub async fn poll_once(&mut self) -> Result<PollRound, ServiceError> {
        let ids = self.pending_ids();
        if ids.is_empty() {
            return Ok(PollRound {
                counts: self.counts(),
                ..PollRound::default()
            });
        }
        let updates = self.service.status(&ids).await?;
        let polled_at = Utc::now();
        let mut advanced = 0;
        for update in &updates {
            if !ids.contains(&update.job_id) {
                debug!("Ignoring status for unpolled job {}", update.job_id);
                continue;
            }
            if let Some(job) = self.jobs.iter_mut().find(|j| j.job_id() == update.job_id) {
                if let Applied::Advanced { .. } = job.apply(update, polled_at) {
                    advanced += 1;
                }
            }
        }
        Ok(PollRound {
            polled: ids.len(),
            advanced,
            counts: self.counts(),
        })
    }

    /// Poll until every job is terminal or abandoned, the deadline passes,
    /// or `cancel` fires. Jobs stay tracked in every case.
    pub async fn monitor(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<MonitorOutcome, ExportError> {
        info!("Monitoring {} export jobs...", self.jobs.len());
        let started = Instant::now();
        let deadline = self.config.max_poll_secs.map(Duration::from_secs);
        let interval = Duration::from_secs(self.config.poll_interval_secs);
        let mut failures = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Ok(MonitorOutcome::Cancelled);
            }
            match self.poll_once().await {
                Ok(round) => {
                    failures = 0;
                    info!("{}", round.counts);
                }
                Err(ServiceError(reason)) => {
                    failures += 1;
                    warn!(
                        "Status poll failed ({failures}/{}): {reason}",
                        self.config.max_consecutive_poll_failures
                    );
                    if failures >= self.config.max_consecutive_poll_failures {
                        return Err(ExportError::PollFailed {
                            attempts: failures,
                            reason,
                        });
                    }
                }
            }
            if !self.has_active() {
                let counts = self.counts();
                info!(
                    "All tasks finished! {} completed, {} failed.",
                    counts.completed, counts.failed
                );
                return Ok(MonitorOutcome::Finished);
            }
            if deadline.is_some_and(|limit| started.elapsed() >= limit) {
                warn!("Stopped monitoring after deadline; {}", self.counts());
                return Ok(MonitorOutcome::DeadlineReached);
            }
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Monitoring cancelled; {}", self.counts());
                    return Ok(MonitorOutcome::Cancelled);
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }
}
