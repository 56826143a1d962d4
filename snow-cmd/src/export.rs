//! Submit the demo raster products and follow them to completion.

use crate::{config::SnowConfig, write_json};
use log::{info, warn};
use serde::Serialize;
use snow_export::{
    job::ExportJob,
    orchestrator::StateCounts,
    plan::demo_plan,
    remote::RemoteExportService,
    request::ExportRequest,
    service::ExportService,
    ExportError, ExportOrchestrator, MonitorOutcome,
};
use snow_source::client::RemoteClient;
use tokio_util::sync::CancellationToken;

pub const JOBS_FILE: &str = "export_jobs.json";

/// A requested product the service never accepted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rejection {
    pub description: String,
    pub error: &'static str,
    pub reason: String,
}

impl Rejection {
    fn new(request: &ExportRequest, e: &ExportError) -> Self {
        let reason = match e {
            ExportError::SubmissionFailed { reason, .. } => reason.clone(),
            other => other.to_string(),
        };
        Rejection {
            description: request.description.clone(),
            error: e.kind(),
            reason,
        }
    }
}

/// Every requested product: tracked jobs plus the rejected submissions.
#[derive(Debug, Serialize)]
pub struct JobsDocument<'a> {
    pub outcome: &'a str,
    pub counts: StateCounts,
    pub jobs: &'a [ExportJob],
    pub rejected: &'a [Rejection],
}

/// Submit `plan`, returning one rejection per request that was not tracked.
pub async fn submit_plan(
    orchestrator: &mut ExportOrchestrator<'_>,
    plan: &[ExportRequest],
) -> Vec<Rejection> {
    orchestrator
        .submit_all(plan)
        .await
        .iter()
        .zip(plan)
        .filter_map(|(result, request)| {
            result
                .as_ref()
                .err()
                .map(|e| Rejection::new(request, e))
        })
        .collect()
}

fn outcome_label(outcome: &Result<MonitorOutcome, ExportError>) -> String {
    match outcome {
        Ok(MonitorOutcome::Finished) => "finished".to_string(),
        Ok(MonitorOutcome::DeadlineReached) => "deadline_reached".to_string(),
        Ok(MonitorOutcome::Cancelled) => "cancelled".to_string(),
        Err(e) => format!("{}: {}", e.kind(), e),
    }
}

/// Submit every product of the demo plan. With `wait`, poll until all jobs
/// are terminal, the deadline passes or Ctrl-C is pressed. The job list is
/// written either way.
pub async fn run_export(config: &SnowConfig, wait: bool) -> anyhow::Result<()> {
    let client = RemoteClient::new(&config.api)?;
    let service = RemoteExportService::new(&client);
    let mut orchestrator = ExportOrchestrator::new(&service, config.export.poll);

    let plan = demo_plan(&config.export.bucket, &config.export.prefix);
    info!("Exporting {} COGs to {}", plan.len(), config.export.bucket);
    let rejected = submit_plan(&mut orchestrator, &plan).await;
    let accepted = orchestrator.jobs().len();

    let outcome = if wait && accepted > 0 {
        let cancel = CancellationToken::new();
        let on_signal = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                on_signal.cancel();
            }
        });
        let outcome = orchestrator.monitor(&cancel).await;
        cancel.cancel();
        Some(outcome)
    } else {
        None
    };

    let label = match &outcome {
        Some(outcome) => outcome_label(outcome),
        None => "submitted".to_string(),
    };
    let doc = JobsDocument {
        outcome: &label,
        counts: orchestrator.counts(),
        jobs: orchestrator.jobs(),
        rejected: &rejected,
    };
    let path = write_json(&config.data_dir, JOBS_FILE, &doc)?;
    info!("Job list saved to {}", path.display());

    if accepted == 0 {
        anyhow::bail!("no export was accepted");
    }
    if let Some(MonitorOutcome::DeadlineReached) = outcome.transpose()? {
        warn!("Jobs still running remotely: {}", orchestrator.counts());
    }
    Ok(())
}

/// Ask the service to cancel a job submitted by an earlier run.
pub async fn run_cancel(config: &SnowConfig, job_id: &str) -> anyhow::Result<()> {
    let client = RemoteClient::new(&config.api)?;
    RemoteExportService::new(&client)
        .cancel(job_id)
        .await
        .map_err(|e| anyhow::anyhow!("Cancel of {job_id} failed: {e}"))?;
    info!("Cancellation requested for {job_id}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use snow_export::{
        job::{JobState, StatusUpdate},
        service::{JobHandle, ServiceError},
        PollConfig,
    };
    use std::sync::Mutex;

    /// Accepts regional products and refuses the global ones.
    struct RegionalOnly {
        next: Mutex<u32>,
    }

    #[async_trait]
    impl ExportService for RegionalOnly {
        async fn submit(&self, request: &ExportRequest) -> Result<JobHandle, ServiceError> {
            if request.description.ends_with("global") {
                return Err(ServiceError("Too many tasks already in the queue.".to_string()));
            }
            let mut next = self.next.lock().unwrap();
            *next += 1;
            Ok(JobHandle {
                job_id: format!("T{next}"),
                state: JobState::Queued,
            })
        }

        async fn status(&self, _job_ids: &[String]) -> Result<Vec<StatusUpdate>, ServiceError> {
            Ok(Vec::new())
        }

        async fn cancel(&self, _job_id: &str) -> Result<(), ServiceError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_rejected_submissions_are_reported() {
        let service = RegionalOnly {
            next: Mutex::new(0),
        };
        let mut orchestrator = ExportOrchestrator::new(&service, PollConfig::default());
        let plan = demo_plan("bucket", "cogs");
        let rejected = submit_plan(&mut orchestrator, &plan).await;

        assert_eq!(orchestrator.jobs().len(), 4);
        assert_eq!(
            rejected,
            vec![
                Rejection {
                    description: "era5_avg_snowfall_global".to_string(),
                    error: "SubmissionFailed",
                    reason: "Too many tasks already in the queue.".to_string(),
                },
                Rejection {
                    description: "era5_snowfall_trend_global".to_string(),
                    error: "SubmissionFailed",
                    reason: "Too many tasks already in the queue.".to_string(),
                },
            ]
        );

        let doc = serde_json::to_value(JobsDocument {
            outcome: "submitted",
            counts: orchestrator.counts(),
            jobs: orchestrator.jobs(),
            rejected: &rejected,
        })
        .unwrap();
        assert_eq!(doc["jobs"].as_array().unwrap().len(), 4);
        assert_eq!(doc["rejected"].as_array().unwrap().len(), 2);
        assert_eq!(doc["rejected"][0]["error"], "SubmissionFailed");
        assert_eq!(doc["counts"]["queued"], 4);
    }
}
