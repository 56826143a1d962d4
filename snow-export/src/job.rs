use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use snow_source::entity::Region;
use std::fmt;
use std::str::FromStr;

/// Export job lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Submitted,
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobState {
    fn rank(self) -> u8 {
        match self {
            JobState::Submitted => 0,
            JobState::Queued => 1,
            JobState::Running => 2,
            JobState::Completed | JobState::Failed => 3,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    /// Whether a job in this state may be reported as `next`.
    pub fn can_advance_to(self, next: JobState) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Submitted => "SUBMITTED",
            JobState::Queued => "QUEUED",
            JobState::Running => "RUNNING",
            JobState::Completed => "COMPLETED",
            JobState::Failed => "FAILED",
        };
        write!(f, "{s}")
    }
}

/// Parses the state names used by the remote export service, including
/// its aliases (`READY` for queued, `CANCELLED` for failed).
impl FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "UNSUBMITTED" | "SUBMITTED" => Ok(JobState::Submitted),
            "READY" | "QUEUED" | "PENDING" => Ok(JobState::Queued),
            "RUNNING" | "CANCEL_REQUESTED" => Ok(JobState::Running),
            "COMPLETED" | "SUCCEEDED" => Ok(JobState::Completed),
            "FAILED" | "CANCELLED" => Ok(JobState::Failed),
            other => Err(format!("unknown job state '{other}'")),
        }
    }
}

/// One status report for one job, as returned by a poll.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub job_id: String,
    pub state: JobState,
    pub error_message: Option<String>,
}

/// What applying a status update did to a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Advanced { from: JobState, to: JobState },
    Unchanged,
    /// The job was already terminal; nothing changed.
    Terminal,
    /// The service reported an earlier state than the one recorded.
    Regression { current: JobState, reported: JobState },
}

/// A tracked export job. Created on successful submission and changed only
/// by poll responses (plus the local abandon flag).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportJob {
    job_id: String,
    description: String,
    region: Region,
    scale_meters: f64,
    status: JobState,
    submitted_at: DateTime<Utc>,
    last_polled_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
    abandoned: bool,
}

impl ExportJob {
    /// A freshly acknowledged job. An acknowledgement still reading
    /// `SUBMITTED` is recorded as `QUEUED`, since the service has accepted it.
    pub fn acknowledged(
        job_id: &str,
        description: &str,
        region: Region,
        scale_meters: f64,
        acknowledged_state: JobState,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        let status = if acknowledged_state == JobState::Submitted {
            JobState::Queued
        } else {
            acknowledged_state
        };
        ExportJob {
            job_id: job_id.to_string(),
            description: description.to_string(),
            region,
            scale_meters,
            status,
            submitted_at,
            last_polled_at: None,
            error_message: None,
            abandoned: false,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn scale_meters(&self) -> f64 {
        self.scale_meters
    }

    pub fn status(&self) -> JobState {
        self.status
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    pub fn last_polled_at(&self) -> Option<DateTime<Utc>> {
        self.last_polled_at
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn is_abandoned(&self) -> bool {
        self.abandoned
    }

    pub(crate) fn abandon(&mut self) {
        self.abandoned = true;
    }

    /// Still expected to change: not terminal and not abandoned.
    pub fn is_pending(&self) -> bool {
        !self.abandoned && !self.status.is_terminal()
    }

    /// Apply a poll result. Terminal jobs are immutable and backward moves
    /// are ignored, so the recorded state never decreases.
    pub fn apply(&mut self, update: &StatusUpdate, polled_at: DateTime<Utc>) -> Applied {
        if self.status.is_terminal() {
            return Applied::Terminal;
        }
        self.last_polled_at = Some(polled_at);
        if update.state == self.status {
            return Applied::Unchanged;
        }
        if !self.status.can_advance_to(update.state) {
            warn!(
                "Job {} ({}) reported {} after {}; keeping {}",
                self.job_id, self.description, update.state, self.status, self.status
            );
            return Applied::Regression {
                current: self.status,
                reported: update.state,
            };
        }
        let from = self.status;
        self.status = update.state;
        match update.state {
            JobState::Failed => {
                let message = update
                    .error_message
                    .clone()
                    .unwrap_or_else(|| "unknown".to_string());
                warn!("FAILED: {}: {}", self.description, message);
                self.error_message = Some(message);
            }
            JobState::Completed => info!("Completed export: {}", self.description),
            _ => {}
        }
        Applied::Advanced {
            from,
            to: update.state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snow_source::entity::CONUS;

    fn job() -> ExportJob {
        ExportJob::acknowledged("job-1", "demo", CONUS, 1000.0, JobState::Submitted, Utc::now())
    }

    fn update(state: JobState, message: Option<&str>) -> StatusUpdate {
        StatusUpdate {
            job_id: "job-1".to_string(),
            state,
            error_message: message.map(str::to_string),
        }
    }

    #[test]
    fn test_acknowledgement_moves_out_of_submitted() {
        assert_eq!(job().status(), JobState::Queued);
        let running = ExportJob::acknowledged("j", "d", CONUS, 1.0, JobState::Running, Utc::now());
        assert_eq!(running.status(), JobState::Running);
    }

    #[test]
    fn test_forward_transitions() {
        let mut j = job();
        let now = Utc::now();
        assert_eq!(
            j.apply(&update(JobState::Running, None), now),
            Applied::Advanced {
                from: JobState::Queued,
                to: JobState::Running
            }
        );
        assert_eq!(j.apply(&update(JobState::Running, None), now), Applied::Unchanged);
        assert_eq!(j.last_polled_at(), Some(now));
        j.apply(&update(JobState::Completed, None), now);
        assert_eq!(j.status(), JobState::Completed);
        assert!(!j.is_pending());
    }

    #[test]
    fn test_running_never_returns_to_queued() {
        let mut j = job();
        let now = Utc::now();
        j.apply(&update(JobState::Running, None), now);
        let applied = j.apply(&update(JobState::Queued, None), now);
        assert_eq!(
            applied,
            Applied::Regression {
                current: JobState::Running,
                reported: JobState::Queued
            }
        );
        assert_eq!(j.status(), JobState::Running);
    }

    #[test]
    fn test_terminal_is_immutable() {
        let mut j = job();
        let first = Utc::now();
        j.apply(&update(JobState::Failed, Some("Quota exceeded")), first);
        assert_eq!(j.error_message(), Some("Quota exceeded"));
        let later = first + chrono::Duration::seconds(30);
        assert_eq!(j.apply(&update(JobState::Completed, None), later), Applied::Terminal);
        assert_eq!(j.status(), JobState::Failed);
        assert_eq!(j.last_polled_at(), Some(first));
        assert_eq!(j.error_message(), Some("Quota exceeded"));
    }

    #[test]
    fn test_failed_without_message() {
        let mut j = job();
        j.apply(&update(JobState::Failed, None), Utc::now());
        assert_eq!(j.error_message(), Some("unknown"));
    }

    #[test]
    fn test_parse_remote_states() {
        assert_eq!("READY".parse::<JobState>().unwrap(), JobState::Queued);
        assert_eq!("running".parse::<JobState>().unwrap(), JobState::Running);
        assert_eq!("CANCELLED".parse::<JobState>().unwrap(), JobState::Failed);
        assert_eq!("UNSUBMITTED".parse::<JobState>().unwrap(), JobState::Submitted);
        assert!("EXPLODED".parse::<JobState>().is_err());
    }

    #[test]
    fn test_rank_order() {
        assert!(JobState::Submitted.can_advance_to(JobState::Running));
        assert!(JobState::Queued.can_advance_to(JobState::Failed));
        assert!(!JobState::Running.can_advance_to(JobState::Queued));
        assert!(!JobState::Completed.can_advance_to(JobState::Failed));
    }
}
