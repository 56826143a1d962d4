//! Export service backed by the remote HTTP API.

use crate::{
    job::{JobState, StatusUpdate},
    request::ExportRequest,
    service::{ExportService, JobHandle, ServiceError},
};
use async_trait::async_trait;
use log::warn;
use serde::{Deserialize, Serialize};
use snow_source::client::{RemoteClient, RemoteError};

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    job_handle: String,
    #[serde(default)]
    state: Option<String>,
}

#[derive(Debug, Serialize)]
struct StatusRequest<'a> {
    handles: &'a [String],
}

#[derive(Debug, Deserialize)]
struct StatusEntry {
    job_handle: String,
    state: String,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    statuses: Vec<StatusEntry>,
}

impl From<RemoteError> for ServiceError {
    fn from(e: RemoteError) -> Self {
        ServiceError(e.message().to_string())
    }
}

pub struct RemoteExportService<'a> {
    client: &'a RemoteClient,
}

impl<'a> RemoteExportService<'a> {
    pub fn new(client: &'a RemoteClient) -> Self {
        RemoteExportService { client }
    }
}

fn parse_state(raw: &str) -> Result<JobState, ServiceError> {
    raw.parse().map_err(ServiceError)
}

/// One update per recognised entry. An entry with a state this client does
/// not know is logged and dropped, which leaves that job unchanged for the
/// round; the other entries still apply.
fn status_updates(response: StatusResponse) -> Vec<StatusUpdate> {
    response
        .statuses
        .into_iter()
        .filter_map(|entry| match parse_state(&entry.state) {
            Ok(state) => Some(StatusUpdate {
                job_id: entry.job_handle,
                state,
                error_message: entry.error_message,
            }),
            Err(e) => {
                warn!("{}: {}", entry.job_handle, e);
                None
            }
        })
        .collect()
}

#[async_trait]
impl<'a> ExportService for RemoteExportService<'a> {
    async fn submit(&self, request: &ExportRequest) -> Result<JobHandle, ServiceError> {
        let response: SubmitResponse = self.client.post_json("v1/exports", request).await?;
        let state = match response.state.as_deref().map(parse_state) {
            Some(Ok(state)) => state,
            Some(Err(e)) => {
                warn!("{}: {}", response.job_handle, e);
                JobState::Submitted
            }
            None => JobState::Submitted,
        };
        Ok(JobHandle {
            job_id: response.job_handle,
            state,
        })
    }

    async fn status(&self, job_ids: &[String]) -> Result<Vec<StatusUpdate>, ServiceError> {
        let response: StatusResponse = self
            .client
            .post_json("v1/exports:status", &StatusRequest { handles: job_ids })
            .await?;
        Ok(status_updates(response))
    }

    async fn cancel(&self, job_id: &str) -> Result<(), ServiceError> {
        let path = format!("v1/exports/{job_id}:cancel");
        self.client.post(&path, &()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_response_shape() {
        let body = r#"{"statuses":[
            {"job_handle":"T1","state":"READY"},
            {"job_handle":"T2","state":"FAILED","error_message":"Quota exceeded"}
        ]}"#;
        let response: StatusResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.statuses.len(), 2);
        assert_eq!(parse_state(&response.statuses[0].state).unwrap(), JobState::Queued);
        assert_eq!(
            response.statuses[1].error_message.as_deref(),
            Some("Quota exceeded")
        );
    }

    #[test]
    fn test_unknown_state_is_an_error() {
        assert!(parse_state("MELTED").is_err());
    }

    #[test]
    fn test_unknown_state_leaves_sibling_updates() {
        let body = r#"{"statuses":[
            {"job_handle":"T1","state":"COMPLETED"},
            {"job_handle":"T2","state":"SUSPENDED"},
            {"job_handle":"T3","state":"FAILED","error_message":"User memory limit exceeded."}
        ]}"#;
        let updates = status_updates(serde_json::from_str(body).unwrap());
        assert_eq!(
            updates,
            vec![
                StatusUpdate {
                    job_id: "T1".to_string(),
                    state: JobState::Completed,
                    error_message: None,
                },
                StatusUpdate {
                    job_id: "T3".to_string(),
                    state: JobState::Failed,
                    error_message: Some("User memory limit exceeded.".to_string()),
                },
            ]
        );
    }

    #[test]
    fn test_remote_error_keeps_provider_text() {
        let err = RemoteError::Status {
            url: "http://localhost/v1/exports".to_string(),
            status: 429,
            message: "Quota exceeded".to_string(),
        };
        assert_eq!(ServiceError::from(err), ServiceError("Quota exceeded".to_string()));
    }
}
