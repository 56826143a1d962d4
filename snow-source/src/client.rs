//! Explicitly constructed client for the remote image/time-series service.
//!
//! The client is built once from [`ApiConfig`] and passed by reference to
//! every source and to the export orchestrator; there is no global state.

use log::debug;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable consulted when no token is configured.
pub const TOKEN_ENV_VAR: &str = "SNOW_API_TOKEN";

/// Connection settings for the remote service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub project: Option<String>,
    /// JSON key file holding `project_id` and `client_email`.
    pub service_account: Option<PathBuf>,
    pub token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            base_url: "http://localhost:8080".to_string(),
            project: None,
            service_account: None,
            token: None,
            timeout_secs: 60,
        }
    }
}

/// The parts of a service-account key file we use.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServiceAccount {
    pub client_email: String,
    pub project_id: String,
}

impl ServiceAccount {
    pub fn from_file(path: &Path) -> Result<Self, ClientError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ClientError::ServiceAccountRead(path.to_path_buf(), e))?;
        serde_json::from_str(&text)
            .map_err(|e| ClientError::ServiceAccountFormat(path.to_path_buf(), e))
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Failed to read service account key '{0}'")]
    ServiceAccountRead(PathBuf, #[source] std::io::Error),

    #[error("Malformed service account key '{0}'")]
    ServiceAccountFormat(PathBuf, #[source] serde_json::Error),

    #[error("No project configured and no service account key to read it from")]
    MissingProject,

    #[error("Failed to build HTTP client")]
    Http(#[from] reqwest::Error),
}

/// A failed call to the remote service. `message` is the provider's own
/// error text, unmodified.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RemoteError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("{url} returned {status}: {message}")]
    Status {
        url: String,
        status: u16,
        message: String,
    },

    #[error("unexpected response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl RemoteError {
    /// The provider-facing message without the URL decoration.
    pub fn message(&self) -> &str {
        match self {
            RemoteError::Transport { message, .. }
            | RemoteError::Status { message, .. }
            | RemoteError::Decode { message, .. } => message,
        }
    }
}

/// Pull a human message out of an error body: `{"error":{"message":..}}`,
/// `{"error":".."}`, or the raw text.
pub fn provider_message(body: &str) -> String {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ErrorField {
        Nested { message: String },
        Plain(String),
    }
    #[derive(Deserialize)]
    struct ErrorBody {
        error: ErrorField,
    }
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            error: ErrorField::Nested { message },
        })
        | Ok(ErrorBody {
            error: ErrorField::Plain(message),
        }) => message,
        Err(_) => body.trim().to_string(),
    }
}

/// Authenticated JSON client for the remote service.
#[derive(Debug, Clone)]
pub struct RemoteClient {
    http: Client,
    base_url: String,
    project: String,
    token: Option<String>,
}

impl RemoteClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ClientError> {
        let project = match (&config.project, &config.service_account) {
            (Some(project), _) => project.clone(),
            (None, Some(path)) => ServiceAccount::from_file(path)?.project_id,
            (None, None) => return Err(ClientError::MissingProject),
        };
        let token = config
            .token
            .clone()
            .or_else(|| std::env::var(TOKEN_ENV_VAR).ok());
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(RemoteClient {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            project,
            token,
        })
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    /// The underlying HTTP client, shared with unauthenticated feeds.
    pub fn http(&self) -> &Client {
        &self.http
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request.header("X-Project", &self.project);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Body of a successful response; non-2xx statuses become
    /// `RemoteError::Status` carrying the provider's message.
    async fn checked_body(
        url: &str,
        response: Result<reqwest::Response, reqwest::Error>,
    ) -> Result<String, RemoteError> {
        let transport = |e: reqwest::Error| RemoteError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        };
        let response = response.map_err(transport)?;
        let status = response.status();
        let body = response.text().await.map_err(transport)?;
        if !status.is_success() {
            return Err(RemoteError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                message: provider_message(&body),
            });
        }
        Ok(body)
    }

    async fn finish<T: DeserializeOwned>(
        url: String,
        response: Result<reqwest::Response, reqwest::Error>,
    ) -> Result<T, RemoteError> {
        let body = Self::checked_body(&url, response).await?;
        serde_json::from_str(&body).map_err(|e| RemoteError::Decode {
            url,
            message: e.to_string(),
        })
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, RemoteError> {
        let url = self.url(path);
        debug!("GET {url}");
        let response = self.authorize(self.http.get(&url)).send().await;
        Self::finish(url, response).await
    }

    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, RemoteError> {
        let url = self.url(path);
        debug!("POST {url}");
        let response = self.authorize(self.http.post(&url)).json(body).send().await;
        Self::finish(url, response).await
    }

    /// POST where only the status matters; any response body, including
    /// an empty one, is ignored.
    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<(), RemoteError> {
        let url = self.url(path);
        debug!("POST {url}");
        let response = self.authorize(self.http.post(&url)).json(body).send().await;
        Self::checked_body(&url, response).await.map(|_| ())
    }
}
