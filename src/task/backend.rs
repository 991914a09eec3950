//! The remote research executor, as seen from the client.
//!
//! [`ResearchBackend`] is the only seam to the executor: four calls, each of
//! which can fail with a [`BackendError`]. The core is transport-agnostic;
//! [`HttpBackend`] is the production implementation over `reqwest`, and tests
//! substitute scripted fakes.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use super::types::{ResultPayload, StartResponse, StatusSnapshot, TaskId, TaskRequest};
use crate::error::{BackendError, TransientKind};

/// Contract consumed from the research executor.
#[async_trait]
pub trait ResearchBackend: Send + Sync {
    /// Submit a request and return the executor-assigned task id.
    async fn start_task(&self, request: &TaskRequest) -> Result<TaskId, BackendError>;

    async fn get_status(&self, task_id: &str) -> Result<StatusSnapshot, BackendError>;

    async fn get_result(&self, task_id: &str) -> Result<ResultPayload, BackendError>;

    /// Best-effort: callers log failures and never surface them.
    async fn cancel_task(&self, task_id: &str) -> Result<(), BackendError>;
}

/// Which collaborator call produced an HTTP status, since a 400 means
/// different things depending on the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Call {
    Start,
    Status,
    Result,
    Cancel,
}

/// HTTP client for the research service.
pub struct HttpBackend {
    http: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    /// Build a client rooted at `base_url` with a per-request timeout.
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| BackendError::Transient {
                kind: TransientKind::Network,
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/research/{path}", self.base_url)
    }

    async fn expect_json<T: DeserializeOwned>(
        response: reqwest::Response,
        call: Call,
        task_id: &str,
    ) -> Result<T, BackendError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_for_status(status, &body, call, task_id));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }
}

#[async_trait]
impl ResearchBackend for HttpBackend {
    async fn start_task(&self, request: &TaskRequest) -> Result<TaskId, BackendError> {
        let response = self
            .http
            .post(self.url("start"))
            .json(request)
            .send()
            .await
            .map_err(send_error)?;
        let started: StartResponse = Self::expect_json(response, Call::Start, "").await?;
        Ok(started.task_id)
    }

    async fn get_status(&self, task_id: &str) -> Result<StatusSnapshot, BackendError> {
        let response = self
            .http
            .get(self.url(&format!("status/{task_id}")))
            .send()
            .await
            .map_err(send_error)?;
        Self::expect_json(response, Call::Status, task_id).await
    }

    async fn get_result(&self, task_id: &str) -> Result<ResultPayload, BackendError> {
        let response = self
            .http
            .get(self.url(&format!("result/{task_id}")))
            .send()
            .await
            .map_err(send_error)?;
        Self::expect_json(response, Call::Result, task_id).await
    }

    async fn cancel_task(&self, task_id: &str) -> Result<(), BackendError> {
        let response = self
            .http
            .post(self.url(&format!("cancel/{task_id}")))
            .send()
            .await
            .map_err(send_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(error_for_status(status, &body, Call::Cancel, task_id))
    }
}

/// Map a transport-level reqwest failure onto the transient taxonomy.
fn send_error(e: reqwest::Error) -> BackendError {
    let kind = if e.is_timeout() {
        TransientKind::Timeout
    } else {
        TransientKind::Network
    };
    BackendError::Transient {
        kind,
        message: e.to_string(),
    }
}

/// Map a non-success HTTP status onto [`BackendError`].
fn error_for_status(status: StatusCode, body: &str, call: Call, task_id: &str) -> BackendError {
    let detail = if body.trim().is_empty() {
        status.to_string()
    } else {
        body.trim().to_string()
    };

    match status {
        StatusCode::BAD_REQUEST if call == Call::Result => BackendError::NotReady {
            task_id: task_id.to_string(),
        },
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            BackendError::Validation(detail)
        }
        StatusCode::NOT_FOUND => BackendError::NotFound {
            task_id: task_id.to_string(),
        },
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => BackendError::Transient {
            kind: TransientKind::Timeout,
            message: detail,
        },
        s if s.is_server_error() => BackendError::Transient {
            kind: TransientKind::Server(s.as_u16()),
            message: detail,
        },
        // Any other client error is not going to improve by retrying.
        _ => BackendError::Validation(detail),
    }
}
