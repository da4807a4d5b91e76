// src/workflow/http.rs

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        leave::LeaveStatus,
        workflow::{Submission, SubmitReceipt},
    },
    workflow::WorkflowAdapter,
};

const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: LeaveStatus,
}

/// Client for the external workflow system's REST interface.
#[derive(Debug, Clone)]
pub struct HttpWorkflowClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpWorkflowClient {
    pub fn new(
        base_url: &str,
        api_key: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            let value = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|e| anyhow::anyhow!("invalid workflow API key header value: {e}"))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build workflow HTTP client: {e}"))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn read_json<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::adapter(format!("workflow system returned {status}: {body}")));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| AppError::adapter(format!("unreadable workflow response: {e}")))
    }
}

fn transport(e: reqwest::Error) -> AppError {
    if e.is_timeout() {
        AppError::adapter("workflow request timed out")
    } else {
        AppError::adapter(format!("workflow request failed: {e}"))
    }
}

#[async_trait]
impl WorkflowAdapter for HttpWorkflowClient {
    async fn submit(&self, submission: &Submission) -> Result<SubmitReceipt, AppError> {
        let response = self
            .client
            .post(format!("{}/leave-requests", self.base_url))
            .header(IDEMPOTENCY_HEADER, submission.idempotency_key())
            .json(submission)
            .send()
            .await
            .map_err(transport)?;

        tracing::debug!(
            leave_request_id = %submission.leave_request_id,
            status = %response.status(),
            "workflow submission answered"
        );
        Self::read_json(response).await
    }

    async fn poll_status(&self, leave_request_id: Uuid) -> Result<LeaveStatus, AppError> {
        let response = self
            .client
            .get(format!("{}/leave-requests/{leave_request_id}/status", self.base_url))
            .send()
            .await
            .map_err(transport)?;

        let body: StatusResponse = Self::read_json(response).await?;
        Ok(body.status)
    }
}
