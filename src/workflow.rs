// src/workflow.rs

pub mod http;
pub mod memory;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        leave::LeaveStatus,
        workflow::{Submission, SubmitReceipt},
    },
};

pub use http::HttpWorkflowClient;
pub use memory::InMemoryWorkflow;

/// External leave-validation system, reached by submit-then-poll.
#[async_trait]
pub trait WorkflowAdapter: Send + Sync {
    /// Registers the submission. Resubmitting the same request never creates
    /// a second external record.
    async fn submit(&self, submission: &Submission) -> Result<SubmitReceipt, AppError>;

    /// Current external status of the request. May or may not have moved
    /// since the previous poll.
    async fn poll_status(&self, leave_request_id: Uuid) -> Result<LeaveStatus, AppError>;
}
