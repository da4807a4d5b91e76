// src/models/workflow.rs

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::leave::{LeaveRequest, LeaveStatus, LeaveType};

/// Which in-system step a submission reports to the external system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "submission_stage", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionStage {
    Initial,
    SupervisorApproved,
    HrApproved,
}

impl SubmissionStage {
    /// External status a record enters when this stage is acknowledged.
    pub fn entry_status(self) -> LeaveStatus {
        match self {
            SubmissionStage::Initial => LeaveStatus::PendingExternal,
            SubmissionStage::SupervisorApproved => LeaveStatus::PendingHr,
            SubmissionStage::HrApproved => LeaveStatus::ApprovedHr,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SubmissionStage::Initial => "INITIAL",
            SubmissionStage::SupervisorApproved => "SUPERVISOR_APPROVED",
            SubmissionStage::HrApproved => "HR_APPROVED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub leave_request_id: Uuid,
    pub employee_id: Uuid,
    pub leave_type: LeaveType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub stage: SubmissionStage,
}

impl Submission {
    pub fn new(request: &LeaveRequest, stage: SubmissionStage) -> Self {
        Self {
            leave_request_id: request.id,
            employee_id: request.employee_id,
            leave_type: request.leave_type,
            start_date: request.start_date,
            end_date: request.end_date,
            stage,
        }
    }

    pub fn idempotency_key(&self) -> String {
        format!("{}:{}", self.leave_request_id, self.stage.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReceipt {
    pub external_id: String,
    pub message: String,
}

/// Adapter-side mapping from a leave request to its external transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalRecord {
    pub leave_request_id: Uuid,
    pub external_id: String,
    pub status: LeaveStatus,
}

/// One observation of the external system's progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Hold,
    Advance,
    Reject,
    Expedite,
}

/// Next external status along the approval chain. Terminal statuses never move.
pub fn advance(status: LeaveStatus, step: Step) -> LeaveStatus {
    if status.is_terminal() || step == Step::Hold {
        return status;
    }
    match status {
        LeaveStatus::PendingExternal => LeaveStatus::PendingSupervisor,
        LeaveStatus::PendingSupervisor => match step {
            Step::Reject => LeaveStatus::RejectedSupervisor,
            _ => LeaveStatus::ApprovedSupervisor,
        },
        LeaveStatus::ApprovedSupervisor => match step {
            Step::Expedite => LeaveStatus::ApprovedHr,
            _ => LeaveStatus::PendingHr,
        },
        LeaveStatus::PendingHr => match step {
            Step::Reject => LeaveStatus::RejectedHr,
            _ => LeaveStatus::FinalApproved,
        },
        LeaveStatus::ApprovedHr => LeaveStatus::FinalApproved,
        other => other,
    }
}
