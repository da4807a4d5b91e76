// src/models/leave.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::models::workflow::SubmissionStage;

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "leave_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeaveType {
    AnnualLeave,
    AuthorizedAbsence,
    InsufficientBalance,
}

impl LeaveType {
    pub const ALL: [LeaveType; 3] = [
        LeaveType::AnnualLeave,
        LeaveType::AuthorizedAbsence,
        LeaveType::InsufficientBalance,
    ];

    /// Only annual leave is paid out of the employee's leave balance.
    pub fn requires_balance(self) -> bool {
        matches!(self, LeaveType::AnnualLeave)
    }

    pub fn label(self) -> &'static str {
        match self {
            LeaveType::AnnualLeave => "Annual Leave",
            LeaveType::AuthorizedAbsence => "Authorized Absence",
            LeaveType::InsufficientBalance => "Leave With Insufficient Balance",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveTypeInfo {
    pub code: LeaveType,
    pub label: &'static str,
    pub requires_balance: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "leave_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeaveStatus {
    PendingExternal,
    PendingSupervisor,
    ApprovedSupervisor,
    RejectedSupervisor,
    PendingHr,
    ApprovedHr,
    RejectedHr,
    FinalApproved,
    Rejected,
}

impl LeaveStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            LeaveStatus::Rejected
                | LeaveStatus::RejectedSupervisor
                | LeaveStatus::RejectedHr
                | LeaveStatus::FinalApproved
        )
    }

    pub fn is_rejection(self) -> bool {
        matches!(
            self,
            LeaveStatus::Rejected | LeaveStatus::RejectedSupervisor | LeaveStatus::RejectedHr
        )
    }

    /// Position along the approval chain. Terminal statuses share the last rank.
    pub fn progress_rank(self) -> u8 {
        match self {
            LeaveStatus::PendingExternal => 0,
            LeaveStatus::PendingSupervisor => 1,
            LeaveStatus::ApprovedSupervisor => 2,
            LeaveStatus::PendingHr => 3,
            LeaveStatus::ApprovedHr => 4,
            LeaveStatus::RejectedSupervisor
            | LeaveStatus::RejectedHr
            | LeaveStatus::FinalApproved
            | LeaveStatus::Rejected => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LeaveStatus::PendingExternal => "PENDING_EXTERNAL",
            LeaveStatus::PendingSupervisor => "PENDING_SUPERVISOR",
            LeaveStatus::ApprovedSupervisor => "APPROVED_SUPERVISOR",
            LeaveStatus::RejectedSupervisor => "REJECTED_SUPERVISOR",
            LeaveStatus::PendingHr => "PENDING_HR",
            LeaveStatus::ApprovedHr => "APPROVED_HR",
            LeaveStatus::RejectedHr => "REJECTED_HR",
            LeaveStatus::FinalApproved => "FINAL_APPROVED",
            LeaveStatus::Rejected => "REJECTED",
        }
    }
}

impl std::fmt::Display for LeaveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Leave request ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LeaveRequest {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub supervisor_id: Uuid,
    pub hr_admin_id: Uuid,
    pub leave_type: LeaveType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: LeaveStatus,
    pub reason: Option<String>,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub review_notes: Option<String>,
    // Transaction id assigned by the external workflow system.
    pub external_id: Option<String>,
    // Stage still waiting for an external acknowledgment, if any.
    pub pending_submission: Option<SubmissionStage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LeaveRequest {
    /// Inclusive number of calendar days covered.
    pub fn day_count(&self) -> i64 {
        inclusive_days(self.start_date, self.end_date)
    }
}

pub fn inclusive_days(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days() + 1
}

/// Row handed to the repository on creation.
#[derive(Debug, Clone)]
pub struct NewLeaveRequest {
    pub employee_id: Uuid,
    pub supervisor_id: Uuid,
    pub hr_admin_id: Uuid,
    pub leave_type: LeaveType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub reviewed_by: Uuid,
    pub reviewed_at: DateTime<Utc>,
    pub notes: Option<String>,
}

impl Review {
    pub fn now(reviewer: Uuid, notes: Option<String>) -> Self {
        Self {
            reviewed_by: reviewer,
            reviewed_at: Utc::now(),
            notes,
        }
    }
}

/// Partial update applied by a compare-and-set on the current status.
/// `None` leaves the column untouched. A review replaces all three review
/// columns, notes included.
#[derive(Debug, Clone, Default)]
pub struct LeaveChange {
    pub status: Option<LeaveStatus>,
    pub hr_admin_id: Option<Uuid>,
    pub review: Option<Review>,
    pub pending_submission: Option<SubmissionStage>,
    // External id returned by an acknowledged submission. Clears `pending_submission`.
    pub acknowledged: Option<String>,
    // Drops any unsent submission; set when the request settles locally.
    pub discard_submission: bool,
}

impl LeaveChange {
    pub fn status(status: LeaveStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn acknowledged(external_id: String) -> Self {
        Self {
            acknowledged: Some(external_id),
            ..Self::default()
        }
    }

    pub fn apply(&self, request: &mut LeaveRequest) {
        if let Some(status) = self.status {
            request.status = status;
        }
        if let Some(hr_admin_id) = self.hr_admin_id {
            request.hr_admin_id = hr_admin_id;
        }
        if let Some(review) = &self.review {
            request.reviewed_by = Some(review.reviewed_by);
            request.reviewed_at = Some(review.reviewed_at);
            request.review_notes = review.notes.clone();
        }
        if let Some(stage) = self.pending_submission {
            request.pending_submission = Some(stage);
        }
        if let Some(external_id) = &self.acknowledged {
            request.external_id = Some(external_id.clone());
            request.pending_submission = None;
        }
        if self.discard_submission {
            request.pending_submission = None;
        }
        request.updated_at = Utc::now();
    }
}

// --- DTOs ---

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateLeaveRequest {
    pub leave_type: LeaveType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub supervisor_id: Uuid,
    pub hr_admin_id: Uuid,
    #[validate(length(max = 1000, message = "reason must be at most 1000 characters"))]
    pub reason: Option<String>,
}

/// Query filter shared by every listing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveFilter {
    pub status: Option<LeaveStatus>,
    pub employee_id: Option<Uuid>,
    pub supervisor_id: Option<Uuid>,
    pub hr_admin_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub oldest_first: bool,
}

impl LeaveFilter {
    pub fn for_employee(employee_id: Uuid) -> Self {
        Self {
            employee_id: Some(employee_id),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: LeaveStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn matches(&self, request: &LeaveRequest) -> bool {
        if self.status.is_some_and(|s| s != request.status) {
            return false;
        }
        if self.employee_id.is_some_and(|id| id != request.employee_id) {
            return false;
        }
        if self.supervisor_id.is_some_and(|id| id != request.supervisor_id) {
            return false;
        }
        if self.hr_admin_id.is_some_and(|id| id != request.hr_admin_id) {
            return false;
        }
        match (self.start_date, self.end_date) {
            (Some(from), Some(to)) => request.start_date >= from && request.start_date <= to,
            (Some(from), None) => request.start_date >= from,
            (None, Some(to)) => request.end_date <= to,
            (None, None) => true,
        }
    }
}
