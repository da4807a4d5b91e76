// src/services/leave_service.rs

use std::{future::Future, sync::Arc, time::Duration};

use chrono::NaiveDate;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    db::{LeaveRepository, UserDirectory},
    models::{
        leave::{
            CreateLeaveRequest, LeaveChange, LeaveFilter, LeaveRequest, LeaveStatus, LeaveType,
            LeaveTypeInfo, NewLeaveRequest, Review, inclusive_days,
        },
        notification::{NewNotification, Severity},
        user::Role,
        workflow::{Submission, SubmissionStage},
    },
    services::{
        notifications::{NotificationSink, deliver},
        overlap::{self, overlap_error},
    },
    workflow::WorkflowAdapter,
};

pub const DEFAULT_ADAPTER_TIMEOUT: Duration = Duration::from_secs(10);

/// Drives leave requests from submission to a terminal status and keeps
/// them in step with the external workflow system.
#[derive(Clone)]
pub struct LeaveService {
    leaves: Arc<dyn LeaveRepository>,
    users: Arc<dyn UserDirectory>,
    workflow: Arc<dyn WorkflowAdapter>,
    notifier: Arc<dyn NotificationSink>,
    adapter_timeout: Duration,
}

impl LeaveService {
    pub fn new(
        leaves: Arc<dyn LeaveRepository>,
        users: Arc<dyn UserDirectory>,
        workflow: Arc<dyn WorkflowAdapter>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            leaves,
            users,
            workflow,
            notifier,
            adapter_timeout: DEFAULT_ADAPTER_TIMEOUT,
        }
    }

    pub fn with_adapter_timeout(mut self, timeout: Duration) -> Self {
        self.adapter_timeout = timeout;
        self
    }

    // =========================================================================
    //  CATALOGUE & VALIDATION
    // =========================================================================

    pub fn leave_types(&self) -> Vec<LeaveTypeInfo> {
        LeaveType::ALL
            .iter()
            .map(|&code| LeaveTypeInfo {
                code,
                label: code.label(),
                requires_balance: code.requires_balance(),
            })
            .collect()
    }

    pub async fn has_overlap(
        &self,
        employee_id: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
        exclude_id: Option<Uuid>,
    ) -> Result<bool, AppError> {
        let existing = self.leaves.for_employee(employee_id).await?;
        Ok(overlap::has_overlap(&existing, employee_id, start_date, end_date, exclude_id))
    }

    /// The account must exist, be active, hold `role` and not be the requester.
    async fn ensure_reviewer(
        &self,
        reviewer_id: Uuid,
        employee_id: Uuid,
        role: Role,
        label: &str,
    ) -> Result<(), AppError> {
        if reviewer_id == employee_id {
            return Err(AppError::validation(format!(
                "You cannot assign yourself as {label}"
            )));
        }

        let reviewer = self.users.resolve_user(reviewer_id).await?;
        match reviewer {
            Some(account) if account.role == role && account.is_active => Ok(()),
            _ => Err(AppError::validation(format!("Invalid {label} selected"))),
        }
    }

    // =========================================================================
    //  CREATION
    // =========================================================================

    pub async fn create_leave_request(
        &self,
        employee_id: Uuid,
        payload: CreateLeaveRequest,
    ) -> Result<LeaveRequest, AppError> {
        payload.validate()?;

        // 1. Date range
        if payload.end_date < payload.start_date {
            return Err(AppError::validation("End date must be on or after start date"));
        }

        // 2. Overlap with the employee's active requests
        if self
            .has_overlap(employee_id, payload.start_date, payload.end_date, None)
            .await?
        {
            return Err(overlap_error());
        }

        // 3. Leave balance, for the types that consume it
        if payload.leave_type.requires_balance() {
            let employee = self
                .users
                .resolve_user(employee_id)
                .await?
                .ok_or_else(|| AppError::not_found(format!("employee {employee_id}")))?;

            let days = inclusive_days(payload.start_date, payload.end_date);
            if employee.leave_balance < days {
                return Err(AppError::InsufficientBalance {
                    available: employee.leave_balance,
                    requested: days,
                });
            }
        }

        // 4-5. Assigned reviewers
        self.ensure_reviewer(payload.supervisor_id, employee_id, Role::Supervisor, "supervisor")
            .await?;
        self.ensure_reviewer(payload.hr_admin_id, employee_id, Role::HrAdmin, "HR admin")
            .await?;

        // 6. Persist; the repository repeats the overlap check under its lock
        let created = self
            .leaves
            .insert_if_no_overlap(NewLeaveRequest {
                employee_id,
                supervisor_id: payload.supervisor_id,
                hr_admin_id: payload.hr_admin_id,
                leave_type: payload.leave_type,
                start_date: payload.start_date,
                end_date: payload.end_date,
                reason: payload.reason,
            })
            .await?;

        tracing::info!(
            leave_request_id = %created.id,
            %employee_id,
            leave_type = ?created.leave_type,
            "leave request created"
        );

        // 7. Hand off to the external system; failure leaves it pending
        Ok(self.push_submission(created).await)
    }

    // =========================================================================
    //  QUERIES
    // =========================================================================

    pub async fn get_leave_request(&self, id: Uuid) -> Result<LeaveRequest, AppError> {
        self.leaves
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("leave request {id}")))
    }

    /// The employee's requests, newest first. Reconciles the unsettled ones
    /// before reading.
    pub async fn list_my_leave_requests(
        &self,
        employee_id: Uuid,
        filter: LeaveFilter,
    ) -> Result<Vec<LeaveRequest>, AppError> {
        for request in self.leaves.for_employee(employee_id).await? {
            if !request.status.is_terminal() {
                self.reconcile_request(request).await?;
            }
        }

        let filter = LeaveFilter {
            employee_id: Some(employee_id),
            oldest_first: false,
            ..filter
        };
        self.leaves.list(&filter).await
    }

    pub async fn pending_for_supervisor(
        &self,
        supervisor_id: Uuid,
    ) -> Result<Vec<LeaveRequest>, AppError> {
        let filter = LeaveFilter {
            supervisor_id: Some(supervisor_id),
            oldest_first: true,
            ..LeaveFilter::default()
        }
        .with_status(LeaveStatus::PendingSupervisor);
        self.leaves.list(&filter).await
    }

    pub async fn pending_for_hr(&self, hr_admin_id: Uuid) -> Result<Vec<LeaveRequest>, AppError> {
        let filter = LeaveFilter {
            hr_admin_id: Some(hr_admin_id),
            oldest_first: true,
            ..LeaveFilter::default()
        }
        .with_status(LeaveStatus::PendingHr);
        self.leaves.list(&filter).await
    }

    pub async fn team_requests(
        &self,
        supervisor_id: Uuid,
        filter: LeaveFilter,
    ) -> Result<Vec<LeaveRequest>, AppError> {
        let filter = LeaveFilter {
            supervisor_id: Some(supervisor_id),
            oldest_first: false,
            ..filter
        };
        self.leaves.list(&filter).await
    }

    pub async fn all_requests(&self, filter: LeaveFilter) -> Result<Vec<LeaveRequest>, AppError> {
        self.leaves.list(&filter).await
    }

    /// Whether `user_id` is the reviewer the request is currently waiting on.
    pub async fn can_review(&self, user_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let request = self.get_leave_request(id).await?;
        if request.employee_id == user_id {
            return Ok(false);
        }

        let Some(user) = self.users.resolve_user(user_id).await? else {
            return Ok(false);
        };

        Ok(match request.status {
            LeaveStatus::PendingSupervisor => {
                request.supervisor_id == user_id && user.role == Role::Supervisor
            }
            LeaveStatus::PendingHr => request.hr_admin_id == user_id && user.role == Role::HrAdmin,
            _ => false,
        })
    }

    // =========================================================================
    //  REVIEWER ACTIONS
    // =========================================================================

    pub async fn approve_by_supervisor(
        &self,
        id: Uuid,
        supervisor_id: Uuid,
        assign_hr_id: Uuid,
        notes: Option<String>,
    ) -> Result<LeaveRequest, AppError> {
        let request = self.get_leave_request(id).await?;

        if request.supervisor_id != supervisor_id {
            return Err(AppError::forbidden(
                "Only the assigned supervisor can approve this request",
            ));
        }
        expect_status(&request, LeaveStatus::PendingSupervisor)?;
        self.ensure_reviewer(assign_hr_id, request.employee_id, Role::HrAdmin, "HR admin")
            .await?;

        let updated = self
            .leaves
            .update_if_status(
                id,
                LeaveStatus::PendingSupervisor,
                LeaveChange {
                    status: Some(LeaveStatus::PendingHr),
                    hr_admin_id: Some(assign_hr_id),
                    review: Some(Review::now(supervisor_id, notes)),
                    pending_submission: Some(SubmissionStage::SupervisorApproved),
                    acknowledged: None,
                    discard_submission: false,
                },
            )
            .await?;

        tracing::info!(leave_request_id = %id, %supervisor_id, hr_admin_id = %assign_hr_id, "approved by supervisor");

        deliver(
            self.notifier.as_ref(),
            NewNotification {
                employee_id: assign_hr_id,
                title: "Leave Request Awaiting HR Approval".into(),
                message: format!(
                    "A leave request from {} to {} needs your review.",
                    updated.start_date, updated.end_date
                ),
                severity: Severity::Info,
            },
        )
        .await;

        Ok(self.push_submission(updated).await)
    }

    pub async fn approve_by_hr(
        &self,
        id: Uuid,
        hr_admin_id: Uuid,
        notes: Option<String>,
    ) -> Result<LeaveRequest, AppError> {
        let request = self.get_leave_request(id).await?;

        if request.hr_admin_id != hr_admin_id {
            return Err(AppError::forbidden(
                "Only the assigned HR admin can approve this request",
            ));
        }
        expect_status(&request, LeaveStatus::PendingHr)?;

        // Final confirmation comes back from the external system
        let updated = self
            .leaves
            .update_if_status(
                id,
                LeaveStatus::PendingHr,
                LeaveChange {
                    status: Some(LeaveStatus::PendingExternal),
                    review: Some(Review::now(hr_admin_id, notes)),
                    pending_submission: Some(SubmissionStage::HrApproved),
                    ..LeaveChange::default()
                },
            )
            .await?;

        tracing::info!(leave_request_id = %id, %hr_admin_id, "approved by HR");
        Ok(self.push_submission(updated).await)
    }

    pub async fn reject_leave_request(
        &self,
        id: Uuid,
        reviewer_id: Uuid,
        notes: Option<String>,
    ) -> Result<LeaveRequest, AppError> {
        let request = self.get_leave_request(id).await?;

        if request.employee_id == reviewer_id {
            return Err(AppError::forbidden("You cannot reject your own leave request"));
        }

        let assigned = match request.status {
            LeaveStatus::PendingSupervisor => request.supervisor_id,
            LeaveStatus::PendingHr => request.hr_admin_id,
            other => {
                return Err(AppError::conflict(format!(
                    "leave request {id} is {other} and cannot be rejected"
                )));
            }
        };
        if assigned != reviewer_id {
            return Err(AppError::forbidden(
                "Only the reviewer assigned to this stage can reject the request",
            ));
        }

        let reason = notes.clone().unwrap_or_else(|| "No reason provided".to_string());
        let updated = self
            .leaves
            .update_if_status(
                id,
                request.status,
                LeaveChange {
                    status: Some(LeaveStatus::Rejected),
                    review: Some(Review::now(reviewer_id, notes)),
                    discard_submission: true,
                    ..LeaveChange::default()
                },
            )
            .await?;

        tracing::info!(leave_request_id = %id, %reviewer_id, from = %request.status, "leave request rejected");

        deliver(
            self.notifier.as_ref(),
            NewNotification {
                employee_id: updated.employee_id,
                title: "Leave Request Rejected".into(),
                message: format!("Your leave request has been rejected. Reason: {reason}"),
                severity: Severity::Warning,
            },
        )
        .await;

        Ok(updated)
    }

    // =========================================================================
    //  RECONCILIATION
    // =========================================================================

    /// Reconciles one request and returns its current state.
    pub async fn reconcile(&self, id: Uuid) -> Result<LeaveRequest, AppError> {
        let request = self.get_leave_request(id).await?;
        let (request, _) = self.reconcile_request(request).await?;
        Ok(request)
    }

    /// Background pass over every unsettled request. Returns how many changed status.
    pub async fn reconcile_unsettled(&self) -> Result<usize, AppError> {
        let mut changed = 0;
        for request in self.leaves.list_unsettled().await? {
            let id = request.id;
            match self.reconcile_request(request).await {
                Ok((_, true)) => changed += 1,
                Ok((_, false)) => {}
                Err(e) => tracing::warn!(leave_request_id = %id, error = %e, "reconciliation failed"),
            }
        }
        Ok(changed)
    }

    async fn reconcile_request(
        &self,
        request: LeaveRequest,
    ) -> Result<(LeaveRequest, bool), AppError> {
        if request.status.is_terminal() {
            return Ok((request, false));
        }

        // 1. An unacknowledged submission goes first; no poll until it lands
        let request = self.push_submission(request).await;
        if request.pending_submission.is_some() || request.external_id.is_none() {
            return Ok((request, false));
        }

        // 2. Ask the external system
        let external = match self.call_adapter(self.workflow.poll_status(request.id)).await {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(leave_request_id = %request.id, error = %e, "workflow poll failed");
                return Ok((request, false));
            }
        };

        if external == request.status {
            tracing::debug!(leave_request_id = %request.id, status = %external, "no external progress");
            return Ok((request, false));
        }
        if external.progress_rank() < request.status.progress_rank() {
            tracing::warn!(
                leave_request_id = %request.id,
                local = %request.status,
                external = %external,
                "ignoring external status behind local status"
            );
            return Ok((request, false));
        }

        // 3. Merge, unless someone moved the request meanwhile
        let updated = match self
            .leaves
            .update_if_status(request.id, request.status, LeaveChange::status(external))
            .await
        {
            Ok(updated) => updated,
            Err(AppError::Conflict(reason)) => {
                tracing::warn!(leave_request_id = %request.id, %reason, "reconciliation lost a race");
                return Ok((self.get_leave_request(request.id).await?, false));
            }
            Err(e) => return Err(e),
        };

        tracing::info!(
            leave_request_id = %updated.id,
            from = %request.status,
            to = %updated.status,
            "external status merged"
        );

        if updated.status.is_terminal() {
            self.notify_outcome(&updated).await;
        }
        Ok((updated, true))
    }

    async fn notify_outcome(&self, request: &LeaveRequest) {
        let (title, verdict, severity) = if request.status.is_rejection() {
            ("Leave Request Rejected", "was rejected", Severity::Warning)
        } else {
            ("Leave Request Approved", "has been approved", Severity::Success)
        };

        deliver(
            self.notifier.as_ref(),
            NewNotification {
                employee_id: request.employee_id,
                title: title.into(),
                message: format!(
                    "Your leave request from {} to {} {verdict}.",
                    request.start_date, request.end_date
                ),
                severity,
            },
        )
        .await;
    }

    // =========================================================================
    //  EXTERNAL SUBMISSION
    // =========================================================================

    async fn call_adapter<T>(
        &self,
        call: impl Future<Output = Result<T, AppError>>,
    ) -> Result<T, AppError> {
        tokio::time::timeout(self.adapter_timeout, call)
            .await
            .map_err(|_| AppError::adapter("workflow call timed out"))?
    }

    /// Sends the pending stage, if any. Never fails: an unacknowledged
    /// submission stays pending for the next reconciliation.
    async fn push_submission(&self, request: LeaveRequest) -> LeaveRequest {
        let Some(stage) = request.pending_submission else {
            return request;
        };

        let submission = Submission::new(&request, stage);
        let receipt = match self.call_adapter(self.workflow.submit(&submission)).await {
            Ok(receipt) => receipt,
            Err(e) => {
                tracing::warn!(
                    leave_request_id = %request.id,
                    stage = stage.as_str(),
                    error = %e,
                    "workflow submission failed, left pending"
                );
                return request;
            }
        };

        match self
            .leaves
            .update_if_status(
                request.id,
                request.status,
                LeaveChange::acknowledged(receipt.external_id),
            )
            .await
        {
            Ok(updated) => {
                tracing::info!(
                    leave_request_id = %updated.id,
                    stage = stage.as_str(),
                    external_id = updated.external_id.as_deref().unwrap_or_default(),
                    "workflow submission acknowledged"
                );
                updated
            }
            Err(e) => {
                tracing::warn!(
                    leave_request_id = %request.id,
                    error = %e,
                    "could not record workflow acknowledgment"
                );
                request
            }
        }
    }
}

fn expect_status(request: &LeaveRequest, expected: LeaveStatus) -> Result<(), AppError> {
    if request.status != expected {
        return Err(AppError::conflict(format!(
            "leave request {} is {}, expected {expected}",
            request.id, request.status
        )));
    }
    Ok(())
}
