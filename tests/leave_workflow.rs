mod common;

use std::sync::Arc;

use common::{TestApp, date};
use hr_core::{
    common::error::AppError,
    models::{
        leave::{LeaveFilter, LeaveRequest, LeaveStatus, LeaveType},
        notification::Severity,
        user::{Role, UserAccount},
        workflow::{Step, SubmissionStage},
    },
    services::InMemoryNotifications,
};
use uuid::Uuid;

async fn submit(app: &TestApp, start: (u32, u32), end: (u32, u32)) -> LeaveRequest {
    app.leaves
        .create_leave_request(
            app.employee,
            app.request(
                LeaveType::AuthorizedAbsence,
                date(start.0, start.1),
                date(end.0, end.1),
            ),
        )
        .await
        .unwrap()
}

/// Lets the external system move the request to PENDING_SUPERVISOR.
async fn reach_supervisor(app: &TestApp, id: Uuid) -> LeaveRequest {
    app.workflow.script(id, [Step::Advance]).await;
    let request = app.leaves.reconcile(id).await.unwrap();
    assert_eq!(request.status, LeaveStatus::PendingSupervisor);
    request
}

// =========================================================================
//  CREATION
// =========================================================================

#[tokio::test]
async fn annual_leave_beyond_balance_is_rejected_and_not_persisted() {
    let app = TestApp::new().await;
    app.store.set_leave_balance(app.employee, 5).await.unwrap();

    let err = app
        .leaves
        .create_leave_request(
            app.employee,
            app.request(LeaveType::AnnualLeave, date(1, 10), date(1, 15)),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AppError::InsufficientBalance { available: 5, requested: 6 }
    ));
    assert!(app.leaves.all_requests(LeaveFilter::default()).await.unwrap().is_empty());
    assert_eq!(app.workflow.record_count().await, 0);
}

#[tokio::test]
async fn annual_leave_within_balance_is_accepted() {
    let app = TestApp::new().await;
    app.store.set_leave_balance(app.employee, 6).await.unwrap();

    let created = app
        .leaves
        .create_leave_request(
            app.employee,
            app.request(LeaveType::AnnualLeave, date(1, 10), date(1, 15)),
        )
        .await
        .unwrap();
    assert_eq!(created.day_count(), 6);
}

#[tokio::test]
async fn shared_day_is_an_overlap() {
    let app = TestApp::new().await;
    submit(&app, (1, 10), (1, 12)).await;

    let err = app
        .leaves
        .create_leave_request(
            app.employee,
            app.request(LeaveType::AuthorizedAbsence, date(1, 12), date(1, 14)),
        )
        .await
        .unwrap_err();

    assert!(
        matches!(err, AppError::Validation(ref m) if m == "You already have a leave request for this period")
    );
    assert_eq!(app.leaves.all_requests(LeaveFilter::default()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn rejected_request_frees_its_dates() {
    let app = TestApp::new().await;
    let first = submit(&app, (2, 2), (2, 4)).await;
    reach_supervisor(&app, first.id).await;
    app.leaves
        .reject_leave_request(first.id, app.supervisor, Some("busy week".into()))
        .await
        .unwrap();

    let second = submit(&app, (2, 3), (2, 3)).await;
    assert_ne!(second.id, first.id);
    assert!(!app.leaves.has_overlap(app.employee, date(2, 5), date(2, 6), None).await.unwrap());
    assert!(app.leaves.has_overlap(app.employee, date(2, 1), date(2, 3), None).await.unwrap());
}

#[tokio::test]
async fn validation_runs_in_order() {
    let app = TestApp::new().await;
    submit(&app, (3, 1), (3, 5)).await;

    // End before start wins over the overlap
    let mut dto = app.request(LeaveType::AuthorizedAbsence, date(3, 4), date(3, 2));
    let err = app.leaves.create_leave_request(app.employee, dto.clone()).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(ref m) if m.contains("End date")));

    // Overlap wins over the bad reviewer
    dto.start_date = date(3, 2);
    dto.end_date = date(3, 3);
    dto.supervisor_id = app.hr;
    let err = app.leaves.create_leave_request(app.employee, dto).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(ref m) if m.contains("already have")));
}

#[tokio::test]
async fn reviewers_must_hold_the_right_role_and_be_active() {
    let app = TestApp::new().await;
    let retired_hr = app
        .store
        .add_account(UserAccount::new("Old HR", Role::HrAdmin).inactive())
        .await;

    let mut wrong_role = app.request(LeaveType::AuthorizedAbsence, date(4, 1), date(4, 1));
    wrong_role.supervisor_id = app.hr;
    let err = app.leaves.create_leave_request(app.employee, wrong_role).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(ref m) if m.contains("supervisor")));

    let mut myself = app.request(LeaveType::AuthorizedAbsence, date(4, 1), date(4, 1));
    myself.supervisor_id = app.employee;
    let err = app.leaves.create_leave_request(app.employee, myself).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(ref m) if m.contains("yourself")));

    let mut inactive = app.request(LeaveType::AuthorizedAbsence, date(4, 1), date(4, 1));
    inactive.hr_admin_id = retired_hr;
    let err = app.leaves.create_leave_request(app.employee, inactive).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(ref m) if m.contains("HR admin")));

    let mut unknown = app.request(LeaveType::AuthorizedAbsence, date(4, 1), date(4, 1));
    unknown.hr_admin_id = Uuid::new_v4();
    assert!(app.leaves.create_leave_request(app.employee, unknown).await.is_err());
}

#[tokio::test]
async fn oversized_reason_is_invalid_input() {
    let app = TestApp::new().await;
    let mut dto = app.request(LeaveType::AuthorizedAbsence, date(4, 1), date(4, 1));
    dto.reason = Some("x".repeat(1001));

    let err = app.leaves.create_leave_request(app.employee, dto).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));
}

#[tokio::test]
async fn concurrent_overlapping_creations_admit_one() {
    let app = TestApp::new().await;
    let dto = app.request(LeaveType::AuthorizedAbsence, date(5, 4), date(5, 8));

    let (a, b) = tokio::join!(
        app.leaves.create_leave_request(app.employee, dto.clone()),
        app.leaves.create_leave_request(app.employee, dto.clone()),
    );

    assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
    assert_eq!(app.leaves.all_requests(LeaveFilter::default()).await.unwrap().len(), 1);
}

// =========================================================================
//  EXTERNAL SUBMISSION
// =========================================================================

#[tokio::test]
async fn creation_is_acknowledged_by_the_external_system() {
    let app = TestApp::new().await;
    let created = submit(&app, (1, 10), (1, 12)).await;

    assert_eq!(created.status, LeaveStatus::PendingExternal);
    assert_eq!(created.pending_submission, None);
    let external_id = created.external_id.clone().unwrap();
    assert!(external_id.starts_with("EXT-"));

    let record = app.workflow.record(created.id).await.unwrap();
    assert_eq!(record.external_id, external_id);
    assert_eq!(record.status, LeaveStatus::PendingExternal);
}

#[tokio::test]
async fn failed_submission_is_kept_and_retried_on_read() {
    let app = TestApp::new().await;
    app.workflow.fail_next_submissions(1);

    let created = submit(&app, (1, 10), (1, 12)).await;
    assert_eq!(created.status, LeaveStatus::PendingExternal);
    assert_eq!(created.pending_submission, Some(SubmissionStage::Initial));
    assert!(created.external_id.is_none());
    assert_eq!(app.workflow.record_count().await, 0);

    let mine = app
        .leaves
        .list_my_leave_requests(app.employee, LeaveFilter::default())
        .await
        .unwrap();
    assert_eq!(mine.len(), 1);
    assert!(mine[0].external_id.is_some());
    assert_eq!(mine[0].pending_submission, None);
    // Retried, never advanced locally
    assert_eq!(mine[0].status, LeaveStatus::PendingExternal);
    assert_eq!(app.workflow.record_count().await, 1);
}

#[tokio::test]
async fn unacknowledged_request_is_not_polled() {
    let app = TestApp::new().await;
    app.workflow.fail_next_submissions(2);
    let created = submit(&app, (1, 10), (1, 12)).await;
    app.workflow.script(created.id, [Step::Advance]).await;

    // Second failure: still pending, nothing polled
    let request = app.leaves.reconcile(created.id).await.unwrap();
    assert_eq!(request.status, LeaveStatus::PendingExternal);
    assert!(request.pending_submission.is_some());

    // Third try lands, then the scripted step is observed
    let request = app.leaves.reconcile(created.id).await.unwrap();
    assert_eq!(request.status, LeaveStatus::PendingSupervisor);
}

#[tokio::test]
async fn failed_poll_keeps_local_status() {
    let app = TestApp::new().await;
    let created = submit(&app, (1, 10), (1, 12)).await;
    app.workflow.script(created.id, [Step::Advance]).await;
    app.workflow.fail_next_polls(1);

    let request = app.leaves.reconcile(created.id).await.unwrap();
    assert_eq!(request.status, LeaveStatus::PendingExternal);

    let request = app.leaves.reconcile(created.id).await.unwrap();
    assert_eq!(request.status, LeaveStatus::PendingSupervisor);
}

#[tokio::test]
async fn resubmission_reuses_the_external_record() {
    let app = TestApp::new().await;
    let created = submit(&app, (1, 10), (1, 12)).await;
    let external_id = created.external_id.clone();
    reach_supervisor(&app, created.id).await;

    let approved = app
        .leaves
        .approve_by_supervisor(created.id, app.supervisor, app.hr, None)
        .await
        .unwrap();

    assert_eq!(approved.external_id, external_id);
    assert_eq!(approved.pending_submission, None);
    assert_eq!(app.workflow.record_count().await, 1);
    assert_eq!(app.workflow.submission_count(), 2);
    assert_eq!(
        app.workflow.record(created.id).await.unwrap().status,
        LeaveStatus::PendingHr
    );
}

// =========================================================================
//  REVIEWER ACTIONS
// =========================================================================

#[tokio::test]
async fn supervisor_approval_moves_to_hr_with_new_assignee() {
    let app = TestApp::new().await;
    let other_hr = app
        .store
        .add_account(UserAccount::new("Paula HR", Role::HrAdmin))
        .await;
    let created = submit(&app, (1, 10), (1, 12)).await;
    reach_supervisor(&app, created.id).await;

    let approved = app
        .leaves
        .approve_by_supervisor(created.id, app.supervisor, other_hr, Some("ok".into()))
        .await
        .unwrap();

    assert_eq!(approved.status, LeaveStatus::PendingHr);
    assert_eq!(approved.hr_admin_id, other_hr);
    assert_eq!(approved.reviewed_by, Some(app.supervisor));
    assert!(approved.reviewed_at.is_some());
    assert_eq!(approved.review_notes.as_deref(), Some("ok"));

    let pending = app.leaves.pending_for_hr(other_hr).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert!(app.leaves.pending_for_hr(app.hr).await.unwrap().is_empty());

    let sent = app.notifications.sent().await;
    assert!(sent.iter().any(|n| n.employee_id == other_hr && n.severity == Severity::Info));
}

#[tokio::test]
async fn full_approval_path_ends_final_approved() {
    let app = TestApp::new().await;
    let created = submit(&app, (1, 10), (1, 12)).await;
    reach_supervisor(&app, created.id).await;

    app.leaves
        .approve_by_supervisor(created.id, app.supervisor, app.hr, None)
        .await
        .unwrap();
    let hr_approved = app.leaves.approve_by_hr(created.id, app.hr, Some("enjoy".into())).await.unwrap();
    assert_eq!(hr_approved.status, LeaveStatus::PendingExternal);
    assert_eq!(hr_approved.reviewed_by, Some(app.hr));

    // Default step holds: the external confirmation is observed first
    let request = app.leaves.reconcile(created.id).await.unwrap();
    assert_eq!(request.status, LeaveStatus::ApprovedHr);

    app.workflow.script(created.id, [Step::Advance]).await;
    let mine = app
        .leaves
        .list_my_leave_requests(app.employee, LeaveFilter::default())
        .await
        .unwrap();
    assert_eq!(mine[0].status, LeaveStatus::FinalApproved);

    let sent = app.notifications.sent().await;
    assert!(sent.iter().any(|n| n.employee_id == app.employee
        && n.severity == Severity::Success
        && n.title == "Leave Request Approved"));
}

#[tokio::test]
async fn only_assigned_reviewers_may_act() {
    let app = TestApp::new().await;
    let stranger = app
        .store
        .add_account(UserAccount::new("Other Boss", Role::Supervisor))
        .await;
    let created = submit(&app, (1, 10), (1, 12)).await;
    reach_supervisor(&app, created.id).await;

    let err = app
        .leaves
        .approve_by_supervisor(created.id, stranger, app.hr, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = app.leaves.reject_leave_request(created.id, app.employee, None).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    // HR is not the reviewer of this stage yet
    let err = app.leaves.reject_leave_request(created.id, app.hr, None).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = app.leaves.approve_by_hr(created.id, stranger, None).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
}

#[tokio::test]
async fn actions_from_the_wrong_status_conflict() {
    let app = TestApp::new().await;
    let created = submit(&app, (1, 10), (1, 12)).await;

    // Still PENDING_EXTERNAL
    let err = app
        .leaves
        .approve_by_supervisor(created.id, app.supervisor, app.hr, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    reach_supervisor(&app, created.id).await;
    let err = app.leaves.approve_by_hr(created.id, app.hr, None).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn unknown_request_is_not_found() {
    let app = TestApp::new().await;
    let id = Uuid::new_v4();

    assert!(matches!(app.leaves.get_leave_request(id).await, Err(AppError::NotFound(_))));
    assert!(matches!(
        app.leaves.approve_by_supervisor(id, app.supervisor, app.hr, None).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        app.leaves.reject_leave_request(id, app.supervisor, None).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn rejection_is_terminal_and_notifies_employee() {
    let app = TestApp::new().await;
    let created = submit(&app, (1, 10), (1, 12)).await;
    reach_supervisor(&app, created.id).await;

    let rejected = app
        .leaves
        .reject_leave_request(created.id, app.supervisor, None)
        .await
        .unwrap();
    assert_eq!(rejected.status, LeaveStatus::Rejected);
    assert_eq!(rejected.reviewed_by, Some(app.supervisor));

    let sent = app.notifications.sent().await;
    let notice = sent.iter().find(|n| n.employee_id == app.employee).unwrap();
    assert_eq!(notice.title, "Leave Request Rejected");
    assert_eq!(
        notice.message,
        "Your leave request has been rejected. Reason: No reason provided"
    );
    assert_eq!(notice.severity, Severity::Warning);

    // External progress never reaches a terminal request
    app.workflow.script(created.id, [Step::Advance, Step::Advance]).await;
    let after = app.leaves.reconcile(created.id).await.unwrap();
    assert_eq!(after.status, LeaveStatus::Rejected);
    assert_eq!(app.leaves.reconcile_unsettled().await.unwrap(), 0);

    let err = app
        .leaves
        .approve_by_supervisor(created.id, app.supervisor, app.hr, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn hr_can_reject_at_its_stage() {
    let app = TestApp::new().await;
    let created = submit(&app, (1, 10), (1, 12)).await;
    reach_supervisor(&app, created.id).await;
    app.leaves
        .approve_by_supervisor(created.id, app.supervisor, app.hr, None)
        .await
        .unwrap();

    // The supervisor is no longer the reviewer of this stage
    let err = app.leaves.reject_leave_request(created.id, app.supervisor, None).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let rejected = app
        .leaves
        .reject_leave_request(created.id, app.hr, Some("coverage".into()))
        .await
        .unwrap();
    assert_eq!(rejected.status, LeaveStatus::Rejected);
    assert_eq!(rejected.review_notes.as_deref(), Some("coverage"));
}

#[tokio::test]
async fn hr_rejection_replaces_supervisor_review_and_drops_unsent_stage() {
    let app = TestApp::new().await;
    let created = submit(&app, (1, 20), (1, 21)).await;
    reach_supervisor(&app, created.id).await;

    app.workflow.fail_next_submissions(1);
    let approved = app
        .leaves
        .approve_by_supervisor(created.id, app.supervisor, app.hr, Some("looks fine".into()))
        .await
        .unwrap();
    assert_eq!(approved.review_notes.as_deref(), Some("looks fine"));
    assert_eq!(approved.pending_submission, Some(SubmissionStage::SupervisorApproved));

    let rejected = app
        .leaves
        .reject_leave_request(created.id, app.hr, None)
        .await
        .unwrap();
    assert_eq!(rejected.status, LeaveStatus::Rejected);
    assert_eq!(rejected.reviewed_by, Some(app.hr));
    assert_eq!(rejected.review_notes, None);
    assert_eq!(rejected.pending_submission, None);

    let stored = app.leaves.get_leave_request(created.id).await.unwrap();
    assert_eq!(stored.review_notes, None);
    assert_eq!(stored.pending_submission, None);
}

#[tokio::test]
async fn failing_notifications_do_not_undo_the_transition() {
    let app = TestApp::with_notifications(InMemoryNotifications::failing()).await;
    let created = submit(&app, (1, 10), (1, 12)).await;
    reach_supervisor(&app, created.id).await;

    let rejected = app
        .leaves
        .reject_leave_request(created.id, app.supervisor, None)
        .await
        .unwrap();
    assert_eq!(rejected.status, LeaveStatus::Rejected);
    assert_eq!(
        app.leaves.get_leave_request(created.id).await.unwrap().status,
        LeaveStatus::Rejected
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_supervisor_approvals_admit_one() {
    let app = Arc::new(TestApp::new().await);
    let second_hr = app
        .store
        .add_account(UserAccount::new("Second HR", Role::HrAdmin))
        .await;
    let created = submit(&app, (1, 10), (1, 12)).await;
    reach_supervisor(&app, created.id).await;

    let handles: Vec<_> = [app.hr, second_hr]
        .into_iter()
        .map(|hr| {
            let app = app.clone();
            tokio::spawn(async move {
                app.leaves
                    .approve_by_supervisor(created.id, app.supervisor, hr, None)
                    .await
            })
        })
        .collect();

    let mut winners = Vec::new();
    for handle in handles {
        match handle.await.unwrap() {
            Ok(request) => winners.push(request),
            Err(e) => assert!(matches!(e, AppError::Conflict(_)), "unexpected error: {e}"),
        }
    }
    assert_eq!(winners.len(), 1);

    let stored = app.leaves.get_leave_request(created.id).await.unwrap();
    assert_eq!(stored.status, LeaveStatus::PendingHr);
    assert_eq!(stored.hr_admin_id, winners[0].hr_admin_id);
}

// =========================================================================
//  QUERIES & RECONCILIATION
// =========================================================================

#[tokio::test]
async fn list_my_requests_applies_date_and_status_filters() {
    let app = TestApp::new().await;
    let january = submit(&app, (1, 10), (1, 12)).await;
    let february = submit(&app, (2, 1), (2, 3)).await;
    reach_supervisor(&app, february.id).await;

    let all = app
        .leaves
        .list_my_leave_requests(app.employee, LeaveFilter::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].id, february.id);

    let from_feb = LeaveFilter { start_date: Some(date(2, 1)), ..LeaveFilter::default() };
    let found = app.leaves.list_my_leave_requests(app.employee, from_feb).await.unwrap();
    assert_eq!(found.iter().map(|r| r.id).collect::<Vec<_>>(), vec![february.id]);

    let until_jan = LeaveFilter { end_date: Some(date(1, 31)), ..LeaveFilter::default() };
    let found = app.leaves.list_my_leave_requests(app.employee, until_jan).await.unwrap();
    assert_eq!(found.iter().map(|r| r.id).collect::<Vec<_>>(), vec![january.id]);

    let in_range = LeaveFilter {
        start_date: Some(date(1, 1)),
        end_date: Some(date(1, 10)),
        ..LeaveFilter::default()
    };
    let found = app.leaves.list_my_leave_requests(app.employee, in_range).await.unwrap();
    assert_eq!(found.len(), 1);

    let pending_sup = LeaveFilter::default().with_status(LeaveStatus::PendingSupervisor);
    let found = app.leaves.list_my_leave_requests(app.employee, pending_sup).await.unwrap();
    assert_eq!(found.iter().map(|r| r.id).collect::<Vec<_>>(), vec![february.id]);

    // Someone else's filter value is overridden
    let spoofed = LeaveFilter { employee_id: Some(app.hr), ..LeaveFilter::default() };
    assert_eq!(app.leaves.list_my_leave_requests(app.employee, spoofed).await.unwrap().len(), 2);
}

#[tokio::test]
async fn reviewer_queues_are_oldest_first() {
    let app = TestApp::new().await;
    let first = submit(&app, (1, 10), (1, 12)).await;
    let second = submit(&app, (2, 10), (2, 12)).await;
    reach_supervisor(&app, first.id).await;
    reach_supervisor(&app, second.id).await;

    let queue = app.leaves.pending_for_supervisor(app.supervisor).await.unwrap();
    assert_eq!(queue.iter().map(|r| r.id).collect::<Vec<_>>(), vec![first.id, second.id]);

    let team = app
        .leaves
        .team_requests(app.supervisor, LeaveFilter::default())
        .await
        .unwrap();
    assert_eq!(team[0].id, second.id);
}

#[tokio::test]
async fn background_pass_counts_changed_requests() {
    let app = TestApp::new().await;
    let moving = submit(&app, (1, 10), (1, 12)).await;
    let _holding = submit(&app, (2, 10), (2, 12)).await;
    let rejected = submit(&app, (3, 10), (3, 12)).await;

    app.workflow.script(moving.id, [Step::Advance]).await;
    app.workflow.script(rejected.id, [Step::Advance, Step::Reject]).await;

    assert_eq!(app.leaves.reconcile_unsettled().await.unwrap(), 2);
    assert_eq!(app.leaves.reconcile_unsettled().await.unwrap(), 1);

    let stored = app.leaves.get_leave_request(rejected.id).await.unwrap();
    assert_eq!(stored.status, LeaveStatus::RejectedSupervisor);

    let sent = app.notifications.sent().await;
    assert!(sent.iter().any(|n| n.employee_id == app.employee && n.title == "Leave Request Rejected"));
    assert_eq!(app.leaves.reconcile_unsettled().await.unwrap(), 0);
}
