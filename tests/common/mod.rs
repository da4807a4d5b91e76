#![allow(dead_code)]

use std::sync::Arc;

use chrono::NaiveDate;
use hr_core::{
    db::InMemoryStore,
    models::{
        leave::{CreateLeaveRequest, LeaveType},
        user::{Role, UserAccount},
    },
    services::{AbsenceService, InMemoryNotifications, LeaveService, PointsLedger},
    workflow::InMemoryWorkflow,
};
use uuid::Uuid;

pub struct TestApp {
    pub store: InMemoryStore,
    pub workflow: InMemoryWorkflow,
    pub notifications: InMemoryNotifications,
    pub leaves: LeaveService,
    pub ledger: PointsLedger,
    pub absences: AbsenceService,
    pub employee: Uuid,
    pub supervisor: Uuid,
    pub hr: Uuid,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_notifications(InMemoryNotifications::new()).await
    }

    pub async fn with_notifications(notifications: InMemoryNotifications) -> Self {
        let store = InMemoryStore::new();
        let employee = store
            .add_account(
                UserAccount::new("Joana Lima", Role::Employee)
                    .with_points(100)
                    .with_leave_balance(10),
            )
            .await;
        let supervisor = store
            .add_account(UserAccount::new("Rui Costa", Role::Supervisor))
            .await;
        let hr = store
            .add_account(UserAccount::new("Marta Reis", Role::HrAdmin))
            .await;

        let workflow = InMemoryWorkflow::new();
        let leaves = LeaveService::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(workflow.clone()),
            Arc::new(notifications.clone()),
        );
        let ledger = PointsLedger::new(Arc::new(store.clone()));
        let absences = AbsenceService::new(Arc::new(store.clone()));

        Self {
            store,
            workflow,
            notifications,
            leaves,
            ledger,
            absences,
            employee,
            supervisor,
            hr,
        }
    }

    pub fn request(&self, kind: LeaveType, start: NaiveDate, end: NaiveDate) -> CreateLeaveRequest {
        CreateLeaveRequest {
            leave_type: kind,
            start_date: start,
            end_date: end,
            supervisor_id: self.supervisor,
            hr_admin_id: self.hr,
            reason: Some("family trip".into()),
        }
    }
}

pub fn date(m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, m, d).unwrap()
}
