// src/db/repository.rs

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        leave::{LeaveChange, LeaveFilter, LeaveRequest, LeaveStatus, NewLeaveRequest},
        points::{Absence, NewAbsence, NewPointTransaction, PointTransaction},
        user::UserAccount,
    },
};

// =========================================================================
//  IDENTITY
// =========================================================================

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn resolve_user(&self, id: Uuid) -> Result<Option<UserAccount>, AppError>;
}

// =========================================================================
//  LEAVE REQUESTS
// =========================================================================

#[async_trait]
pub trait LeaveRepository: Send + Sync {
    /// Inserts the request unless it overlaps an active request of the same
    /// employee. The check and the insert are serialised per employee.
    async fn insert_if_no_overlap(&self, new: NewLeaveRequest) -> Result<LeaveRequest, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<LeaveRequest>, AppError>;

    async fn list(&self, filter: &LeaveFilter) -> Result<Vec<LeaveRequest>, AppError>;

    /// Every request of the employee, in any status.
    async fn for_employee(&self, employee_id: Uuid) -> Result<Vec<LeaveRequest>, AppError>;

    /// Non-terminal requests, oldest first.
    async fn list_unsettled(&self) -> Result<Vec<LeaveRequest>, AppError>;

    /// Applies `change` only if the stored status still equals `expected`.
    /// Fails with `NotFound` for an unknown id and `Conflict` when the status moved.
    async fn update_if_status(
        &self,
        id: Uuid,
        expected: LeaveStatus,
        change: LeaveChange,
    ) -> Result<LeaveRequest, AppError>;
}

// =========================================================================
//  POINTS LEDGER
// =========================================================================

/// Unit of work over one account. The account stays locked until the unit
/// is committed or dropped; dropping without commit discards every change.
#[async_trait]
pub trait AccountTx: Send {
    /// Account snapshot taken when the lock was acquired.
    fn account(&self) -> &UserAccount;

    /// Stored balance including the changes staged in this unit.
    fn balance(&self) -> i64;

    /// Appends the transaction and moves the balance by its value.
    async fn append(&mut self, entry: NewPointTransaction) -> Result<PointTransaction, AppError>;

    async fn record_absence(&mut self, absence: NewAbsence) -> Result<Absence, AppError>;

    async fn commit(self: Box<Self>) -> Result<(), AppError>;
}

#[async_trait]
pub trait LedgerRepository: Send + Sync {
    /// Locks the account. `NotFound` if the employee does not exist.
    async fn begin(&self, employee_id: Uuid) -> Result<Box<dyn AccountTx>, AppError>;

    async fn account(&self, employee_id: Uuid) -> Result<Option<UserAccount>, AppError>;

    /// Transactions of one employee, newest first.
    async fn history(&self, employee_id: Uuid) -> Result<Vec<PointTransaction>, AppError>;

    /// Transactions of every employee, newest first.
    async fn all_history(&self) -> Result<Vec<PointTransaction>, AppError>;

    /// Sum of the stored balances of accounts allowed to hold points.
    async fn total_outstanding(&self) -> Result<i64, AppError>;
}
