// src/db/memory.rs

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::repository::{AccountTx, LeaveRepository, LedgerRepository, UserDirectory},
    models::{
        leave::{LeaveChange, LeaveFilter, LeaveRequest, LeaveStatus, NewLeaveRequest},
        points::{Absence, NewAbsence, NewPointTransaction, PointTransaction},
        user::UserAccount,
        workflow::SubmissionStage,
    },
    services::{
        ledger_service::OUT_OF_RANGE,
        overlap::{has_overlap, overlap_error},
    },
};

struct AccountSlot {
    account: UserAccount,
    // Oldest first, tagged with the store-wide append sequence.
    transactions: Vec<(u64, PointTransaction)>,
}

#[derive(Default)]
struct Inner {
    accounts: RwLock<HashMap<Uuid, Arc<Mutex<AccountSlot>>>>,
    // Insertion order.
    leaves: RwLock<Vec<LeaveRequest>>,
    absences: Mutex<Vec<Absence>>,
    sequence: AtomicU64,
}

/// Process-local store backing every repository trait. Each account has its
/// own lock, so ledger units on different employees never wait on each other.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_account(&self, account: UserAccount) -> Uuid {
        let id = account.id;
        let slot = AccountSlot {
            account,
            transactions: Vec::new(),
        };
        self.inner
            .accounts
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(slot)));
        id
    }

    /// Writes the stored balance directly, bypassing the ledger (legacy data).
    pub async fn set_points_balance(&self, employee_id: Uuid, points: i64) -> Result<(), AppError> {
        let slot = self.slot(employee_id).await?;
        slot.lock().await.account.points_balance = points;
        Ok(())
    }

    pub async fn set_leave_balance(&self, employee_id: Uuid, days: i64) -> Result<(), AppError> {
        let slot = self.slot(employee_id).await?;
        slot.lock().await.account.leave_balance = days;
        Ok(())
    }

    pub async fn absences(&self) -> Vec<Absence> {
        self.inner.absences.lock().await.clone()
    }

    async fn slot(&self, employee_id: Uuid) -> Result<Arc<Mutex<AccountSlot>>, AppError> {
        self.inner
            .accounts
            .read()
            .await
            .get(&employee_id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("employee {employee_id}")))
    }

    async fn all_slots(&self) -> Vec<Arc<Mutex<AccountSlot>>> {
        self.inner.accounts.read().await.values().cloned().collect()
    }
}

// =========================================================================
//  IDENTITY
// =========================================================================

#[async_trait]
impl UserDirectory for InMemoryStore {
    async fn resolve_user(&self, id: Uuid) -> Result<Option<UserAccount>, AppError> {
        match self.slot(id).await {
            Ok(slot) => Ok(Some(slot.lock().await.account.clone())),
            Err(AppError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

// =========================================================================
//  LEAVE REQUESTS
// =========================================================================

#[async_trait]
impl LeaveRepository for InMemoryStore {
    async fn insert_if_no_overlap(&self, new: NewLeaveRequest) -> Result<LeaveRequest, AppError> {
        let mut leaves = self.inner.leaves.write().await;

        if has_overlap(&leaves, new.employee_id, new.start_date, new.end_date, None) {
            return Err(overlap_error());
        }

        let now = Utc::now();
        let request = LeaveRequest {
            id: Uuid::new_v4(),
            employee_id: new.employee_id,
            supervisor_id: new.supervisor_id,
            hr_admin_id: new.hr_admin_id,
            leave_type: new.leave_type,
            start_date: new.start_date,
            end_date: new.end_date,
            status: LeaveStatus::PendingExternal,
            reason: new.reason,
            reviewed_by: None,
            reviewed_at: None,
            review_notes: None,
            external_id: None,
            pending_submission: Some(SubmissionStage::Initial),
            created_at: now,
            updated_at: now,
        };
        leaves.push(request.clone());
        Ok(request)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<LeaveRequest>, AppError> {
        let leaves = self.inner.leaves.read().await;
        Ok(leaves.iter().find(|r| r.id == id).cloned())
    }

    async fn list(&self, filter: &LeaveFilter) -> Result<Vec<LeaveRequest>, AppError> {
        let leaves = self.inner.leaves.read().await;
        let mut found: Vec<LeaveRequest> = leaves.iter().filter(|r| filter.matches(r)).cloned().collect();
        if !filter.oldest_first {
            found.reverse();
        }
        Ok(found)
    }

    async fn for_employee(&self, employee_id: Uuid) -> Result<Vec<LeaveRequest>, AppError> {
        let leaves = self.inner.leaves.read().await;
        Ok(leaves
            .iter()
            .filter(|r| r.employee_id == employee_id)
            .cloned()
            .collect())
    }

    async fn list_unsettled(&self) -> Result<Vec<LeaveRequest>, AppError> {
        let leaves = self.inner.leaves.read().await;
        Ok(leaves
            .iter()
            .filter(|r| !r.status.is_terminal())
            .cloned()
            .collect())
    }

    async fn update_if_status(
        &self,
        id: Uuid,
        expected: LeaveStatus,
        change: LeaveChange,
    ) -> Result<LeaveRequest, AppError> {
        let mut leaves = self.inner.leaves.write().await;
        let request = leaves
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| AppError::not_found(format!("leave request {id}")))?;

        if request.status != expected {
            return Err(AppError::conflict(format!(
                "leave request {id} is {}, expected {expected}",
                request.status
            )));
        }

        change.apply(request);
        Ok(request.clone())
    }
}

// =========================================================================
//  POINTS LEDGER
// =========================================================================

struct MemoryAccountTx {
    guard: OwnedMutexGuard<AccountSlot>,
    balance: i64,
    staged: Vec<(u64, PointTransaction)>,
    staged_absences: Vec<Absence>,
    inner: Arc<Inner>,
}

#[async_trait]
impl AccountTx for MemoryAccountTx {
    fn account(&self) -> &UserAccount {
        &self.guard.account
    }

    fn balance(&self) -> i64 {
        self.balance
    }

    async fn append(&mut self, entry: NewPointTransaction) -> Result<PointTransaction, AppError> {
        let balance = self
            .balance
            .checked_add(entry.value)
            .ok_or_else(|| AppError::validation(OUT_OF_RANGE))?;
        let transaction = PointTransaction {
            id: Uuid::new_v4(),
            employee_id: entry.employee_id,
            kind: entry.kind,
            value: entry.value,
            description: entry.description,
            created_at: Utc::now(),
        };
        self.balance = balance;
        self.staged.push((self.inner.sequence.fetch_add(1, Ordering::Relaxed), transaction.clone()));
        Ok(transaction)
    }

    async fn record_absence(&mut self, absence: NewAbsence) -> Result<Absence, AppError> {
        let absence = Absence {
            id: Uuid::new_v4(),
            employee_id: absence.employee_id,
            kind: absence.kind,
            duration_days: absence.duration_days,
            absence_date: absence.absence_date,
            points_deducted: absence.points_deducted,
            notes: absence.notes,
            created_at: Utc::now(),
        };
        self.staged_absences.push(absence.clone());
        Ok(absence)
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let mut this = *self;
        if !this.staged_absences.is_empty() {
            this.inner.absences.lock().await.append(&mut this.staged_absences);
        }
        this.guard.account.points_balance = this.balance;
        this.guard.transactions.append(&mut this.staged);
        Ok(())
    }
}

#[async_trait]
impl LedgerRepository for InMemoryStore {
    async fn begin(&self, employee_id: Uuid) -> Result<Box<dyn AccountTx>, AppError> {
        let slot = self.slot(employee_id).await?;
        let guard = slot.lock_owned().await;
        let balance = guard.account.points_balance;
        Ok(Box::new(MemoryAccountTx {
            guard,
            balance,
            staged: Vec::new(),
            staged_absences: Vec::new(),
            inner: self.inner.clone(),
        }))
    }

    async fn account(&self, employee_id: Uuid) -> Result<Option<UserAccount>, AppError> {
        self.resolve_user(employee_id).await
    }

    async fn history(&self, employee_id: Uuid) -> Result<Vec<PointTransaction>, AppError> {
        let slot = self.slot(employee_id).await?;
        let slot = slot.lock().await;
        Ok(slot.transactions.iter().rev().map(|(_, t)| t.clone()).collect())
    }

    async fn all_history(&self) -> Result<Vec<PointTransaction>, AppError> {
        let mut all = Vec::new();
        for slot in self.all_slots().await {
            all.extend(slot.lock().await.transactions.iter().cloned());
        }
        all.sort_by(|(seq_a, a), (seq_b, b)| {
            b.created_at.cmp(&a.created_at).then(seq_b.cmp(seq_a))
        });
        Ok(all.into_iter().map(|(_, t)| t).collect())
    }

    async fn total_outstanding(&self) -> Result<i64, AppError> {
        let mut total = 0;
        for slot in self.all_slots().await {
            let slot = slot.lock().await;
            if !slot.account.is_points_restricted() {
                total += slot.account.points_balance;
            }
        }
        Ok(total)
    }
}
