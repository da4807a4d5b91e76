// src/db/ledger_repo.rs

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::repository::{AccountTx, LedgerRepository},
    models::{
        points::{Absence, NewAbsence, NewPointTransaction, PointTransaction},
        user::UserAccount,
    },
};

const ACCOUNT_COLUMNS: &str =
    "id, full_name, role, is_active, points_balance, leave_balance";

#[derive(Clone)]
pub struct PgLedgerRepository {
    pool: PgPool,
}

impl PgLedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Holds the employee row lock (`FOR UPDATE`) for the lifetime of the transaction.
pub struct PgAccountTx {
    tx: Transaction<'static, Postgres>,
    account: UserAccount,
    balance: i64,
}

#[async_trait]
impl AccountTx for PgAccountTx {
    fn account(&self) -> &UserAccount {
        &self.account
    }

    fn balance(&self) -> i64 {
        self.balance
    }

    async fn append(&mut self, entry: NewPointTransaction) -> Result<PointTransaction, AppError> {
        let transaction = sqlx::query_as::<_, PointTransaction>(
            r#"
            INSERT INTO point_transactions (employee_id, kind, value, description)
            VALUES ($1, $2, $3, $4)
            RETURNING id, employee_id, kind, value, description, created_at
            "#,
        )
        .bind(entry.employee_id)
        .bind(entry.kind)
        .bind(entry.value)
        .bind(&entry.description)
        .fetch_one(&mut *self.tx)
        .await?;

        let balance: i64 = sqlx::query_scalar(
            "UPDATE employees SET points_balance = points_balance + $2 WHERE id = $1 RETURNING points_balance",
        )
        .bind(entry.employee_id)
        .bind(entry.value)
        .fetch_one(&mut *self.tx)
        .await?;

        self.balance = balance;
        Ok(transaction)
    }

    async fn record_absence(&mut self, absence: NewAbsence) -> Result<Absence, AppError> {
        let absence = sqlx::query_as::<_, Absence>(
            r#"
            INSERT INTO absences (employee_id, kind, duration_days, absence_date, points_deducted, notes)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, employee_id, kind, duration_days, absence_date, points_deducted, notes, created_at
            "#,
        )
        .bind(absence.employee_id)
        .bind(absence.kind)
        .bind(absence.duration_days)
        .bind(absence.absence_date)
        .bind(absence.points_deducted)
        .bind(absence.notes)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(absence)
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl LedgerRepository for PgLedgerRepository {
    async fn begin(&self, employee_id: Uuid) -> Result<Box<dyn AccountTx>, AppError> {
        let mut tx = self.pool.begin().await?;

        let account = sqlx::query_as::<_, UserAccount>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM employees WHERE id = $1 FOR UPDATE"
        ))
        .bind(employee_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found(format!("employee {employee_id}")))?;

        let balance = account.points_balance;
        Ok(Box::new(PgAccountTx { tx, account, balance }))
    }

    async fn account(&self, employee_id: Uuid) -> Result<Option<UserAccount>, AppError> {
        let account = sqlx::query_as::<_, UserAccount>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM employees WHERE id = $1"
        ))
        .bind(employee_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    async fn history(&self, employee_id: Uuid) -> Result<Vec<PointTransaction>, AppError> {
        let history = sqlx::query_as::<_, PointTransaction>(
            r#"
            SELECT id, employee_id, kind, value, description, created_at
            FROM point_transactions
            WHERE employee_id = $1
            ORDER BY created_at DESC, seq DESC
            "#,
        )
        .bind(employee_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(history)
    }

    async fn all_history(&self) -> Result<Vec<PointTransaction>, AppError> {
        let history = sqlx::query_as::<_, PointTransaction>(
            r#"
            SELECT id, employee_id, kind, value, description, created_at
            FROM point_transactions
            ORDER BY created_at DESC, seq DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(history)
    }

    async fn total_outstanding(&self) -> Result<i64, AppError> {
        // SUM(bigint) is numeric in Postgres; cast back for the driver
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(points_balance), 0)::BIGINT FROM employees WHERE role = 'EMPLOYEE'",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }
}
