// src/services/ledger_service.rs

use std::sync::Arc;

use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{AccountTx, LedgerRepository},
    models::points::{NewPointTransaction, PointTransaction, PurchaseReceipt, TransactionType},
};

const DEFAULT_ADJUSTMENT_DESCRIPTION: &str = "Manual Adjustment";
const DEFAULT_PURCHASE_DESCRIPTION: &str = "XMall Purchase";
pub(crate) const OUT_OF_RANGE: &str = "amount exceeds ledger range";

#[derive(Clone)]
pub struct PointsLedger {
    repo: Arc<dyn LedgerRepository>,
}

impl PointsLedger {
    pub fn new(repo: Arc<dyn LedgerRepository>) -> Self {
        Self { repo }
    }

    // =========================================================================
    //  MOVEMENTS
    // =========================================================================

    pub async fn credit(
        &self,
        employee_id: Uuid,
        amount: i64,
        kind: TransactionType,
        description: &str,
    ) -> Result<PointTransaction, AppError> {
        let mut tx = self.repo.begin(employee_id).await?;
        let transaction = credit_in(tx.as_mut(), amount, kind, description).await?;
        tx.commit().await?;
        Ok(transaction)
    }

    pub async fn debit(
        &self,
        employee_id: Uuid,
        amount: i64,
        kind: TransactionType,
        description: &str,
    ) -> Result<PointTransaction, AppError> {
        let mut tx = self.repo.begin(employee_id).await?;
        let transaction = debit_in(tx.as_mut(), amount, kind, description).await?;
        tx.commit().await?;
        Ok(transaction)
    }

    /// Positive delta credits, negative delta debits.
    pub async fn adjust(
        &self,
        employee_id: Uuid,
        delta: i64,
        kind: TransactionType,
        description: Option<&str>,
    ) -> Result<PointTransaction, AppError> {
        let description = description.unwrap_or(DEFAULT_ADJUSTMENT_DESCRIPTION);
        match delta {
            0 => Err(AppError::validation("adjustment must not be zero")),
            d if d > 0 => self.credit(employee_id, d, kind, description).await,
            d => {
                let amount = d.checked_neg().ok_or_else(|| AppError::validation(OUT_OF_RANGE))?;
                self.debit(employee_id, amount, kind, description).await
            }
        }
    }

    pub async fn xmall_purchase(
        &self,
        employee_id: Uuid,
        amount: i64,
        description: Option<&str>,
    ) -> Result<PurchaseReceipt, AppError> {
        let description = description.unwrap_or(DEFAULT_PURCHASE_DESCRIPTION);

        let mut tx = self.repo.begin(employee_id).await?;
        let transaction =
            debit_in(tx.as_mut(), amount, TransactionType::XmallPurchase, description).await?;
        let new_balance = tx.balance();
        tx.commit().await?;

        Ok(PurchaseReceipt {
            deducted_points: amount,
            new_balance,
            transaction,
        })
    }

    // =========================================================================
    //  READS
    // =========================================================================

    /// Zero for restricted accounts, whatever the stored value.
    pub async fn balance(&self, employee_id: Uuid) -> Result<i64, AppError> {
        let account = self
            .repo
            .account(employee_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("employee {employee_id}")))?;

        if account.is_points_restricted() {
            return Ok(0);
        }
        Ok(account.points_balance)
    }

    /// Newest first. Empty for restricted accounts.
    pub async fn history(&self, employee_id: Uuid) -> Result<Vec<PointTransaction>, AppError> {
        let account = self
            .repo
            .account(employee_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("employee {employee_id}")))?;

        if account.is_points_restricted() {
            return Ok(Vec::new());
        }
        self.repo.history(employee_id).await
    }

    pub async fn all_history(&self) -> Result<Vec<PointTransaction>, AppError> {
        self.repo.all_history().await
    }

    pub async fn total_outstanding(&self) -> Result<i64, AppError> {
        self.repo.total_outstanding().await
    }
}

// =========================================================================
//  UNIT-OF-WORK HELPERS
// =========================================================================

fn ensure_movable(tx: &dyn AccountTx, amount: i64) -> Result<(), AppError> {
    if amount <= 0 {
        return Err(AppError::validation("amount must be positive"));
    }
    if tx.account().is_points_restricted() {
        return Err(AppError::RestrictedAccount(tx.account().id));
    }
    Ok(())
}

/// Credits inside an open unit of work. The caller commits.
pub async fn credit_in(
    tx: &mut dyn AccountTx,
    amount: i64,
    kind: TransactionType,
    description: &str,
) -> Result<PointTransaction, AppError> {
    ensure_movable(tx, amount)?;
    if tx.balance().checked_add(amount).is_none() {
        return Err(AppError::validation(OUT_OF_RANGE));
    }

    let employee_id = tx.account().id;
    let transaction = tx
        .append(NewPointTransaction {
            employee_id,
            kind,
            value: amount,
            description: description.to_string(),
        })
        .await?;

    tracing::info!(%employee_id, amount, balance = tx.balance(), "points credited");
    Ok(transaction)
}

/// Debits inside an open unit of work. The caller commits.
pub async fn debit_in(
    tx: &mut dyn AccountTx,
    amount: i64,
    kind: TransactionType,
    description: &str,
) -> Result<PointTransaction, AppError> {
    ensure_movable(tx, amount)?;

    let available = tx.balance();
    if available < amount {
        return Err(AppError::InsufficientBalance {
            available,
            requested: amount,
        });
    }

    let employee_id = tx.account().id;
    let transaction = tx
        .append(NewPointTransaction {
            employee_id,
            kind,
            value: -amount,
            description: description.to_string(),
        })
        .await?;

    tracing::info!(%employee_id, amount, balance = tx.balance(), "points debited");
    Ok(transaction)
}
