// src/services/absence_service.rs

use std::sync::Arc;

use validator::Validate;

use crate::{
    common::error::AppError,
    db::LedgerRepository,
    models::points::{Absence, NewAbsence, ReportAbsence, TransactionType},
    services::ledger_service::debit_in,
};

pub const ABSENCE_PENALTY_PER_DAY: i64 = 10;

#[derive(Clone)]
pub struct AbsenceService {
    repo: Arc<dyn LedgerRepository>,
}

impl AbsenceService {
    pub fn new(repo: Arc<dyn LedgerRepository>) -> Self {
        Self { repo }
    }

    /// Records the absence and its point penalty as one unit: if the penalty
    /// cannot be debited, the absence is not stored either.
    pub async fn report_absence(&self, payload: ReportAbsence) -> Result<Absence, AppError> {
        payload.validate()?;

        let penalty = i64::from(payload.duration_days) * ABSENCE_PENALTY_PER_DAY;
        let description = format!("Absence: {} on {}", payload.kind.as_str(), payload.date);

        // 1. Lock the account for the whole report
        let mut tx = self.repo.begin(payload.employee_id).await?;

        // 2. Penalty first; any failure drops the unit and nothing is written
        debit_in(tx.as_mut(), penalty, TransactionType::AbsencePenalty, &description).await?;

        // 3. Absence row inside the same unit
        let absence = tx
            .record_absence(NewAbsence {
                employee_id: payload.employee_id,
                kind: payload.kind,
                duration_days: payload.duration_days,
                absence_date: payload.date,
                points_deducted: penalty,
                notes: payload.notes,
            })
            .await?;

        tx.commit().await?;

        tracing::info!(
            employee_id = %absence.employee_id,
            absence_id = %absence.id,
            penalty,
            "absence reported"
        );
        Ok(absence)
    }
}
