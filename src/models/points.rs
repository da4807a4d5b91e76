// src/models/points.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

// --- Point transactions (ledger) ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "point_transaction_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Earned,
    Deducted,
    Adjusted,
    XmallPurchase,
    AbsencePenalty,
    Manual,
}

/// Append-only ledger row. `value` is signed: credits positive, debits negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PointTransaction {
    pub id: Uuid,
    pub employee_id: Uuid,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub value: i64,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPointTransaction {
    pub employee_id: Uuid,
    pub kind: TransactionType,
    pub value: i64,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseReceipt {
    pub deducted_points: i64,
    pub new_balance: i64,
    pub transaction: PointTransaction,
}

// --- Absences ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "absence_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AbsenceType {
    Sick,
    Personal,
    Unauthorized,
}

impl AbsenceType {
    pub fn as_str(self) -> &'static str {
        match self {
            AbsenceType::Sick => "SICK",
            AbsenceType::Personal => "PERSONAL",
            AbsenceType::Unauthorized => "UNAUTHORIZED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Absence {
    pub id: Uuid,
    pub employee_id: Uuid,
    #[serde(rename = "type")]
    pub kind: AbsenceType,
    pub duration_days: i32,
    pub absence_date: NaiveDate,
    pub points_deducted: i64,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAbsence {
    pub employee_id: Uuid,
    pub kind: AbsenceType,
    pub duration_days: i32,
    pub absence_date: NaiveDate,
    pub points_deducted: i64,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReportAbsence {
    pub employee_id: Uuid,
    #[serde(rename = "type")]
    pub kind: AbsenceType,
    #[validate(range(min = 1, max = 365, message = "duration must be between 1 and 365 days"))]
    pub duration_days: i32,
    pub date: NaiveDate,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}
