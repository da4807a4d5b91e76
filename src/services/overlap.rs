// src/services/overlap.rs

use chrono::NaiveDate;
use uuid::Uuid;

use crate::{common::error::AppError, models::leave::LeaveRequest};

pub fn overlap_error() -> AppError {
    AppError::validation("You already have a leave request for this period")
}

/// Inclusive ranges [a_start, a_end] and [b_start, b_end] share at least one day.
pub fn ranges_overlap(
    a_start: NaiveDate,
    a_end: NaiveDate,
    b_start: NaiveDate,
    b_end: NaiveDate,
) -> bool {
    a_start <= b_end && b_start <= a_end
}

/// Whether `[start, end]` conflicts with one of the employee's requests.
/// Rejected requests never conflict; `exclude_id` skips the request being edited.
pub fn has_overlap(
    existing: &[LeaveRequest],
    employee_id: Uuid,
    start: NaiveDate,
    end: NaiveDate,
    exclude_id: Option<Uuid>,
) -> bool {
    existing.iter().any(|request| {
        request.employee_id == employee_id
            && !request.status.is_rejection()
            && exclude_id != Some(request.id)
            && ranges_overlap(start, end, request.start_date, request.end_date)
    })
}
