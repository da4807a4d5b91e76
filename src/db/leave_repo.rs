// src/db/leave_repo.rs

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::repository::LeaveRepository,
    models::{
        leave::{LeaveChange, LeaveFilter, LeaveRequest, LeaveStatus, NewLeaveRequest},
        workflow::SubmissionStage,
    },
    services::overlap::{has_overlap, overlap_error},
};

const LEAVE_COLUMNS: &str = r#"
    id, employee_id, supervisor_id, hr_admin_id, leave_type, start_date, end_date,
    status, reason, reviewed_by, reviewed_at, review_notes,
    external_id, pending_submission, created_at, updated_at
"#;

#[derive(Clone)]
pub struct PgLeaveRepository {
    pool: PgPool,
}

impl PgLeaveRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LeaveRepository for PgLeaveRepository {
    async fn insert_if_no_overlap(&self, new: NewLeaveRequest) -> Result<LeaveRequest, AppError> {
        let mut tx = self.pool.begin().await?;

        // 1. Serialise creations of the same employee until commit
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::text, 0))")
            .bind(new.employee_id)
            .execute(&mut *tx)
            .await?;

        // 2. Overlap check against the committed rows
        let existing = sqlx::query_as::<_, LeaveRequest>(&format!(
            "SELECT {LEAVE_COLUMNS} FROM leave_requests WHERE employee_id = $1"
        ))
        .bind(new.employee_id)
        .fetch_all(&mut *tx)
        .await?;

        if has_overlap(&existing, new.employee_id, new.start_date, new.end_date, None) {
            return Err(overlap_error());
        }

        // 3. Insert in the initial submission status
        let created = sqlx::query_as::<_, LeaveRequest>(&format!(
            r#"
            INSERT INTO leave_requests (
                employee_id, supervisor_id, hr_admin_id, leave_type,
                start_date, end_date, status, reason, pending_submission
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {LEAVE_COLUMNS}
            "#
        ))
        .bind(new.employee_id)
        .bind(new.supervisor_id)
        .bind(new.hr_admin_id)
        .bind(new.leave_type)
        .bind(new.start_date)
        .bind(new.end_date)
        .bind(LeaveStatus::PendingExternal)
        .bind(new.reason)
        .bind(SubmissionStage::Initial)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<LeaveRequest>, AppError> {
        let request = sqlx::query_as::<_, LeaveRequest>(&format!(
            "SELECT {LEAVE_COLUMNS} FROM leave_requests WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(request)
    }

    async fn list(&self, filter: &LeaveFilter) -> Result<Vec<LeaveRequest>, AppError> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {LEAVE_COLUMNS} FROM leave_requests WHERE 1=1"
        ));

        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status);
        }
        if let Some(employee_id) = filter.employee_id {
            qb.push(" AND employee_id = ").push_bind(employee_id);
        }
        if let Some(supervisor_id) = filter.supervisor_id {
            qb.push(" AND supervisor_id = ").push_bind(supervisor_id);
        }
        if let Some(hr_admin_id) = filter.hr_admin_id {
            qb.push(" AND hr_admin_id = ").push_bind(hr_admin_id);
        }
        match (filter.start_date, filter.end_date) {
            (Some(from), Some(to)) => {
                qb.push(" AND start_date BETWEEN ")
                    .push_bind(from)
                    .push(" AND ")
                    .push_bind(to);
            }
            (Some(from), None) => {
                qb.push(" AND start_date >= ").push_bind(from);
            }
            (None, Some(to)) => {
                qb.push(" AND end_date <= ").push_bind(to);
            }
            (None, None) => {}
        }

        qb.push(if filter.oldest_first {
            " ORDER BY created_at ASC"
        } else {
            " ORDER BY created_at DESC"
        });

        let requests = qb
            .build_query_as::<LeaveRequest>()
            .fetch_all(&self.pool)
            .await?;

        Ok(requests)
    }

    async fn for_employee(&self, employee_id: Uuid) -> Result<Vec<LeaveRequest>, AppError> {
        let requests = sqlx::query_as::<_, LeaveRequest>(&format!(
            "SELECT {LEAVE_COLUMNS} FROM leave_requests WHERE employee_id = $1 ORDER BY created_at DESC"
        ))
        .bind(employee_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(requests)
    }

    async fn list_unsettled(&self) -> Result<Vec<LeaveRequest>, AppError> {
        let requests = sqlx::query_as::<_, LeaveRequest>(&format!(
            r#"
            SELECT {LEAVE_COLUMNS} FROM leave_requests
            WHERE status NOT IN ('REJECTED', 'REJECTED_SUPERVISOR', 'REJECTED_HR', 'FINAL_APPROVED')
            ORDER BY created_at ASC
            "#
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(requests)
    }

    async fn update_if_status(
        &self,
        id: Uuid,
        expected: LeaveStatus,
        change: LeaveChange,
    ) -> Result<LeaveRequest, AppError> {
        let (reviewed_by, reviewed_at, review_notes) = match change.review {
            Some(review) => (Some(review.reviewed_by), Some(review.reviewed_at), review.notes),
            None => (None, None, None),
        };

        // Compare-and-set: the WHERE on status is the concurrency guard
        let updated = sqlx::query_as::<_, LeaveRequest>(&format!(
            r#"
            UPDATE leave_requests SET
                status = COALESCE($3, status),
                hr_admin_id = COALESCE($4, hr_admin_id),
                reviewed_by = COALESCE($5, reviewed_by),
                reviewed_at = COALESCE($6, reviewed_at),
                review_notes = CASE WHEN $5::uuid IS NOT NULL THEN $7 ELSE review_notes END,
                external_id = COALESCE($9, external_id),
                pending_submission = CASE
                    WHEN $9::text IS NOT NULL OR $10 THEN NULL
                    ELSE COALESCE($8, pending_submission)
                END,
                updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING {LEAVE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(expected)
        .bind(change.status)
        .bind(change.hr_admin_id)
        .bind(reviewed_by)
        .bind(reviewed_at)
        .bind(review_notes)
        .bind(change.pending_submission)
        .bind(change.acknowledged)
        .bind(change.discard_submission)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(request) = updated {
            return Ok(request);
        }

        // Zero rows: tell a missing request apart from a lost race
        match self.find_by_id(id).await? {
            None => Err(AppError::not_found(format!("leave request {id}"))),
            Some(current) => Err(AppError::conflict(format!(
                "leave request {id} is {}, expected {expected}",
                current.status
            ))),
        }
    }
}
