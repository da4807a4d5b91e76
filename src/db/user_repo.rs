// src/db/user_repo.rs

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{common::error::AppError, db::repository::UserDirectory, models::user::UserAccount};

// Read-only view over the 'employees' table. Employee CRUD lives elsewhere.
#[derive(Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn resolve_user(&self, id: Uuid) -> Result<Option<UserAccount>, AppError> {
        let maybe_user = sqlx::query_as::<_, UserAccount>(
            r#"
            SELECT id, full_name, role, is_active, points_balance, leave_balance
            FROM employees
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(maybe_user)
    }
}
