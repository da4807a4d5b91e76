// src/db/notification_repo.rs

use async_trait::async_trait;
use sqlx::PgPool;

use crate::{
    common::error::AppError,
    models::notification::NewNotification,
    services::notifications::NotificationSink,
};

#[derive(Clone)]
pub struct PgNotificationSink {
    pool: PgPool,
}

impl PgNotificationSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationSink for PgNotificationSink {
    async fn notify(&self, notification: NewNotification) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO notifications (employee_id, title, message, severity)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(notification.employee_id)
        .bind(notification.title)
        .bind(notification.message)
        .bind(notification.severity)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
