// src/services/notifications.rs

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{common::error::AppError, models::notification::NewNotification};

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: NewNotification) -> Result<(), AppError>;
}

/// Fire-and-forget delivery: a failing sink is logged and never reaches the caller.
pub async fn deliver(sink: &dyn NotificationSink, notification: NewNotification) {
    let employee_id = notification.employee_id;
    if let Err(e) = sink.notify(notification).await {
        tracing::warn!(error = %e, %employee_id, "notification delivery failed");
    }
}

/// Keeps every notification in memory. Can be switched to fail every call.
#[derive(Clone, Default)]
pub struct InMemoryNotifications {
    sent: Arc<Mutex<Vec<NewNotification>>>,
    failing: bool,
}

impl InMemoryNotifications {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub async fn sent(&self) -> Vec<NewNotification> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl NotificationSink for InMemoryNotifications {
    async fn notify(&self, notification: NewNotification) -> Result<(), AppError> {
        if self.failing {
            return Err(AppError::InternalServerError(anyhow::anyhow!(
                "notification sink unavailable"
            )));
        }
        self.sent.lock().await.push(notification);
        Ok(())
    }
}
