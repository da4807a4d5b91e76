// src/models/user.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "employee_role", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Employee,
    Supervisor,
    HrAdmin,
}

impl Role {
    /// Reviewer roles cannot hold or move points.
    pub fn is_points_restricted(self) -> bool {
        matches!(self, Role::Supervisor | Role::HrAdmin)
    }
}

/// Identity and balances of an employee, as the core sees them.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    pub id: Uuid,
    pub full_name: String,
    pub role: Role,
    pub is_active: bool,
    // Stored value. Read through the ledger, which hides it for restricted roles.
    pub points_balance: i64,
    // Days of annual leave available.
    pub leave_balance: i64,
}

impl UserAccount {
    pub fn new(full_name: &str, role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            full_name: full_name.to_string(),
            role,
            is_active: true,
            points_balance: 0,
            leave_balance: 0,
        }
    }

    pub fn with_points(mut self, points: i64) -> Self {
        self.points_balance = points;
        self
    }

    pub fn with_leave_balance(mut self, days: i64) -> Self {
        self.leave_balance = days;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    pub fn is_points_restricted(&self) -> bool {
        self.role.is_points_restricted()
    }
}
