pub mod leave;
pub mod notification;
pub mod points;
pub mod user;
pub mod workflow;
