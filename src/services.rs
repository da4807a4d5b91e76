pub mod overlap;
pub mod notifications;
pub use notifications::{InMemoryNotifications, NotificationSink};
pub mod ledger_service;
pub use ledger_service::PointsLedger;
pub mod absence_service;
pub use absence_service::AbsenceService;
pub mod leave_service;

pub use leave_service::LeaveService;
