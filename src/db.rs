pub mod repository;
pub use repository::{AccountTx, LeaveRepository, LedgerRepository, UserDirectory};
pub mod memory;
pub use memory::InMemoryStore;
pub mod leave_repo;
pub use leave_repo::PgLeaveRepository;
pub mod ledger_repo;
pub use ledger_repo::PgLedgerRepository;
pub mod user_repo;
pub use user_repo::PgUserDirectory;
pub mod notification_repo;

pub use notification_repo::PgNotificationSink;
