mod coordinator;
mod outcome;
mod pending;
mod retry;

pub use coordinator::ProgressSyncService;
pub use outcome::{SyncIssue, SyncPhase, SyncResult};
pub use pending::{PendingEntry, PendingSyncs};
pub use retry::{DEFAULT_RETRY_INTERVAL, RetryWorker};
