//! Synchronization lifecycle: single-flight sync cycles, periodic scheduling,
//! remote reset and the observable status.

mod coordinator;
mod retry;
mod status;

pub use coordinator::{SyncCoordinator, SyncOutcome};
pub use retry::RetryPolicy;
pub use status::SyncStatus;
