//! Operation history tracking and persistence.
//!
//! Keeps a rolling log of recent sync cycles and resets so the `history`
//! command can show what happened and when.

mod record;
mod storage;
mod types;

pub use record::OperationRecord;
pub use storage::{record_operation, OperationHistory};
pub use types::OperationType;
