use serde::{Deserialize, Serialize};

/// Kind of operation kept in the history log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    /// A fetch, merge and write-back cycle
    Sync,
    /// Decisions were cleared, locally or everywhere
    Reset,
}

impl OperationType {
    /// Returns a human-readable string representation
    pub fn as_str(&self) -> &str {
        match self {
            OperationType::Sync => "sync",
            OperationType::Reset => "reset",
        }
    }
}
