use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::merge::MergeStats;
use crate::sync::SyncOutcome;

use super::types::OperationType;

/// Record of a single sync or reset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRecord {
    /// Type of operation (sync or reset)
    pub operation_type: OperationType,

    /// When the operation finished
    pub timestamp: DateTime<Utc>,

    /// Device that performed the operation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,

    pub success: bool,

    /// Error text for failures, scope description for resets
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Merge figures for successful syncs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<MergeStats>,
}

impl OperationRecord {
    /// Record for a sync outcome; disabled and coalesced calls are not worth logging
    pub fn from_sync(outcome: &SyncOutcome, device_id: Option<String>) -> Option<Self> {
        let (success, message, stats) = match outcome {
            SyncOutcome::Synced(stats) => (true, None, Some(stats.clone())),
            SyncOutcome::Failed(message) => (false, Some(message.clone()), None),
            SyncOutcome::Disabled | SyncOutcome::Coalesced => return None,
        };

        Some(Self {
            operation_type: OperationType::Sync,
            timestamp: Utc::now(),
            device_id,
            success,
            message,
            stats,
        })
    }

    /// Record for a reset of `scope` (a description such as "all devices" or an album name)
    pub fn reset(scope: impl Into<String>, success: bool, device_id: Option<String>) -> Self {
        Self {
            operation_type: OperationType::Reset,
            timestamp: Utc::now(),
            device_id,
            success,
            message: Some(scope.into()),
            stats: None,
        }
    }

    /// Returns a one-line summary of this operation
    pub fn summary(&self) -> String {
        let when = self.timestamp.format("%Y-%m-%d %H:%M:%S");
        let detail = match (&self.operation_type, &self.stats, &self.message) {
            (OperationType::Sync, Some(stats), _) => format!(
                "{} kept, {} deleted{}",
                stats.merged_kept,
                stats.merged_deleted,
                if stats.reset_applied {
                    ", remote reset applied"
                } else {
                    ""
                }
            ),
            (OperationType::Reset, _, Some(scope)) => scope.clone(),
            (_, _, Some(message)) => message.clone(),
            _ => String::new(),
        };

        format!(
            "{} at {}: {} ({})",
            self.operation_type.as_str().to_uppercase(),
            when,
            if self.success { "ok" } else { "failed" },
            detail
        )
    }
}
