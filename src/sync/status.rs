use chrono::{DateTime, Local, Utc};
use std::fmt;

/// Observable state of the sync coordinator
#[derive(Debug, Clone, PartialEq)]
pub enum SyncStatus {
    /// Nothing has run yet
    Idle,
    /// A cycle is in flight
    Syncing,
    /// Last cycle completed
    Synced { at: DateTime<Utc> },
    /// Last cycle or reset failed
    Error(String),
    /// Sync is switched off by the user
    Disabled,
    /// The remote snapshot was cleared
    RemoteReset { at: DateTime<Utc> },
}

impl SyncStatus {
    pub fn is_error(&self) -> bool {
        matches!(self, SyncStatus::Error(_))
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStatus::Idle => write!(f, "Idle"),
            SyncStatus::Syncing => write!(f, "Syncing..."),
            SyncStatus::Synced { at } => write!(
                f,
                "Synced at {}",
                at.with_timezone(&Local).format("%H:%M:%S")
            ),
            SyncStatus::Error(message) => write!(f, "Error: {message}"),
            SyncStatus::Disabled => write!(f, "Sync disabled"),
            SyncStatus::RemoteReset { at } => write!(
                f,
                "Remote data reset at {}",
                at.with_timezone(&Local).format("%H:%M:%S")
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(SyncStatus::Idle.to_string(), "Idle");
        assert_eq!(SyncStatus::Syncing.to_string(), "Syncing...");
        assert_eq!(SyncStatus::Disabled.to_string(), "Sync disabled");
        assert_eq!(
            SyncStatus::Error("remote unavailable".into()).to_string(),
            "Error: remote unavailable"
        );
        assert!(SyncStatus::Synced { at: Utc::now() }
            .to_string()
            .starts_with("Synced at "));
    }

    #[test]
    fn test_is_error() {
        assert!(SyncStatus::Error("x".into()).is_error());
        assert!(!SyncStatus::Disabled.is_error());
    }
}
