//! Remote copy of the decision snapshot.
//!
//! The remote store only persists [`RemoteRecord`]s; conflict resolution is
//! done by the merge engine before anything is written, so backends may be
//! plain last-write-wins stores.

mod file;
mod memory;

pub use file::FileRemoteStore;
pub use memory::MemoryRemoteStore;

use anyhow::Result;
use async_trait::async_trait;

use crate::snapshot::RemoteRecord;

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch the stored record, `None` if nothing was ever written
    async fn fetch_record(&self) -> Result<Option<RemoteRecord>>;

    /// Replace the stored record in a single write
    async fn write_record(&self, record: &RemoteRecord) -> Result<()>;

    /// Human-readable location, used in logs and status output
    fn describe(&self) -> String;
}
