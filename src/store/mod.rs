//! Local durable state: the mapping store primitive and the decision store on top of it.

mod decisions;
mod mapping;

pub use decisions::{DecisionStore, KeptPolicy, Statistics, DEFAULT_COOLDOWN_SECS};
pub use mapping::{JsonFileStore, MappingStore, MemoryStore};

pub(crate) use mapping::write_atomically;
