pub mod actor;
pub mod engine;
pub mod entry_status;
pub mod error;
pub mod model;
pub mod monthly;
pub mod page;
pub mod repository;
pub mod review;
pub mod staging;
pub mod storage;

#[cfg(test)]
mod testing;

pub use actor::Actor;
pub use entry_status::EntryStatus;
pub use error::{CoreError, StoreError};
pub use model::{EvidenceFile, EvidenceKind, NaturalKey, UsageRecord};
