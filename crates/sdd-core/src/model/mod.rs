//! Work-item records and the store-level summary block.

pub mod id;
pub mod item;
pub mod metadata;

pub use id::{generate_id, is_valid_id, slugify};
pub use item::{
    BlockInfo, CommitRef, GitInfo, ParseEnumError, Priority, SessionOutcome, SessionRecord,
    Status, WorkItem, WorkItemType,
};
pub use metadata::{StoreMetadata, recompute_metadata};
