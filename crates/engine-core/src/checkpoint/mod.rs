mod models;
mod store;

pub use models::{OutcomeRow, PendingItem, ScanCursor, WorkItem};
pub use store::CheckpointStore;
