use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::task::Task;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Task not found: {0}")]
    NotFound(String),
    #[error("Invalid record {path}: {reason}")]
    InvalidRecord { path: String, reason: String },
    #[error("Cannot save {0}: it is a read-only copy from another branch")]
    ReadOnlyBranchCopy(String),
}

/// Id plus modification time for records whose content is never merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordStamp {
    pub id: String,
    pub last_modified: DateTime<Utc>,
}

/// The local working-tree collaborator. Drafts, documents and decisions
/// are listed by id only; they are never branch-merged.
pub trait TaskStore {
    fn list_tasks(&self) -> Result<Vec<Task>, StoreError>;
    fn list_completed(&self) -> Result<Vec<Task>, StoreError>;
    fn list_archived(&self) -> Result<Vec<RecordStamp>, StoreError>;
    fn list_drafts(&self) -> Result<Vec<RecordStamp>, StoreError>;
    fn list_document_ids(&self) -> Result<Vec<String>, StoreError>;
    fn list_decision_ids(&self) -> Result<Vec<String>, StoreError>;
    fn load_task(&self, id: &str) -> Result<Task, StoreError>;
    fn save_task(&self, task: &Task) -> Result<(), StoreError>;
}
