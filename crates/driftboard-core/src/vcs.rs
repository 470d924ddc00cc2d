use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::task::Task;

#[derive(Debug, Error)]
pub enum VcsError {
    #[error("VCS command failed: {0}")]
    Command(String),
    #[error("Unreadable ref {reference}: {reason}")]
    UnreadableRef { reference: String, reason: String },
    #[error("Unparseable record {path} at {reference}: {reason}")]
    UnparseableRecord {
        reference: String,
        path: String,
        reason: String,
    },
}

/// Which subtree a record was found under on a given ref.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Task,
    Completed,
    Draft,
    Archived,
}

impl RecordKind {
    pub const ALL: [RecordKind; 4] = [
        RecordKind::Task,
        RecordKind::Completed,
        RecordKind::Draft,
        RecordKind::Archived,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::Task => "task",
            RecordKind::Completed => "completed",
            RecordKind::Draft => "draft",
            RecordKind::Archived => "archived",
        }
    }

    /// Kinds whose records carry full content worth loading during a scan.
    pub fn has_content(self) -> bool {
        matches!(self, RecordKind::Task | RecordKind::Completed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchInfo {
    pub name: String,
    pub last_commit: DateTime<Utc>,
}

/// The version-control collaborator. Implementations own branch listing,
/// tree listing and record reads at a ref; this crate never touches the
/// repository directly.
pub trait Vcs: Send + Sync {
    /// Branches (local or remote-tracking) whose last commit is at or
    /// after `since`, in repository order.
    fn list_branches(&self, since: DateTime<Utc>, remote: bool) -> Result<Vec<BranchInfo>, VcsError>;

    /// Record paths under the subtree that classifies `kind` on `reference`.
    fn list_records(&self, reference: &str, kind: RecordKind) -> Result<Vec<String>, VcsError>;

    /// Parse the record at `path` on `reference` into a task.
    fn load_task(&self, reference: &str, path: &str) -> Result<Task, VcsError>;

    fn has_remote(&self) -> Result<bool, VcsError>;
}
