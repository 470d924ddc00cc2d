use chrono::{DateTime, Utc};
use regex::Regex;

/// Where the winning copy of a task came from after reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskSource {
    Local,
    Completed,
    Branch,
    Remote,
}

impl TaskSource {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskSource::Local => "local",
            TaskSource::Completed => "completed",
            TaskSource::Branch => "branch",
            TaskSource::Remote => "remote",
        }
    }

    pub fn is_local(self) -> bool {
        matches!(self, TaskSource::Local | TaskSource::Completed)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub status: String,
    /// Manual sort key within the task's (status, milestone) bucket.
    pub ordinal: Option<f64>,
    pub dependencies: Vec<String>,
    pub parent_task_id: Option<String>,
    pub milestone: Option<String>,
    /// Commit time for branch copies, file mtime for local copies.
    pub last_modified: DateTime<Utc>,
    pub source: TaskSource,
    /// Set whenever the winning content did not come from the local
    /// working tree; such a task is informational and must not be edited.
    pub branch: Option<String>,
    pub body: String,
}

impl Task {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            status: String::new(),
            ordinal: None,
            dependencies: Vec::new(),
            parent_task_id: None,
            milestone: None,
            last_modified: Utc::now(),
            source: TaskSource::Local,
            branch: None,
            body: String::new(),
        }
    }

    pub fn id_num(&self) -> i64 {
        let re = Regex::new(r"(\d+)").expect("regex");
        re.captures(&self.id)
            .and_then(|cap| cap.get(1))
            .and_then(|m| m.as_str().parse::<i64>().ok())
            .unwrap_or(i64::MAX)
    }

    pub fn same_id(&self, other: &str) -> bool {
        self.id.eq_ignore_ascii_case(other)
    }

    pub fn is_done(&self) -> bool {
        self.status.trim().eq_ignore_ascii_case("done")
    }
}

/// Lowercased form used as the map key everywhere tasks are deduplicated.
pub fn norm_id(id: &str) -> String {
    id.trim().to_lowercase()
}

/// Rank of a status within the configured ordered status list.
/// Unranked statuses return `None` and sort below every configured one.
pub fn status_rank(status: &str, statuses: &[String]) -> Option<usize> {
    statuses
        .iter()
        .position(|candidate| candidate.eq_ignore_ascii_case(status.trim()))
}
