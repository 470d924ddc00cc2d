use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use log::debug;

use crate::scan::BranchObservation;
use crate::task::{norm_id, status_rank, Task, TaskSource};
use crate::vcs::RecordKind;

/// One classified observation of a task id, from any source. Local
/// entries carry full content for task/completed records; archived and
/// draft entries carry classification only.
#[derive(Debug, Clone)]
pub struct StateEntry {
    pub id: String,
    pub kind: RecordKind,
    pub source: TaskSource,
    pub branch: Option<String>,
    pub last_modified: DateTime<Utc>,
    pub task: Option<Task>,
}

impl StateEntry {
    pub fn local_task(task: Task) -> Self {
        Self {
            id: task.id.clone(),
            kind: RecordKind::Task,
            source: TaskSource::Local,
            branch: None,
            last_modified: task.last_modified,
            task: Some(task),
        }
    }

    pub fn local_completed(task: Task) -> Self {
        Self {
            id: task.id.clone(),
            kind: RecordKind::Completed,
            source: TaskSource::Completed,
            branch: None,
            last_modified: task.last_modified,
            task: Some(task),
        }
    }

    pub fn local_stamp(id: impl Into<String>, kind: RecordKind, last_modified: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            kind,
            source: TaskSource::Local,
            branch: None,
            last_modified,
            task: None,
        }
    }
}

impl From<BranchObservation> for StateEntry {
    fn from(observation: BranchObservation) -> Self {
        Self {
            id: observation.id,
            kind: observation.kind,
            source: if observation.remote {
                TaskSource::Remote
            } else {
                TaskSource::Branch
            },
            branch: Some(observation.branch),
            last_modified: observation.last_modified,
            task: observation.task,
        }
    }
}

/// Merge every observation of every task id into one deduplicated,
/// filtered task list. Pure: identical inputs reconcile identically
/// regardless of entry order — every selection below is a total order.
pub fn reconcile(entries: Vec<StateEntry>, statuses: &[String], include_completed: bool) -> Vec<Task> {
    let mut by_id: BTreeMap<String, Vec<StateEntry>> = BTreeMap::new();
    for entry in entries {
        by_id.entry(norm_id(&entry.id)).or_default().push(entry);
    }

    let mut tasks = Vec::new();
    for (id, candidates) in by_id {
        // Step 1: where does the task currently live?
        let Some(current_kind) = candidates
            .iter()
            .max_by(|a, b| recency_order(a, b))
            .map(|entry| entry.kind)
        else {
            continue;
        };
        let visible = match current_kind {
            RecordKind::Task => true,
            RecordKind::Completed => include_completed,
            RecordKind::Draft | RecordKind::Archived => false,
        };
        if !visible {
            debug!("{} hidden: newest observation is {}", id, current_kind.as_str());
            continue;
        }

        // Step 2: which full-content copy wins?
        let winner = candidates
            .iter()
            .filter(|entry| entry.task.is_some())
            .filter(|entry| match entry.kind {
                RecordKind::Task => true,
                RecordKind::Completed => include_completed,
                _ => false,
            })
            .max_by(|a, b| progress_order(a, b, statuses));
        let Some(winner) = winner else {
            debug!("{} dropped: no full-content copy among visible sources", id);
            continue;
        };

        let Some(mut task) = winner.task.clone() else {
            continue;
        };
        task.last_modified = winner.last_modified;
        task.source = winner.source;
        task.branch = winner.branch.clone();
        tasks.push(task);
    }

    tasks.sort_by(|a, b| {
        a.id_num()
            .cmp(&b.id_num())
            .then_with(|| norm_id(&a.id).cmp(&norm_id(&b.id)))
    });
    tasks
}

/// Total order for latest-state resolution: recency, then local origin,
/// then (purely for determinism) earliest branch label.
fn recency_order(a: &StateEntry, b: &StateEntry) -> Ordering {
    a.last_modified
        .cmp(&b.last_modified)
        .then_with(|| a.source.is_local().cmp(&b.source.is_local()))
        .then_with(|| branch_label(b).cmp(branch_label(a)))
}

/// Total order for content merge under `most_progressed`: status rank in
/// the configured list (unranked below all), then the recency order.
fn progress_order(a: &StateEntry, b: &StateEntry, statuses: &[String]) -> Ordering {
    entry_rank(a, statuses)
        .cmp(&entry_rank(b, statuses))
        .then_with(|| recency_order(a, b))
}

fn entry_rank(entry: &StateEntry, statuses: &[String]) -> i64 {
    entry
        .task
        .as_ref()
        .and_then(|task| status_rank(&task.status, statuses))
        .map(|rank| rank as i64)
        .unwrap_or(-1)
}

fn branch_label(entry: &StateEntry) -> &str {
    entry.branch.as_deref().unwrap_or("")
}
