use std::sync::{PoisonError, RwLock};

use thiserror::Error;

use crate::cancel::CancelToken;
use crate::config::BoardConfig;
use crate::reconcile::{reconcile, StateEntry};
use crate::scan::{scan_branches, ScanError};
use crate::store::{StoreError, TaskStore};
use crate::task::{norm_id, Task};
use crate::vcs::{RecordKind, Vcs};

#[derive(Debug, Error)]
pub enum ViewError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Scan(#[from] ScanError),
}

/// Build the active view: local records, cross-branch observations, one
/// reconciled task list. With cross-branch checking disabled this is the
/// local working tree verbatim — no scan, no visibility filtering.
pub fn load_active_view(
    store: &dyn TaskStore,
    vcs: &dyn Vcs,
    config: &BoardConfig,
    cancel: &CancelToken,
    include_completed: bool,
) -> Result<Vec<Task>, ViewError> {
    let local = store.list_tasks()?;
    let completed = store.list_completed()?;

    if !config.check_active_branches {
        let mut tasks = local;
        if include_completed {
            tasks.extend(completed);
        }
        sort_for_display(&mut tasks);
        return Ok(tasks);
    }

    let observations = scan_branches(vcs, config, cancel)?;

    let mut entries: Vec<StateEntry> = local.into_iter().map(StateEntry::local_task).collect();
    entries.extend(completed.into_iter().map(StateEntry::local_completed));
    for stamp in store.list_archived()? {
        entries.push(StateEntry::local_stamp(
            stamp.id,
            RecordKind::Archived,
            stamp.last_modified,
        ));
    }
    for stamp in store.list_drafts()? {
        entries.push(StateEntry::local_stamp(
            stamp.id,
            RecordKind::Draft,
            stamp.last_modified,
        ));
    }
    entries.extend(observations.into_iter().map(StateEntry::from));

    Ok(reconcile(entries, &config.statuses, include_completed))
}

/// Caller-owned cache of the active view. Replaced only atomically after
/// a full reconciliation pass; a point upsert reflects a just-written
/// task without a rescan.
#[derive(Debug, Default)]
pub struct ActiveViewCache {
    inner: RwLock<Option<Vec<Task>>>,
}

impl ActiveViewCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<Vec<Task>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn replace(&self, view: Vec<Task>) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Some(view);
    }

    pub fn invalidate(&self) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Hot-patch one record in place. A no-op when nothing is cached yet:
    /// the next full pass will pick the task up anyway.
    pub fn upsert(&self, task: Task) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(view) = guard.as_mut() {
            match view.iter_mut().find(|cached| cached.same_id(&task.id)) {
                Some(cached) => *cached = task,
                None => view.push(task),
            }
            sort_for_display(view);
        }
    }
}

fn sort_for_display(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| {
        a.id_num()
            .cmp(&b.id_num())
            .then_with(|| norm_id(&a.id).cmp(&norm_id(&b.id)))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RecordStamp;
    use crate::task::TaskSource;
    use crate::vcs::{BranchInfo, VcsError};
    use chrono::{DateTime, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, hour, 0, 0).unwrap()
    }

    fn task_at(id: &str, status: &str, hour: u32) -> Task {
        let mut task = Task::new(id, format!("{id} title"));
        task.status = status.to_string();
        task.last_modified = at(hour);
        task
    }

    #[derive(Default)]
    struct StubStore {
        tasks: Vec<Task>,
        completed: Vec<Task>,
        archived: Vec<RecordStamp>,
    }

    impl TaskStore for StubStore {
        fn list_tasks(&self) -> Result<Vec<Task>, StoreError> {
            Ok(self.tasks.clone())
        }
        fn list_completed(&self) -> Result<Vec<Task>, StoreError> {
            Ok(self.completed.clone())
        }
        fn list_archived(&self) -> Result<Vec<RecordStamp>, StoreError> {
            Ok(self.archived.clone())
        }
        fn list_drafts(&self) -> Result<Vec<RecordStamp>, StoreError> {
            Ok(Vec::new())
        }
        fn list_document_ids(&self) -> Result<Vec<String>, StoreError> {
            Ok(Vec::new())
        }
        fn list_decision_ids(&self) -> Result<Vec<String>, StoreError> {
            Ok(Vec::new())
        }
        fn load_task(&self, id: &str) -> Result<Task, StoreError> {
            self.tasks
                .iter()
                .find(|task| task.same_id(id))
                .cloned()
                .ok_or_else(|| StoreError::NotFound(id.to_string()))
        }
        fn save_task(&self, _task: &Task) -> Result<(), StoreError> {
            Ok(())
        }
    }

    struct StubVcs {
        tasks_on_branch: Vec<(String, Task)>,
    }

    impl Vcs for StubVcs {
        fn list_branches(
            &self,
            _since: DateTime<Utc>,
            remote: bool,
        ) -> Result<Vec<BranchInfo>, VcsError> {
            if remote {
                return Ok(Vec::new());
            }
            let mut names: Vec<String> = self
                .tasks_on_branch
                .iter()
                .map(|(branch, _)| branch.clone())
                .collect();
            names.dedup();
            Ok(names
                .into_iter()
                .map(|name| BranchInfo {
                    name,
                    last_commit: at(6),
                })
                .collect())
        }

        fn list_records(
            &self,
            reference: &str,
            kind: RecordKind,
        ) -> Result<Vec<String>, VcsError> {
            if kind != RecordKind::Task {
                return Ok(Vec::new());
            }
            Ok(self
                .tasks_on_branch
                .iter()
                .filter(|(branch, _)| branch == reference)
                .map(|(_, task)| format!("tasks/{} - x.md", task.id))
                .collect())
        }

        fn load_task(&self, reference: &str, path: &str) -> Result<Task, VcsError> {
            self.tasks_on_branch
                .iter()
                .find(|(branch, task)| {
                    branch == reference && path.contains(task.id.as_str())
                })
                .map(|(_, task)| task.clone())
                .ok_or_else(|| VcsError::UnreadableRef {
                    reference: reference.to_string(),
                    reason: "missing".to_string(),
                })
        }

        fn has_remote(&self) -> Result<bool, VcsError> {
            Ok(false)
        }
    }

    #[test]
    fn disabled_cross_branch_returns_local_verbatim() {
        let store = StubStore {
            tasks: vec![task_at("TASK-2", "To Do", 1), task_at("TASK-1", "To Do", 1)],
            ..StubStore::default()
        };
        let vcs = StubVcs {
            tasks_on_branch: vec![("feature/x".to_string(), task_at("TASK-1", "Done", 9))],
        };
        let mut config = BoardConfig::default();
        config.check_active_branches = false;
        let view =
            load_active_view(&store, &vcs, &config, &CancelToken::new(), false).expect("view");
        assert_eq!(view.len(), 2);
        assert_eq!(view[0].id, "TASK-1");
        assert_eq!(view[0].status, "To Do");
        assert_eq!(view[0].source, TaskSource::Local);
    }

    #[test]
    fn branch_copy_merges_into_the_view() {
        let store = StubStore {
            tasks: vec![task_at("TASK-5", "In Progress", 1)],
            ..StubStore::default()
        };
        let vcs = StubVcs {
            tasks_on_branch: vec![("feature/x".to_string(), task_at("TASK-5", "Done", 2))],
        };
        let view = load_active_view(
            &store,
            &vcs,
            &BoardConfig::default(),
            &CancelToken::new(),
            false,
        )
        .expect("view");
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].status, "Done");
        assert_eq!(view[0].branch.as_deref(), Some("feature/x"));
    }

    #[test]
    fn locally_archived_task_disappears_despite_branch_copy() {
        let store = StubStore {
            archived: vec![RecordStamp {
                id: "TASK-7".to_string(),
                last_modified: at(8),
            }],
            ..StubStore::default()
        };
        let vcs = StubVcs {
            tasks_on_branch: vec![("old".to_string(), task_at("TASK-7", "To Do", 2))],
        };
        let view = load_active_view(
            &store,
            &vcs,
            &BoardConfig::default(),
            &CancelToken::new(),
            false,
        )
        .expect("view");
        assert!(view.is_empty());
    }

    #[test]
    fn cache_replace_get_upsert_invalidate() {
        let cache = ActiveViewCache::new();
        assert!(cache.get().is_none());

        cache.replace(vec![task_at("TASK-2", "To Do", 1)]);
        assert_eq!(cache.get().expect("view").len(), 1);

        cache.upsert(task_at("TASK-1", "In Progress", 2));
        let view = cache.get().expect("view");
        assert_eq!(view.len(), 2);
        assert_eq!(view[0].id, "TASK-1");

        let mut changed = task_at("TASK-2", "Done", 3);
        changed.title = "updated".to_string();
        cache.upsert(changed);
        let view = cache.get().expect("view");
        assert_eq!(view.len(), 2);
        assert_eq!(view[1].status, "Done");

        cache.invalidate();
        assert!(cache.get().is_none());
    }

    #[test]
    fn upsert_without_cached_view_is_a_no_op() {
        let cache = ActiveViewCache::new();
        cache.upsert(task_at("TASK-1", "To Do", 1));
        assert!(cache.get().is_none());
    }
}
