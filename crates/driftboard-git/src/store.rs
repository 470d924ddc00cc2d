use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use driftboard_core::scan::id_from_path;
use driftboard_core::store::{RecordStamp, StoreError, TaskStore};
use driftboard_core::task::{Task, TaskSource};

use crate::codec;

/// Local working-tree collaborator over a board directory with `tasks/`,
/// `completed/`, `drafts/`, `archive/tasks/`, `docs/` and `decisions/`
/// subtrees.
pub struct FsStore {
    board_dir: PathBuf,
}

impl FsStore {
    pub fn new(board_dir: impl Into<PathBuf>) -> Self {
        Self {
            board_dir: board_dir.into(),
        }
    }

    pub fn board_dir(&self) -> &Path {
        &self.board_dir
    }

    fn tasks_dir(&self) -> PathBuf {
        self.board_dir.join("tasks")
    }

    fn load_dir(&self, dir: &Path, source: TaskSource) -> Result<Vec<Task>, StoreError> {
        let mut tasks = Vec::new();
        for path in md_files(dir) {
            let text = match fs::read_to_string(&path) {
                Ok(text) => text,
                Err(_) => continue,
            };
            let fallback = id_from_filename(&path);
            let Ok(mut task) = codec::parse_task_source(&text, &fallback) else {
                continue;
            };
            task.last_modified = file_mtime(&path)?;
            task.source = source;
            tasks.push(task);
        }
        Ok(tasks)
    }

    fn stamp_dir(&self, dir: &Path) -> Result<Vec<RecordStamp>, StoreError> {
        let mut stamps = Vec::new();
        for path in md_files(dir) {
            stamps.push(RecordStamp {
                id: id_from_filename(&path),
                last_modified: file_mtime(&path)?,
            });
        }
        Ok(stamps)
    }

    fn ids_in_dir(&self, dir: &Path) -> Vec<String> {
        md_files(dir)
            .iter()
            .map(|path| id_from_filename(path))
            .collect()
    }

    fn task_path(&self, id: &str) -> Option<PathBuf> {
        md_files(&self.tasks_dir())
            .into_iter()
            .find(|path| id_from_filename(path).eq_ignore_ascii_case(id.trim()))
    }
}

impl TaskStore for FsStore {
    fn list_tasks(&self) -> Result<Vec<Task>, StoreError> {
        self.load_dir(&self.tasks_dir(), TaskSource::Local)
    }

    fn list_completed(&self) -> Result<Vec<Task>, StoreError> {
        self.load_dir(&self.board_dir.join("completed"), TaskSource::Completed)
    }

    fn list_archived(&self) -> Result<Vec<RecordStamp>, StoreError> {
        self.stamp_dir(&self.board_dir.join("archive").join("tasks"))
    }

    fn list_drafts(&self) -> Result<Vec<RecordStamp>, StoreError> {
        self.stamp_dir(&self.board_dir.join("drafts"))
    }

    fn list_document_ids(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.ids_in_dir(&self.board_dir.join("docs")))
    }

    fn list_decision_ids(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.ids_in_dir(&self.board_dir.join("decisions")))
    }

    fn load_task(&self, id: &str) -> Result<Task, StoreError> {
        let path = self
            .task_path(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let text = fs::read_to_string(&path)?;
        let mut task = codec::parse_task_source(&text, &id_from_filename(&path)).map_err(
            |err| StoreError::InvalidRecord {
                path: path.display().to_string(),
                reason: err.to_string(),
            },
        )?;
        task.last_modified = file_mtime(&path)?;
        task.source = TaskSource::Local;
        Ok(task)
    }

    fn save_task(&self, task: &Task) -> Result<(), StoreError> {
        // Branch copies are read-only; writing one here would silently
        // materialize another branch's state in the working tree.
        if task.branch.is_some() {
            return Err(StoreError::ReadOnlyBranchCopy(task.id.clone()));
        }
        let tasks_dir = self.tasks_dir();
        fs::create_dir_all(&tasks_dir)?;
        let path = self
            .task_path(&task.id)
            .unwrap_or_else(|| tasks_dir.join(codec::task_filename(&task.id, &task.title)));
        fs::write(path, codec::render_task(task))?;
        Ok(())
    }
}

fn md_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = match fs::read_dir(dir) {
        Ok(read_dir) => read_dir
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().map(|ext| ext == "md").unwrap_or(false))
            .collect(),
        Err(_) => Vec::new(),
    };
    files.sort();
    files
}

fn id_from_filename(path: &Path) -> String {
    id_from_path(&path.to_string_lossy())
}

fn file_mtime(path: &Path) -> Result<DateTime<Utc>, StoreError> {
    let modified = fs::metadata(path)?.modified()?;
    Ok(DateTime::<Utc>::from(modified))
}
