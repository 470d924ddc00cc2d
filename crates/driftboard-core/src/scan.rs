use std::thread;

use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};
use regex::Regex;
use thiserror::Error;

use crate::cancel::CancelToken;
use crate::config::BoardConfig;
use crate::task::Task;
use crate::vcs::{RecordKind, Vcs};

#[derive(Debug, Error)]
pub enum ScanError {
    /// The shared token was triggered; retry once the caller is ready.
    #[error("Branch scan cancelled")]
    Cancelled,
}

/// One raw observation: "as of this scan, `id` was classified `kind` on
/// `branch`". Full content rides along for task/completed records so the
/// reconciler never re-reads the VCS.
#[derive(Debug, Clone)]
pub struct BranchObservation {
    pub id: String,
    pub kind: RecordKind,
    pub branch: String,
    pub remote: bool,
    pub last_modified: DateTime<Utc>,
    pub task: Option<Task>,
}

/// Recover a task id from a record path, e.g.
/// `tasks/TASK-12 - fix login.md` -> `TASK-12`.
pub fn id_from_path(path: &str) -> String {
    let file_stem = path
        .rsplit('/')
        .next()
        .unwrap_or(path)
        .trim_end_matches(".md");
    let re = Regex::new(r"(?i)([a-z][a-z0-9]*-\d+(?:\.\d+)*)").expect("regex");
    re.captures(file_stem)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| file_stem.trim().to_string())
}

/// Enumerate qualifying branches and emit per-task state observations.
///
/// The local and remote passes run concurrently and are joined before the
/// results merge; within a pass branches are visited one at a time.
/// A single unreadable branch or ref is logged and skipped; cancellation
/// aborts the whole scan without partial results.
pub fn scan_branches(
    vcs: &dyn Vcs,
    config: &BoardConfig,
    cancel: &CancelToken,
) -> Result<Vec<BranchObservation>, ScanError> {
    if !config.check_active_branches {
        return Ok(Vec::new());
    }
    let cutoff = Utc::now() - Duration::days(config.active_branch_days.max(0));
    let scan_remote = config.remote_operations && vcs.has_remote().unwrap_or(false);

    let (local, remote) = thread::scope(|scope| {
        let local_pass = scope.spawn(|| scan_pass(vcs, cutoff, false, cancel));
        let remote_pass = scope.spawn(|| {
            if scan_remote {
                scan_pass(vcs, cutoff, true, cancel)
            } else {
                Ok(Vec::new())
            }
        });
        let local = join_pass(local_pass);
        let remote = join_pass(remote_pass);
        (local, remote)
    });

    if cancel.is_cancelled() {
        return Err(ScanError::Cancelled);
    }
    let mut observations = local?;
    observations.extend(remote?);
    Ok(observations)
}

// A panicked pass resumes its panic in the caller rather than being
// reported as a retryable cancellation.
fn join_pass(
    handle: thread::ScopedJoinHandle<'_, Result<Vec<BranchObservation>, ScanError>>,
) -> Result<Vec<BranchObservation>, ScanError> {
    match handle.join() {
        Ok(result) => result,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

fn scan_pass(
    vcs: &dyn Vcs,
    cutoff: DateTime<Utc>,
    remote: bool,
    cancel: &CancelToken,
) -> Result<Vec<BranchObservation>, ScanError> {
    let branches = match vcs.list_branches(cutoff, remote) {
        Ok(branches) => branches,
        Err(err) => {
            warn!(
                "skipping {} branch pass: {}",
                if remote { "remote" } else { "local" },
                err
            );
            return Ok(Vec::new());
        }
    };

    let mut observations = Vec::new();
    for branch in branches {
        if cancel.is_cancelled() {
            return Err(ScanError::Cancelled);
        }
        match scan_branch(vcs, &branch.name, branch.last_commit, remote) {
            Ok(found) => observations.extend(found),
            Err(err) => warn!("skipping branch {}: {}", branch.name, err),
        }
    }
    Ok(observations)
}

fn scan_branch(
    vcs: &dyn Vcs,
    branch: &str,
    last_commit: DateTime<Utc>,
    remote: bool,
) -> Result<Vec<BranchObservation>, crate::vcs::VcsError> {
    let mut observations = Vec::new();
    for kind in RecordKind::ALL {
        let paths = vcs.list_records(branch, kind)?;
        debug!("{}: {} {} records", branch, paths.len(), kind.as_str());
        for path in paths {
            let task = if kind.has_content() {
                match vcs.load_task(branch, &path) {
                    Ok(task) => Some(task),
                    Err(err) => {
                        warn!("skipping record {} on {}: {}", path, branch, err);
                        None
                    }
                }
            } else {
                None
            };
            observations.push(BranchObservation {
                id: task
                    .as_ref()
                    .map(|task| task.id.clone())
                    .unwrap_or_else(|| id_from_path(&path)),
                kind,
                branch: branch.to_string(),
                remote,
                last_modified: last_commit,
                task,
            });
        }
    }
    Ok(observations)
}
