use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, TimeZone, Utc};

use driftboard_core::scan::id_from_path;
use driftboard_core::task::Task;
use driftboard_core::vcs::{BranchInfo, RecordKind, Vcs, VcsError};

use crate::codec;

/// Version-control collaborator backed by the `git` binary.
pub struct GitVcs {
    repo_root: PathBuf,
    /// Board directory relative to the repository root, e.g. `board`.
    board_dir: PathBuf,
}

impl GitVcs {
    pub fn new(repo_root: impl Into<PathBuf>, board_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
            board_dir: board_dir.into(),
        }
    }

    fn subtree(&self, kind: RecordKind) -> PathBuf {
        let leaf = match kind {
            RecordKind::Task => "tasks",
            RecordKind::Completed => "completed",
            RecordKind::Draft => "drafts",
            RecordKind::Archived => "archive/tasks",
        };
        self.board_dir.join(leaf)
    }

    fn branches(&self, since: DateTime<Utc>, remote: bool) -> Result<Vec<BranchInfo>> {
        let namespace = if remote { "refs/remotes" } else { "refs/heads" };
        let raw = run_git(
            &self.repo_root,
            &[
                "for-each-ref",
                "--format=%(refname:short)|%(committerdate:unix)",
                namespace,
            ],
        )?;
        let mut branches = Vec::new();
        for line in raw.lines() {
            let Some((name, timestamp)) = line.trim().split_once('|') else {
                continue;
            };
            if name.is_empty() || name.ends_with("/HEAD") {
                continue;
            }
            let seconds: i64 = timestamp
                .trim()
                .parse()
                .with_context(|| format!("committer date for {}", name))?;
            let last_commit = Utc
                .timestamp_opt(seconds, 0)
                .single()
                .ok_or_else(|| anyhow!("committer date out of range for {}", name))?;
            if last_commit >= since {
                branches.push(BranchInfo {
                    name: name.to_string(),
                    last_commit,
                });
            }
        }
        Ok(branches)
    }

    fn records(&self, reference: &str, kind: RecordKind) -> Result<Vec<String>> {
        let subtree = self.subtree(kind);
        let subtree = subtree.to_string_lossy();
        let raw = run_git(
            &self.repo_root,
            &["ls-tree", "-r", "--name-only", reference, "--", subtree.as_ref()],
        )?;
        Ok(raw
            .lines()
            .map(str::trim)
            .filter(|path| path.ends_with(".md"))
            .map(str::to_string)
            .collect())
    }

    fn task_at(&self, reference: &str, path: &str) -> Result<Task> {
        let object = format!("{}:{}", reference, path);
        let raw = run_git(&self.repo_root, &["show", &object])?;
        let task = codec::parse_task_source(&raw, &id_from_path(path))
            .with_context(|| format!("parse {}", object))?;
        Ok(task)
    }
}

impl Vcs for GitVcs {
    fn list_branches(
        &self,
        since: DateTime<Utc>,
        remote: bool,
    ) -> Result<Vec<BranchInfo>, VcsError> {
        self.branches(since, remote)
            .map_err(|err| VcsError::Command(format!("{err:#}")))
    }

    fn list_records(&self, reference: &str, kind: RecordKind) -> Result<Vec<String>, VcsError> {
        self.records(reference, kind)
            .map_err(|err| VcsError::UnreadableRef {
                reference: reference.to_string(),
                reason: format!("{err:#}"),
            })
    }

    fn load_task(&self, reference: &str, path: &str) -> Result<Task, VcsError> {
        self.task_at(reference, path)
            .map_err(|err| VcsError::UnparseableRecord {
                reference: reference.to_string(),
                path: path.to_string(),
                reason: format!("{err:#}"),
            })
    }

    fn has_remote(&self) -> Result<bool, VcsError> {
        run_git(&self.repo_root, &["remote"])
            .map(|raw| !raw.trim().is_empty())
            .map_err(|err| VcsError::Command(format!("{err:#}")))
    }
}

fn run_git(repo_root: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .arg("-C")
        .arg(repo_root)
        .args(args)
        .output()
        .with_context(|| format!("run git {:?} under {}", args, repo_root.display()))?;
    if !output.status.success() {
        return Err(anyhow!(
            "git {} failed: {}",
            args.first().unwrap_or(&""),
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}
