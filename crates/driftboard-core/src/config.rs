use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Conflict strategy for merging divergent full-content copies of a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    /// Prefer the copy whose status ranks furthest along the configured
    /// status list; break ties by recency, then local origin.
    #[default]
    MostProgressed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    pub check_active_branches: bool,
    pub remote_operations: bool,
    /// Branches whose last commit is older than this many days are skipped.
    pub active_branch_days: i64,
    pub task_resolution_strategy: ResolutionStrategy,
    pub statuses: Vec<String>,
    /// Width for zero-padded numeric id suffixes; unset means no padding.
    pub zero_padded_ids: Option<usize>,
    pub task_prefix: String,
    pub draft_prefix: String,
    pub document_prefix: String,
    pub decision_prefix: String,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            check_active_branches: true,
            remote_operations: true,
            active_branch_days: 30,
            task_resolution_strategy: ResolutionStrategy::MostProgressed,
            statuses: vec![
                "To Do".to_string(),
                "In Progress".to_string(),
                "Done".to_string(),
            ],
            zero_padded_ids: None,
            task_prefix: "TASK".to_string(),
            draft_prefix: "DRAFT".to_string(),
            document_prefix: "DOC".to_string(),
            decision_prefix: "DECISION".to_string(),
        }
    }
}

pub fn config_filename_candidates() -> [&'static str; 2] {
    [".driftboard.toml", ".driftboardrc"]
}

pub fn config_path(repo_root: &Path) -> PathBuf {
    repo_root.join(".driftboard.toml")
}

pub fn find_config_root(start: &Path) -> Option<PathBuf> {
    let start = start.canonicalize().unwrap_or_else(|_| start.to_path_buf());
    for candidate in start.ancestors() {
        for name in config_filename_candidates() {
            if candidate.join(name).is_file() {
                return Some(candidate.to_path_buf());
            }
        }
    }
    None
}

pub fn load_config(repo_root: &Path) -> Option<BoardConfig> {
    for name in config_filename_candidates() {
        let path = repo_root.join(name);
        if path.is_file() {
            if let Ok(text) = fs::read_to_string(&path) {
                if let Ok(config) = toml::from_str::<BoardConfig>(&text) {
                    return Some(config);
                }
            }
        }
    }
    None
}

pub fn write_config(repo_root: &Path, config: &BoardConfig) -> Result<PathBuf, ConfigError> {
    let path = config_path(repo_root);
    let body = toml::to_string_pretty(config)?;
    fs::write(&path, body)?;
    Ok(path)
}
