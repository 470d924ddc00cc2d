use regex::Regex;

use crate::config::BoardConfig;

/// Entity kinds that receive allocated identifiers. Only tasks are
/// branch-merged; the other kinds scan their own local collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Task,
    Draft,
    Document,
    Decision,
}

impl EntityKind {
    fn prefix<'a>(self, config: &'a BoardConfig) -> &'a str {
        match self {
            EntityKind::Task => &config.task_prefix,
            EntityKind::Draft => &config.draft_prefix,
            EntityKind::Document => &config.document_prefix,
            EntityKind::Decision => &config.decision_prefix,
        }
    }
}

/// Next unused `<PREFIX>-<N>` id, or `<parent>.<n>` when a parent task id
/// is supplied. `existing_ids` must be the reconciled active+completed id
/// set for tasks (archived and draft ids are reusable and excluded), or
/// the entity's own collection for the other kinds.
///
/// Allocation is advisory: two concurrent callers may compute the same
/// id, and collision handling on write belongs to the writer.
pub fn next_id(
    kind: EntityKind,
    parent: Option<&str>,
    existing_ids: &[String],
    config: &BoardConfig,
) -> String {
    if let (EntityKind::Task, Some(parent)) = (kind, parent) {
        return next_subtask_id(existing_ids, parent);
    }
    let prefix = kind.prefix(config);
    let pattern = format!(r"(?i)^{}-0*(\d+)$", regex::escape(prefix));
    let next = max_suffix(existing_ids, &pattern) + 1;
    match config.zero_padded_ids {
        Some(width) => format!("{}-{:0width$}", prefix, next, width = width),
        None => format!("{}-{}", prefix, next),
    }
}

/// Next `<parent-id>.<n>` for a direct subtask, matched case-insensitively.
pub fn next_subtask_id(existing_ids: &[String], parent_id: &str) -> String {
    let pattern = format!(r"(?i)^{}\.0*(\d+)$", regex::escape(parent_id.trim()));
    let next = max_suffix(existing_ids, &pattern) + 1;
    format!("{}.{}", parent_id.trim(), next)
}

fn max_suffix(existing_ids: &[String], pattern: &str) -> u64 {
    let re = Regex::new(pattern).expect("regex");
    existing_ids
        .iter()
        .filter_map(|id| re.captures(id.trim()))
        .filter_map(|cap| cap.get(1))
        .filter_map(|m| m.as_str().parse::<u64>().ok())
        .max()
        .unwrap_or(0)
}
