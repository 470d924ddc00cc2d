use std::collections::HashSet;

use thiserror::Error;

use crate::task::{norm_id, Task};

/// Ordinals closer than this are treated as the same value; a midpoint
/// that lands inside the gap signals a bucket rebalance.
pub const MIN_ORDINAL_GAP: f64 = 1e-9;

pub const DEFAULT_ORDINAL_STEP: f64 = 10.0;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrdinalError {
    #[error("Duplicate task id in order list: {0}")]
    DuplicateId(String),
    #[error("Cannot reorder {0}: it is a read-only copy from another branch")]
    BranchCopy(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrdinalPlacement {
    pub ordinal: f64,
    /// The computed value is not distinguishable from its neighbors; the
    /// caller should resequence the whole bucket.
    pub requires_rebalance: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrdinalUpdate {
    pub id: String,
    pub ordinal: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct OrdinalOptions {
    pub default_step: f64,
    pub start_ordinal: f64,
    /// Rewrite every ordinal sequentially, used right after a
    /// rebalance-triggering move.
    pub force_sequential: bool,
}

impl Default for OrdinalOptions {
    fn default() -> Self {
        Self {
            default_step: DEFAULT_ORDINAL_STEP,
            start_ordinal: DEFAULT_ORDINAL_STEP,
            force_sequential: false,
        }
    }
}

/// Ordinal for a task dropped between `previous` and `next` in its
/// (status, milestone) bucket.
pub fn calculate_new_ordinal(
    previous: Option<f64>,
    next: Option<f64>,
    default_step: f64,
) -> OrdinalPlacement {
    match (previous, next) {
        (Some(previous), Some(next)) => {
            let ordinal = (previous + next) / 2.0;
            let requires_rebalance =
                ordinal - previous < MIN_ORDINAL_GAP || next - ordinal < MIN_ORDINAL_GAP;
            OrdinalPlacement {
                ordinal,
                requires_rebalance,
            }
        }
        (Some(previous), None) => OrdinalPlacement {
            ordinal: previous + default_step,
            requires_rebalance: false,
        },
        (None, Some(next)) => {
            // Clamp to stay above zero when there is no room for a full step.
            let ordinal = if next - default_step > 0.0 {
                next - default_step
            } else {
                next / 2.0
            };
            OrdinalPlacement {
                ordinal,
                requires_rebalance: ordinal <= 0.0 || next - ordinal < MIN_ORDINAL_GAP,
            }
        }
        (None, None) => OrdinalPlacement {
            ordinal: default_step,
            requires_rebalance: false,
        },
    }
}

/// Walk tasks in display order and emit updates wherever the existing
/// ordinals are missing, colliding or out of order. Duplicate ordinals
/// force sequential rewrites from the first duplicate position onward.
pub fn resolve_ordinal_conflicts(
    tasks_in_order: &[Task],
    options: &OrdinalOptions,
) -> Result<Vec<OrdinalUpdate>, OrdinalError> {
    let mut seen = HashSet::new();
    for task in tasks_in_order {
        if !seen.insert(norm_id(&task.id)) {
            return Err(OrdinalError::DuplicateId(task.id.clone()));
        }
    }

    let mut updates = Vec::new();
    let mut previous: Option<f64> = None;
    let mut sequential = options.force_sequential;
    for (idx, task) in tasks_in_order.iter().enumerate() {
        let existing = task.ordinal;
        let next_existing = tasks_in_order.get(idx + 1).and_then(|next| next.ordinal);
        if matches!((existing, next_existing), (Some(a), Some(b)) if a == b) {
            sequential = true;
        }

        let in_order = match existing {
            Some(ordinal) => match previous {
                Some(previous) => ordinal - previous >= MIN_ORDINAL_GAP,
                None => ordinal > 0.0,
            },
            None => false,
        };

        if !sequential && in_order {
            previous = existing;
            continue;
        }
        // Branch copies are read-only; refuse rather than rewrite one.
        if task.branch.is_some() {
            return Err(OrdinalError::BranchCopy(task.id.clone()));
        }
        let assigned = match previous {
            Some(previous) => previous + options.default_step,
            None => options.start_ordinal,
        };
        updates.push(OrdinalUpdate {
            id: task.id.clone(),
            ordinal: assigned,
        });
        previous = Some(assigned);
    }
    Ok(updates)
}
