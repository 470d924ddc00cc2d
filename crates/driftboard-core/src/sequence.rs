use std::collections::{HashMap, HashSet, VecDeque};

use thiserror::Error;

use crate::task::{norm_id, Task};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SequenceError {
    #[error("Task not found: {0}")]
    TaskNotFound(String),
    #[error("Sequence index must be between 1 and {max}, got {target}")]
    InvalidTarget { target: usize, max: usize },
    #[error("Sequence {target} is unreachable by editing only {task_id}")]
    UnreachableTarget { task_id: String, target: usize },
    #[error("Cannot edit {0}: it is a read-only copy from another branch")]
    BranchCopy(String),
}

/// One dependency level: every in-scope dependency of a member lies in an
/// earlier sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
    /// 1-based.
    pub index: usize,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SequenceOutcome {
    pub sequences: Vec<Sequence>,
    /// Tasks outside the dependency graph (no in-scope dependencies and
    /// no in-scope dependents) or blocked by a cycle.
    pub unsequenced: Vec<Task>,
}

/// A whole-list rewrite of one task's dependency field.
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyEdit {
    pub task_id: String,
    pub dependencies: Vec<String>,
}

/// Partition the active, non-terminal task set into dependency levels.
/// Dependencies pointing outside the set (done, archived or unknown ids)
/// are ignored for leveling. Runs in O(V+E) and terminates on cycles:
/// cycle members simply never level and land in `unsequenced`.
pub fn compute_sequences(tasks: &[Task]) -> SequenceOutcome {
    let active: Vec<&Task> = tasks.iter().filter(|task| !task.is_done()).collect();
    let index_of: HashMap<String, usize> = active
        .iter()
        .enumerate()
        .map(|(idx, task)| (norm_id(&task.id), idx))
        .collect();

    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); active.len()];
    let mut indegree: Vec<usize> = vec![0; active.len()];
    for (idx, task) in active.iter().enumerate() {
        for dep in &task.dependencies {
            if let Some(&dep_idx) = index_of.get(&norm_id(dep)) {
                dependents[dep_idx].push(idx);
                indegree[idx] += 1;
            }
        }
    }

    let participates: Vec<bool> = (0..active.len())
        .map(|idx| indegree[idx] > 0 || !dependents[idx].is_empty())
        .collect();

    let mut remaining = indegree.clone();
    let mut assigned = vec![false; active.len()];
    let mut frontier: Vec<usize> = (0..active.len())
        .filter(|&idx| participates[idx] && remaining[idx] == 0)
        .collect();

    let mut sequences = Vec::new();
    while !frontier.is_empty() {
        let mut next = Vec::new();
        for &idx in &frontier {
            assigned[idx] = true;
            for &dependent in &dependents[idx] {
                remaining[dependent] -= 1;
                if remaining[dependent] == 0 {
                    next.push(dependent);
                }
            }
        }
        let mut level: Vec<Task> = frontier.iter().map(|&idx| active[idx].clone()).collect();
        sort_for_display(&mut level);
        sequences.push(Sequence {
            index: sequences.len() + 1,
            tasks: level,
        });
        frontier = next;
    }

    let mut unsequenced: Vec<Task> = (0..active.len())
        .filter(|&idx| !assigned[idx])
        .map(|idx| active[idx].clone())
        .collect();
    sort_for_display(&mut unsequenced);

    SequenceOutcome {
        sequences,
        unsequenced,
    }
}

/// Minimal dependency edits on `task_id` alone so that recomputing levels
/// places it in sequence `target_index`.
pub fn plan_move_to_sequence(
    all_tasks: &[Task],
    sequences: &[Sequence],
    task_id: &str,
    target_index: usize,
) -> Result<Vec<DependencyEdit>, SequenceError> {
    let task = find_task(all_tasks, task_id)?;
    if task.branch.is_some() {
        return Err(SequenceError::BranchCopy(task.id.clone()));
    }
    let max = sequences.len() + 1;
    if target_index == 0 || target_index > max {
        return Err(SequenceError::InvalidTarget {
            target: target_index,
            max,
        });
    }

    let level_of: HashMap<String, usize> = sequences
        .iter()
        .flat_map(|sequence| {
            sequence
                .tasks
                .iter()
                .map(move |task| (norm_id(&task.id), sequence.index))
        })
        .collect();
    let active_ids: HashSet<String> = all_tasks
        .iter()
        .filter(|task| !task.is_done())
        .map(|task| norm_id(&task.id))
        .collect();
    let downstream = transitive_dependents(all_tasks, task_id);

    // Keep out-of-scope references untouched; drop in-scope dependencies
    // at or above the target level (and any that cannot level at all).
    let mut new_deps: Vec<String> = Vec::new();
    let mut max_kept_level = 0usize;
    for dep in &task.dependencies {
        let key = norm_id(dep);
        match level_of.get(&key) {
            Some(&level) if level < target_index => {
                max_kept_level = max_kept_level.max(level);
                new_deps.push(dep.clone());
            }
            Some(_) => {}
            None if !active_ids.contains(&key) => new_deps.push(dep.clone()),
            None => {}
        }
    }

    if target_index == 1 {
        let has_dependent = all_tasks.iter().any(|other| {
            !other.is_done()
                && !other.same_id(task_id)
                && other.dependencies.iter().any(|dep| task.same_id(dep))
        });
        if !has_dependent {
            return Err(SequenceError::UnreachableTarget {
                task_id: task.id.clone(),
                target: target_index,
            });
        }
    } else if max_kept_level != target_index - 1 {
        let anchor = sequences
            .iter()
            .find(|sequence| sequence.index == target_index - 1)
            .and_then(|sequence| {
                sequence.tasks.iter().find(|candidate| {
                    !candidate.same_id(&task.id) && !downstream.contains(&norm_id(&candidate.id))
                })
            });
        match anchor {
            Some(anchor) => new_deps.push(anchor.id.clone()),
            None => {
                return Err(SequenceError::UnreachableTarget {
                    task_id: task.id.clone(),
                    target: target_index,
                })
            }
        }
    }

    if same_dependency_set(&task.dependencies, &new_deps) {
        return Ok(Vec::new());
    }
    Ok(vec![DependencyEdit {
        task_id: task.id.clone(),
        dependencies: new_deps,
    }])
}

/// Edits that detach `task_id` from the dependency graph entirely: its
/// own in-scope dependencies are dropped and every dependent stops
/// referencing it.
pub fn plan_move_to_unsequenced(
    all_tasks: &[Task],
    task_id: &str,
) -> Result<Vec<DependencyEdit>, SequenceError> {
    let task = find_task(all_tasks, task_id)?;
    if task.branch.is_some() {
        return Err(SequenceError::BranchCopy(task.id.clone()));
    }
    let active_ids: HashSet<String> = all_tasks
        .iter()
        .filter(|task| !task.is_done())
        .map(|task| norm_id(&task.id))
        .collect();

    let mut edits = Vec::new();
    let own_deps: Vec<String> = task
        .dependencies
        .iter()
        .filter(|dep| !active_ids.contains(&norm_id(dep)))
        .cloned()
        .collect();
    if !same_dependency_set(&task.dependencies, &own_deps) {
        edits.push(DependencyEdit {
            task_id: task.id.clone(),
            dependencies: own_deps,
        });
    }

    for other in all_tasks {
        if other.same_id(&task.id) || other.is_done() {
            continue;
        }
        if other.dependencies.iter().any(|dep| task.same_id(dep)) {
            if other.branch.is_some() {
                return Err(SequenceError::BranchCopy(other.id.clone()));
            }
            let remaining: Vec<String> = other
                .dependencies
                .iter()
                .filter(|dep| !task.same_id(dep))
                .cloned()
                .collect();
            edits.push(DependencyEdit {
                task_id: other.id.clone(),
                dependencies: remaining,
            });
        }
    }
    Ok(edits)
}

fn find_task<'a>(tasks: &'a [Task], task_id: &str) -> Result<&'a Task, SequenceError> {
    tasks
        .iter()
        .find(|task| task.same_id(task_id))
        .ok_or_else(|| SequenceError::TaskNotFound(task_id.to_string()))
}

/// Every active task that depends on `task_id`, transitively. Traversal
/// is id-keyed with a visited set so cycles cannot loop.
fn transitive_dependents(tasks: &[Task], task_id: &str) -> HashSet<String> {
    let mut dependents_of: HashMap<String, Vec<String>> = HashMap::new();
    for task in tasks.iter().filter(|task| !task.is_done()) {
        for dep in &task.dependencies {
            dependents_of
                .entry(norm_id(dep))
                .or_default()
                .push(norm_id(&task.id));
        }
    }

    let mut visited = HashSet::new();
    let mut queue = VecDeque::from([norm_id(task_id)]);
    while let Some(current) = queue.pop_front() {
        if let Some(dependents) = dependents_of.get(&current) {
            for dependent in dependents {
                if visited.insert(dependent.clone()) {
                    queue.push_back(dependent.clone());
                }
            }
        }
    }
    visited
}

fn same_dependency_set(a: &[String], b: &[String]) -> bool {
    let left: HashSet<String> = a.iter().map(|dep| norm_id(dep)).collect();
    let right: HashSet<String> = b.iter().map(|dep| norm_id(dep)).collect();
    left == right
}

fn sort_for_display(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| {
        a.ordinal
            .unwrap_or(f64::INFINITY)
            .total_cmp(&b.ordinal.unwrap_or(f64::INFINITY))
            .then_with(|| a.id_num().cmp(&b.id_num()))
            .then_with(|| norm_id(&a.id).cmp(&norm_id(&b.id)))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn task_with_deps(id: &str, deps: &[&str]) -> Task {
        let mut task = Task::new(id, format!("{id} title"));
        task.status = "To Do".to_string();
        task.dependencies = deps.iter().map(|dep| dep.to_string()).collect();
        task
    }

    fn ids(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|task| task.id.as_str()).collect()
    }

    #[test]
    fn chains_level_one_task_per_sequence() {
        let tasks = vec![
            task_with_deps("A-1", &[]),
            task_with_deps("A-2", &["A-1"]),
            task_with_deps("A-3", &["A-2"]),
            task_with_deps("A-4", &["A-1", "A-3"]),
        ];
        let outcome = compute_sequences(&tasks);
        let levels: Vec<Vec<&str>> = outcome
            .sequences
            .iter()
            .map(|sequence| ids(&sequence.tasks))
            .collect();
        assert_eq!(levels, vec![vec!["A-1"], vec!["A-2"], vec!["A-3"], vec!["A-4"]]);
        assert_eq!(outcome.sequences[3].index, 4);
        assert!(outcome.unsequenced.is_empty());
    }

    #[test]
    fn cycles_terminate_and_land_in_unsequenced() {
        let tasks = vec![
            task_with_deps("A-5", &["A-6"]),
            task_with_deps("A-6", &["A-5"]),
        ];
        let outcome = compute_sequences(&tasks);
        assert!(outcome.sequences.is_empty());
        assert_eq!(ids(&outcome.unsequenced), vec!["A-5", "A-6"]);
    }

    #[test]
    fn tasks_blocked_behind_a_cycle_are_unsequenced_too() {
        let tasks = vec![
            task_with_deps("A-1", &["A-2"]),
            task_with_deps("A-2", &["A-1"]),
            task_with_deps("A-3", &["A-2"]),
        ];
        let outcome = compute_sequences(&tasks);
        assert!(outcome.sequences.is_empty());
        assert_eq!(outcome.unsequenced.len(), 3);
    }

    #[test]
    fn done_and_unknown_dependencies_are_ignored() {
        let mut done = task_with_deps("A-1", &[]);
        done.status = "Done".to_string();
        let tasks = vec![
            done,
            task_with_deps("A-2", &["A-1", "A-9"]),
            task_with_deps("A-3", &["A-2"]),
        ];
        let outcome = compute_sequences(&tasks);
        let levels: Vec<Vec<&str>> = outcome
            .sequences
            .iter()
            .map(|sequence| ids(&sequence.tasks))
            .collect();
        assert_eq!(levels, vec![vec!["A-2"], vec!["A-3"]]);
    }

    #[test]
    fn isolated_tasks_are_unsequenced() {
        let tasks = vec![
            task_with_deps("A-1", &[]),
            task_with_deps("A-2", &["A-1"]),
            task_with_deps("A-7", &[]),
        ];
        let outcome = compute_sequences(&tasks);
        assert_eq!(ids(&outcome.sequences[0].tasks), vec!["A-1"]);
        assert_eq!(ids(&outcome.unsequenced), vec!["A-7"]);
    }

    #[test]
    fn move_to_earlier_sequence_drops_late_dependencies() {
        let tasks = vec![
            task_with_deps("A-1", &[]),
            task_with_deps("A-2", &["A-1"]),
            task_with_deps("A-3", &["A-2"]),
            task_with_deps("A-4", &["A-1", "A-3"]),
        ];
        let outcome = compute_sequences(&tasks);
        let edits = plan_move_to_sequence(&tasks, &outcome.sequences, "A-4", 2).expect("plan");
        assert_eq!(
            edits,
            vec![DependencyEdit {
                task_id: "A-4".to_string(),
                dependencies: vec!["A-1".to_string()],
            }]
        );
    }

    #[test]
    fn move_to_later_sequence_borrows_an_anchor_dependency() {
        let tasks = vec![
            task_with_deps("A-1", &[]),
            task_with_deps("A-2", &["A-1"]),
            task_with_deps("A-3", &["A-1"]),
        ];
        let outcome = compute_sequences(&tasks);
        // A-2 and A-3 share level 2; push A-3 to a new level 3.
        let edits = plan_move_to_sequence(&tasks, &outcome.sequences, "A-3", 3).expect("plan");
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].task_id, "A-3");
        assert!(edits[0].dependencies.contains(&"A-1".to_string()));
        assert!(edits[0].dependencies.contains(&"A-2".to_string()));
    }

    #[test]
    fn already_placed_task_needs_no_edits() {
        let tasks = vec![
            task_with_deps("A-1", &[]),
            task_with_deps("A-2", &["A-1"]),
        ];
        let outcome = compute_sequences(&tasks);
        let edits = plan_move_to_sequence(&tasks, &outcome.sequences, "A-2", 2).expect("plan");
        assert!(edits.is_empty());
    }

    #[test]
    fn unreachable_target_is_a_validation_error() {
        let tasks = vec![
            task_with_deps("A-1", &[]),
            task_with_deps("A-2", &["A-1"]),
            task_with_deps("A-3", &["A-2"]),
        ];
        let outcome = compute_sequences(&tasks);
        // A-1 is the only level-1 task, so no anchor remains once it is excluded.
        let err = plan_move_to_sequence(&tasks, &outcome.sequences, "A-1", 2)
            .expect_err("unreachable");
        assert_eq!(
            err,
            SequenceError::UnreachableTarget {
                task_id: "A-1".to_string(),
                target: 2,
            }
        );
    }

    #[test]
    fn zero_and_oversized_targets_are_rejected() {
        let tasks = vec![task_with_deps("A-1", &[]), task_with_deps("A-2", &["A-1"])];
        let outcome = compute_sequences(&tasks);
        assert!(matches!(
            plan_move_to_sequence(&tasks, &outcome.sequences, "A-2", 0),
            Err(SequenceError::InvalidTarget { target: 0, .. })
        ));
        assert!(matches!(
            plan_move_to_sequence(&tasks, &outcome.sequences, "A-2", 9),
            Err(SequenceError::InvalidTarget { target: 9, .. })
        ));
    }

    #[test]
    fn move_to_unsequenced_detaches_both_directions() {
        let tasks = vec![
            task_with_deps("A-1", &[]),
            task_with_deps("A-2", &["A-1"]),
            task_with_deps("A-3", &["A-2", "A-9"]),
        ];
        let edits = plan_move_to_unsequenced(&tasks, "A-2").expect("plan");
        assert_eq!(
            edits,
            vec![
                DependencyEdit {
                    task_id: "A-2".to_string(),
                    dependencies: Vec::new(),
                },
                DependencyEdit {
                    task_id: "A-3".to_string(),
                    dependencies: vec!["A-9".to_string()],
                },
            ]
        );
    }

    #[test]
    fn branch_copies_cannot_be_replanned() {
        let mut foreign = task_with_deps("A-2", &["A-1"]);
        foreign.branch = Some("feature/x".to_string());
        let tasks = vec![task_with_deps("A-1", &[]), foreign];
        let outcome = compute_sequences(&tasks);
        assert_eq!(
            plan_move_to_sequence(&tasks, &outcome.sequences, "A-2", 1).expect_err("read-only"),
            SequenceError::BranchCopy("A-2".to_string())
        );
        assert_eq!(
            plan_move_to_unsequenced(&tasks, "A-2").expect_err("read-only"),
            SequenceError::BranchCopy("A-2".to_string())
        );
        // Detaching A-1 would also rewrite the foreign dependent.
        assert_eq!(
            plan_move_to_unsequenced(&tasks, "A-1").expect_err("read-only"),
            SequenceError::BranchCopy("A-2".to_string())
        );
    }

    #[test]
    fn unknown_task_ids_are_rejected() {
        let tasks = vec![task_with_deps("A-1", &[])];
        assert_eq!(
            plan_move_to_unsequenced(&tasks, "A-404").expect_err("missing"),
            SequenceError::TaskNotFound("A-404".to_string())
        );
        let outcome = compute_sequences(&tasks);
        assert!(matches!(
            plan_move_to_sequence(&tasks, &outcome.sequences, "A-404", 1),
            Err(SequenceError::TaskNotFound(_))
        ));
    }
}
