use std::collections::HashMap;

use regex::Regex;
use serde_yaml::Value;
use thiserror::Error;

use driftboard_core::task::Task;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Missing front matter delimiter")]
    MissingFrontMatter,
    #[error("Missing closing --- for front matter")]
    MissingFrontMatterEnd,
}

pub fn split_front_matter(text: &str) -> Result<(String, String), CodecError> {
    let lines: Vec<&str> = text.lines().collect();
    if lines.first().map(|line| line.trim()) != Some("---") {
        return Err(CodecError::MissingFrontMatter);
    }
    let end_idx = lines
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, line)| line.trim() == "---")
        .map(|(idx, _)| idx)
        .ok_or(CodecError::MissingFrontMatterEnd)?;
    let front = lines[1..end_idx].join("\n");
    let body = lines[end_idx + 1..].join("\n");
    Ok((front, body))
}

/// Parse a task record. Missing or odd fields default rather than fail;
/// a record with no `id` field falls back to `fallback_id` (usually
/// derived from the filename).
pub fn parse_task_source(text: &str, fallback_id: &str) -> Result<Task, CodecError> {
    let (front, body) = split_front_matter(text)?;
    let data = parse_mapping(&front);

    let id = scalar(&data, "id").unwrap_or_else(|| fallback_id.trim().to_string());
    let mut task = Task::new(id, scalar(&data, "title").unwrap_or_default());
    task.status = scalar(&data, "status").unwrap_or_default();
    task.ordinal = number(&data, "ordinal");
    task.dependencies = list(&data, "dependencies");
    task.parent_task_id = scalar(&data, "parent_task_id");
    task.milestone = scalar(&data, "milestone");
    task.body = body;
    Ok(task)
}

pub fn render_task(task: &Task) -> String {
    let mut lines = Vec::new();
    lines.push("---".to_string());
    lines.push(format!("id: {}", task.id));
    lines.push(format!("title: {}", task.title));
    lines.push(format!("status: {}", task.status));
    if let Some(ordinal) = task.ordinal {
        lines.push(format!("ordinal: {}", ordinal));
    }
    lines.push(format!("dependencies: [{}]", task.dependencies.join(", ")));
    if let Some(parent) = &task.parent_task_id {
        lines.push(format!("parent_task_id: {}", parent));
    }
    if let Some(milestone) = &task.milestone {
        lines.push(format!("milestone: {}", milestone));
    }
    lines.push("---".to_string());
    let mut rendered = lines.join("\n");
    rendered.push('\n');
    if !task.body.trim().is_empty() {
        rendered.push('\n');
        rendered.push_str(task.body.trim_end_matches('\n'));
        rendered.push('\n');
    }
    rendered
}

/// Filename for a task record: `<ID> - <slug>.md`, so the id is
/// recoverable from the path without reading the file.
pub fn task_filename(id: &str, title: &str) -> String {
    format!("{} - {}.md", id, slug_title(title))
}

fn slug_title(title: &str) -> String {
    let re = Regex::new(r"[^a-zA-Z0-9\s\-]").expect("regex");
    let cleaned = re.replace_all(title, "");
    let cleaned = cleaned.trim().to_lowercase();
    let cleaned = Regex::new(r"\s+")
        .expect("regex")
        .replace_all(&cleaned, " ")
        .to_string();
    if cleaned.is_empty() {
        "untitled".to_string()
    } else {
        cleaned
    }
}

fn parse_mapping(front: &str) -> HashMap<String, Value> {
    let mut data = HashMap::new();
    if let Ok(Value::Mapping(map)) = serde_yaml::from_str::<Value>(front) {
        for (key, value) in map {
            if let Some(key) = value_to_string(&key) {
                data.insert(key, value);
            }
        }
    }
    data
}

fn scalar(data: &HashMap<String, Value>, key: &str) -> Option<String> {
    data.get(key)
        .and_then(value_to_string)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn number(data: &HashMap<String, Value>, key: &str) -> Option<f64> {
    match data.get(key) {
        Some(Value::Number(num)) => num.as_f64(),
        Some(Value::String(raw)) => raw.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn list(data: &HashMap<String, Value>, key: &str) -> Vec<String> {
    match data.get(key) {
        Some(Value::Sequence(seq)) => seq
            .iter()
            .filter_map(value_to_string)
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect(),
        Some(Value::String(raw)) => parse_list_string(raw),
        _ => Vec::new(),
    }
}

fn parse_list_string(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    let inner = if raw.starts_with('[') && raw.ends_with(']') {
        raw[1..raw.len() - 1].trim()
    } else {
        raw
    };
    if inner.is_empty() {
        return Vec::new();
    }
    inner
        .split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(raw) => Some(raw.clone()),
        Value::Number(num) => Some(num.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}
