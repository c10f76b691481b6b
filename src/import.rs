//! Bulk task import.
//!
//! The payload is `{"tasks": [ ... ]}` where each entry may reference its
//! dependencies by existing task id, by the name of another entry in the
//! same batch, or by the name of an existing task. Names are resolved to
//! ids before anything is committed; the whole batch lands atomically or
//! not at all.

use chrono::NaiveDate;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Deserialize;

use crate::error::{DagrError, Result};
use crate::graph::TaskGraph;
use crate::models::{id_suffix, Task};
use crate::state::{Project, Warnings};

#[derive(Debug, Deserialize)]
pub struct ImportPayload {
    pub tasks: Vec<ImportEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ImportEntry {
    pub name: String,
    pub duration_hrs: f64,
    #[serde(default)]
    pub depends_on: Option<Vec<String>>,
    #[serde(default)]
    pub deadline: Option<NaiveDate>,
    #[serde(default)]
    pub proposed_start: Option<NaiveDate>,
    #[serde(default)]
    pub background: Option<bool>,
    #[serde(default)]
    pub flexible: Option<bool>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub project: Option<String>,
}

#[derive(Debug, Default)]
pub struct ImportSummary {
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub warnings: Warnings,
}

/// Parse and merge a bulk payload into the project.
pub fn import_tasks(project: &mut Project, payload_json: &str) -> Result<ImportSummary> {
    let payload: ImportPayload = serde_json::from_str(payload_json)?;
    merge(project, payload)
}

fn merge(project: &mut Project, payload: ImportPayload) -> Result<ImportSummary> {
    for entry in &payload.tasks {
        if entry.name.trim().is_empty() {
            return Err(DagrError::invalid_field("name", "must not be empty"));
        }
        if !entry.duration_hrs.is_finite() || entry.duration_hrs < 0.0 {
            return Err(DagrError::invalid_field(
                "duration_hrs",
                format!("must be non-negative, got {}", entry.duration_hrs),
            ));
        }
    }

    // Pass 1: decide the id of every entry.
    let mut next_suffix = project
        .tasks
        .keys()
        .filter_map(|id| id_suffix(id))
        .max()
        .unwrap_or(0)
        + 1;
    let mut assigned: Vec<(String, bool)> = Vec::with_capacity(payload.tasks.len()); // (id, is_update)
    let mut batch_ids: FxHashSet<String> = FxHashSet::default();

    for entry in &payload.tasks {
        let (id, is_update) = match &entry.id {
            Some(id) if project.tasks.contains_key(id) => (id.clone(), true),
            Some(id) => {
                let Some(suffix) = id_suffix(id) else {
                    return Err(DagrError::invalid_field(
                        "id",
                        format!("'{id}' is not of the form T-<n>"),
                    ));
                };
                next_suffix = next_suffix.max(suffix + 1);
                (id.clone(), false)
            }
            None => {
                let id = format!("T-{next_suffix}");
                next_suffix += 1;
                (id, false)
            }
        };
        if !batch_ids.insert(id.clone()) {
            return Err(DagrError::invalid_field(
                "id",
                format!("'{id}' appears more than once in the batch"),
            ));
        }
        assigned.push((id, is_update));
    }

    // Name lookup tables: the batch shadows existing tasks.
    let mut batch_names: FxHashMap<String, String> = FxHashMap::default();
    for (entry, (id, _)) in payload.tasks.iter().zip(&assigned) {
        batch_names
            .entry(entry.name.clone())
            .or_insert_with(|| id.clone());
    }
    let mut existing_names: FxHashMap<String, String> = FxHashMap::default();
    let mut existing_sorted: Vec<&Task> = project.tasks.values().collect();
    existing_sorted.sort_by_key(|t| id_suffix(&t.id).unwrap_or(u64::MAX));
    for task in existing_sorted {
        existing_names
            .entry(task.name.clone())
            .or_insert_with(|| task.id.clone());
    }
    let known_ids: FxHashSet<String> = project.tasks.keys().cloned().collect();

    let resolve = move |reference: &str| -> Result<String> {
        if known_ids.contains(reference) || batch_ids.contains(reference) {
            return Ok(reference.to_string());
        }
        if let Some(id) = batch_names.get(reference) {
            return Ok(id.clone());
        }
        if let Some(id) = existing_names.get(reference) {
            return Ok(id.clone());
        }
        Err(DagrError::UnresolvedReference(reference.to_string()))
    };

    // Pass 2: stage everything, then validate the graph once.
    let mut staged = project.tasks.clone();
    let mut summary = ImportSummary::default();

    for (entry, (id, is_update)) in payload.tasks.into_iter().zip(assigned) {
        let depends_on = match &entry.depends_on {
            Some(refs) => {
                let mut deps: Vec<String> = Vec::with_capacity(refs.len());
                for reference in refs {
                    let dep = resolve(reference)?;
                    if !deps.contains(&dep) {
                        deps.push(dep);
                    }
                }
                Some(deps)
            }
            None => None,
        };

        if is_update {
            let task = staged.get_mut(&id).expect("update target exists");
            task.name = entry.name;
            task.duration_hrs = entry.duration_hrs;
            if let Some(deps) = depends_on {
                task.depends_on = deps;
            }
            if entry.deadline.is_some() {
                task.deadline = entry.deadline;
            }
            if entry.proposed_start.is_some() {
                task.proposed_start = entry.proposed_start;
            }
            if let Some(background) = entry.background {
                task.background = background;
            }
            if let Some(flexible) = entry.flexible {
                task.flexible = flexible;
            }
            if let Some(notes) = entry.notes {
                task.notes = notes;
            }
            if let Some(tags) = entry.tags {
                task.tags = tags;
            }
            if let Some(label) = entry.project {
                task.project = label;
            }
            summary.updated.push(id);
        } else {
            let mut task = Task::new(id.clone(), entry.name, entry.duration_hrs);
            task.depends_on = depends_on.unwrap_or_default();
            task.deadline = entry.deadline;
            task.proposed_start = entry.proposed_start;
            task.background = entry.background.unwrap_or(false);
            task.flexible = entry.flexible.unwrap_or(false);
            task.notes = entry.notes.unwrap_or_default();
            task.tags = entry.tags.unwrap_or_default();
            task.project = entry.project.unwrap_or_default();
            staged.insert(id.clone(), task);
            summary.created.push(id);
        }
    }

    TaskGraph::build(&staged)?;
    project.tasks = staged;
    summary.warnings = project.validate()?;
    Ok(summary)
}
