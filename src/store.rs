//! JSON persistence for the project (`dagr.json` in the working directory).
//!
//! The wire layout is a `config` object plus a `tasks` object keyed by
//! task id, dates as `YYYY-MM-DD`, the day start time as `HH:MM`,
//! datetimes as ISO 8601. Mirror structs keep the wire shape decoupled
//! from the domain types, whose status is a sum type.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{DagrError, Result};
use crate::models::{ProjectConfig, Status, Task};
use crate::state::Project;

pub const STATE_FILE_NAME: &str = "dagr.json";

/// The state file inside a working directory.
pub fn store_path(dir: &Path) -> PathBuf {
    dir.join(STATE_FILE_NAME)
}

mod hhmm {
    use chrono::NaiveTime;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(t: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&t.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&s, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&s, "%H:%M:%S"))
            .map_err(serde::de::Error::custom)
    }
}

fn default_hours_per_day() -> f64 {
    8.0
}

fn default_day_start() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 0, 0).unwrap()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredConfig {
    start_datetime: NaiveDateTime,
    #[serde(default = "default_hours_per_day")]
    hours_per_day: f64,
    #[serde(with = "hhmm", default = "default_day_start")]
    day_start_time: NaiveTime,
    #[serde(default = "default_true")]
    skip_weekends: bool,
    #[serde(default)]
    capacity_overrides: BTreeMap<NaiveDate, f64>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum StatusLabel {
    NotStarted,
    InProgress,
    Done,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredTask {
    name: String,
    duration_hrs: f64,
    #[serde(default)]
    depends_on: Vec<String>,
    #[serde(default)]
    deadline: Option<NaiveDate>,
    #[serde(default)]
    proposed_start: Option<NaiveDate>,
    status: StatusLabel,
    #[serde(default)]
    actual_start: Option<NaiveDateTime>,
    #[serde(default)]
    actual_finish: Option<NaiveDateTime>,
    #[serde(default)]
    background: bool,
    #[serde(default)]
    flexible: bool,
    #[serde(default)]
    project: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    notes: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredProject {
    config: StoredConfig,
    tasks: BTreeMap<String, StoredTask>,
}

fn status_from_wire(
    id: &str,
    label: StatusLabel,
    actual_start: Option<NaiveDateTime>,
    actual_finish: Option<NaiveDateTime>,
) -> Result<Status> {
    match label {
        StatusLabel::NotStarted => Ok(Status::NotStarted),
        StatusLabel::InProgress => match actual_start {
            Some(started_at) => Ok(Status::InProgress { started_at }),
            None => Err(DagrError::invalid_field(
                "actual_start",
                format!("{id} is in_progress but has no actual_start"),
            )),
        },
        StatusLabel::Done => match actual_finish {
            Some(finished_at) => Ok(Status::Done {
                started_at: actual_start,
                finished_at,
            }),
            None => Err(DagrError::invalid_field(
                "actual_finish",
                format!("{id} is done but has no actual_finish"),
            )),
        },
    }
}

fn task_from_wire(id: String, stored: StoredTask) -> Result<Task> {
    let status = status_from_wire(&id, stored.status, stored.actual_start, stored.actual_finish)?;
    Ok(Task {
        id,
        name: stored.name,
        duration_hrs: stored.duration_hrs,
        depends_on: stored.depends_on,
        deadline: stored.deadline,
        proposed_start: stored.proposed_start,
        background: stored.background,
        flexible: stored.flexible,
        project: stored.project,
        tags: stored.tags,
        notes: stored.notes,
        status,
    })
}

fn task_to_wire(task: &Task) -> StoredTask {
    let label = match task.status {
        Status::NotStarted => StatusLabel::NotStarted,
        Status::InProgress { .. } => StatusLabel::InProgress,
        Status::Done { .. } => StatusLabel::Done,
    };
    StoredTask {
        name: task.name.clone(),
        duration_hrs: task.duration_hrs,
        depends_on: task.depends_on.clone(),
        deadline: task.deadline,
        proposed_start: task.proposed_start,
        status: label,
        actual_start: task.status.started_at(),
        actual_finish: task.status.finished_at(),
        background: task.background,
        flexible: task.flexible,
        project: task.project.clone(),
        tags: task.tags.clone(),
        notes: task.notes.clone(),
    }
}

/// Load the project, or `None` when no state file exists yet.
pub fn load(path: &Path) -> Result<Option<Project>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    let stored: StoredProject = serde_json::from_str(&content)?;

    let config = ProjectConfig {
        start_datetime: stored.config.start_datetime,
        hours_per_day: stored.config.hours_per_day,
        day_start_time: stored.config.day_start_time,
        skip_weekends: stored.config.skip_weekends,
        capacity_overrides: stored.config.capacity_overrides,
    };

    let mut tasks: FxHashMap<String, Task> = FxHashMap::default();
    for (id, stored_task) in stored.tasks {
        let task = task_from_wire(id.clone(), stored_task)?;
        tasks.insert(id, task);
    }

    Ok(Some(Project { config, tasks }))
}

/// Load, failing with `StateNotInitialized` when the file is missing.
pub fn load_required(path: &Path) -> Result<Project> {
    load(path)?.ok_or(DagrError::StateNotInitialized)
}

/// Persist the whole project, pretty-printed for hand inspection.
pub fn save(path: &Path, project: &Project) -> Result<()> {
    let stored = StoredProject {
        config: StoredConfig {
            start_datetime: project.config.start_datetime,
            hours_per_day: project.config.hours_per_day,
            day_start_time: project.config.day_start_time,
            skip_weekends: project.config.skip_weekends,
            capacity_overrides: project.config.capacity_overrides.clone(),
        },
        tasks: project
            .tasks
            .values()
            .map(|t| (t.id.clone(), task_to_wire(t)))
            .collect(),
    };
    let content = serde_json::to_string_pretty(&stored)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::NewTask;
    use chrono::NaiveDate;

    fn dt(year: i32, month: u32, day: u32, hour: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(hour, min, 0)
            .unwrap()
    }

    fn sample_project() -> Project {
        let mut config = ProjectConfig::new(dt(2026, 2, 23, 9, 0));
        config
            .capacity_overrides
            .insert(NaiveDate::from_ymd_opt(2026, 2, 28).unwrap(), 4.0);
        let mut project = Project::new(config);
        project
            .add_task(NewTask {
                name: "Run pipeline".to_string(),
                duration_hrs: 10.0,
                background: true,
                tags: vec!["infra".to_string()],
                notes: "kick off before lunch".to_string(),
                ..NewTask::default()
            })
            .unwrap();
        project
            .add_task(NewTask {
                name: "Analyze results".to_string(),
                duration_hrs: 3.5,
                depends_on: vec!["T-1".to_string()],
                deadline: NaiveDate::from_ymd_opt(2026, 3, 2),
                ..NewTask::default()
            })
            .unwrap();
        project.start_task("T-1", dt(2026, 2, 23, 9, 30)).unwrap();
        project
    }

    #[test]
    fn test_round_trip_preserves_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = store_path(dir.path());
        let project = sample_project();

        save(&path, &project).unwrap();
        let loaded = load_required(&path).unwrap();

        assert_eq!(loaded.config, project.config);
        assert_eq!(loaded.tasks.len(), project.tasks.len());
        for (id, task) in &project.tasks {
            assert_eq!(&loaded.tasks[id], task, "task {id} did not round-trip");
        }
    }

    #[test]
    fn test_missing_file_is_uninitialized() {
        let dir = tempfile::tempdir().unwrap();
        let path = store_path(dir.path());
        assert!(load(&path).unwrap().is_none());
        assert!(matches!(
            load_required(&path),
            Err(DagrError::StateNotInitialized)
        ));
    }

    #[test]
    fn test_wire_format_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = store_path(dir.path());
        save(&path, &sample_project()).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["config"]["day_start_time"], "09:00");
        assert_eq!(raw["config"]["capacity_overrides"]["2026-02-28"], 4.0);
        assert_eq!(raw["tasks"]["T-1"]["status"], "in_progress");
        assert_eq!(raw["tasks"]["T-2"]["deadline"], "2026-03-02");
        assert_eq!(raw["tasks"]["T-2"]["depends_on"][0], "T-1");
    }

    #[test]
    fn test_minimal_task_object_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = store_path(dir.path());
        let content = r#"{
            "config": {"start_datetime": "2026-02-23T09:00:00"},
            "tasks": {"T-1": {"name": "bare", "duration_hrs": 2.0, "status": "not_started"}}
        }"#;
        std::fs::write(&path, content).unwrap();

        let project = load_required(&path).unwrap();
        assert_eq!(project.config.hours_per_day, 8.0);
        assert!(project.config.skip_weekends);
        let task = &project.tasks["T-1"];
        assert!(task.depends_on.is_empty());
        assert!(!task.background);
        assert_eq!(task.status, Status::NotStarted);
    }

    #[test]
    fn test_done_without_finish_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = store_path(dir.path());
        let content = r#"{
            "config": {"start_datetime": "2026-02-23T09:00:00"},
            "tasks": {"T-1": {"name": "bad", "duration_hrs": 2.0, "status": "done"}}
        }"#;
        std::fs::write(&path, content).unwrap();
        assert!(matches!(
            load_required(&path),
            Err(DagrError::InvalidField { .. })
        ));
    }
}
