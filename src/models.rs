//! Core data types for the planner: tasks, statuses, and project configuration.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::BTreeMap;

/// Lifecycle state of a task.
///
/// The timestamps live inside the variants so that the model cannot express
/// a done task without a finish time or a not-started task with one.
#[derive(Clone, Debug, PartialEq)]
pub enum Status {
    NotStarted,
    InProgress {
        started_at: NaiveDateTime,
    },
    Done {
        started_at: Option<NaiveDateTime>,
        finished_at: NaiveDateTime,
    },
}

impl Status {
    /// The wire label: `not_started`, `in_progress`, or `done`.
    pub fn label(&self) -> &'static str {
        match self {
            Status::NotStarted => "not_started",
            Status::InProgress { .. } => "in_progress",
            Status::Done { .. } => "done",
        }
    }

    pub fn is_not_started(&self) -> bool {
        matches!(self, Status::NotStarted)
    }

    pub fn is_in_progress(&self) -> bool {
        matches!(self, Status::InProgress { .. })
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Status::Done { .. })
    }

    pub fn started_at(&self) -> Option<NaiveDateTime> {
        match self {
            Status::NotStarted => None,
            Status::InProgress { started_at } => Some(*started_at),
            Status::Done { started_at, .. } => *started_at,
        }
    }

    pub fn finished_at(&self) -> Option<NaiveDateTime> {
        match self {
            Status::Done { finished_at, .. } => Some(*finished_at),
            _ => None,
        }
    }
}

/// A single schedulable task.
#[derive(Clone, Debug, PartialEq)]
pub struct Task {
    /// Stable id of the form `T-<n>`.
    pub id: String,
    pub name: String,
    /// Estimated working hours; zero is a valid milestone.
    pub duration_hrs: f64,
    /// Ids of tasks that must finish before this one starts.
    pub depends_on: Vec<String>,
    /// End-of-working-day deadline.
    pub deadline: Option<NaiveDate>,
    /// Earliest date the task may begin.
    pub proposed_start: Option<NaiveDate>,
    /// Runs unattended in a parallel stream; doesn't block the person.
    pub background: bool,
    /// Side quest: exempt from critical path and attended capacity.
    pub flexible: bool,
    /// Free-form project label, for filtering only.
    pub project: String,
    pub tags: Vec<String>,
    pub notes: String,
    pub status: Status,
}

impl Task {
    pub fn new(id: impl Into<String>, name: impl Into<String>, duration_hrs: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            duration_hrs,
            depends_on: Vec::new(),
            deadline: None,
            proposed_start: None,
            background: false,
            flexible: false,
            project: String::new(),
            tags: Vec::new(),
            notes: String::new(),
            status: Status::NotStarted,
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }
}

/// Project-level settings stored alongside tasks.
#[derive(Clone, Debug, PartialEq)]
pub struct ProjectConfig {
    /// Wall-clock anchor for scheduling.
    pub start_datetime: NaiveDateTime,
    /// Default working capacity per day.
    pub hours_per_day: f64,
    /// Time of day when the working day begins.
    pub day_start_time: NaiveTime,
    pub skip_weekends: bool,
    /// Per-date capacity overrides; these replace both the default capacity
    /// and the weekend-skip decision for that date.
    pub capacity_overrides: BTreeMap<NaiveDate, f64>,
}

impl ProjectConfig {
    pub fn new(start_datetime: NaiveDateTime) -> Self {
        Self {
            start_datetime,
            hours_per_day: 8.0,
            day_start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            skip_weekends: true,
            capacity_overrides: BTreeMap::new(),
        }
    }
}

/// Parse the numeric suffix of a `T-<n>` id. Returns `None` for anything else.
pub fn id_suffix(id: &str) -> Option<u64> {
    id.strip_prefix("T-").and_then(|n| n.parse().ok())
}

/// Generate the next unused `T-<n>` id.
pub fn next_task_id<'a>(existing: impl Iterator<Item = &'a str>) -> String {
    let max = existing.filter_map(id_suffix).max().unwrap_or(0);
    format!("T-{}", max + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_status_labels() {
        let started = NaiveDate::from_ymd_opt(2026, 2, 23)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        assert_eq!(Status::NotStarted.label(), "not_started");
        assert_eq!(
            Status::InProgress {
                started_at: started
            }
            .label(),
            "in_progress"
        );
        let done = Status::Done {
            started_at: Some(started),
            finished_at: started,
        };
        assert_eq!(done.label(), "done");
        assert_eq!(done.finished_at(), Some(started));
    }

    #[test]
    fn test_id_suffix() {
        assert_eq!(id_suffix("T-1"), Some(1));
        assert_eq!(id_suffix("T-42"), Some(42));
        assert_eq!(id_suffix("X-1"), None);
        assert_eq!(id_suffix("T-"), None);
        assert_eq!(id_suffix("T-1a"), None);
    }

    #[test]
    fn test_next_task_id() {
        assert_eq!(next_task_id(std::iter::empty::<&str>()), "T-1");
        assert_eq!(next_task_id(["T-1", "T-3"].iter().copied()), "T-4");
        // Foreign ids are ignored when picking the next number
        assert_eq!(next_task_id(["task-9", "T-2"].iter().copied()), "T-3");
    }

    #[test]
    fn test_has_tag_case_insensitive() {
        let mut t = Task::new("T-1", "demo", 1.0);
        t.tags = vec!["Quick".to_string()];
        assert!(t.has_tag("quick"));
        assert!(!t.has_tag("slow"));
    }
}
