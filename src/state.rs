//! The in-memory project aggregate and its validated mutations.
//!
//! Every mutation stages its change on a copy of the task set, re-validates
//! the dependency graph, and commits only on success, so a failed command
//! never leaves the project half-modified. Disallowed operations fail;
//! merely suspicious ones succeed with warnings.

use chrono::{NaiveDate, NaiveDateTime};
use rustc_hash::FxHashMap;

use crate::error::{DagrError, Result};
use crate::graph::TaskGraph;
use crate::models::{next_task_id, ProjectConfig, Status, Task};

pub type Warnings = Vec<String>;

/// Configuration plus the task set. All engine entry points take this by
/// reference; there is no module-global current project.
#[derive(Clone, Debug)]
pub struct Project {
    pub config: ProjectConfig,
    pub tasks: FxHashMap<String, Task>,
}

/// Fields for a task creation.
#[derive(Clone, Debug, Default)]
pub struct NewTask {
    pub name: String,
    pub duration_hrs: f64,
    pub depends_on: Vec<String>,
    pub deadline: Option<NaiveDate>,
    pub proposed_start: Option<NaiveDate>,
    pub background: bool,
    pub flexible: bool,
    pub project: String,
    pub tags: Vec<String>,
    pub notes: String,
}

/// A partial update; `None` fields are left untouched.
#[derive(Clone, Debug, Default)]
pub struct TaskPatch {
    pub name: Option<String>,
    pub duration_hrs: Option<f64>,
    pub deadline: Option<NaiveDate>,
    pub proposed_start: Option<NaiveDate>,
    pub background: Option<bool>,
    pub flexible: Option<bool>,
    pub project: Option<String>,
    pub tags: Option<Vec<String>>,
    pub notes: Option<String>,
    pub add_deps: Vec<String>,
    pub remove_deps: Vec<String>,
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(DagrError::invalid_field("name", "must not be empty"));
    }
    Ok(())
}

fn validate_duration(hours: f64) -> Result<()> {
    if !hours.is_finite() || hours < 0.0 {
        return Err(DagrError::invalid_field(
            "duration",
            format!("must be a non-negative number of hours, got {hours}"),
        ));
    }
    Ok(())
}

impl Project {
    pub fn new(config: ProjectConfig) -> Self {
        Self {
            config,
            tasks: FxHashMap::default(),
        }
    }

    pub fn get(&self, id: &str) -> Result<&Task> {
        self.tasks
            .get(id)
            .ok_or_else(|| DagrError::UnknownTask(id.to_string()))
    }

    /// Ids of tasks that depend on `id`, derived on demand.
    pub fn dependents_of(&self, id: &str) -> Vec<String> {
        let mut out: Vec<String> = self
            .tasks
            .values()
            .filter(|t| t.depends_on.iter().any(|d| d == id))
            .map(|t| t.id.clone())
            .collect();
        out.sort_by_key(|id| crate::models::id_suffix(id).unwrap_or(u64::MAX));
        out
    }

    /// Check the whole aggregate: graph integrity plus advisory warnings
    /// (a non-flexible task depending on a flexible one is almost certainly
    /// a modeling mistake, since flexible tasks never block).
    pub fn validate(&self) -> Result<Warnings> {
        TaskGraph::build(&self.tasks)?;
        let mut warnings = Warnings::new();
        let mut edges: Vec<(&str, &str)> = Vec::new();
        for task in self.tasks.values() {
            if task.flexible {
                continue;
            }
            for dep in &task.depends_on {
                if self.tasks.get(dep).map(|d| d.flexible).unwrap_or(false) {
                    edges.push((task.id.as_str(), dep.as_str()));
                }
            }
        }
        edges.sort();
        for (task, dep) in edges {
            warnings.push(format!(
                "{task} depends on flexible task {dep}; flexible tasks never block, so the dependency is ignored"
            ));
        }
        Ok(warnings)
    }

    fn commit(&mut self, staged: FxHashMap<String, Task>) -> Result<Warnings> {
        let candidate = Project {
            config: self.config.clone(),
            tasks: staged,
        };
        let warnings = candidate.validate()?;
        self.tasks = candidate.tasks;
        Ok(warnings)
    }

    /// Add a task, assigning the next `T-<n>` id. Returns the new id and
    /// any validation warnings.
    pub fn add_task(&mut self, new: NewTask) -> Result<(String, Warnings)> {
        validate_name(&new.name)?;
        validate_duration(new.duration_hrs)?;

        let id = next_task_id(self.tasks.keys().map(String::as_str));
        let mut task = Task::new(id.clone(), new.name, new.duration_hrs);
        for dep in new.depends_on {
            if !task.depends_on.contains(&dep) {
                task.depends_on.push(dep);
            }
        }
        task.deadline = new.deadline;
        task.proposed_start = new.proposed_start;
        task.background = new.background;
        task.flexible = new.flexible;
        task.project = new.project;
        task.tags = new.tags;
        task.notes = new.notes;

        let mut staged = self.tasks.clone();
        staged.insert(id.clone(), task);
        let warnings = self.commit(staged)?;
        Ok((id, warnings))
    }

    /// Apply a partial update. Dependency additions are cycle-checked via
    /// the staged graph rebuild.
    pub fn update_task(&mut self, id: &str, patch: TaskPatch) -> Result<Warnings> {
        let mut task = self.get(id)?.clone();
        let mut warnings = Warnings::new();

        if let Some(name) = patch.name {
            validate_name(&name)?;
            task.name = name;
        }
        if let Some(duration) = patch.duration_hrs {
            validate_duration(duration)?;
            task.duration_hrs = duration;
        }
        if let Some(deadline) = patch.deadline {
            task.deadline = Some(deadline);
        }
        if let Some(proposed) = patch.proposed_start {
            task.proposed_start = Some(proposed);
        }
        if let Some(background) = patch.background {
            task.background = background;
        }
        if let Some(flexible) = patch.flexible {
            task.flexible = flexible;
        }
        if let Some(project) = patch.project {
            task.project = project;
        }
        if let Some(tags) = patch.tags {
            task.tags = tags;
        }
        if let Some(notes) = patch.notes {
            task.notes = notes;
        }

        for dep in patch.add_deps {
            if dep == id {
                return Err(DagrError::CycleDetected(vec![id.to_string(), dep]));
            }
            if !self.tasks.contains_key(&dep) {
                return Err(DagrError::UnknownTask(dep));
            }
            if !task.depends_on.contains(&dep) {
                task.depends_on.push(dep);
            }
        }
        for dep in patch.remove_deps {
            if let Some(pos) = task.depends_on.iter().position(|d| *d == dep) {
                task.depends_on.remove(pos);
            } else {
                warnings.push(format!("{id} does not depend on {dep}, skipping"));
            }
        }

        let mut staged = self.tasks.clone();
        staged.insert(id.to_string(), task);
        warnings.extend(self.commit(staged)?);
        Ok(warnings)
    }

    /// Delete a task and scrub it from every other task's dependencies.
    pub fn delete_task(&mut self, id: &str) -> Result<()> {
        self.get(id)?;
        self.tasks.remove(id);
        for task in self.tasks.values_mut() {
            task.depends_on.retain(|d| d != id);
        }
        Ok(())
    }

    /// Mark a task in progress as of `now`.
    pub fn start_task(&mut self, id: &str, now: NaiveDateTime) -> Result<Warnings> {
        let previous = self.get(id)?.status.clone();
        let mut warnings = self.undone_dep_warnings(id);

        match previous {
            Status::Done { .. } => Err(DagrError::StatusTransition {
                from: "done".to_string(),
                to: "in_progress".to_string(),
                reason: format!("{id} is already done; reset it first"),
            }),
            Status::InProgress { started_at } => {
                warnings.push(format!("{id} is already in progress (started {started_at})"));
                Ok(warnings)
            }
            Status::NotStarted => {
                let task = self.tasks.get_mut(id).expect("checked above");
                task.status = Status::InProgress { started_at: now };
                Ok(warnings)
            }
        }
    }

    /// Mark a task done as of `now`.
    pub fn finish_task(&mut self, id: &str, now: NaiveDateTime) -> Result<Warnings> {
        let previous = self.get(id)?.status.clone();
        let mut warnings = self.undone_dep_warnings(id);

        let status = match previous {
            Status::Done { .. } => {
                warnings.push(format!("{id} is already done"));
                return Ok(warnings);
            }
            Status::InProgress { started_at } => Status::Done {
                started_at: Some(started_at),
                finished_at: now,
            },
            Status::NotStarted => {
                warnings.push(format!(
                    "{id} was never started; actual-time tracking is unavailable for it"
                ));
                Status::Done {
                    started_at: None,
                    finished_at: now,
                }
            }
        };
        self.tasks.get_mut(id).expect("checked above").status = status;
        Ok(warnings)
    }

    /// Reset a task to not started, clearing actual timestamps. Returns the
    /// previous status label.
    pub fn reset_task(&mut self, id: &str) -> Result<&'static str> {
        let task = self
            .tasks
            .get_mut(id)
            .ok_or_else(|| DagrError::UnknownTask(id.to_string()))?;
        let previous = task.status.label();
        task.status = Status::NotStarted;
        Ok(previous)
    }

    /// Force a status by wire label, routing through the same transition
    /// rules as the dedicated commands.
    pub fn set_status(&mut self, id: &str, label: &str, now: NaiveDateTime) -> Result<Warnings> {
        match label {
            "not_started" => {
                self.reset_task(id)?;
                Ok(Warnings::new())
            }
            "in_progress" => {
                // Re-starting a done task via set-status is an explicit ask:
                // reset first, then start.
                if self.get(id)?.status.is_done() {
                    self.reset_task(id)?;
                }
                self.start_task(id, now)
            }
            "done" => self.finish_task(id, now),
            other => Err(DagrError::invalid_field(
                "status",
                format!("'{other}' is not one of not_started, in_progress, done"),
            )),
        }
    }

    /// Set a per-date capacity override (0 means a day off).
    pub fn set_capacity(&mut self, date: NaiveDate, hours: f64) -> Result<()> {
        if !hours.is_finite() || hours < 0.0 {
            return Err(DagrError::invalid_field(
                "capacity",
                format!("must be a non-negative number of hours, got {hours}"),
            ));
        }
        self.config.capacity_overrides.insert(date, hours);
        Ok(())
    }

    fn undone_dep_warnings(&self, id: &str) -> Warnings {
        let Some(task) = self.tasks.get(id) else {
            return Warnings::new();
        };
        let undone: Vec<&str> = task
            .depends_on
            .iter()
            .filter(|dep| {
                self.tasks
                    .get(*dep)
                    .map(|d| !d.status.is_done())
                    .unwrap_or(false)
            })
            .map(String::as_str)
            .collect();
        if undone.is_empty() {
            Warnings::new()
        } else {
            vec![format!(
                "dependencies of {} are not done yet: {}",
                task.id,
                undone.join(", ")
            )]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(year: i32, month: u32, day: u32, hour: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(hour, min, 0)
            .unwrap()
    }

    fn project() -> Project {
        Project::new(ProjectConfig::new(dt(2026, 2, 23, 9, 0)))
    }

    fn new_task(name: &str, duration: f64, deps: &[&str]) -> NewTask {
        NewTask {
            name: name.to_string(),
            duration_hrs: duration,
            depends_on: deps.iter().map(|d| d.to_string()).collect(),
            ..NewTask::default()
        }
    }

    #[test]
    fn test_add_assigns_sequential_ids() {
        let mut p = project();
        let (id1, _) = p.add_task(new_task("first", 1.0, &[])).unwrap();
        let (id2, _) = p.add_task(new_task("second", 2.0, &[])).unwrap();
        assert_eq!(id1, "T-1");
        assert_eq!(id2, "T-2");
    }

    #[test]
    fn test_add_rejects_bad_fields() {
        let mut p = project();
        assert!(matches!(
            p.add_task(new_task("  ", 1.0, &[])),
            Err(DagrError::InvalidField { .. })
        ));
        assert!(matches!(
            p.add_task(new_task("x", -1.0, &[])),
            Err(DagrError::InvalidField { .. })
        ));
        assert!(p.tasks.is_empty(), "failed adds must not commit");
    }

    #[test]
    fn test_add_rejects_unknown_dep_and_stays_unchanged() {
        let mut p = project();
        p.add_task(new_task("a", 1.0, &[])).unwrap();
        let err = p.add_task(new_task("b", 1.0, &["T-9"])).unwrap_err();
        assert!(matches!(err, DagrError::UnknownDependency { .. }));
        assert_eq!(p.tasks.len(), 1);
    }

    #[test]
    fn test_update_detects_cycle() {
        let mut p = project();
        p.add_task(new_task("a", 1.0, &[])).unwrap();
        p.add_task(new_task("b", 1.0, &["T-1"])).unwrap();
        let patch = TaskPatch {
            add_deps: vec!["T-2".to_string()],
            ..TaskPatch::default()
        };
        let err = p.update_task("T-1", patch).unwrap_err();
        assert!(matches!(err, DagrError::CycleDetected(_)));
        // Staged change must not have leaked
        assert!(p.tasks["T-1"].depends_on.is_empty());
    }

    #[test]
    fn test_update_rejects_self_dependency() {
        let mut p = project();
        p.add_task(new_task("a", 1.0, &[])).unwrap();
        let patch = TaskPatch {
            add_deps: vec!["T-1".to_string()],
            ..TaskPatch::default()
        };
        assert!(matches!(
            p.update_task("T-1", patch),
            Err(DagrError::CycleDetected(_))
        ));
    }

    #[test]
    fn test_delete_scrubs_dependents() {
        let mut p = project();
        p.add_task(new_task("a", 1.0, &[])).unwrap();
        p.add_task(new_task("b", 1.0, &["T-1"])).unwrap();
        p.delete_task("T-1").unwrap();
        assert!(!p.tasks.contains_key("T-1"));
        assert!(p.tasks["T-2"].depends_on.is_empty());
    }

    #[test]
    fn test_start_and_done_lifecycle() {
        let mut p = project();
        p.add_task(new_task("a", 1.0, &[])).unwrap();
        let started = dt(2026, 2, 23, 10, 0);
        let finished = dt(2026, 2, 23, 12, 0);

        assert!(p.start_task("T-1", started).unwrap().is_empty());
        assert!(p.tasks["T-1"].status.is_in_progress());

        p.finish_task("T-1", finished).unwrap();
        assert_eq!(p.tasks["T-1"].status.started_at(), Some(started));
        assert_eq!(p.tasks["T-1"].status.finished_at(), Some(finished));
    }

    #[test]
    fn test_start_done_task_fails() {
        let mut p = project();
        p.add_task(new_task("a", 1.0, &[])).unwrap();
        p.finish_task("T-1", dt(2026, 2, 23, 12, 0)).unwrap();
        assert!(matches!(
            p.start_task("T-1", dt(2026, 2, 23, 13, 0)),
            Err(DagrError::StatusTransition { .. })
        ));
    }

    #[test]
    fn test_done_without_start_warns() {
        let mut p = project();
        p.add_task(new_task("a", 1.0, &[])).unwrap();
        let warnings = p.finish_task("T-1", dt(2026, 2, 23, 12, 0)).unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("never started"));
        assert_eq!(p.tasks["T-1"].status.started_at(), None);
    }

    #[test]
    fn test_done_with_undone_deps_warns_but_succeeds() {
        let mut p = project();
        p.add_task(new_task("a", 1.0, &[])).unwrap();
        p.add_task(new_task("b", 1.0, &["T-1"])).unwrap();
        let warnings = p.finish_task("T-2", dt(2026, 2, 23, 12, 0)).unwrap();
        assert!(warnings.iter().any(|w| w.contains("not done yet")));
        assert!(p.tasks["T-2"].status.is_done());
    }

    #[test]
    fn test_reset_clears_actuals() {
        let mut p = project();
        p.add_task(new_task("a", 1.0, &[])).unwrap();
        p.start_task("T-1", dt(2026, 2, 23, 10, 0)).unwrap();
        let previous = p.reset_task("T-1").unwrap();
        assert_eq!(previous, "in_progress");
        assert_eq!(p.tasks["T-1"].status, Status::NotStarted);
    }

    #[test]
    fn test_set_capacity_rejects_negative() {
        let mut p = project();
        let date = NaiveDate::from_ymd_opt(2026, 2, 28).unwrap();
        assert!(p.set_capacity(date, -1.0).is_err());
        p.set_capacity(date, 4.0).unwrap();
        assert_eq!(p.config.capacity_overrides[&date], 4.0);
    }

    #[test]
    fn test_flexible_dependency_warning() {
        let mut p = project();
        p.add_task(NewTask {
            flexible: true,
            ..new_task("side quest", 1.0, &[])
        })
        .unwrap();
        let (_, warnings) = p.add_task(new_task("main", 2.0, &["T-1"])).unwrap();
        assert!(warnings.iter().any(|w| w.contains("flexible")));
    }
}
