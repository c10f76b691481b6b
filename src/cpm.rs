//! Critical path calculation using forward and backward passes.
//!
//! All pass arithmetic happens in working-hour offsets from the project
//! start instant; wall-clock equivalents are materialized at the end via
//! the calendar. Flexible tasks get timings of their own but never
//! constrain (or inflate the slack of) anything else.

use chrono::NaiveDateTime;
use rustc_hash::FxHashMap;

use crate::calendar::{Calendar, EPSILON};
use crate::error::Result;
use crate::graph::TaskGraph;
use crate::models::{ProjectConfig, Status, Task};

/// Per-task timing information in working-hour offsets.
#[derive(Clone, Debug, Default)]
pub struct TaskTiming {
    /// Earliest possible start (from forward pass).
    pub earliest_start: f64,
    /// Earliest possible finish (from forward pass).
    pub earliest_finish: f64,
    /// Latest allowable start (from backward pass).
    pub latest_start: f64,
    /// Latest allowable finish (from backward pass).
    pub latest_finish: f64,
    /// `latest_start - earliest_start`; negative means LATE, infinite for
    /// flexible tasks.
    pub slack: f64,
}

/// A task with its computed schedule, both as offsets and instants.
#[derive(Clone, Debug)]
pub struct ScheduledTask {
    pub id: String,
    pub timing: TaskTiming,
    pub start_at: NaiveDateTime,
    pub finish_at: NaiveDateTime,
    pub latest_start_at: NaiveDateTime,
    pub latest_finish_at: NaiveDateTime,
    pub critical: bool,
    /// Earliest finish breaches the task's own deadline.
    pub late: bool,
}

/// Result of a full forward + backward pass.
#[derive(Clone, Debug)]
pub struct CpmResult {
    /// One entry per task, in topological order.
    pub tasks: Vec<ScheduledTask>,
    by_id: FxHashMap<String, usize>,
    /// Max earliest finish over non-flexible tasks, in working hours.
    pub horizon_hours: f64,
    pub project_start: NaiveDateTime,
}

impl CpmResult {
    pub fn get(&self, id: &str) -> Option<&ScheduledTask> {
        self.by_id.get(id).map(|&i| &self.tasks[i])
    }

    /// Tasks on the critical path, in topological order.
    pub fn critical_path(&self) -> impl Iterator<Item = &ScheduledTask> {
        self.tasks.iter().filter(|s| s.critical)
    }
}

/// Full forward + backward pass schedule with critical path.
pub fn calculate_schedule(
    tasks: &FxHashMap<String, Task>,
    config: &ProjectConfig,
) -> Result<CpmResult> {
    let graph = TaskGraph::build(tasks)?;
    let cal = Calendar::new(config);
    let project_start = cal.project_start_instant()?;

    let n = graph.index.len();
    let task_of = |i: u32| &tasks[graph.index.resolve(i)];

    // --- Forward pass (earliest start / earliest finish) ---
    let mut es = vec![0.0_f64; n];
    let mut ef = vec![0.0_f64; n];

    for &id in graph.topological_order() {
        let idx = id as usize;
        let task = task_of(id);

        let mut base_ready = 0.0_f64;
        for &dep in graph.dependencies_of(id) {
            if task_of(dep).flexible {
                continue;
            }
            base_ready = base_ready.max(ef[dep as usize]);
        }

        let floor = match task.proposed_start {
            Some(date) => cal.date_start_offset(date)?,
            None => 0.0,
        };
        es[idx] = base_ready.max(floor);

        match &task.status {
            Status::Done { finished_at, .. } => {
                // A finished task never pushes downstream work later than
                // its real completion.
                ef[idx] = cal.elapsed_hours(*finished_at)?;
                es[idx] = es[idx].min(ef[idx]);
            }
            Status::InProgress { started_at } => {
                es[idx] = cal.elapsed_hours(*started_at)?;
                ef[idx] = es[idx] + task.duration_hrs;
            }
            Status::NotStarted => {
                ef[idx] = es[idx] + task.duration_hrs;
            }
        }
    }

    // --- Project horizon over non-flexible tasks ---
    let mut horizon_hours = 0.0_f64;
    for &id in graph.topological_order() {
        if !task_of(id).flexible {
            horizon_hours = horizon_hours.max(ef[id as usize]);
        }
    }

    // --- Backward pass (latest start / latest finish) ---
    let mut ls = vec![0.0_f64; n];
    let mut lf = vec![0.0_f64; n];

    for id in graph.reverse_topological_order() {
        let idx = id as usize;
        let task = task_of(id);

        let deadline_cap = match task.deadline {
            Some(date) => cal.deadline_offset(date)?,
            None => f64::INFINITY,
        };

        let mut succ_min = f64::INFINITY;
        for &succ in graph.dependents_of(id) {
            if task_of(succ).flexible {
                continue;
            }
            succ_min = succ_min.min(ls[succ as usize]);
        }
        if succ_min.is_infinite() {
            succ_min = horizon_hours;
        }

        lf[idx] = deadline_cap.min(succ_min);
        ls[idx] = lf[idx] - task.duration_hrs;
    }

    // --- Build results ---
    let mut results: Vec<ScheduledTask> = Vec::with_capacity(n);
    let mut by_id: FxHashMap<String, usize> =
        FxHashMap::with_capacity_and_hasher(n, Default::default());

    for &id in graph.topological_order() {
        let idx = id as usize;
        let task = task_of(id);

        let deadline_cap = match task.deadline {
            Some(date) => cal.deadline_offset(date)?,
            None => f64::INFINITY,
        };
        let late = ef[idx] > deadline_cap + EPSILON;

        let (slack, critical) = if task.flexible {
            (f64::INFINITY, false)
        } else if task.status.is_done() {
            // History: no slack to report, critical only when the actual
            // finish already breached the deadline.
            (0.0, late)
        } else {
            let slack = ls[idx] - es[idx];
            (slack, slack <= EPSILON)
        };

        let (start_at, finish_at) = match &task.status {
            Status::Done {
                started_at,
                finished_at,
            } => (started_at.unwrap_or(*finished_at), *finished_at),
            Status::InProgress { started_at } => (
                *started_at,
                cal.add_working_hours(*started_at, task.duration_hrs)?,
            ),
            Status::NotStarted => (
                cal.add_working_hours(project_start, es[idx])?,
                cal.add_working_hours(project_start, ef[idx])?,
            ),
        };

        // Latest instants are clamped at the project start; a negative
        // latest offset already shows up as negative slack.
        let latest_start_at = cal.add_working_hours(project_start, ls[idx].max(0.0))?;
        let latest_finish_at = cal.add_working_hours(project_start, lf[idx].max(0.0))?;

        by_id.insert(task.id.clone(), results.len());
        results.push(ScheduledTask {
            id: task.id.clone(),
            timing: TaskTiming {
                earliest_start: es[idx],
                earliest_finish: ef[idx],
                latest_start: ls[idx],
                latest_finish: lf[idx],
                slack,
            },
            start_at,
            finish_at,
            latest_start_at,
            latest_finish_at,
            critical,
            late,
        });
    }

    Ok(CpmResult {
        tasks: results,
        by_id,
        horizon_hours,
        project_start,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn dt(year: i32, month: u32, day: u32, hour: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(hour, min, 0)
            .unwrap()
    }

    // Monday 2026-02-23, 8h/day, 09:00 start, weekends skipped.
    fn config() -> ProjectConfig {
        ProjectConfig::new(dt(2026, 2, 23, 9, 0))
    }

    fn make_task(id: &str, duration: f64, deps: &[&str]) -> Task {
        let mut t = Task::new(id, format!("task {id}"), duration);
        t.depends_on = deps.iter().map(|d| d.to_string()).collect();
        t
    }

    fn task_map(tasks: Vec<Task>) -> FxHashMap<String, Task> {
        tasks.into_iter().map(|t| (t.id.clone(), t)).collect()
    }

    #[test]
    fn test_chain_forward_pass() {
        let tasks = task_map(vec![
            make_task("T-1", 2.0, &[]),
            make_task("T-2", 3.0, &["T-1"]),
        ]);
        let result = calculate_schedule(&tasks, &config()).unwrap();
        let t2 = result.get("T-2").unwrap();
        assert!((t2.timing.earliest_start - 2.0).abs() < EPSILON);
        assert!((t2.timing.earliest_finish - 5.0).abs() < EPSILON);
        assert_eq!(t2.start_at, dt(2026, 2, 23, 11, 0));
        assert_eq!(t2.finish_at, dt(2026, 2, 23, 14, 0));
    }

    #[test]
    fn test_parallel_paths_slack() {
        // T-1 (2h) and T-2 (5h) both feed T-3 (1h); T-1 has 3h slack
        let tasks = task_map(vec![
            make_task("T-1", 2.0, &[]),
            make_task("T-2", 5.0, &[]),
            make_task("T-3", 1.0, &["T-1", "T-2"]),
        ]);
        let result = calculate_schedule(&tasks, &config()).unwrap();
        let t1 = result.get("T-1").unwrap();
        assert!((t1.timing.slack - 3.0).abs() < EPSILON);
        assert!(!t1.critical);
        assert!(result.get("T-2").unwrap().critical);
        assert!(result.get("T-3").unwrap().critical);
    }

    #[test]
    fn test_deadline_pulls_slack_upstream() {
        // A(4h) -> B(4h), deadline on B at end of day one
        let mut b = make_task("T-2", 4.0, &["T-1"]);
        b.deadline = Some(NaiveDate::from_ymd_opt(2026, 2, 23).unwrap());
        let tasks = task_map(vec![make_task("T-1", 4.0, &[]), b]);
        let result = calculate_schedule(&tasks, &config()).unwrap();

        let a = result.get("T-1").unwrap();
        assert!((a.timing.latest_start - 0.0).abs() < EPSILON);
        assert!((a.timing.latest_finish - 4.0).abs() < EPSILON);
        assert!((a.timing.slack - 0.0).abs() < EPSILON);
        assert!(a.critical);
    }

    #[test]
    fn test_late_chain_negative_slack() {
        // A(5h) -> B(5h), deadline 8h from start: both 2h late
        let mut b = make_task("T-2", 5.0, &["T-1"]);
        b.deadline = Some(NaiveDate::from_ymd_opt(2026, 2, 23).unwrap());
        let tasks = task_map(vec![make_task("T-1", 5.0, &[]), b]);
        let result = calculate_schedule(&tasks, &config()).unwrap();

        let a = result.get("T-1").unwrap();
        let b = result.get("T-2").unwrap();
        assert!((a.timing.slack + 2.0).abs() < EPSILON);
        assert!((b.timing.slack + 2.0).abs() < EPSILON);
        assert!(a.critical && b.critical);
        assert!(b.late);
        assert!(!a.late); // A has no deadline of its own
    }

    #[test]
    fn test_proposed_start_floor() {
        let mut t = make_task("T-1", 2.0, &[]);
        t.proposed_start = Some(NaiveDate::from_ymd_opt(2026, 2, 24).unwrap());
        let tasks = task_map(vec![t]);
        let result = calculate_schedule(&tasks, &config()).unwrap();
        let s = result.get("T-1").unwrap();
        assert!((s.timing.earliest_start - 8.0).abs() < EPSILON);
        assert_eq!(s.finish_at, dt(2026, 2, 24, 11, 0));
    }

    #[test]
    fn test_proposed_start_on_weekend_shifts_forward() {
        let mut t = make_task("T-1", 1.0, &[]);
        t.proposed_start = Some(NaiveDate::from_ymd_opt(2026, 2, 28).unwrap()); // Saturday
        let tasks = task_map(vec![t]);
        let result = calculate_schedule(&tasks, &config()).unwrap();
        let s = result.get("T-1").unwrap();
        // Floor lands on Monday Mar 2 = 40 working hours in
        assert!((s.timing.earliest_start - 40.0).abs() < EPSILON);
    }

    #[test]
    fn test_done_task_pins_downstream_to_actual_finish() {
        let mut t1 = make_task("T-1", 10.0, &[]);
        t1.status = Status::Done {
            started_at: Some(dt(2026, 2, 23, 9, 0)),
            finished_at: dt(2026, 2, 23, 12, 0), // finished way under estimate
        };
        let tasks = task_map(vec![t1, make_task("T-2", 2.0, &["T-1"])]);
        let result = calculate_schedule(&tasks, &config()).unwrap();
        let t2 = result.get("T-2").unwrap();
        // Downstream sees the 3h actual finish, not the 10h estimate
        assert!((t2.timing.earliest_start - 3.0).abs() < EPSILON);
    }

    #[test]
    fn test_in_progress_keeps_full_duration() {
        let mut t = make_task("T-1", 4.0, &[]);
        t.status = Status::InProgress {
            started_at: dt(2026, 2, 23, 11, 0),
        };
        let tasks = task_map(vec![t]);
        let result = calculate_schedule(&tasks, &config()).unwrap();
        let s = result.get("T-1").unwrap();
        assert!((s.timing.earliest_start - 2.0).abs() < EPSILON);
        assert!((s.timing.earliest_finish - 6.0).abs() < EPSILON);
        assert_eq!(s.finish_at, dt(2026, 2, 23, 15, 0));
    }

    #[test]
    fn test_flexible_is_isolated() {
        let base = task_map(vec![
            make_task("T-1", 4.0, &[]),
            make_task("T-2", 4.0, &["T-1"]),
        ]);
        let without = calculate_schedule(&base, &config()).unwrap();

        let mut with_flex = base.clone();
        let mut flex = make_task("T-9", 2.0, &[]);
        flex.flexible = true;
        with_flex.insert("T-9".to_string(), flex);
        let with = calculate_schedule(&with_flex, &config()).unwrap();

        for id in ["T-1", "T-2"] {
            let a = without.get(id).unwrap();
            let b = with.get(id).unwrap();
            assert_eq!(a.timing.earliest_start, b.timing.earliest_start);
            assert_eq!(a.timing.earliest_finish, b.timing.earliest_finish);
            assert_eq!(a.timing.latest_start, b.timing.latest_start);
            assert_eq!(a.timing.latest_finish, b.timing.latest_finish);
            assert_eq!(a.timing.slack, b.timing.slack);
        }
        let flex = with.get("T-9").unwrap();
        assert!(flex.timing.slack.is_infinite());
        assert!(!flex.critical);
    }

    #[test]
    fn test_dependent_ignores_flexible_ancestor() {
        let mut flex = make_task("T-1", 40.0, &[]);
        flex.flexible = true;
        let tasks = task_map(vec![flex, make_task("T-2", 2.0, &["T-1"])]);
        let result = calculate_schedule(&tasks, &config()).unwrap();
        let t2 = result.get("T-2").unwrap();
        assert!((t2.timing.earliest_start - 0.0).abs() < EPSILON);
    }

    #[test]
    fn test_milestone_zero_duration() {
        let tasks = task_map(vec![make_task("T-1", 0.0, &[])]);
        let result = calculate_schedule(&tasks, &config()).unwrap();
        let s = result.get("T-1").unwrap();
        assert_eq!(s.start_at, s.finish_at);
        assert!(s.critical); // zero slack against the empty horizon
    }

    #[test]
    fn test_topological_soundness() {
        let tasks = task_map(vec![
            make_task("T-1", 3.0, &[]),
            make_task("T-2", 2.0, &["T-1"]),
            make_task("T-3", 5.0, &["T-1"]),
            make_task("T-4", 1.0, &["T-2", "T-3"]),
        ]);
        let result = calculate_schedule(&tasks, &config()).unwrap();
        for s in &result.tasks {
            let task = &tasks[&s.id];
            for dep in &task.depends_on {
                let d = result.get(dep).unwrap();
                assert!(
                    d.timing.earliest_finish <= s.timing.earliest_start + EPSILON,
                    "{} should finish before {} starts",
                    dep,
                    s.id
                );
            }
            // Slack identity
            if !task.flexible && !task.status.is_done() {
                let slack = s.timing.latest_start - s.timing.earliest_start;
                assert!((s.timing.slack - slack).abs() < EPSILON);
                assert_eq!(s.critical, s.timing.slack <= EPSILON);
            }
        }
    }
}
