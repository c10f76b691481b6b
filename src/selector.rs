//! "What's next" derivations over the CPM and leveled schedules: the single
//! next task, background kickoffs, the dopamine menu, and at-risk deadlines.

use chrono::NaiveDateTime;
use rustc_hash::FxHashMap;

use crate::calendar::Calendar;
use crate::cpm::CpmResult;
use crate::error::Result;
use crate::leveler::LevelResult;
use crate::models::{id_suffix, ProjectConfig, Task};

/// A dependency blocks readiness unless it is done; flexible dependencies
/// never block, matching the CPM treatment.
fn deps_satisfied(task: &Task, tasks: &FxHashMap<String, Task>) -> bool {
    task.depends_on.iter().all(|dep| {
        tasks
            .get(dep)
            .map(|d| d.flexible || d.status.is_done())
            .unwrap_or(false)
    })
}

fn suffix(task: &Task) -> u64 {
    id_suffix(&task.id).unwrap_or(u64::MAX)
}

fn urgency_key(task: &Task, cpm: &CpmResult) -> (f64, f64, u64) {
    let (slack, es) = cpm
        .get(&task.id)
        .map(|s| (s.timing.slack, s.timing.earliest_start))
        .unwrap_or((f64::INFINITY, f64::INFINITY));
    (slack, es, suffix(task))
}

/// The single task to work on now.
///
/// Anything already in progress wins (lowest id if several); otherwise the
/// lowest-slack ready attended task.
pub fn next_task<'a>(
    tasks: &'a FxHashMap<String, Task>,
    cpm: &CpmResult,
) -> Option<&'a Task> {
    let mut in_progress: Vec<&Task> = tasks
        .values()
        .filter(|t| t.status.is_in_progress())
        .collect();
    if !in_progress.is_empty() {
        in_progress.sort_by_key(|t| suffix(t));
        return Some(in_progress[0]);
    }

    let mut candidates: Vec<&Task> = tasks
        .values()
        .filter(|t| {
            !t.flexible && !t.background && !t.status.is_done() && deps_satisfied(t, tasks)
        })
        .collect();
    candidates.sort_by(|a, b| {
        urgency_key(a, cpm)
            .partial_cmp(&urgency_key(b, cpm))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    candidates.first().copied()
}

/// Background tasks that are ready to kick off and not yet started.
pub fn kickoff_background<'a>(
    tasks: &'a FxHashMap<String, Task>,
    cpm: &CpmResult,
) -> Vec<&'a Task> {
    let mut ready: Vec<&Task> = tasks
        .values()
        .filter(|t| {
            t.background && !t.flexible && t.status.is_not_started() && deps_satisfied(t, tasks)
        })
        .collect();
    ready.sort_by(|a, b| {
        urgency_key(a, cpm)
            .partial_cmp(&urgency_key(b, cpm))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ready
}

/// Ready flexible tasks, bucketed for low-willpower moments.
#[derive(Clone, Debug, Default)]
pub struct DopamineMenu<'a> {
    pub quick_wins: Vec<&'a Task>,
    pub low_energy: Vec<&'a Task>,
    pub hyperfocus: Vec<&'a Task>,
    pub side_quests: Vec<&'a Task>,
}

impl<'a> DopamineMenu<'a> {
    pub fn is_empty(&self) -> bool {
        self.quick_wins.is_empty()
            && self.low_energy.is_empty()
            && self.hyperfocus.is_empty()
            && self.side_quests.is_empty()
    }

    /// Buckets in display order with their headings.
    pub fn sections(&self) -> [(&'static str, &[&'a Task]); 4] {
        [
            ("Quick Wins", self.quick_wins.as_slice()),
            ("Low Energy", self.low_energy.as_slice()),
            ("Hyperfocus", self.hyperfocus.as_slice()),
            ("Other Side Quests", self.side_quests.as_slice()),
        ]
    }
}

/// Bucket the ready flexible tasks; first matching rule wins.
pub fn dopamine_menu<'a>(tasks: &'a FxHashMap<String, Task>) -> DopamineMenu<'a> {
    let mut ready: Vec<&Task> = tasks
        .values()
        .filter(|t| t.flexible && t.status.is_not_started() && deps_satisfied(t, tasks))
        .collect();
    ready.sort_by(|a, b| {
        (a.duration_hrs, suffix(a))
            .partial_cmp(&(b.duration_hrs, suffix(b)))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut menu = DopamineMenu::default();
    for task in ready {
        if task.duration_hrs < 1.0 || task.has_tag("quick") {
            menu.quick_wins.push(task);
        } else if task.has_tag("low-energy") || task.has_tag("braindead") {
            menu.low_energy.push(task);
        } else if task.has_tag("hyperfocus") || task.has_tag("deep-work") {
            menu.hyperfocus.push(task);
        } else {
            menu.side_quests.push(task);
        }
    }
    menu
}

/// A task whose leveled finish blows through its deadline.
#[derive(Clone, Debug)]
pub struct AtRiskTask<'a> {
    pub task: &'a Task,
    pub deadline_at: NaiveDateTime,
    pub projected_finish: NaiveDateTime,
}

/// Non-done tasks with a deadline whose resource-leveled projected finish
/// exceeds it.
pub fn at_risk_tasks<'a>(
    tasks: &'a FxHashMap<String, Task>,
    config: &ProjectConfig,
    cpm: &CpmResult,
    level: &LevelResult,
) -> Result<Vec<AtRiskTask<'a>>> {
    let cal = Calendar::new(config);
    let mut at_risk: Vec<AtRiskTask> = Vec::new();

    for task in tasks.values() {
        if task.status.is_done() {
            continue;
        }
        let Some(deadline) = task.deadline else {
            continue;
        };
        // Flexible tasks aren't leveled; fall back to their CPM finish.
        let projected = match level.finish_of(&task.id) {
            Some(f) => f,
            None => match cpm.get(&task.id) {
                Some(s) => s.finish_at,
                None => continue,
            },
        };
        let deadline_at = cal.end_of_working_day(deadline);
        if projected > deadline_at {
            at_risk.push(AtRiskTask {
                task,
                deadline_at,
                projected_finish: projected,
            });
        }
    }

    at_risk.sort_by_key(|r| (r.deadline_at, suffix(r.task)));
    Ok(at_risk)
}
