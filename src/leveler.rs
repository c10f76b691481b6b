//! Single-person resource leveling.
//!
//! Produces a realistic schedule by serializing attended work onto one
//! cursor while background work runs on an independent parallel cursor.
//! Output is a chronological list of per-day time blocks; done tasks are
//! emitted as historical blocks at their actual times, and flexible tasks
//! are not placed at all.

use chrono::{NaiveDate, NaiveDateTime};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::calendar::{Calendar, EPSILON, MAX_SEARCH_DAYS};
use crate::cpm::CpmResult;
use crate::error::{DagrError, Result};
use crate::graph::{TaskGraph, TaskId};
use crate::logging::Diagnostics;
use crate::models::{ProjectConfig, Status, Task};

/// Which cursor a block was placed on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stream {
    Attended,
    Background,
}

/// One contiguous chunk of work within a single working day.
#[derive(Clone, Debug)]
pub struct Block {
    pub task_id: String,
    pub stream: Stream,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub hours: f64,
}

/// The leveled schedule.
#[derive(Clone, Debug, Default)]
pub struct LevelResult {
    /// All blocks in chronological order.
    pub blocks: Vec<Block>,
    pub starts: FxHashMap<String, NaiveDateTime>,
    pub finishes: FxHashMap<String, NaiveDateTime>,
    /// Latest end instant across both streams (flexible tasks excluded).
    pub projected_completion: Option<NaiveDateTime>,
}

impl LevelResult {
    pub fn finish_of(&self, id: &str) -> Option<NaiveDateTime> {
        self.finishes.get(id).copied()
    }
}

/// A task's share of one calendar day, annotated for display.
#[derive(Clone, Debug)]
pub struct DayEntry {
    pub task_id: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub hours: f64,
    pub critical: bool,
    pub background: bool,
}

/// All planned work of one calendar day.
#[derive(Clone, Debug)]
pub struct DayPlan {
    pub date: NaiveDate,
    pub entries: Vec<DayEntry>,
    pub attended_hours: f64,
    pub background_hours: f64,
}

/// Compute the resource-leveled schedule.
///
/// `now` seeds the cursors when any task is in progress; engines never read
/// a global clock themselves. `diag` narrates placements on stderr and is
/// silent by default.
pub fn level_schedule(
    tasks: &FxHashMap<String, Task>,
    config: &ProjectConfig,
    cpm: &CpmResult,
    now: Option<NaiveDateTime>,
    diag: Diagnostics,
) -> Result<LevelResult> {
    let graph = TaskGraph::build(tasks)?;
    let cal = Calendar::new(config);
    let project_start = cal.project_start_instant()?;

    let task_of = |i: TaskId| &tasks[graph.index.resolve(i)];

    let any_in_progress = tasks.values().any(|t| t.status.is_in_progress());
    let base_cursor = match now {
        Some(n) if any_in_progress => cal.snap_forward(n)?.max(project_start),
        _ => project_start,
    };
    let mut attended_cursor = base_cursor;
    let background_cursor = base_cursor;

    let mut result = LevelResult::default();
    let mut placed: FxHashMap<TaskId, NaiveDateTime> = FxHashMap::default();
    let mut remaining: FxHashSet<TaskId> = FxHashSet::default();

    // Done tasks are history: place them at their actual times up front.
    for &id in graph.topological_order() {
        let task = task_of(id);
        if task.flexible {
            continue;
        }
        match &task.status {
            Status::Done {
                started_at,
                finished_at,
            } => {
                let start = started_at.unwrap_or(*finished_at);
                let stream = if task.background {
                    Stream::Background
                } else {
                    Stream::Attended
                };
                result.blocks.push(Block {
                    task_id: task.id.clone(),
                    stream,
                    start,
                    end: *finished_at,
                    hours: cal.working_hours_between(start, *finished_at)?,
                });
                result.starts.insert(task.id.clone(), start);
                result.finishes.insert(task.id.clone(), *finished_at);
                placed.insert(id, *finished_at);
            }
            _ => {
                remaining.insert(id);
            }
        }
    }

    while !remaining.is_empty() {
        // Ready: every non-flexible dependency already placed.
        let mut ready: Vec<TaskId> = remaining
            .iter()
            .copied()
            .filter(|&id| {
                graph
                    .dependencies_of(id)
                    .iter()
                    .all(|&dep| task_of(dep).flexible || placed.contains_key(&dep))
            })
            .collect();
        if ready.is_empty() {
            break; // cannot happen in a validated DAG, but guard anyway
        }
        ready.sort_by(|&a, &b| {
            selection_key(task_of(a), cpm, a)
                .partial_cmp(&selection_key(task_of(b), cpm, b))
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        // Background tasks don't consume the attended cursor; place every
        // ready one immediately.
        let mut placed_any_background = false;
        for &id in &ready {
            let task = task_of(id);
            if !task.background {
                continue;
            }
            let start = placement_start(&cal, &graph, task, id, background_cursor, &placed)?;
            let end = cal.add_working_hours(start, task.duration_hrs)?;
            diag.placed(&task.id, "background", start, end);
            append_blocks(&cal, &mut result.blocks, task, Stream::Background, start)?;
            result.starts.insert(task.id.clone(), start);
            result.finishes.insert(task.id.clone(), end);
            placed.insert(id, end);
            remaining.remove(&id);
            placed_any_background = true;
        }

        let Some(&chosen) = ready.iter().find(|&&id| !task_of(id).background) else {
            if placed_any_background {
                continue;
            }
            break;
        };
        let task = task_of(chosen);
        diag.considering(
            &task.id,
            cpm.get(&task.id).map(|s| s.timing.slack).unwrap_or(0.0),
        );

        let start = placement_start(&cal, &graph, task, chosen, attended_cursor, &placed)?;
        let end = cal.add_working_hours(start, task.duration_hrs)?;
        diag.placed(&task.id, "attended", start, end);
        append_blocks(&cal, &mut result.blocks, task, Stream::Attended, start)?;
        result.starts.insert(task.id.clone(), start);
        result.finishes.insert(task.id.clone(), end);
        placed.insert(chosen, end);
        remaining.remove(&chosen);
        attended_cursor = end;
    }

    result
        .blocks
        .sort_by(|a, b| (a.start, a.end).cmp(&(b.start, b.end)));
    result.projected_completion = result.finishes.values().max().copied();
    Ok(result)
}

/// Selection ladder: in-progress first, then ascending slack, earliest
/// start, numeric id suffix.
fn selection_key(task: &Task, cpm: &CpmResult, id: TaskId) -> (u8, f64, f64, u32) {
    let (slack, es) = cpm
        .get(&task.id)
        .map(|s| (s.timing.slack, s.timing.earliest_start))
        .unwrap_or((f64::INFINITY, f64::INFINITY));
    let in_progress = if task.status.is_in_progress() { 0 } else { 1 };
    (in_progress, slack, es, id)
}

/// Where a task actually begins: the stream cursor, pushed by dependency
/// finishes, the proposed-start floor, and (for in-progress work) the
/// recorded actual start.
fn placement_start(
    cal: &Calendar,
    graph: &TaskGraph,
    task: &Task,
    id: TaskId,
    cursor: NaiveDateTime,
    placed: &FxHashMap<TaskId, NaiveDateTime>,
) -> Result<NaiveDateTime> {
    let mut start = cursor;
    for dep in graph.dependencies_of(id) {
        if let Some(&finish) = placed.get(dep) {
            start = start.max(finish);
        }
    }
    if let Some(date) = task.proposed_start {
        start = start.max(cal.day_start(date));
    }
    if let Status::InProgress { started_at } = &task.status {
        start = start.max(*started_at);
    }
    cal.snap_forward(start)
}

/// Emit one block per calendar-day segment of a placement.
fn append_blocks(
    cal: &Calendar,
    blocks: &mut Vec<Block>,
    task: &Task,
    stream: Stream,
    start: NaiveDateTime,
) -> Result<()> {
    if task.duration_hrs <= EPSILON {
        blocks.push(Block {
            task_id: task.id.clone(),
            stream,
            start,
            end: start,
            hours: 0.0,
        });
        return Ok(());
    }

    let mut remaining = task.duration_hrs;
    let mut current = start;
    for _ in 0..MAX_SEARCH_DAYS {
        let day_end = cal.end_of_working_day(current.date());
        let available = cal.working_hours_between(current, day_end)?;
        let take = remaining.min(available);
        if take > EPSILON {
            let segment_end = cal.add_working_hours(current, take)?;
            blocks.push(Block {
                task_id: task.id.clone(),
                stream,
                start: current,
                end: segment_end,
                hours: take,
            });
            remaining -= take;
        }
        if remaining <= EPSILON {
            return Ok(());
        }
        current = cal.snap_forward(cal.day_start(
            current
                .date()
                .succ_opt()
                .ok_or(DagrError::UnschedulableHorizon(MAX_SEARCH_DAYS))?,
        ))?;
    }
    Err(DagrError::UnschedulableHorizon(MAX_SEARCH_DAYS))
}

/// Group planned blocks by calendar date with per-day hour totals.
///
/// Historical blocks of done tasks are omitted; the daily view is a plan,
/// not a log.
pub fn daily_rollup(
    result: &LevelResult,
    tasks: &FxHashMap<String, Task>,
    cpm: &CpmResult,
) -> Vec<DayPlan> {
    let mut days: FxHashMap<NaiveDate, Vec<DayEntry>> = FxHashMap::default();

    for block in &result.blocks {
        let Some(task) = tasks.get(&block.task_id) else {
            continue;
        };
        if task.status.is_done() || block.hours <= 0.01 {
            continue;
        }
        let critical = cpm.get(&block.task_id).map(|s| s.critical).unwrap_or(false);
        days.entry(block.start.date()).or_default().push(DayEntry {
            task_id: block.task_id.clone(),
            start: block.start,
            end: block.end,
            hours: block.hours,
            critical,
            background: block.stream == Stream::Background,
        });
    }

    let mut plans: Vec<DayPlan> = days
        .into_iter()
        .map(|(date, mut entries)| {
            entries.sort_by(|a, b| (a.start, a.task_id.clone()).cmp(&(b.start, b.task_id.clone())));
            let attended_hours = entries
                .iter()
                .filter(|e| !e.background)
                .map(|e| e.hours)
                .sum();
            let background_hours = entries
                .iter()
                .filter(|e| e.background)
                .map(|e| e.hours)
                .sum();
            DayPlan {
                date,
                entries,
                attended_hours,
                background_hours,
            }
        })
        .collect();
    plans.sort_by_key(|p| p.date);
    plans
}
