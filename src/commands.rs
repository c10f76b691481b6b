//! Command handlers: load state, run the engines, render plain-text output.
//!
//! Every handler follows the same shape: load `dagr.json` from the working
//! directory, mutate or compute, save on success, print. Validation errors
//! abort before anything is written, so the state file is never left
//! half-updated.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::calendar::Calendar;
use crate::cli::{Cli, Command, CriticalSort};
use crate::cpm::{calculate_schedule, CpmResult, ScheduledTask};
use crate::error::DagrError;
use crate::graph::TaskGraph;
use crate::import::import_tasks;
use crate::leveler::{daily_rollup, level_schedule, DayPlan, LevelResult};
use crate::logging::{Diagnostics, Verbosity};
use crate::models::{id_suffix, ProjectConfig, Task};
use crate::selector;
use crate::state::{NewTask, Project, TaskPatch, Warnings};
use crate::store;
use crate::viz;

pub fn run(cli: Cli) -> Result<()> {
    let path = store::store_path(&std::env::current_dir()?);
    let verbosity = cli.verbose;

    match cli.command {
        Command::Init {
            start,
            hours_per_day,
            day_start,
            work_weekends,
        } => cmd_init(&path, &start, hours_per_day, &day_start, work_weekends),
        Command::Add {
            name,
            duration,
            depends,
            deadline,
            start,
            background,
            flexible,
            tags,
            project,
            notes,
        } => cmd_add(
            &path, name, duration, depends, deadline, start, background, flexible, tags, project,
            notes,
        ),
        Command::List {
            status,
            search,
            project,
        } => cmd_list(&path, status, search, project),
        Command::Update {
            task_id,
            name,
            duration,
            deadline,
            start,
            background,
            flexible,
            project,
            notes,
            tags,
            add_dep,
            remove_dep,
        } => cmd_update(
            &path, &task_id, name, duration, deadline, start, background, flexible, project,
            notes, tags, add_dep, remove_dep,
        ),
        Command::Delete { task_id } => cmd_delete(&path, &task_id),
        Command::Show { task_id } => cmd_show(&path, &task_id),
        Command::Start { task_id } => cmd_start(&path, &task_id),
        Command::Done { task_id } => cmd_done(&path, &task_id),
        Command::Reset { task_id } => cmd_reset(&path, &task_id),
        Command::SetStatus { task_id, status } => cmd_set_status(&path, &task_id, &status),
        Command::Import { file } => cmd_import(&path, &file),
        Command::Schedule { remaining, csv } => cmd_schedule(&path, remaining, csv),
        Command::CriticalPath { sort } => cmd_critical_path(&path, sort),
        Command::Status => cmd_status(&path, verbosity),
        Command::Next => cmd_next(&path, verbosity),
        Command::Today => cmd_daily(&path, 1, true, verbosity),
        Command::Daily { days } => cmd_daily(&path, days, false, verbosity),
        Command::Capacity { date, hours } => cmd_capacity(&path, &date, hours),
        Command::Viz { output, hide_done } => cmd_viz(&path, &output, hide_done, false),
        Command::VizHtml { output, hide_done } => cmd_viz(&path, &output, hide_done, true),
    }
}

// ---------------------------------------------------------------------------
// Parsing and formatting helpers
// ---------------------------------------------------------------------------

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

fn parse_date(field: &str, s: &str) -> Result<NaiveDate, DagrError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| DagrError::invalid_field(field, format!("'{s}' is not a YYYY-MM-DD date")))
}

fn parse_hhmm(s: &str) -> Result<NaiveTime, DagrError> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .map_err(|_| DagrError::invalid_field("day_start", format!("'{s}' is not HH:MM")))
}

/// A start given as a bare date begins at the working day start; an explicit
/// `THH:MM` wins.
fn parse_start_datetime(s: &str, day_start: NaiveTime) -> Result<NaiveDateTime, DagrError> {
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(dt);
        }
    }
    Ok(parse_date("start", s)?.and_time(day_start))
}

fn print_warnings(warnings: &Warnings) {
    for warning in warnings {
        eprintln!("warning: {warning}");
    }
}

fn fmt_instant(t: NaiveDateTime) -> String {
    t.format("%a %b %d, %H:%M").to_string()
}

fn fmt_short(t: NaiveDateTime) -> String {
    t.format("%b %d %H:%M").to_string()
}

fn fmt_slack(schedule: &ScheduledTask, task: &Task) -> String {
    if task.status.is_done() {
        "-".to_string()
    } else if schedule.timing.slack.is_infinite() {
        "inf".to_string()
    } else {
        format!("{:.1}", schedule.timing.slack)
    }
}

fn flags_of(schedule: &ScheduledTask) -> String {
    let mut flags: Vec<&str> = Vec::new();
    if schedule.critical {
        flags.push("CRITICAL");
    }
    if schedule.late {
        flags.push("LATE");
    }
    flags.join(" | ")
}

fn suffix_key(id: &str) -> u64 {
    id_suffix(id).unwrap_or(u64::MAX)
}

fn render_table(headers: &[&str], rows: &[Vec<String>]) {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.len());
        }
    }
    let line = |cells: Vec<String>| {
        let joined: Vec<String> = cells
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{:<width$}", c, width = widths[i]))
            .collect();
        println!("{}", joined.join("  ").trim_end());
    };
    line(headers.iter().map(|h| h.to_string()).collect());
    let underline: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    println!("{}", underline.join("  "));
    for row in rows {
        line(row.clone());
    }
}

fn load_project(path: &Path) -> Result<Project, DagrError> {
    store::load_required(path)
}

/// CPM + leveled schedule for display commands.
fn analyze(project: &Project, verbosity: u8) -> Result<(CpmResult, LevelResult), DagrError> {
    let diag = Diagnostics::new(Verbosity::from_flag_count(verbosity));
    let cpm = calculate_schedule(&project.tasks, &project.config)?;
    let level = level_schedule(&project.tasks, &project.config, &cpm, Some(now()), diag)?;
    Ok((cpm, level))
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_init(
    path: &Path,
    start: &str,
    hours_per_day: f64,
    day_start: &str,
    work_weekends: bool,
) -> Result<()> {
    if !(hours_per_day.is_finite() && hours_per_day > 0.0) {
        return Err(DagrError::invalid_field("hours_per_day", "must be positive").into());
    }
    let day_start_time = parse_hhmm(day_start)?;
    let start_datetime = parse_start_datetime(start, day_start_time)?;

    // Reinitializing keeps the task set, replaces the configuration.
    let tasks = store::load(path)?.map(|p| p.tasks).unwrap_or_default();
    let project = Project {
        config: ProjectConfig {
            start_datetime,
            hours_per_day,
            day_start_time,
            skip_weekends: !work_weekends,
            capacity_overrides: Default::default(),
        },
        tasks,
    };
    store::save(path, &project)?;
    println!("Project initialized. Start: {}", fmt_instant(start_datetime));
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_add(
    path: &Path,
    name: String,
    duration: f64,
    depends: Vec<String>,
    deadline: Option<String>,
    start: Option<String>,
    background: bool,
    flexible: bool,
    tags: Vec<String>,
    project_label: String,
    notes: String,
) -> Result<()> {
    let mut project = load_project(path)?;

    let mut depends_on: Vec<String> = Vec::new();
    for dep in &depends {
        depends_on.extend(
            dep.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from),
        );
    }

    let new = NewTask {
        name: name.clone(),
        duration_hrs: duration,
        depends_on,
        deadline: deadline.as_deref().map(|d| parse_date("deadline", d)).transpose()?,
        proposed_start: start.as_deref().map(|d| parse_date("start", d)).transpose()?,
        background,
        flexible,
        project: project_label,
        tags,
        notes,
    };
    let (id, warnings) = project.add_task(new)?;
    store::save(path, &project)?;
    print_warnings(&warnings);
    println!("Added '{name}' as {id}");
    Ok(())
}

fn cmd_list(
    path: &Path,
    status: Option<String>,
    search: Option<String>,
    project_filter: Option<String>,
) -> Result<()> {
    let project = load_project(path)?;
    if project.tasks.is_empty() {
        println!("No tasks found.");
        return Ok(());
    }

    if let Some(s) = &status {
        if !matches!(s.as_str(), "not_started" | "in_progress" | "done") {
            return Err(DagrError::invalid_field(
                "status",
                format!("'{s}' is not one of not_started, in_progress, done"),
            )
            .into());
        }
    }

    let mut tasks: Vec<&Task> = project
        .tasks
        .values()
        .filter(|t| status.as_deref().map(|s| t.status.label() == s).unwrap_or(true))
        .filter(|t| {
            search
                .as_deref()
                .map(|q| {
                    let q = q.to_lowercase();
                    t.name.to_lowercase().contains(&q) || t.id.to_lowercase().contains(&q)
                })
                .unwrap_or(true)
        })
        .filter(|t| {
            project_filter
                .as_deref()
                .map(|p| t.project == p)
                .unwrap_or(true)
        })
        .collect();
    if tasks.is_empty() {
        println!("No tasks match the filter.");
        return Ok(());
    }
    tasks.sort_by_key(|t| suffix_key(&t.id));

    let rows: Vec<Vec<String>> = tasks
        .iter()
        .map(|t| {
            let mut markers: Vec<&str> = Vec::new();
            if t.background {
                markers.push("bg");
            }
            if t.flexible {
                markers.push("flex");
            }
            vec![
                t.id.clone(),
                t.name.clone(),
                format!("{:.1}", t.duration_hrs),
                if t.depends_on.is_empty() {
                    "-".to_string()
                } else {
                    t.depends_on.join(", ")
                },
                t.status.label().to_string(),
                markers.join(","),
                t.deadline.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect();
    render_table(
        &["ID", "Name", "Hours", "Depends On", "Status", "Flags", "Deadline"],
        &rows,
    );
    if status.is_some() || search.is_some() || project_filter.is_some() {
        println!("Showing {} of {} tasks", tasks.len(), project.tasks.len());
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_update(
    path: &Path,
    task_id: &str,
    name: Option<String>,
    duration: Option<f64>,
    deadline: Option<String>,
    start: Option<String>,
    background: Option<bool>,
    flexible: Option<bool>,
    project_label: Option<String>,
    notes: Option<String>,
    tags: Vec<String>,
    add_dep: Vec<String>,
    remove_dep: Vec<String>,
) -> Result<()> {
    let mut project = load_project(path)?;
    let patch = TaskPatch {
        name,
        duration_hrs: duration,
        deadline: deadline.as_deref().map(|d| parse_date("deadline", d)).transpose()?,
        proposed_start: start.as_deref().map(|d| parse_date("start", d)).transpose()?,
        background,
        flexible,
        project: project_label,
        notes,
        tags: if tags.is_empty() { None } else { Some(tags) },
        add_deps: add_dep,
        remove_deps: remove_dep,
    };
    let warnings = project.update_task(task_id, patch)?;
    store::save(path, &project)?;
    print_warnings(&warnings);
    println!("Updated {task_id}.");
    Ok(())
}

fn cmd_delete(path: &Path, task_id: &str) -> Result<()> {
    let mut project = load_project(path)?;
    project.delete_task(task_id)?;
    store::save(path, &project)?;
    println!("Deleted {task_id}.");
    Ok(())
}

fn cmd_show(path: &Path, task_id: &str) -> Result<()> {
    let project = load_project(path)?;
    let task = project.get(task_id)?;

    println!();
    println!("{}  {}", task.id, task.name);
    println!("  Status:     {}", task.status.label());
    println!("  Duration:   {:.1}h", task.duration_hrs);
    println!("  Background: {}", if task.background { "yes" } else { "no" });
    println!("  Flexible:   {}", if task.flexible { "yes" } else { "no" });
    if !task.project.is_empty() {
        println!("  Project:    {}", task.project);
    }
    if !task.tags.is_empty() {
        println!("  Tags:       {}", task.tags.join(", "));
    }
    println!(
        "  Depends on: {}",
        if task.depends_on.is_empty() {
            "none".to_string()
        } else {
            task.depends_on.join(", ")
        }
    );
    let dependents = project.dependents_of(task_id);
    println!(
        "  Blocks:     {}",
        if dependents.is_empty() {
            "none".to_string()
        } else {
            dependents.join(", ")
        }
    );
    if let Ok(graph) = TaskGraph::build(&project.tasks) {
        if let Some(idx) = graph.index.get(task_id) {
            let upstream = graph.reachable_ancestors(idx).len();
            let downstream = graph.reachable_descendants(idx).len();
            if upstream > 0 || downstream > 0 {
                println!("  Chain:      {upstream} upstream, {downstream} downstream");
            }
        }
    }
    if let Some(deadline) = task.deadline {
        println!("  Deadline:   {deadline}");
    }
    if let Some(proposed) = task.proposed_start {
        println!("  Proposed start: {proposed}");
    }
    if let Some(started) = task.status.started_at() {
        println!("  Actual start:   {}", fmt_instant(started));
    }
    if let Some(finished) = task.status.finished_at() {
        println!("  Actual finish:  {}", fmt_instant(finished));
    }
    if !task.notes.is_empty() {
        println!("  Notes:      {}", task.notes);
    }

    if let Ok(cpm) = calculate_schedule(&project.tasks, &project.config) {
        if let Some(s) = cpm.get(task_id) {
            println!();
            println!("  -- Scheduled --");
            println!("  Earliest start:  {}", fmt_instant(s.start_at));
            println!("  Earliest finish: {}", fmt_instant(s.finish_at));
            println!("  Latest start:    {}", fmt_instant(s.latest_start_at));
            println!("  Latest finish:   {}", fmt_instant(s.latest_finish_at));
            println!("  Slack:           {}h", fmt_slack(s, task));
            if s.critical {
                println!("  On the critical path");
            }
            if s.late {
                println!("  Projected LATE past its deadline");
            }
        }
    }
    println!();
    Ok(())
}

fn cmd_start(path: &Path, task_id: &str) -> Result<()> {
    let mut project = load_project(path)?;
    let started = now();
    let warnings = project.start_task(task_id, started)?;
    store::save(path, &project)?;
    print_warnings(&warnings);
    println!("Started {task_id} at {}", fmt_instant(started));
    Ok(())
}

fn cmd_done(path: &Path, task_id: &str) -> Result<()> {
    let mut project = load_project(path)?;
    let finished = now();
    let warnings = project.finish_task(task_id, finished)?;
    store::save(path, &project)?;
    print_warnings(&warnings);
    println!("Completed {task_id} at {}", fmt_instant(finished));

    // Actual vs estimated, when a start was recorded.
    let task = project.get(task_id)?;
    if let (Some(started), Some(finished)) =
        (task.status.started_at(), task.status.finished_at())
    {
        let cal = Calendar::new(&project.config);
        let actual = cal.working_hours_between(started, finished)?;
        let estimated = task.duration_hrs;
        let diff = actual - estimated;
        if diff.abs() < 0.1 {
            println!("  Estimated: {estimated:.1}h  Actual: {actual:.1}h  Right on target");
        } else if diff > 0.0 {
            println!("  Estimated: {estimated:.1}h  Actual: {actual:.1}h  +{diff:.1}h over");
        } else {
            println!("  Estimated: {estimated:.1}h  Actual: {actual:.1}h  {diff:.1}h under");
        }
    }
    Ok(())
}

fn cmd_reset(path: &Path, task_id: &str) -> Result<()> {
    let mut project = load_project(path)?;
    let previous = project.reset_task(task_id)?;
    store::save(path, &project)?;
    println!("Reset {task_id} from {previous} to not_started.");
    Ok(())
}

fn cmd_set_status(path: &Path, task_id: &str, status: &str) -> Result<()> {
    let mut project = load_project(path)?;
    let warnings = project.set_status(task_id, status, now())?;
    store::save(path, &project)?;
    print_warnings(&warnings);
    println!("Set {task_id} to {status}.");
    Ok(())
}

fn cmd_import(path: &Path, file: &Path) -> Result<()> {
    let payload = if file == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading import payload from stdin")?;
        buf
    } else {
        std::fs::read_to_string(file)
            .with_context(|| format!("reading import payload from {}", file.display()))?
    };

    let mut project = load_project(path)?;
    let summary = import_tasks(&mut project, &payload)?;
    store::save(path, &project)?;
    print_warnings(&summary.warnings);
    println!(
        "Imported {} new task(s), updated {}.",
        summary.created.len(),
        summary.updated.len()
    );
    if !summary.created.is_empty() {
        println!("  Created: {}", summary.created.join(", "));
    }
    if !summary.updated.is_empty() {
        println!("  Updated: {}", summary.updated.join(", "));
    }
    Ok(())
}

fn cmd_schedule(path: &Path, remaining: bool, csv: Option<PathBuf>) -> Result<()> {
    let project = load_project(path)?;
    if project.tasks.is_empty() {
        println!("No tasks to schedule.");
        return Ok(());
    }
    let cpm = calculate_schedule(&project.tasks, &project.config)?;

    let scheduled: Vec<&ScheduledTask> = cpm
        .tasks
        .iter()
        .filter(|s| !(remaining && project.tasks[&s.id].status.is_done()))
        .collect();

    if let Some(csv_path) = csv {
        let mut writer = csv::Writer::from_path(&csv_path)
            .with_context(|| format!("writing {}", csv_path.display()))?;
        writer.write_record([
            "ID", "Task Name", "Hours", "Status", "Start", "End", "Slack (h)", "Deadline", "Flags",
        ])?;
        for s in &scheduled {
            let task = &project.tasks[&s.id];
            writer.write_record([
                s.id.clone(),
                task.name.clone(),
                format!("{:.1}", task.duration_hrs),
                task.status.label().to_string(),
                s.start_at.format("%Y-%m-%d %H:%M").to_string(),
                s.finish_at.format("%Y-%m-%d %H:%M").to_string(),
                fmt_slack(s, task),
                task.deadline.map(|d| d.to_string()).unwrap_or_default(),
                flags_of(s),
            ])?;
        }
        writer.flush()?;
        println!("Exported {} tasks to {}", scheduled.len(), csv_path.display());
        return Ok(());
    }

    let rows: Vec<Vec<String>> = scheduled
        .iter()
        .map(|s| {
            let task = &project.tasks[&s.id];
            vec![
                s.id.clone(),
                task.name.clone(),
                format!("{:.1}", task.duration_hrs),
                task.status.label().to_string(),
                fmt_short(s.start_at),
                fmt_short(s.finish_at),
                fmt_slack(s, task),
                task.deadline.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string()),
                flags_of(s),
            ]
        })
        .collect();
    render_table(
        &["ID", "Task Name", "Hours", "Status", "Start", "End", "Slack (h)", "Deadline", "Flags"],
        &rows,
    );
    Ok(())
}

fn cmd_critical_path(path: &Path, sort: CriticalSort) -> Result<()> {
    let project = load_project(path)?;
    let cpm = calculate_schedule(&project.tasks, &project.config)?;

    // `tasks` is already in topological (chain) order.
    let mut crit: Vec<&ScheduledTask> = cpm.critical_path().collect();
    if sort == CriticalSort::Chrono {
        crit.sort_by(|a, b| {
            (a.timing.earliest_start, suffix_key(&a.id))
                .partial_cmp(&(b.timing.earliest_start, suffix_key(&b.id)))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }
    if crit.is_empty() {
        println!("No critical path found.");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = crit
        .iter()
        .map(|s| {
            let task = &project.tasks[&s.id];
            vec![
                s.id.clone(),
                task.name.clone(),
                format!("{:.1}", task.duration_hrs),
                fmt_short(s.start_at),
                fmt_short(s.finish_at),
            ]
        })
        .collect();
    render_table(&["ID", "Task Name", "Hours", "Start", "End"], &rows);

    let total: f64 = crit.iter().map(|s| project.tasks[&s.id].duration_hrs).sum();
    println!();
    println!("Total critical path duration: {total:.1} hours");
    Ok(())
}

fn cmd_status(path: &Path, verbosity: u8) -> Result<()> {
    let project = load_project(path)?;
    if project.tasks.is_empty() {
        println!("No tasks found.");
        return Ok(());
    }
    let (cpm, level) = analyze(&project, verbosity)?;

    let total = project.tasks.len();
    let done = project.tasks.values().filter(|t| t.status.is_done()).count();
    let in_progress = project
        .tasks
        .values()
        .filter(|t| t.status.is_in_progress())
        .count();
    let not_started = total - done - in_progress;

    let total_hrs: f64 = project.tasks.values().map(|t| t.duration_hrs).sum();
    let done_hrs: f64 = project
        .tasks
        .values()
        .filter(|t| t.status.is_done())
        .map(|t| t.duration_hrs)
        .sum();
    let pct = if total_hrs > 0.0 {
        done_hrs / total_hrs * 100.0
    } else {
        0.0
    };

    let bar_width = 30usize;
    let filled = ((bar_width as f64) * pct / 100.0) as usize;
    let bar = format!("{}{}", "█".repeat(filled), "░".repeat(bar_width - filled));

    println!();
    println!("Project Status");
    println!();
    println!(
        "  Tasks:  {done} done  {in_progress} in progress  {not_started} remaining  ({total} total)"
    );
    println!(
        "  Hours:  {done_hrs:.1}h done  {:.1}h remaining  ({total_hrs:.1}h total)",
        total_hrs - done_hrs
    );
    println!("  Progress: {bar} {pct:.0}%");
    if let Some(projected) = level.projected_completion {
        println!(
            "  Projected completion: {}",
            projected.format("%a %b %d, %Y")
        );
    }

    let at_risk = selector::at_risk_tasks(&project.tasks, &project.config, &cpm, &level)?;
    if !at_risk.is_empty() {
        println!();
        println!("  {} task(s) projected LATE:", at_risk.len());
        for risk in &at_risk {
            println!(
                "    {} {} -- deadline {}, projected {}",
                risk.task.id,
                risk.task.name,
                risk.deadline_at.date(),
                fmt_short(risk.projected_finish)
            );
        }
    }

    let crit: Vec<&ScheduledTask> = cpm.critical_path().collect();
    if !crit.is_empty() {
        let crit_hrs: f64 = crit.iter().map(|s| project.tasks[&s.id].duration_hrs).sum();
        println!();
        println!("  Critical path: {} tasks, {crit_hrs:.1}h total", crit.len());
    }
    println!();
    Ok(())
}

fn cmd_next(path: &Path, verbosity: u8) -> Result<()> {
    let project = load_project(path)?;
    let (cpm, level) = analyze(&project, verbosity)?;

    let mut in_progress: Vec<&Task> = project
        .tasks
        .values()
        .filter(|t| t.status.is_in_progress())
        .collect();
    in_progress.sort_by_key(|t| suffix_key(&t.id));

    let mut printed_anything = false;
    for task in &in_progress {
        let label = if task.background { "(BG) " } else { "" };
        println!();
        println!(
            "  In progress:  {label}{}  {}  ({:.1}h)",
            task.id, task.name, task.duration_hrs
        );
        if let Some(started) = task.status.started_at() {
            println!("    Started: {}", fmt_instant(started));
        }
        printed_anything = true;
    }

    let kickoff = selector::kickoff_background(&project.tasks, &cpm);
    if !kickoff.is_empty() {
        println!();
        println!("  Kick off background job(s) first:");
        for task in &kickoff {
            let crit = cpm
                .get(&task.id)
                .map(|s| s.critical)
                .unwrap_or(false);
            let flag = if crit { "  CRIT" } else { "" };
            println!("  {}  {}  ({:.1}h){flag}", task.id, task.name, task.duration_hrs);
            println!("    Run `dagr start {}`", task.id);
        }
        printed_anything = true;
    }

    if in_progress.is_empty() {
        if let Some(task) = selector::next_task(&project.tasks, &cpm) {
            println!();
            println!("  Next up:");
            println!("  {}  {}  ({:.1}h)", task.id, task.name, task.duration_hrs);
            let projected = level
                .starts
                .get(&task.id)
                .copied()
                .or_else(|| cpm.get(&task.id).map(|s| s.start_at));
            if let Some(start) = projected {
                println!("  Projected start: {}", fmt_instant(start));
            }
            if cpm.get(&task.id).map(|s| s.critical).unwrap_or(false) {
                println!("  On the critical path");
            }
            println!();
            println!("  Run `dagr start {}` to begin.", task.id);
            printed_anything = true;
        }
    }

    let menu = selector::dopamine_menu(&project.tasks);
    if !menu.is_empty() {
        println!();
        println!("  Dopamine Menu (flexible side quests):");
        for (heading, tasks) in menu.sections() {
            if tasks.is_empty() {
                continue;
            }
            println!("    {heading}:");
            for task in tasks {
                println!("      {}  {}  ({:.1}h)", task.id, task.name, task.duration_hrs);
            }
        }
        printed_anything = true;
    }

    if !printed_anything {
        println!("All tasks are done!");
    } else {
        println!();
    }
    Ok(())
}

fn cmd_daily(path: &Path, days: usize, today_only: bool, verbosity: u8) -> Result<()> {
    let project = load_project(path)?;
    if project.tasks.is_empty() {
        println!("No tasks to schedule.");
        return Ok(());
    }
    let (cpm, level) = analyze(&project, verbosity)?;
    let plans = daily_rollup(&level, &project.tasks, &cpm);

    let today = now().date();
    let selected: Vec<&DayPlan> = if today_only {
        plans.iter().filter(|p| p.date == today).collect()
    } else {
        plans.iter().take(days).collect()
    };

    if selected.is_empty() {
        if today_only {
            println!("Nothing scheduled for today.");
        } else {
            println!("All tasks are done!");
        }
        return Ok(());
    }

    for plan in selected {
        let mut summary = format!("{:.1}h", plan.attended_hours);
        if plan.background_hours > 0.0 {
            summary.push_str(&format!(" + {:.1}h background", plan.background_hours));
        }
        println!();
        println!("{}  ({summary})", plan.date.format("%a %b %d"));

        let rows: Vec<Vec<String>> = plan
            .entries
            .iter()
            .map(|e| {
                let mut flags: Vec<&str> = Vec::new();
                if e.critical {
                    flags.push("CRIT");
                }
                if e.background {
                    flags.push("BG");
                }
                vec![
                    format!("{}-{}", e.start.format("%H:%M"), e.end.format("%H:%M")),
                    e.task_id.clone(),
                    project.tasks[&e.task_id].name.clone(),
                    format!("{:.1}h", e.hours),
                    flags.join(" "),
                ]
            })
            .collect();
        render_table(&["Time", "ID", "Task", "Hours", ""], &rows);
    }
    Ok(())
}

fn cmd_capacity(path: &Path, date: &str, hours: f64) -> Result<()> {
    let mut project = load_project(path)?;
    let date = parse_date("date", date)?;
    project.set_capacity(date, hours)?;
    store::save(path, &project)?;
    if hours == 0.0 {
        println!("Marked {date} as a day off.");
    } else {
        println!("Capacity for {date} set to {hours}h.");
    }
    Ok(())
}

fn cmd_viz(path: &Path, output: &Path, hide_done: bool, html: bool) -> Result<()> {
    let project = load_project(path)?;
    if project.tasks.is_empty() {
        println!("No tasks to visualize.");
        return Ok(());
    }
    let cpm = calculate_schedule(&project.tasks, &project.config).ok();

    let content = if html {
        viz::html_page(&project, cpm.as_ref(), hide_done)
    } else {
        viz::mermaid_markdown(&project, cpm.as_ref(), hide_done)
    };
    std::fs::write(output, content).with_context(|| format!("writing {}", output.display()))?;
    println!(
        "Wrote {} to {}",
        if html { "HTML graph" } else { "Mermaid diagram" },
        output.display()
    );
    Ok(())
}
