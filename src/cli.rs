//! CLI argument parsing using `clap`.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Command-line arguments for `dagr`.
#[derive(Debug, Parser)]
#[command(
    name = "dagr",
    version,
    about = "Task-graph project planner with working-hour critical path analysis.",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Narrate leveling decisions on stderr; -vv adds selection detail.
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Initialize (or reinitialize) project configuration.
    Init {
        /// Project start (YYYY-MM-DD, optionally with THH:MM).
        #[arg(long)]
        start: String,

        /// Default working hours per day.
        #[arg(long, default_value_t = 8.0)]
        hours_per_day: f64,

        /// Time of day the working day begins (HH:MM).
        #[arg(long, default_value = "09:00")]
        day_start: String,

        /// Schedule work on Saturdays and Sundays too.
        #[arg(long)]
        work_weekends: bool,
    },

    /// Add a new task.
    ///
    /// Dependencies can be given individually (--depends T-1 --depends T-2)
    /// or comma-separated (--depends T-1,T-2,T-3).
    Add {
        name: String,

        /// Duration in working hours.
        #[arg(short = 'd', long)]
        duration: f64,

        /// Task ids this depends on.
        #[arg(long = "depends")]
        depends: Vec<String>,

        /// Deadline date (YYYY-MM-DD), end of that working day.
        #[arg(long)]
        deadline: Option<String>,

        /// Proposed start date (YYYY-MM-DD); the task won't begin earlier.
        #[arg(long)]
        start: Option<String>,

        /// Runs unattended (e.g. a pipeline); doesn't block the person.
        #[arg(long = "bg")]
        background: bool,

        /// Flexible side quest: never constrains the main schedule.
        #[arg(long = "flex")]
        flexible: bool,

        /// Tag for dopamine-menu bucketing (repeatable).
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Project label, for filtering.
        #[arg(long, default_value = "")]
        project: String,

        #[arg(long, default_value = "")]
        notes: String,
    },

    /// List tasks and their status.
    List {
        /// Filter by status (not_started, in_progress, done).
        #[arg(short = 's', long = "status")]
        status: Option<String>,

        /// Filter by name or id (case-insensitive substring).
        #[arg(short = 'q', long)]
        search: Option<String>,

        /// Filter by project label.
        #[arg(long)]
        project: Option<String>,
    },

    /// Update fields of an existing task.
    Update {
        task_id: String,

        #[arg(long)]
        name: Option<String>,

        /// New duration in working hours.
        #[arg(long)]
        duration: Option<f64>,

        /// New deadline (YYYY-MM-DD).
        #[arg(long)]
        deadline: Option<String>,

        /// New proposed start (YYYY-MM-DD).
        #[arg(long)]
        start: Option<String>,

        /// Set or clear the background marker (--bg true / --bg false).
        #[arg(long = "bg")]
        background: Option<bool>,

        /// Set or clear the flexible marker (--flex true / --flex false).
        #[arg(long = "flex")]
        flexible: Option<bool>,

        #[arg(long)]
        project: Option<String>,

        #[arg(long)]
        notes: Option<String>,

        /// Replace the tag set (repeatable).
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Add a dependency (task id, repeatable).
        #[arg(long = "add-dep")]
        add_dep: Vec<String>,

        /// Remove a dependency (task id, repeatable).
        #[arg(long = "remove-dep")]
        remove_dep: Vec<String>,
    },

    /// Delete a task and remove it from dependency lists.
    Delete { task_id: String },

    /// Show all details for a single task, including schedule and slack.
    Show { task_id: String },

    /// Mark a task as in progress with the current timestamp.
    Start { task_id: String },

    /// Mark a task as done with the current timestamp.
    Done { task_id: String },

    /// Reset a task back to not_started (undo start/done).
    Reset { task_id: String },

    /// Set a task's status directly.
    SetStatus {
        task_id: String,
        /// One of not_started, in_progress, done.
        status: String,
    },

    /// Bulk-import tasks from a JSON payload file ("-" for stdin).
    Import { file: PathBuf },

    /// Calculate and display the unconstrained schedule with slack.
    Schedule {
        /// Hide completed tasks.
        #[arg(short = 'r', long)]
        remaining: bool,

        /// Export the schedule to a CSV file instead of printing it.
        #[arg(long, value_name = "FILE")]
        csv: Option<PathBuf>,
    },

    /// Display only the tasks on the critical path.
    CriticalPath {
        /// Row order: by earliest start, or by dependency chain.
        #[arg(long, value_enum, default_value = "chrono")]
        sort: CriticalSort,
    },

    /// Project health dashboard: progress, hours, projected completion.
    Status,

    /// The single next task to work on (plus background kickoffs).
    Next,

    /// Today's plan from the resource-leveled schedule.
    Today,

    /// Day-by-day breakdown of the resource-leveled schedule.
    Daily {
        /// Number of working days to show.
        #[arg(short = 'n', long = "days", default_value_t = 10)]
        days: usize,
    },

    /// Set a working-capacity override for one date (0 = day off).
    Capacity {
        /// Date (YYYY-MM-DD).
        date: String,
        /// Working hours available on that date.
        hours: f64,
    },

    /// Write a Mermaid flowchart of the task DAG.
    Viz {
        #[arg(short = 'o', long, default_value = "dag.md")]
        output: PathBuf,

        #[arg(long)]
        hide_done: bool,
    },

    /// Write a standalone HTML view of the task DAG.
    VizHtml {
        #[arg(short = 'o', long, default_value = "dag.html")]
        output: PathBuf,

        #[arg(long)]
        hide_done: bool,
    },
}

/// Row order for `critical-path`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum CriticalSort {
    /// Ascending earliest start.
    Chrono,
    /// Dependency order (prerequisites first).
    Chain,
}

/// Convenience wrapper around `Cli::parse()`.
pub fn parse() -> Cli {
    Cli::parse()
}
