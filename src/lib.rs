//! DAGr: a single-user command-line project planner.
//!
//! The core is a task-graph scheduler over a working-hour calendar: a CPM
//! forward/backward pass computes earliest/latest times, slack, and the
//! critical path; a single-person resource leveler serializes attended
//! work by criticality while background work runs in a parallel stream.
//! Everything else (CLI, JSON store, import, visualization) is glue around
//! those engines.

pub mod calendar;
pub mod cli;
pub mod commands;
pub mod cpm;
pub mod error;
pub mod graph;
pub mod import;
pub mod leveler;
pub mod logging;
pub mod models;
pub mod selector;
pub mod state;
pub mod store;
pub mod viz;

pub use calendar::Calendar;
pub use cpm::{calculate_schedule, CpmResult, ScheduledTask, TaskTiming};
pub use error::{DagrError, Result};
pub use graph::TaskGraph;
pub use leveler::{daily_rollup, level_schedule, Block, DayPlan, LevelResult, Stream};
pub use logging::{Diagnostics, Verbosity};
pub use models::{ProjectConfig, Status, Task};
pub use state::{NewTask, Project, TaskPatch};
