//! CLI argument parsing for jjtask.

use clap::{Parser, Subcommand, ValueEnum};
use jjtask::{Flag, TaskStatus};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "jjtask",
    about = "Task tracking on top of the jj revision graph",
    version = env!("GIT_DESCRIBE"),
    after_help = "Logs are written to: ~/.local/share/jjtask/logs/jjtask.log"
)]
pub struct Cli {
    /// Path to the jj repository (default: current directory)
    #[arg(short = 'R', long, global = true)]
    pub repository: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a new task revision as a child of @ (or --parent)
    Create {
        /// Task title
        title: String,

        /// Task body, stored after a blank line
        body: Option<String>,

        /// Create as child of REV
        #[arg(short, long)]
        parent: Option<String>,

        /// Place under the deepest pending descendant of the parent
        #[arg(long)]
        chain: bool,

        /// Create with the draft flag instead of todo
        #[arg(long)]
        draft: bool,
    },

    /// Create sibling tasks under one parent
    Parallel {
        /// Task titles (at least two)
        #[arg(num_args = 2.., required = true)]
        titles: Vec<String>,

        /// Parent revision for all tasks
        #[arg(short, long, default_value = "@")]
        parent: String,

        /// Create with the draft flag instead of todo
        #[arg(long)]
        draft: bool,
    },

    /// Mark tasks wip and add them as parents of @
    Wip {
        /// Tasks (default: @)
        revs: Vec<String>,
    },

    /// Mark tasks done and linearize them into @'s ancestry
    Done {
        /// Tasks (default: @)
        revs: Vec<String>,
    },

    /// Remove tasks from the @ merge
    Drop {
        /// Tasks to drop
        #[arg(required = true)]
        revs: Vec<String>,

        /// Abandon the tasks instead of marking them standby
        #[arg(long)]
        abandon: bool,
    },

    /// Flatten the @ merge into a single revision
    Squash {
        /// Keep task revisions after squashing
        #[arg(long)]
        keep_tasks: bool,
    },

    /// Change a task's flag
    Flag {
        /// New flag
        #[arg(value_parser = parse_flag)]
        flag: Flag,

        /// Task to update
        #[arg(short, long, default_value = "@")]
        rev: String,
    },

    /// List tasks
    Find {
        /// Status: pending, all, or a flag name
        #[arg(short, long, default_value = "pending", value_parser = parse_status)]
        status: TaskStatus,

        /// Only tasks within this revset
        #[arg(short, long)]
        revset: Option<String>,
    },

    /// Find done tasks not in @'s ancestry
    Stale,

    /// Print a revision's description
    ShowDesc {
        /// Revision (overrides --rev)
        revision: Option<String>,

        /// Revision to show
        #[arg(short, long, default_value = "@")]
        rev: String,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Record the current operation id for recovery
    Checkpoint {
        /// Checkpoint message
        #[arg(short, long)]
        message: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

fn parse_flag(s: &str) -> Result<Flag, String> {
    s.parse::<Flag>().map_err(|e| e.to_string())
}

fn parse_status(s: &str) -> Result<TaskStatus, String> {
    s.parse::<TaskStatus>()
}
