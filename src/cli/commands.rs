use clap::{Args, Parser, Subcommand};

use crate::ops::projection::SortKey;

#[derive(Parser)]
#[command(name = "tb", about = concat!("taskboard v", env!("CARGO_PKG_VERSION"), " - a three-lane task board"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Run against a different board directory
    #[arg(short = 'C', long = "board-dir", global = true)]
    pub board_dir: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a board in the current directory
    Init(InitArgs),
    /// List tasks by column
    List(ListArgs),
    /// Show task details
    Show(ShowArgs),
    /// Search titles, descriptions and tags by regex
    Search(SearchArgs),
    /// List columns with their task counts
    Columns,
    /// Create a task in the intake column
    Add(AddArgs),
    /// Change a task's fields
    Edit(EditArgs),
    /// Delete a task
    Rm(RmArgs),
    /// Move a task within or between columns
    Mv(MvArgs),
    /// Apply a drag event given as JSON
    Drag(DragArgs),
    /// Show or change the dark-mode preference
    Theme(ThemeArgs),
    /// View or manage the recovery log
    Recovery(RecoveryCmd),
}

// ---------------------------------------------------------------------------
// Init args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct InitArgs {
    /// Board name (default: inferred from directory name)
    #[arg(long)]
    pub name: Option<String>,
    /// Column name, in display order (repeatable; default: ToDo InProgress Done)
    #[arg(long = "column", value_name = "NAME", action = clap::ArgAction::Append)]
    pub columns: Vec<String>,
    /// Column new tasks go to (default: the first column)
    #[arg(long)]
    pub intake: Option<String>,
    /// Show tiers as Easy/Medium/Hard instead of Low/Medium/High
    #[arg(long)]
    pub difficulty: bool,
    /// Require a deadline on every task
    #[arg(long)]
    pub require_deadline: bool,
    /// Allow tasks without a description
    #[arg(long)]
    pub optional_description: bool,
}

// ---------------------------------------------------------------------------
// Read command args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ListArgs {
    /// Column to list (default: all columns)
    pub column: Option<String>,
    /// Only show tasks whose title contains this text (case-insensitive)
    #[arg(short, long, default_value = "")]
    pub query: String,
    /// Display order: none, title, deadline, priority
    #[arg(short, long, default_value = "none")]
    pub sort: SortKey,
}

#[derive(Args)]
pub struct ShowArgs {
    /// Task ID to show
    pub id: String,
}

#[derive(Args)]
pub struct SearchArgs {
    /// Regex pattern to search for
    pub pattern: String,
    /// Limit search to one column
    #[arg(long)]
    pub column: Option<String>,
}

// ---------------------------------------------------------------------------
// Write command args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct AddArgs {
    /// Task title
    pub title: String,
    /// Task description
    #[arg(short, long, default_value = "")]
    pub description: String,
    /// Deadline (YYYY-MM-DD)
    #[arg(long)]
    pub deadline: Option<String>,
    /// Comma-separated tags
    #[arg(short, long)]
    pub tags: Option<String>,
    /// Tier: low, medium, high (or easy, hard)
    #[arg(short, long)]
    pub priority: Option<String>,
}

#[derive(Args)]
pub struct EditArgs {
    /// Task ID
    pub id: String,
    /// New title
    #[arg(long)]
    pub title: Option<String>,
    /// New description
    #[arg(short, long)]
    pub description: Option<String>,
    /// New deadline (YYYY-MM-DD)
    #[arg(long, conflicts_with = "no_deadline")]
    pub deadline: Option<String>,
    /// Remove the deadline
    #[arg(long)]
    pub no_deadline: bool,
    /// Replace tags (comma-separated; empty clears)
    #[arg(short, long)]
    pub tags: Option<String>,
    /// New tier
    #[arg(short, long)]
    pub priority: Option<String>,
}

#[derive(Args)]
pub struct RmArgs {
    /// Task IDs to delete
    #[arg(required = true)]
    pub ids: Vec<String>,
}

#[derive(Args)]
pub struct MvArgs {
    /// Task ID
    pub id: String,
    /// Destination column
    pub column: String,
    /// Position in the column (0-indexed; default: end)
    pub position: Option<usize>,
    /// Interpret the position in the list shown under this title filter
    #[arg(short, long, default_value = "")]
    pub query: String,
    /// Interpret the position in the list shown under this sort
    #[arg(short, long, default_value = "none")]
    pub sort: SortKey,
}

#[derive(Args)]
pub struct DragArgs {
    /// Event JSON: {"source":{"columnId","index"},"destination":{...}|null}
    pub event: String,
    /// Indices refer to the list shown under this title filter
    #[arg(short, long, default_value = "")]
    pub query: String,
    /// Indices refer to the list shown under this sort
    #[arg(short, long, default_value = "none")]
    pub sort: SortKey,
}

#[derive(Args)]
pub struct ThemeArgs {
    #[command(subcommand)]
    pub action: Option<ThemeAction>,
}

#[derive(Subcommand)]
pub enum ThemeAction {
    /// Turn dark mode on
    Dark,
    /// Turn dark mode off
    Light,
    /// Flip dark mode
    Toggle,
}

// ---------------------------------------------------------------------------
// Recovery log
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct RecoveryCmd {
    #[command(subcommand)]
    pub action: Option<RecoveryAction>,
    /// Maximum number of entries to show (default: 10)
    #[arg(long)]
    pub limit: Option<usize>,
    /// Show entries after this timestamp (ISO-8601)
    #[arg(long)]
    pub since: Option<String>,
}

#[derive(Subcommand)]
pub enum RecoveryAction {
    /// Remove old entries
    Prune(RecoveryPruneArgs),
    /// Print the absolute path to the recovery log
    Path,
}

#[derive(Args)]
pub struct RecoveryPruneArgs {
    /// Remove entries older than this timestamp (default: 30 days ago)
    #[arg(long)]
    pub before: Option<String>,
    /// Remove all entries
    #[arg(long)]
    pub all: bool,
}
