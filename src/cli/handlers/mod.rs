mod init;
pub use init::cmd_init;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::config_io::{self, BOARD_DIR, OpenBoard};
use crate::io::logging;
use crate::io::recovery;
use crate::io::store::FileStore;
use crate::model::task::{Priority, TaskFields, TaskId, parse_date, parse_tags};
use crate::ops::projection::SortKey;
use crate::ops::reorder::{DragEvent, DragLocation, DragOutcome};
use crate::ops::search;
use crate::ops::task_ops::TaskBoard;

type CmdResult = Result<(), Box<dyn std::error::Error>>;

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> CmdResult {
    let json = cli.json;
    let start = match &cli.board_dir {
        Some(dir) => std::fs::canonicalize(dir)
            .map_err(|e| format!("cannot resolve -C path '{}': {}", dir, e))?,
        None => std::env::current_dir()?,
    };

    match cli.command {
        Commands::Init(args) => cmd_init(args, &start),

        // Read commands
        Commands::List(args) => cmd_list(args, &start, json),
        Commands::Show(args) => cmd_show(args, &start, json),
        Commands::Search(args) => cmd_search(args, &start, json),
        Commands::Columns => cmd_columns(&start, json),

        // Write commands
        Commands::Add(args) => cmd_add(args, &start, json),
        Commands::Edit(args) => cmd_edit(args, &start, json),
        Commands::Rm(args) => cmd_rm(args, &start),
        Commands::Mv(args) => cmd_mv(args, &start),
        Commands::Drag(args) => cmd_drag(args, &start),
        Commands::Theme(args) => cmd_theme(args, &start, json),

        // Maintenance
        Commands::Recovery(args) => cmd_recovery(args, &start, json),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Find the board, start logging at its configured level, open it
fn load_board(start: &Path) -> Result<OpenBoard, Box<dyn std::error::Error>> {
    let root = config_io::discover_board(start)?;
    match config_io::read_config(&root.join(BOARD_DIR)) {
        Ok(config) => logging::init_logging(&config.log.level)?,
        Err(_) => logging::init_logging("warn")?,
    }
    Ok(config_io::open_board(&root)?)
}

/// Turn failed saves into a command error. The change only lived in memory,
/// so once the process exits it is gone; the record is in the recovery log.
fn finish(board: &mut TaskBoard<FileStore>) -> CmdResult {
    let errors = board.drain_save_errors();
    match errors.last() {
        None => Ok(()),
        Some(e) => Err(format!(
            "change not saved: {} (unsaved board kept in {}/.recovery.log)",
            e, BOARD_DIR
        )
        .into()),
    }
}

fn parse_priority(s: &str) -> Result<Priority, String> {
    Priority::parse(s).ok_or_else(|| {
        format!(
            "unknown priority '{}' (expected: low, medium, high, easy, hard)",
            s
        )
    })
}

fn parse_deadline(s: &str) -> Result<chrono::NaiveDate, String> {
    parse_date(s).map_err(|e| format!("invalid deadline '{}': {} (expected YYYY-MM-DD)", s, e))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .or_else(|_| {
            parse_date(s).map(|d| d.and_time(chrono::NaiveTime::MIN).and_utc())
        })
        .map_err(|_| format!("invalid timestamp '{}' (expected ISO-8601)", s))
}

fn print_outcome(outcome: &DragOutcome) {
    match outcome {
        DragOutcome::Cancelled => println!("cancelled"),
        DragOutcome::Unchanged => println!("unchanged"),
        DragOutcome::Moved { id, from, to } => println!(
            "{}: {}[{}] -> {}[{}]",
            id, from.column, from.index, to.column, to.index
        ),
    }
}

// ---------------------------------------------------------------------------
// Read commands
// ---------------------------------------------------------------------------

fn cmd_list(args: ListArgs, start: &Path, json: bool) -> CmdResult {
    let opened = load_board(start)?;
    let labels = opened.config.tasks.labels;
    if let Some(column) = &args.column
        && !opened.board.board().has_column(column)
    {
        return Err(format!("unknown column: {}", column).into());
    }

    let view = opened.board.view(&args.query, args.sort);
    let columns = view
        .columns
        .iter()
        .filter(|c| args.column.as_deref().is_none_or(|name| c.name == name));

    if json {
        let results: Vec<ColumnJson> = columns.map(|c| column_to_json(c, labels)).collect();
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        let mut first = true;
        for column in columns {
            if !first {
                println!();
            }
            first = false;
            for line in format_column_listing(column, labels) {
                println!("{}", line);
            }
        }
    }
    Ok(())
}

fn cmd_show(args: ShowArgs, start: &Path, json: bool) -> CmdResult {
    let opened = load_board(start)?;
    let labels = opened.config.tasks.labels;
    let board = opened.board.board();
    let id = TaskId::new(args.id);
    let (Some(at), Some(task)) = (board.find(&id), board.get(&id)) else {
        return Err(format!("task not found: {}", id).into());
    };

    if json {
        let placed = PlacedTaskJson {
            column: at.column.clone(),
            index: at.index,
            task: task_to_json(task, labels),
        };
        println!("{}", serde_json::to_string_pretty(&placed)?);
    } else {
        for line in format_task_detail(task, &at.column, at.index, labels) {
            println!("{}", line);
        }
    }
    Ok(())
}

fn cmd_search(args: SearchArgs, start: &Path, json: bool) -> CmdResult {
    let opened = load_board(start)?;
    let labels = opened.config.tasks.labels;
    let board = opened.board.board();
    if let Some(column) = &args.column
        && !board.has_column(column)
    {
        return Err(format!("unknown column: {}", column).into());
    }
    let re = Regex::new(&args.pattern)?;
    let hits = search::search_tasks(board, &re, args.column.as_deref());

    if json {
        let results: Vec<SearchHitJson> = hits
            .iter()
            .filter_map(|hit| board.get(&hit.task_id).map(|t| hit_to_json(hit, &t.title)))
            .collect();
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    // One line per task, however many of its fields matched
    let mut seen = HashSet::new();
    for hit in &hits {
        if seen.insert(&hit.task_id)
            && let Some(task) = board.get(&hit.task_id)
        {
            println!("[{}] {}", hit.column, format_task_line(task, labels));
        }
    }
    Ok(())
}

fn cmd_columns(start: &Path, json: bool) -> CmdResult {
    let opened = load_board(start)?;
    let intake = opened.board.intake_column();
    let counts: Vec<(String, usize, bool)> = opened
        .board
        .board()
        .columns()
        .map(|(name, tasks)| (name.to_string(), tasks.len(), name == intake))
        .collect();

    if json {
        let results: Vec<ColumnCountJson> = counts
            .into_iter()
            .map(|(column, count, intake)| ColumnCountJson {
                column,
                count,
                intake,
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        for line in format_column_counts(&counts) {
            println!("{}", line);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Write commands
// ---------------------------------------------------------------------------

fn cmd_add(args: AddArgs, start: &Path, json: bool) -> CmdResult {
    let mut opened = load_board(start)?;
    let mut fields = TaskFields::new(args.title, args.description);
    if let Some(deadline) = &args.deadline {
        fields = fields.with_deadline(parse_deadline(deadline)?);
    }
    if let Some(tags) = &args.tags {
        fields = fields.with_tags(parse_tags(tags));
    }
    if let Some(priority) = &args.priority {
        fields = fields.with_priority(parse_priority(priority)?);
    }

    let task = opened.board.create_task(fields)?;
    finish(&mut opened.board)?;
    if json {
        let json_task = task_to_json(&task, opened.config.tasks.labels);
        println!("{}", serde_json::to_string_pretty(&json_task)?);
    } else {
        println!("{}", task.id);
    }
    Ok(())
}

fn cmd_edit(args: EditArgs, start: &Path, json: bool) -> CmdResult {
    let mut opened = load_board(start)?;
    let id = TaskId::new(args.id);
    let mut fields = opened
        .board
        .board()
        .get(&id)
        .ok_or_else(|| format!("task not found: {}", id))?
        .fields();

    if let Some(title) = args.title {
        fields.title = title;
    }
    if let Some(description) = args.description {
        fields.description = description;
    }
    if args.no_deadline {
        fields.deadline = None;
    } else if let Some(deadline) = &args.deadline {
        fields.deadline = Some(parse_deadline(deadline)?);
    }
    if let Some(tags) = &args.tags {
        fields.tags = parse_tags(tags);
    }
    if let Some(priority) = &args.priority {
        fields.priority = parse_priority(priority)?;
    }

    let task = opened.board.edit_task_by_id(&id, fields)?;
    finish(&mut opened.board)?;
    if json {
        let json_task = task_to_json(&task, opened.config.tasks.labels);
        println!("{}", serde_json::to_string_pretty(&json_task)?);
    } else {
        println!("{}", task.id);
    }
    Ok(())
}

fn cmd_rm(args: RmArgs, start: &Path) -> CmdResult {
    let mut opened = load_board(start)?;
    for raw in args.ids {
        let id = TaskId::new(raw);
        match opened.board.delete_task_by_id(&id)? {
            Some(task) => println!("deleted {} {}", task.id, task.title),
            None => eprintln!("not found: {}", id),
        }
    }
    finish(&mut opened.board)
}

fn cmd_mv(args: MvArgs, start: &Path) -> CmdResult {
    let mut opened = load_board(start)?;
    let id = TaskId::new(args.id);
    let board = opened.board.board();
    let from = board
        .find(&id)
        .ok_or_else(|| format!("task not found: {}", id))?;
    if !board.has_column(&args.column) {
        return Err(format!("unknown column: {}", args.column).into());
    }

    let outcome = if args.query.trim().is_empty() && args.sort == SortKey::None {
        let position = args.position.unwrap_or_else(|| {
            let len = board.column(&args.column).map_or(0, |c| c.len());
            if from.column == args.column { len - 1 } else { len }
        });
        opened.board.move_task(&id, &args.column, position)?
    } else {
        // Positions are as shown under the filter and sort
        let view = opened.board.view(&args.query, args.sort);
        let source_index = view
            .column(&from.column)
            .and_then(|c| c.ids().position(|t| *t == id))
            .ok_or_else(|| format!("task {} is not shown under this filter", id))?;
        let position = args.position.unwrap_or_else(|| {
            let shown = view.column(&args.column).map_or(0, |c| c.len());
            if from.column == args.column { shown - 1 } else { shown }
        });
        let event = DragEvent::new(
            DragLocation::new(from.column.clone(), source_index),
            Some(DragLocation::new(args.column.clone(), position)),
        );
        opened.board.drag_in_view(&event, &args.query, args.sort)?
    };

    finish(&mut opened.board)?;
    print_outcome(&outcome);
    Ok(())
}

fn cmd_drag(args: DragArgs, start: &Path) -> CmdResult {
    let event: DragEvent = serde_json::from_str(&args.event)
        .map_err(|e| format!("invalid drag event: {}", e))?;
    let mut opened = load_board(start)?;
    let outcome = if args.query.trim().is_empty() && args.sort == SortKey::None {
        opened.board.drag(&event)?
    } else {
        opened.board.drag_in_view(&event, &args.query, args.sort)?
    };
    finish(&mut opened.board)?;
    print_outcome(&outcome);
    Ok(())
}

fn cmd_theme(args: ThemeArgs, start: &Path, json: bool) -> CmdResult {
    let mut opened = load_board(start)?;
    match args.action {
        None => {}
        Some(ThemeAction::Dark) => opened.board.set_dark_mode(true),
        Some(ThemeAction::Light) => opened.board.set_dark_mode(false),
        Some(ThemeAction::Toggle) => {
            opened.board.toggle_dark_mode();
        }
    }
    finish(&mut opened.board)?;

    let dark_mode = opened.board.preferences().dark_mode;
    if json {
        println!("{}", serde_json::to_string_pretty(&ThemeJson { dark_mode })?);
    } else {
        println!("{}", if dark_mode { "dark" } else { "light" });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Recovery log
// ---------------------------------------------------------------------------

fn cmd_recovery(args: RecoveryCmd, start: &Path, json: bool) -> CmdResult {
    let root = config_io::discover_board(start)?;
    let board_dir: PathBuf = root.join(BOARD_DIR);

    match args.action {
        Some(RecoveryAction::Path) => {
            println!("{}", recovery::recovery_log_path(&board_dir).display());
        }
        Some(RecoveryAction::Prune(prune)) => {
            let before = prune.before.as_deref().map(parse_timestamp).transpose()?;
            let removed = recovery::prune_recovery(&board_dir, before, prune.all)?;
            println!("pruned {} entr{}", removed, if removed == 1 { "y" } else { "ies" });
        }
        None => {
            let since = args.since.as_deref().map(parse_timestamp).transpose()?;
            let limit = args.limit.unwrap_or(10);
            let entries = recovery::read_recovery_entries(&board_dir, Some(limit), since);
            if json {
                let values: Vec<serde_json::Value> =
                    entries.iter().map(|e| e.to_json()).collect();
                println!("{}", serde_json::to_string_pretty(&values)?);
            } else if entries.is_empty() {
                println!("recovery log is empty");
            } else {
                for entry in &entries {
                    println!(
                        "{} {}: {}",
                        entry
                            .timestamp
                            .to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
                        entry.category,
                        entry.description
                    );
                    for (key, value) in &entry.fields {
                        println!("  {}: {}", key, value);
                    }
                }
            }
        }
    }
    Ok(())
}
