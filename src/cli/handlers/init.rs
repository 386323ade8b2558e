use std::path::Path;

use crate::cli::commands::InitArgs;
use crate::io::config_io::{self, BOARD_DIR};

const BOARD_TOML_TEMPLATE: &str = r##"[board]
name = {name}
# Lanes, in display order. Fixed for the life of the board.
columns = {columns}
{intake}
[tasks]
require_description = {require_description}
require_deadline = {require_deadline}
# "priority" shows Low/Medium/High, "difficulty" shows Easy/Medium/Hard.
# Both are accepted on input either way.
labels = "{labels}"

[storage]
# Store file, relative to this directory
file = "store.json"
# Key the board record is written under
key = "tasks"
quota_bytes = 5242880

[log]
# off, error, warn, info, debug, trace (RUST_LOG overrides)
level = "warn"
"##;

const DEFAULT_COLUMNS: [&str; 3] = ["ToDo", "InProgress", "Done"];

/// Infer a board name from a directory name: replace hyphens with spaces, title-case.
fn infer_name(dir_name: &str) -> String {
    dir_name
        .split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(c) => {
                    let upper: String = c.to_uppercase().collect();
                    upper + chars.as_str()
                }
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn toml_string(s: &str) -> String {
    toml::Value::String(s.to_string()).to_string()
}

/// Render board.toml from the init flags
fn render_board_toml(name: &str, columns: &[String], args: &InitArgs) -> String {
    let columns = format!(
        "[{}]",
        columns
            .iter()
            .map(|c| toml_string(c))
            .collect::<Vec<_>>()
            .join(", ")
    );
    let intake = match &args.intake {
        Some(intake) => format!("intake = {}\n", toml_string(intake)),
        None => "# Column new tasks land in (default: the first column)\n# intake = \"ToDo\"\n"
            .to_string(),
    };
    BOARD_TOML_TEMPLATE
        .replace("{name}", &toml_string(name))
        .replace("{columns}", &columns)
        .replace("{intake}", &intake)
        .replace(
            "{require_description}",
            if args.optional_description { "false" } else { "true" },
        )
        .replace(
            "{require_deadline}",
            if args.require_deadline { "true" } else { "false" },
        )
        .replace(
            "{labels}",
            if args.difficulty { "difficulty" } else { "priority" },
        )
}

pub fn cmd_init(args: InitArgs, start: &Path) -> Result<(), Box<dyn std::error::Error>> {
    // Check for an enclosing board and warn
    if let Some(parent) = start.parent()
        && let Ok(parent_root) = config_io::discover_board(parent)
    {
        eprintln!(
            "Note: parent board found at {}/",
            parent_root.join(BOARD_DIR).display()
        );
        eprintln!("Creating new board in ./{}/", BOARD_DIR);
    }

    let name = args.name.clone().unwrap_or_else(|| {
        start
            .file_name()
            .and_then(|n| n.to_str())
            .map(infer_name)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "Tasks".to_string())
    });
    let columns: Vec<String> = if args.columns.is_empty() {
        DEFAULT_COLUMNS.iter().map(|c| c.to_string()).collect()
    } else {
        args.columns.clone()
    };

    let text = render_board_toml(&name, &columns, &args);
    let board_dir = config_io::init_board(start, &text)?;

    println!("Initialized board: {}", name);
    println!("  columns: {}", columns.join(", "));
    println!("  config: {}", board_dir.join(config_io::CONFIG_FILE).display());
    Ok(())
}
