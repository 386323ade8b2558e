use serde::Serialize;

use crate::model::task::{Task, TierLabels};
use crate::ops::projection::ColumnView;
use crate::ops::search::SearchHit;
use crate::util::unicode::{display_width, fit_to_width, single_line, truncate_to_width};

/// Widest a title may render in a listing before it is cut
const TITLE_CELLS: usize = 48;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct TaskJson {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<String>,
    pub tags: Vec<String>,
    pub priority: &'static str,
}

#[derive(Serialize)]
pub struct ColumnJson {
    pub column: String,
    pub tasks: Vec<TaskJson>,
}

#[derive(Serialize)]
pub struct PlacedTaskJson {
    pub column: String,
    pub index: usize,
    #[serde(flatten)]
    pub task: TaskJson,
}

#[derive(Serialize)]
pub struct ColumnCountJson {
    pub column: String,
    pub count: usize,
    pub intake: bool,
}

#[derive(Serialize)]
pub struct SearchHitJson {
    pub column: String,
    pub task_id: String,
    pub title: String,
    pub field: &'static str,
}

#[derive(Serialize)]
pub struct ThemeJson {
    pub dark_mode: bool,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

pub fn task_to_json(task: &Task, labels: TierLabels) -> TaskJson {
    TaskJson {
        id: task.id.to_string(),
        title: task.title.clone(),
        description: task.description.clone(),
        deadline: task.deadline.map(|d| d.format("%Y-%m-%d").to_string()),
        tags: task.tags.clone(),
        priority: task.priority.label(labels),
    }
}

pub fn column_to_json(view: &ColumnView<'_>, labels: TierLabels) -> ColumnJson {
    ColumnJson {
        column: view.name.to_string(),
        tasks: view.tasks.iter().map(|t| task_to_json(t, labels)).collect(),
    }
}

pub fn hit_to_json(hit: &SearchHit, title: &str) -> SearchHitJson {
    SearchHitJson {
        column: hit.column.clone(),
        task_id: hit.task_id.to_string(),
        title: title.to_string(),
        field: hit.field.as_str(),
    }
}

// ---------------------------------------------------------------------------
// Human-readable formatting
// ---------------------------------------------------------------------------

fn tier_char(task: &Task, labels: TierLabels) -> char {
    task.priority.label(labels).chars().next().unwrap_or('?')
}

fn tags_suffix(tags: &[String]) -> String {
    if tags.is_empty() {
        String::new()
    } else {
        format!(
            " {}",
            tags.iter()
                .map(|t| format!("#{}", t))
                .collect::<Vec<_>>()
                .join(" ")
        )
    }
}

/// Format a single task as a one-line summary
pub fn format_task_line(task: &Task, labels: TierLabels) -> String {
    let due = task
        .deadline
        .map(|d| format!(" (due {})", d.format("%Y-%m-%d")))
        .unwrap_or_default();
    format!(
        "[{}] {} {}{}{}",
        tier_char(task, labels),
        task.id,
        truncate_to_width(&single_line(&task.title), TITLE_CELLS),
        tags_suffix(&task.tags),
        due
    )
}

/// Format one displayed column: a header and one numbered line per task.
/// Numbers are displayed positions, which is what `tb mv` takes.
pub fn format_column_listing(view: &ColumnView<'_>, labels: TierLabels) -> Vec<String> {
    let mut lines = vec![format!("== {} ({}) ==", view.name, view.len())];
    let digits = view.len().saturating_sub(1).to_string().len();
    for (i, task) in view.tasks.iter().enumerate() {
        lines.push(format!(
            "{:>width$}. {}",
            i,
            format_task_line(task, labels),
            width = digits
        ));
    }
    lines
}

/// Format detailed task view
pub fn format_task_detail(
    task: &Task,
    column: &str,
    index: usize,
    labels: TierLabels,
) -> Vec<String> {
    let mut lines = vec![format!("[{}] {} {}", tier_char(task, labels), task.id, task.title)];
    lines.push(format!("column: {} (position {})", column, index));
    lines.push(format!("priority: {}", task.priority.label(labels)));
    if let Some(deadline) = task.deadline {
        lines.push(format!("deadline: {}", deadline.format("%Y-%m-%d")));
    }
    if !task.tags.is_empty() {
        lines.push(format!("tags:{}", tags_suffix(&task.tags)));
    }
    if !task.description.is_empty() {
        lines.push("description:".to_string());
        for line in task.description.lines() {
            lines.push(format!("  {}", line));
        }
    }
    lines
}

/// Column names padded into a table with their counts
pub fn format_column_counts(counts: &[(String, usize, bool)]) -> Vec<String> {
    let name_cells = counts
        .iter()
        .map(|(name, _, _)| display_width(name))
        .max()
        .unwrap_or(0);
    counts
        .iter()
        .map(|(name, count, intake)| {
            let marker = if *intake { "  (intake)" } else { "" };
            format!("{} {:>3}{}", fit_to_width(name, name_cells), count, marker)
        })
        .collect()
}
