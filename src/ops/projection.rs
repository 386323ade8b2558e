use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::model::board::Board;
use crate::model::task::{Task, TaskId};

/// Display ordering applied after filtering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    /// Stored order
    #[default]
    None,
    Title,
    Deadline,
    Priority,
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "" | "none" => Ok(SortKey::None),
            "title" => Ok(SortKey::Title),
            "deadline" => Ok(SortKey::Deadline),
            "priority" | "difficulty" => Ok(SortKey::Priority),
            other => Err(format!(
                "unknown sort key: {other} (expected none, title, deadline or priority)"
            )),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SortKey::None => "none",
            SortKey::Title => "title",
            SortKey::Deadline => "deadline",
            SortKey::Priority => "priority",
        };
        f.write_str(s)
    }
}

/// What one column currently displays
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnView<'a> {
    pub name: &'a str,
    pub tasks: Vec<&'a Task>,
}

impl ColumnView<'_> {
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &TaskId> {
        self.tasks.iter().map(|t| &t.id)
    }
}

/// Filtered, sorted projection of a board. Borrows the board and never
/// changes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardView<'a> {
    pub columns: Vec<ColumnView<'a>>,
}

impl<'a> BoardView<'a> {
    pub fn column(&self, name: &str) -> Option<&ColumnView<'a>> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn task_count(&self) -> usize {
        self.columns.iter().map(ColumnView::len).sum()
    }
}

/// Derive the per-column display lists.
///
/// Tasks whose title does not contain `query` (case-insensitive) are left
/// out. The remaining tasks are stable-sorted by `sort`.
pub fn project<'a>(board: &'a Board, query: &str, sort: SortKey) -> BoardView<'a> {
    let needle = query.trim().to_lowercase();
    let columns = board
        .columns()
        .map(|(name, tasks)| {
            let mut shown: Vec<&Task> = tasks
                .iter()
                .filter(|t| needle.is_empty() || t.title.to_lowercase().contains(&needle))
                .collect();
            sort_tasks(&mut shown, sort);
            ColumnView { name, tasks: shown }
        })
        .collect();
    BoardView { columns }
}

/// Stable sort in place; `SortKey::None` keeps the given order
pub fn sort_tasks(tasks: &mut [&Task], sort: SortKey) {
    match sort {
        SortKey::None => {}
        SortKey::Title => tasks.sort_by(|a, b| compare_titles(&a.title, &b.title)),
        SortKey::Deadline => tasks.sort_by(|a, b| compare_deadlines(a, b)),
        SortKey::Priority => tasks.sort_by_key(|t| t.priority.rank()),
    }
}

/// Case-folded comparison first so "apple" and "Banana" sort like a reader
/// expects; the exact text only breaks ties.
fn compare_titles(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Dated tasks ascending, then undated tasks
fn compare_deadlines(a: &Task, b: &Task) -> Ordering {
    match (a.deadline, b.deadline) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
