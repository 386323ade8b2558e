use std::ops::Range;

use regex::Regex;

use crate::model::board::Board;
use crate::model::task::{Task, TaskId};

/// Which field of a task matched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchField {
    Title,
    Description,
    Tag,
}

impl MatchField {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchField::Title => "title",
            MatchField::Description => "description",
            MatchField::Tag => "tag",
        }
    }
}

/// A search hit for one field of one task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub column: String,
    pub task_id: TaskId,
    pub field: MatchField,
    /// The matched text: the whole field value
    pub text: String,
    pub spans: Vec<Range<usize>>,
}

/// Collect all non-overlapping match byte-ranges for a regex in the given text.
fn find_matches(re: &Regex, text: &str) -> Vec<Range<usize>> {
    re.find_iter(text).map(|m| m.start()..m.end()).collect()
}

/// Search every task on the board, in column then stored order.
///
/// If `column_filter` is `Some`, only that column is searched.
pub fn search_tasks(board: &Board, re: &Regex, column_filter: Option<&str>) -> Vec<SearchHit> {
    let mut hits = Vec::new();
    for (column, tasks) in board.columns() {
        if column_filter.is_some_and(|c| c != column) {
            continue;
        }
        for task in tasks {
            search_task(re, task, column, &mut hits);
        }
    }
    hits
}

fn search_task(re: &Regex, task: &Task, column: &str, hits: &mut Vec<SearchHit>) {
    let mut push = |field: MatchField, text: &str| {
        let spans = find_matches(re, text);
        if !spans.is_empty() {
            hits.push(SearchHit {
                column: column.to_string(),
                task_id: task.id.clone(),
                field,
                text: text.to_string(),
                spans,
            });
        }
    };

    push(MatchField::Title, &task.title);
    push(MatchField::Description, &task.description);
    for tag in &task.tags {
        push(MatchField::Tag, tag);
    }
}
