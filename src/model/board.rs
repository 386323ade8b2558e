use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::task::{Task, TaskId};

/// Where a task currently sits on the board
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskLocation {
    pub column: String,
    pub index: usize,
}

impl TaskLocation {
    pub fn new(column: impl Into<String>, index: usize) -> Self {
        TaskLocation {
            column: column.into(),
            index,
        }
    }
}

/// Column name to ordered task sequence, in configured column order.
///
/// Fields are private: outside the crate a `Board` can only be read. All
/// mutation goes through [`crate::ops::repository::TaskRepository`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Board {
    columns: IndexMap<String, Vec<Task>>,
}

impl Board {
    /// A board with the given columns, all empty
    pub fn empty<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Board {
            columns: names.into_iter().map(|n| (n.into(), Vec::new())).collect(),
        }
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Tasks of a column in stored order
    pub fn column(&self, name: &str) -> Option<&[Task]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &[Task])> {
        self.columns
            .iter()
            .map(|(name, tasks)| (name.as_str(), tasks.as_slice()))
    }

    /// Total number of tasks across all columns
    pub fn task_count(&self) -> usize {
        self.columns.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.task_count() == 0
    }

    pub fn task_at(&self, column: &str, index: usize) -> Option<&Task> {
        self.columns.get(column).and_then(|tasks| tasks.get(index))
    }

    /// Find a task's current column and index by identity
    pub fn find(&self, id: &TaskId) -> Option<TaskLocation> {
        self.columns.iter().find_map(|(name, tasks)| {
            tasks
                .iter()
                .position(|t| &t.id == id)
                .map(|index| TaskLocation::new(name.clone(), index))
        })
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.columns
            .values()
            .flat_map(|tasks| tasks.iter())
            .find(|t| &t.id == id)
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.get(id).is_some()
    }

    /// Every task in column order, then stored order
    pub fn tasks(&self) -> impl Iterator<Item = (&str, &Task)> {
        self.columns
            .iter()
            .flat_map(|(name, tasks)| tasks.iter().map(move |t| (name.as_str(), t)))
    }

    /// Identities that appear more than once. Empty on a well-formed board.
    pub fn duplicate_ids(&self) -> Vec<TaskId> {
        let mut seen = HashSet::new();
        let mut dups = Vec::new();
        for (_, task) in self.tasks() {
            if !seen.insert(&task.id) && !dups.contains(&task.id) {
                dups.push(task.id.clone());
            }
        }
        dups
    }

    pub(crate) fn column_mut(&mut self, name: &str) -> Option<&mut Vec<Task>> {
        self.columns.get_mut(name)
    }
}
