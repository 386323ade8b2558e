use std::fmt;

use crate::model::board::{Board, TaskLocation};
use crate::model::task::{Task, TaskFields, TaskId};
use crate::ops::task_ops::ValidationError;

/// Error type for board operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BoardError {
    #[error("unknown column: {0}")]
    InvalidColumn(String),
    #[error("index {index} out of range for column {column} (length {len})")]
    IndexOutOfRange {
        column: String,
        index: usize,
        len: usize,
    },
    #[error("task not found: {0}")]
    NotFound(TaskId),
    #[error("task {0} is already on the board")]
    DuplicateTask(TaskId),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Where to insert a task in a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPosition {
    /// Append to the end of the column
    Bottom,
    /// Prepend to the start of the column
    Top,
    /// Insert before the task currently at this index
    At(usize),
}

/// Notification emitted after every accepted mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardChange {
    Inserted { id: TaskId, at: TaskLocation },
    Removed { id: TaskId, from: TaskLocation },
    Moved { id: TaskId, from: TaskLocation, to: TaskLocation },
    Updated { id: TaskId, at: TaskLocation },
}

impl BoardChange {
    pub fn task_id(&self) -> &TaskId {
        match self {
            BoardChange::Inserted { id, .. }
            | BoardChange::Removed { id, .. }
            | BoardChange::Moved { id, .. }
            | BoardChange::Updated { id, .. } => id,
        }
    }
}

pub type SubscriptionId = usize;

type Listener = Box<dyn FnMut(&BoardChange)>;

/// Sole owner of the board. Every mutation validates first and only then
/// touches the columns, so a rejected call leaves the board as it was.
pub struct TaskRepository {
    board: Board,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: SubscriptionId,
}

impl fmt::Debug for TaskRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRepository")
            .field("board", &self.board)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl TaskRepository {
    pub fn new(board: Board) -> Self {
        TaskRepository {
            board,
            listeners: Vec::new(),
            next_subscription: 0,
        }
    }

    /// Read-only view of the whole board
    pub fn snapshot(&self) -> &Board {
        &self.board
    }

    /// Current position of a task
    pub fn locate(&self, id: &TaskId) -> Result<TaskLocation, BoardError> {
        self.board
            .find(id)
            .ok_or_else(|| BoardError::NotFound(id.clone()))
    }

    /// Insert a task into a column. Returns the index it landed at.
    pub fn insert(
        &mut self,
        column: &str,
        task: Task,
        position: InsertPosition,
    ) -> Result<usize, BoardError> {
        if self.board.contains(&task.id) {
            return Err(BoardError::DuplicateTask(task.id));
        }
        let tasks = self.column_mut(column)?;
        let index = match position {
            InsertPosition::Bottom => tasks.len(),
            InsertPosition::Top => 0,
            InsertPosition::At(i) if i <= tasks.len() => i,
            InsertPosition::At(i) => {
                return Err(BoardError::IndexOutOfRange {
                    column: column.to_string(),
                    index: i,
                    len: tasks.len(),
                });
            }
        };
        let id = task.id.clone();
        tasks.insert(index, task);
        log::debug!("inserted {} at {}[{}]", id, column, index);
        self.notify(BoardChange::Inserted {
            id,
            at: TaskLocation::new(column, index),
        });
        Ok(index)
    }

    /// Remove and return the task at `index`
    pub fn remove_at(&mut self, column: &str, index: usize) -> Result<Task, BoardError> {
        let len = self.column_len(column)?;
        if index >= len {
            return Err(out_of_range(column, index, len));
        }
        let task = self.column_mut(column)?.remove(index);
        log::debug!("removed {} from {}[{}]", task.id, column, index);
        self.notify(BoardChange::Removed {
            id: task.id.clone(),
            from: TaskLocation::new(column, index),
        });
        Ok(task)
    }

    /// Move a task between (or within) columns as one step.
    ///
    /// `source_index` is checked against the source column as it is now.
    /// `dest_index` is checked against the destination as it will be once the
    /// task has been taken out, which only differs for a same-column move.
    pub fn move_at(
        &mut self,
        source_column: &str,
        source_index: usize,
        dest_column: &str,
        dest_index: usize,
    ) -> Result<(), BoardError> {
        let source_len = self.column_len(source_column)?;
        let dest_len = self.column_len(dest_column)?;
        if source_index >= source_len {
            return Err(out_of_range(source_column, source_index, source_len));
        }
        let same_column = source_column == dest_column;
        let dest_len_after = if same_column { source_len - 1 } else { dest_len };
        if dest_index > dest_len_after {
            return Err(out_of_range(dest_column, dest_index, dest_len_after));
        }
        if same_column && source_index == dest_index {
            return Ok(());
        }

        // Both columns exist and both indices are valid: nothing below can fail.
        let task = self.column_mut(source_column)?.remove(source_index);
        let id = task.id.clone();
        self.column_mut(dest_column)?.insert(dest_index, task);

        log::debug!(
            "moved {} from {}[{}] to {}[{}]",
            id,
            source_column,
            source_index,
            dest_column,
            dest_index
        );
        self.notify(BoardChange::Moved {
            id,
            from: TaskLocation::new(source_column, source_index),
            to: TaskLocation::new(dest_column, dest_index),
        });
        Ok(())
    }

    /// Replace the attributes of the task at `index`, keeping its identity
    pub fn update_at(
        &mut self,
        column: &str,
        index: usize,
        patch: TaskFields,
    ) -> Result<&Task, BoardError> {
        let len = self.column_len(column)?;
        if index >= len {
            return Err(out_of_range(column, index, len));
        }
        let tasks = self.column_mut(column)?;
        let updated = tasks[index].with_fields(patch);
        let id = updated.id.clone();
        tasks[index] = updated;
        log::debug!("updated {} at {}[{}]", id, column, index);
        self.notify(BoardChange::Updated {
            id,
            at: TaskLocation::new(column, index),
        });
        self.board
            .task_at(column, index)
            .ok_or_else(|| out_of_range(column, index, len))
    }

    /// Register a listener called after every accepted mutation
    pub fn subscribe(&mut self, listener: impl FnMut(&BoardChange) + 'static) -> SubscriptionId {
        let id = self.next_subscription;
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns false if the subscription was not registered
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    fn notify(&mut self, change: BoardChange) {
        for (_, listener) in &mut self.listeners {
            listener(&change);
        }
    }

    fn column_len(&self, column: &str) -> Result<usize, BoardError> {
        self.board
            .column(column)
            .map(<[Task]>::len)
            .ok_or_else(|| BoardError::InvalidColumn(column.to_string()))
    }

    fn column_mut(&mut self, column: &str) -> Result<&mut Vec<Task>, BoardError> {
        self.board
            .column_mut(column)
            .ok_or_else(|| BoardError::InvalidColumn(column.to_string()))
    }
}

fn out_of_range(column: &str, index: usize, len: usize) -> BoardError {
    BoardError::IndexOutOfRange {
        column: column.to_string(),
        index,
        len,
    }
}
