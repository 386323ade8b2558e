//! Drag-resolution events and their translation into repository moves.
//!
//! The gesture layer reports where a card was picked up and where it was
//! dropped. A drop outside every column carries no destination and is a
//! cancelled gesture, not an error.

use serde::{Deserialize, Serialize};

use crate::model::board::{Board, TaskLocation};
use crate::model::task::TaskId;
use crate::ops::projection::BoardView;
use crate::ops::repository::{BoardError, TaskRepository};

/// One end of a drag gesture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DragLocation {
    pub column_id: String,
    pub index: usize,
}

impl DragLocation {
    pub fn new(column_id: impl Into<String>, index: usize) -> Self {
        DragLocation {
            column_id: column_id.into(),
            index,
        }
    }
}

/// A resolved drag gesture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DragEvent {
    pub source: DragLocation,
    #[serde(default)]
    pub destination: Option<DragLocation>,
}

impl DragEvent {
    pub fn new(source: DragLocation, destination: Option<DragLocation>) -> Self {
        DragEvent {
            source,
            destination,
        }
    }

    /// A gesture released outside any column
    pub fn cancelled(source: DragLocation) -> Self {
        DragEvent::new(source, None)
    }
}

/// A move resolved against stored order, ready for `move_at`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovePlan {
    pub id: TaskId,
    pub from: TaskLocation,
    pub to: TaskLocation,
}

/// What applying a drag event did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragOutcome {
    /// No destination; nothing changed
    Cancelled,
    /// Dropped where it was picked up
    Unchanged,
    Moved {
        id: TaskId,
        from: TaskLocation,
        to: TaskLocation,
    },
}

/// Resolve a stored-index drag event against the board.
///
/// Returns `Ok(None)` for a cancelled gesture. Unknown columns and a source
/// index with no task behind it are errors. A destination index past the end
/// of its list is clamped to the end: gesture resolution is untrusted input
/// and "past the end" can only mean "last".
pub fn plan_move(board: &Board, event: &DragEvent) -> Result<Option<MovePlan>, BoardError> {
    let Some(dest) = &event.destination else {
        return Ok(None);
    };
    let source = &event.source;
    let source_tasks = board
        .column(&source.column_id)
        .ok_or_else(|| BoardError::InvalidColumn(source.column_id.clone()))?;
    let task = source_tasks
        .get(source.index)
        .ok_or_else(|| BoardError::IndexOutOfRange {
            column: source.column_id.clone(),
            index: source.index,
            len: source_tasks.len(),
        })?;
    let dest_tasks = board
        .column(&dest.column_id)
        .ok_or_else(|| BoardError::InvalidColumn(dest.column_id.clone()))?;

    let dest_len = if dest.column_id == source.column_id {
        dest_tasks.len() - 1
    } else {
        dest_tasks.len()
    };
    let dest_index = if dest.index > dest_len {
        log::debug!(
            "clamping drop index {} to {} in {}",
            dest.index,
            dest_len,
            dest.column_id
        );
        dest_len
    } else {
        dest.index
    };

    Ok(Some(MovePlan {
        id: task.id.clone(),
        from: TaskLocation::new(source.column_id.clone(), source.index),
        to: TaskLocation::new(dest.column_id.clone(), dest_index),
    }))
}

/// Apply a stored-index drag event to the repository
pub fn apply_drag(
    repo: &mut TaskRepository,
    event: &DragEvent,
) -> Result<DragOutcome, BoardError> {
    let Some(plan) = plan_move(repo.snapshot(), event)? else {
        return Ok(DragOutcome::Cancelled);
    };
    if plan.from == plan.to {
        return Ok(DragOutcome::Unchanged);
    }
    repo.move_at(
        &plan.from.column,
        plan.from.index,
        &plan.to.column,
        plan.to.index,
    )?;
    Ok(DragOutcome::Moved {
        id: plan.id,
        from: plan.from,
        to: plan.to,
    })
}

/// Rewrite a drag event expressed in displayed positions (under a filter or
/// sort) into stored positions.
///
/// The dragged task is found by its displayed position and then located by
/// identity. The drop lands before the task displayed at the destination
/// index; past the last displayed task it lands right after that task, and
/// in a column showing nothing it lands at the end. A cancelled event is
/// returned as it is.
pub fn translate_displayed(
    view: &BoardView<'_>,
    board: &Board,
    event: &DragEvent,
) -> Result<DragEvent, BoardError> {
    let Some(dest) = &event.destination else {
        return Ok(event.clone());
    };
    let source_view = view
        .column(&event.source.column_id)
        .ok_or_else(|| BoardError::InvalidColumn(event.source.column_id.clone()))?;
    let dragged = source_view
        .tasks
        .get(event.source.index)
        .map(|t| t.id.clone())
        .ok_or_else(|| BoardError::IndexOutOfRange {
            column: event.source.column_id.clone(),
            index: event.source.index,
            len: source_view.len(),
        })?;
    let from = board
        .find(&dragged)
        .ok_or_else(|| BoardError::NotFound(dragged.clone()))?;
    let source = DragLocation::new(from.column.clone(), from.index);

    let dest_view = view
        .column(&dest.column_id)
        .ok_or_else(|| BoardError::InvalidColumn(dest.column_id.clone()))?;
    let stored: Vec<&TaskId> = board
        .column(&dest.column_id)
        .ok_or_else(|| BoardError::InvalidColumn(dest.column_id.clone()))?
        .iter()
        .map(|t| &t.id)
        .filter(|id| **id != dragged)
        .collect();
    let visible: Vec<&TaskId> = dest_view.ids().filter(|id| **id != dragged).collect();

    let position_of = |id: &TaskId| stored.iter().position(|s| *s == id);
    let index = match visible.get(dest.index) {
        Some(anchor) => position_of(*anchor),
        None => match visible.last() {
            Some(last) => position_of(*last).map(|i| i + 1),
            None => Some(stored.len()),
        },
    }
    .unwrap_or(stored.len());

    Ok(DragEvent::new(
        source,
        Some(DragLocation::new(dest.column_id.clone(), index)),
    ))
}
