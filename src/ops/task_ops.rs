use std::fmt;
use std::path::PathBuf;

use chrono::Utc;

use crate::io::persistence::{Layout, PersistenceBridge, PersistenceError};
use crate::io::recovery::{self, RecoveryCategory, RecoveryEntry};
use crate::io::store::KeyValueStore;
use crate::model::board::Board;
use crate::model::config::{BoardConfig, TaskRules};
use crate::model::preferences::Preferences;
use crate::model::task::{Task, TaskFields, TaskId};
use crate::ops::projection::{BoardView, SortKey, project};
use crate::ops::reorder::{DragEvent, DragLocation, DragOutcome, apply_drag, translate_displayed};
use crate::ops::repository::{BoardChange, BoardError, InsertPosition, SubscriptionId, TaskRepository};

/// A form field that must be filled in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    Description,
    Deadline,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Field::Title => "title",
            Field::Description => "description",
            Field::Deadline => "deadline",
        })
    }
}

/// Submitted fields failed the configured rules. Lists every missing field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("missing required field(s): {}", field_list(.missing))]
pub struct ValidationError {
    pub missing: Vec<Field>,
}

fn field_list(fields: &[Field]) -> String {
    fields
        .iter()
        .map(Field::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Check submitted fields against the rules
pub fn validate(fields: &TaskFields, rules: &TaskRules) -> Result<(), ValidationError> {
    let mut missing = Vec::new();
    if fields.title.trim().is_empty() {
        missing.push(Field::Title);
    }
    if rules.require_description && fields.description.trim().is_empty() {
        missing.push(Field::Description);
    }
    if rules.require_deadline && fields.deadline.is_none() {
        missing.push(Field::Deadline);
    }
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { missing })
    }
}

/// Trim text fields and drop blank tags
fn normalize(mut fields: TaskFields) -> TaskFields {
    fields.title = fields.title.trim().to_string();
    fields.description = fields.description.trim().to_string();
    let mut tags: Vec<String> = Vec::new();
    for tag in fields.tags.iter().map(|t| t.trim()) {
        if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    fields.tags = tags;
    fields
}

const ID_PREFIX: &str = "task-";

/// Stamps `task-<millis>` identities.
///
/// Stamps strictly increase within a process even when the clock stalls or
/// steps back, and a stamp already on the board is skipped. Once a stored
/// identity has pushed the stamp to `i64::MAX`, new identities become
/// `task-<i64::MAX>-<n>` with `n` counting up.
pub struct IdGenerator {
    clock: Box<dyn FnMut() -> i64>,
    last: i64,
    spill: u64,
}

impl fmt::Debug for IdGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdGenerator")
            .field("last", &self.last)
            .field("spill", &self.spill)
            .finish()
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        IdGenerator::with_clock(|| Utc::now().timestamp_millis())
    }
}

impl IdGenerator {
    pub fn with_clock(clock: impl FnMut() -> i64 + 'static) -> Self {
        IdGenerator {
            clock: Box::new(clock),
            last: i64::MIN,
            spill: 0,
        }
    }

    /// Never issue an identity at or below any `task-<n>` already on the board
    pub fn observe(&mut self, board: &Board) {
        for (_, task) in board.tasks() {
            if let Some(n) = stamp_of(&task.id) {
                self.last = self.last.max(n);
            } else if let Some(n) = spill_of(&task.id) {
                self.last = i64::MAX;
                self.spill = self.spill.max(n);
            }
        }
    }

    pub fn next(&mut self, board: &Board) -> TaskId {
        let Some(floor) = self.last.checked_add(1) else {
            return self.next_spill(board);
        };
        let mut stamp = (self.clock)().max(floor);
        loop {
            let id = TaskId::new(format!("{}{}", ID_PREFIX, stamp));
            if !board.contains(&id) {
                self.last = stamp;
                return id;
            }
            match stamp.checked_add(1) {
                Some(n) => stamp = n,
                None => {
                    self.last = i64::MAX;
                    return self.next_spill(board);
                }
            }
        }
    }

    fn next_spill(&mut self, board: &Board) -> TaskId {
        loop {
            self.spill = self.spill.wrapping_add(1);
            let id = TaskId::new(format!("{}{}-{}", ID_PREFIX, i64::MAX, self.spill));
            if !board.contains(&id) {
                return id;
            }
        }
    }

    fn carry_over(&mut self, other: &IdGenerator) {
        self.last = self.last.max(other.last);
        self.spill = self.spill.max(other.spill);
    }
}

fn stamp_of(id: &TaskId) -> Option<i64> {
    id.as_str().strip_prefix(ID_PREFIX)?.parse().ok()
}

fn spill_of(id: &TaskId) -> Option<u64> {
    let rest = id.as_str().strip_prefix(ID_PREFIX)?;
    let (stamp, n) = rest.split_once('-')?;
    if stamp.parse::<i64>().ok()? != i64::MAX {
        return None;
    }
    n.parse().ok()
}

/// The board as higher layers see it: validated mutations over the
/// repository, each followed by a save.
///
/// Memory is authoritative. A failed save never undoes the mutation; it is
/// logged and kept for [`TaskBoard::last_save_error`].
#[derive(Debug)]
pub struct TaskBoard<S> {
    repo: TaskRepository,
    persistence: PersistenceBridge<S>,
    preferences: Preferences,
    rules: TaskRules,
    intake: String,
    ids: IdGenerator,
    load_error: Option<PersistenceError>,
    load_notes: Vec<String>,
    save_errors: Vec<PersistenceError>,
}

impl<S: KeyValueStore> TaskBoard<S> {
    /// Load the board from `store`, or start with empty columns
    pub fn open(config: &BoardConfig, store: S) -> Self {
        Self::from_bridge(config, PersistenceBridge::new(store, config.storage.key.clone()))
    }

    /// Like [`TaskBoard::open`], keeping unsaved and deleted data in
    /// `dir`'s recovery log
    pub fn open_with_recovery(config: &BoardConfig, store: S, dir: impl Into<PathBuf>) -> Self {
        let bridge = PersistenceBridge::new(store, config.storage.key.clone()).with_recovery_dir(dir);
        Self::from_bridge(config, bridge)
    }

    fn from_bridge(config: &BoardConfig, persistence: PersistenceBridge<S>) -> Self {
        let outcome = persistence.load(&Layout::from_config(config));
        let mut ids = IdGenerator::default();
        ids.observe(&outcome.board);
        TaskBoard {
            repo: TaskRepository::new(outcome.board),
            persistence,
            preferences: outcome.preferences,
            rules: config.tasks.clone(),
            intake: config.intake_column().to_string(),
            ids,
            load_error: outcome.error,
            load_notes: outcome.notes,
            save_errors: Vec::new(),
        }
    }

    /// Replace the identity clock (milliseconds)
    pub fn with_clock(mut self, clock: impl FnMut() -> i64 + 'static) -> Self {
        let mut ids = IdGenerator::with_clock(clock);
        ids.observe(self.repo.snapshot());
        ids.carry_over(&self.ids);
        self.ids = ids;
        self
    }

    pub fn board(&self) -> &Board {
        self.repo.snapshot()
    }

    pub fn preferences(&self) -> Preferences {
        self.preferences
    }

    pub fn rules(&self) -> &TaskRules {
        &self.rules
    }

    pub fn intake_column(&self) -> &str {
        &self.intake
    }

    pub fn store(&self) -> &S {
        self.persistence.store()
    }

    /// Why the stored board could not be read, if it could not
    pub fn load_error(&self) -> Option<&PersistenceError> {
        self.load_error.as_ref()
    }

    /// Adjustments made to the stored board while loading it
    pub fn load_notes(&self) -> &[String] {
        &self.load_notes
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&BoardChange) + 'static) -> SubscriptionId {
        self.repo.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.repo.unsubscribe(id)
    }

    // --- Mutations ---

    /// Validate, stamp a fresh identity, append to the intake column
    pub fn create_task(&mut self, fields: TaskFields) -> Result<Task, BoardError> {
        let fields = normalize(fields);
        validate(&fields, &self.rules)?;
        let id = self.ids.next(self.repo.snapshot());
        let task = Task::from_fields(id, fields);
        self.repo
            .insert(&self.intake, task.clone(), InsertPosition::Bottom)?;
        self.persist();
        Ok(task)
    }

    /// Replace the fields of the task shown at `column[index]`
    pub fn edit_task(
        &mut self,
        column: &str,
        index: usize,
        fields: TaskFields,
    ) -> Result<Task, BoardError> {
        let id = self.id_at(column, index)?;
        self.edit_task_by_id(&id, fields)
    }

    pub fn edit_task_by_id(&mut self, id: &TaskId, fields: TaskFields) -> Result<Task, BoardError> {
        let fields = normalize(fields);
        validate(&fields, &self.rules)?;
        let at = self.repo.locate(id)?;
        let task = self.repo.update_at(&at.column, at.index, fields)?.clone();
        self.persist();
        Ok(task)
    }

    pub fn delete_task(&mut self, column: &str, index: usize) -> Result<Task, BoardError> {
        let id = self.id_at(column, index)?;
        self.delete_task_by_id(&id)?
            .ok_or(BoardError::NotFound(id))
    }

    /// Remove a task by identity. Deleting an absent identity does nothing.
    pub fn delete_task_by_id(&mut self, id: &TaskId) -> Result<Option<Task>, BoardError> {
        let Some(at) = self.repo.snapshot().find(id) else {
            log::debug!("delete of {} ignored: not on the board", id);
            return Ok(None);
        };
        let task = self.repo.remove_at(&at.column, at.index)?;
        if let Some(dir) = self.persistence.recovery_dir() {
            let body = serde_json::to_string_pretty(&task).unwrap_or_default();
            recovery::log_recovery(
                dir,
                RecoveryEntry::now(RecoveryCategory::Delete, format!("deleted {}", task.id))
                    .field("Column", at.column.as_str())
                    .field("Title", task.title.as_str())
                    .body(body),
            );
        }
        self.persist();
        Ok(Some(task))
    }

    /// Move a task, addressed by identity, to `column[index]` in stored order
    pub fn move_task(
        &mut self,
        id: &TaskId,
        column: &str,
        index: usize,
    ) -> Result<DragOutcome, BoardError> {
        let from = self.repo.locate(id)?;
        let event = DragEvent::new(
            DragLocation::new(from.column, from.index),
            Some(DragLocation::new(column, index)),
        );
        self.drag(&event)
    }

    /// Apply a drag event given in stored positions
    pub fn drag(&mut self, event: &DragEvent) -> Result<DragOutcome, BoardError> {
        let outcome = apply_drag(&mut self.repo, event)?;
        if matches!(outcome, DragOutcome::Moved { .. }) {
            self.persist();
        }
        Ok(outcome)
    }

    /// Apply a drag event given in the positions shown under `query` and `sort`
    pub fn drag_in_view(
        &mut self,
        event: &DragEvent,
        query: &str,
        sort: SortKey,
    ) -> Result<DragOutcome, BoardError> {
        let stored = {
            let board = self.repo.snapshot();
            let view = project(board, query, sort);
            translate_displayed(&view, board, event)?
        };
        self.drag(&stored)
    }

    pub fn view(&self, query: &str, sort: SortKey) -> BoardView<'_> {
        project(self.repo.snapshot(), query, sort)
    }

    // --- Preferences ---

    pub fn set_dark_mode(&mut self, on: bool) {
        self.preferences.dark_mode = on;
        self.persist();
    }

    /// Flip dark mode, returning the new value
    pub fn toggle_dark_mode(&mut self) -> bool {
        let on = !self.preferences.dark_mode;
        self.set_dark_mode(on);
        on
    }

    // --- Save status ---

    pub fn last_save_error(&self) -> Option<&PersistenceError> {
        self.save_errors.last()
    }

    pub fn drain_save_errors(&mut self) -> Vec<PersistenceError> {
        std::mem::take(&mut self.save_errors)
    }

    fn persist(&mut self) {
        if let Err(e) = self.persistence.save(self.repo.snapshot(), self.preferences) {
            log::warn!("board not saved: {}", e);
            self.save_errors.push(e);
        }
    }

    fn id_at(&self, column: &str, index: usize) -> Result<TaskId, BoardError> {
        let tasks = self
            .repo
            .snapshot()
            .column(column)
            .ok_or_else(|| BoardError::InvalidColumn(column.to_string()))?;
        tasks
            .get(index)
            .map(|t| t.id.clone())
            .ok_or_else(|| BoardError::IndexOutOfRange {
                column: column.to_string(),
                index,
                len: tasks.len(),
            })
    }
}
