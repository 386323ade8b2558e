use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::io::recovery::{self, RecoveryCategory, RecoveryEntry};
use crate::io::store::{KeyValueStore, StoreError};
use crate::model::board::Board;
use crate::model::config::BoardConfig;
use crate::model::preferences::Preferences;
use crate::model::task::Task;

/// Error type for saving and loading the board record
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("store unavailable: {0}")]
    Store(#[from] StoreError),
    #[error("could not serialize board: {0}")]
    Serialize(serde_json::Error),
    #[error("stored board record is corrupt: {0}")]
    Corrupt(serde_json::Error),
}

impl PersistenceError {
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(
            self,
            PersistenceError::Store(StoreError::QuotaExceeded { .. })
        )
    }
}

/// The single record written under the storage key
#[derive(Debug, Serialize)]
struct BoardRecordOut<'a> {
    columns: &'a Board,
    preferences: Preferences,
}

#[derive(Debug, Deserialize)]
struct BoardRecordIn {
    columns: IndexMap<String, Vec<Task>>,
    #[serde(default)]
    preferences: Preferences,
}

/// Fixed column layout a record is loaded into
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub columns: Vec<String>,
    pub intake: String,
}

impl Layout {
    pub fn new<I, S>(columns: I, intake: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Layout {
            columns: columns.into_iter().map(Into::into).collect(),
            intake: intake.into(),
        }
    }

    pub fn from_config(config: &BoardConfig) -> Self {
        Layout::new(config.board.columns.iter().cloned(), config.intake_column())
    }
}

/// A decoded record, fitted to the layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub board: Board,
    pub preferences: Preferences,
    /// Adjustments made while fitting the record to the layout
    pub notes: Vec<String>,
    /// Tasks that could not be placed (repeated identities)
    pub dropped: Vec<Task>,
}

/// Result of the start-up load. Never fails: a missing or unreadable record
/// gives an empty board, with the reason in `error`.
#[derive(Debug)]
pub struct LoadOutcome {
    pub board: Board,
    pub preferences: Preferences,
    pub notes: Vec<String>,
    pub error: Option<PersistenceError>,
}

/// Serialize the board and preferences to the record string
pub fn encode(board: &Board, preferences: Preferences) -> Result<String, PersistenceError> {
    serde_json::to_string(&BoardRecordOut {
        columns: board,
        preferences,
    })
    .map_err(PersistenceError::Serialize)
}

/// Parse a record string and fit it to `layout`.
///
/// Accepts the current `{columns, preferences}` record as well as a bare
/// `{column: [task, ...]}` map. Configured columns missing from the record
/// start empty; tasks under an unknown column are appended to the intake
/// column; a repeated identity keeps its first occurrence.
pub fn decode(text: &str, layout: &Layout) -> Result<Decoded, PersistenceError> {
    let value: serde_json::Value = serde_json::from_str(text).map_err(PersistenceError::Corrupt)?;
    let (columns, preferences) = if value.get("columns").is_some_and(|c| c.is_object()) {
        let record: BoardRecordIn =
            serde_json::from_value(value).map_err(PersistenceError::Corrupt)?;
        (record.columns, record.preferences)
    } else {
        let columns: IndexMap<String, Vec<Task>> =
            serde_json::from_value(value).map_err(PersistenceError::Corrupt)?;
        (columns, Preferences::default())
    };

    let mut board = Board::empty(layout.columns.iter().cloned());
    let mut seen = HashSet::new();
    let mut notes = Vec::new();
    let mut dropped = Vec::new();

    for (name, tasks) in columns {
        let target = if board.has_column(&name) {
            name.clone()
        } else {
            if !tasks.is_empty() {
                notes.push(format!(
                    "column {} is not configured; {} task(s) moved to {}",
                    name,
                    tasks.len(),
                    layout.intake
                ));
            }
            layout.intake.clone()
        };
        for task in tasks {
            if !seen.insert(task.id.clone()) {
                notes.push(format!("task {} appears more than once; kept the first", task.id));
                dropped.push(task);
                continue;
            }
            if let Some(column) = board.column_mut(&target) {
                column.push(task);
            }
        }
    }

    Ok(Decoded {
        board,
        preferences,
        notes,
        dropped,
    })
}

/// Reads and writes the board record in a key-value store
#[derive(Debug)]
pub struct PersistenceBridge<S> {
    store: S,
    key: String,
    recovery_dir: Option<PathBuf>,
}

impl<S: KeyValueStore> PersistenceBridge<S> {
    pub fn new(store: S, key: impl Into<String>) -> Self {
        PersistenceBridge {
            store,
            key: key.into(),
            recovery_dir: None,
        }
    }

    /// Keep data that cannot be saved or loaded in this directory's
    /// recovery log
    pub fn with_recovery_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.recovery_dir = Some(dir.into());
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn recovery_dir(&self) -> Option<&Path> {
        self.recovery_dir.as_deref()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Write the whole board and preferences under the key
    pub fn save(&mut self, board: &Board, preferences: Preferences) -> Result<(), PersistenceError> {
        let record = encode(board, preferences)?;
        if let Err(e) = self.store.set(&self.key, &record) {
            self.recover(
                RecoveryEntry::now(RecoveryCategory::Write, "board save failed")
                    .field("Key", self.key.as_str())
                    .field("Error", e.to_string())
                    .body(record),
            );
            return Err(e.into());
        }
        Ok(())
    }

    /// Read the record, falling back to an empty board on any failure
    pub fn load(&self, layout: &Layout) -> LoadOutcome {
        let empty = |error| LoadOutcome {
            board: Board::empty(layout.columns.iter().cloned()),
            preferences: Preferences::default(),
            notes: Vec::new(),
            error,
        };

        let text = match self.store.get(&self.key) {
            Ok(Some(text)) => text,
            Ok(None) => return empty(None),
            Err(e) => {
                log::warn!("could not read board record {}: {}", self.key, e);
                if let StoreError::Corrupt { path, .. } = &e {
                    // The store rewrites an unreadable file on the next save
                    let raw = fs::read_to_string(path).unwrap_or_default();
                    self.recover(
                        RecoveryEntry::now(RecoveryCategory::Load, "unreadable store file")
                            .field("Key", self.key.as_str())
                            .field("File", path.display().to_string())
                            .field("Error", e.to_string())
                            .body(raw),
                    );
                }
                return empty(Some(e.into()));
            }
        };

        match decode(&text, layout) {
            Ok(decoded) => {
                for note in &decoded.notes {
                    log::warn!("loading {}: {}", self.key, note);
                }
                if !decoded.dropped.is_empty() {
                    let body = serde_json::to_string_pretty(&decoded.dropped).unwrap_or_default();
                    self.recover(
                        RecoveryEntry::now(RecoveryCategory::Load, "duplicate tasks dropped")
                            .field("Key", self.key.as_str())
                            .field("Count", decoded.dropped.len().to_string())
                            .body(body),
                    );
                }
                LoadOutcome {
                    board: decoded.board,
                    preferences: decoded.preferences,
                    notes: decoded.notes,
                    error: None,
                }
            }
            Err(e) => {
                log::warn!("board record {} is unreadable, starting empty: {}", self.key, e);
                self.recover(
                    RecoveryEntry::now(RecoveryCategory::Load, "unreadable board record")
                        .field("Key", self.key.as_str())
                        .field("Error", e.to_string())
                        .body(text),
                );
                empty(Some(e))
            }
        }
    }

    fn recover(&self, entry: RecoveryEntry) {
        if let Some(dir) = &self.recovery_dir {
            recovery::log_recovery(dir, entry);
        }
    }
}
