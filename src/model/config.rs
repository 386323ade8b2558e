use serde::{Deserialize, Serialize};

use super::task::TierLabels;

/// Configuration from board.toml
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoardConfig {
    #[serde(default)]
    pub board: BoardSection,
    #[serde(default)]
    pub tasks: TaskRules,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardSection {
    #[serde(default = "default_name")]
    pub name: String,
    /// Fixed lanes, in display order
    #[serde(default = "default_columns")]
    pub columns: Vec<String>,
    /// Column new tasks land in. First column when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intake: Option<String>,
}

impl Default for BoardSection {
    fn default() -> Self {
        BoardSection {
            name: default_name(),
            columns: default_columns(),
            intake: None,
        }
    }
}

/// Which task fields a submitted form must fill in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRules {
    #[serde(default = "default_true")]
    pub require_description: bool,
    #[serde(default)]
    pub require_deadline: bool,
    #[serde(default)]
    pub labels: TierLabels,
}

impl Default for TaskRules {
    fn default() -> Self {
        TaskRules {
            require_description: true,
            require_deadline: false,
            labels: TierLabels::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Store file, relative to the board directory
    #[serde(default = "default_store_file")]
    pub file: String,
    /// Key the board record is written under
    #[serde(default = "default_store_key")]
    pub key: String,
    /// Total byte budget of the store
    #[serde(default = "default_quota")]
    pub quota_bytes: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            file: default_store_file(),
            key: default_store_key(),
            quota_bytes: default_quota(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: default_log_level(),
        }
    }
}

/// Error type for configuration problems
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("board must have at least one column")]
    NoColumns,
    #[error("column names must not be empty")]
    EmptyColumnName,
    #[error("column {0} is listed twice")]
    DuplicateColumn(String),
    #[error("intake column {0} is not one of the board's columns")]
    UnknownIntake(String),
    #[error("storage key must not be empty")]
    EmptyStorageKey,
}

impl BoardConfig {
    /// Column new tasks are appended to
    pub fn intake_column(&self) -> &str {
        match &self.board.intake {
            Some(name) => name,
            None => self
                .board
                .columns
                .first()
                .map(String::as_str)
                .unwrap_or_default(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let columns = &self.board.columns;
        if columns.is_empty() {
            return Err(ConfigError::NoColumns);
        }
        for (i, name) in columns.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(ConfigError::EmptyColumnName);
            }
            if columns[..i].contains(name) {
                return Err(ConfigError::DuplicateColumn(name.clone()));
            }
        }
        if let Some(intake) = &self.board.intake
            && !columns.contains(intake)
        {
            return Err(ConfigError::UnknownIntake(intake.clone()));
        }
        if self.storage.key.is_empty() {
            return Err(ConfigError::EmptyStorageKey);
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

fn default_name() -> String {
    "Tasks".to_string()
}

fn default_columns() -> Vec<String> {
    vec!["ToDo".into(), "InProgress".into(), "Done".into()]
}

fn default_store_file() -> String {
    "store.json".to_string()
}

/// Same key the board has always been stored under
fn default_store_key() -> String {
    "tasks".to_string()
}

/// 5 MiB, the usual browser local-storage budget
fn default_quota() -> usize {
    5 * 1024 * 1024
}

fn default_log_level() -> String {
    "warn".to_string()
}
