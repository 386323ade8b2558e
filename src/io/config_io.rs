use std::fs;
use std::path::{Path, PathBuf};

use crate::io::store::FileStore;
use crate::model::config::{BoardConfig, ConfigError};
use crate::ops::task_ops::TaskBoard;

/// Directory holding a board's config, store and recovery log
pub const BOARD_DIR: &str = "board";
pub const CONFIG_FILE: &str = "board.toml";

/// Error type for locating and configuring a board on disk
#[derive(Debug, thiserror::Error)]
pub enum BoardIoError {
    #[error("not a task board: no board/board.toml found (run `tb init`)")]
    NotABoard,
    #[error("a board already exists at {0}")]
    AlreadyInitialized(PathBuf),
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse board.toml: {0}")]
    ConfigParseError(#[from] toml::de::Error),
    #[error("invalid board.toml: {0}")]
    Invalid(#[from] ConfigError),
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A board opened from disk
#[derive(Debug)]
pub struct OpenBoard {
    pub root: PathBuf,
    pub board_dir: PathBuf,
    pub config: BoardConfig,
    pub board: TaskBoard<FileStore>,
}

/// Find the board by walking up from `start`, looking for `board/board.toml`.
/// Returns the directory that contains `board/`.
pub fn discover_board(start: &Path) -> Result<PathBuf, BoardIoError> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(BOARD_DIR).join(CONFIG_FILE).is_file() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(BoardIoError::NotABoard);
        }
    }
}

/// Read and validate `board.toml`
pub fn read_config(board_dir: &Path) -> Result<BoardConfig, BoardIoError> {
    let config_path = board_dir.join(CONFIG_FILE);
    let text = fs::read_to_string(&config_path).map_err(|e| BoardIoError::ReadError {
        path: config_path.clone(),
        source: e,
    })?;
    let config: BoardConfig = toml::from_str(&text)?;
    config.validate()?;
    Ok(config)
}

/// Create `board/` under `root` and write `config_text` as its board.toml.
/// The text is parsed and validated first; nothing is written if it is bad.
pub fn init_board(root: &Path, config_text: &str) -> Result<PathBuf, BoardIoError> {
    let board_dir = root.join(BOARD_DIR);
    if board_dir.join(CONFIG_FILE).exists() {
        return Err(BoardIoError::AlreadyInitialized(board_dir));
    }
    let config: BoardConfig = toml::from_str(config_text)?;
    config.validate()?;
    fs::create_dir_all(&board_dir)?;
    fs::write(board_dir.join(CONFIG_FILE), config_text)?;
    Ok(board_dir)
}

/// Open the board rooted at `root`: config, file store, recovery log
pub fn open_board(root: &Path) -> Result<OpenBoard, BoardIoError> {
    let board_dir = root.join(BOARD_DIR);
    if !board_dir.is_dir() {
        return Err(BoardIoError::NotABoard);
    }
    let config = read_config(&board_dir)?;
    let store = FileStore::new(board_dir.join(&config.storage.file), config.storage.quota_bytes);
    let board = TaskBoard::open_with_recovery(&config, store, &board_dir);
    if let Some(e) = board.load_error() {
        log::warn!("opened {} with an empty board: {}", board_dir.display(), e);
    }
    Ok(OpenBoard {
        root: root.to_path_buf(),
        board_dir,
        config,
        board,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::task::{TaskFields, TierLabels};
    use tempfile::TempDir;

    #[test]
    fn test_defaults_from_empty_file() {
        let config: BoardConfig = toml::from_str("").unwrap();
        assert_eq!(config.board.columns, vec!["ToDo", "InProgress", "Done"]);
        assert_eq!(config.storage.key, "tasks");
        assert_eq!(config.log.level, "warn");
        assert!(config.tasks.require_description);
    }

    #[test]
    fn test_init_then_read() {
        let tmp = TempDir::new().unwrap();
        let mut config = BoardConfig::default();
        config.board.name = "Sprint".into();
        config.tasks.labels = TierLabels::Difficulty;
        let text = toml::to_string_pretty(&config).unwrap();
        let dir = init_board(tmp.path(), &text).unwrap();

        assert_eq!(read_config(&dir).unwrap(), config);
        assert!(matches!(
            init_board(tmp.path(), &text),
            Err(BoardIoError::AlreadyInitialized(_))
        ));
    }

    #[test]
    fn test_init_rejects_invalid_text() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            init_board(tmp.path(), "[board]\ncolumns = []\n"),
            Err(BoardIoError::Invalid(ConfigError::NoColumns))
        ));
        assert!(!tmp.path().join(BOARD_DIR).exists());
    }

    #[test]
    fn test_read_rejects_invalid_columns() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILE),
            "[board]\ncolumns = [\"A\", \"A\"]\n",
        )
        .unwrap();
        assert!(matches!(
            read_config(tmp.path()),
            Err(BoardIoError::Invalid(ConfigError::DuplicateColumn(_)))
        ));
    }

    #[test]
    fn test_discover_walks_up() {
        let tmp = TempDir::new().unwrap();
        init_board(tmp.path(), "").unwrap();
        let nested = tmp.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        assert_eq!(discover_board(&nested).unwrap(), tmp.path());
    }

    #[test]
    fn test_discover_without_board() {
        let tmp = TempDir::new().unwrap();
        // A bare board/ directory is not enough
        fs::create_dir_all(tmp.path().join(BOARD_DIR)).unwrap();
        assert!(matches!(
            discover_board(tmp.path()),
            Err(BoardIoError::NotABoard)
        ));
    }

    #[test]
    fn test_open_board_persists_to_store_file() {
        let tmp = TempDir::new().unwrap();
        init_board(tmp.path(), "").unwrap();

        let mut opened = open_board(tmp.path()).unwrap();
        opened
            .board
            .create_task(TaskFields::new("Persist me", "d"))
            .unwrap();
        assert!(opened.board.last_save_error().is_none());
        assert!(tmp.path().join(BOARD_DIR).join("store.json").exists());

        let reopened = open_board(tmp.path()).unwrap();
        assert_eq!(reopened.board.board().task_count(), 1);
    }

    #[test]
    fn test_corrupt_store_keeps_tasks_recoverable() {
        let tmp = TempDir::new().unwrap();
        init_board(tmp.path(), "").unwrap();
        let mut opened = open_board(tmp.path()).unwrap();
        for title in ["one", "two", "three"] {
            opened.board.create_task(TaskFields::new(title, "d")).unwrap();
        }

        let store_path = tmp.path().join(BOARD_DIR).join("store.json");
        let text = fs::read_to_string(&store_path).unwrap();
        let broken = format!("{},\n}}", text.trim_end().trim_end_matches('}'));
        fs::write(&store_path, &broken).unwrap();

        let mut reopened = open_board(tmp.path()).unwrap();
        assert!(reopened.board.load_error().is_some());
        reopened.board.create_task(TaskFields::new("four", "d")).unwrap();
        assert!(reopened.board.last_save_error().is_none());

        let entries = crate::io::recovery::read_recovery_entries(&opened.board_dir, None, None);
        assert_eq!(entries.len(), 1);
        assert!(entries[0].body.contains("three"));
        let backup = fs::read_to_string(tmp.path().join(BOARD_DIR).join("store.json.corrupt")).unwrap();
        assert!(backup.contains("three"));
    }
}
