//! Append-only log of board data that could not be kept normally: records
//! that failed to save, records that failed to load, tasks dropped while
//! loading, and deleted tasks.

use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tempfile::NamedTempFile;

use crate::io::lock::StoreLock;

/// Size past which the oldest entries are dropped on append (1 MiB).
const MAX_LOG_SIZE: u64 = 1_048_576;

/// Default number of days before entries are prunable.
pub const PRUNE_AGE_DAYS: i64 = 30;

/// Separator between timestamp and category in an entry header.
const HEADER_SEPARATOR: &str = " | ";

/// Header written at the top of a new recovery log.
const FILE_HEADER: &str = "\
<!-- taskboard recovery log: data tb could not save normally.
     Failed saves, unreadable records and deleted tasks land here.
     View with: tb recovery
     Prune old entries: tb recovery prune
     Safe to delete if empty or stale. -->

---
";

/// Category of a recovery entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryCategory {
    /// Stored record unreadable, or tasks dropped while loading it
    Load,
    /// Record could not be written to the store
    Write,
    /// Task deleted by the user
    Delete,
}

impl fmt::Display for RecoveryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryCategory::Load => write!(f, "load"),
            RecoveryCategory::Write => write!(f, "write"),
            RecoveryCategory::Delete => write!(f, "delete"),
        }
    }
}

impl RecoveryCategory {
    pub fn parse_category(s: &str) -> Option<Self> {
        match s {
            "load" => Some(RecoveryCategory::Load),
            "write" => Some(RecoveryCategory::Write),
            "delete" => Some(RecoveryCategory::Delete),
            _ => None,
        }
    }
}

/// A single entry in the recovery log.
#[derive(Debug, Clone)]
pub struct RecoveryEntry {
    pub timestamp: DateTime<Utc>,
    pub category: RecoveryCategory,
    pub description: String,
    pub fields: Vec<(String, String)>,
    pub body: String,
}

impl RecoveryEntry {
    /// New entry stamped with the current time
    pub fn now(category: RecoveryCategory, description: impl Into<String>) -> Self {
        RecoveryEntry {
            timestamp: Utc::now(),
            category,
            description: description.into(),
            fields: Vec::new(),
            body: String::new(),
        }
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Format this entry as a markdown block for the recovery log.
    fn to_markdown(&self) -> String {
        let mut out = format!(
            "## {}{}{}: {}\n\n",
            self.timestamp
                .to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            HEADER_SEPARATOR,
            self.category,
            self.description,
        );
        for (key, value) in &self.fields {
            out.push_str(&format!("{}: {}\n", key, value));
        }
        if !self.body.is_empty() {
            out.push_str("\n```text\n");
            out.push_str(&self.body);
            if !self.body.ends_with('\n') {
                out.push('\n');
            }
            out.push_str("```\n");
        }
        out.push_str("\n---\n");
        out
    }

    /// JSON form for `tb recovery --json`
    pub fn to_json(&self) -> serde_json::Value {
        let fields: serde_json::Map<String, serde_json::Value> = self
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();

        serde_json::json!({
            "timestamp": self.timestamp.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            "category": self.category.to_string(),
            "description": self.description,
            "fields": fields,
            "body": self.body,
        })
    }
}

/// Path of the recovery log inside a board directory.
pub fn recovery_log_path(board_dir: &Path) -> PathBuf {
    board_dir.join(".recovery.log")
}

/// Write `content` to `path` atomically using a temp file + rename.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Append an entry. Failures are logged, never returned: the recovery log is
/// the last resort and has nowhere further to report to.
pub fn log_recovery(board_dir: &Path, entry: RecoveryEntry) {
    log_recovery_capped(board_dir, entry, MAX_LOG_SIZE);
}

fn log_recovery_capped(board_dir: &Path, entry: RecoveryEntry, max_size: u64) {
    if let Err(e) = append_entry(board_dir, &entry, max_size) {
        log::warn!(
            "could not write {} entry to recovery log: {}",
            entry.category,
            e
        );
    }
}

fn append_entry(board_dir: &Path, entry: &RecoveryEntry, max_size: u64) -> io::Result<()> {
    let path = recovery_log_path(board_dir);
    if let Ok(meta) = std::fs::metadata(&path)
        && meta.len() > max_size
    {
        trim_log(&path, max_size);
    }

    let needs_header = std::fs::metadata(&path).map_or(true, |m| m.len() == 0);
    let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
    if needs_header {
        file.write_all(FILE_HEADER.as_bytes())?;
    }
    file.write_all(entry.to_markdown().as_bytes())
}

/// Drop the oldest entries until the log is at most half of `max_size`.
/// Skipped while another process holds the log.
fn trim_log(path: &Path, max_size: u64) {
    let Some(_lock) = StoreLock::try_acquire(path) else {
        return;
    };
    let Ok(content) = std::fs::read_to_string(path) else {
        return;
    };
    let budget = usize::try_from(max_size / 2).unwrap_or(usize::MAX);
    let trimmed = drop_oldest_entries(&content, budget);
    if trimmed.len() < content.len() {
        log::debug!(
            "trimming recovery log {} from {} to {} bytes",
            path.display(),
            content.len(),
            trimmed.len()
        );
        if let Err(e) = atomic_write(path, trimmed.as_bytes()) {
            log::warn!("could not trim recovery log {}: {}", path.display(), e);
        }
    }
}

/// Split a log into its header and one block per entry. Lines inside a
/// fenced body never start a new block.
fn split_blocks(content: &str) -> (String, Vec<String>) {
    let mut header = String::new();
    let mut blocks: Vec<String> = Vec::new();
    let mut in_fence = false;

    for line in content.lines() {
        if !in_fence && line.starts_with("## ") {
            blocks.push(String::new());
        }
        if line.starts_with("```") {
            in_fence = !in_fence;
        }
        let target = blocks.last_mut().unwrap_or(&mut header);
        target.push_str(line);
        target.push('\n');
    }
    (header, blocks)
}

/// Keep the header and the newest entries that fit in `budget` bytes
fn drop_oldest_entries(content: &str, budget: usize) -> String {
    let (header, blocks) = split_blocks(content);
    let mut size = header.len() + blocks.iter().map(String::len).sum::<usize>();
    let mut first_kept = 0;
    while size > budget && first_kept < blocks.len() {
        size -= blocks[first_kept].len();
        first_kept += 1;
    }
    header + &blocks[first_kept..].concat()
}

/// Read entries, most recent first, optionally limited to the newest `limit`
/// and to those at or after `since`.
pub fn read_recovery_entries(
    board_dir: &Path,
    limit: Option<usize>,
    since: Option<DateTime<Utc>>,
) -> Vec<RecoveryEntry> {
    let Ok(content) = std::fs::read_to_string(recovery_log_path(board_dir)) else {
        return Vec::new();
    };

    let mut entries = parse_entries(&content);
    if let Some(since) = since {
        entries.retain(|e| e.timestamp >= since);
    }
    if let Some(n) = limit {
        let skip = entries.len().saturating_sub(n);
        entries.drain(..skip);
    }
    entries.reverse();
    entries
}

/// Drop entries older than `before` (default: `PRUNE_AGE_DAYS` ago), or every
/// entry when `all` is set. Returns how many were removed.
pub fn prune_recovery(
    board_dir: &Path,
    before: Option<DateTime<Utc>>,
    all: bool,
) -> io::Result<usize> {
    let path = recovery_log_path(board_dir);
    if !path.exists() {
        return Ok(0);
    }
    let content = std::fs::read_to_string(&path)?;
    let original = parse_entries(&content).len();

    let kept = if all {
        FILE_HEADER.to_string()
    } else {
        let cutoff =
            before.unwrap_or_else(|| Utc::now() - chrono::Duration::days(PRUNE_AGE_DAYS));
        prune_entries_before(&content, &cutoff)
    };
    let remaining = parse_entries(&kept).len();
    atomic_write(&path, kept.as_bytes())?;
    Ok(original - remaining)
}

fn parse_entries(content: &str) -> Vec<RecoveryEntry> {
    let mut entries = Vec::new();
    let mut lines = content.lines().peekable();

    while let Some(line) = lines.next() {
        let Some((timestamp, category, description)) =
            line.strip_prefix("## ").and_then(parse_entry_header)
        else {
            continue;
        };

        let mut fields = Vec::new();
        let mut body = String::new();
        let mut in_code_block = false;

        while let Some(line) = lines.peek() {
            if !in_code_block && line.starts_with("## ") {
                break;
            }
            let line = lines.next().unwrap_or_default();
            if in_code_block {
                if line == "```" {
                    in_code_block = false;
                } else {
                    if !body.is_empty() {
                        body.push('\n');
                    }
                    body.push_str(line);
                }
                continue;
            }
            if line == "---" {
                break;
            }
            if line.starts_with("```") {
                in_code_block = true;
                continue;
            }
            if let Some((key, value)) = line.trim().split_once(": ") {
                fields.push((key.to_string(), value.to_string()));
            }
        }

        entries.push(RecoveryEntry {
            timestamp,
            category,
            description,
            fields,
            body,
        });
    }

    entries
}

/// Parse `<timestamp> | <category>: <description>`
fn parse_entry_header(header: &str) -> Option<(DateTime<Utc>, RecoveryCategory, String)> {
    let (timestamp, rest) = header.split_once(HEADER_SEPARATOR)?;
    let timestamp = DateTime::parse_from_rfc3339(timestamp)
        .ok()?
        .with_timezone(&Utc);
    let (category, description) = rest.split_once(": ")?;
    let category = RecoveryCategory::parse_category(category)?;
    Some((timestamp, category, description.to_string()))
}

/// Remove entries stamped before `cutoff`, keeping the file header.
fn prune_entries_before(content: &str, cutoff: &DateTime<Utc>) -> String {
    let mut result = String::new();
    let mut current = String::new();
    let mut current_ts: Option<DateTime<Utc>> = None;
    let mut in_header = true;

    for line in content.lines() {
        if in_header {
            result.push_str(line);
            result.push('\n');
            if line == "---" {
                in_header = false;
            }
            continue;
        }
        if let Some(stripped) = line.strip_prefix("## ") {
            if current_ts.is_some_and(|ts| ts >= *cutoff) {
                result.push_str(&current);
            }
            current.clear();
            current_ts = parse_entry_header(stripped).map(|(ts, _, _)| ts);
        }
        current.push_str(line);
        current.push('\n');
    }
    if current_ts.is_some_and(|ts| ts >= *cutoff) {
        result.push_str(&current);
    }
    result
}
