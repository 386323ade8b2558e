use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

/// Opaque task identity, stable for the lifetime of the task
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        TaskId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        TaskId(s.to_string())
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        TaskId(s)
    }
}

/// Three ordered tiers. Stored as `Low`/`Medium`/`High`; the difficulty
/// labels `Easy`/`Hard` are accepted on input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    #[default]
    #[serde(alias = "Easy", alias = "low", alias = "easy")]
    Low,
    #[serde(alias = "medium")]
    Medium,
    #[serde(alias = "Hard", alias = "high", alias = "hard")]
    High,
}

impl Priority {
    /// Tier rank used for sorting: Low = 1, Medium = 2, High = 3
    pub fn rank(self) -> u8 {
        match self {
            Priority::Low => 1,
            Priority::Medium => 2,
            Priority::High => 3,
        }
    }

    /// Parse either label set, case-insensitively
    pub fn parse(s: &str) -> Option<Priority> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" | "easy" | "1" => Some(Priority::Low),
            "medium" | "2" => Some(Priority::Medium),
            "high" | "hard" | "3" => Some(Priority::High),
            _ => None,
        }
    }

    pub fn label(self, labels: TierLabels) -> &'static str {
        match (labels, self) {
            (TierLabels::Priority, Priority::Low) => "Low",
            (TierLabels::Difficulty, Priority::Low) => "Easy",
            (_, Priority::Medium) => "Medium",
            (TierLabels::Priority, Priority::High) => "High",
            (TierLabels::Difficulty, Priority::High) => "Hard",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label(TierLabels::Priority))
    }
}

/// Which label set to show for tiers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TierLabels {
    #[default]
    Priority,
    Difficulty,
}

/// A task as held on the board and as written to the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_deadline"
    )]
    pub deadline: Option<NaiveDate>,
    #[serde(default, alias = "tag", deserialize_with = "deserialize_tags")]
    pub tags: Vec<String>,
    #[serde(default, alias = "difficulty")]
    pub priority: Priority,
}

impl Task {
    /// Build a task from submitted fields under the given identity
    pub fn from_fields(id: TaskId, fields: TaskFields) -> Self {
        Task {
            id,
            title: fields.title,
            description: fields.description,
            deadline: fields.deadline,
            tags: fields.tags,
            priority: fields.priority,
        }
    }

    /// A new value with every attribute replaced but the same identity
    pub fn with_fields(&self, fields: TaskFields) -> Self {
        Task::from_fields(self.id.clone(), fields)
    }

    /// The editable attributes of this task
    pub fn fields(&self) -> TaskFields {
        TaskFields {
            title: self.title.clone(),
            description: self.description.clone(),
            deadline: self.deadline,
            tags: self.tags.clone(),
            priority: self.priority,
        }
    }
}

/// Field-value bag submitted by a form: every task attribute except `id`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFields {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub deadline: Option<NaiveDate>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub priority: Priority,
}

impl TaskFields {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        TaskFields {
            title: title.into(),
            description: description.into(),
            ..Default::default()
        }
    }

    pub fn with_deadline(mut self, deadline: NaiveDate) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

/// Split a comma-separated tag string. Whitespace is trimmed, empty entries
/// and repeats are dropped, first-seen order is kept.
pub fn parse_tags(raw: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for part in raw.split(',') {
        let tag = part.trim();
        if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}

/// Parse a `YYYY-MM-DD` calendar date
pub fn parse_date(s: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
}

fn deserialize_deadline<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => parse_date(s)
            .map(Some)
            .map_err(|e| serde::de::Error::custom(format!("invalid deadline {s:?}: {e}"))),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredTags {
    One(String),
    Many(Vec<String>),
}

fn deserialize_tags<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let tags = match Option::<StoredTags>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(StoredTags::One(tag)) => vec![tag],
        Some(StoredTags::Many(tags)) => tags,
    };
    Ok(tags
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_task() -> Task {
        Task::from_fields(
            TaskId::new("task-1"),
            TaskFields::new("Write spec", "draft v1")
                .with_deadline(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap())
                .with_tags(vec!["docs".into(), "q1".into()])
                .with_priority(Priority::Medium),
        )
    }

    #[test]
    fn parse_tags_trims_and_drops_empty() {
        assert_eq!(parse_tags("a, b ,,c"), vec!["a", "b", "c"]);
        assert_eq!(parse_tags(""), Vec::<String>::new());
        assert_eq!(parse_tags("x,x, y"), vec!["x", "y"]);
    }

    #[test]
    fn priority_ranks_are_ordered() {
        assert!(Priority::Low.rank() < Priority::Medium.rank());
        assert!(Priority::Medium.rank() < Priority::High.rank());
        assert!(Priority::Low < Priority::High);
    }

    #[test]
    fn priority_parses_both_label_sets() {
        assert_eq!(Priority::parse("Easy"), Some(Priority::Low));
        assert_eq!(Priority::parse("hard"), Some(Priority::High));
        assert_eq!(Priority::parse(" Medium "), Some(Priority::Medium));
        assert_eq!(Priority::parse("urgent"), None);
    }

    #[test]
    fn priority_labels() {
        assert_eq!(Priority::Low.label(TierLabels::Difficulty), "Easy");
        assert_eq!(Priority::High.label(TierLabels::Priority), "High");
        assert_eq!(Priority::Medium.to_string(), "Medium");
    }

    #[test]
    fn task_json_shape() {
        let json = serde_json::to_value(sample_task()).unwrap();
        assert_eq!(json["id"], "task-1");
        assert_eq!(json["deadline"], "2025-03-01");
        assert_eq!(json["priority"], "Medium");
        assert_eq!(json["tags"], serde_json::json!(["docs", "q1"]));
    }

    #[test]
    fn task_without_deadline_omits_field() {
        let mut task = sample_task();
        task.deadline = None;
        let json = serde_json::to_value(&task).unwrap();
        assert!(json.get("deadline").is_none());
        let back: Task = serde_json::from_value(json).unwrap();
        assert_eq!(back, task);
    }

    #[test]
    fn legacy_record_fields_are_accepted() {
        let task: Task = serde_json::from_str(
            r#"{"id":"task-9","title":"Old","description":"d","deadline":"",
                "tags":[""],"difficulty":"Hard"}"#,
        )
        .unwrap();
        assert_eq!(task.deadline, None);
        assert!(task.tags.is_empty());
        assert_eq!(task.priority, Priority::High);
    }

    #[test]
    fn single_tag_becomes_list() {
        let task: Task =
            serde_json::from_str(r#"{"id":"t","title":"T","tag":"home"}"#).unwrap();
        assert_eq!(task.tags, vec!["home"]);
        assert_eq!(task.priority, Priority::Low);
        assert_eq!(task.description, "");
    }

    #[test]
    fn bad_deadline_is_rejected() {
        let result: Result<Task, _> =
            serde_json::from_str(r#"{"id":"t","title":"T","deadline":"tomorrow"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn with_fields_keeps_identity() {
        let task = sample_task();
        let edited = task.with_fields(TaskFields::new("Renamed", "v2"));
        assert_eq!(edited.id, task.id);
        assert_eq!(edited.title, "Renamed");
        assert_eq!(edited.deadline, None);
    }
}
