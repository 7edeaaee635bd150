use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::HorizonError;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[clap(rename_all = "snake_case")]
pub enum Status {
    #[default]
    NotStarted,
    InProgress,
    Waiting,
    Planned,
    Done,
    Archived,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Waiting => "waiting",
            Self::Planned => "planned",
            Self::Done => "done",
            Self::Archived => "archived",
        }
    }

    /// Neither done nor archived.
    pub fn is_active(self) -> bool {
        !matches!(self, Self::Done | Self::Archived)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Status {
    type Err = HorizonError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "not_started" => Ok(Self::NotStarted),
            "in_progress" => Ok(Self::InProgress),
            "waiting" => Ok(Self::Waiting),
            "planned" => Ok(Self::Planned),
            "done" => Ok(Self::Done),
            "archived" => Ok(Self::Archived),
            other => Err(HorizonError::InvalidInput(format!("unknown status '{other}'"))),
        }
    }
}

#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "snake_case")]
#[clap(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn rank(self) -> i64 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
        }
    }

    pub fn from_rank(rank: i64) -> Self {
        match rank {
            i64::MIN..=0 => Self::Low,
            1 => Self::Medium,
            _ => Self::High,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        })
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[clap(rename_all = "snake_case")]
pub enum RecurrenceType {
    #[default]
    None,
    Daily,
    Weekly,
    Monthly,
    Custom,
}

impl RecurrenceType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Custom => "custom",
        }
    }
}

impl std::fmt::Display for RecurrenceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for RecurrenceType {
    type Err = HorizonError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "none" | "" => Ok(Self::None),
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "custom" => Ok(Self::Custom),
            other => Err(HorizonError::InvalidRecurrenceRule(format!(
                "unknown recurrence type '{other}'"
            ))),
        }
    }
}

fn default_interval() -> i64 {
    1
}

fn is_none_recurrence(rule: &RecurrenceRule) -> bool {
    *rule == RecurrenceRule::default()
}

/// Repetition fields of a task. `weekday` uses 0 = Sunday through 6 = Saturday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    #[serde(rename = "type", default)]
    pub kind: RecurrenceType,
    #[serde(default = "default_interval")]
    pub interval: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weekday: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
}

impl Default for RecurrenceRule {
    fn default() -> Self {
        Self {
            kind: RecurrenceType::None,
            interval: 1,
            weekday: None,
            end_date: None,
        }
    }
}

impl RecurrenceRule {
    pub fn is_active(&self) -> bool {
        self.kind != RecurrenceType::None
    }

    /// Non-positive intervals step by one unit.
    pub fn effective_interval(&self) -> i64 {
        self.interval.max(1)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub external_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defer_until: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub user_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_task_id: Option<i64>,
    #[serde(default)]
    pub today_flag: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "is_none_recurrence")]
    pub recurrence: RecurrenceRule,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurring_parent_id: Option<i64>,
    /// Local calendar day an occurrence stands for; one occurrence per template per day.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occurrence_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(user_id: i64, name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            external_id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            description: None,
            status: Status::NotStarted,
            priority: Priority::Medium,
            due_date: None,
            defer_until: None,
            completed_at: None,
            user_id,
            project_id: None,
            parent_task_id: None,
            today_flag: false,
            tags: vec![],
            recurrence: RecurrenceRule::default(),
            recurring_parent_id: None,
            occurrence_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// A task carrying an active rule that is neither an occurrence nor a subtask.
    pub fn is_template(&self) -> bool {
        self.recurrence.is_active()
            && self.recurring_parent_id.is_none()
            && self.parent_task_id.is_none()
    }

    pub fn is_occurrence(&self) -> bool {
        self.recurring_parent_id.is_some()
    }

    pub fn is_deferred(&self, now: DateTime<Utc>) -> bool {
        self.defer_until.is_some_and(|until| until > now)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    /// Move to `status`, keeping `completed_at` in step: stamped when entering done,
    /// cleared when leaving it. Returns false when the status is unchanged.
    pub fn transition_to(&mut self, status: Status, now: DateTime<Utc>) -> bool {
        if self.status == status {
            return false;
        }
        if status == Status::Done {
            self.completed_at = Some(now);
        } else if self.status == Status::Done {
            self.completed_at = None;
        }
        self.status = status;
        self.updated_at = now;
        true
    }

    /// Trim whitespace, drop empty tags, then deduplicate and sort for deterministic storage.
    pub fn normalize(&mut self) {
        for tag in &mut self.tags {
            let trimmed = tag.trim();
            if trimmed.len() != tag.len() {
                *tag = trimmed.to_string();
            }
        }
        self.tags.retain(|t| !t.is_empty());
        self.tags.sort();
        self.tags.dedup();
        if self.external_id.is_empty() {
            self.external_id = uuid::Uuid::new_v4().to_string();
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    #[serde(default)]
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[clap(rename_all = "snake_case")]
pub enum ResourceType {
    Task,
    Project,
}

impl ResourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Project => "project",
        }
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = HorizonError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "task" => Ok(Self::Task),
            "project" => Ok(Self::Project),
            other => Err(HorizonError::InvalidInput(format!(
                "unknown resource type '{other}'"
            ))),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "snake_case")]
#[clap(rename_all = "snake_case")]
pub enum AccessLevel {
    ReadOnly,
    ReadWrite,
    Admin,
}

impl AccessLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReadOnly => "read_only",
            Self::ReadWrite => "read_write",
            Self::Admin => "admin",
        }
    }

    pub fn can_write(self) -> bool {
        self >= Self::ReadWrite
    }

    pub fn can_delete(self) -> bool {
        self == Self::Admin
    }
}

impl std::fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for AccessLevel {
    type Err = HorizonError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "read_only" => Ok(Self::ReadOnly),
            "read_write" => Ok(Self::ReadWrite),
            "admin" => Ok(Self::Admin),
            other => Err(HorizonError::InvalidInput(format!(
                "unknown access level '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub resource_type: ResourceType,
    pub resource_id: i64,
    pub grantee_id: i64,
    pub access_level: AccessLevel,
    pub grantor_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

fn default_timezone() -> String {
    "UTC".to_string()
}
