use chrono::{DateTime, Utc};
use rusqlite::types::Value;

use crate::model::{ResourceType, Status};
use crate::store::index::format_ts;
use crate::timezone::DayBounds;
use crate::visibility::{Predicate, visibility_predicate};

/// Visibility AND-ed with optional row filters, compiled to one WHERE clause.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskQuery {
    pub visibility: Predicate,
    pub statuses: Vec<Status>,
    pub exclude_statuses: Vec<Status>,
    pub due_within: Option<DayBounds>,
    pub due_before: Option<DateTime<Utc>>,
    pub completed_within: Option<DayBounds>,
    pub tag: Option<String>,
    pub top_level_only: bool,
    pub exclude_templates: bool,
    pub today_flag: Option<bool>,
}

impl TaskQuery {
    pub fn new(visibility: Predicate) -> Self {
        Self {
            visibility,
            statuses: vec![],
            exclude_statuses: vec![],
            due_within: None,
            due_before: None,
            completed_within: None,
            tag: None,
            top_level_only: false,
            exclude_templates: false,
            today_flag: None,
        }
    }

    /// Tasks `user_id` may see.
    pub fn visible_to(user_id: i64) -> Self {
        Self::new(visibility_predicate(ResourceType::Task, user_id))
    }

    /// Top-level, non-template tasks: the set dashboards and day views work on.
    pub fn actionable(user_id: i64) -> Self {
        Self {
            top_level_only: true,
            exclude_templates: true,
            ..Self::visible_to(user_id)
        }
    }

    pub fn with_statuses(mut self, statuses: &[Status]) -> Self {
        self.statuses = statuses.to_vec();
        self
    }

    pub fn open_only(mut self) -> Self {
        self.exclude_statuses = vec![Status::Done, Status::Archived];
        self
    }

    /// Everything but done; archived tasks still count as open for dashboard totals.
    pub fn not_done(mut self) -> Self {
        self.exclude_statuses = vec![Status::Done];
        self
    }

    pub fn due_within(mut self, bounds: DayBounds) -> Self {
        self.due_within = Some(bounds);
        self
    }

    pub fn due_before(mut self, instant: DateTime<Utc>) -> Self {
        self.due_before = Some(instant);
        self
    }

    pub fn completed_within(mut self, bounds: DayBounds) -> Self {
        self.completed_within = Some(bounds);
        self
    }

    pub fn tagged(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn flagged_today(mut self, flagged: bool) -> Self {
        self.today_flag = Some(flagged);
        self
    }

    pub(crate) fn compile(&self) -> (String, Vec<Value>) {
        let (visibility, mut params) = self.visibility.to_sql("t");
        let mut clauses = vec![visibility];

        if !self.statuses.is_empty() {
            clauses.push(format!("t.status IN ({})", placeholders(self.statuses.len())));
            params.extend(self.statuses.iter().map(|s| Value::Text(s.as_str().into())));
        }
        if !self.exclude_statuses.is_empty() {
            clauses.push(format!(
                "t.status NOT IN ({})",
                placeholders(self.exclude_statuses.len())
            ));
            params.extend(
                self.exclude_statuses
                    .iter()
                    .map(|s| Value::Text(s.as_str().into())),
            );
        }
        if let Some(bounds) = self.due_within {
            clauses.push("t.due_date BETWEEN ? AND ?".into());
            params.push(Value::Text(format_ts(bounds.start)));
            params.push(Value::Text(format_ts(bounds.end)));
        }
        if let Some(before) = self.due_before {
            clauses.push("t.due_date < ?".into());
            params.push(Value::Text(format_ts(before)));
        }
        if let Some(bounds) = self.completed_within {
            clauses.push("t.completed_at BETWEEN ? AND ?".into());
            params.push(Value::Text(format_ts(bounds.start)));
            params.push(Value::Text(format_ts(bounds.end)));
        }
        if let Some(ref tag) = self.tag {
            clauses.push(
                "EXISTS (SELECT 1 FROM tags tg WHERE tg.task_id = t.id AND tg.tag = ? COLLATE NOCASE)"
                    .into(),
            );
            params.push(Value::Text(tag.clone()));
        }
        if self.top_level_only {
            clauses.push("t.parent_task_id IS NULL".into());
        }
        if self.exclude_templates {
            clauses.push("NOT (t.recurrence_type != 'none' AND t.recurring_parent_id IS NULL)".into());
        }
        if let Some(flagged) = self.today_flag {
            clauses.push("t.today_flag = ?".into());
            params.push(Value::Integer(i64::from(flagged)));
        }

        (clauses.join(" AND "), params)
    }
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}
