//! Materializes dated occurrences of recurring templates.

use chrono::{Duration, NaiveDate};
use chrono_tz::Tz;
use serde::Serialize;

use crate::clock::Clock;
use crate::error::{HorizonError, Result};
use crate::model::{RecurrenceRule, Status, Task};
use crate::recurrence::{Schedule, validate_rule};
use crate::store::lock::{LockProvider, acquire_with_backoff};
use crate::store::Store;
use crate::timezone::{local_date, resolve_timezone, start_of_day};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationOptions {
    /// Lease length; a crashed holder stops blocking others after this.
    pub lock_ttl: Duration,
    /// How long to keep retrying a held lock before giving up.
    pub lock_wait: std::time::Duration,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            lock_ttl: Duration::seconds(30),
            lock_wait: std::time::Duration::from_millis(1000),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GenerationReport {
    pub templates: usize,
    pub created: usize,
    pub existing: usize,
    pub skipped_invalid: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GenerationOutcome {
    Generated(GenerationReport),
    /// Another pass held the lock; existing occurrences are used as-is.
    Skipped,
}

impl GenerationOutcome {
    pub fn created(&self) -> usize {
        match self {
            Self::Generated(report) => report.created,
            Self::Skipped => 0,
        }
    }
}

pub struct OccurrenceGenerator<'a> {
    store: &'a Store,
    locks: &'a dyn LockProvider,
    clock: &'a dyn Clock,
    options: GenerationOptions,
}

fn lock_key(user_id: i64) -> String {
    format!("generate:{user_id}")
}

impl<'a> OccurrenceGenerator<'a> {
    pub fn new(store: &'a Store, locks: &'a dyn LockProvider, clock: &'a dyn Clock) -> Self {
        Self {
            store,
            locks,
            clock,
            options: GenerationOptions::default(),
        }
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    /// Create missing occurrences for every template `user_id` owns, from today
    /// through `horizon_days` ahead in the user's timezone.
    ///
    /// At most one pass per user runs at a time. Losing the lock race is not an
    /// error: the call returns `Skipped` and the caller reads what already exists.
    pub fn generate_upcoming(&self, user_id: i64, horizon_days: u32) -> Result<GenerationOutcome> {
        let key = lock_key(user_id);
        let token = match acquire_with_backoff(
            self.locks,
            &key,
            self.options.lock_ttl,
            self.options.lock_wait,
        ) {
            Ok(Some(token)) => token,
            Ok(None) => {
                tracing::debug!(user_id, "generation already in flight, skipping");
                return Ok(GenerationOutcome::Skipped);
            }
            Err(err) => {
                let err = HorizonError::LockUnavailable(err.to_string());
                tracing::warn!(user_id, error = %err, "generation lock failed, skipping");
                return Ok(GenerationOutcome::Skipped);
            }
        };

        let result = self.generate_locked(user_id, horizon_days);

        if let Err(err) = self.locks.release(token) {
            tracing::warn!(user_id, error = %err, "failed to release generation lock");
        }

        let report = result?;
        tracing::info!(
            user_id,
            templates = report.templates,
            created = report.created,
            existing = report.existing,
            "generated upcoming occurrences"
        );
        Ok(GenerationOutcome::Generated(report))
    }

    fn generate_locked(&self, user_id: i64, horizon_days: u32) -> Result<GenerationReport> {
        let timezone = self
            .store
            .user_timezone(user_id)?
            .unwrap_or_else(|| "UTC".to_string());
        let tz = resolve_timezone(&timezone);
        let now = self.clock.now();
        let today = local_date(now, tz);
        let last = today + Duration::days(i64::from(horizon_days));

        let mut report = GenerationReport::default();
        for template in self.store.templates_for_user(user_id)? {
            report.templates += 1;
            if let Err(err) = validate_rule(&template.recurrence) {
                tracing::warn!(template_id = template.id, error = %err, "skipping template with invalid rule");
                report.skipped_invalid += 1;
                continue;
            }

            let schedule = Schedule::for_template(&template, tz);
            for date in schedule.occurrences_between(today, last) {
                let occurrence = build_occurrence(&template, date, tz, now);
                if self.store.insert_occurrence(&occurrence)? {
                    report.created += 1;
                } else {
                    let conflict = HorizonError::OccurrenceConflict {
                        parent: template.id,
                        due: date.to_string(),
                    };
                    tracing::debug!(template_id = template.id, %conflict, "occurrence exists");
                    report.existing += 1;
                }
            }
        }
        Ok(report)
    }

    /// React to an edited rule: validate it, then drop occurrences of `template`
    /// due strictly after now. Past and current occurrences stay as history; the
    /// next `generate_upcoming` repopulates the future.
    ///
    /// Deletion only happens while holding the user's generation lock, so a pass
    /// still working from the old rule cannot refill the future afterwards. If the
    /// lock stays busy past `lock_wait`, nothing is deleted and the call fails with
    /// `LockUnavailable` for the writer to retry.
    pub fn apply_recurrence_rule_change(&self, template: &Task) -> Result<usize> {
        validate_task_rule(template)?;

        let key = lock_key(template.user_id);
        let token = match acquire_with_backoff(
            self.locks,
            &key,
            self.options.lock_ttl,
            self.options.lock_wait,
        ) {
            Ok(Some(token)) => token,
            Ok(None) => {
                return Err(HorizonError::LockUnavailable(format!(
                    "generation for user {} is still running",
                    template.user_id
                )));
            }
            Err(err) => return Err(HorizonError::LockUnavailable(err.to_string())),
        };

        let result = self
            .store
            .delete_future_occurrences(template.id, self.clock.now());

        if let Err(err) = self.locks.release(token) {
            tracing::warn!(template_id = template.id, error = %err, "failed to release generation lock");
        }

        let deleted = result?;
        tracing::info!(template_id = template.id, deleted, "cleared future occurrences after rule change");
        Ok(deleted)
    }
}

/// Checks a writer must pass before persisting recurrence fields on `task`.
pub fn validate_task_rule(task: &Task) -> Result<()> {
    validate_rule(&task.recurrence)?;
    if task.recurrence.is_active() && task.is_occurrence() {
        return Err(HorizonError::InvalidRecurrenceRule(
            "occurrences cannot carry their own rule".into(),
        ));
    }
    if task.recurrence.is_active() && task.parent_task_id.is_some() {
        return Err(HorizonError::InvalidRecurrenceRule(
            "subtasks cannot recur independently".into(),
        ));
    }
    Ok(())
}

fn build_occurrence(
    template: &Task,
    date: NaiveDate,
    tz: Tz,
    now: chrono::DateTime<chrono::Utc>,
) -> Task {
    let due = occurrence_due(template, date, tz);
    Task {
        id: 0,
        external_id: String::new(),
        name: template.name.clone(),
        description: template.description.clone(),
        status: Status::NotStarted,
        priority: template.priority,
        due_date: Some(due),
        defer_until: None,
        completed_at: None,
        user_id: template.user_id,
        project_id: template.project_id,
        parent_task_id: None,
        today_flag: false,
        tags: template.tags.clone(),
        recurrence: RecurrenceRule::default(),
        recurring_parent_id: Some(template.id),
        occurrence_date: Some(date),
        created_at: now,
        updated_at: now,
    }
}

// Keep the template's local time of day; untimed templates land on local midnight.
fn occurrence_due(template: &Task, date: NaiveDate, tz: Tz) -> chrono::DateTime<chrono::Utc> {
    use chrono::TimeZone;

    let Some(due) = template.due_date else {
        return start_of_day(date, tz);
    };
    let time = due.with_timezone(&tz).time();
    tz.from_local_datetime(&date.and_time(time))
        .earliest()
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .unwrap_or_else(|| start_of_day(date, tz))
}
