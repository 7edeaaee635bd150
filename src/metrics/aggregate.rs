use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;

use crate::clock::Clock;
use crate::metrics::model::{DayCount, Metrics};
use crate::metrics::suggest::{backlog_order, should_suggest, suggest_tasks};
use crate::model::{Status, Task};
use crate::store::{Store, TaskQuery};
use crate::timezone::{DayBounds, day_bounds_in, local_date, resolve_timezone, start_of_day, trailing_days};
use crate::visibility::fetch_visible;

pub const DEFAULT_SOMEDAY_TAG: &str = "someday";
const WEEK_DAYS: u32 = 7;
const PENDING_AGE_DAYS: i64 = 30;

/// Everything the pure aggregation step needs, already loaded and filtered.
#[derive(Debug, Clone, Copy)]
pub struct MetricsInput<'a> {
    /// Visible top-level tasks that are not done.
    pub open: &'a [Task],
    /// Visible top-level tasks completed inside the trailing week.
    pub completed: &'a [Task],
    pub project_due: &'a HashMap<i64, DateTime<Utc>>,
    pub tz: Tz,
    pub now: DateTime<Utc>,
    pub someday_tag: &'a str,
}

pub struct MetricsAggregator<'a> {
    store: &'a Store,
    clock: &'a dyn Clock,
    someday_tag: String,
}

impl<'a> MetricsAggregator<'a> {
    pub fn new(store: &'a Store, clock: &'a dyn Clock) -> Self {
        Self {
            store,
            clock,
            someday_tag: DEFAULT_SOMEDAY_TAG.to_string(),
        }
    }

    pub fn with_someday_tag(mut self, tag: impl Into<String>) -> Self {
        self.someday_tag = tag.into();
        self
    }

    /// Dashboard for `user_id` with day boundaries taken in `timezone`.
    ///
    /// Store failures shrink the result instead of failing it: an unreadable
    /// task set counts as empty and unknown project due dates are ignored.
    pub fn compute(&self, user_id: i64, timezone: &str) -> Metrics {
        let tz = resolve_timezone(timezone);
        let now = self.clock.now();

        let week = trailing_window(now, tz);
        let open = fetch_visible(self.store, &TaskQuery::actionable(user_id).not_done());
        let completed = fetch_visible(
            self.store,
            &TaskQuery::actionable(user_id)
                .with_statuses(&[Status::Done])
                .completed_within(week),
        );

        let mut project_ids: Vec<i64> = open.iter().filter_map(|t| t.project_id).collect();
        project_ids.sort_unstable();
        project_ids.dedup();
        let project_due = self
            .store
            .project_due_dates(&project_ids)
            .unwrap_or_else(|err| {
                tracing::warn!(user_id, error = %err, "project due dates unavailable");
                HashMap::new()
            });

        let mut metrics = aggregate(&MetricsInput {
            open: &open,
            completed: &completed,
            project_due: &project_due,
            tz,
            now,
            someday_tag: &self.someday_tag,
        });
        metrics.timezone = tz.name().to_string();
        tracing::debug!(
            user_id,
            timezone = %metrics.timezone,
            open = metrics.total_open_tasks,
            completed = completed.len(),
            "computed metrics"
        );
        metrics
    }
}

/// Dashboard for `user_id` using the default someday tag.
pub fn compute_metrics(store: &Store, clock: &dyn Clock, user_id: i64, timezone: &str) -> Metrics {
    MetricsAggregator::new(store, clock).compute(user_id, timezone)
}

/// From the start of the oldest trailing day through the end of today.
pub fn trailing_window(now: DateTime<Utc>, tz: Tz) -> DayBounds {
    let today = local_date(now, tz);
    let first = today - Duration::days(i64::from(WEEK_DAYS) - 1);
    DayBounds {
        start: start_of_day(first, tz),
        end: day_bounds_in(today, tz).end,
    }
}

fn due_in(task: &Task, bounds: &DayBounds, project_due: &HashMap<i64, DateTime<Utc>>) -> bool {
    task.due_date.is_some_and(|due| bounds.contains(due))
        || task
            .project_id
            .and_then(|id| project_due.get(&id))
            .is_some_and(|due| bounds.contains(*due))
}

pub fn aggregate(input: &MetricsInput<'_>) -> Metrics {
    let today = day_bounds_in(local_date(input.now, input.tz), input.tz);
    let month_ago = input.now - Duration::days(PENDING_AGE_DAYS);

    let total_open_tasks = input.open.len();
    let pending_over_month = input
        .open
        .iter()
        .filter(|task| task.created_at < month_ago)
        .count();

    let mut in_progress: Vec<Task> = input
        .open
        .iter()
        .filter(|task| task.status == Status::InProgress)
        .cloned()
        .collect();
    in_progress.sort_by(|a, b| b.priority.cmp(&a.priority));

    let today_plan: Vec<Task> = input
        .open
        .iter()
        .filter(|task| task.today_flag && task.status.is_active() && !task.is_deferred(input.now))
        .cloned()
        .collect();

    let mut due_today: Vec<Task> = input
        .open
        .iter()
        .filter(|task| !task.today_flag && task.status.is_active())
        .filter(|task| due_in(task, &today, input.project_due))
        .cloned()
        .collect();
    due_today.sort_by(backlog_order);

    let completed_today: Vec<Task> = input
        .completed
        .iter()
        .filter(|task| task.completed_at.is_some_and(|at| today.contains(at)))
        .cloned()
        .collect();

    let weekly_completions = trailing_days(input.now, input.tz, WEEK_DAYS)
        .into_iter()
        .map(|date| {
            let bounds = day_bounds_in(date, input.tz);
            let count = input
                .completed
                .iter()
                .filter(|task| task.completed_at.is_some_and(|at| bounds.contains(at)))
                .count();
            DayCount { date, count }
        })
        .collect();

    let suggested_tasks = if should_suggest(total_open_tasks, in_progress.len(), due_today.len()) {
        let surfaced: HashSet<i64> = in_progress
            .iter()
            .chain(&due_today)
            .chain(&today_plan)
            .map(|task| task.id)
            .collect();
        suggest_tasks(input.open, &surfaced, input.someday_tag, input.now)
    } else {
        Vec::new()
    };

    Metrics {
        timezone: input.tz.name().to_string(),
        total_open_tasks,
        pending_over_month,
        in_progress,
        today_plan,
        due_today,
        completed_today,
        weekly_completions,
        suggested_tasks,
    }
}
