//! Today, upcoming and overdue task lists.
//!
//! Today and upcoming materialize occurrences first so recurring work shows up
//! without a scheduler. Generation trouble never fails a view; it only means
//! the list shows whatever occurrences already exist.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::clock::Clock;
use crate::generator::{GenerationOptions, OccurrenceGenerator};
use crate::grouping::{DayGroup, SortKey, group_by_day};
use crate::model::Task;
use crate::store::lock::LockProvider;
use crate::store::{Store, TaskQuery};
use crate::timezone::{day_bounds_at, upcoming_range};
use crate::visibility::fetch_visible;

pub struct Views<'a> {
    store: &'a Store,
    locks: &'a dyn LockProvider,
    clock: &'a dyn Clock,
    options: GenerationOptions,
    horizon_days: u32,
}

impl<'a> Views<'a> {
    pub fn new(store: &'a Store, locks: &'a dyn LockProvider, clock: &'a dyn Clock) -> Self {
        Self {
            store,
            locks,
            clock,
            options: GenerationOptions::default(),
            horizon_days: 7,
        }
    }

    pub fn with_generation(mut self, options: GenerationOptions, horizon_days: u32) -> Self {
        self.options = options;
        self.horizon_days = horizon_days;
        self
    }

    fn materialize(&self, user_id: i64, days: u32) {
        let generator = OccurrenceGenerator::new(self.store, self.locks, self.clock)
            .with_options(self.options);
        if let Err(err) = generator.generate_upcoming(user_id, days.max(self.horizon_days)) {
            tracing::warn!(user_id, error = %err, code = err.code(), "generation failed, serving existing tasks");
        }
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Open tasks due from today through `days` ahead, bucketed by local day.
    pub fn upcoming(&self, user_id: i64, timezone: &str, days: u32, order: SortKey) -> Vec<DayGroup> {
        self.materialize(user_id, days);
        let now = self.now();
        let range = upcoming_range(now, timezone, days);
        let tasks = fetch_visible(
            self.store,
            &TaskQuery::actionable(user_id).open_only().due_within(range),
        );
        group_by_day(&tasks, timezone, days, order, now)
    }

    /// Open tasks due today or flagged for today.
    pub fn today(&self, user_id: i64, timezone: &str) -> Vec<Task> {
        self.materialize(user_id, 0);
        let now = self.now();
        let bounds = day_bounds_at(now, timezone);

        let due = fetch_visible(
            self.store,
            &TaskQuery::actionable(user_id).open_only().due_within(bounds),
        );
        let flagged = fetch_visible(
            self.store,
            &TaskQuery::actionable(user_id).open_only().flagged_today(true),
        );

        let mut seen = HashSet::new();
        let mut tasks: Vec<Task> = due
            .into_iter()
            .chain(flagged)
            .filter(|task| seen.insert(task.id))
            .filter(|task| task.today_flag || !task.is_deferred(now))
            .collect();
        tasks.sort_by(|a, b| SortKey::Priority.compare(a, b));
        tasks
    }

    /// Open tasks whose due date is before the start of today.
    pub fn overdue(&self, user_id: i64, timezone: &str) -> Vec<Task> {
        let now = self.now();
        let start = day_bounds_at(now, timezone).start;
        let mut tasks = fetch_visible(
            self.store,
            &TaskQuery::actionable(user_id).open_only().due_before(start),
        );
        tasks.sort_by(|a, b| SortKey::Due.compare(a, b));
        tasks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::model::{Priority, RecurrenceType, Status};
    use crate::store::lock::MemoryLockProvider;
    use std::sync::Arc;

    fn ts(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn task(name: &str, due: Option<&str>) -> Task {
        let mut task = Task::new(1, name, ts("2026-03-01T08:00:00Z"));
        task.due_date = due.map(ts);
        task
    }

    fn names(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|t| t.name.as_str()).collect()
    }

    #[test]
    fn upcoming_materializes_and_groups_occurrences() {
        let store = Store::open_memory().unwrap();
        let clock = Arc::new(FixedClock::new(ts("2026-03-10T08:00:00Z")));
        let locks = MemoryLockProvider::new(clock.clone());
        let mut template = task("Stretch", Some("2026-03-01T07:00:00Z"));
        template.recurrence.kind = RecurrenceType::Daily;
        store.insert_task(&template).unwrap();
        store
            .insert_task(&task("One-off", Some("2026-03-11T12:00:00Z")))
            .unwrap();

        let groups = Views::new(&store, &locks, clock.as_ref()).upcoming(1, "UTC", 2, SortKey::Priority);

        let labels: Vec<&str> = groups.iter().map(|g| g.label.as_str()).collect();
        assert_eq!(labels, vec!["Today", "Tomorrow", "Thursday, March 12"]);
        assert_eq!(names(&groups[0].tasks), vec!["Stretch"]);
        assert_eq!(groups[1].tasks.len(), 2);
        assert!(groups.iter().flat_map(|g| &g.tasks).all(|t| !t.is_template()));
    }

    #[test]
    fn today_merges_due_and_flagged_without_duplicates() {
        let store = Store::open_memory().unwrap();
        let clock = Arc::new(FixedClock::new(ts("2026-03-10T08:00:00Z")));
        let locks = MemoryLockProvider::new(clock.clone());

        let mut both = task("both", Some("2026-03-10T09:00:00Z"));
        both.today_flag = true;
        both.priority = Priority::High;
        store.insert_task(&both).unwrap();
        let mut flagged = task("flagged", None);
        flagged.today_flag = true;
        store.insert_task(&flagged).unwrap();
        store.insert_task(&task("due", Some("2026-03-10T17:00:00Z"))).unwrap();
        let mut finished = task("finished", Some("2026-03-10T10:00:00Z"));
        finished.status = Status::Done;
        store.insert_task(&finished).unwrap();
        store.insert_task(&task("tomorrow", Some("2026-03-11T09:00:00Z"))).unwrap();

        let today = Views::new(&store, &locks, clock.as_ref()).today(1, "UTC");

        assert_eq!(names(&today), vec!["both", "due", "flagged"]);
    }

    #[test]
    fn overdue_uses_local_start_of_day() {
        let store = Store::open_memory().unwrap();
        // 03:00Z on the 10th is the evening of the 9th in New York.
        let clock = Arc::new(FixedClock::new(ts("2026-03-10T15:00:00Z")));
        let locks = MemoryLockProvider::new(clock.clone());
        store.insert_task(&task("late yesterday", Some("2026-03-10T03:00:00Z"))).unwrap();
        store.insert_task(&task("last week", Some("2026-03-03T12:00:00Z"))).unwrap();
        store.insert_task(&task("this morning", Some("2026-03-10T13:00:00Z"))).unwrap();

        let views = Views::new(&store, &locks, clock.as_ref());

        assert_eq!(
            names(&views.overdue(1, "America/New_York")),
            vec!["last week", "late yesterday"]
        );
        assert_eq!(names(&views.overdue(1, "UTC")), vec!["last week"]);
    }
}
