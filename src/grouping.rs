//! Buckets tasks into calendar days for the upcoming view.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::model::Task;
use crate::timezone::{local_date, resolve_timezone};

pub const NO_DUE_DATE: &str = "No Due Date";

/// Ordering applied inside each day bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// Highest priority first, then earliest due.
    #[default]
    Priority,
    /// Earliest due first, then highest priority.
    Due,
    Name,
    Created,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayGroup {
    pub label: String,
    /// None for the trailing "No Due Date" bucket.
    pub date: Option<NaiveDate>,
    pub tasks: Vec<Task>,
}

fn due_asc(a: &Task, b: &Task) -> Ordering {
    match (a.due_date, b.due_date) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

impl SortKey {
    pub fn compare(self, a: &Task, b: &Task) -> Ordering {
        let primary = match self {
            Self::Priority => b.priority.cmp(&a.priority).then_with(|| due_asc(a, b)),
            Self::Due => due_asc(a, b).then_with(|| b.priority.cmp(&a.priority)),
            Self::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            Self::Created => a.created_at.cmp(&b.created_at),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }
}

pub fn day_label(date: NaiveDate, today: NaiveDate) -> String {
    if date == today {
        "Today".to_string()
    } else if Some(date) == today.succ_opt() {
        "Tomorrow".to_string()
    } else {
        date.format("%A, %B %-d").to_string()
    }
}

/// Group `tasks` by local due day in `timezone`, ascending, undated last.
///
/// Tasks due more than `max_days` after today are left out entirely.
pub fn group_by_day(
    tasks: &[Task],
    timezone: &str,
    max_days: u32,
    order: SortKey,
    now: DateTime<Utc>,
) -> Vec<DayGroup> {
    let tz = resolve_timezone(timezone);
    let today = local_date(now, tz);
    let last = today + Duration::days(i64::from(max_days));

    let mut dated: BTreeMap<NaiveDate, Vec<Task>> = BTreeMap::new();
    let mut undated = Vec::new();
    for task in tasks {
        match task.due_date.map(|due| local_date(due, tz)) {
            Some(date) if date > last => {}
            Some(date) => dated.entry(date).or_default().push(task.clone()),
            None => undated.push(task.clone()),
        }
    }

    let mut groups: Vec<DayGroup> = dated
        .into_iter()
        .map(|(date, tasks)| DayGroup {
            label: day_label(date, today),
            date: Some(date),
            tasks,
        })
        .collect();
    if !undated.is_empty() {
        groups.push(DayGroup {
            label: NO_DUE_DATE.to_string(),
            date: None,
            tasks: undated,
        });
    }
    for group in &mut groups {
        group.tasks.sort_by(|a, b| order.compare(a, b));
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Priority;

    fn ts(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn task(id: i64, due: Option<&str>, priority: Priority) -> Task {
        let mut task = Task::new(1, format!("task {id}"), ts("2026-03-01T00:00:00Z"));
        task.id = id;
        task.due_date = due.map(ts);
        task.priority = priority;
        task
    }

    fn labels(groups: &[DayGroup]) -> Vec<&str> {
        groups.iter().map(|g| g.label.as_str()).collect()
    }

    #[test]
    fn max_days_drops_far_tasks_instead_of_rebucketing() {
        let tasks = vec![
            task(1, Some("2026-03-10T15:00:00Z"), Priority::Medium),
            task(2, Some("2026-03-11T15:00:00Z"), Priority::Medium),
            task(3, Some("2026-03-20T15:00:00Z"), Priority::Medium),
        ];

        let groups = group_by_day(&tasks, "UTC", 1, SortKey::Priority, ts("2026-03-10T08:00:00Z"));

        assert_eq!(labels(&groups), vec!["Today", "Tomorrow"]);
        assert!(groups.iter().all(|g| g.tasks.iter().all(|t| t.id != 3)));
    }

    #[test]
    fn later_days_get_weekday_labels_and_undated_go_last() {
        let tasks = vec![
            task(1, None, Priority::High),
            task(2, Some("2026-03-13T15:00:00Z"), Priority::Medium),
            task(3, Some("2026-03-10T15:00:00Z"), Priority::Medium),
        ];

        let groups = group_by_day(&tasks, "UTC", 7, SortKey::Priority, ts("2026-03-10T08:00:00Z"));

        assert_eq!(labels(&groups), vec!["Today", "Friday, March 13", NO_DUE_DATE]);
        assert_eq!(groups[2].date, None);
    }

    #[test]
    fn buckets_follow_the_viewers_timezone() {
        // 23:30 New York time on the 10th is already the 11th in UTC.
        let tasks = vec![task(1, Some("2026-03-11T03:30:00Z"), Priority::Medium)];
        let now = ts("2026-03-10T16:00:00Z");

        let utc = group_by_day(&tasks, "UTC", 7, SortKey::Priority, now);
        let ny = group_by_day(&tasks, "America/New_York", 7, SortKey::Priority, now);

        assert_eq!(labels(&utc), vec!["Tomorrow"]);
        assert_eq!(labels(&ny), vec!["Today"]);
    }

    #[test]
    fn bucket_order_respects_sort_key() {
        let tasks = vec![
            task(1, Some("2026-03-10T09:00:00Z"), Priority::Low),
            task(2, Some("2026-03-10T18:00:00Z"), Priority::High),
            task(3, Some("2026-03-10T12:00:00Z"), Priority::High),
        ];
        let now = ts("2026-03-10T08:00:00Z");
        let ids = |groups: Vec<DayGroup>| -> Vec<i64> {
            groups[0].tasks.iter().map(|t| t.id).collect()
        };

        assert_eq!(ids(group_by_day(&tasks, "UTC", 1, SortKey::Priority, now)), vec![3, 2, 1]);
        assert_eq!(ids(group_by_day(&tasks, "UTC", 1, SortKey::Due, now)), vec![1, 3, 2]);
        assert_eq!(ids(group_by_day(&tasks, "UTC", 1, SortKey::Name, now)), vec![1, 2, 3]);
    }
}
