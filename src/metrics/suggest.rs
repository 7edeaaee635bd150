//! Backlog nudges for users with nothing on their plate.

use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::model::{Status, Task};

/// Below this many primary picks, someday-tagged tasks are mixed in.
pub const BACKFILL_THRESHOLD: usize = 6;
/// Hard cap on the suggestion list.
pub const MAX_SUGGESTIONS: usize = 12;

/// Suggestions only appear when the user has little else to look at.
pub fn should_suggest(total_open: usize, in_progress: usize, due_today: usize) -> bool {
    total_open < 3 && in_progress == 0 && due_today == 0
}

/// Priority first, then earliest due date (undated last), then project id.
pub fn backlog_order(a: &Task, b: &Task) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| match (a.due_date, b.due_date) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.project_id.cmp(&b.project_id))
}

/// Rank backlog candidates from `open`, skipping anything in `surfaced`.
///
/// Project-less tasks come before tasks filed under a project. Someday-tagged
/// tasks are held back unless the primary list is short.
pub fn suggest_tasks(
    open: &[Task],
    surfaced: &HashSet<i64>,
    someday_tag: &str,
    now: DateTime<Utc>,
) -> Vec<Task> {
    let (mut someday, candidates): (Vec<&Task>, Vec<&Task>) = open
        .iter()
        .filter(|task| matches!(task.status, Status::NotStarted | Status::Waiting))
        .filter(|task| !surfaced.contains(&task.id))
        .filter(|task| !task.is_deferred(now))
        .partition(|task| task.has_tag(someday_tag));

    let (mut loose, mut filed): (Vec<&Task>, Vec<&Task>) =
        candidates.into_iter().partition(|task| task.project_id.is_none());
    loose.sort_by(|a, b| backlog_order(a, b));
    filed.sort_by(|a, b| backlog_order(a, b));

    let mut picks: Vec<Task> = loose.into_iter().chain(filed).cloned().collect();
    if picks.len() < BACKFILL_THRESHOLD {
        someday.sort_by(|a, b| backlog_order(a, b));
        let room = MAX_SUGGESTIONS.saturating_sub(picks.len());
        picks.extend(someday.into_iter().take(room).cloned());
    }
    picks.truncate(MAX_SUGGESTIONS);
    picks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Priority;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
    }

    fn task(id: i64, priority: Priority) -> Task {
        let mut task = Task::new(1, format!("task {id}"), now());
        task.id = id;
        task.priority = priority;
        task
    }

    fn ids(tasks: &[Task]) -> Vec<i64> {
        tasks.iter().map(|t| t.id).collect()
    }

    #[test]
    fn busy_user_gets_no_suggestions() {
        assert!(!should_suggest(3, 0, 0));
        assert!(!should_suggest(1, 1, 0));
        assert!(!should_suggest(1, 0, 1));
        assert!(should_suggest(2, 0, 0));
    }

    #[test]
    fn loose_tasks_rank_before_project_tasks() {
        let mut filed = task(1, Priority::High);
        filed.project_id = Some(3);
        let loose_low = task(2, Priority::Low);
        let loose_high = task(3, Priority::High);

        let picks = suggest_tasks(
            &[filed, loose_low, loose_high],
            &HashSet::new(),
            "someday",
            now(),
        );
        assert_eq!(ids(&picks), vec![3, 2, 1]);
    }

    #[test]
    fn undated_tasks_sort_after_dated_ones() {
        let undated = task(1, Priority::Medium);
        let mut later = task(2, Priority::Medium);
        later.due_date = Some(now() + chrono::Duration::days(5));
        let mut sooner = task(3, Priority::Medium);
        sooner.due_date = Some(now() + chrono::Duration::days(1));

        let picks = suggest_tasks(&[undated, later, sooner], &HashSet::new(), "someday", now());
        assert_eq!(ids(&picks), vec![3, 2, 1]);
    }

    #[test]
    fn surfaced_in_progress_and_deferred_are_skipped() {
        let surfaced = task(1, Priority::High);
        let mut started = task(2, Priority::High);
        started.status = Status::InProgress;
        let mut deferred = task(3, Priority::High);
        deferred.defer_until = Some(now() + chrono::Duration::days(2));
        let mut waiting = task(4, Priority::Low);
        waiting.status = Status::Waiting;

        let picks = suggest_tasks(
            &[surfaced, started, deferred, waiting],
            &HashSet::from([1]),
            "someday",
            now(),
        );
        assert_eq!(ids(&picks), vec![4]);
    }

    #[test]
    fn someday_pool_backfills_short_lists() {
        let mut open = vec![task(1, Priority::Medium)];
        for id in 10..30 {
            let mut someday = task(id, Priority::Low);
            someday.tags = vec!["Someday".into()];
            open.push(someday);
        }

        let picks = suggest_tasks(&open, &HashSet::from([10]), "someday", now());
        assert_eq!(picks.len(), MAX_SUGGESTIONS);
        assert_eq!(picks[0].id, 1);
        assert!(!ids(&picks).contains(&10));
    }

    #[test]
    fn long_primary_list_skips_someday_pool() {
        let mut open: Vec<Task> = (1..=7).map(|id| task(id, Priority::Medium)).collect();
        let mut someday = task(99, Priority::High);
        someday.tags = vec!["someday".into()];
        open.push(someday);

        let picks = suggest_tasks(&open, &HashSet::new(), "someday", now());
        assert_eq!(picks.len(), 7);
        assert!(!ids(&picks).contains(&99));
    }
}
