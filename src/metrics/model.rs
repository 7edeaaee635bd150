use chrono::NaiveDate;
use serde::Serialize;

use crate::model::Task;

/// Completions on one local calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DayCount {
    pub date: NaiveDate,
    pub count: usize,
}

/// Dashboard figures for one user, all computed over the tasks they can see.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Metrics {
    pub timezone: String,
    pub total_open_tasks: usize,
    pub pending_over_month: usize,
    pub in_progress: Vec<Task>,
    pub today_plan: Vec<Task>,
    pub due_today: Vec<Task>,
    pub completed_today: Vec<Task>,
    /// Seven entries, oldest first, today last.
    pub weekly_completions: Vec<DayCount>,
    pub suggested_tasks: Vec<Task>,
}

impl Metrics {
    pub fn weekly_total(&self) -> usize {
        self.weekly_completions.iter().map(|day| day.count).sum()
    }
}
