use crate::commands::App;
use crate::error::Result;
use crate::grouping::SortKey;
use crate::output::{self, Format};
use crate::views::Views;

fn views(app: &App) -> Views<'_> {
    Views::new(&app.store, &app.locks, &app.clock)
        .with_generation(app.config.generation_options(), app.config.horizon_days)
}

pub fn upcoming(
    app: &App,
    user_id: i64,
    days: Option<u32>,
    timezone: Option<String>,
    order: SortKey,
    format: Format,
) -> Result<()> {
    let timezone = app.timezone_for(user_id, timezone);
    let days = days.unwrap_or(app.config.upcoming_days);
    let groups = views(app).upcoming(user_id, &timezone, days, order);
    output::print_groups(&groups, format)
}

pub fn today(app: &App, user_id: i64, timezone: Option<String>, format: Format) -> Result<()> {
    let timezone = app.timezone_for(user_id, timezone);
    let tasks = views(app).today(user_id, &timezone);
    output::print_tasks(&tasks, format)
}

pub fn overdue(app: &App, user_id: i64, timezone: Option<String>, format: Format) -> Result<()> {
    let timezone = app.timezone_for(user_id, timezone);
    let tasks = views(app).overdue(user_id, &timezone);
    output::print_tasks(&tasks, format)
}
