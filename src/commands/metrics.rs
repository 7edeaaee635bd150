use crate::commands::App;
use crate::error::Result;
use crate::metrics::MetricsAggregator;
use crate::output::{self, Format};

pub fn run(app: &App, user_id: i64, timezone: Option<String>, format: Format) -> Result<()> {
    let timezone = app.timezone_for(user_id, timezone);
    let metrics = MetricsAggregator::new(&app.store, &app.clock)
        .with_someday_tag(app.config.someday_tag.clone())
        .compute(user_id, &timezone);
    output::print_metrics(&metrics, format)
}
