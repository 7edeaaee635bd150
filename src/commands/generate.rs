use serde::Serialize;

use crate::commands::App;
use crate::error::{HorizonError, Result};
use crate::generator::{GenerationOutcome, OccurrenceGenerator};
use crate::output::{self, Format};

#[derive(Debug, Serialize)]
struct GenerateOutput {
    user_id: i64,
    horizon_days: u32,
    #[serde(flatten)]
    outcome: GenerationOutcome,
}

pub fn run(app: &App, user_id: i64, days: Option<u32>, format: Format) -> Result<()> {
    let horizon_days = days.unwrap_or(app.config.horizon_days);
    let outcome = OccurrenceGenerator::new(&app.store, &app.locks, &app.clock)
        .with_options(app.config.generation_options())
        .generate_upcoming(user_id, horizon_days)?;

    output::print_value(
        &GenerateOutput {
            user_id,
            horizon_days,
            outcome,
        },
        format,
    )
}

#[derive(Debug, Serialize)]
struct RuleChangeOutput {
    template_id: i64,
    deleted: usize,
}

/// Clear future occurrences after `template_id`'s rule was edited, then refill
/// the owner's horizon with the new rule.
pub fn rule_changed(app: &App, template_id: i64, format: Format) -> Result<()> {
    let template = app.store.get_task(template_id)?;
    if template.is_occurrence() {
        return Err(HorizonError::InvalidInput(format!(
            "task {template_id} is an occurrence, not a template"
        )));
    }

    let generator = OccurrenceGenerator::new(&app.store, &app.locks, &app.clock)
        .with_options(app.config.generation_options());
    let deleted = generator.apply_recurrence_rule_change(&template)?;
    if template.is_template() {
        generator.generate_upcoming(template.user_id, app.config.horizon_days)?;
    }

    output::print_value(
        &RuleChangeOutput {
            template_id,
            deleted,
        },
        format,
    )
}
