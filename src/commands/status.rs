use crate::cascade::{ParentState, set_status};
use crate::clock::Clock;
use crate::commands::App;
use crate::error::Result;
use crate::model::Status;
use crate::output::{self, Format};

pub fn run(app: &App, task_id: i64, status: Status, format: Format) -> Result<()> {
    let change = set_status(&app.store, task_id, status, app.clock.now())?;
    match format {
        Format::Json => output::print_value(&change, format),
        Format::Pretty | Format::Minimal => {
            output::print_task(&change.task, format)?;
            if let Some(parent) = change.parent {
                let state = match parent.state {
                    ParentState::Open => "open",
                    ParentState::Done => "done",
                };
                println!("parent {} is now {state}", parent.id);
            }
            Ok(())
        }
    }
}
