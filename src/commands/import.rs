use std::fs;
use std::io::Read;

use crate::commands::App;
use crate::error::{HorizonError, Result};
use crate::output::{self, Format};
use crate::store::Snapshot;

fn read_source(source: &str) -> Result<String> {
    if source == "-" {
        let mut contents = String::new();
        std::io::stdin().read_to_string(&mut contents)?;
        return Ok(contents);
    }
    Ok(fs::read_to_string(source)?)
}

/// JSON for `.json` files, YAML for everything else (stdin included).
pub fn parse_snapshot(source: &str, raw: &str) -> Result<Snapshot> {
    if raw.trim().is_empty() {
        return Err(HorizonError::InvalidInput(format!("source '{source}' is empty")));
    }
    if source.ends_with(".json") {
        return serde_json::from_str(raw).map_err(|err| {
            HorizonError::InvalidInput(format!("failed to parse '{source}' as JSON: {err}"))
        });
    }
    serde_yaml::from_str(raw).map_err(|err| {
        HorizonError::InvalidInput(format!("failed to parse '{source}' as YAML: {err}"))
    })
}

pub fn run(app: &App, source: &str, format: Format) -> Result<()> {
    let raw = read_source(source)?;
    let snapshot = parse_snapshot(source, &raw)?;
    let summary = app.store.import(&snapshot)?;
    tracing::info!(
        users = summary.users,
        projects = summary.projects,
        tasks = summary.tasks,
        grants = summary.grants,
        "imported snapshot"
    );
    output::print_value(&summary, format)
}
