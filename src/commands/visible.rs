use crate::commands::App;
use crate::error::{HorizonError, Result};
use crate::model::ResourceType;
use crate::output::{self, Format};
use crate::store::TaskQuery;
use crate::visibility::{fetch_visible, visibility_predicate};

pub fn run(app: &App, user_id: i64, resource: ResourceType, format: Format) -> Result<()> {
    match resource {
        ResourceType::Task => {
            let tasks = fetch_visible(&app.store, &TaskQuery::visible_to(user_id));
            output::print_tasks(&tasks, format)
        }
        ResourceType::Project => {
            let predicate = visibility_predicate(ResourceType::Project, user_id);
            let projects = app.store.query_projects(&predicate).unwrap_or_else(|err| {
                let err = HorizonError::PermissionStoreUnavailable(err.to_string());
                tracing::warn!(user_id, error = %err, "project visibility failed closed");
                Vec::new()
            });
            output::print_projects(&projects, format)
        }
    }
}
