//! Ownership-or-grant visibility filter shared by every list and metrics query.

use rusqlite::types::Value;

use crate::error::HorizonError;
use crate::model::{PermissionGrant, ResourceType, Task};
use crate::store::{Store, TaskQuery};

/// Declarative "which resources may this user see" filter.
///
/// Building a predicate does no I/O. It compiles into a single SQL clause that
/// joins the permission table once per query, so it composes with any other
/// filter without per-row permission lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Owned by `user_id`, or shared with them at any access level.
    OwnedOrGranted {
        resource_type: ResourceType,
        user_id: i64,
    },
    /// Matches nothing. Used whenever visibility cannot be established.
    DenyAll,
}

pub fn visibility_predicate(resource_type: ResourceType, user_id: i64) -> Predicate {
    Predicate::OwnedOrGranted {
        resource_type,
        user_id,
    }
}

impl Predicate {
    /// SQL boolean expression over the row alias `alias`, with its parameters.
    pub fn to_sql(&self, alias: &str) -> (String, Vec<Value>) {
        match self {
            Self::DenyAll => ("0 = 1".to_string(), vec![]),
            Self::OwnedOrGranted {
                resource_type,
                user_id,
            } => (
                format!(
                    "({alias}.user_id = ? OR {alias}.id IN (
                        SELECT pg.resource_id FROM permissions pg
                        WHERE pg.resource_type = ? AND pg.grantee_id = ?
                    ))"
                ),
                vec![
                    Value::Integer(*user_id),
                    Value::Text(resource_type.as_str().to_string()),
                    Value::Integer(*user_id),
                ],
            ),
        }
    }

    /// Evaluate against a single resource using grants already in hand.
    pub fn matches(&self, owner_id: i64, resource_id: i64, grants: &[PermissionGrant]) -> bool {
        match self {
            Self::DenyAll => false,
            Self::OwnedOrGranted {
                resource_type,
                user_id,
            } => {
                owner_id == *user_id
                    || grants.iter().any(|grant| {
                        grant.resource_type == *resource_type
                            && grant.resource_id == resource_id
                            && grant.grantee_id == *user_id
                    })
            }
        }
    }

    pub fn matches_task(&self, task: &Task, grants: &[PermissionGrant]) -> bool {
        self.matches(task.user_id, task.id, grants)
    }
}

/// Run `query`, hiding everything when the store cannot answer.
pub fn fetch_visible(store: &Store, query: &TaskQuery) -> Vec<Task> {
    match store.query_tasks(query) {
        Ok(tasks) => tasks,
        Err(err) => {
            let err = HorizonError::PermissionStoreUnavailable(err.to_string());
            tracing::warn!(error = %err, code = err.code(), "visibility failed closed");
            Vec::new()
        }
    }
}
