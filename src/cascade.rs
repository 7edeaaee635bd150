//! Parent/child completion cascade.
//!
//! A parent task is either open or done. The caller that changes a subtask's
//! status invokes these transitions explicitly; nothing is inferred behind its back.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::model::{Status, Task};
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentState {
    Open,
    Done,
}

impl ParentState {
    pub fn of(task: &Task) -> Self {
        if task.status == Status::Done {
            Self::Done
        } else {
            Self::Open
        }
    }
}

/// Open -> Done once every child is done. A parent without children stays put.
pub fn complete_parent_if_all_children_done(
    parent: &mut Task,
    children: &[Task],
    now: DateTime<Utc>,
) -> bool {
    if ParentState::of(parent) == ParentState::Done || children.is_empty() {
        return false;
    }
    if children.iter().all(|child| child.status == Status::Done) {
        return parent.transition_to(Status::Done, now);
    }
    false
}

/// Done -> Open as soon as any child is no longer done.
pub fn reopen_parent_if_any_child_reopened(
    parent: &mut Task,
    children: &[Task],
    now: DateTime<Utc>,
) -> bool {
    if ParentState::of(parent) == ParentState::Open {
        return false;
    }
    if children.iter().any(|child| child.status != Status::Done) {
        return parent.transition_to(Status::NotStarted, now);
    }
    false
}

/// What happened when a status change was applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusChange {
    pub task: Task,
    pub changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<ParentTransition>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParentTransition {
    pub id: i64,
    pub state: ParentState,
}

/// Move `task_id` to `status`, then run the matching cascade on its parent.
pub fn set_status(store: &Store, task_id: i64, status: Status, now: DateTime<Utc>) -> Result<StatusChange> {
    let mut task = store.get_task(task_id)?;
    let changed = task.transition_to(status, now);
    if !changed {
        return Ok(StatusChange {
            task,
            changed,
            parent: None,
        });
    }
    store.update_task(&task)?;

    let mut parent_transition = None;
    if let Some(parent_id) = task.parent_task_id {
        let mut parent = store.get_task(parent_id)?;
        let children = store.children_of(parent_id)?;
        let moved = if status == Status::Done {
            complete_parent_if_all_children_done(&mut parent, &children, now)
        } else {
            reopen_parent_if_any_child_reopened(&mut parent, &children, now)
        };
        if moved {
            store.update_task(&parent)?;
            tracing::info!(task_id, parent_id, state = ?ParentState::of(&parent), "parent cascaded");
            parent_transition = Some(ParentTransition {
                id: parent_id,
                state: ParentState::of(&parent),
            });
        }
    }

    Ok(StatusChange {
        task,
        changed,
        parent: parent_transition,
    })
}
