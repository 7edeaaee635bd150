use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use serde::{Deserialize, Serialize};

use crate::error::{HorizonError, Result};
use crate::model::{
    AccessLevel, PermissionGrant, Priority, Project, RecurrenceRule, ResourceType, Task,
    UserProfile,
};
use crate::store::query::TaskQuery;
use crate::visibility::Predicate;

const TAG_SEPARATOR: char = '\u{1f}';

const TASK_COLUMNS: &str = "t.id, t.external_id, t.name, t.description, t.status, t.priority,
    t.due_date, t.defer_until, t.completed_at, t.user_id, t.project_id, t.parent_task_id,
    t.today_flag, t.recurrence_type, t.recurrence_interval, t.recurrence_weekday,
    t.recurrence_end_date, t.recurring_parent_id, t.created_at, t.updated_at,
    (SELECT group_concat(tg.tag, char(31)) FROM tags tg WHERE tg.task_id = t.id),
    t.occurrence_date";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Users, projects, tasks and grants to load in one go.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub users: Vec<UserProfile>,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub grants: Vec<PermissionGrant>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub users: usize,
    pub projects: usize,
    pub tasks: usize,
    pub grants: usize,
}

pub struct Store {
    conn: Connection,
}

/// RFC 3339 UTC with fixed millisecond precision, so text order is time order.
pub fn format_ts(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn parse_opt_ts(idx: usize, raw: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    raw.map(|value| parse_ts(idx, &value)).transpose()
}

fn parse_opt_date(idx: usize, raw: Option<String>) -> rusqlite::Result<Option<NaiveDate>> {
    raw.map(|value| {
        NaiveDate::parse_from_str(&value, DATE_FORMAT).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
    })
    .transpose()
}

fn parse_enum<T>(idx: usize, raw: &str) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = HorizonError>,
{
    raw.parse::<T>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    let status: String = row.get(4)?;
    let recurrence_type: String = row.get(13)?;
    let weekday: Option<i64> = row.get(15)?;
    let end_date = parse_opt_date(16, row.get(16)?)?;
    let created_at: String = row.get(18)?;
    let updated_at: String = row.get(19)?;
    let tags: Option<String> = row.get(20)?;

    Ok(Task {
        id: row.get(0)?,
        external_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        status: parse_enum(4, &status)?,
        priority: Priority::from_rank(row.get(5)?),
        due_date: parse_opt_ts(6, row.get(6)?)?,
        defer_until: parse_opt_ts(7, row.get(7)?)?,
        completed_at: parse_opt_ts(8, row.get(8)?)?,
        user_id: row.get(9)?,
        project_id: row.get(10)?,
        parent_task_id: row.get(11)?,
        today_flag: row.get(12)?,
        tags: tags
            .map(|joined| {
                let mut tags: Vec<String> =
                    joined.split(TAG_SEPARATOR).map(str::to_string).collect();
                tags.sort();
                tags
            })
            .unwrap_or_default(),
        recurrence: RecurrenceRule {
            kind: parse_enum(13, &recurrence_type)?,
            interval: row.get(14)?,
            weekday: weekday.and_then(|w| u8::try_from(w).ok()),
            end_date,
        },
        recurring_parent_id: row.get(17)?,
        occurrence_date: parse_opt_date(21, row.get(21)?)?,
        created_at: parse_ts(18, &created_at)?,
        updated_at: parse_ts(19, &updated_at)?,
    })
}

fn project_from_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        due_date: parse_opt_ts(3, row.get(3)?)?,
    })
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        let store = Self { conn };
        store.create_tables()?;
        Ok(store)
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let store = Self { conn };
        store.create_tables()?;
        Ok(store)
    }

    fn create_tables(&self) -> Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                timezone TEXT NOT NULL DEFAULT 'UTC',
                locale TEXT
            );
            CREATE TABLE IF NOT EXISTS projects (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                due_date TEXT
            );
            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY,
                external_id TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                description TEXT,
                status TEXT NOT NULL DEFAULT 'not_started',
                priority INTEGER NOT NULL DEFAULT 1,
                due_date TEXT,
                defer_until TEXT,
                completed_at TEXT,
                user_id INTEGER NOT NULL,
                project_id INTEGER,
                parent_task_id INTEGER,
                today_flag INTEGER NOT NULL DEFAULT 0,
                recurrence_type TEXT NOT NULL DEFAULT 'none',
                recurrence_interval INTEGER NOT NULL DEFAULT 1,
                recurrence_weekday INTEGER,
                recurrence_end_date TEXT,
                recurring_parent_id INTEGER,
                occurrence_date TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS tags (
                task_id INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
                tag TEXT NOT NULL,
                PRIMARY KEY (task_id, tag)
            );
            CREATE TABLE IF NOT EXISTS permissions (
                resource_type TEXT NOT NULL,
                resource_id INTEGER NOT NULL,
                grantee_id INTEGER NOT NULL,
                access_level TEXT NOT NULL,
                grantor_id INTEGER NOT NULL,
                PRIMARY KEY (resource_type, resource_id, grantee_id)
            );
            CREATE INDEX IF NOT EXISTS idx_tasks_user ON tasks(user_id);
            CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);
            CREATE INDEX IF NOT EXISTS idx_tasks_due ON tasks(due_date);
            CREATE INDEX IF NOT EXISTS idx_tasks_parent ON tasks(parent_task_id);
            CREATE INDEX IF NOT EXISTS idx_permissions_grantee
                ON permissions(grantee_id, resource_type);",
        )?;
        self.ensure_occurrence_date_column()?;
        self.conn.execute_batch(
            "DROP INDEX IF EXISTS idx_occurrence_unique;
            CREATE UNIQUE INDEX IF NOT EXISTS idx_occurrence_day
                ON tasks(recurring_parent_id, occurrence_date)
                WHERE recurring_parent_id IS NOT NULL;",
        )?;
        Ok(())
    }

    // Databases created before occurrences carried their local day lack the column.
    fn ensure_occurrence_date_column(&self) -> Result<()> {
        let mut stmt = self.conn.prepare("PRAGMA table_info(tasks)")?;
        let columns = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        if !columns.iter().any(|c| c == "occurrence_date") {
            self.conn
                .execute("ALTER TABLE tasks ADD COLUMN occurrence_date TEXT", [])?;
        }
        Ok(())
    }

    pub fn upsert_user(&self, user: &UserProfile) -> Result<()> {
        self.conn.execute(
            "INSERT INTO users (id, timezone, locale) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET timezone = excluded.timezone, locale = excluded.locale",
            params![user.id, user.timezone, user.locale],
        )?;
        Ok(())
    }

    pub fn user(&self, id: i64) -> Result<Option<UserProfile>> {
        let user = self
            .conn
            .query_row(
                "SELECT id, timezone, locale FROM users WHERE id = ?1",
                params![id],
                |row| {
                    Ok(UserProfile {
                        id: row.get(0)?,
                        timezone: row.get(1)?,
                        locale: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }

    pub fn user_timezone(&self, id: i64) -> Result<Option<String>> {
        Ok(self.user(id)?.map(|user| user.timezone))
    }

    pub fn upsert_project(&self, project: &Project) -> Result<i64> {
        if project.id == 0 {
            self.conn.execute(
                "INSERT INTO projects (user_id, name, due_date) VALUES (?1, ?2, ?3)",
                params![project.user_id, project.name, project.due_date.map(format_ts)],
            )?;
            return Ok(self.conn.last_insert_rowid());
        }
        self.conn.execute(
            "INSERT OR REPLACE INTO projects (id, user_id, name, due_date) VALUES (?1, ?2, ?3, ?4)",
            params![
                project.id,
                project.user_id,
                project.name,
                project.due_date.map(format_ts)
            ],
        )?;
        Ok(project.id)
    }

    pub fn get_project(&self, id: i64) -> Result<Project> {
        self.conn
            .query_row(
                "SELECT id, user_id, name, due_date FROM projects WHERE id = ?1",
                params![id],
                project_from_row,
            )
            .optional()?
            .ok_or(HorizonError::ProjectNotFound(id))
    }

    pub fn query_projects(&self, visibility: &Predicate) -> Result<Vec<Project>> {
        let (clause, params) = visibility.to_sql("t");
        let sql = format!(
            "SELECT t.id, t.user_id, t.name, t.due_date FROM projects t WHERE {clause} ORDER BY t.id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let projects = stmt
            .query_map(params_from_iter(params), project_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(projects)
    }

    pub fn project_due_dates(&self, ids: &[i64]) -> Result<HashMap<i64, DateTime<Utc>>> {
        let mut due = HashMap::new();
        if ids.is_empty() {
            return Ok(due);
        }
        let sql = format!(
            "SELECT id, due_date FROM projects WHERE due_date IS NOT NULL AND id IN ({})",
            vec!["?"; ids.len()].join(", ")
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(ids.iter()), |row| {
            let raw: String = row.get(1)?;
            Ok((row.get::<_, i64>(0)?, parse_ts(1, &raw)?))
        })?;
        for row in rows {
            let (id, date) = row?;
            due.insert(id, date);
        }
        Ok(due)
    }

    fn write_task_row(&self, sql: &str, task: &Task) -> Result<usize> {
        let written = self.conn.execute(
            sql,
            params![
                if task.id == 0 { None } else { Some(task.id) },
                task.external_id,
                task.name,
                task.description,
                task.status.as_str(),
                task.priority.rank(),
                task.due_date.map(format_ts),
                task.defer_until.map(format_ts),
                task.completed_at.map(format_ts),
                task.user_id,
                task.project_id,
                task.parent_task_id,
                task.today_flag,
                task.recurrence.kind.as_str(),
                task.recurrence.interval,
                task.recurrence.weekday.map(i64::from),
                task.recurrence.end_date.map(|d| d.format(DATE_FORMAT).to_string()),
                task.recurring_parent_id,
                format_ts(task.created_at),
                format_ts(task.updated_at),
                task.occurrence_date.map(|d| d.format(DATE_FORMAT).to_string()),
            ],
        )?;
        Ok(written)
    }

    fn replace_tags(&self, task_id: i64, tags: &[String]) -> Result<()> {
        self.conn
            .execute("DELETE FROM tags WHERE task_id = ?1", params![task_id])?;
        for tag in tags {
            self.conn.execute(
                "INSERT OR IGNORE INTO tags (task_id, tag) VALUES (?1, ?2)",
                params![task_id, tag],
            )?;
        }
        Ok(())
    }

    /// Insert a task, returning its id. A zero id lets the database assign one.
    pub fn insert_task(&self, task: &Task) -> Result<i64> {
        let tx = self.conn.unchecked_transaction()?;
        let id = self.insert_task_row(task)?;
        tx.commit()?;
        Ok(id)
    }

    fn insert_task_row(&self, task: &Task) -> Result<i64> {
        let mut task = task.clone();
        task.normalize();
        self.write_task_row(
            "INSERT INTO tasks (id, external_id, name, description, status, priority, due_date,
                defer_until, completed_at, user_id, project_id, parent_task_id, today_flag,
                recurrence_type, recurrence_interval, recurrence_weekday, recurrence_end_date,
                recurring_parent_id, created_at, updated_at, occurrence_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)",
            &task,
        )?;
        let id = self.conn.last_insert_rowid();
        self.replace_tags(id, &task.tags)?;
        Ok(id)
    }

    /// Insert a generated occurrence unless the template already has one for the
    /// same local day. Returns whether a row was written.
    pub fn insert_occurrence(&self, occurrence: &Task) -> Result<bool> {
        if occurrence.occurrence_date.is_none() {
            return Err(HorizonError::InvalidInput(
                "occurrence is missing its occurrence date".into(),
            ));
        }
        let mut occurrence = occurrence.clone();
        occurrence.normalize();
        let tx = self.conn.unchecked_transaction()?;
        let written = self.write_task_row(
            "INSERT OR IGNORE INTO tasks (id, external_id, name, description, status, priority, due_date,
                defer_until, completed_at, user_id, project_id, parent_task_id, today_flag,
                recurrence_type, recurrence_interval, recurrence_weekday, recurrence_end_date,
                recurring_parent_id, created_at, updated_at, occurrence_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)",
            &occurrence,
        )?;
        if written == 0 {
            return Ok(false);
        }
        let id = self.conn.last_insert_rowid();
        self.replace_tags(id, &occurrence.tags)?;
        tx.commit()?;
        Ok(true)
    }

    pub fn update_task(&self, task: &Task) -> Result<()> {
        let mut task = task.clone();
        task.normalize();
        let tx = self.conn.unchecked_transaction()?;
        let written = self.conn.execute(
            "UPDATE tasks SET name = ?2, description = ?3, status = ?4, priority = ?5,
                due_date = ?6, defer_until = ?7, completed_at = ?8, project_id = ?9,
                parent_task_id = ?10, today_flag = ?11, recurrence_type = ?12,
                recurrence_interval = ?13, recurrence_weekday = ?14, recurrence_end_date = ?15,
                recurring_parent_id = ?16, updated_at = ?17, occurrence_date = ?18
             WHERE id = ?1",
            params![
                task.id,
                task.name,
                task.description,
                task.status.as_str(),
                task.priority.rank(),
                task.due_date.map(format_ts),
                task.defer_until.map(format_ts),
                task.completed_at.map(format_ts),
                task.project_id,
                task.parent_task_id,
                task.today_flag,
                task.recurrence.kind.as_str(),
                task.recurrence.interval,
                task.recurrence.weekday.map(i64::from),
                task.recurrence.end_date.map(|d| d.format(DATE_FORMAT).to_string()),
                task.recurring_parent_id,
                format_ts(task.updated_at),
                task.occurrence_date.map(|d| d.format(DATE_FORMAT).to_string()),
            ],
        )?;
        if written == 0 {
            return Err(HorizonError::TaskNotFound(task.id));
        }
        self.replace_tags(task.id, &task.tags)?;
        tx.commit()?;
        Ok(())
    }

    pub fn get_task(&self, id: i64) -> Result<Task> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks t WHERE t.id = ?1");
        self.conn
            .query_row(&sql, params![id], task_from_row)
            .optional()?
            .ok_or(HorizonError::TaskNotFound(id))
    }

    fn select_tasks(&self, where_clause: &str, params: Vec<rusqlite::types::Value>) -> Result<Vec<Task>> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks t WHERE {where_clause} ORDER BY t.id");
        let mut stmt = self.conn.prepare(&sql)?;
        let tasks = stmt
            .query_map(params_from_iter(params), task_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    /// Run a composed query. Results come back in insertion order.
    pub fn query_tasks(&self, query: &TaskQuery) -> Result<Vec<Task>> {
        let (clause, params) = query.compile();
        self.select_tasks(&clause, params)
    }

    pub fn children_of(&self, parent_id: i64) -> Result<Vec<Task>> {
        self.select_tasks(
            "t.parent_task_id = ?",
            vec![rusqlite::types::Value::Integer(parent_id)],
        )
    }

    /// Top-level tasks owned by `user_id` that carry an active rule.
    pub fn templates_for_user(&self, user_id: i64) -> Result<Vec<Task>> {
        self.select_tasks(
            "t.user_id = ? AND t.recurrence_type != 'none'
             AND t.recurring_parent_id IS NULL AND t.parent_task_id IS NULL",
            vec![rusqlite::types::Value::Integer(user_id)],
        )
    }

    pub fn occurrences_of(&self, template_id: i64) -> Result<Vec<Task>> {
        self.select_tasks(
            "t.recurring_parent_id = ?",
            vec![rusqlite::types::Value::Integer(template_id)],
        )
    }

    pub fn occurrence_count(&self, template_id: i64) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM tasks WHERE recurring_parent_id = ?1",
            params![template_id],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Delete occurrences of `template_id` due strictly after `after`.
    pub fn delete_future_occurrences(&self, template_id: i64, after: DateTime<Utc>) -> Result<usize> {
        let deleted = self.conn.execute(
            "DELETE FROM tasks WHERE recurring_parent_id = ?1 AND due_date > ?2",
            params![template_id, format_ts(after)],
        )?;
        Ok(deleted)
    }

    pub fn grant(&self, grant: &PermissionGrant) -> Result<()> {
        self.conn.execute(
            "INSERT INTO permissions (resource_type, resource_id, grantee_id, access_level, grantor_id)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(resource_type, resource_id, grantee_id)
             DO UPDATE SET access_level = excluded.access_level, grantor_id = excluded.grantor_id",
            params![
                grant.resource_type.as_str(),
                grant.resource_id,
                grant.grantee_id,
                grant.access_level.as_str(),
                grant.grantor_id,
            ],
        )?;
        Ok(())
    }

    pub fn revoke(&self, resource_type: ResourceType, resource_id: i64, grantee_id: i64) -> Result<bool> {
        let removed = self.conn.execute(
            "DELETE FROM permissions WHERE resource_type = ?1 AND resource_id = ?2 AND grantee_id = ?3",
            params![resource_type.as_str(), resource_id, grantee_id],
        )?;
        Ok(removed > 0)
    }

    pub fn grants_for(&self, grantee_id: i64) -> Result<Vec<PermissionGrant>> {
        let mut stmt = self.conn.prepare(
            "SELECT resource_type, resource_id, grantee_id, access_level, grantor_id
             FROM permissions WHERE grantee_id = ?1 ORDER BY resource_type, resource_id",
        )?;
        let grants = stmt
            .query_map(params![grantee_id], |row| {
                let resource_type: String = row.get(0)?;
                let access_level: String = row.get(3)?;
                Ok(PermissionGrant {
                    resource_type: parse_enum::<ResourceType>(0, &resource_type)?,
                    resource_id: row.get(1)?,
                    grantee_id: row.get(2)?,
                    access_level: parse_enum::<AccessLevel>(3, &access_level)?,
                    grantor_id: row.get(4)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(grants)
    }

    /// Load a snapshot. Tasks keep their ids so grants and parents can refer to them.
    pub fn import(&self, snapshot: &Snapshot) -> Result<ImportSummary> {
        let tx = self.conn.unchecked_transaction()?;
        for user in &snapshot.users {
            self.upsert_user(user)?;
        }
        for project in &snapshot.projects {
            self.upsert_project(project)?;
        }
        for task in &snapshot.tasks {
            if task.is_occurrence() && task.recurrence.is_active() {
                return Err(HorizonError::InvalidRecurrenceRule(format!(
                    "occurrence '{}' cannot carry its own rule",
                    task.name
                )));
            }
            crate::recurrence::validate_rule(&task.recurrence)?;
            self.insert_task_row(task)?;
        }
        for grant in &snapshot.grants {
            self.grant(grant)?;
        }
        tx.commit()?;
        Ok(ImportSummary {
            users: snapshot.users.len(),
            projects: snapshot.projects.len(),
            tasks: snapshot.tasks.len(),
            grants: snapshot.grants.len(),
        })
    }
}
