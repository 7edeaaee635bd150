use thiserror::Error;

#[derive(Debug, Error)]
pub enum HorizonError {
    #[error("unknown timezone '{0}'")]
    InvalidTimezone(String),

    #[error("generation lock unavailable: {0}")]
    LockUnavailable(String),

    #[error("invalid recurrence rule: {0}")]
    InvalidRecurrenceRule(String),

    #[error("permission store unavailable: {0}")]
    PermissionStoreUnavailable(String),

    #[error("occurrence of template {parent} due {due} already exists")]
    OccurrenceConflict { parent: i64, due: String },

    #[error("task {0} not found")]
    TaskNotFound(i64),

    #[error("project {0} not found")]
    ProjectNotFound(i64),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
}

impl HorizonError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidTimezone(_) => "invalid_timezone",
            Self::LockUnavailable(_) => "lock_unavailable",
            Self::InvalidRecurrenceRule(_) => "invalid_recurrence_rule",
            Self::PermissionStoreUnavailable(_) => "permission_store_unavailable",
            Self::OccurrenceConflict { .. } => "occurrence_conflict",
            Self::TaskNotFound(_) => "task_not_found",
            Self::ProjectNotFound(_) => "project_not_found",
            Self::InvalidConfig(_) => "invalid_config",
            Self::InvalidInput(_) => "invalid_input",
            Self::Io(_) => "io_error",
            Self::Json(_) => "json_error",
            Self::Yaml(_) => "yaml_error",
            Self::Db(_) => "db_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, HorizonError>;
