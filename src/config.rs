use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{HorizonError, Result};
use crate::generator::GenerationOptions;
use crate::timezone::resolve_timezone;

pub const DEFAULT_CONFIG_FILE: &str = "horizon.yaml";
pub const DATABASE_ENV: &str = "HORIZON_DB";
const MAX_DAYS: u32 = 366;
const MAX_LOCK_TTL_SECS: u64 = 86_400;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LockConfig {
    pub ttl_secs: u64,
    pub wait_ms: u64,
    /// Directory for lock files; defaults to `<database>.locks`.
    pub dir: Option<PathBuf>,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 30,
            wait_ms: 1000,
            dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub database: PathBuf,
    pub horizon_days: u32,
    pub upcoming_days: u32,
    pub default_timezone: String,
    pub someday_tag: String,
    pub lock: LockConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: PathBuf::from("horizon.db"),
            horizon_days: 7,
            upcoming_days: 7,
            default_timezone: "UTC".to_string(),
            someday_tag: "someday".to_string(),
            lock: LockConfig::default(),
        }
    }
}

impl Config {
    /// Read `path` if it exists, otherwise start from defaults; then apply the
    /// database override from the environment and validate.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let raw = fs::read_to_string(path)?;
            Self::parse(&raw).map_err(|err| match err {
                HorizonError::Yaml(e) => {
                    HorizonError::InvalidConfig(format!("{}: {e}", path.display()))
                }
                other => other,
            })?
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Self::default()
        };

        if let Ok(database) = std::env::var(DATABASE_ENV)
            && !database.trim().is_empty()
        {
            config.database = PathBuf::from(database);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("horizon_days", self.horizon_days),
            ("upcoming_days", self.upcoming_days),
        ] {
            if !(1..=MAX_DAYS).contains(&value) {
                return Err(HorizonError::InvalidConfig(format!(
                    "{field} must be between 1 and {MAX_DAYS}, got {value}"
                )));
            }
        }
        if !(1..=MAX_LOCK_TTL_SECS).contains(&self.lock.ttl_secs) {
            return Err(HorizonError::InvalidConfig(format!(
                "lock.ttl_secs must be between 1 and {MAX_LOCK_TTL_SECS}, got {}",
                self.lock.ttl_secs
            )));
        }
        if self.someday_tag.trim().is_empty() {
            return Err(HorizonError::InvalidConfig("someday_tag cannot be empty".into()));
        }
        // Unknown zones are tolerated here and fall back to UTC when used.
        resolve_timezone(&self.default_timezone);
        Ok(())
    }

    pub fn lock_dir(&self) -> PathBuf {
        self.lock.dir.clone().unwrap_or_else(|| {
            let mut name = self.database.as_os_str().to_owned();
            name.push(".locks");
            PathBuf::from(name)
        })
    }

    pub fn generation_options(&self) -> GenerationOptions {
        GenerationOptions {
            lock_ttl: chrono::Duration::seconds(self.lock.ttl_secs.min(MAX_LOCK_TTL_SECS) as i64),
            lock_wait: std::time::Duration::from_millis(self.lock.wait_ms),
        }
    }
}
