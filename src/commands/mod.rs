pub mod generate;
pub mod grants;
pub mod import;
pub mod metrics;
pub mod status;
pub mod version;
pub mod views;
pub mod visible;

use crate::clock::SystemClock;
use crate::config::Config;
use crate::error::Result;
use crate::store::{FileLockProvider, Store};

/// Everything a command needs: configuration, an open store, cross-process locks
/// and the wall clock.
pub struct App {
    pub config: Config,
    pub store: Store,
    pub locks: FileLockProvider,
    pub clock: SystemClock,
}

impl App {
    pub fn open(config: Config) -> Result<Self> {
        let store = Store::open(&config.database)?;
        let locks = FileLockProvider::new(config.lock_dir());
        tracing::debug!(database = %config.database.display(), "opened store");
        Ok(Self {
            config,
            store,
            locks,
            clock: SystemClock,
        })
    }

    /// Explicit override, else the user's stored zone, else the configured default.
    pub fn timezone_for(&self, user_id: i64, explicit: Option<String>) -> String {
        if let Some(tz) = explicit {
            return tz;
        }
        match self.store.user_timezone(user_id) {
            Ok(Some(tz)) => tz,
            Ok(None) => self.config.default_timezone.clone(),
            Err(err) => {
                tracing::warn!(user_id, error = %err, "user timezone unavailable, using default");
                self.config.default_timezone.clone()
            }
        }
    }
}
