//! Lease-based mutual exclusion for occurrence generation.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use fs2::FileExt;
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::error::{HorizonError, Result};

/// Proof of holding a lease on `key` until `expires_at`.
#[derive(Debug)]
pub struct LockToken {
    pub key: String,
    pub id: Uuid,
    pub expires_at: DateTime<Utc>,
    handle: Option<File>,
}

pub trait LockProvider: Send + Sync {
    /// Take the lease on `key` for `ttl`, or return None if someone else holds it.
    fn try_acquire(&self, key: &str, ttl: Duration) -> Result<Option<LockToken>>;

    /// Give the lease back. Releasing a lease that already expired is not an error.
    fn release(&self, token: LockToken) -> Result<()>;
}

/// Retry `try_acquire` with exponential backoff (1ms doubling) until `wait` is spent.
pub fn acquire_with_backoff(
    provider: &dyn LockProvider,
    key: &str,
    ttl: Duration,
    wait: std::time::Duration,
) -> Result<Option<LockToken>> {
    let started = std::time::Instant::now();
    let mut delay = std::time::Duration::from_millis(1);

    loop {
        if let Some(token) = provider.try_acquire(key, ttl)? {
            return Ok(Some(token));
        }
        let elapsed = started.elapsed();
        if elapsed >= wait {
            return Ok(None);
        }
        std::thread::sleep(delay.min(wait - elapsed));
        delay *= 2;
    }
}

#[derive(Debug, Clone, Copy)]
struct Lease {
    id: Uuid,
    expires_at: DateTime<Utc>,
}

/// In-process lease table. Expired leases are taken over by the next caller.
pub struct MemoryLockProvider {
    clock: Arc<dyn Clock>,
    leases: Mutex<HashMap<String, Lease>>,
}

impl MemoryLockProvider {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            leases: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_held(&self, key: &str) -> bool {
        let now = self.clock.now();
        self.leases
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .is_some_and(|lease| lease.expires_at > now)
    }
}

impl Default for MemoryLockProvider {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl LockProvider for MemoryLockProvider {
    fn try_acquire(&self, key: &str, ttl: Duration) -> Result<Option<LockToken>> {
        let now = self.clock.now();
        let mut leases = self.leases.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(existing) = leases.get(key)
            && existing.expires_at > now
        {
            return Ok(None);
        }

        let lease = Lease {
            id: Uuid::new_v4(),
            expires_at: now + ttl,
        };
        leases.insert(key.to_string(), lease);
        Ok(Some(LockToken {
            key: key.to_string(),
            id: lease.id,
            expires_at: lease.expires_at,
            handle: None,
        }))
    }

    fn release(&self, token: LockToken) -> Result<()> {
        let mut leases = self.leases.lock().unwrap_or_else(|e| e.into_inner());
        match leases.get(&token.key) {
            Some(current) if current.id == token.id => {
                leases.remove(&token.key);
            }
            _ => {
                tracing::debug!(key = %token.key, "lease expired before release");
            }
        }
        Ok(())
    }
}

/// Advisory file locks, one file per key. The OS drops the lease if the holder dies.
///
/// The lease lasts as long as the holder keeps the file locked: `ttl` is written
/// into the lock file for inspection but is never enforced, so a holder that hangs
/// without exiting blocks the key until its process ends.
pub struct FileLockProvider {
    dir: PathBuf,
}

impl FileLockProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{name}.lock"))
    }
}

impl LockProvider for FileLockProvider {
    fn try_acquire(&self, key: &str, ttl: Duration) -> Result<Option<LockToken>> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        if file.try_lock_exclusive().is_err() {
            return Ok(None);
        }

        let id = Uuid::new_v4();
        let expires_at = Utc::now() + ttl;
        file.set_len(0)?;
        writeln!(file, "{id} {}", expires_at.to_rfc3339())?;

        Ok(Some(LockToken {
            key: key.to_string(),
            id,
            expires_at,
            handle: Some(file),
        }))
    }

    fn release(&self, mut token: LockToken) -> Result<()> {
        let Some(file) = token.handle.take() else {
            return Err(HorizonError::LockUnavailable(format!(
                "token for '{}' was not issued by a file lock",
                token.key
            )));
        };
        FileExt::unlock(&file)?;
        Ok(())
    }
}
