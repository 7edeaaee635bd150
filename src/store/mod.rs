pub mod index;
pub mod lock;
pub mod query;

pub use index::{ImportSummary, Snapshot, Store, format_ts};
pub use lock::{FileLockProvider, LockProvider, LockToken, MemoryLockProvider, acquire_with_backoff};
pub use query::TaskQuery;
