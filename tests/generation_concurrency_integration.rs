use std::path::Path;
use std::sync::{Arc, Barrier};
use std::thread;

use chrono::{DateTime, Utc};
use horizon::clock::FixedClock;
use horizon::generator::{GenerationOptions, OccurrenceGenerator};
use horizon::model::{RecurrenceType, Task, UserProfile};
use horizon::store::{FileLockProvider, LockProvider, MemoryLockProvider, Store};
use tempfile::tempdir;

fn ts(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .unwrap()
        .with_timezone(&Utc)
}

fn seed(db: &Path) -> i64 {
    let store = Store::open(db).unwrap();
    store
        .upsert_user(&UserProfile {
            id: 1,
            timezone: "Europe/Berlin".into(),
            locale: None,
        })
        .unwrap();
    let mut template = Task::new(1, "Inbox zero", ts("2026-03-01T08:00:00Z"));
    template.due_date = Some(ts("2026-03-01T16:00:00Z"));
    template.recurrence.kind = RecurrenceType::Daily;
    store.insert_task(&template).unwrap()
}

fn race<F>(db: &Path, clock: Arc<FixedClock>, provider_for: F) -> usize
where
    F: Fn(usize) -> Arc<dyn LockProvider>,
{
    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = (0..2)
        .map(|worker| {
            let db = db.to_path_buf();
            let clock = clock.clone();
            let barrier = barrier.clone();
            let locks = provider_for(worker);
            thread::spawn(move || {
                let store = Store::open(&db).unwrap();
                barrier.wait();
                OccurrenceGenerator::new(&store, locks.as_ref(), clock.as_ref())
                    .with_options(GenerationOptions {
                        lock_ttl: chrono::Duration::seconds(30),
                        lock_wait: std::time::Duration::from_millis(2000),
                    })
                    .generate_upcoming(1, 7)
                    .unwrap()
                    .created()
            })
        })
        .collect();

    handles.into_iter().map(|h| h.join().unwrap()).sum()
}

#[test]
fn concurrent_generation_with_shared_lock_creates_each_date_once() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("horizon.db");
    let template_id = seed(&db);
    let clock = Arc::new(FixedClock::new(ts("2026-03-10T09:00:00Z")));
    let shared: Arc<dyn LockProvider> = Arc::new(MemoryLockProvider::new(clock.clone()));

    let created = race(&db, clock.clone(), |_| shared.clone());

    let store = Store::open(&db).unwrap();
    assert_eq!(created, 8);
    assert_eq!(store.occurrence_count(template_id).unwrap(), 8);
}

#[test]
fn concurrent_generation_with_file_locks_creates_each_date_once() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("horizon.db");
    let template_id = seed(&db);
    let clock = Arc::new(FixedClock::new(ts("2026-03-10T09:00:00Z")));
    let lock_dir = dir.path().join("locks");

    // Separate providers on one directory behave like two processes.
    let created = race(&db, clock.clone(), |_| {
        Arc::new(FileLockProvider::new(lock_dir.clone())) as Arc<dyn LockProvider>
    });

    let store = Store::open(&db).unwrap();
    assert_eq!(created, 8);
    assert_eq!(store.occurrence_count(template_id).unwrap(), 8);
}

#[test]
fn storage_dedup_holds_even_when_locks_do_not_overlap() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("horizon.db");
    let template_id = seed(&db);
    let clock = Arc::new(FixedClock::new(ts("2026-03-10T09:00:00Z")));

    // Each worker has its own lock table, as after a lease expired mid-pass.
    let created = race(&db, clock.clone(), |_| {
        Arc::new(MemoryLockProvider::new(clock.clone())) as Arc<dyn LockProvider>
    });

    let store = Store::open(&db).unwrap();
    assert_eq!(created, 8);
    assert_eq!(store.occurrence_count(template_id).unwrap(), 8);

    let again = race(&db, clock, |_| {
        Arc::new(MemoryLockProvider::default()) as Arc<dyn LockProvider>
    });
    assert_eq!(again, 0);
    assert_eq!(store.occurrence_count(template_id).unwrap(), 8);
}
