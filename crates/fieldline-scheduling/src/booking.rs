//! Concurrency-safe booking (spec §4.8 `book`): acquire a logical lock on
//! `(technician, start)`, give the caller a chance to re-check and persist inside the
//! lock, then release. The in-process lock only serializes concurrent attempts within
//! this instance; the database's `UNIQUE(tenant_id, assigned_worker, scheduled_at)`
//! constraint (fieldline-storage's migration) remains the ultimate source of truth
//! across instances, so a `commit` closure that hits a storage conflict should map it
//! to [`SchedulingError::SlotUnavailable`].

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use fieldline_core::prelude::WorkerId;
use tokio::sync::Mutex;

use crate::error::{Result, SchedulingError};

#[derive(Default)]
pub struct Scheduler {
    locks: DashMap<(WorkerId, DateTime<Utc>), Arc<Mutex<()>>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Book `(technician, start)`. `commit` runs while holding the slot's lock; it
    /// should re-verify availability and persist the booking, returning
    /// `Err(SchedulingError::SlotUnavailable)` if the re-check fails.
    pub async fn book<F, Fut>(&self, technician: WorkerId, start: DateTime<Utc>, commit: F) -> Result<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let lock = self.locks.entry((technician, start)).or_insert_with(|| Arc::new(Mutex::new(()))).clone();
        let _guard = lock.lock().await;
        commit().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    #[tokio::test]
    async fn concurrent_bookings_on_the_same_slot_admit_exactly_one_winner() {
        let scheduler = Arc::new(Scheduler::new());
        let technician = WorkerId::new();
        let start = Utc::now();
        let taken = Arc::new(StdMutex::new(false));
        let successes = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let scheduler = scheduler.clone();
            let taken = taken.clone();
            let successes = successes.clone();
            handles.push(tokio::spawn(async move {
                let result = scheduler
                    .book(technician, start, || async {
                        let mut guard = taken.lock().unwrap();
                        if *guard {
                            return Err(SchedulingError::SlotUnavailable);
                        }
                        *guard = true;
                        Ok(())
                    })
                    .await;
                if result.is_ok() {
                    successes.fetch_add(1, Ordering::SeqCst);
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(successes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn bookings_on_different_slots_do_not_contend() {
        let scheduler = Scheduler::new();
        let technician = WorkerId::new();
        let a = Utc::now();
        let b = a + chrono::Duration::minutes(30);

        let first = scheduler.book(technician, a, || async { Ok(()) }).await;
        let second = scheduler.book(technician, b, || async { Ok(()) }).await;
        assert!(first.is_ok());
        assert!(second.is_ok());
    }
}
