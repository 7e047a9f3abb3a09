//! Bounded pool of reusable scan workers.
//!
//! The pool is the only cross-request shared mutable resource in the crate.
//! All handle-list mutation happens synchronously under one lock; a worker in
//! `Occupied` state is an exclusive lease until released. Acquire fails fast
//! on exhaustion instead of queueing.

use crate::error::{LineSeekError, Result};
use crate::worker::scan_worker::ScanWorker;
use crate::worker::{WorkerKind, WorkerState};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Bounded set of reusable worker handles, one list per [`WorkerKind`].
#[derive(Debug)]
pub struct WorkerPool {
    max_workers: usize,
    inner: Mutex<PoolInner>,
}

#[derive(Debug)]
struct PoolInner {
    workers: HashMap<WorkerKind, Vec<Arc<ScanWorker>>>,
    closed: bool,
}

impl WorkerPool {
    /// A pool bounded by the host's available parallelism.
    pub fn new() -> Self {
        let max = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self::with_max_workers(max)
    }

    /// A pool bounded by an explicit worker count.
    pub fn with_max_workers(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
            inner: Mutex::new(PoolInner {
                workers: HashMap::new(),
                closed: false,
            }),
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Total handles currently alive across all kinds.
    pub fn worker_count(&self) -> usize {
        self.inner.lock().workers.values().map(Vec::len).sum()
    }

    /// Lease a worker of `kind`.
    ///
    /// Returns any idle handle of that kind (no ordering guarantee among idle
    /// handles), or spawns a new one while the total count is below the
    /// bound. Fails with `PoolExhausted` at the bound and `PoolClosed` after
    /// shutdown. Must run inside a tokio runtime (spawning).
    pub fn acquire(&self, kind: WorkerKind) -> Result<Arc<ScanWorker>> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(LineSeekError::PoolClosed);
        }

        let idle = inner
            .workers
            .get(&kind)
            .and_then(|list| list.iter().find(|w| w.state() == WorkerState::Idle))
            .cloned();
        if let Some(worker) = idle {
            worker.set_state(WorkerState::Occupied);
            return Ok(worker);
        }

        let total: usize = inner.workers.values().map(Vec::len).sum();
        if total >= self.max_workers {
            return Err(LineSeekError::PoolExhausted {
                max_workers: self.max_workers,
            });
        }

        let worker = Arc::new(ScanWorker::spawn(kind));
        worker.set_state(WorkerState::Occupied);
        inner.workers.entry(kind).or_default().push(Arc::clone(&worker));
        Ok(worker)
    }

    /// Return a leased worker to the idle list. Never destroys the handle.
    pub fn release(&self, worker: &Arc<ScanWorker>) {
        let _guard = self.inner.lock();
        if worker.state() != WorkerState::Destroyed {
            worker.set_state(WorkerState::Idle);
        }
    }

    /// Terminate every worker and close the pool.
    ///
    /// Each worker gets a bounded grace period to finish its current request.
    /// Subsequent `acquire` calls fail with `PoolClosed`.
    pub async fn shutdown(&self) {
        let workers: Vec<Arc<ScanWorker>> = {
            let mut inner = self.inner.lock();
            inner.closed = true;
            inner.workers.drain().flat_map(|(_, list)| list).collect()
        };

        for worker in workers {
            worker.terminate().await;
        }
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_spawns_up_to_bound() {
        let pool = WorkerPool::with_max_workers(2);

        let a = pool.acquire(WorkerKind::Scanner).unwrap();
        let b = pool.acquire(WorkerKind::Scanner).unwrap();
        assert_eq!(pool.worker_count(), 2);
        assert_eq!(a.state(), WorkerState::Occupied);

        match pool.acquire(WorkerKind::Scanner) {
            Err(LineSeekError::PoolExhausted { max_workers }) => assert_eq!(max_workers, 2),
            other => panic!("expected PoolExhausted, got {:?}", other.map(|_| ())),
        }

        // Releasing one allows a new lease without spawning another handle.
        pool.release(&b);
        let c = pool.acquire(WorkerKind::Scanner).unwrap();
        assert_eq!(pool.worker_count(), 2);
        assert!(Arc::ptr_eq(&b, &c));

        pool.shutdown().await;
    }

    #[tokio::test]
    async fn release_marks_idle_and_reuses() {
        let pool = WorkerPool::with_max_workers(4);

        let worker = pool.acquire(WorkerKind::Scanner).unwrap();
        pool.release(&worker);
        assert_eq!(worker.state(), WorkerState::Idle);

        let again = pool.acquire(WorkerKind::Scanner).unwrap();
        assert_eq!(again.state(), WorkerState::Occupied);
        assert_eq!(pool.worker_count(), 1);

        pool.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_closes_pool() {
        let pool = WorkerPool::with_max_workers(2);
        let worker = pool.acquire(WorkerKind::Scanner).unwrap();
        pool.release(&worker);

        pool.shutdown().await;
        assert_eq!(worker.state(), WorkerState::Destroyed);

        match pool.acquire(WorkerKind::Scanner) {
            Err(LineSeekError::PoolClosed) => {}
            other => panic!("expected PoolClosed, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn default_pool_uses_host_parallelism() {
        let pool = WorkerPool::default();
        assert!(pool.max_workers() >= 1);
    }
}
