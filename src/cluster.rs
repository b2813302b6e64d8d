//! Worker pool registry and introspection.
//!
//! The benchmark sweeps over worker counts. A [ClusterClient] tracks the
//! registered workers and exposes snapshot queries over them; the thread
//! total sizes the fetch concurrency of a run. Callers that need the pool at
//! a given size use [wait_for_workers](ClusterClient::wait_for_workers)
//! before reading the snapshots.

use crate::error::FetchBenchError;

use std::sync::RwLock;
use std::time::Duration;

use hashbrown::HashMap;
use uuid::Uuid;

/// Resources supplied by one worker.
#[derive(Clone, Copy, Debug)]
pub struct WorkerSpec {
    /// Number of CPU cores.
    pub ncores: usize,
    /// Number of execution threads.
    pub nthreads: usize,
}

impl Default for WorkerSpec {
    /// One thread per available CPU core.
    fn default() -> Self {
        let ncores = num_cpus::get();
        Self {
            ncores,
            nthreads: ncores,
        }
    }
}

/// A registered worker.
#[derive(Clone, Debug)]
pub struct Worker {
    /// Unique identifier for the worker.
    pub id: Uuid,
    /// Number of CPU cores.
    pub ncores: usize,
    /// Number of execution threads.
    pub nthreads: usize,
}

/// Client handle on a pool of workers.
///
/// Holds the worker registry behind a read-write lock, optimised for the
/// read-mostly snapshot queries.
#[derive(Debug, Default)]
pub struct ClusterClient {
    /// Registered workers by id.
    workers: RwLock<HashMap<Uuid, Worker>>,
}

impl ClusterClient {
    /// Returns a new ClusterClient with no registered workers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one worker and return its id.
    ///
    /// # Arguments
    ///
    /// * `spec`: Resources supplied by the worker
    pub fn register(&self, spec: WorkerSpec) -> Uuid {
        let id = Uuid::new_v4();
        let worker = Worker {
            id,
            ncores: spec.ncores,
            nthreads: spec.nthreads,
        };
        self.write().insert(id, worker);
        id
    }

    /// Deregister one worker.
    ///
    /// Returns true if the worker was registered.
    pub fn deregister(&self, id: &Uuid) -> bool {
        self.write().remove(id).is_some()
    }

    /// Scale the pool to `nworkers` workers.
    ///
    /// Missing workers are registered with `spec`; surplus workers are
    /// deregistered.
    pub fn scale_to(&self, nworkers: usize, spec: WorkerSpec) {
        let current = self.total_workers();
        if current < nworkers {
            tracing::info!("Scaling up from {} to {} workers", current, nworkers);
            for _ in current..nworkers {
                self.register(spec);
            }
        } else if current > nworkers {
            tracing::info!("Scaling down from {} to {} workers", current, nworkers);
            let surplus: Vec<Uuid> = self
                .read()
                .keys()
                .take(current - nworkers)
                .copied()
                .collect();
            for id in surplus {
                self.deregister(&id);
            }
        }
    }

    /// Returns the number of currently registered workers.
    pub fn total_workers(&self) -> usize {
        self.read().len()
    }

    /// Returns the sum of CPU cores across all registered workers.
    pub fn total_ncores(&self) -> usize {
        self.read().values().map(|worker| worker.ncores).sum()
    }

    /// Returns the sum of execution threads across all registered workers.
    pub fn total_nthreads(&self) -> usize {
        self.read().values().map(|worker| worker.nthreads).sum()
    }

    /// Wait until at least `nworkers` workers are registered.
    ///
    /// Polls the registry on an interval. Returns
    /// [FetchBenchError::WorkerWaitTimeout] if the pool does not reach the
    /// requested size within `timeout`.
    ///
    /// # Arguments
    ///
    /// * `nworkers`: Number of workers to wait for
    /// * `timeout`: Maximum time to wait
    pub async fn wait_for_workers(
        &self,
        nworkers: usize,
        timeout: Duration,
    ) -> Result<(), FetchBenchError> {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut interval = tokio::time::interval(Duration::from_millis(100));
        loop {
            let actual = self.total_workers();
            if actual >= nworkers {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(FetchBenchError::WorkerWaitTimeout {
                    expected: nworkers,
                    actual,
                });
            }
            tracing::debug!("Waiting for workers: {}/{}", actual, nworkers);
            interval.tick().await;
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<Uuid, Worker>> {
        self.workers.read().expect("worker registry lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<Uuid, Worker>> {
        self.workers.write().expect("worker registry lock poisoned")
    }
}
