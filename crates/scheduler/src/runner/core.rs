use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;

use crate::config::SchedulerConfig;
use crate::context::current_owner;
use crate::handle::JobHandle;
use crate::job::Job;
use crate::metrics::{SchedulerStats, StatCounters};
use crate::notifier::Notifier;
use crate::queue::PriorityJobQueue;
use crate::registry::Registry;
use crate::types::JobId;

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

/// State shared between the scheduler, its workers and outstanding handles.
pub(crate) struct Shared {
    /// Distinguishes this scheduler's workers from any other pool's.
    pub(crate) instance: u64,
    pub(crate) config: SchedulerConfig,
    pub(crate) workers: usize,
    pub(crate) notifier: Notifier,
    pub(crate) registry: Mutex<Registry>,
    pub(crate) queue: Mutex<PriorityJobQueue>,
    /// Cleared when shutdown starts; new work is then only accepted from workers.
    pub(crate) running: AtomicBool,
    /// Set by a killing shutdown: workers stop after their current job.
    pub(crate) cancel_jobs: AtomicBool,
    /// Set once every worker has been joined.
    pub(crate) stopped: AtomicBool,
    pub(crate) shutdown_requested: AtomicBool,
    pub(crate) stats: StatCounters,
}

impl Shared {
    pub(crate) fn new(config: SchedulerConfig, workers: usize) -> Self {
        Self {
            instance: NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed),
            config,
            workers,
            notifier: Notifier::new(workers),
            registry: Mutex::new(Registry::new()),
            queue: Mutex::new(PriorityJobQueue::new()),
            running: AtomicBool::new(true),
            cancel_jobs: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            shutdown_requested: AtomicBool::new(false),
            stats: StatCounters::default(),
        }
    }

    /// Whether the calling thread is one of this scheduler's workers.
    pub(crate) fn is_own_worker(&self) -> bool {
        current_owner() == Some(self.instance)
    }

    /// New jobs are accepted until shutdown starts, and from workers until
    /// they exit.
    pub(crate) fn accepts_jobs(&self) -> bool {
        self.running.load(Ordering::Acquire) || self.is_own_worker()
    }

    /// A new counted handle to `id`, or an invalid one if it is gone.
    pub(crate) fn acquire_handle(self: &Arc<Self>, id: JobId) -> JobHandle {
        if self.registry.lock().increment(id) {
            JobHandle::adopt(id, Arc::downgrade(self))
        } else {
            JobHandle::invalid()
        }
    }

    /// Drop one reference to `id`, moving any orphaned chained jobs to the queue.
    pub(crate) fn release_ref(&self, id: JobId, release_scheduler: bool) {
        let flushed = {
            let mut registry = self.registry.lock();
            let flushed = registry.decrement(id, release_scheduler);
            let n = flushed.len();
            if n > 0 {
                self.queue.lock().extend(flushed);
            }
            n
        };
        self.notifier.signal(flushed);
    }

    /// Push jobs to the global queue and wake one worker per job.
    pub(crate) fn push_jobs(&self, jobs: Vec<Job>) {
        let n = jobs.len();
        self.queue.lock().extend(jobs);
        self.notifier.signal(n);
    }

    /// Tell workers to stop. With `kill_awaiting` queued jobs are abandoned.
    pub(crate) fn stop(&self, kill_awaiting: bool) {
        self.cancel_jobs.store(kill_awaiting, Ordering::Release);
        self.running.store(false, Ordering::Release);
        self.notifier.close();
    }

    /// Whether a killing shutdown has left `id` queued or chained, so it will
    /// never run. Takes the queue lock, so call it with `registry` held.
    pub(crate) fn is_abandoned(&self, registry: &Registry, id: JobId) -> bool {
        self.cancel_jobs.load(Ordering::Acquire)
            && (registry.is_chained(id) || self.queue.lock().contains(id))
    }

    /// Remove everything that will never run now that the workers are gone.
    pub(crate) fn take_abandoned(&self) -> Vec<Job> {
        let mut registry = self.registry.lock();
        let mut jobs = registry.drain_chains();
        jobs.extend(self.queue.lock().drain());
        jobs
    }
}

/// The job scheduler: a fixed pool of worker threads running prioritised jobs.
///
/// Usually shared as `Arc<Scheduler>`. Dropping the last reference without an
/// explicit [`shutdown`](Scheduler::shutdown) kills awaiting jobs.
pub struct Scheduler {
    pub(super) shared: Arc<Shared>,
    pub(super) threads: Mutex<Vec<JoinHandle<()>>>,
}

impl Scheduler {
    /// Build a scheduler with `config` and no worker setup hook.
    pub fn new(config: SchedulerConfig) -> Result<Self, crate::SchedulerError> {
        Self::builder().config(config).build()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.shared.config
    }

    /// Number of worker threads in the pool.
    pub fn worker_count(&self) -> usize {
        self.shared.workers
    }

    /// Whether the calling thread is one of this scheduler's workers.
    pub fn on_own_worker(&self) -> bool {
        self.shared.is_own_worker()
    }

    /// Whether the scheduler still accepts jobs from any thread.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Get a snapshot of the current scheduler statistics.
    pub fn stats(&self) -> SchedulerStats {
        let mut stats = SchedulerStats {
            workers: self.shared.workers,
            ..SchedulerStats::default()
        };
        {
            let registry = self.shared.registry.lock();
            stats.live_jobs = registry.live_jobs();
            stats.chained_lists = registry.chained_lists();
            stats.queued_jobs = self.shared.queue.lock().len();
        }
        self.shared.stats.fill(&mut stats);
        stats
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("workers", &self.shared.workers)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}
