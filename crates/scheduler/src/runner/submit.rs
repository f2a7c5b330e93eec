use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::handle::JobHandle;
use crate::job::{Job, JobDescriptor};
use crate::types::JobId;

use super::Scheduler;

impl Scheduler {
    /// Queue a job to run on any eligible worker.
    pub fn post(&self, descriptor: JobDescriptor) -> JobHandle {
        self.post_all(vec![descriptor]).pop().unwrap_or_default()
    }

    /// Queue several jobs at once. IDs are allocated as one consecutive block
    /// and one worker is woken per job.
    ///
    /// Posting from outside the pool once shutdown has begun is a contract
    /// violation; the jobs are dropped and invalid handles returned.
    pub fn post_all(&self, descriptors: Vec<JobDescriptor>) -> Vec<JobHandle> {
        let n = descriptors.len();
        if n == 0 {
            return Vec::new();
        }
        if !self.shared.accepts_jobs() {
            return self.reject_after_shutdown(descriptors);
        }

        let first = self.shared.registry.lock().allocate(n);
        let jobs = self.build_jobs(first, descriptors);
        self.shared.stats.record_posted(n);
        debug!(first_id = first, count = n, "Posted jobs");

        self.shared.push_jobs(jobs);
        self.adopt_handles(first, n)
    }

    /// Chain a job to run after `parent` finishes.
    ///
    /// If the parent has already finished (or was never valid) the job is
    /// posted as an ordinary top-level job instead.
    pub fn enqueue_one(&self, parent: &JobHandle, descriptor: JobDescriptor) -> JobHandle {
        self.enqueue_all(parent, vec![descriptor]).pop().unwrap_or_default()
    }

    /// Chain several jobs to run after `parent` finishes, highest priority first.
    pub fn enqueue_all(
        &self,
        parent: &JobHandle,
        descriptors: Vec<JobDescriptor>,
    ) -> Vec<JobHandle> {
        let n = descriptors.len();
        if n == 0 {
            return Vec::new();
        }
        if !parent.is_valid() {
            return self.post_all(descriptors);
        }
        if !self.shared.accepts_jobs() {
            return self.reject_after_shutdown(descriptors);
        }

        let mut registry = self.shared.registry.lock();
        if !registry.accepts_chain(parent.id()) {
            drop(registry);
            self.shared.stats.record_enqueue_fallback();
            debug!(parent = parent.id(), count = n, "Parent already finished, posting instead");
            return self.post_all(descriptors);
        }

        let first = registry.allocate(n);
        let jobs = self.build_jobs(first, descriptors);
        registry.append_chained(parent.id(), jobs);
        drop(registry);

        self.shared.stats.record_enqueued(n);
        debug!(parent = parent.id(), first_id = first, count = n, "Chained jobs");
        self.adopt_handles(first, n)
    }

    /// Cancel a job that has not started yet.
    ///
    /// Works for jobs in the global queue and for jobs still chained behind
    /// another job. With `cancel_queued` everything chained behind the
    /// cancelled job is discarded too; otherwise those jobs are moved to the
    /// global queue and still run. Returns `false` if the job is already
    /// running, finished or unknown.
    pub fn cancel(&self, handle: &JobHandle, cancel_queued: bool) -> bool {
        if !handle.is_valid() {
            return false;
        }
        let id = handle.id();
        let shared = &self.shared;

        let outcome = shared.notifier.locked(|| {
            let mut registry = shared.registry.lock();
            let queued = shared.queue.lock().remove_by_id(id);
            let from_queue = queued.is_some();
            let Some(job) = queued.or_else(|| registry.remove_chained(id)) else {
                return (false, None);
            };
            registry.forget(id);

            let mut discarded = vec![job];
            let mut flushed = 0;
            if cancel_queued {
                discarded.extend(registry.discard_chain(id));
            } else {
                let chain = registry.take_chain(id);
                flushed = chain.len();
                if flushed > 0 {
                    shared.queue.lock().extend(chain);
                }
            }
            (from_queue, Some((discarded, flushed)))
        });

        let Some((discarded, flushed)) = outcome else {
            debug!(job = id, "Nothing to cancel, job already started or gone");
            return false;
        };

        shared.stats.record_cancelled(discarded.len());
        debug!(job = id, discarded = discarded.len(), flushed, "Cancelled job");
        drop(discarded);
        shared.notifier.signal(flushed);
        true
    }

    fn build_jobs(&self, first: JobId, descriptors: Vec<JobDescriptor>) -> Vec<Job> {
        descriptors
            .into_iter()
            .zip(first..)
            .map(|(mut descriptor, id)| {
                if let Some(worker) = descriptor.affinity {
                    if worker >= self.shared.workers {
                        warn!(
                            job = id,
                            worker,
                            workers = self.shared.workers,
                            "Affinity names a worker that does not exist, running on any worker"
                        );
                        descriptor.affinity = None;
                    }
                }
                Job::from_descriptor(id, descriptor)
            })
            .collect()
    }

    fn adopt_handles(&self, first: JobId, n: usize) -> Vec<JobHandle> {
        (first..first + n as JobId)
            .map(|id| JobHandle::adopt(id, Arc::downgrade(&self.shared)))
            .collect()
    }

    fn reject_after_shutdown(&self, descriptors: Vec<JobDescriptor>) -> Vec<JobHandle> {
        error!(
            count = descriptors.len(),
            "Jobs posted after shutdown from outside the worker pool, dropping them"
        );
        debug_assert!(false, "jobs posted after shutdown from outside the worker pool");
        descriptors.iter().map(|_| JobHandle::invalid()).collect()
    }
}
