use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::job::Job;
use crate::job_list::JobList;
use crate::types::{JobId, JobResult, INVALID_JOB_ID};

/// References a freshly registered job starts with: the scheduler's own plus
/// the handle returned to the caller.
pub(crate) const INITIAL_REFS: u32 = 2;

/// Shared completion state of one `wait_all` call.
#[derive(Debug, Default)]
pub(crate) struct WaitAggregate {
    finished: AtomicUsize,
    failed: AtomicBool,
}

impl WaitAggregate {
    pub(crate) fn finished(&self) -> usize {
        self.finished.load(Ordering::Acquire)
    }

    pub(crate) fn result(&self) -> JobResult {
        if self.failed.load(Ordering::Acquire) {
            JobResult::Fail
        } else {
            JobResult::Ok
        }
    }

    fn fulfil(&self, result: JobResult) {
        if result == JobResult::Fail {
            self.failed.store(true, Ordering::Release);
        }
        self.finished.fetch_add(1, Ordering::AcqRel);
    }
}

/// Bookkeeping for one live job ID.
#[derive(Debug)]
pub(crate) struct JobCounter {
    pub(crate) refs: u32,
    pub(crate) result: JobResult,
    pub(crate) aggregate: Option<Arc<WaitAggregate>>,
    /// A single `wait` is polling this job.
    pub(crate) waiting: bool,
    /// The scheduler has dropped its own reference; nothing more may chain.
    pub(crate) scheduler_released: bool,
}

impl JobCounter {
    fn new(refs: u32) -> Self {
        Self {
            refs,
            result: JobResult::Running,
            aggregate: None,
            waiting: false,
            scheduler_released: false,
        }
    }

    fn fulfil_aggregate(&mut self, result: JobResult) {
        if let Some(aggregate) = self.aggregate.take() {
            aggregate.fulfil(result);
        }
    }
}

/// Counters and chained lists of every live job.
///
/// Everything here sits behind the registry lock. Methods hand removed jobs
/// back to the caller instead of dropping them, because a job's closure may
/// own handles whose `Drop` needs this same lock.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    counters: HashMap<JobId, JobCounter>,
    chains: HashMap<JobId, JobList>,
    last_id: JobId,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Allocate `n` consecutive IDs, each with a fresh counter. Returns the first.
    pub(crate) fn allocate(&mut self, n: usize) -> JobId {
        debug_assert!(n > 0, "allocating zero job IDs");
        let first = self.last_id + 1;
        self.last_id += n as JobId;
        for id in first..=self.last_id {
            self.counters.insert(id, JobCounter::new(INITIAL_REFS));
        }
        first
    }

    #[cfg(test)]
    pub(crate) fn counter(&self, id: JobId) -> Option<&JobCounter> {
        self.counters.get(&id)
    }

    pub(crate) fn counter_mut(&mut self, id: JobId) -> Option<&mut JobCounter> {
        self.counters.get_mut(&id)
    }

    pub(crate) fn live_jobs(&self) -> usize {
        self.counters.len()
    }

    pub(crate) fn chained_lists(&self) -> usize {
        self.chains.len()
    }

    /// Result as seen by callers: `None` once the job is no longer tracked.
    pub(crate) fn result(&self, id: JobId) -> JobResult {
        self.counters.get(&id).map_or(JobResult::None, |c| c.result)
    }

    pub(crate) fn increment(&mut self, id: JobId) -> bool {
        match self.counters.get_mut(&id) {
            Some(counter) => {
                counter.refs += 1;
                true
            }
            None => false,
        }
    }

    /// Drop one reference. Returns chained jobs that must go to the global queue.
    ///
    /// With `release_scheduler` the scheduler's own reference is dropped: no
    /// further chaining is accepted and anything chained since the last drain
    /// is flushed right away.
    pub(crate) fn decrement(&mut self, id: JobId, release_scheduler: bool) -> Vec<Job> {
        let Some(counter) = self.counters.get_mut(&id) else {
            return Vec::new();
        };
        let mut flush = release_scheduler;
        if release_scheduler {
            counter.scheduler_released = true;
        }
        counter.refs = counter.refs.saturating_sub(1);
        if counter.refs == 0 {
            self.counters.remove(&id);
            flush = true;
        }
        if flush {
            self.take_chain(id)
        } else {
            Vec::new()
        }
    }

    /// Record the single outcome of a job and notify any multi-wait on it.
    pub(crate) fn record_result(&mut self, id: JobId, result: JobResult) {
        if let Some(counter) = self.counters.get_mut(&id) {
            debug_assert!(
                !counter.result.is_finished(),
                "job {id} finished twice"
            );
            counter.result = result;
            counter.fulfil_aggregate(result);
        }
    }

    /// Whether new jobs may still be chained onto `parent`.
    pub(crate) fn accepts_chain(&self, parent: JobId) -> bool {
        self.counters
            .get(&parent)
            .is_some_and(|c| !c.scheduler_released && !c.result.is_finished())
    }

    pub(crate) fn append_chained(&mut self, parent: JobId, jobs: impl IntoIterator<Item = Job>) {
        let list = self.chains.entry(parent).or_default();
        for job in jobs {
            list.append(job);
        }
    }

    /// Take the next chained job of a finished parent to run inline.
    ///
    /// Along with it, returns the jobs to hand over to the global queue: half
    /// the remainder (rounded up) when at least `threshold` remain, otherwise
    /// all of it.
    pub(crate) fn take_chained(
        &mut self,
        parent: JobId,
        threshold: usize,
    ) -> Option<(Job, Vec<Job>)> {
        let list = self.chains.get_mut(&parent)?;
        let Some(next) = list.pop_highest() else {
            self.chains.remove(&parent);
            return None;
        };

        let remaining = list.len();
        let dispersed = if remaining >= threshold {
            let n = (remaining >> 1) + (remaining & 1);
            (0..n).filter_map(|_| list.pop_highest()).collect()
        } else {
            list.drain()
        };

        if list.is_empty() {
            self.chains.remove(&parent);
        }
        Some((next, dispersed))
    }

    /// Take every job chained onto `parent`.
    pub(crate) fn take_chain(&mut self, parent: JobId) -> Vec<Job> {
        self.chains
            .remove(&parent)
            .map(|mut list| list.drain())
            .unwrap_or_default()
    }

    /// Whether `id` is still waiting in some parent's chain.
    pub(crate) fn is_chained(&self, id: JobId) -> bool {
        self.chains.values().any(|list| list.contains(id))
    }

    /// Find and remove a not-yet-started job from whichever chain holds it.
    pub(crate) fn remove_chained(&mut self, id: JobId) -> Option<Job> {
        let mut found = None;
        let mut emptied = INVALID_JOB_ID;
        for (&parent, list) in self.chains.iter_mut() {
            if let Some(job) = list.remove_by_id(id) {
                if list.is_empty() {
                    emptied = parent;
                }
                found = Some(job);
                break;
            }
        }
        if emptied != INVALID_JOB_ID {
            self.chains.remove(&emptied);
        }
        found
    }

    /// Forget a cancelled job's counter. A pending multi-wait counts it as done.
    pub(crate) fn forget(&mut self, id: JobId) {
        if let Some(mut counter) = self.counters.remove(&id) {
            counter.fulfil_aggregate(JobResult::None);
        }
    }

    /// Take the chain of `parent`, the chains of everything in it, and so on,
    /// forgetting each discarded job's counter.
    pub(crate) fn discard_chain(&mut self, parent: JobId) -> Vec<Job> {
        let mut discarded = Vec::new();
        let mut parents = vec![parent];
        while let Some(parent) = parents.pop() {
            for job in self.take_chain(parent) {
                self.forget(job.id);
                parents.push(job.id);
                discarded.push(job);
            }
        }
        discarded
    }

    /// Attach `aggregate` to every still-pending job in `ids`.
    ///
    /// Returns how many jobs the caller has to wait for. Jobs that already
    /// failed mark the aggregate failed immediately.
    pub(crate) fn attach_aggregate(
        &mut self,
        ids: &[JobId],
        aggregate: &Arc<WaitAggregate>,
    ) -> usize {
        let mut pending = 0;
        for id in ids {
            let Some(counter) = self.counters.get_mut(id) else {
                continue;
            };
            debug_assert!(
                counter.aggregate.is_none() && !counter.waiting,
                "job {id} is already being waited on"
            );
            match counter.result {
                JobResult::Fail => aggregate.failed.store(true, Ordering::Release),
                JobResult::Ok => {}
                JobResult::None | JobResult::Running => {
                    counter.aggregate = Some(Arc::clone(aggregate));
                    pending += 1;
                }
            }
        }
        pending
    }

    /// Detach `aggregate` from any job it is still attached to.
    pub(crate) fn detach_aggregate(&mut self, ids: &[JobId], aggregate: &Arc<WaitAggregate>) {
        for id in ids {
            if let Some(counter) = self.counters.get_mut(id) {
                if counter
                    .aggregate
                    .as_ref()
                    .is_some_and(|a| Arc::ptr_eq(a, aggregate))
                {
                    counter.aggregate = None;
                }
            }
        }
    }

    /// Remove every chained job, for shutdown.
    pub(crate) fn drain_chains(&mut self) -> Vec<Job> {
        self.chains
            .drain()
            .flat_map(|(_, mut list)| list.drain())
            .collect()
    }
}
