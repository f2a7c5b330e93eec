use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::error;

use crate::handle::JobHandle;
use crate::registry::WaitAggregate;
use crate::types::{JobId, JobResult};

use super::Scheduler;

/// Alternates a full polling interval with a bare yield.
struct PollBackoff {
    interval: Duration,
    sleep_next: bool,
}

impl PollBackoff {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            sleep_next: true,
        }
    }

    fn pause(&mut self) {
        if self.sleep_next && !self.interval.is_zero() {
            thread::sleep(self.interval);
        } else {
            thread::yield_now();
        }
        self.sleep_next = !self.sleep_next;
    }
}

impl Scheduler {
    /// Block until the job has a result.
    ///
    /// Returns `JobResult::None` if the job is unknown (cancelled, or reaped
    /// with no other handle around) or will never run because of a killing
    /// shutdown. Two threads must not wait on the same job at the same time.
    pub fn wait(&self, handle: &JobHandle) -> JobResult {
        if !handle.is_valid() {
            return JobResult::None;
        }
        let id = handle.id();

        {
            let mut registry = self.shared.registry.lock();
            let Some(counter) = registry.counter_mut(id) else {
                return JobResult::None;
            };
            if counter.result.is_finished() {
                return counter.result;
            }
            let contended = counter.waiting || counter.aggregate.is_some();
            if contended {
                error!(job = id, "Job is already being waited on from another thread");
            }
            debug_assert!(!contended, "job {id} is already being waited on");
            counter.waiting = true;
        }

        let mut backoff = PollBackoff::new(self.shared.config.wait_interval());
        loop {
            backoff.pause();

            let mut registry = self.shared.registry.lock();
            let given_up = self.shared.stopped.load(Ordering::Acquire)
                || self.shared.is_abandoned(&registry, id);
            let Some(counter) = registry.counter_mut(id) else {
                return JobResult::None;
            };
            if counter.result.is_finished() {
                counter.waiting = false;
                return counter.result;
            }
            if given_up {
                counter.waiting = false;
                return JobResult::None;
            }
        }
    }

    /// Block until every job has a result.
    ///
    /// Returns `Fail` if any job failed (including ones that had already
    /// failed before the call) and `Ok` otherwise. Unknown and cancelled jobs
    /// count as done. Passing the same job twice is a contract violation.
    pub fn wait_all(&self, handles: &[JobHandle]) -> JobResult {
        match handles {
            [] => return JobResult::Ok,
            [single] => return self.wait(single),
            _ => {}
        }

        let mut ids: Vec<JobId> = handles
            .iter()
            .filter(|h| h.is_valid())
            .map(JobHandle::id)
            .collect();
        let mut seen = HashSet::with_capacity(ids.len());
        let duplicates = ids.iter().any(|id| !seen.insert(*id));
        if duplicates {
            error!("The same job was passed to wait_all more than once");
            ids.sort_unstable();
            ids.dedup();
        }
        debug_assert!(!duplicates, "duplicate handles passed to wait_all");

        let aggregate = Arc::new(WaitAggregate::default());
        let pending = self.shared.registry.lock().attach_aggregate(&ids, &aggregate);
        if pending == 0 {
            return aggregate.result();
        }

        let mut backoff = PollBackoff::new(self.shared.config.wait_interval());
        loop {
            backoff.pause();

            if aggregate.finished() >= pending {
                return aggregate.result();
            }
            let stopped = self.shared.stopped.load(Ordering::Acquire);
            if !stopped && !self.shared.cancel_jobs.load(Ordering::Acquire) {
                continue;
            }
            let mut registry = self.shared.registry.lock();
            if stopped || ids.iter().any(|&id| self.shared.is_abandoned(&registry, id)) {
                registry.detach_aggregate(&ids, &aggregate);
                drop(registry);
                if aggregate.finished() >= pending {
                    return aggregate.result();
                }
                return JobResult::None;
            }
        }
    }

    /// Non-blocking lookup of a job's state.
    pub fn get_result(&self, handle: &JobHandle) -> JobResult {
        if !handle.is_valid() {
            return JobResult::None;
        }
        self.shared.registry.lock().result(handle.id())
    }
}
