use std::cmp::Ordering;
use std::fmt;

use crate::context::WorkerContext;
use crate::types::{JobId, Priority};

/// The work a job performs. Arguments are captured by the closure.
///
/// Returning `false` records [`JobResult::Fail`](crate::JobResult::Fail).
/// Panicking is a contract violation and aborts the process.
pub type JobFn = Box<dyn FnOnce(&mut WorkerContext) -> bool + Send + 'static>;

/// A caller's request to run some work.
pub struct JobDescriptor {
    pub(crate) func: JobFn,
    pub(crate) priority: Priority,
    pub(crate) affinity: Option<usize>,
}

impl JobDescriptor {
    pub fn new<F>(func: F) -> Self
    where
        F: FnOnce(&mut WorkerContext) -> bool + Send + 'static,
    {
        Self {
            func: Box::new(func),
            priority: Priority::Normal,
            affinity: None,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Only the worker with this index may run the job.
    pub fn pinned_to(mut self, worker_index: usize) -> Self {
        self.affinity = Some(worker_index);
        self
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn affinity(&self) -> Option<usize> {
        self.affinity
    }
}

impl fmt::Debug for JobDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobDescriptor")
            .field("priority", &self.priority)
            .field("affinity", &self.affinity)
            .finish_non_exhaustive()
    }
}

/// A registered unit of work waiting in the queue or a chain.
///
/// Ordered by priority alone; equal priorities compare equal so heap order
/// among them is unspecified.
pub(crate) struct Job {
    pub(crate) id: JobId,
    pub(crate) priority: Priority,
    pub(crate) affinity: Option<usize>,
    pub(crate) func: JobFn,
}

impl Job {
    pub(crate) fn from_descriptor(id: JobId, desc: JobDescriptor) -> Self {
        Self {
            id,
            priority: desc.priority,
            affinity: desc.affinity,
            func: desc.func,
        }
    }

    /// Whether the worker at `worker` is allowed to run this job.
    pub(crate) fn runs_on(&self, worker: usize) -> bool {
        self.affinity.map_or(true, |pinned| pinned == worker)
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("affinity", &self.affinity)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Job {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority
    }
}

impl Eq for Job {}

impl PartialOrd for Job {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Job {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority.cmp(&other.priority)
    }
}

#[cfg(test)]
pub(crate) fn test_job(id: JobId, priority: Priority) -> Job {
    Job::from_descriptor(id, JobDescriptor::new(|_| true).with_priority(priority))
}
