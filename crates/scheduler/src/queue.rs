use std::collections::BinaryHeap;

use crate::job::Job;
use crate::types::{JobId, Priority};

/// Global queue of not-yet-started jobs, highest priority first.
///
/// Backed by a binary heap. Eligibility filtering and removal by ID fall back
/// to a linear scan and a heap rebuild, which is fine for the tens to low
/// thousands of jobs a pool sees at once.
#[derive(Debug, Default)]
pub(crate) struct PriorityJobQueue {
    heap: BinaryHeap<Job>,
}

impl PriorityJobQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) fn push(&mut self, job: Job) {
        self.heap.push(job);
    }

    pub(crate) fn extend(&mut self, jobs: impl IntoIterator<Item = Job>) {
        self.heap.extend(jobs);
    }

    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Pop the highest-priority job that `worker` may run.
    ///
    /// Jobs pinned to other workers are skipped and stay queued.
    pub(crate) fn pop_highest_eligible(&mut self, worker: usize) -> Option<Job> {
        match self.heap.peek() {
            None => return None,
            Some(top) if top.runs_on(worker) => return self.heap.pop(),
            Some(_) => {}
        }

        let mut best: Option<(usize, Priority)> = None;
        for (i, job) in self.heap.iter().enumerate() {
            if !job.runs_on(worker) {
                continue;
            }
            if best.map_or(true, |(_, p)| job.priority > p) {
                best = Some((i, job.priority));
            }
        }

        let (index, _) = best?;
        Some(self.take_at(index))
    }

    /// Pop the highest-priority job regardless of affinity.
    pub(crate) fn pop_highest(&mut self) -> Option<Job> {
        self.heap.pop()
    }

    /// Remove the job with `id`, if it is still queued.
    pub(crate) fn remove_by_id(&mut self, id: JobId) -> Option<Job> {
        let index = self.heap.iter().position(|job| job.id == id)?;
        Some(self.take_at(index))
    }

    pub(crate) fn contains(&self, id: JobId) -> bool {
        self.heap.iter().any(|job| job.id == id)
    }

    /// Take every queued job, leaving the queue empty.
    pub(crate) fn drain(&mut self) -> Vec<Job> {
        std::mem::take(&mut self.heap).into_vec()
    }

    fn take_at(&mut self, index: usize) -> Job {
        let mut jobs = std::mem::take(&mut self.heap).into_vec();
        let job = jobs.swap_remove(index);
        self.heap = BinaryHeap::from(jobs);
        job
    }
}
