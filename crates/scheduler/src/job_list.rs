use std::collections::BinaryHeap;
use std::mem;

use crate::job::Job;
use crate::types::JobId;

/// Jobs chained to run after one specific parent job.
///
/// Most parents get a single continuation, which is stored inline without
/// allocating a heap.
#[derive(Debug, Default)]
pub(crate) enum JobList {
    #[default]
    Empty,
    One(Job),
    Many(BinaryHeap<Job>),
}

impl JobList {
    pub(crate) fn len(&self) -> usize {
        match self {
            JobList::Empty => 0,
            JobList::One(_) => 1,
            JobList::Many(heap) => heap.len(),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn append(&mut self, job: Job) {
        *self = match mem::take(self) {
            JobList::Empty => JobList::One(job),
            JobList::One(first) => JobList::Many(BinaryHeap::from(vec![first, job])),
            JobList::Many(mut heap) => {
                heap.push(job);
                JobList::Many(heap)
            }
        };
    }

    /// Remove and return the highest-priority chained job.
    pub(crate) fn pop_highest(&mut self) -> Option<Job> {
        match mem::take(self) {
            JobList::Empty => None,
            JobList::One(job) => Some(job),
            JobList::Many(mut heap) => {
                let top = heap.pop();
                *self = Self::collapse(heap);
                top
            }
        }
    }

    pub(crate) fn remove_by_id(&mut self, id: JobId) -> Option<Job> {
        match mem::take(self) {
            JobList::Empty => None,
            JobList::One(job) if job.id == id => Some(job),
            JobList::One(job) => {
                *self = JobList::One(job);
                None
            }
            JobList::Many(heap) => {
                let mut jobs = heap.into_vec();
                let found = jobs
                    .iter()
                    .position(|job| job.id == id)
                    .map(|index| jobs.swap_remove(index));
                *self = Self::collapse(BinaryHeap::from(jobs));
                found
            }
        }
    }

    pub(crate) fn contains(&self, id: JobId) -> bool {
        match self {
            JobList::Empty => false,
            JobList::One(job) => job.id == id,
            JobList::Many(heap) => heap.iter().any(|job| job.id == id),
        }
    }

    /// Take every chained job, highest priority first.
    pub(crate) fn drain(&mut self) -> Vec<Job> {
        match mem::take(self) {
            JobList::Empty => Vec::new(),
            JobList::One(job) => vec![job],
            JobList::Many(heap) => heap.into_sorted_vec().into_iter().rev().collect(),
        }
    }

    #[cfg(test)]
    /// IDs of every chained job, in no particular order.
    pub(crate) fn ids(&self) -> Vec<JobId> {
        match self {
            JobList::Empty => Vec::new(),
            JobList::One(job) => vec![job.id],
            JobList::Many(heap) => heap.iter().map(|job| job.id).collect(),
        }
    }

    fn collapse(mut heap: BinaryHeap<Job>) -> Self {
        match heap.len() {
            0 => JobList::Empty,
            1 => heap.pop().map_or(JobList::Empty, JobList::One),
            _ => JobList::Many(heap),
        }
    }
}
