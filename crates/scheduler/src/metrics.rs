use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::types::JobResult;

/// Point-in-time snapshot of scheduler activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    /// Number of worker threads in the pool.
    pub workers: usize,
    /// Jobs waiting in the global queue.
    pub queued_jobs: usize,
    /// Job IDs that still have a counter (running, pending or referenced).
    pub live_jobs: usize,
    /// Parents that currently have chained jobs waiting on them.
    pub chained_lists: usize,
    pub jobs_posted: u64,
    pub jobs_enqueued: u64,
    pub jobs_completed: u64,
    pub jobs_failed: u64,
    pub jobs_cancelled: u64,
    /// Chained jobs handed back to the global queue instead of running inline.
    pub jobs_dispersed: u64,
    /// Chained jobs run inline on the worker that finished their parent.
    pub chained_inline: u64,
    /// `enqueue_*` calls that fell back to a top-level post.
    pub enqueue_fallbacks: u64,
}

impl SchedulerStats {
    /// Jobs that have produced a result, successful or not.
    pub fn jobs_finished(&self) -> u64 {
        self.jobs_completed + self.jobs_failed
    }
}

/// Hot-path counters behind [`SchedulerStats`].
#[derive(Debug, Default)]
pub(crate) struct StatCounters {
    posted: AtomicU64,
    enqueued: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
    dispersed: AtomicU64,
    chained_inline: AtomicU64,
    enqueue_fallbacks: AtomicU64,
}

impl StatCounters {
    pub(crate) fn record_posted(&self, n: usize) {
        self.posted.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_enqueued(&self, n: usize) {
        self.enqueued.fetch_add(n as u64, Ordering::Relaxed);
    }

    /// Record a job execution.
    pub(crate) fn record_execution(&self, result: JobResult) {
        match result {
            JobResult::Ok => self.completed.fetch_add(1, Ordering::Relaxed),
            JobResult::Fail => self.failed.fetch_add(1, Ordering::Relaxed),
            JobResult::None | JobResult::Running => return,
        };
    }

    pub(crate) fn record_cancelled(&self, n: usize) {
        self.cancelled.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_dispersed(&self, n: usize) {
        self.dispersed.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_chained_inline(&self) {
        self.chained_inline.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_enqueue_fallback(&self) {
        self.enqueue_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the counters into `stats`, leaving its gauges alone.
    pub(crate) fn fill(&self, stats: &mut SchedulerStats) {
        stats.jobs_posted = self.posted.load(Ordering::Relaxed);
        stats.jobs_enqueued = self.enqueued.load(Ordering::Relaxed);
        stats.jobs_completed = self.completed.load(Ordering::Relaxed);
        stats.jobs_failed = self.failed.load(Ordering::Relaxed);
        stats.jobs_cancelled = self.cancelled.load(Ordering::Relaxed);
        stats.jobs_dispersed = self.dispersed.load(Ordering::Relaxed);
        stats.chained_inline = self.chained_inline.load(Ordering::Relaxed);
        stats.enqueue_fallbacks = self.enqueue_fallbacks.load(Ordering::Relaxed);
    }
}
