use std::ops::ControlFlow;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;

use tracing::{debug, error, info};

use crate::context::{enter_worker, leave_worker, WorkerContext, WorkerInfo, WorkerSetup};
use crate::job::Job;
use crate::notifier::Token;
use crate::types::{JobId, JobResult, INVALID_JOB_ID};

use super::Shared;

/// What a worker does after waking up.
enum NextJob {
    Run(Job),
    /// Stale wake-up, the queue was already empty.
    Idle,
    /// Only jobs pinned to other workers are queued.
    Backoff,
    Exit,
}

/// Body of every worker thread.
pub(super) fn worker_main(shared: Arc<Shared>, info: WorkerInfo, setup: Option<WorkerSetup>) {
    enter_worker(shared.instance, info.clone());
    let mut ctx = WorkerContext::new(info, shared.config.scratch_bytes, Arc::downgrade(&shared));

    if let Some(setup) = setup {
        if panic::catch_unwind(AssertUnwindSafe(|| setup(&mut ctx))).is_err() {
            error!(worker = %ctx.name(), "Worker setup hook panicked, aborting");
            std::process::abort();
        }
    }
    info!(worker = %ctx.name(), "Worker started");

    let backoff = shared.config.affinity_backoff();
    loop {
        match shared.next_job(ctx.index()) {
            NextJob::Run(job) => {
                if shared.run_job_tree(&mut ctx, job).is_break() {
                    break;
                }
            }
            NextJob::Idle => {}
            NextJob::Backoff => thread::sleep(backoff),
            NextJob::Exit => break,
        }
    }

    info!(
        worker = %ctx.name(),
        scratch_high_water = ctx.scratch_high_water(),
        "Worker exiting"
    );
    drop(ctx);
    leave_worker();
}

impl Shared {
    /// Wait for a token and take the best job this worker may run.
    fn next_job(&self, worker: usize) -> NextJob {
        if self.cancel_jobs.load(Ordering::Acquire) {
            return NextJob::Exit;
        }
        self.notifier.wait_for(|| {
            if self.cancel_jobs.load(Ordering::Acquire) {
                return (Token::Keep, NextJob::Exit);
            }
            let running = self.running.load(Ordering::Acquire);
            let mut queue = self.queue.lock();
            if queue.is_empty() {
                return if running {
                    (Token::Consume, NextJob::Idle)
                } else {
                    (Token::Keep, NextJob::Exit)
                };
            }

            // While draining for shutdown, pinned jobs are taken by anyone:
            // the worker they are pinned to may already have exited.
            let job = match queue.pop_highest_eligible(worker) {
                Some(job) => Some(job),
                None if !running => queue.pop_highest(),
                None => None,
            };
            match job {
                Some(job) => (Token::Consume, NextJob::Run(job)),
                None => (Token::PassOn, NextJob::Backoff),
            }
        })
    }

    /// Run `first`, then everything chained behind it, depth first on this
    /// thread. Breaks if a killing shutdown was requested meanwhile.
    fn run_job_tree(&self, ctx: &mut WorkerContext, first: Job) -> ControlFlow<()> {
        // Jobs that have run but whose chains are not drained yet.
        let mut parents: Vec<JobId> = Vec::new();
        let mut next = Some(first);

        loop {
            if let Some(job) = next.take() {
                let id = job.id;
                let result = self.execute(ctx, job);
                self.stats.record_execution(result);
                self.registry.lock().record_result(id, result);

                if self.cancel_jobs.load(Ordering::Acquire) {
                    return ControlFlow::Break(());
                }
                parents.push(id);
            }

            let Some(&parent) = parents.last() else {
                return ControlFlow::Continue(());
            };
            match self.dequeue_chained(parent) {
                Some(job) => next = Some(job),
                None => {
                    parents.pop();
                    self.release_ref(parent, true);
                }
            }
        }
    }

    fn execute(&self, ctx: &mut WorkerContext, job: Job) -> JobResult {
        let Job { id, func, .. } = job;
        ctx.set_current_job(id);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| func(&mut *ctx)));
        ctx.set_current_job(INVALID_JOB_ID);

        match outcome {
            Ok(success) => JobResult::from_success(success),
            Err(_) => {
                error!(worker = %ctx.name(), job = id, "Job panicked, aborting");
                std::process::abort();
            }
        }
    }

    /// Take the next job chained behind `parent`, dispersing part of a long
    /// chain to the global queue.
    fn dequeue_chained(&self, parent: JobId) -> Option<Job> {
        let (next, dispersed) = {
            let mut registry = self.registry.lock();
            let (next, dispersed) = registry.take_chained(parent, self.workers)?;
            let n = dispersed.len();
            if n > 0 {
                self.queue.lock().extend(dispersed);
            }
            (next, n)
        };

        if dispersed > 0 {
            self.stats.record_dispersed(dispersed);
            debug!(parent, dispersed, "Dispersed chained jobs to the global queue");
            self.notifier.signal(dispersed);
        }
        self.stats.record_chained_inline();
        Some(next)
    }
}
