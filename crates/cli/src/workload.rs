use std::sync::Arc;
use std::time::Instant;

use jobsys_scheduler::{JobDescriptor, JobHandle, JobResult, Priority, Scheduler, WorkerContext};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info};

/// Per-worker tally attached by the setup hook.
#[derive(Debug, Default)]
pub struct WorkerTally {
    pub jobs: u64,
}

/// Shape of the synthetic workload.
#[derive(Debug, Clone, Copy)]
pub struct Workload {
    pub jobs: usize,
    pub chain: usize,
    pub fail_every: usize,
}

/// Outcome of one workload run.
#[derive(Debug, Serialize)]
pub struct WorkloadReport {
    pub independent: JobResult,
    pub fan_out: JobResult,
    pub chained: JobResult,
    pub elapsed_ms: u128,
}

pub fn setup_worker(ctx: &mut WorkerContext) {
    ctx.attach(WorkerTally::default());
    debug!(worker = %ctx.name(), "Worker tally attached");
}

/// Checksum a scratch buffer filled from `seed`.
fn crunch(ctx: &mut WorkerContext, seed: usize) -> u64 {
    let buf = ctx.scratch(4096);
    for (i, b) in buf.iter_mut().enumerate() {
        *b = (i.wrapping_mul(31) ^ seed) as u8;
    }
    let sum = buf.iter().map(|&b| u64::from(b)).sum();
    if let Some(tally) = ctx.state::<WorkerTally>() {
        tally.jobs += 1;
    }
    sum
}

fn synthetic_job(index: usize, fail_every: usize) -> JobDescriptor {
    let priority = Priority::ALL[index % Priority::ALL.len()];
    JobDescriptor::new(move |ctx| {
        let sum = crunch(ctx, index);
        let fail = fail_every > 0 && index % fail_every == 0;
        sum > 0 && !fail
    })
    .with_priority(priority)
}

impl Workload {
    /// Post everything, wait for it and report the aggregate results.
    pub fn run(&self, scheduler: &Arc<Scheduler>) -> WorkloadReport {
        let started = Instant::now();
        let fail_every = self.fail_every;

        let independent: Vec<JobHandle> = scheduler.post_all(
            (0..self.jobs)
                .map(|i| synthetic_job(i, fail_every))
                .collect(),
        );
        info!(jobs = independent.len(), "Posted independent jobs");

        // A job that chains its continuations onto itself while running.
        let chained = Arc::new(Mutex::new(Vec::new()));
        let fan_out = {
            let inner = Arc::clone(scheduler);
            let chained = Arc::clone(&chained);
            let chain = self.chain;
            scheduler.post(
                JobDescriptor::new(move |ctx| {
                    let me = ctx.current_job_handle();
                    let handles = inner.enqueue_all(
                        &me,
                        (0..chain).map(|i| synthetic_job(i + 1, fail_every)).collect(),
                    );
                    chained.lock().extend(handles);
                    me.is_valid()
                })
                .with_priority(Priority::Highest),
            )
        };

        let independent = scheduler.wait_all(&independent);
        let fan_out = scheduler.wait(&fan_out);
        let chained_handles = std::mem::take(&mut *chained.lock());
        let chained = scheduler.wait_all(&chained_handles);

        WorkloadReport {
            independent,
            fan_out,
            chained,
            elapsed_ms: started.elapsed().as_millis(),
        }
    }
}
