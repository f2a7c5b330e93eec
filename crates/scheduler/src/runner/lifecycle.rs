use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use tracing::{error, info, warn};

use crate::config::SchedulerConfig;
use crate::context::{WorkerContext, WorkerInfo, WorkerSetup};
use crate::error::SchedulerError;

use super::worker::worker_main;
use super::{Scheduler, Shared};

/// Builder for [`Scheduler`].
#[derive(Default)]
pub struct SchedulerBuilder {
    config: SchedulerConfig,
    worker_setup: Option<WorkerSetup>,
}

impl SchedulerBuilder {
    pub fn config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the pool size. 0 = available parallelism.
    pub fn worker_threads(mut self, n: usize) -> Self {
        self.config.worker_threads = n;
        self
    }

    /// Run `setup` once on every worker before it takes any job.
    pub fn worker_setup<F>(mut self, setup: F) -> Self
    where
        F: Fn(&mut WorkerContext) + Send + Sync + 'static,
    {
        self.worker_setup = Some(Arc::new(setup));
        self
    }

    pub fn setup_hook(mut self, setup: Option<WorkerSetup>) -> Self {
        self.worker_setup = setup;
        self
    }

    /// Validate the config and spawn the worker threads.
    pub fn build(self) -> Result<Scheduler, SchedulerError> {
        self.config.validate()?;
        let workers = self.config.resolved_worker_threads();
        let shared = Arc::new(Shared::new(self.config, workers));

        let mut threads = Vec::with_capacity(workers);
        for index in 0..workers {
            let info = WorkerInfo {
                index,
                name: format!("{} {}", shared.config.thread_name_prefix, index),
            };
            let worker_shared = Arc::clone(&shared);
            let setup = self.worker_setup.clone();
            let spawned = thread::Builder::new()
                .name(info.name.clone())
                .spawn(move || worker_main(worker_shared, info, setup));

            match spawned {
                Ok(handle) => threads.push(handle),
                Err(source) => {
                    error!(index, error = %source, "Failed to spawn worker thread");
                    shared.stop(true);
                    for handle in threads {
                        if handle.join().is_err() {
                            error!("Worker thread panicked");
                        }
                    }
                    return Err(SchedulerError::Spawn { index, source });
                }
            }
        }

        info!(workers, "Job scheduler started");
        Ok(Scheduler {
            shared,
            threads: Mutex::new(threads),
        })
    }
}

impl Scheduler {
    pub fn builder() -> SchedulerBuilder {
        SchedulerBuilder::default()
    }

    /// Stop the pool and join every worker.
    ///
    /// With `kill_awaiting == false` workers keep going until the queue is
    /// empty. Otherwise they stop after the job they are running and every
    /// queued or chained job is dropped unrun. Must not be called from one of
    /// this scheduler's own workers.
    pub fn shutdown(&self, kill_awaiting: bool) -> Result<(), SchedulerError> {
        if self.shared.is_own_worker() {
            return Err(SchedulerError::ShutdownFromWorker);
        }
        if self.shared.shutdown_requested.swap(true, Ordering::AcqRel) {
            return Err(SchedulerError::AlreadyShutDown);
        }

        info!(kill_awaiting, "Job scheduler shutdown requested");
        self.shared.stop(kill_awaiting);

        let threads = std::mem::take(&mut *self.threads.lock());
        for handle in threads {
            if handle.join().is_err() {
                error!("Worker thread panicked");
            }
        }
        self.shared.stopped.store(true, Ordering::Release);

        let abandoned = self.shared.take_abandoned();
        if !abandoned.is_empty() {
            if kill_awaiting {
                info!(count = abandoned.len(), "Dropping jobs that never ran");
            } else {
                warn!(
                    count = abandoned.len(),
                    "Jobs were still queued after a graceful shutdown, dropping them"
                );
            }
        }
        drop(abandoned);

        info!("Job scheduler shut down");
        Ok(())
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if self.shared.shutdown_requested.load(Ordering::Acquire) {
            return;
        }
        match self.shutdown(true) {
            Ok(()) => {}
            Err(SchedulerError::ShutdownFromWorker) => {
                // Last reference went away inside a job: stop without joining.
                self.shared.shutdown_requested.store(true, Ordering::Release);
                self.shared.stop(true);
            }
            Err(e) => warn!(error = %e, "Shutdown on drop failed"),
        }
    }
}
