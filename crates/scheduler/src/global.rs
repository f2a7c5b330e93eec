//! Process-wide scheduler instance.
//!
//! Subsystems that want a shared pool call [`initialise`] once at startup and
//! get the instance injected or fetched through [`instance`]. Code that does
//! not need the singleton can build its own [`Scheduler`].

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use crate::config::SchedulerConfig;
use crate::context::WorkerSetup;
use crate::error::SchedulerError;
use crate::runner::Scheduler;

static INSTANCE: Mutex<Option<Arc<Scheduler>>> = parking_lot::const_mutex(None);

/// Start the process-wide scheduler.
pub fn initialise(
    config: SchedulerConfig,
    worker_setup: Option<WorkerSetup>,
) -> Result<Arc<Scheduler>, SchedulerError> {
    let mut slot = INSTANCE.lock();
    if slot.is_some() {
        return Err(SchedulerError::AlreadyInitialised);
    }
    let scheduler = Arc::new(
        Scheduler::builder()
            .config(config)
            .setup_hook(worker_setup)
            .build()?,
    );
    *slot = Some(Arc::clone(&scheduler));
    info!("Global job scheduler initialised");
    Ok(scheduler)
}

/// The process-wide scheduler, if initialised.
pub fn instance() -> Option<Arc<Scheduler>> {
    INSTANCE.lock().clone()
}

/// Shut the process-wide scheduler down and clear the slot.
///
/// Other `Arc`s to it stay usable for lookups but it no longer runs jobs.
pub fn shutdown(kill_awaiting: bool) -> Result<(), SchedulerError> {
    let scheduler = {
        let mut slot = INSTANCE.lock();
        match slot.as_ref() {
            None => return Err(SchedulerError::NotInitialised),
            Some(scheduler) if scheduler.on_own_worker() => {
                return Err(SchedulerError::ShutdownFromWorker)
            }
            Some(_) => {}
        }
        slot.take().ok_or(SchedulerError::NotInitialised)?
    };
    scheduler.shutdown(kill_awaiting)
}
