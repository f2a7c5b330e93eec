//! Parallel job scheduler.
//!
//! A fixed pool of worker threads runs short prioritised jobs. Jobs can be
//! chained to run after another job finishes, are tracked through
//! reference-counted [`JobHandle`]s, and can be waited on, queried or
//! cancelled from any thread.
//!
//! ```no_run
//! use jobsys_scheduler::{JobDescriptor, JobResult, Priority, Scheduler, SchedulerConfig};
//!
//! let scheduler = Scheduler::new(SchedulerConfig::with_workers(4))?;
//! let load = scheduler.post(JobDescriptor::new(|_ctx| true).with_priority(Priority::High));
//! let parse = scheduler.enqueue_one(&load, JobDescriptor::new(|ctx| ctx.scratch(64).len() == 64));
//! assert_eq!(scheduler.wait_all(&[load, parse]), JobResult::Ok);
//! scheduler.shutdown(false)?;
//! # Ok::<(), jobsys_scheduler::SchedulerError>(())
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod global;
pub mod handle;
pub mod job;
pub mod metrics;
pub mod types;

mod job_list;
mod notifier;
mod queue;
mod registry;
mod runner;

pub use config::SchedulerConfig;
pub use context::{current_worker, is_worker_thread, WorkerContext, WorkerInfo, WorkerSetup};
pub use error::SchedulerError;
pub use handle::JobHandle;
pub use job::{JobDescriptor, JobFn};
pub use metrics::SchedulerStats;
pub use runner::{Scheduler, SchedulerBuilder};
pub use types::{JobId, JobResult, Priority, INVALID_JOB_ID};
