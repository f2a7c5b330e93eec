//! Job scheduler runner -- the worker pool and the public job API.
//!
//! Split into focused submodules:
//! - `core`: Scheduler struct, shared state, reference counting and accessors
//! - `submit`: posting, chaining and cancelling jobs
//! - `wait`: blocking waits and result lookups
//! - `worker`: the per-thread fetch/execute/drain loop
//! - `lifecycle`: builder, thread spawn and shutdown
//!
//! Lock order is notifier, then registry, then queue. Jobs are never dropped
//! while the registry lock is held.

mod core;
mod lifecycle;
mod submit;
mod wait;
mod worker;

pub use self::core::Scheduler;
pub(crate) use self::core::Shared;
pub use self::lifecycle::SchedulerBuilder;
