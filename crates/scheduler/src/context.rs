use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use crate::handle::JobHandle;
use crate::runner::Shared;
use crate::types::{JobId, INVALID_JOB_ID};

/// Hook run once on every worker before it takes its first job.
pub type WorkerSetup = Arc<dyn Fn(&mut WorkerContext) + Send + Sync + 'static>;

/// Identity of a worker thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerInfo {
    pub index: usize,
    pub name: String,
}

thread_local! {
    static CURRENT_WORKER: RefCell<Option<(u64, WorkerInfo)>> = const { RefCell::new(None) };
}

/// Whether the calling thread is a worker of any scheduler.
pub fn is_worker_thread() -> bool {
    CURRENT_WORKER.with(|slot| slot.borrow().is_some())
}

/// The worker the calling thread is, if any.
pub fn current_worker() -> Option<WorkerInfo> {
    CURRENT_WORKER.with(|slot| slot.borrow().as_ref().map(|(_, info)| info.clone()))
}

/// Instance ID of the scheduler owning the calling worker thread.
pub(crate) fn current_owner() -> Option<u64> {
    CURRENT_WORKER.with(|slot| slot.borrow().as_ref().map(|(owner, _)| *owner))
}

pub(crate) fn enter_worker(owner: u64, info: WorkerInfo) {
    CURRENT_WORKER.with(|slot| *slot.borrow_mut() = Some((owner, info)));
}

pub(crate) fn leave_worker() {
    CURRENT_WORKER.with(|slot| *slot.borrow_mut() = None);
}

/// Per-worker state handed to every job function.
///
/// Owned by its worker thread for the thread's whole life and never shared.
pub struct WorkerContext {
    info: WorkerInfo,
    scratch: Vec<u8>,
    scratch_high_water: usize,
    state: HashMap<TypeId, Box<dyn Any>>,
    current_job: JobId,
    shared: Weak<Shared>,
}

impl WorkerContext {
    pub(crate) fn new(info: WorkerInfo, scratch_bytes: usize, shared: Weak<Shared>) -> Self {
        Self {
            info,
            scratch: vec![0; scratch_bytes],
            scratch_high_water: 0,
            state: HashMap::new(),
            current_job: INVALID_JOB_ID,
            shared,
        }
    }

    pub fn index(&self) -> usize {
        self.info.index
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn info(&self) -> &WorkerInfo {
        &self.info
    }

    /// Zeroed scratch memory of `len` bytes, reused across jobs on this worker.
    pub fn scratch(&mut self, len: usize) -> &mut [u8] {
        if len > self.scratch.len() {
            self.scratch.resize(len, 0);
        }
        self.scratch_high_water = self.scratch_high_water.max(len);
        let region = &mut self.scratch[..len];
        region.fill(0);
        region
    }

    /// Current size of the scratch buffer.
    pub fn scratch_capacity(&self) -> usize {
        self.scratch.len()
    }

    /// Largest scratch region any job has asked for so far.
    pub fn scratch_high_water(&self) -> usize {
        self.scratch_high_water
    }

    /// Attach per-thread state (an interpreter, a cache, ...). Replaces any
    /// earlier value of the same type.
    pub fn attach<T: Any>(&mut self, value: T) {
        self.state.insert(TypeId::of::<T>(), Box::new(value));
    }

    pub fn state<T: Any>(&mut self) -> Option<&mut T> {
        self.state
            .get_mut(&TypeId::of::<T>())
            .and_then(|value| value.downcast_mut::<T>())
    }

    pub fn detach<T: Any>(&mut self) -> Option<T> {
        self.state
            .remove(&TypeId::of::<T>())
            .and_then(|value| value.downcast::<T>().ok())
            .map(|value| *value)
    }

    /// ID of the job currently executing on this worker, or `0` between jobs.
    pub fn current_job(&self) -> JobId {
        self.current_job
    }

    /// A new handle to the job currently executing, for chaining work onto it.
    ///
    /// Invalid when called between jobs.
    pub fn current_job_handle(&self) -> JobHandle {
        if self.current_job == INVALID_JOB_ID {
            return JobHandle::invalid();
        }
        match self.shared.upgrade() {
            Some(shared) => shared.acquire_handle(self.current_job),
            None => JobHandle::invalid(),
        }
    }

    pub(crate) fn set_current_job(&mut self, id: JobId) {
        self.current_job = id;
    }
}

impl fmt::Debug for WorkerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerContext")
            .field("index", &self.info.index)
            .field("name", &self.info.name)
            .field("scratch_capacity", &self.scratch.len())
            .field("current_job", &self.current_job)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(scratch_bytes: usize) -> WorkerContext {
        let info = WorkerInfo {
            index: 3,
            name: "Worker Thread 3".to_string(),
        };
        WorkerContext::new(info, scratch_bytes, Weak::new())
    }

    #[test]
    fn identity() {
        let ctx = context(16);
        assert_eq!(ctx.index(), 3);
        assert_eq!(ctx.name(), "Worker Thread 3");
        assert_eq!(ctx.current_job(), INVALID_JOB_ID);
        assert!(!ctx.current_job_handle().is_valid());
    }

    #[test]
    fn scratch_is_zeroed_and_grows() {
        let mut ctx = context(8);
        ctx.scratch(8).copy_from_slice(&[7; 8]);
        assert!(ctx.scratch(4).iter().all(|&b| b == 0));

        assert_eq!(ctx.scratch(32).len(), 32);
        assert_eq!(ctx.scratch_capacity(), 32);
        assert_eq!(ctx.scratch_high_water(), 32);
    }

    #[test]
    fn attached_state_by_type() {
        struct Interpreter {
            calls: u32,
        }

        let mut ctx = context(1);
        assert!(ctx.state::<Interpreter>().is_none());

        ctx.attach(Interpreter { calls: 0 });
        ctx.attach(String::from("cache"));
        ctx.state::<Interpreter>().unwrap().calls += 1;
        assert_eq!(ctx.state::<Interpreter>().unwrap().calls, 1);
        assert_eq!(ctx.detach::<String>().as_deref(), Some("cache"));
        assert!(ctx.state::<String>().is_none());
    }

    #[test]
    fn thread_local_worker_identity() {
        assert!(!is_worker_thread());
        std::thread::spawn(|| {
            let info = WorkerInfo {
                index: 1,
                name: "Pool 1".to_string(),
            };
            enter_worker(9, info.clone());
            assert!(is_worker_thread());
            assert_eq!(current_worker(), Some(info));
            assert_eq!(current_owner(), Some(9));
            leave_worker();
            assert!(current_worker().is_none());
        })
        .join()
        .unwrap();
    }
}
