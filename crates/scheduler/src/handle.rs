use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Weak;

use crate::runner::Shared;
use crate::types::{JobId, INVALID_JOB_ID};

/// Reference-counted caller-side proxy for a job.
///
/// Cloning adds a reference to the job's registry entry and dropping removes
/// one. The entry (and with it the job's result) lives until the job has run
/// and every handle is gone. A handle never keeps the scheduler itself alive.
pub struct JobHandle {
    id: JobId,
    shared: Weak<Shared>,
}

impl JobHandle {
    /// A handle that refers to no job.
    pub fn invalid() -> Self {
        Self {
            id: INVALID_JOB_ID,
            shared: Weak::new(),
        }
    }

    /// Wrap a reference the registry has already counted.
    pub(crate) fn adopt(id: JobId, shared: Weak<Shared>) -> Self {
        Self { id, shared }
    }

    pub fn is_valid(&self) -> bool {
        self.id != INVALID_JOB_ID
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    /// Release this handle's reference and make it invalid.
    pub fn reset(&mut self) {
        *self = Self::invalid();
    }
}

impl Default for JobHandle {
    fn default() -> Self {
        Self::invalid()
    }
}

impl Clone for JobHandle {
    fn clone(&self) -> Self {
        if !self.is_valid() {
            return Self::invalid();
        }
        if let Some(shared) = self.shared.upgrade() {
            shared.registry.lock().increment(self.id);
        }
        Self {
            id: self.id,
            shared: self.shared.clone(),
        }
    }
}

impl Drop for JobHandle {
    fn drop(&mut self) {
        if !self.is_valid() {
            return;
        }
        if let Some(shared) = self.shared.upgrade() {
            shared.release_ref(self.id, false);
        }
    }
}

impl PartialEq for JobHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for JobHandle {}

impl Hash for JobHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("JobHandle").field(&self.id).finish()
    }
}
