use serde::{Deserialize, Serialize};

/// Numeric job identifier. `0` never names a live job.
pub type JobId = u64;

/// Identifier carried by invalid handles.
pub const INVALID_JOB_ID: JobId = 0;

/// Job execution priority. Higher variants run first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord, Default)]
pub enum Priority {
    /// Default priority for bulk work.
    #[default]
    Normal = 0,
    High = 1,
    VeryHigh = 2,
    /// Jumps ahead of everything else that is queued.
    Highest = 3,
}

impl Priority {
    /// All priorities, lowest first.
    pub const ALL: [Priority; 4] = [
        Priority::Normal,
        Priority::High,
        Priority::VeryHigh,
        Priority::Highest,
    ];
}

/// Observable state of a job.
///
/// `None` and `Running` both mean "not finished yet" to a waiter. `None` is
/// also what lookups return once a job has been reaped or cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum JobResult {
    /// No result recorded, or the job is no longer tracked.
    #[default]
    None,
    /// Queued, chained or executing.
    Running,
    /// The job function returned `true`.
    Ok,
    /// The job function returned `false`.
    Fail,
}

impl JobResult {
    /// Whether the job has produced its one and only outcome.
    pub fn is_finished(self) -> bool {
        matches!(self, JobResult::Ok | JobResult::Fail)
    }

    pub(crate) fn from_success(success: bool) -> Self {
        if success {
            JobResult::Ok
        } else {
            JobResult::Fail
        }
    }
}
