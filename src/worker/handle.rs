use tokio::task::JoinHandle;

use crate::core::{CancelFlag, JobId};
use crate::worker::WorkerResult;

/// Handle to a submitted job or batch.
///
/// Dropping the handle does not stop the work.
#[derive(Debug)]
pub struct JobHandle<T> {
    id: JobId,
    cancel: CancelFlag,
    task: JoinHandle<T>,
}

impl<T> JobHandle<T> {
    pub(crate) fn new(id: JobId, cancel: CancelFlag, task: JoinHandle<T>) -> Self {
        Self { id, cancel, task }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    /// Requests cooperative cancellation. A codec call already in progress
    /// is not interrupted.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// A flag that cancels this job, for callers that hand the handle off.
    pub fn canceller(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn wait(self) -> WorkerResult<T> {
        Ok(self.task.await?)
    }
}
