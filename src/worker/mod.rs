mod dispatcher;
mod error;
mod handle;

pub use dispatcher::Dispatcher;
pub use error::{WorkerError, WorkerResult};
pub use handle::JobHandle;
