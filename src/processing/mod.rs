mod batch;
mod executor;
mod optimizer;

pub use batch::BatchRunner;
pub use executor::JobExecutor;
pub use optimizer::{Attempt, AttemptOutcome, Optimized, TargetSizeOptimizer};
