// Module declarations in dependency order
pub mod utils;
pub mod core;
pub mod codec;
pub mod messaging;
pub mod state;
pub mod processing;
pub mod worker;

// Public exports for external consumers
pub use crate::core::{
    BatchSummary, CancelFlag, CompressionJob, CompressionSettings, JobCategory, JobId, JobOutcome,
    JobOutput, JobReport, JobRequest, OptimizationResult, ProgressType, ProgressUpdate, ResizeMode,
    ResizeSpec,
};
pub use codec::{Codec, Encoded, ImageCodec};
pub use messaging::{Message, MessageChannel, MessageHandler, MessageReceiver, MessageSender, Pump, PumpHandle};
pub use processing::{JobExecutor, TargetSizeOptimizer};
pub use state::{ObservableStore, PropertyChange, Subscriber};
pub use utils::{CodecError, CompressError, CompressResult, OptimizerError, OutputFormat, ValidationError};
pub use worker::{Dispatcher, JobHandle, WorkerError};

// The binary in main.rs is a thin headless driver over this API.
