//! Core types and configuration.
//!
//! This module contains the fundamental types used throughout the crate:
//! - [`CompressionSettings`]: Named, configurable constants
//! - [`CompressionJob`]: A validated unit of work
//! - [`OptimizationResult`], [`JobReport`], [`BatchSummary`]: Results handed back to submitters
//! - [`ProgressUpdate`]: Progress tracking carried on the message channel

mod cancel;
mod job;
mod progress;
mod settings;
mod types;

pub use cancel::CancelFlag;
pub use job::{CompressionJob, JobRequest};
pub use progress::{ProgressType, ProgressUpdate};
pub use settings::CompressionSettings;
pub use types::{
    BatchSummary, EncodeOptions, ExifHandling, JobCategory, JobId, JobOutcome, JobOutput,
    JobReport, OptimizationResult, ResizeMode, ResizeSpec,
};
