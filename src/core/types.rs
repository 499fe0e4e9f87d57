//! Core types for compression jobs and their results.

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::utils::{CompressError, OutputFormat};

/// How the source is scaled before encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResizeMode {
    #[default]
    None,
    Width,
    Height,
    LongestSide,
    Percentage,
}

/// Resize mode plus its numeric argument (pixels, or percent for `Percentage`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResizeSpec {
    pub mode: ResizeMode,
    pub value: u32,
}

impl ResizeSpec {
    pub fn new(mode: ResizeMode, value: u32) -> Self {
        Self { mode, value }
    }

    pub fn none() -> Self {
        Self::default()
    }

    /// Output dimensions for a `width` x `height` source.
    ///
    /// Never enlarges: a target larger than the source keeps the source size.
    pub fn target_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        if width == 0 || height == 0 {
            return (width, height);
        }
        match self.mode {
            ResizeMode::None => (width, height),
            ResizeMode::Width => fit_primary(width, height, self.value),
            ResizeMode::Height => {
                let (h, w) = fit_primary(height, width, self.value);
                (w, h)
            }
            ResizeMode::LongestSide if width >= height => fit_primary(width, height, self.value),
            ResizeMode::LongestSide => {
                let (h, w) = fit_primary(height, width, self.value);
                (w, h)
            }
            ResizeMode::Percentage if self.value >= 100 => (width, height),
            ResizeMode::Percentage => (
                scale(width, self.value as u64, 100),
                scale(height, self.value as u64, 100),
            ),
        }
    }
}

/// Scales `primary` down to `target`, keeping the aspect ratio for `secondary`.
fn fit_primary(primary: u32, secondary: u32, target: u32) -> (u32, u32) {
    if target == 0 || primary <= target {
        return (primary, secondary);
    }
    (target, scale(secondary, target as u64, primary as u64))
}

fn scale(value: u32, num: u64, den: u64) -> u32 {
    let scaled = (value as u64 * num + den / 2) / den;
    scaled.clamp(1, u32::MAX as u64) as u32
}

/// What happens to EXIF metadata on re-encode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExifHandling {
    Keep,
    #[default]
    Strip,
}

/// Encoder knobs passed through to the codec untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EncodeOptions {
    pub optimize: bool,
    pub progressive: bool,
    pub lossless: bool,
    pub exif_handling: ExifHandling,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            optimize: true,
            progressive: false,
            lossless: false,
            exif_handling: ExifHandling::Strip,
        }
    }
}

/// Job category. At most one `Single` and one `Preview` job is current per dispatcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobCategory {
    #[default]
    Single,
    Preview,
    BatchItem,
}

/// Identity of a job or batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub u64);

static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

impl JobId {
    pub fn next() -> Self {
        Self(NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// Outcome of one target-size search. Immutable once returned.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationResult {
    pub achieved_quality: u8,
    pub achieved_bytes: u64,
    pub target_met: bool,
    pub attempts: u32,
    pub elapsed: Duration,
    /// The answer sits at or below the configured quality floor
    pub low_quality_warning: bool,
}

/// Product of a successfully executed job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOutput {
    pub input: PathBuf,
    /// Written file; `None` for previews
    pub destination: Option<PathBuf>,
    pub format: OutputFormat,
    pub quality: u8,
    pub original_size: u64,
    pub output_size: u64,
    pub dimensions: (u32, u32),
    /// Bytes saved (negative if the file grew)
    pub saved_bytes: i64,
    /// Saved bytes as a percentage of the original size
    pub compression_ratio: f64,
    pub optimization: Option<OptimizationResult>,
    /// Encoded bytes kept in memory; only set for previews
    #[serde(skip)]
    pub encoded: Option<Vec<u8>>,
}

impl JobOutput {
    pub fn savings(original_size: u64, output_size: u64) -> (i64, f64) {
        let saved = original_size as i64 - output_size as i64;
        let ratio = if original_size > 0 {
            saved as f64 / original_size as f64 * 100.0
        } else {
            0.0
        };
        (saved, ratio)
    }
}

/// How a job ended. Cancellation is its own outcome, never a failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "camelCase")]
pub enum JobOutcome {
    Completed(JobOutput),
    Failed(CompressError),
    Cancelled,
}

/// Result object handed back to the submitter of a job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReport {
    pub job_id: JobId,
    pub category: JobCategory,
    pub input: PathBuf,
    pub outcome: JobOutcome,
    /// A newer job of the same category was submitted before this one finished
    pub stale: bool,
}

impl JobReport {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, JobOutcome::Completed(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, JobOutcome::Failed(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.outcome, JobOutcome::Cancelled)
    }

    pub fn output(&self) -> Option<&JobOutput> {
        match &self.outcome {
            JobOutcome::Completed(output) => Some(output),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&CompressError> {
        match &self.outcome {
            JobOutcome::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// Aggregate of a batch run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub batch_id: JobId,
    pub total: usize,
    /// Items that completed successfully
    pub processed_count: usize,
    /// Items that completed with an error
    pub failed_count: usize,
    /// The batch stopped early on request
    pub cancelled: bool,
    /// First failing item names, bounded by the configured sample size
    pub failed_sample: Vec<String>,
    /// Failing items not named in `failed_sample`
    pub failed_remainder: usize,
    /// One report per finished item, in input order
    pub reports: Vec<JobReport>,
}

impl BatchSummary {
    pub fn new(batch_id: JobId, total: usize) -> Self {
        Self {
            batch_id,
            total,
            processed_count: 0,
            failed_count: 0,
            cancelled: false,
            failed_sample: Vec::new(),
            failed_remainder: 0,
            reports: Vec::with_capacity(total),
        }
    }

    /// Items that ran to completion, successfully or not.
    pub fn finished_count(&self) -> usize {
        self.processed_count + self.failed_count
    }

    /// Human-readable aggregate, suitable for a log line or dialog.
    pub fn summary_message(&self) -> String {
        let mut message = if self.cancelled {
            format!(
                "Cancelled after {} of {} files: {} processed, {} failed",
                self.finished_count(), self.total, self.processed_count, self.failed_count
            )
        } else if self.failed_count == 0 {
            format!("All {} files processed", self.processed_count)
        } else {
            format!("{} files processed, {} failed", self.processed_count, self.failed_count)
        };

        if !self.failed_sample.is_empty() {
            message.push_str(&format!("; failing: {}", self.failed_sample.join(", ")));
            if self.failed_remainder > 0 {
                message.push_str(&format!(" and {} more", self.failed_remainder));
            }
        }
        message
    }
}
