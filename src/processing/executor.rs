//! Runs one compression job to completion on the calling (worker) thread.
//!
//! read source → decode → optimize or encode directly → write destination.
//! Previews stop after encoding and keep their bytes in memory.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::codec::Codec;
use crate::core::{
    CancelFlag, CompressionJob, CompressionSettings, JobOutcome, JobOutput, OptimizationResult,
};
use crate::messaging::MessageSender;
use crate::processing::optimizer::{Attempt, AttemptOutcome, TargetSizeOptimizer};
use crate::utils::{
    CompressResult, extract_filename, read_source, write_destination,
};

pub struct JobExecutor<C: Codec> {
    codec: Arc<C>,
    settings: CompressionSettings,
}

impl<C: Codec> JobExecutor<C> {
    pub fn new(codec: Arc<C>, settings: CompressionSettings) -> Self {
        Self { codec, settings }
    }

    pub fn settings(&self) -> &CompressionSettings {
        &self.settings
    }

    /// Executes `job`, folding every error into the outcome.
    ///
    /// `cancel` is polled before decoding and before writing.
    pub fn run(&self, job: &CompressionJob, cancel: Option<&CancelFlag>, messages: &MessageSender) -> JobOutcome {
        match self.execute(job, cancel, messages) {
            Ok(Some(output)) => JobOutcome::Completed(output),
            Ok(None) => {
                debug!("{} cancelled", job.id);
                JobOutcome::Cancelled
            }
            Err(err) => {
                warn!("Compression failed for {}: {}", job.input.display(), err);
                JobOutcome::Failed(err)
            }
        }
    }

    fn execute(
        &self,
        job: &CompressionJob,
        cancel: Option<&CancelFlag>,
        messages: &MessageSender,
    ) -> CompressResult<Option<JobOutput>> {
        let cancelled = || cancel.is_some_and(CancelFlag::is_cancelled);
        if cancelled() {
            return Ok(None);
        }

        let file_name = extract_filename(&job.input);
        let data = read_source(&job.input)?;
        let original_size = data.len() as u64;
        let source = self.codec.decode(&data)?;
        drop(data);

        let (width, height) = self.codec.dimensions(&source);
        let format = job.format.resolve(&job.input);
        debug!("{}: {} {}x{} -> {}", job.id, file_name, width, height, format);

        let (quality, encoded, optimization) = if job.needs_search() {
            let optimizer = TargetSizeOptimizer::new(self.codec.as_ref(), &self.settings);
            let mut report_attempt = |attempt: &Attempt| {
                let verdict = match &attempt.outcome {
                    AttemptOutcome::Fits { bytes } => format!("{bytes} bytes, fits"),
                    AttemptOutcome::OverBudget { bytes } => format!("{bytes} bytes, too large"),
                    AttemptOutcome::CodecFailed(err) => format!("failed: {err}"),
                };
                messages.log(format!(
                    "{file_name}: trying quality {} ({}/{}) - {verdict}",
                    attempt.quality, attempt.number, attempt.max_attempts
                ));
            };
            let optimized = optimizer.optimize(&source, job, format, &mut report_attempt)?;
            let result = optimized.result;
            self.announce(&file_name, job, &result, messages);
            (result.achieved_quality, optimized.encoded, Some(result))
        } else {
            let encoded = self.codec.encode(&source, &job.resize, job.quality, format, &job.options)?;
            (job.quality, encoded, None)
        };

        if cancelled() {
            return Ok(None);
        }

        let output_size = encoded.byte_count();
        let (saved_bytes, compression_ratio) = JobOutput::savings(original_size, output_size);

        let (destination, kept) = match job.destination() {
            Some(destination) => {
                write_destination(&destination, &encoded.bytes, job.overwrite)?;
                debug!(
                    "{} → {} ({} bytes saved, {:.1}%)",
                    file_name, destination.display(), saved_bytes, compression_ratio
                );
                (Some(destination), None)
            }
            _ => (None, Some(encoded.bytes)),
        };

        Ok(Some(JobOutput {
            input: job.input.clone(),
            destination,
            format,
            quality,
            original_size,
            output_size,
            dimensions: encoded.dimensions,
            saved_bytes,
            compression_ratio,
            optimization,
            encoded: kept,
        }))
    }

    fn announce(&self, file_name: &str, job: &CompressionJob, result: &OptimizationResult, messages: &MessageSender) {
        let target = job.target_bytes.unwrap_or_default();
        if result.target_met {
            messages.log(format!(
                "{file_name}: quality {} reaches {} bytes (target {target})",
                result.achieved_quality, result.achieved_bytes
            ));
        } else {
            messages.log_warning(format!(
                "{file_name}: target {target} bytes not reachable, best was {} bytes at quality {}",
                result.achieved_bytes, result.achieved_quality
            ));
        }
        if result.low_quality_warning {
            messages.log_warning(format!(
                "{file_name}: quality dropped to {}, expect visible artifacts",
                result.achieved_quality
            ));
        }
    }
}
