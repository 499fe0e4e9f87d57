//! Target-size quality search.
//!
//! Binary search over `[quality_min, quality_max]`: every attempt lowers the
//! upper bound to `candidate - 1`, and the first candidate whose output fits
//! the budget is the answer. Later candidates are all lower, so nothing after
//! the first fit can beat it. When nothing fits, the smallest output seen is
//! returned with `target_met = false`.
//!
//! The search assumes output size does not grow as quality drops.

use std::time::Instant;
use tracing::{debug, warn};

use crate::codec::{Codec, Encoded};
use crate::core::{CompressionJob, CompressionSettings, OptimizationResult};
use crate::utils::{CodecError, OptimizerError, OutputFormat};

/// What one codec call produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Fits { bytes: u64 },
    OverBudget { bytes: u64 },
    CodecFailed(CodecError),
}

/// One step of the search, reported to the attempt observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    /// 1-based attempt number
    pub number: u32,
    pub max_attempts: u32,
    pub quality: u8,
    pub outcome: AttemptOutcome,
}

/// Search result together with the bytes that produced it.
#[derive(Debug, Clone)]
pub struct Optimized {
    pub result: OptimizationResult,
    pub encoded: Encoded,
}

pub struct TargetSizeOptimizer<'a, C: Codec> {
    codec: &'a C,
    settings: &'a CompressionSettings,
}

impl<'a, C: Codec> TargetSizeOptimizer<'a, C> {
    pub fn new(codec: &'a C, settings: &'a CompressionSettings) -> Self {
        Self { codec, settings }
    }

    /// Searches for a quality whose output fits `job.target_bytes`.
    ///
    /// `format` must already be resolved. Never fails because the budget is
    /// unreachable; only codec failures abort the search.
    pub fn optimize(
        &self,
        source: &C::Source,
        job: &CompressionJob,
        format: OutputFormat,
        on_attempt: &mut dyn FnMut(&Attempt),
    ) -> Result<Optimized, OptimizerError> {
        let target = job.target_bytes.filter(|&b| b > 0).ok_or(OptimizerError::NoTarget)?;
        let started = Instant::now();
        let max_attempts = self.settings.max_attempts;

        let min_q = self.settings.quality_min as i32;
        let mut max_q = self.settings.quality_max as i32;
        let mut attempts = 0u32;
        let mut consecutive_errors = 0u32;
        let mut last_error: Option<CodecError> = None;
        let mut fit: Option<(u8, Encoded)> = None;
        let mut smallest: Option<(u8, Encoded)> = None;

        while attempts < max_attempts && min_q <= max_q {
            let candidate = ((min_q + max_q) / 2) as u8;
            attempts += 1;

            let outcome = match self.codec.encode(source, &job.resize, candidate, format, &job.options) {
                Ok(encoded) => {
                    consecutive_errors = 0;
                    let bytes = encoded.byte_count();
                    if bytes <= target {
                        fit = Some((candidate, encoded));
                        AttemptOutcome::Fits { bytes }
                    } else {
                        let smaller = smallest.as_ref().is_none_or(|(q, best)| {
                            bytes < best.byte_count() || (bytes == best.byte_count() && candidate < *q)
                        });
                        if smaller {
                            smallest = Some((candidate, encoded));
                        }
                        AttemptOutcome::OverBudget { bytes }
                    }
                }
                Err(err) => {
                    consecutive_errors += 1;
                    warn!("Codec failed at quality {} ({}/{}): {}", candidate, attempts, max_attempts, err);
                    last_error = Some(err.clone());
                    AttemptOutcome::CodecFailed(err)
                }
            };

            debug!("{}: quality {} -> {:?} ({}/{})", job.id, candidate, outcome, attempts, max_attempts);
            on_attempt(&Attempt {
                number: attempts,
                max_attempts,
                quality: candidate,
                outcome,
            });

            if fit.is_some() {
                break;
            }
            if consecutive_errors >= self.settings.max_consecutive_codec_errors {
                let last = last_error.unwrap_or_else(|| CodecError::encode("unknown failure"));
                return Err(OptimizerError::CodecFailures { count: consecutive_errors, last });
            }
            max_q = candidate as i32 - 1;
        }

        let (target_met, (quality, encoded)) = match (fit, smallest) {
            (Some(found), _) => (true, found),
            (None, Some(closest)) => (false, closest),
            (None, None) => {
                let last = last_error.unwrap_or_else(|| CodecError::encode("no attempt was made"));
                return Err(OptimizerError::NoSuccessfulAttempt { attempts, last });
            }
        };

        let result = OptimizationResult {
            achieved_quality: quality,
            achieved_bytes: encoded.byte_count(),
            target_met,
            attempts,
            elapsed: started.elapsed(),
            low_quality_warning: quality <= self.settings.low_quality_threshold,
        };

        if target_met {
            debug!("{}: quality {} fits {} bytes in {} attempts", job.id, quality, target, attempts);
        } else {
            warn!(
                "{}: target {} bytes not reachable, smallest was {} bytes at quality {}",
                job.id, target, result.achieved_bytes, quality
            );
        }

        Ok(Optimized { result, encoded })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::testing::{ScriptedCodec, reference_curve};
    use crate::core::{EncodeOptions, JobCategory, JobId, ResizeSpec};
    use proptest::prelude::*;
    use std::path::PathBuf;

    fn job(target_bytes: u64) -> CompressionJob {
        CompressionJob {
            id: JobId(1),
            input: PathBuf::from("in.jpg"),
            output: Some(PathBuf::from("out.jpg")),
            resize: ResizeSpec::none(),
            quality: 85,
            format: OutputFormat::Jpeg,
            options: EncodeOptions::default(),
            target_bytes: Some(target_bytes),
            category: JobCategory::Single,
            detailed: false,
            overwrite: false,
        }
    }

    fn run(codec: &ScriptedCodec, settings: &CompressionSettings, target: u64) -> Result<Optimized, OptimizerError> {
        TargetSizeOptimizer::new(codec, settings).optimize(&(), &job(target), OutputFormat::Jpeg, &mut |_| {})
    }

    #[test]
    fn reference_curve_converges_low_and_fast() {
        let codec = ScriptedCodec::new(|q| Ok(reference_curve(q)));
        let settings = CompressionSettings::default();

        let optimized = run(&codec, &settings, 50_000).unwrap();
        let result = optimized.result;

        assert!(result.target_met);
        assert!(result.achieved_bytes <= 50_000);
        assert!((10..=30).contains(&result.achieved_quality), "quality {}", result.achieved_quality);
        assert!(result.attempts <= 4);
        assert_eq!(codec.calls(), result.attempts);
        assert_eq!(optimized.encoded.byte_count(), result.achieved_bytes);
        assert!(!result.low_quality_warning);
    }

    #[test]
    fn unreachable_target_reports_smallest_observed() {
        let codec = ScriptedCodec::linear(10_000, 100);
        let settings = CompressionSettings::default();

        let result = run(&codec, &settings, 500).unwrap().result;

        assert!(!result.target_met);
        assert_eq!(result.achieved_quality, settings.quality_min);
        assert_eq!(result.achieved_bytes, 10_000 + settings.quality_min as u64 * 100);
        assert!(result.attempts <= settings.max_attempts);
        assert!(result.low_quality_warning);
    }

    #[test]
    fn attempt_cap_is_respected() {
        let codec = ScriptedCodec::linear(10_000, 100);
        let settings = CompressionSettings { max_attempts: 2, ..CompressionSettings::default() };

        let result = run(&codec, &settings, 500).unwrap().result;
        assert_eq!(result.attempts, 2);
        assert_eq!(codec.calls(), 2);
        assert_eq!(codec.qualities(), vec![50, 27]);
        assert_eq!(result.achieved_quality, 27);
    }

    #[test]
    fn consecutive_codec_errors_abort() {
        let codec = ScriptedCodec::new(|_| Err(CodecError::encode("encoder crashed")));
        let settings = CompressionSettings::default();

        let err = run(&codec, &settings, 50_000).unwrap_err();
        assert_eq!(
            err,
            OptimizerError::CodecFailures { count: 3, last: CodecError::encode("encoder crashed") }
        );
        assert_eq!(codec.calls(), 3);
    }

    #[test]
    fn isolated_codec_errors_count_as_failed_attempts() {
        // Fails at the first two candidates only, then behaves.
        let codec = ScriptedCodec::new(|q| {
            if q >= 27 { Err(CodecError::encode("flaky")) } else { Ok(1_000) }
        });
        let settings = CompressionSettings::default();
        let mut seen = Vec::new();

        let optimized = TargetSizeOptimizer::new(&codec, &settings)
            .optimize(&(), &job(5_000), OutputFormat::Jpeg, &mut |a| seen.push(a.clone()))
            .unwrap();

        assert!(optimized.result.target_met);
        assert_eq!(optimized.result.attempts, 3);
        assert!(matches!(seen[0].outcome, AttemptOutcome::CodecFailed(_)));
        assert!(matches!(seen[1].outcome, AttemptOutcome::CodecFailed(_)));
        assert_eq!(seen[2].outcome, AttemptOutcome::Fits { bytes: 1_000 });
    }

    #[test]
    fn errors_only_within_budget_is_an_optimizer_error() {
        let codec = ScriptedCodec::new(|_| Err(CodecError::encode("nope")));
        let settings = CompressionSettings { max_attempts: 2, ..CompressionSettings::default() };

        let err = run(&codec, &settings, 1_000).unwrap_err();
        assert!(matches!(err, OptimizerError::NoSuccessfulAttempt { attempts: 2, .. }));
    }

    #[test]
    fn floor_answer_sets_low_quality_warning() {
        // Only the lowest qualities fit.
        let codec = ScriptedCodec::linear(0, 1_000);
        let settings = CompressionSettings::default();

        let result = run(&codec, &settings, 9_500).unwrap().result;
        assert!(result.target_met);
        assert!(result.achieved_quality <= settings.low_quality_threshold);
        assert!(result.low_quality_warning);
    }

    #[test]
    fn zero_target_is_rejected() {
        let codec = ScriptedCodec::linear(0, 1);
        let settings = CompressionSettings::default();
        assert_eq!(run(&codec, &settings, 0).unwrap_err(), OptimizerError::NoTarget);
        assert_eq!(codec.calls(), 0);
    }

    proptest! {
        #[test]
        fn generous_targets_are_always_met(base in 0u64..50_000, step in 1u64..2_000, slack in 0u64..100_000) {
            let codec = ScriptedCodec::linear(base, step);
            let settings = CompressionSettings::default();
            let target = (base + settings.quality_max as u64 * step + slack).max(1);

            let result = run(&codec, &settings, target).unwrap().result;
            prop_assert!(result.target_met);
            prop_assert!(result.achieved_bytes <= target);
            prop_assert!(result.attempts <= settings.max_attempts);
            prop_assert!(result.achieved_quality >= settings.quality_min);
            prop_assert!(result.achieved_quality <= settings.quality_max);
        }

        #[test]
        fn impossible_targets_never_error(base in 1_000u64..50_000, step in 0u64..2_000) {
            let codec = ScriptedCodec::linear(base, step);
            let settings = CompressionSettings::default();
            let target = base + settings.quality_min as u64 * step - 1;

            let result = run(&codec, &settings, target).unwrap().result;
            prop_assert!(!result.target_met);
            prop_assert!(result.attempts <= settings.max_attempts);

            let observed_min = codec.qualities().iter().map(|&q| base + q as u64 * step).min().unwrap();
            prop_assert_eq!(result.achieved_bytes, observed_min);
        }

        #[test]
        fn search_path_is_deterministic(base in 0u64..10_000, step in 1u64..500, target in 1u64..60_000) {
            let settings = CompressionSettings::default();
            let first = ScriptedCodec::linear(base, step);
            let second = ScriptedCodec::linear(base, step);
            let a = run(&first, &settings, target).unwrap().result;
            let b = run(&second, &settings, target).unwrap().result;
            prop_assert_eq!(first.qualities(), second.qualities());
            prop_assert_eq!(a.achieved_quality, b.achieved_quality);
            prop_assert_eq!(a.target_met, b.target_met);
        }
    }
}
