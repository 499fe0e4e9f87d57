//! Compression job definition and validated construction.

use std::path::PathBuf;
use serde::{Deserialize, Serialize};
use crate::core::{
    CompressionSettings, EncodeOptions, JobCategory, JobId, ResizeMode, ResizeSpec,
};
use crate::utils::{
    OutputFormat, PathError, ValidationError, ensure_extension, validate_input_path,
    validate_output_path, validate_quality, validate_resize,
};

/// Raw job parameters as they arrive from a caller or a JSON file.
///
/// Optional fields are resolved against [`CompressionSettings`] by
/// [`CompressionJob::from_request`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobRequest {
    /// Path to the source image file
    pub input: PathBuf,
    /// Destination path; required for everything but previews
    pub output: Option<PathBuf>,
    pub resize_mode: ResizeMode,
    pub resize_value: u32,
    /// Quality guess; the configured default when absent
    pub quality: Option<u8>,
    pub format: OutputFormat,
    pub options: EncodeOptions,
    /// Byte budget; absent or zero disables the search
    pub target_bytes: Option<u64>,
    /// Byte budget in KiB, used when `target_bytes` is absent
    pub target_size_kb: Option<u64>,
    pub category: JobCategory,
    /// Previews only search for a target size when detailed
    pub detailed: bool,
    /// Replace an existing destination instead of failing
    pub overwrite: bool,
}

impl JobRequest {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            ..Self::default()
        }
    }

    pub fn output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn resize(mut self, mode: ResizeMode, value: u32) -> Self {
        self.resize_mode = mode;
        self.resize_value = value;
        self
    }

    pub fn quality(mut self, quality: u8) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn target_bytes(mut self, target_bytes: u64) -> Self {
        self.target_bytes = Some(target_bytes);
        self
    }

    pub fn category(mut self, category: JobCategory) -> Self {
        self.category = category;
        self
    }

    pub fn detailed(mut self, detailed: bool) -> Self {
        self.detailed = detailed;
        self
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }
}

/// A validated compression job.
///
/// Owned by the dispatcher from submission until it produces a report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionJob {
    pub id: JobId,
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub resize: ResizeSpec,
    /// Always inside the configured quality range
    pub quality: u8,
    pub format: OutputFormat,
    pub options: EncodeOptions,
    /// Positive byte budget, if any
    pub target_bytes: Option<u64>,
    pub category: JobCategory,
    pub detailed: bool,
    pub overwrite: bool,
}

impl CompressionJob {
    /// Validates `request` once and resolves its defaults.
    pub fn from_request(
        request: JobRequest,
        settings: &CompressionSettings,
    ) -> Result<Self, ValidationError> {
        validate_input_path(&request.input)?;

        match (&request.output, request.category) {
            (Some(output), JobCategory::Preview) => validate_output_path(output)?,
            (Some(output), _) => {
                validate_output_path(output)?;
                let destination = ensure_extension(output, request.format.resolve(&request.input));
                if destination.exists() && !request.overwrite {
                    return Err(PathError::AlreadyExists(destination).into());
                }
            }
            (None, JobCategory::Preview) => {}
            (None, _) => {
                return Err(ValidationError::job(format!(
                    "Output path is required for {}", request.input.display()
                )));
            }
        }

        let resize = ResizeSpec::new(request.resize_mode, request.resize_value);
        validate_resize(&resize)?;

        let quality = request.quality.unwrap_or(settings.default_quality);
        validate_quality(quality)?;

        let target_bytes = request
            .target_bytes
            .or_else(|| request.target_size_kb.map(|kb| kb.saturating_mul(1024)))
            .filter(|&bytes| bytes > 0);

        Ok(Self {
            id: JobId::next(),
            input: request.input,
            output: request.output,
            resize,
            quality: settings.clamp_quality(quality),
            format: request.format,
            options: request.options,
            target_bytes,
            category: request.category,
            detailed: request.detailed,
            overwrite: request.overwrite,
        })
    }

    /// Whether this job goes through the target-size optimizer.
    pub fn needs_search(&self) -> bool {
        match self.category {
            JobCategory::Preview => self.detailed && self.target_bytes.is_some(),
            JobCategory::Single | JobCategory::BatchItem => self.target_bytes.is_some(),
        }
    }

    /// Whether the result is written to storage.
    pub fn writes_output(&self) -> bool {
        self.category != JobCategory::Preview
    }

    /// Where the result is written: the output path with the extension of
    /// the resolved format. `None` for previews.
    pub fn destination(&self) -> Option<PathBuf> {
        match (&self.output, self.writes_output()) {
            (Some(output), true) => Some(ensure_extension(output, self.format.resolve(&self.input))),
            _ => None,
        }
    }
}
