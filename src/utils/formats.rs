use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use crate::utils::ValidationError;

/// Target encoding format of a job.
///
/// `Original` is resolved against the input file before the codec is called.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Original,
    Jpeg,
    Png,
    Webp,
}

impl OutputFormat {
    /// Get file extensions associated with this format
    pub fn extensions(&self) -> &[&str] {
        match self {
            Self::Original => &[],
            Self::Jpeg => &["jpg", "jpeg"],
            Self::Png => &["png"],
            Self::Webp => &["webp"],
        }
    }

    /// Check if the extension matches this format
    pub fn matches_extension(&self, ext: &str) -> bool {
        let ext = ext.to_lowercase();
        self.extensions().contains(&ext.as_str())
    }

    /// Get the primary extension for this format
    pub fn primary_extension(&self) -> Option<&str> {
        self.extensions().first().copied()
    }

    /// Format implied by a path's extension, if it is one we can produce.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        Self::from_str(ext).ok().filter(|f| *f != Self::Original)
    }

    /// Resolves `Original` to a concrete format using the input file's extension.
    ///
    /// Inputs we cannot re-encode as themselves (bmp, tiff, ...) fall back to JPEG.
    pub fn resolve(self, input: &Path) -> Self {
        match self {
            Self::Original => Self::from_path(input).unwrap_or(Self::Jpeg),
            concrete => concrete,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Original => "original",
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Webp => "webp",
        };
        f.write_str(name)
    }
}

impl FromStr for OutputFormat {
    type Err = ValidationError;

    fn from_str(ext: &str) -> Result<Self, Self::Err> {
        let ext = ext.to_lowercase();
        match ext.as_str() {
            "original" => Ok(Self::Original),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            "webp" => Ok(Self::Webp),
            _ => Err(ValidationError::job(format!(
                "Unsupported output format: {}", ext
            ))),
        }
    }
}

/// Returns `output` with the extension corrected to match `format`.
///
/// When the output format differs from the extension already on `output`
/// (e.g. converting foo.jpg → webp), the extension is replaced.
pub fn ensure_extension(output: &Path, format: OutputFormat) -> PathBuf {
    let Some(new_ext) = format.primary_extension() else {
        return output.to_path_buf();
    };

    let current = output.extension().and_then(|e| e.to_str()).unwrap_or("");
    if format.matches_extension(current) {
        return output.to_path_buf();
    }

    output.with_extension(new_ext)
}
