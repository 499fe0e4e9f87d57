use std::path::Path;
use crate::core::{ResizeMode, ResizeSpec};
use crate::utils::ValidationError;

/// Largest accepted percentage for [`ResizeMode::Percentage`].
const MAX_PERCENTAGE: u32 = 1000;

/// Validates the input file path
pub fn validate_input_path(path: &Path) -> Result<(), ValidationError> {
    if !path.exists() {
        return Err(ValidationError::path_not_found(path));
    }

    if !path.is_file() {
        return Err(ValidationError::not_a_file(path));
    }

    Ok(())
}

/// Validates the output path. Missing directories are created at write time.
pub fn validate_output_path(path: &Path) -> Result<(), ValidationError> {
    if path.as_os_str().is_empty() {
        return Err(ValidationError::job("Output path is empty"));
    }

    if path.is_dir() {
        return Err(ValidationError::job(format!(
            "Output path is a directory: {}", path.display()
        )));
    }

    Ok(())
}

/// Validates a requested quality before it is clamped to the configured range.
pub fn validate_quality(quality: u8) -> Result<(), ValidationError> {
    if quality == 0 || quality > 100 {
        return Err(ValidationError::job(
            format!("Invalid quality value: {}. Must be between 1 and 100", quality)
        ));
    }
    Ok(())
}

/// Validates resize settings
pub fn validate_resize(resize: &ResizeSpec) -> Result<(), ValidationError> {
    match resize.mode {
        ResizeMode::None => Ok(()),
        _ if resize.value == 0 => Err(ValidationError::job(
            format!("Resize value cannot be 0 for mode {:?}", resize.mode)
        )),
        ResizeMode::Percentage if resize.value > MAX_PERCENTAGE => Err(ValidationError::job(
            format!("Resize percentage {} exceeds {}", resize.value, MAX_PERCENTAGE)
        )),
        _ => Ok(()),
    }
}
