pub mod error;
pub mod validation;
pub mod formats;
pub mod fs;

pub use error::{
    CodecError,
    CompressError,
    CompressResult,
    OptimizerError,
    PathError,
    ValidationError,
};
pub use validation::{validate_input_path, validate_output_path, validate_quality, validate_resize};
pub use formats::{OutputFormat, ensure_extension};
pub use fs::{extract_filename, read_source, source_size, write_destination};
