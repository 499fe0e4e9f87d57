//! The codec collaborator: pixel resize plus encode, treated as opaque.
//!
//! The dispatcher and optimizer only ever talk to the [`Codec`] trait.
//! [`ImageCodec`] is the reference implementation backed by the `image` crate.

mod image_codec;

#[cfg(test)]
pub(crate) mod testing;

pub use image_codec::ImageCodec;

use crate::core::{EncodeOptions, ResizeSpec};
use crate::utils::{CodecError, OutputFormat};

/// Encoded output of a single codec call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    pub bytes: Vec<u8>,
    /// Dimensions after resizing
    pub dimensions: (u32, u32),
}

impl Encoded {
    pub fn byte_count(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Resize/encode collaborator.
///
/// Calls run synchronously on a worker thread and may take arbitrarily long;
/// nothing in this crate times them out. The target-size search assumes the
/// output size does not grow as quality drops, which not every format honors
/// (lossless paths may ignore quality entirely).
pub trait Codec: Send + Sync + 'static {
    /// Decoded pixels, shared read-only across attempts
    type Source: Send + Sync;

    fn decode(&self, data: &[u8]) -> Result<Self::Source, CodecError>;

    fn dimensions(&self, source: &Self::Source) -> (u32, u32);

    /// `format` is always concrete; `OutputFormat::Original` is resolved by the caller.
    fn encode(
        &self,
        source: &Self::Source,
        resize: &ResizeSpec,
        quality: u8,
        format: OutputFormat,
        options: &EncodeOptions,
    ) -> Result<Encoded, CodecError>;
}
