//! Reference codec over the `image` crate.
//!
//! - JPEG: baseline, quality honored. Progressive output is not available and
//!   the flag is ignored.
//! - PNG: lossless, `optimize` selects the best compression level. Quality is ignored.
//! - WebP: lossless only. Quality is ignored.
//!
//! Metadata is never carried over, whatever `exif_handling` asks for.

use std::borrow::Cow;
use std::io::Cursor;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, ImageEncoder};
use tracing::debug;

use crate::codec::{Codec, Encoded};
use crate::core::{EncodeOptions, ExifHandling, ResizeSpec};
use crate::utils::{CodecError, OutputFormat};

pub struct ImageCodec {
    filter: FilterType,
}

impl Default for ImageCodec {
    fn default() -> Self {
        Self { filter: FilterType::Lanczos3 }
    }
}

impl ImageCodec {
    pub fn new(filter: FilterType) -> Self {
        Self { filter }
    }

    fn resized<'a>(&self, source: &'a DynamicImage, resize: &ResizeSpec) -> Cow<'a, DynamicImage> {
        let (width, height) = (source.width(), source.height());
        let (target_w, target_h) = resize.target_dimensions(width, height);
        if (target_w, target_h) == (width, height) {
            return Cow::Borrowed(source);
        }
        debug!("Resizing {}x{} -> {}x{}", width, height, target_w, target_h);
        Cow::Owned(source.resize_exact(target_w, target_h, self.filter))
    }
}

impl Codec for ImageCodec {
    type Source = DynamicImage;

    fn decode(&self, data: &[u8]) -> Result<DynamicImage, CodecError> {
        image::load_from_memory(data).map_err(CodecError::decode)
    }

    fn dimensions(&self, source: &DynamicImage) -> (u32, u32) {
        (source.width(), source.height())
    }

    fn encode(
        &self,
        source: &DynamicImage,
        resize: &ResizeSpec,
        quality: u8,
        format: OutputFormat,
        options: &EncodeOptions,
    ) -> Result<Encoded, CodecError> {
        if options.exif_handling == ExifHandling::Keep {
            debug!("Metadata passthrough is not supported; output is stripped");
        }

        let image = self.resized(source, resize);
        let (width, height) = (image.width(), image.height());
        let mut buffer = Cursor::new(Vec::new());

        match format {
            OutputFormat::Jpeg => {
                let rgb = image.to_rgb8();
                JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100))
                    .write_image(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)
                    .map_err(CodecError::encode)?;
            }
            OutputFormat::Png => {
                let compression = if options.optimize {
                    CompressionType::Best
                } else {
                    CompressionType::Default
                };
                let encoder = PngEncoder::new_with_quality(&mut buffer, compression, PngFilter::Adaptive);
                let written = if image.color().has_alpha() {
                    let rgba = image.to_rgba8();
                    encoder.write_image(rgba.as_raw(), width, height, ExtendedColorType::Rgba8)
                } else {
                    let rgb = image.to_rgb8();
                    encoder.write_image(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)
                };
                written.map_err(CodecError::encode)?;
            }
            OutputFormat::Webp => {
                let rgba = image.to_rgba8();
                WebPEncoder::new_lossless(&mut buffer)
                    .write_image(rgba.as_raw(), width, height, ExtendedColorType::Rgba8)
                    .map_err(CodecError::encode)?;
            }
            OutputFormat::Original => {
                return Err(CodecError::Unsupported(
                    "output format must be resolved before encoding".to_string(),
                ));
            }
        }

        Ok(Encoded {
            bytes: buffer.into_inner(),
            dimensions: (width, height),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ResizeMode;
    use image::{Rgb, RgbImage};

    /// Noisy gradient: enough detail for JPEG quality to matter.
    fn textured(width: u32, height: u32) -> DynamicImage {
        let img = RgbImage::from_fn(width, height, |x, y| {
            let noise = ((x * 7919 + y * 104_729) % 61) as u8;
            Rgb([(x % 256) as u8 ^ noise, (y % 256) as u8, ((x + y) % 256) as u8 ^ noise])
        });
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn jpeg_shrinks_with_quality() {
        let codec = ImageCodec::default();
        let source = textured(96, 96);
        let options = EncodeOptions::default();

        let high = codec.encode(&source, &ResizeSpec::none(), 95, OutputFormat::Jpeg, &options).unwrap();
        let low = codec.encode(&source, &ResizeSpec::none(), 20, OutputFormat::Jpeg, &options).unwrap();

        assert_eq!(&high.bytes[0..2], &[0xFF, 0xD8]);
        assert!(low.byte_count() < high.byte_count());
    }

    #[test]
    fn resize_is_applied_before_encoding() {
        let codec = ImageCodec::default();
        let source = textured(200, 100);
        let encoded = codec
            .encode(
                &source,
                &ResizeSpec::new(ResizeMode::Width, 50),
                80,
                OutputFormat::Png,
                &EncodeOptions::default(),
            )
            .unwrap();
        assert_eq!(encoded.dimensions, (50, 25));

        let decoded = codec.decode(&encoded.bytes).unwrap();
        assert_eq!(codec.dimensions(&decoded), (50, 25));
    }

    #[test]
    fn lossless_webp_ignores_quality() {
        let codec = ImageCodec::default();
        let source = textured(32, 32);
        let options = EncodeOptions::default();
        let a = codec.encode(&source, &ResizeSpec::none(), 90, OutputFormat::Webp, &options).unwrap();
        let b = codec.encode(&source, &ResizeSpec::none(), 10, OutputFormat::Webp, &options).unwrap();
        assert_eq!(a.byte_count(), b.byte_count());
    }

    #[test]
    fn unresolved_format_and_garbage_input_fail() {
        let codec = ImageCodec::default();
        let source = textured(8, 8);
        assert!(matches!(
            codec.encode(&source, &ResizeSpec::none(), 80, OutputFormat::Original, &EncodeOptions::default()),
            Err(CodecError::Unsupported(_))
        ));
        assert!(matches!(codec.decode(b"definitely not an image"), Err(CodecError::Decode(_))));
    }
}
