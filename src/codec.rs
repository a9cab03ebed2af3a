//! Conversion between encoded image bytes and decoded images.
//!
//! Five container formats are supported: PNG, JPEG, GIF, BMP and TIFF.
//! Format names are matched case-insensitively, and a leading `.` is ignored
//! so that file extensions can be passed directly.

use image::{codecs::jpeg::JpegEncoder, DynamicImage, ImageError, ImageFormat, RgbaImage};
use std::{
    io::Cursor,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::debug;

/// The quality used when encoding JPEG images.
pub const JPEG_QUALITY: u8 = 90;

/// An error from decoding, encoding, reading or writing an image.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The image file could not be read.
    #[error("failed to read {}", .path.display())]
    Read {
        /// The path that was read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The bytes are not a valid image in any supported format.
    #[error("failed to decode image")]
    Decode(#[source] ImageError),
    /// The image could not be encoded in the requested format.
    #[error("failed to encode image as {format:?}")]
    Encode {
        /// The target format.
        format: ImageFormat,
        /// The underlying encoder error.
        #[source]
        source: ImageError,
    },
    /// The image file could not be written.
    #[error("failed to write {}", .path.display())]
    Write {
        /// The path that was written.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: ImageError,
    },
}

/// Maps a format name or file extension to one of the supported container formats.
///
/// # Examples
/// ```
/// # use pixelforge::codec::parse_format;
/// # use image::ImageFormat;
/// assert_eq!(parse_format("png"), Some(ImageFormat::Png));
/// assert_eq!(parse_format(".JPG"), Some(ImageFormat::Jpeg));
/// assert_eq!(parse_format("webp"), None);
/// ```
#[must_use]
pub fn parse_format(name: &str) -> Option<ImageFormat> {
    let name = name.trim().trim_start_matches('.').to_ascii_lowercase();
    match name.as_str() {
        "png" => Some(ImageFormat::Png),
        "jpeg" | "jpg" => Some(ImageFormat::Jpeg),
        "gif" => Some(ImageFormat::Gif),
        "bmp" => Some(ImageFormat::Bmp),
        "tiff" | "tif" => Some(ImageFormat::Tiff),
        _ => None,
    }
}

/// Decodes `bytes` into an image.
///
/// If `hint` names a supported format, that decoder is tried first.
/// Otherwise, or if the hinted decoder fails, the format is detected from the content.
/// Animated images yield their first frame.
///
/// # Errors
/// Returns [`CodecError::Decode`] if the bytes could not be decoded.
pub fn decode(bytes: &[u8], hint: &str) -> Result<DynamicImage, CodecError> {
    let decoded = match parse_format(hint) {
        Some(format) => image::load_from_memory_with_format(bytes, format).or_else(|err| {
            debug!(?format, %err, "hinted decoder failed, detecting format from content");
            image::load_from_memory(bytes).map_err(|_| err)
        }),
        None => image::load_from_memory(bytes),
    };

    decoded.map_err(CodecError::Decode)
}

/// Encodes `image` in the format named by `format_name`.
///
/// Unrecognized names fall back to PNG.
/// JPEG output drops the alpha channel and uses a quality of [`JPEG_QUALITY`].
///
/// # Errors
/// Returns [`CodecError::Encode`] if the encoder rejects the image.
pub fn encode(image: &DynamicImage, format_name: &str) -> Result<Vec<u8>, CodecError> {
    let format = parse_format(format_name).unwrap_or(ImageFormat::Png);
    let mut bytes = Vec::new();

    let result = match format {
        ImageFormat::Jpeg => JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY)
            .encode_image(&image.to_rgb8()),
        format => image.write_to(&mut Cursor::new(&mut bytes), format),
    };

    result.map_err(|source| CodecError::Encode { format, source })?;
    Ok(bytes)
}

/// Reads and decodes the image at `path`, using its extension as the format hint.
///
/// # Errors
/// Returns [`CodecError::Read`] if the file could not be read
/// and [`CodecError::Decode`] if its contents are not a supported image.
pub fn load(path: impl AsRef<Path>) -> Result<DynamicImage, CodecError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| CodecError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let hint = path.extension().and_then(|ext| ext.to_str()).unwrap_or_default();
    decode(&bytes, hint)
}

/// Writes `image` to `path` as a PNG, whatever the extension of `path`.
///
/// # Errors
/// Returns [`CodecError::Write`] if the file could not be encoded or written.
pub fn save_png(image: &RgbaImage, path: impl AsRef<Path>) -> Result<(), CodecError> {
    let path = path.as_ref();
    image
        .save_with_format(path, ImageFormat::Png)
        .map_err(|source| CodecError::Write { path: path.to_path_buf(), source })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::tests::*;

    const PNG_MAGIC: &[u8] = b"\x89PNG";
    const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8];

    fn sample_image() -> DynamicImage {
        DynamicImage::ImageRgba8(rgb_rows_3x3())
    }

    #[test]
    fn format_names() {
        assert_eq!(parse_format("PNG"), Some(ImageFormat::Png));
        assert_eq!(parse_format("jpeg"), Some(ImageFormat::Jpeg));
        assert_eq!(parse_format("Jpg"), Some(ImageFormat::Jpeg));
        assert_eq!(parse_format("gif"), Some(ImageFormat::Gif));
        assert_eq!(parse_format(".bmp"), Some(ImageFormat::Bmp));
        assert_eq!(parse_format("tif"), Some(ImageFormat::Tiff));
        assert_eq!(parse_format("TIFF"), Some(ImageFormat::Tiff));
        assert_eq!(parse_format(""), None);
        assert_eq!(parse_format("webp"), None);
        assert_eq!(parse_format("pngx"), None);
    }

    #[test]
    fn png_round_trip_is_lossless() {
        let image = sample_image();
        let bytes = encode(&image, "png").unwrap();
        assert!(bytes.starts_with(PNG_MAGIC));
        assert_eq!(decode(&bytes, "png").unwrap().to_rgba8(), rgb_rows_3x3());
    }

    #[test]
    fn unknown_name_encodes_png() {
        let bytes = encode(&sample_image(), "webp").unwrap();
        assert!(bytes.starts_with(PNG_MAGIC));
        let bytes = encode(&sample_image(), "").unwrap();
        assert!(bytes.starts_with(PNG_MAGIC));
    }

    #[test]
    fn jpeg_drops_alpha() {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, TRANSPARENT));
        let bytes = encode(&image, "jpg").unwrap();
        assert!(bytes.starts_with(JPEG_MAGIC));
        let decoded = decode(&bytes, "jpeg").unwrap();
        assert_eq!(decoded.to_rgb8().dimensions(), (8, 8));
        assert!(!decoded.color().has_alpha());
    }

    #[test]
    fn bmp_round_trip() {
        let bytes = encode(&sample_image(), "bmp").unwrap();
        assert!(bytes.starts_with(b"BM"));
        assert_eq!(decode(&bytes, "bmp").unwrap().to_rgba8(), rgb_rows_3x3());
    }

    #[test]
    fn falls_back_to_content_detection() {
        let bytes = encode(&sample_image(), "png").unwrap();
        assert_eq!(decode(&bytes, "").unwrap().to_rgba8(), rgb_rows_3x3());
        assert_eq!(decode(&bytes, "webp").unwrap().to_rgba8(), rgb_rows_3x3());
        assert_eq!(decode(&bytes, "bmp").unwrap().to_rgba8(), rgb_rows_3x3());
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(decode(b"definitely not an image", "png"), Err(CodecError::Decode(_))));
        assert!(matches!(decode(&[], ""), Err(CodecError::Decode(_))));
    }

    #[test]
    fn missing_file() {
        let path = std::env::temp_dir().join("pixelforge-codec-test-missing.png");
        assert!(matches!(load(&path), Err(CodecError::Read { .. })));
    }

    #[test]
    fn save_then_load() {
        let path = std::env::temp_dir().join(format!("pixelforge-codec-{}.png", std::process::id()));
        save_png(&rgb_rows_3x3(), &path).unwrap();
        let loaded = load(&path).unwrap().to_rgba8();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(loaded, rgb_rows_3x3());
    }
}
