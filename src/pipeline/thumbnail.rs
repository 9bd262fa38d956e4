//! Preview generation: decode → orient → downscale → re-encode, for display only.
//!
//! ## Why spawn_blocking?
//!
//! Image codecs are CPU-bound. `tokio::task::spawn_blocking` moves the work
//! onto the blocking pool so the caller's task just suspends until the
//! preview is ready, and whatever else shares the runtime keeps running.
//!
//! ## Sizing
//!
//! The EXIF orientation is applied first, so a rotated phone photo previews
//! upright. The longest edge is then capped at `thumbnail_max_edge` (150 px
//! by default), the other edge scaled proportionally and rounded. Smaller
//! images keep their size; previews are never upscaled.
//!
//! ## Encoding
//!
//! The preview keeps the input's format. JPEG is re-encoded at
//! `thumbnail_quality` (70 by default). PNG, GIF and WebP are written
//! losslessly and ignore the quality setting: the `image` crate only ships a
//! lossless WebP encoder.
//!
//! ## Failure
//!
//! [`create_preview`] never fails: if anything goes wrong the preview falls
//! back to the original bytes, so a bad image never blocks selection.

use crate::config::UploadConfig;
use crate::error::ThumbnailError;
use crate::output::PendingFile;
use crate::preview::{PreviewHandle, PreviewRegistry, PreviewSource, Thumbnail};
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageFormat, ImageReader};
use std::io::Cursor;
use tracing::{debug, warn};

/// Target size for a `width × height` image under a `max_edge` cap.
///
/// If width ≥ height the width is clamped, otherwise the height; the other
/// edge is scaled by the same factor and rounded to the nearest pixel, with
/// a floor of 1.
pub fn thumbnail_dimensions(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    let scale = |edge: u32, long: u32| -> u32 {
        let scaled = (f64::from(edge) * f64::from(max_edge) / f64::from(long)).round();
        (scaled as u32).max(1)
    };

    if width >= height {
        if width > max_edge {
            return (max_edge, scale(height, width));
        }
    } else if height > max_edge {
        return (scale(width, height), max_edge);
    }
    (width, height)
}

/// Generate a thumbnail for `file`.
///
/// The output is encoded in the input's own format; JPEG uses `quality`
/// (1–100), lossless formats ignore it.
pub async fn generate_thumbnail(
    file: &PendingFile,
    max_edge: u32,
    quality: u8,
) -> Result<Thumbnail, ThumbnailError> {
    let name = file.name().to_string();
    let mime = file.mime_type().to_string();
    let bytes = file.bytes().clone();

    tokio::task::spawn_blocking({
        let name = name.clone();
        move || generate_blocking(&name, &mime, &bytes, max_edge, quality)
    })
    .await
    .map_err(|e| ThumbnailError::TaskFailed {
        name,
        detail: e.to_string(),
    })?
}

/// Blocking implementation of thumbnail generation.
fn generate_blocking(
    name: &str,
    mime: &str,
    bytes: &[u8],
    max_edge: u32,
    quality: u8,
) -> Result<Thumbnail, ThumbnailError> {
    let format =
        ImageFormat::from_mime_type(mime).ok_or_else(|| ThumbnailError::UnsupportedFormat {
            name: name.to_string(),
            mime_type: mime.to_string(),
        })?;

    let img = decode_oriented(bytes, format).map_err(|e| ThumbnailError::Decode {
        name: name.to_string(),
        detail: e.to_string(),
    })?;

    let (width, height) = thumbnail_dimensions(img.width(), img.height(), max_edge);
    let img = if (width, height) == (img.width(), img.height()) {
        img
    } else {
        img.resize_exact(width, height, FilterType::Triangle)
    };

    let encoded = encode(&img, format, quality).map_err(|e| ThumbnailError::Encode {
        name: name.to_string(),
        detail: e.to_string(),
    })?;
    debug!(
        "Thumbnail for '{}': {}x{} → {} bytes",
        name,
        width,
        height,
        encoded.len()
    );

    Ok(Thumbnail {
        bytes: Bytes::from(encoded),
        width,
        height,
        mime_type: format.to_mime_type().to_string(),
    })
}

/// Decode `bytes` and rotate/flip them upright per their EXIF orientation.
fn decode_oriented(bytes: &[u8], format: ImageFormat) -> Result<DynamicImage, image::ImageError> {
    let mut decoder = ImageReader::with_format(Cursor::new(bytes), format).into_decoder()?;
    // Unreadable metadata is not worth losing the preview over.
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
    let mut img = DynamicImage::from_decoder(decoder)?;
    img.apply_orientation(orientation);
    Ok(img)
}

fn encode(
    img: &DynamicImage,
    format: ImageFormat,
    quality: u8,
) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    match format {
        ImageFormat::Jpeg => {
            // JPEG has no alpha channel.
            let rgb = img.to_rgb8();
            JpegEncoder::new_with_quality(&mut buf, quality).encode_image(&rgb)?;
        }
        other => img.write_to(&mut Cursor::new(&mut buf), other)?,
    }
    Ok(buf)
}

/// Produce a preview handle for `file`, falling back to the original bytes.
///
/// Non-image files skip generation entirely. Failures are logged at `warn`
/// and never surfaced.
pub async fn create_preview(
    file: &PendingFile,
    registry: &PreviewRegistry,
    config: &UploadConfig,
) -> PreviewHandle {
    if !file.is_image() {
        debug!("'{}' is not an image; previewing original", file.name());
        return registry.allocate(PreviewSource::Original(file.clone()));
    }

    match generate_thumbnail(file, config.thumbnail_max_edge, config.thumbnail_quality).await {
        Ok(thumb) => registry.allocate(PreviewSource::Thumbnail(thumb)),
        Err(e) => {
            warn!("Thumbnail failed, previewing original: {}", e);
            registry.allocate(PreviewSource::Original(file.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};

    fn png(width: u32, height: u32) -> PendingFile {
        let pixel = Rgba([10, 200, 30, 255]);
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, pixel));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        PendingFile::new("shot.png", "image/png", buf)
    }

    fn jpeg_bytes(img: &RgbImage) -> Vec<u8> {
        let mut buf = Vec::new();
        JpegEncoder::new_with_quality(&mut buf, 95)
            .encode_image(img)
            .unwrap();
        buf
    }

    fn jpeg(width: u32, height: u32) -> PendingFile {
        let img = RgbImage::from_pixel(width, height, Rgb([120, 60, 30]));
        PendingFile::new("photo.jpg", "image/jpeg", jpeg_bytes(&img))
    }

    /// High-entropy content, so the encoder quality shows in the output size.
    fn noisy_jpeg(width: u32, height: u32) -> PendingFile {
        let mut state: u32 = 0x2545_f491;
        let img = RgbImage::from_fn(width, height, |_, _| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            let [r, g, b, _] = state.to_le_bytes();
            Rgb([r, g, b])
        });
        PendingFile::new("noise.jpg", "image/jpeg", jpeg_bytes(&img))
    }

    /// Insert an EXIF APP1 segment carrying `orientation` right after SOI.
    fn with_exif_orientation(jpeg: &[u8], orientation: u16) -> Vec<u8> {
        let mut tiff = vec![b'M', b'M', 0x00, 0x2a, 0x00, 0x00, 0x00, 0x08];
        tiff.extend_from_slice(&[0x00, 0x01]); // one IFD entry
        tiff.extend_from_slice(&[0x01, 0x12, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01]);
        tiff.extend_from_slice(&orientation.to_be_bytes());
        tiff.extend_from_slice(&[0x00, 0x00]);
        tiff.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]); // no next IFD

        let len = (2 + 6 + tiff.len()) as u16;
        let mut out = jpeg[..2].to_vec();
        out.extend_from_slice(&[0xff, 0xe1]);
        out.extend_from_slice(&len.to_be_bytes());
        out.extend_from_slice(b"Exif\0\0");
        out.extend_from_slice(&tiff);
        out.extend_from_slice(&jpeg[2..]);
        out
    }

    #[test]
    fn dimensions_cap_longest_edge() {
        assert_eq!(thumbnail_dimensions(400, 200, 150), (150, 75));
        assert_eq!(thumbnail_dimensions(200, 400, 150), (75, 150));
        assert_eq!(thumbnail_dimensions(400, 400, 150), (150, 150));
        assert_eq!(thumbnail_dimensions(1000, 333, 150), (150, 50));
    }

    #[test]
    fn dimensions_never_upscale() {
        assert_eq!(thumbnail_dimensions(100, 100, 150), (100, 100));
        assert_eq!(thumbnail_dimensions(150, 20, 150), (150, 20));
    }

    #[test]
    fn dimensions_keep_at_least_one_pixel() {
        assert_eq!(thumbnail_dimensions(3000, 1, 150), (150, 1));
    }

    #[tokio::test]
    async fn png_is_downscaled_and_stays_png() {
        let thumb = generate_thumbnail(&png(400, 200), 150, 70).await.unwrap();
        assert_eq!((thumb.width, thumb.height), (150, 75));
        assert_eq!(thumb.mime_type, "image/png");

        let decoded = image::load_from_memory(&thumb.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (150, 75));
    }

    #[tokio::test]
    async fn jpeg_portrait_is_downscaled() {
        let thumb = generate_thumbnail(&jpeg(200, 400), 150, 70).await.unwrap();
        assert_eq!((thumb.width, thumb.height), (75, 150));
        assert_eq!(thumb.mime_type, "image/jpeg");
        assert_eq!(
            image::guess_format(&thumb.bytes).unwrap(),
            ImageFormat::Jpeg
        );
    }

    #[tokio::test]
    async fn jpeg_is_encoded_at_requested_quality() {
        let file = noisy_jpeg(400, 300);
        let thumb = generate_thumbnail(&file, 150, 70).await.unwrap();

        let expected = image::load_from_memory(file.bytes())
            .unwrap()
            .resize_exact(150, 113, FilterType::Triangle)
            .to_rgb8();
        let mut reference = Vec::new();
        JpegEncoder::new_with_quality(&mut reference, 70)
            .encode_image(&expected)
            .unwrap();
        assert_eq!(thumb.bytes.as_ref(), reference.as_slice());

        let best = generate_thumbnail(&file, 150, 100).await.unwrap();
        assert!(
            thumb.bytes.len() < best.bytes.len(),
            "q70 {} bytes vs q100 {} bytes",
            thumb.bytes.len(),
            best.bytes.len()
        );
    }

    #[tokio::test]
    async fn lossless_formats_ignore_quality() {
        let file = png(400, 200);
        let low = generate_thumbnail(&file, 150, 10).await.unwrap();
        let high = generate_thumbnail(&file, 150, 100).await.unwrap();
        assert_eq!(low.bytes, high.bytes);
    }

    #[tokio::test]
    async fn webp_is_previewed_as_webp() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(300, 300, Rgba([1, 2, 3, 255])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::WebP)
            .unwrap();
        let file = PendingFile::new("sticker.webp", "image/webp", buf);

        let thumb = generate_thumbnail(&file, 150, 70).await.unwrap();
        assert_eq!(thumb.mime_type, "image/webp");
        let decoded = image::load_from_memory_with_format(&thumb.bytes, ImageFormat::WebP).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (150, 150));
    }

    #[tokio::test]
    async fn exif_rotation_is_applied_before_sizing() {
        let landscape = RgbImage::from_pixel(400, 200, Rgb([90, 90, 200]));
        let rotated = with_exif_orientation(&jpeg_bytes(&landscape), 6);
        let file = PendingFile::new("phone.jpg", "image/jpeg", rotated);

        let thumb = generate_thumbnail(&file, 150, 70).await.unwrap();
        assert_eq!((thumb.width, thumb.height), (75, 150));
    }

    #[tokio::test]
    async fn small_image_keeps_size() {
        let thumb = generate_thumbnail(&png(100, 100), 150, 70).await.unwrap();
        assert_eq!((thumb.width, thumb.height), (100, 100));
    }

    #[tokio::test]
    async fn corrupt_image_is_a_decode_error() {
        let bad = PendingFile::new("broken.png", "image/png", vec![0u8; 64]);
        let err = generate_thumbnail(&bad, 150, 70).await.unwrap_err();
        assert!(matches!(err, ThumbnailError::Decode { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn unknown_image_type_is_unsupported() {
        let odd = PendingFile::new("x.heic", "image/heic", vec![1, 2, 3]);
        let err = generate_thumbnail(&odd, 150, 70).await.unwrap_err();
        assert!(matches!(err, ThumbnailError::UnsupportedFormat { .. }));
    }

    #[tokio::test]
    async fn preview_falls_back_to_original_on_failure() {
        let registry = PreviewRegistry::new();
        let bad = PendingFile::new("broken.jpg", "image/jpeg", vec![9u8; 32]);

        let handle = create_preview(&bad, &registry, &UploadConfig::default()).await;
        assert!(!handle.is_thumbnail());
        assert_eq!(handle.bytes(), bad.bytes());
        assert_eq!(registry.live(), 1);
    }

    #[tokio::test]
    async fn non_image_skips_generation() {
        let registry = PreviewRegistry::new();
        let doc = PendingFile::new("notes.pdf", "application/pdf", vec![1, 2, 3]);

        let handle = create_preview(&doc, &registry, &UploadConfig::default()).await;
        assert!(!handle.is_thumbnail());
        assert_eq!(handle.mime_type(), "application/pdf");
    }

    #[tokio::test]
    async fn preview_never_replaces_upload_bytes() {
        let registry = PreviewRegistry::new();
        let file = png(400, 200);
        let original = file.bytes().clone();

        let handle = create_preview(&file, &registry, &UploadConfig::default()).await;
        assert!(handle.is_thumbnail());
        assert_ne!(handle.bytes(), &original);
        assert_eq!(file.bytes(), &original);
    }
}
