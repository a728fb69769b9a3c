//! Download-time image resizing
//!
//! Without a target size the stored bytes are served untouched. With one,
//! the image is decoded, resized with a Lanczos3 filter and re-encoded as
//! PNG whatever its original format. Target sizes are bounded before any
//! pixel buffer is allocated; only the image header is read to check them.

use image::{imageops::FilterType, DynamicImage, ImageError, ImageFormat, ImageReader};
use std::io::Cursor;

use crate::types::{AppError, AppResult};

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Bytes ready to send, with their content type.
#[derive(Debug, Clone)]
pub struct Rendered {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub dimensions: Option<(u32, u32)>,
}

/// Content type sniffed from magic bytes, then from the extension.
pub fn detect_content_type(bytes: &[u8], filename: &str) -> String {
    if let Some(kind) = infer::get(bytes) {
        return kind.mime_type().to_string();
    }
    mime_guess::from_path(filename)
        .first()
        .map(|mime| mime.essence_str().to_string())
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string())
}

/// Output size for a `source` image. A zero dimension counts as absent; a
/// single given dimension keeps the aspect ratio. `None` means no resize.
pub fn target_dimensions(
    source: (u32, u32),
    width: Option<u32>,
    height: Option<u32>,
) -> Option<(u32, u32)> {
    let (src_w, src_h) = source;
    let scaled = |value: u32, num: u32, den: u32| -> u32 {
        let exact = f64::from(value) * f64::from(num) / f64::from(den.max(1));
        (exact.round() as u32).max(1)
    };

    match (width.filter(|w| *w > 0), height.filter(|h| *h > 0)) {
        (None, None) => None,
        (Some(w), Some(h)) => Some((w, h)),
        (Some(w), None) => Some((w, scaled(w, src_h, src_w))),
        (None, Some(h)) => Some((scaled(h, src_w, src_h), h)),
    }
}

fn wants_resize(width: Option<u32>, height: Option<u32>) -> bool {
    width.is_some_and(|w| w > 0) || height.is_some_and(|h| h > 0)
}

fn ensure_within(width: u32, height: u32, max_dimension: u32) -> AppResult<()> {
    if width > max_dimension || height > max_dimension {
        return Err(AppError::Validation(format!(
            "resize target {}x{} exceeds the {} pixel limit",
            width, height, max_dimension
        )));
    }
    Ok(())
}

/// Width and height from the image header, without decoding pixels.
fn source_dimensions(bytes: &[u8]) -> AppResult<(u32, u32)> {
    let dimensions = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(ImageError::IoError)?
        .into_dimensions()?;
    Ok(dimensions)
}

/// Produce the response body for a download. CPU-bound; call from a
/// blocking task.
///
/// Neither the requested nor the aspect-derived size may exceed
/// `max_dimension` on either axis.
pub fn render(
    bytes: Vec<u8>,
    filename: &str,
    width: Option<u32>,
    height: Option<u32>,
    max_dimension: u32,
) -> AppResult<Rendered> {
    if !wants_resize(width, height) {
        return Ok(Rendered {
            content_type: detect_content_type(&bytes, filename),
            bytes,
            dimensions: None,
        });
    }

    ensure_within(width.unwrap_or(0), height.unwrap_or(0), max_dimension)?;

    let source = source_dimensions(&bytes)?;
    let Some((w, h)) = target_dimensions(source, width, height) else {
        return Ok(Rendered {
            content_type: detect_content_type(&bytes, filename),
            bytes,
            dimensions: None,
        });
    };
    ensure_within(w, h, max_dimension)?;

    let image = image::load_from_memory(&bytes)?;
    let resized = image.resize_exact(w, h, FilterType::Lanczos3);
    Ok(Rendered {
        bytes: encode_png(&resized)?,
        content_type: mime::IMAGE_PNG.to_string(),
        dimensions: Some((w, h)),
    })
}

fn encode_png(image: &DynamicImage) -> AppResult<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}
