use std::fmt;
use std::io::Cursor;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::{ImageError, ImageFormat, ImageReader};
use photoedit_contracts::{EditorError, EditorResult};

const DATA_URL_IMAGE_TYPES: &[&str] = &["png", "jpeg", "jpg", "webp"];

/// Encoded image bytes plus their mime type.
///
/// The bytes are shared and immutable, so a clone is a snapshot by value.
#[derive(Clone, PartialEq, Eq)]
pub struct RasterBuffer {
    bytes: Arc<[u8]>,
    mime_type: String,
}

impl fmt::Debug for RasterBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RasterBuffer")
            .field("len", &self.bytes.len())
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

impl RasterBuffer {
    pub fn new(bytes: impl Into<Arc<[u8]>>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Wraps raw bytes, sniffing the mime type from the content.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let mime_type = image::guess_format(&bytes)
            .map(|format| format.to_mime_type().to_string())
            .unwrap_or_else(|_| "application/octet-stream".to_string());
        Self::new(bytes, mime_type)
    }

    pub fn png(bytes: Vec<u8>) -> Self {
        Self::new(bytes, "image/png")
    }

    /// Accepts `data:image/<type>;base64,<payload>` or bare base64.
    pub fn from_data_url(text: &str) -> EditorResult<Self> {
        let trimmed = text.trim();
        let payload = match trimmed.strip_prefix("data:") {
            Some(rest) => {
                let (header, payload) = rest
                    .split_once(',')
                    .ok_or_else(|| EditorError::decode("data URL has no payload"))?;
                let subtype = header
                    .strip_prefix("image/")
                    .and_then(|value| value.strip_suffix(";base64"))
                    .map(str::to_ascii_lowercase)
                    .ok_or_else(|| EditorError::UnsupportedFormat(header.to_string()))?;
                if !DATA_URL_IMAGE_TYPES.contains(&subtype.as_str()) {
                    return Err(EditorError::UnsupportedFormat(format!("image/{subtype}")));
                }
                payload
            }
            None => trimmed,
        };
        let bytes = BASE64
            .decode(payload.as_bytes())
            .map_err(|err| EditorError::decode(format!("base64 payload: {err}")))?;
        Ok(Self::from_bytes(bytes))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.bytes)
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }
}

/// Upper bound on decoded pixel surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceLimits {
    pub max_pixels: u64,
}

impl SurfaceLimits {
    pub fn check(&self, width: u32, height: u32) -> EditorResult<()> {
        if width == 0 || height == 0 {
            return Err(EditorError::surface(format!(
                "image has zero dimension ({width}x{height})"
            )));
        }
        let pixels = u64::from(width) * u64::from(height);
        if pixels > self.max_pixels {
            return Err(EditorError::surface(format!(
                "{width}x{height} exceeds the {} pixel limit",
                self.max_pixels
            )));
        }
        Ok(())
    }
}

/// The authoritative, filter-free source image of a session.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseImage {
    raster: RasterBuffer,
    format: ImageFormat,
    width: u32,
    height: u32,
}

impl BaseImage {
    /// Validates that `raster` is a decodable image within `limits`.
    pub fn decode(raster: RasterBuffer, limits: SurfaceLimits) -> EditorResult<Self> {
        if raster.is_empty() {
            return Err(EditorError::decode("empty input"));
        }
        let format = probe_format(raster.bytes())?;
        let (width, height) = reader_for(raster.bytes(), format)
            .into_dimensions()
            .map_err(map_image_error)?;
        limits.check(width, height)?;
        reader_for(raster.bytes(), format)
            .decode()
            .map_err(map_image_error)?;

        let raster = RasterBuffer::new(raster.bytes, format.to_mime_type());
        Ok(Self {
            raster,
            format,
            width,
            height,
        })
    }

    pub fn raster(&self) -> &RasterBuffer {
        &self.raster
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

pub(crate) fn probe_format(bytes: &[u8]) -> EditorResult<ImageFormat> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|err| EditorError::decode(err.to_string()))?
        .format()
        .ok_or_else(|| EditorError::UnsupportedFormat("unrecognized image signature".to_string()))
}

pub(crate) fn reader_for(bytes: &[u8], format: ImageFormat) -> ImageReader<Cursor<&[u8]>> {
    ImageReader::with_format(Cursor::new(bytes), format)
}

pub(crate) fn map_image_error(err: ImageError) -> EditorError {
    match err {
        ImageError::Unsupported(inner) => EditorError::UnsupportedFormat(inner.to_string()),
        ImageError::Limits(inner) => EditorError::surface(inner.to_string()),
        other => EditorError::decode(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{ImageFormat, Rgba, RgbaImage};
    use photoedit_contracts::EditorError;

    use super::{BaseImage, RasterBuffer, SurfaceLimits};

    const LIMITS: SurfaceLimits = SurfaceLimits { max_pixels: 1_000_000 };

    fn png_bytes(width: u32, height: u32) -> anyhow::Result<Vec<u8>> {
        let image = RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255]));
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, ImageFormat::Png)?;
        Ok(out.into_inner())
    }

    #[test]
    fn decode_records_natural_dimensions() -> anyhow::Result<()> {
        let base = BaseImage::decode(RasterBuffer::from_bytes(png_bytes(7, 3)?), LIMITS)?;
        assert_eq!(base.dimensions(), (7, 3));
        assert_eq!(base.format(), ImageFormat::Png);
        assert_eq!(base.raster().mime_type(), "image/png");
        Ok(())
    }

    #[test]
    fn unknown_signature_is_unsupported() {
        let err = BaseImage::decode(RasterBuffer::from_bytes(b"hello world".to_vec()), LIMITS)
            .unwrap_err();
        assert!(matches!(err, EditorError::UnsupportedFormat(_)), "{err:?}");
    }

    #[test]
    fn truncated_png_is_a_decode_failure() -> anyhow::Result<()> {
        let mut bytes = png_bytes(16, 16)?;
        bytes.truncate(40);
        let err = BaseImage::decode(RasterBuffer::from_bytes(bytes), LIMITS).unwrap_err();
        assert!(matches!(err, EditorError::DecodeFailure(_)), "{err:?}");
        Ok(())
    }

    #[test]
    fn empty_input_is_a_decode_failure() {
        let err = BaseImage::decode(RasterBuffer::from_bytes(Vec::new()), LIMITS).unwrap_err();
        assert_eq!(err, EditorError::DecodeFailure("empty input".to_string()));
    }

    #[test]
    fn oversized_surface_is_unavailable() -> anyhow::Result<()> {
        let tiny = SurfaceLimits { max_pixels: 10 };
        let err = BaseImage::decode(RasterBuffer::from_bytes(png_bytes(4, 4)?), tiny).unwrap_err();
        assert!(matches!(err, EditorError::SurfaceUnavailable(_)), "{err:?}");
        assert!(LIMITS.check(0, 12).is_err());
        Ok(())
    }

    #[test]
    fn data_url_prefix_is_stripped() -> anyhow::Result<()> {
        let raster = RasterBuffer::png(png_bytes(2, 2)?);
        let parsed = RasterBuffer::from_data_url(&raster.to_data_url())?;
        assert_eq!(parsed.bytes(), raster.bytes());
        assert_eq!(parsed.mime_type(), "image/png");

        let bare = RasterBuffer::from_data_url(&raster.to_base64())?;
        assert_eq!(bare.bytes(), raster.bytes());
        Ok(())
    }

    #[test]
    fn data_url_rejects_non_image_types() {
        let err = RasterBuffer::from_data_url("data:text/plain;base64,aGVsbG8=").unwrap_err();
        assert!(matches!(err, EditorError::UnsupportedFormat(_)));
        let err = RasterBuffer::from_data_url("data:image/svg+xml;base64,aGVsbG8=").unwrap_err();
        assert_eq!(err, EditorError::UnsupportedFormat("image/svg+xml".to_string()));
    }

    #[test]
    fn debug_does_not_dump_bytes() {
        let raster = RasterBuffer::png(vec![1, 2, 3]);
        assert_eq!(
            format!("{raster:?}"),
            "RasterBuffer { len: 3, mime_type: \"image/png\" }"
        );
    }
}
