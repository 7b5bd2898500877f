//! Captured images and frame encoding
//!
//! A capture produces two independent encodings of the same source frame:
//! a small square JPEG sent for prediction and a full-resolution preview.

use std::io::Cursor;
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{ImageFormat, RgbImage};

use crate::{Error, Result};

/// File name the prediction service receives for every image
pub const UPLOAD_FILE_NAME: &str = "gesture.jpg";

/// JPEG quality of the preview encoding
const PREVIEW_QUALITY: u8 = 92;

/// MIME type for uploads whose format cannot be told
const UNKNOWN_MIME: &str = "application/octet-stream";

/// Where a captured image came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    /// Encoded from a camera frame
    Camera,
    /// Raw bytes of a user-supplied file
    Upload,
}

/// The most recent image available for prediction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedImage {
    bytes: Vec<u8>,
    mime_type: String,
    source: ImageSource,
}

impl CapturedImage {
    /// Wrap already-encoded image bytes
    #[must_use]
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>, source: ImageSource) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
            source,
        }
    }

    /// Encoded image bytes
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// MIME type of the encoding
    #[must_use]
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Origin of the image
    #[must_use]
    pub const fn source(&self) -> ImageSource {
        self.source
    }

    /// Image size in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether there are no bytes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The image as a `data:` URI, for display
    #[must_use]
    pub fn to_data_uri(&self) -> String {
        data_uri(&self.mime_type, &self.bytes)
    }
}

/// A file chosen by the user for prediction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Original file name, used to pick the MIME type
    pub name: String,
    /// File contents
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    /// Read a file from disk
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read
    pub async fn read(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self { name, bytes })
    }

    /// Turn the file into a captured image, bytes unchanged
    #[must_use]
    pub fn into_image(self) -> CapturedImage {
        let mime = upload_mime_type(&self.name, &self.bytes);
        CapturedImage::new(self.bytes, mime, ImageSource::Upload)
    }
}

/// Encoded outputs of one capture
#[derive(Debug, Clone)]
pub struct EncodedCapture {
    /// Square image sent for prediction
    pub image: CapturedImage,
    /// Full-resolution preview as a `data:` URI
    pub preview: String,
}

/// Encode a frame into the prediction image and the preview
///
/// # Errors
///
/// Returns error if JPEG encoding fails
pub fn encode_capture(frame: &RgbImage, prediction_size: u32, quality: u8) -> Result<EncodedCapture> {
    let image = encode_prediction_image(frame, prediction_size, quality)?;
    let preview = data_uri("image/jpeg", &encode_jpeg(frame, PREVIEW_QUALITY)?);
    Ok(EncodedCapture { image, preview })
}

/// Scale a frame to `size`×`size` and encode it as JPEG
///
/// The frame is stretched, not cropped.
///
/// # Errors
///
/// Returns error if JPEG encoding fails
pub fn encode_prediction_image(frame: &RgbImage, size: u32, quality: u8) -> Result<CapturedImage> {
    let scaled = imageops::resize(frame, size, size, FilterType::Triangle);
    let bytes = encode_jpeg(&scaled, quality)?;
    Ok(CapturedImage::new(bytes, "image/jpeg", ImageSource::Camera))
}

fn encode_jpeg(frame: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut cursor, quality);
    frame
        .write_with_encoder(encoder)
        .map_err(|e| Error::Capture(format!("jpeg encoding failed: {e}")))?;
    Ok(cursor.into_inner())
}

fn data_uri(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{mime_type};base64,{}", BASE64.encode(bytes))
}

/// MIME type of an upload
///
/// Taken from the file extension, then sniffed from the content, then
/// `application/octet-stream`. Nothing is rejected here; the service
/// decides what it can read.
#[must_use]
pub fn upload_mime_type(name: &str, bytes: &[u8]) -> &'static str {
    name.rsplit_once('.')
        .and_then(|(_, ext)| ImageFormat::from_extension(ext))
        .or_else(|| image::guess_format(bytes).ok())
        .map_or(UNKNOWN_MIME, |format| format.to_mime_type())
}

#[cfg(test)]
mod tests {
    use image::Rgb;

    use super::*;

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            #[allow(clippy::cast_possible_truncation)]
            Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        })
    }

    #[test]
    fn test_prediction_image_is_square_jpeg() {
        let image = encode_prediction_image(&gradient(320, 240), 128, 80).unwrap();

        assert_eq!(image.mime_type(), "image/jpeg");
        assert_eq!(image.source(), ImageSource::Camera);
        assert_eq!(&image.bytes()[..2], &[0xFF, 0xD8]);

        let decoded = image::load_from_memory(image.bytes()).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (128, 128));
    }

    #[test]
    fn test_preview_keeps_full_resolution() {
        let encoded = encode_capture(&gradient(320, 240), 128, 80).unwrap();
        let payload = encoded
            .preview
            .strip_prefix("data:image/jpeg;base64,")
            .unwrap();
        let bytes = BASE64.decode(payload).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();

        assert_eq!((decoded.width(), decoded.height()), (320, 240));
        assert_ne!(encoded.image.bytes(), bytes.as_slice());
    }

    #[test]
    fn test_upload_mime_from_extension() {
        assert_eq!(upload_mime_type("hand.png", &[]), "image/png");
        assert_eq!(upload_mime_type("HAND.JPG", &[]), "image/jpeg");
        assert_eq!(upload_mime_type("a.b.jpeg", &[]), "image/jpeg");
        assert_eq!(upload_mime_type("wave.gif", &[]), "image/gif");
        assert_eq!(upload_mime_type("scan.bmp", &[]), "image/bmp");
        assert_eq!(upload_mime_type("hand.webp", &[]), "image/webp");
    }

    #[test]
    fn test_upload_mime_sniffed_without_extension() {
        let png = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
        assert_eq!(upload_mime_type("IMG_0001", png), "image/png");
        assert_eq!(upload_mime_type("IMG_0001", b"plain text"), "application/octet-stream");
        assert_eq!(upload_mime_type("notes.txt", b"plain text"), "application/octet-stream");
    }

    #[test]
    fn test_upload_bytes_kept_verbatim() {
        let upload = UploadedFile {
            name: "sign.png".to_string(),
            bytes: vec![1, 2, 3, 4],
        };
        let image = upload.into_image();

        assert_eq!(image.bytes(), &[1, 2, 3, 4]);
        assert_eq!(image.mime_type(), "image/png");
        assert_eq!(image.source(), ImageSource::Upload);
        assert_eq!(image.to_data_uri(), "data:image/png;base64,AQIDBA==");
    }

    #[test]
    fn test_upload_of_unknown_type_kept() {
        let upload = UploadedFile {
            name: "capture.heic".to_string(),
            bytes: b"opaque".to_vec(),
        };
        let image = upload.into_image();

        assert_eq!(image.bytes(), b"opaque");
        assert_eq!(image.mime_type(), "application/octet-stream");
    }
}
