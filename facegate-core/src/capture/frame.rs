//! Still images sampled from a live stream.

use std::io::Cursor;

use base64::Engine;
use chrono::{DateTime, Utc};
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;

use crate::error::{FacegateError, Result};

/// Prefix of the wire form expected by the verification service.
pub const JPEG_DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

/// JPEG quality used for the wire form.
const JPEG_QUALITY: u8 = 90;

/// Immutable still image: pixel buffer plus capture time.
///
/// A frame is consumed by the verification call that sends it and is not
/// kept afterwards.
#[derive(Debug, Clone)]
pub struct Frame {
    pixels: RgbImage,
    captured_at: DateTime<Utc>,
}

impl Frame {
    pub fn new(pixels: RgbImage) -> Self {
        Self {
            pixels,
            captured_at: Utc::now(),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Encode as baseline JPEG bytes.
    pub fn to_jpeg(&self) -> Result<Vec<u8>> {
        let mut out = Cursor::new(Vec::new());
        JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY)
            .encode_image(&self.pixels)
            .map_err(|e| FacegateError::Encoding(format!("JPEG encoding failed: {e}")))?;
        Ok(out.into_inner())
    }

    /// Encode as a `data:image/jpeg;base64,...` URL.
    pub fn to_data_url(&self) -> Result<String> {
        let jpeg = self.to_jpeg()?;
        let mut url = String::with_capacity(JPEG_DATA_URL_PREFIX.len() + jpeg.len() * 4 / 3 + 4);
        url.push_str(JPEG_DATA_URL_PREFIX);
        base64::engine::general_purpose::STANDARD.encode_string(&jpeg, &mut url);
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn gradient(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| Rgb([x as u8, y as u8, 128]))
    }

    #[test]
    fn test_frame_dimensions() {
        let frame = Frame::new(gradient(32, 24));
        assert_eq!((frame.width(), frame.height()), (32, 24));
    }

    #[test]
    fn test_jpeg_has_soi_marker() {
        let jpeg = Frame::new(gradient(16, 16)).to_jpeg().unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_data_url_decodes_back_to_jpeg() {
        let url = Frame::new(gradient(16, 8)).to_data_url().unwrap();
        let payload = url.strip_prefix(JPEG_DATA_URL_PREFIX).unwrap();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload)
            .unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 8));
    }
}
