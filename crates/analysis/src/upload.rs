//! Upload validation and image preparation.
//!
//! Photos taken with a front camera are often stored mirrored with EXIF
//! orientation 2. The writing on a sign is unreadable that way, so mirrored
//! images are flipped back before anything else looks at them. Every image
//! is re-encoded as PNG and handed to the model as a `data:` URL.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use colonylab_core::Error;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageFormat, ImageReader};
use sha2::{Digest, Sha256};
use std::io::Cursor;
use tracing::debug;

/// Upload types the service accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageMimeType {
    Jpeg,
    Png,
}

impl ImageMimeType {
    pub const ALL: &'static [ImageMimeType] = &[ImageMimeType::Jpeg, ImageMimeType::Png];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }

    /// Parse a `Content-Type` value, ignoring parameters and case.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type.split(';').next().unwrap_or_default().trim();
        Self::ALL
            .iter()
            .copied()
            .find(|m| m.as_str().eq_ignore_ascii_case(essence))
    }
}

/// An image ready to send to the model.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    /// `data:image/png;base64,...`
    pub data_url: String,
    /// Whether a horizontal mirror was undone
    pub mirrored: bool,
    pub width: u32,
    pub height: u32,
}

/// Hex SHA-256 of the raw upload, used as a cache key.
pub fn digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Flip the image back when its orientation says it is mirrored.
pub fn correct_inversion(image: DynamicImage, orientation: Orientation) -> (DynamicImage, bool) {
    if orientation == Orientation::FlipHorizontal {
        (image.fliph(), true)
    } else {
        (image, false)
    }
}

/// Decode, un-mirror and re-encode an upload.
pub fn prepare_image(bytes: &[u8]) -> Result<PreparedImage, Error> {
    let invalid = |e: image::ImageError| Error::InvalidInput(format!("Unreadable image: {e}"));

    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| Error::InvalidInput(format!("Unreadable image: {e}")))?;
    let mut decoder = reader.into_decoder().map_err(invalid)?;
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
    let decoded = DynamicImage::from_decoder(decoder).map_err(invalid)?;

    let (image, mirrored) = correct_inversion(decoded, orientation);
    if mirrored {
        debug!("Corrected horizontally mirrored image");
    }

    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| Error::Internal(format!("PNG encoding failed: {e}")))?;

    Ok(PreparedImage {
        data_url: format!("data:{};base64,{}", ImageMimeType::Png.as_str(), STANDARD.encode(&png)),
        mirrored,
        width: image.width(),
        height: image.height(),
    })
}
