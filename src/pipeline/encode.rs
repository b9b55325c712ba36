//! Image intake: uploaded bytes → decoded bitmap → base64 PNG.
//!
//! Only PNG and JPEG are accepted. The format is sniffed from the bytes
//! rather than trusted from the file name, so a `.png` that is really a GIF
//! is still rejected. Everything is re-encoded as PNG before transport: one
//! lossless format means the VLM request never depends on what the user
//! happened to upload.
//!
//! No resizing, quality control or EXIF orientation handling is done here.

use crate::error::InvoiceError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use tracing::debug;

/// File extensions offered by the upload form.
pub const ACCEPTED_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// A decoded invoice image, re-encoded as base64 PNG.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    /// Standard-alphabet base64 of the PNG bytes.
    pub base64: String,
    pub width: u32,
    pub height: u32,
}

impl EncodedImage {
    /// `data:` URI suitable for an `<img src>` or an OpenAI `image_url` part.
    pub fn data_uri(&self) -> String {
        format!("data:image/png;base64,{}", self.base64)
    }

    /// Wrap as an edgequake-llm image attachment.
    pub fn to_image_data(&self, detail: &str) -> ImageData {
        ImageData::new(self.base64.clone(), "image/png").with_detail(detail)
    }
}

/// `true` if the file name carries one of the [`ACCEPTED_EXTENSIONS`].
pub fn has_accepted_extension(file_name: &str) -> bool {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| {
            let ext = ext.to_ascii_lowercase();
            ACCEPTED_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Decode uploaded bytes into a bitmap, enforcing the PNG/JPEG allow-list.
///
/// `name` is only used in error messages.
pub fn decode_image(bytes: &[u8], name: &str) -> Result<DynamicImage, InvoiceError> {
    let format = image::guess_format(bytes).map_err(|_| InvoiceError::UnsupportedFormat {
        name: name.to_string(),
    })?;

    if !matches!(format, ImageFormat::Png | ImageFormat::Jpeg) {
        return Err(InvoiceError::UnsupportedFormat {
            name: name.to_string(),
        });
    }

    let img = image::load_from_memory_with_format(bytes, format).map_err(|e| {
        InvoiceError::ImageDecode {
            detail: format!("{name}: {e}"),
        }
    })?;

    debug!(
        "Decoded {} ({:?}, {}x{})",
        name,
        format,
        img.width(),
        img.height()
    );
    Ok(img)
}

/// PNG-encode a bitmap and base64-wrap it.
pub fn encode_png(img: &DynamicImage) -> Result<EncodedImage, InvoiceError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| InvoiceError::Internal(format!("PNG encoding failed: {e}")))?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded image → {} bytes base64", b64.len());

    Ok(EncodedImage {
        base64: b64,
        width: img.width(),
        height: img.height(),
    })
}

/// Full intake step: decode with the allow-list, then PNG + base64.
pub fn intake(bytes: &[u8], name: &str) -> Result<EncodedImage, InvoiceError> {
    let img = decode_image(bytes, name)?;
    encode_png(&img)
}
