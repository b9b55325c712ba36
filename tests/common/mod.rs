//! Shared helpers for the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use edgequake_invoice::{InvoiceError, VisionBackend, VisionReply, VisionRequest};
use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// A reply shaped like the one the prompt asks for.
pub const FULL_REPLY: &str = r#"```json
{
  "invoice_number": "INV-2024-001",
  "invoice_date": "2024-03-01",
  "due_date": "2024-03-31",
  "vendor_name": "Acme Supplies",
  "vendor_address": "1 Market St, Springfield",
  "vendor_tax_id": "US-123456",
  "customer_name": "Globex Corp",
  "customer_address": "42 Elm Rd, Shelbyville",
  "line_items": [
    {"description": "Widget", "quantity": "2", "unit_price": "5.00", "total_price": "10.00"}
  ],
  "subtotal": "10.00",
  "tax_amount": "1.00",
  "total_amount": "11.00",
  "currency": "USD"
}
```"#;

/// Backend that answers every request with a fixed reply.
pub struct ScriptedBackend {
    reply: Result<String, String>,
    calls: AtomicUsize,
    last_instruction: Mutex<Option<String>>,
    gate: Option<Arc<Notify>>,
}

impl ScriptedBackend {
    pub fn replying(content: impl Into<String>) -> Self {
        Self {
            reply: Ok(content.into()),
            calls: AtomicUsize::new(0),
            last_instruction: Mutex::new(None),
            gate: None,
        }
    }

    pub fn failing(detail: impl Into<String>) -> Self {
        Self {
            reply: Err(detail.into()),
            calls: AtomicUsize::new(0),
            last_instruction: Mutex::new(None),
            gate: None,
        }
    }

    /// Hold every reply until `gate` is notified once per call.
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_instruction(&self) -> Option<String> {
        self.last_instruction.lock().unwrap().clone()
    }
}

#[async_trait]
impl VisionBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &VisionRequest) -> Result<VisionReply, InvoiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_instruction.lock().unwrap() = Some(request.instruction.clone());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        match &self.reply {
            Ok(content) => Ok(VisionReply {
                content: content.clone(),
                input_tokens: 1200,
                output_tokens: 300,
            }),
            Err(detail) => Err(InvoiceError::ExtractionTransport {
                detail: detail.clone(),
            }),
        }
    }
}

fn encoded(format: ImageFormat) -> Vec<u8> {
    let mut img = RgbImage::new(8, 6);
    for (x, y, px) in img.enumerate_pixels_mut() {
        *px = Rgb([(x * 30) as u8, (y * 40) as u8, 128]);
    }
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), format).unwrap();
    buf
}

/// A small valid PNG.
pub fn png_bytes() -> Vec<u8> {
    encoded(ImageFormat::Png)
}

/// A small valid JPEG.
pub fn jpeg_bytes() -> Vec<u8> {
    encoded(ImageFormat::Jpeg)
}

/// PNG signature followed by garbage.
pub fn corrupt_png_bytes() -> Vec<u8> {
    let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
    bytes.extend_from_slice(b"definitely not an IHDR chunk");
    bytes
}

/// Minimal GIF header.
pub fn gif_bytes() -> Vec<u8> {
    b"GIF89a\x01\x00\x01\x00\x00\x00\x00;".to_vec()
}
