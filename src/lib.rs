//! # edgequake-invoice
//!
//! Extract structured data from invoice images using Vision Language Models (VLMs).
//!
//! ## Why this crate?
//!
//! Invoice layouts vary wildly between vendors, so template- or OCR-based
//! extractors need per-vendor rules. Instead this crate hands the image to a
//! VLM together with a fixed JSON schema and validates what comes back. The
//! result is one typed [`ExtractionResult`] that can be shown on screen or
//! exported as JSON and CSV.
//!
//! ## Pipeline Overview
//!
//! ```text
//! image (PNG / JPG / JPEG)
//!  │
//!  ├─ 1. Input    local file, URL, or uploaded bytes
//!  ├─ 2. Encode   decode → PNG → base64 (spawn_blocking in the web UI)
//!  ├─ 3. VLM      one chat-completion call with the extraction prompt
//!  ├─ 4. Parse    strip code fences, parse JSON, validate the invoice shape
//!  └─ 5. Present  fixed layout on screen, JSON / CSV downloads
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_invoice::{extract, ExtractionConfig, InvoiceView};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExtractionConfig::default();
//!     let key = std::env::var("OPENAI_API_KEY").ok();
//!     let result = extract("invoice.png", key.as_deref(), &config).await?;
//!     println!("{}", InvoiceView::from_result(&result).render_text());
//!     Ok(())
//! }
//! ```
//!
//! ## Web UI
//!
//! [`web::serve`] runs the browser interface: enter a key, upload an image,
//! extract, download. Each browser gets its own session; nothing is stored on
//! disk.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `invoice2json` binary (clap + indicatif + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-invoice = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod export;
pub mod extract;
pub mod invoice;
pub mod pipeline;
pub mod present;
pub mod prompts;
pub mod web;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder, ServeConfig};
pub use error::InvoiceError;
pub use export::{line_items_csv, to_json_pretty};
pub use extract::{extract, extract_from_bytes, extract_image, extract_sync, resolve_backend};
pub use invoice::{ExtractionResult, LineItem, INVOICE_FIELDS, NOT_AVAILABLE};
pub use pipeline::encode::EncodedImage;
pub use pipeline::llm::{OpenAiCompatBackend, ProviderBackend, VisionBackend, VisionReply, VisionRequest};
pub use present::InvoiceView;
