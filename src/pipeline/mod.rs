//! Pipeline stages for invoice extraction.
//!
//! Each submodule implements exactly one transformation step so each can be
//! tested on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ encode ──▶ llm ──▶ postprocess
//! (path/URL) (PNG+b64)  (VLM)   (fences, JSON, schema)
//! ```
//!
//! 1. [`input`]: read the image from disk or download it (CLI only; the web
//!    UI hands bytes straight to `encode`)
//! 2. [`encode`]: enforce the PNG/JPEG allow-list, decode, re-encode as PNG
//!    and base64-wrap for the request body
//! 3. [`llm`]: one VLM call; the only stage with network I/O to the model
//! 4. [`postprocess`]: strip code fences, parse JSON, validate the shape

pub mod encode;
pub mod input;
pub mod llm;
pub mod postprocess;
