//! Error types for the edgequake-invoice library.
//!
//! A single enum covers every failure the extraction flow can surface. They
//! fall into two groups:
//!
//! * **Per-request failures**: a bad upload, a missing API key, a transport
//!   error or an unusable model reply. The web UI renders these inline and
//!   the session stays usable; nothing here is fatal to the server process.
//!
//! * **Input/CLI failures**: a path that does not exist, a URL that cannot
//!   be downloaded, an output directory that cannot be written.
//!
//! [`InvoiceError::status_code`] maps each variant to the HTTP status the web
//! layer answers with.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the edgequake-invoice library.
#[derive(Debug, Error)]
pub enum InvoiceError {
    // ── Intake errors ─────────────────────────────────────────────────────
    /// The uploaded bytes are not a PNG or JPEG image.
    #[error("Unsupported image format '{name}'\nUpload a PNG, JPG, or JPEG file.")]
    UnsupportedFormat { name: String },

    /// The bytes claim a supported format but cannot be decoded.
    #[error("Could not decode image: {detail}")]
    ImageDecode { detail: String },

    // ── Credential errors ─────────────────────────────────────────────────
    /// No access key was supplied for the vision service.
    #[error("No API key configured.\nEnter your OpenAI API key to proceed.")]
    MissingCredential,

    /// The configured provider could not be created (missing env key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// Extraction was triggered before any image was uploaded.
    #[error("No invoice image uploaded yet.\nChoose a PNG, JPG, or JPEG file first.")]
    NoImage,

    /// The session already has an extraction in flight.
    #[error("An extraction is already running for this session.")]
    ExtractionInProgress,

    /// The outbound call failed, returned a non-2xx status, or carried no message.
    #[error("Error extracting data: {detail}")]
    ExtractionTransport { detail: String },

    /// The reply is not JSON once code fences are removed.
    #[error("Error extracting data: response is not valid JSON ({reason})")]
    ExtractionParse { reason: String },

    /// The reply is JSON but does not have the requested invoice shape.
    #[error("Error extracting data: unexpected response shape ({detail})")]
    ExtractionSchema {
        missing: Vec<String>,
        unexpected: Vec<String>,
        detail: String,
    },

    // ── Input errors (CLI) ────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Image file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a usable file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not write an export file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Export serialisation failed.
    #[error("Failed to export invoice data: {0}")]
    Export(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl InvoiceError {
    /// HTTP status the web UI answers with when this error ends a request.
    pub fn status_code(&self) -> u16 {
        match self {
            InvoiceError::UnsupportedFormat { .. }
            | InvoiceError::ImageDecode { .. }
            | InvoiceError::InvalidInput { .. } => 422,
            InvoiceError::MissingCredential => 401,
            InvoiceError::NoImage => 400,
            InvoiceError::ExtractionInProgress => 409,
            InvoiceError::ExtractionTransport { .. }
            | InvoiceError::ExtractionParse { .. }
            | InvoiceError::ExtractionSchema { .. }
            | InvoiceError::DownloadFailed { .. } => 502,
            InvoiceError::DownloadTimeout { .. } => 504,
            InvoiceError::FileNotFound { .. } => 404,
            InvoiceError::PermissionDenied { .. } => 403,
            InvoiceError::InvalidConfig(_) => 400,
            InvoiceError::ProviderNotConfigured { .. }
            | InvoiceError::OutputWriteFailed { .. }
            | InvoiceError::Export(_)
            | InvoiceError::Internal(_) => 500,
        }
    }

    /// `true` for failures that should be shown as a warning rather than an error.
    pub fn is_warning(&self) -> bool {
        matches!(self, InvoiceError::MissingCredential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_format_display() {
        let e = InvoiceError::UnsupportedFormat {
            name: "invoice.gif".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("invoice.gif"), "got: {msg}");
        assert!(msg.contains("PNG"));
    }

    #[test]
    fn parse_error_display() {
        let e = InvoiceError::ExtractionParse {
            reason: "expected value at line 1 column 1".into(),
        };
        assert!(e.to_string().starts_with("Error extracting data"));
        assert!(e.to_string().contains("line 1 column 1"));
    }

    #[test]
    fn schema_error_display() {
        let e = InvoiceError::ExtractionSchema {
            missing: vec!["total_amount".into()],
            unexpected: vec![],
            detail: "missing fields: total_amount".into(),
        };
        assert!(e.to_string().contains("total_amount"));
    }

    #[test]
    fn status_codes() {
        assert_eq!(InvoiceError::MissingCredential.status_code(), 401);
        assert_eq!(
            InvoiceError::ImageDecode {
                detail: "eof".into()
            }
            .status_code(),
            422
        );
        assert_eq!(
            InvoiceError::ExtractionTransport {
                detail: "HTTP 500".into()
            }
            .status_code(),
            502
        );
    }

    #[test]
    fn only_missing_credential_is_a_warning() {
        assert!(InvoiceError::MissingCredential.is_warning());
        assert!(!InvoiceError::Internal("x".into()).is_warning());
    }
}
