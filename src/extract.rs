//! Extraction entry points.
//!
//! Straight-line: resolve the input, run intake, pick a backend, make the one
//! vision call. Every function returns either a complete
//! [`ExtractionResult`] or an [`InvoiceError`].

use crate::config::ExtractionConfig;
use crate::error::InvoiceError;
use crate::invoice::ExtractionResult;
use crate::pipeline::encode::{self, EncodedImage};
use crate::pipeline::llm::{self, OpenAiCompatBackend, ProviderBackend, VisionBackend};
use crate::pipeline::input;
use edgequake_llm::ProviderFactory;
use std::sync::Arc;
use tracing::info;

/// Extract invoice data from a local image file or HTTP/HTTPS URL.
///
/// # Arguments
/// * `input_str`: local path or URL of a PNG/JPEG image
/// * `credential`: API key for the OpenAI-compatible backend; ignored when
///   `config` names a provider or carries a pre-built backend
/// * `config`: extraction configuration
///
/// # Errors
/// Intake failures (`FileNotFound`, `UnsupportedFormat`, `ImageDecode`, …),
/// `MissingCredential`, or one of the extraction errors.
pub async fn extract(
    input_str: impl AsRef<str>,
    credential: Option<&str>,
    config: &ExtractionConfig,
) -> Result<ExtractionResult, InvoiceError> {
    let input_str = input_str.as_ref();
    info!("Starting extraction: {}", input_str);

    let loaded = input::load_input(input_str, config.download_timeout_secs).await?;
    extract_from_bytes(&loaded.bytes, &loaded.name, credential, config).await
}

/// Extract invoice data from image bytes already in memory.
pub async fn extract_from_bytes(
    bytes: &[u8],
    name: &str,
    credential: Option<&str>,
    config: &ExtractionConfig,
) -> Result<ExtractionResult, InvoiceError> {
    let image = encode::intake(bytes, name)?;
    extract_image(&image, credential, config).await
}

/// Extract invoice data from an image that already went through intake.
pub async fn extract_image(
    image: &EncodedImage,
    credential: Option<&str>,
    config: &ExtractionConfig,
) -> Result<ExtractionResult, InvoiceError> {
    let backend = resolve_backend(config, credential)?;
    llm::request_extraction(backend.as_ref(), image, config).await
}

/// Synchronous wrapper around [`extract`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync(
    input_str: impl AsRef<str>,
    credential: Option<&str>,
    config: &ExtractionConfig,
) -> Result<ExtractionResult, InvoiceError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| InvoiceError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract(input_str, credential, config))
}

/// Pick the backend for one extraction, from most-specific to least-specific.
///
/// 1. **Pre-built backend** (`config.backend`): used as-is (tests, custom
///    middleware).
/// 2. **Named provider** (`config.provider_name`): created through
///    [`ProviderFactory::create_llm_provider`], which reads the provider's
///    API key from its environment variable.
/// 3. **Explicit credential**: an [`OpenAiCompatBackend`] against
///    `config.base_url`.
///
/// A blank credential counts as missing.
pub fn resolve_backend(
    config: &ExtractionConfig,
    credential: Option<&str>,
) -> Result<Arc<dyn VisionBackend>, InvoiceError> {
    if let Some(ref backend) = config.backend {
        return Ok(Arc::clone(backend));
    }

    if let Some(ref name) = config.provider_name {
        let provider = ProviderFactory::create_llm_provider(name, &config.model).map_err(|e| {
            InvoiceError::ProviderNotConfigured {
                provider: name.to_string(),
                hint: format!("{e}"),
            }
        })?;
        return Ok(Arc::new(ProviderBackend::new(provider, name.clone())));
    }

    match credential.map(str::trim) {
        Some(key) if !key.is_empty() => {
            Ok(Arc::new(OpenAiCompatBackend::new(key, config.base_url.clone())))
        }
        _ => Err(InvoiceError::MissingCredential),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_credential_is_missing() {
        let config = ExtractionConfig::default();
        assert!(matches!(
            resolve_backend(&config, None),
            Err(InvoiceError::MissingCredential)
        ));
        assert!(matches!(
            resolve_backend(&config, Some("   ")),
            Err(InvoiceError::MissingCredential)
        ));
    }

    #[test]
    fn credential_selects_http_backend() {
        let config = ExtractionConfig::default();
        let backend = resolve_backend(&config, Some("sk-test")).unwrap();
        assert_eq!(backend.name(), "openai-compatible");
    }
}
