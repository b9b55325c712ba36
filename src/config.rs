//! Configuration types for invoice extraction and the web UI.
//!
//! Extraction behaviour is controlled through [`ExtractionConfig`], built via
//! its [`ExtractionConfigBuilder`]. The web server has its own small
//! [`ServeConfig`]. Neither holds the API key: the credential belongs to a
//! session (web) or to the process environment (CLI), never to shared config.

use crate::error::InvoiceError;
use crate::pipeline::llm::VisionBackend;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// Default OpenAI-compatible endpoint root.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default vision model.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Configuration for one invoice extraction.
///
/// # Example
/// ```rust
/// use edgequake_invoice::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .model("gpt-4.1-mini")
///     .max_tokens(1500)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_tokens, 1500);
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Vision model identifier. Default: [`DEFAULT_MODEL`].
    pub model: String,

    /// Root URL of the OpenAI-compatible chat-completion API. Default: [`DEFAULT_BASE_URL`].
    ///
    /// Any server that speaks `/chat/completions` with image parts works
    /// (Azure-style gateways, LiteLLM, vLLM, Ollama's OpenAI shim).
    pub base_url: String,

    /// Named edgequake-llm provider ("openai", "anthropic", "gemini", …).
    ///
    /// When set, the request goes through the provider factory and the API
    /// key is read from that provider's environment variable instead of
    /// being passed explicitly.
    pub provider_name: Option<String>,

    /// Pre-constructed backend. Takes precedence over everything else.
    pub backend: Option<Arc<dyn VisionBackend>>,

    /// Maximum tokens the model may generate. Default: 1000.
    ///
    /// A single invoice JSON object rarely exceeds 600 tokens; very long
    /// line-item tables are the exception and may need more.
    pub max_tokens: usize,

    /// Sampling temperature. Default: 0.1.
    pub temperature: f32,

    /// Custom extraction instruction. If None, uses [`crate::prompts::EXTRACTION_PROMPT`].
    pub prompt: Option<String>,

    /// Image detail hint for OpenAI-style APIs. Default: "high".
    pub image_detail: String,

    /// Reject replies with missing or unexpected keys instead of tolerating them. Default: false.
    pub strict_schema: bool,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            provider_name: None,
            backend: None,
            max_tokens: 1000,
            temperature: 0.1,
            prompt: None,
            image_detail: "high".to_string(),
            strict_schema: false,
            download_timeout_secs: 120,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("provider_name", &self.provider_name)
            .field("backend", &self.backend.as_ref().map(|b| b.name().to_string()))
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("prompt", &self.prompt.as_ref().map(|_| "<custom>"))
            .field("image_detail", &self.image_detail)
            .field("strict_schema", &self.strict_schema)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        let url: String = url.into();
        self.config.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn backend(mut self, backend: Arc<dyn VisionBackend>) -> Self {
        self.config.backend = Some(backend);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompt = Some(prompt.into());
        self
    }

    pub fn image_detail(mut self, detail: impl Into<String>) -> Self {
        self.config.image_detail = detail.into();
        self
    }

    pub fn strict_schema(mut self, v: bool) -> Self {
        self.config.strict_schema = v;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, InvoiceError> {
        let c = &self.config;
        if c.max_tokens == 0 {
            return Err(InvoiceError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if c.model.trim().is_empty() {
            return Err(InvoiceError::InvalidConfig("model must not be empty".into()));
        }
        if !(c.base_url.starts_with("http://") || c.base_url.starts_with("https://")) {
            return Err(InvoiceError::InvalidConfig(format!(
                "base URL must start with http:// or https://, got '{}'",
                c.base_url
            )));
        }
        if !matches!(c.image_detail.as_str(), "low" | "high" | "auto") {
            return Err(InvoiceError::InvalidConfig(format!(
                "image detail must be low, high, or auto, got '{}'",
                c.image_detail
            )));
        }
        Ok(self.config)
    }
}

/// Configuration for the web UI server.
#[derive(Debug, Clone)]
pub struct ServeConfig {
    /// Listen address. Default: 127.0.0.1:8501.
    pub addr: SocketAddr,

    /// Largest accepted upload in bytes. Default: 20 MiB.
    ///
    /// Matches the upper bound most vision APIs accept for a single image.
    pub max_upload_bytes: usize,

    /// Sessions untouched for this long are dropped, image and key included.
    /// Default: 30 minutes.
    pub session_idle_ttl: Duration,

    /// Most sessions held at once. Opening one more evicts the least recently
    /// used idle session. Default: 1000.
    pub max_sessions: usize,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8501)),
            max_upload_bytes: 20 * 1024 * 1024,
            session_idle_ttl: Duration::from_secs(30 * 60),
            max_sessions: 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ExtractionConfig::default();
        assert_eq!(c.max_tokens, 1000);
        assert_eq!(c.image_detail, "high");
        assert!(!c.strict_schema);
        assert_eq!(c.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn builder_trims_base_url() {
        let c = ExtractionConfig::builder()
            .base_url("http://localhost:11434/v1/")
            .build()
            .unwrap();
        assert_eq!(c.base_url, "http://localhost:11434/v1");
    }

    #[test]
    fn builder_rejects_zero_tokens() {
        let err = ExtractionConfig::builder().max_tokens(0).build().unwrap_err();
        assert!(err.to_string().contains("max_tokens"));
    }

    #[test]
    fn builder_rejects_bad_detail() {
        assert!(ExtractionConfig::builder()
            .image_detail("ultra")
            .build()
            .is_err());
    }

    #[test]
    fn builder_clamps_temperature() {
        let c = ExtractionConfig::builder().temperature(9.0).build().unwrap();
        assert_eq!(c.temperature, 2.0);
    }
}
