//! VLM interaction: build the vision request and call the service.
//!
//! Exactly one request per extraction. There is no retry or backoff and no
//! timeout beyond the HTTP client's default: a failed call surfaces
//! immediately as [`InvoiceError::ExtractionTransport`] and the user decides
//! whether to press the button again.
//!
//! Two backends implement [`VisionBackend`]:
//!
//! * [`OpenAiCompatBackend`]: posts straight to `{base_url}/chat/completions`
//!   with an explicit bearer key. The web UI uses it because the key comes
//!   from the user's session, not from the environment.
//! * [`ProviderBackend`]: wraps any edgequake-llm [`LLMProvider`], which
//!   reads its key from the provider's own environment variable. The CLI
//!   uses it when `--provider` is given.

use crate::config::ExtractionConfig;
use crate::error::InvoiceError;
use crate::invoice::ExtractionResult;
use crate::pipeline::encode::EncodedImage;
use crate::pipeline::postprocess;
use crate::prompts::EXTRACTION_PROMPT;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Everything one vision call needs.
#[derive(Debug, Clone)]
pub struct VisionRequest {
    pub model: String,
    pub instruction: String,
    pub image: EncodedImage,
    pub image_detail: String,
    pub max_tokens: usize,
    pub temperature: f32,
}

/// The single message body returned by the service.
#[derive(Debug, Clone, Default)]
pub struct VisionReply {
    pub content: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

/// A multimodal chat-completion service.
#[async_trait]
pub trait VisionBackend: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Send one request and return the first message body.
    async fn complete(&self, request: &VisionRequest) -> Result<VisionReply, InvoiceError>;
}

// ── OpenAI-compatible HTTP backend ───────────────────────────────────────────

/// Direct client for `/chat/completions` with a caller-supplied key.
pub struct OpenAiCompatBackend {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiCompatBackend {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatRequestMessage<'a>>,
    max_tokens: usize,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatRequestMessage<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl<'a> },
}

#[derive(Serialize)]
struct ImageUrl<'a> {
    url: String,
    detail: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: usize,
    #[serde(default)]
    completion_tokens: usize,
}

/// Build the JSON body for one vision request.
fn chat_request_body(request: &VisionRequest) -> ChatRequest<'_> {
    ChatRequest {
        model: &request.model,
        messages: vec![ChatRequestMessage {
            role: "user",
            content: vec![
                ContentPart::Text {
                    text: &request.instruction,
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: request.image.data_uri(),
                        detail: &request.image_detail,
                    },
                },
            ],
        }],
        max_tokens: request.max_tokens,
        temperature: request.temperature,
    }
}

#[async_trait]
impl VisionBackend for OpenAiCompatBackend {
    fn name(&self) -> &str {
        "openai-compatible"
    }

    async fn complete(&self, request: &VisionRequest) -> Result<VisionReply, InvoiceError> {
        let body = chat_request_body(request);
        debug!(model = %request.model, endpoint = %self.endpoint(), "Sending vision request");

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| InvoiceError::ExtractionTransport {
                detail: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(InvoiceError::ExtractionTransport {
                detail: format!("HTTP {}: {}", status, api_error_message(&error_body)),
            });
        }

        let chat: ChatResponse =
            response
                .json()
                .await
                .map_err(|e| InvoiceError::ExtractionTransport {
                    detail: format!("unreadable response: {e}"),
                })?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| InvoiceError::ExtractionTransport {
                detail: "response contained no message".to_string(),
            })?;

        let (input_tokens, output_tokens) = chat
            .usage
            .map(|u| (u.prompt_tokens, u.completion_tokens))
            .unwrap_or((0, 0));

        Ok(VisionReply {
            content,
            input_tokens,
            output_tokens,
        })
    }
}

/// Pull `error.message` out of an OpenAI-style error body, else return it trimmed.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().chars().take(300).collect())
}

// ── edgequake-llm provider backend ───────────────────────────────────────────

/// Adapter from an edgequake-llm provider to [`VisionBackend`].
pub struct ProviderBackend {
    provider: Arc<dyn LLMProvider>,
    label: String,
}

impl ProviderBackend {
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>) -> Self {
        Self {
            provider,
            label: label.into(),
        }
    }
}

#[async_trait]
impl VisionBackend for ProviderBackend {
    fn name(&self) -> &str {
        &self.label
    }

    async fn complete(&self, request: &VisionRequest) -> Result<VisionReply, InvoiceError> {
        // Instruction and image travel in the same user turn
        let messages = vec![ChatMessage::user_with_images(
            &request.instruction,
            vec![request.image.to_image_data(&request.image_detail)],
        )];

        let options = CompletionOptions {
            temperature: Some(request.temperature),
            max_tokens: Some(request.max_tokens),
            ..Default::default()
        };

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| InvoiceError::ExtractionTransport {
                detail: e.to_string(),
            })?;

        Ok(VisionReply {
            content: response.content,
            input_tokens: response.prompt_tokens,
            output_tokens: response.completion_tokens,
        })
    }
}

// ── Extraction call ──────────────────────────────────────────────────────────

/// Build the request for `image` from the config.
pub fn build_request(image: &EncodedImage, config: &ExtractionConfig) -> VisionRequest {
    VisionRequest {
        model: config.model.clone(),
        instruction: config
            .prompt
            .clone()
            .unwrap_or_else(|| EXTRACTION_PROMPT.to_string()),
        image: image.clone(),
        image_detail: config.image_detail.clone(),
        max_tokens: config.max_tokens,
        temperature: config.temperature,
    }
}

/// Send the image to the backend and validate the reply.
///
/// Returns either a complete [`ExtractionResult`] or an error; a reply that
/// fails to parse never yields a partially populated result.
pub async fn request_extraction(
    backend: &dyn VisionBackend,
    image: &EncodedImage,
    config: &ExtractionConfig,
) -> Result<ExtractionResult, InvoiceError> {
    let start = Instant::now();
    let request = build_request(image, config);

    let reply = backend.complete(&request).await.inspect_err(|e| {
        warn!("{}: vision call failed: {}", backend.name(), e);
    })?;

    debug!(
        "{}: {} input tokens, {} output tokens, {:?}",
        backend.name(),
        reply.input_tokens,
        reply.output_tokens,
        start.elapsed()
    );

    let result = postprocess::parse_extraction(&reply.content, config.strict_schema)
        .inspect_err(|e| warn!("Unusable model reply: {}", e))?;

    info!(
        "Extracted invoice {} with {} line items in {}ms",
        result.field_or_na("invoice_number"),
        result.line_items().len(),
        start.elapsed().as_millis()
    );
    Ok(result)
}
