//! LLM client: the single point of entry for chat-completion calls.
//!
//! ARCHITECTURAL RULE: No other module may call the completion provider directly.
//!
//! Results are reported only through a [`StreamHandler`]. The client holds no
//! per-call state, never retries, and applies no timeout.
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

pub mod stream;

use stream::{StreamDecoder, StreamEvent};

const MAX_TOKENS: u32 = 8000;
const TEMPERATURE: f32 = 0.7;
const TOP_P: f32 = 0.7;
const TOP_K: u32 = 50;
const FREQUENCY_PENALTY: f32 = 0.5;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API request failed (status {status}): {message}")]
    Api { status: u16, message: String },
}

/// Receives the output of one streamed completion.
///
/// `on_complete` fires exactly once for a successful stream. `on_error` fires
/// at most once, and never on a stream that already completed.
#[async_trait]
pub trait StreamHandler: Send {
    async fn on_content(&mut self, chunk: &str);
    async fn on_reasoning(&mut self, chunk: &str);
    async fn on_error(&mut self, message: String);
    async fn on_complete(&mut self);
}

/// What to ask for. `prompt` is the fully composed user message.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    top_k: u32,
    frequency_penalty: f32,
    n: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

impl<'a> ChatRequest<'a> {
    fn streaming(request: &'a CompletionRequest) -> Self {
        Self {
            model: &request.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            stream: true,
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
            top_p: TOP_P,
            top_k: TOP_K,
            frequency_penalty: FREQUENCY_PENALTY,
            n: 1,
            response_format: ResponseFormat {
                format_type: "text",
            },
        }
    }
}

/// Streaming chat-completion client. The API key is injected at construction.
#[derive(Clone)]
pub struct CompletionClient {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl CompletionClient {
    pub fn new(endpoint: String, api_key: String) -> Self {
        Self {
            client: Client::new(),
            endpoint,
            api_key,
        }
    }

    /// Issues one streamed completion request and drives `handler` until the
    /// upstream body ends or fails.
    pub async fn stream_completion<H>(&self, request: &CompletionRequest, handler: &mut H)
    where
        H: StreamHandler + ?Sized,
    {
        let response = match self.send(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Completion request failed: {e}");
                handler.on_error(e.to_string()).await;
                return;
            }
        };

        let mut body = response.bytes_stream();
        let mut decoder = StreamDecoder::new();
        let mut completed = false;

        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(bytes) => {
                    for event in decoder.feed(&bytes) {
                        dispatch(event, handler, &mut completed).await;
                    }
                }
                Err(e) => {
                    if completed {
                        warn!("Completion body failed after stop: {e}");
                    } else {
                        warn!("Completion body failed: {e}");
                        handler.on_error(LlmError::Http(e).to_string()).await;
                    }
                    return;
                }
            }
        }

        for event in decoder.finish() {
            dispatch(event, handler, &mut completed).await;
        }

        if !completed {
            handler.on_complete().await;
        }
    }

    async fn send(&self, request: &CompletionRequest) -> Result<reqwest::Response, LlmError> {
        debug!(
            "Requesting streamed completion: model={}, prompt_chars={}",
            request.model,
            request.prompt.chars().count()
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&ChatRequest::streaming(request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!("Completion API returned {status}: {message}");
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }
}

async fn dispatch<H>(event: StreamEvent, handler: &mut H, completed: &mut bool)
where
    H: StreamHandler + ?Sized,
{
    match event {
        StreamEvent::Content(chunk) => handler.on_content(&chunk).await,
        StreamEvent::Reasoning(chunk) => handler.on_reasoning(&chunk).await,
        StreamEvent::Stop => {
            if !*completed {
                *completed = true;
                handler.on_complete().await;
            }
        }
        StreamEvent::Done => debug!("Received [DONE] sentinel"),
    }
}
