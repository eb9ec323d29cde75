use crate::{
    error::{GenAiError, Result},
    models::{
        ChatCompletionChunk, ChatCompletionRequest, ChatMessage, ContentPart,
        ImageGenerationRequest, ImageUrl, ModelCategory, ModelInfo, StreamChunk,
    },
};
use futures::stream::Stream;
use futures::StreamExt;
use std::pin::Pin;
use tokio_stream::wrappers::ReceiverStream;

pub const DEFAULT_IMAGE_MODEL: &str = "gpt-4o-image";

#[derive(Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    default_model: Option<String>,
}

impl ChatClient {
    pub fn new(
        http: reqwest::Client,
        base_url: String,
        api_key: Option<String>,
        default_model: Option<String>,
    ) -> Self {
        Self {
            http,
            base_url,
            api_key,
            default_model,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn default_model(&self) -> Option<&str> {
        self.default_model.as_deref()
    }

    pub fn supported_models() -> Vec<ModelInfo> {
        vec![
            ModelInfo {
                id: "gpt-4o-image".to_string(),
                name: "GPT-4o Image".to_string(),
                provider: "OpenAI".to_string(),
                category: ModelCategory::Image,
                description: "Image generation with in-band progress reporting".to_string(),
            },
            ModelInfo {
                id: "gpt-4o".to_string(),
                name: "GPT-4o".to_string(),
                provider: "OpenAI".to_string(),
                category: ModelCategory::Text,
                description: "General multimodal chat completion".to_string(),
            },
            ModelInfo {
                id: "gpt-4o-mini".to_string(),
                name: "GPT-4o Mini".to_string(),
                provider: "OpenAI".to_string(),
                category: ModelCategory::Text,
                description: "Smaller, faster chat completion".to_string(),
            },
        ]
    }

    /// Builds the multi-part streaming request for an image generation: a
    /// single user message carrying the prompt text plus the inline reference
    /// image when one is set.
    pub fn build_request(&self, request: &ImageGenerationRequest) -> ChatCompletionRequest {
        let mut parts = vec![ContentPart::Text {
            text: request.prompt.clone(),
        }];

        if let Some(image) = &request.reference_image {
            parts.push(ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: image.data_url().to_string(),
                },
            });
        }

        let model = request
            .model_id
            .clone()
            .or_else(|| self.default_model.clone())
            .unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string());

        ChatCompletionRequest {
            model,
            messages: vec![ChatMessage::user(parts)],
            stream: true,
        }
    }

    /// Opens a streaming completion and yields decoded content deltas. The
    /// response body is consumed on a spawned task; chunks arrive through a
    /// channel-backed stream in wire order.
    pub async fn stream_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));

        log::info!("Invoking streaming model: {}", request.model);

        let mut http_request = self.http.post(&url).json(&request);
        if let Some(api_key) = &self.api_key {
            http_request = http_request.bearer_auth(api_key);
        }

        let response = http_request
            .send()
            .await
            .map_err(|e| GenAiError::RequestError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::error!("Chat completion request failed: {} - {}", status, body);
            return Err(GenAiError::ResponseError(format!(
                "Upstream returned {}: {}",
                status, body
            )));
        }

        let mut body = response.bytes_stream();

        // Decode the SSE body on its own task and hand chunks over a channel
        let (tx, rx) = tokio::sync::mpsc::channel(100);

        tokio::spawn(async move {
            let mut buffer = String::new();

            while let Some(piece) = body.next().await {
                let bytes = match piece {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        let _ = tx.send(Err(GenAiError::StreamError(e.to_string()))).await;
                        return;
                    }
                };

                buffer.push_str(&String::from_utf8_lossy(&bytes));

                while let Some(event) = next_sse_event(&mut buffer) {
                    match decode_sse_event(&event) {
                        Ok(Some(chunk)) => {
                            let done = chunk.done;
                            if tx.send(Ok(chunk)).await.is_err() {
                                return;
                            }
                            if done {
                                return;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => {
                            let _ = tx.send(Err(e)).await;
                            return;
                        }
                    }
                }
            }

            // Body ended without an in-band terminator
            let _ = tx
                .send(Ok(StreamChunk {
                    chunk: String::new(),
                    done: true,
                    finish_reason: Some("complete".to_string()),
                }))
                .await;
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

/// Pops the next complete event (terminated by a blank line, LF or CRLF) off
/// the front of the receive buffer, or returns None if no full event has
/// arrived yet.
fn next_sse_event(buffer: &mut String) -> Option<String> {
    let lf = buffer.find("\n\n").map(|at| (at, 2));
    let crlf = buffer.find("\r\n\r\n").map(|at| (at, 4));

    let (boundary, separator_len) = match (lf, crlf) {
        (Some(a), Some(b)) => {
            if a.0 < b.0 {
                a
            } else {
                b
            }
        }
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => return None,
    };

    let event = buffer[..boundary].to_string();
    buffer.drain(..boundary + separator_len);
    Some(event)
}

/// Decodes one SSE event into a StreamChunk. Events without a data field
/// (comments, keepalives) decode to None.
fn decode_sse_event(event: &str) -> Result<Option<StreamChunk>> {
    let data: Vec<&str> = event
        .lines()
        .filter_map(|line| line.trim_end_matches('\r').strip_prefix("data:"))
        .map(|value| value.trim_start())
        .collect();

    if data.is_empty() {
        return Ok(None);
    }
    let data = data.join("\n");

    if data == "[DONE]" {
        return Ok(Some(StreamChunk {
            chunk: String::new(),
            done: true,
            finish_reason: Some("complete".to_string()),
        }));
    }

    let parsed: ChatCompletionChunk = serde_json::from_str(&data)
        .map_err(|e| GenAiError::ResponseError(format!("Malformed stream event: {}", e)))?;

    let (content, finish_reason) = match parsed.choices.first() {
        Some(choice) => (
            choice.delta.content.clone().unwrap_or_default(),
            choice.finish_reason.clone(),
        ),
        None => (String::new(), None),
    };

    Ok(Some(StreamChunk {
        done: finish_reason.is_some(),
        chunk: content,
        finish_reason,
    }))
}
