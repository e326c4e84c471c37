//! OpenAI-format HTTP client
//!
//! Posts chat/completions bodies and turns the SSE response into
//! `StreamPart`s. The read loop exits as soon as a send fails, so dropping
//! the receiver cancels the in-flight generation promptly.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::constants;
use crate::model::{Message, ToolDefinition};

use super::streaming::{FinishReason, StreamPart, StreamToolCall};
use super::CompletionBackend;

/// Configuration for the AI client
#[derive(Debug, Clone)]
pub struct AiClientConfig {
    /// Model ID to use for API calls
    pub model: String,
    /// OpenAI-compatible completions URL
    pub base_url: String,
    /// Maximum output tokens
    pub max_tokens: usize,
}

impl Default for AiClientConfig {
    fn default() -> Self {
        Self {
            model: constants::ai::DEFAULT_MODEL.to_string(),
            base_url: constants::ai::DEFAULT_BASE_URL.to_string(),
            max_tokens: constants::ai::MAX_OUTPUT_TOKENS,
        }
    }
}

pub struct AiClient {
    config: AiClientConfig,
    api_key: String,
    http: reqwest::Client,
}

impl AiClient {
    pub fn new(config: AiClientConfig, api_key: String) -> Self {
        Self {
            config,
            api_key,
            http: reqwest::Client::new(),
        }
    }

    pub fn config(&self) -> &AiClientConfig {
        &self.config
    }

    fn request_body(&self, messages: &[Message], tools: &[ToolDefinition], stream: bool) -> Value {
        let mut body = json!({
            "model": self.config.model,
            "messages": messages,
            "max_tokens": self.config.max_tokens,
            "stream": stream,
        });
        if !tools.is_empty() {
            body["tools"] = serde_json::to_value(tools).unwrap_or_default();
        }
        body
    }

    async fn post(&self, body: &Value) -> Result<reqwest::Response> {
        let response = self
            .http
            .post(&self.config.base_url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .context("completions request failed")?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            anyhow::bail!("completions request returned {status}: {detail}");
        }
        Ok(response)
    }
}

#[async_trait]
impl CompletionBackend for AiClient {
    async fn complete(&self, messages: Vec<Message>) -> Result<String> {
        let body = self.request_body(&messages, &[], false);
        let response = self.post(&body).await?;
        let payload: Value = response
            .json()
            .await
            .context("invalid completions response")?;

        Ok(payload["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string())
    }

    async fn stream(
        &self,
        messages: Vec<Message>,
        tools: &[ToolDefinition],
    ) -> Result<mpsc::UnboundedReceiver<StreamPart>> {
        let body = self.request_body(&messages, tools, true);
        let response = self.post(&body).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_stream(response, tx));
        Ok(rx)
    }
}

async fn run_stream(response: reqwest::Response, tx: mpsc::UnboundedSender<StreamPart>) {
    let mut stream = response.bytes_stream();
    let mut parser = ChunkParser::new();
    let mut buffer = String::new();

    while let Some(chunk) = stream.next().await {
        let bytes = match chunk {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("completions stream read error: {}", e);
                let _ = tx.send(StreamPart::Error {
                    error: format!("stream read error: {e}"),
                });
                return;
            }
        };
        buffer.push_str(&String::from_utf8_lossy(&bytes));

        while let Some(pos) = buffer.find('\n') {
            let line: String = buffer.drain(..=pos).collect();
            let Some(data) = line.trim().strip_prefix("data:") else {
                continue;
            };
            let data = data.trim();
            if data == "[DONE]" {
                parser.finish(&tx);
                return;
            }
            if !parser.process(data, &tx) {
                // Receiver dropped: the caller cancelled this generation.
                return;
            }
        }
    }

    parser.finish(&tx);
}

/// Accumulates tool-call deltas across SSE chunks.
///
/// OpenAI-format streams interleave argument fragments per call index; a
/// call is complete once the stream moves to the next index or reports a
/// finish reason.
struct ChunkParser {
    accumulators: BTreeMap<usize, ToolCallAccumulator>,
    current_index: Option<usize>,
    finished: bool,
}

#[derive(Default)]
struct ToolCallAccumulator {
    id: String,
    name: String,
    arguments: String,
}

impl ToolCallAccumulator {
    fn into_call(self) -> StreamToolCall {
        let arguments = if self.arguments.trim().is_empty() {
            json!({})
        } else {
            serde_json::from_str(&self.arguments)
                .unwrap_or_else(|_| Value::String(self.arguments.clone()))
        };
        StreamToolCall {
            id: self.id,
            name: self.name,
            arguments,
        }
    }
}

impl ChunkParser {
    fn new() -> Self {
        Self {
            accumulators: BTreeMap::new(),
            current_index: None,
            finished: false,
        }
    }

    /// Parse one `data:` payload. Returns false when the receiver is gone.
    fn process(&mut self, data: &str, tx: &mpsc::UnboundedSender<StreamPart>) -> bool {
        let payload: Value = match serde_json::from_str(data) {
            Ok(payload) => payload,
            Err(e) => {
                debug!("skipping unparsable stream chunk: {}", e);
                return true;
            }
        };
        let Some(choice) = payload["choices"].get(0) else {
            return true;
        };
        let delta = &choice["delta"];

        if let Some(content) = delta["content"].as_str() {
            if !content.is_empty()
                && tx
                    .send(StreamPart::TextDelta {
                        delta: content.to_string(),
                    })
                    .is_err()
            {
                return false;
            }
        }

        if let Some(tool_calls) = delta["tool_calls"].as_array() {
            for tool_call in tool_calls {
                let index = tool_call["index"].as_u64().unwrap_or(0) as usize;

                if self.current_index.is_some_and(|current| current != index)
                    && !self.complete_current(tx)
                {
                    return false;
                }
                self.current_index = Some(index);

                let acc = self.accumulators.entry(index).or_default();
                if let Some(id) = tool_call["id"].as_str() {
                    if acc.id.is_empty() {
                        acc.id = id.to_string();
                    }
                }
                if let Some(name) = tool_call["function"]["name"].as_str() {
                    if acc.name.is_empty() {
                        acc.name = name.to_string();
                        if tx
                            .send(StreamPart::ToolCallStart {
                                id: acc.id.clone(),
                                name: acc.name.clone(),
                            })
                            .is_err()
                        {
                            return false;
                        }
                    }
                }
                if let Some(fragment) = tool_call["function"]["arguments"].as_str() {
                    acc.arguments.push_str(fragment);
                }
            }
        }

        if let Some(reason) = choice["finish_reason"].as_str() {
            if !self.drain(tx) {
                return false;
            }
            self.finished = true;
            if tx
                .send(StreamPart::Finish {
                    reason: FinishReason::parse(reason),
                })
                .is_err()
            {
                return false;
            }
        }

        true
    }

    /// Emit the accumulator for the index the stream just moved past.
    fn complete_current(&mut self, tx: &mpsc::UnboundedSender<StreamPart>) -> bool {
        let Some(index) = self.current_index else {
            return true;
        };
        let Some(acc) = self.accumulators.remove(&index) else {
            return true;
        };
        tx.send(StreamPart::ToolCallComplete {
            tool_call: acc.into_call(),
        })
        .is_ok()
    }

    /// Emit every remaining accumulator in index order.
    fn drain(&mut self, tx: &mpsc::UnboundedSender<StreamPart>) -> bool {
        let drained = std::mem::take(&mut self.accumulators);
        for (_, acc) in drained {
            if tx
                .send(StreamPart::ToolCallComplete {
                    tool_call: acc.into_call(),
                })
                .is_err()
            {
                return false;
            }
        }
        self.current_index = None;
        true
    }

    /// Stream ended without `[DONE]` bookkeeping; flush what we have.
    fn finish(&mut self, tx: &mpsc::UnboundedSender<StreamPart>) {
        if self.finished {
            return;
        }
        if !self.drain(tx) {
            return;
        }
        self.finished = true;
        let _ = tx.send(StreamPart::Finish {
            reason: FinishReason::Stop,
        });
    }
}
