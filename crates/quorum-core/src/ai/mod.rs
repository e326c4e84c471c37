//! AI provider layer
//!
//! One opaque generation capability behind `CompletionBackend`, with a
//! single HTTP implementation speaking the OpenAI chat/completions format.

pub mod client;
pub mod streaming;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::model::{Message, ToolDefinition};
use self::streaming::StreamPart;

/// Opaque text/tool generation capability.
///
/// `complete` is the one-shot form used by the scheduler; `stream` is the
/// incremental form used by panel agents. Dropping the returned receiver
/// cancels the in-flight generation.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, messages: Vec<Message>) -> Result<String>;

    async fn stream(
        &self,
        messages: Vec<Message>,
        tools: &[ToolDefinition],
    ) -> Result<mpsc::UnboundedReceiver<StreamPart>>;
}
