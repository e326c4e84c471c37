//! Agent directory
//!
//! Panel agents are named personas bound to a shared generation backend.
//! The catalog is immutable once built and passed by reference; loading
//! personas from external files is a deployment concern, not ours.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;

use crate::ai::streaming::StreamPart;
use crate::ai::CompletionBackend;
use crate::model::{Message, ToolDefinition};

mod prompts;

/// A named persona.
#[derive(Debug, Clone)]
pub struct AgentDefinition {
    pub name: String,
    pub system_prompt: String,
}

impl AgentDefinition {
    pub fn new(name: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            system_prompt: system_prompt.into(),
        }
    }
}

/// Immutable name → persona lookup. Roster order is significant: the
/// first entry is the scheduler's last-resort fallback.
pub struct AgentCatalog {
    agents: Vec<AgentDefinition>,
}

impl AgentCatalog {
    pub fn new(agents: Vec<AgentDefinition>) -> Self {
        Self { agents }
    }

    /// The built-in SDLC panel.
    pub fn builtin() -> Self {
        Self::new(vec![
            AgentDefinition::new("business-analyst", prompts::BUSINESS_ANALYST),
            AgentDefinition::new("sr-business-analyst", prompts::SR_BUSINESS_ANALYST),
            AgentDefinition::new("developer", prompts::DEVELOPER),
            AgentDefinition::new("sr-developer", prompts::SR_DEVELOPER),
            AgentDefinition::new("quality-assurance", prompts::QUALITY_ASSURANCE),
            AgentDefinition::new("sr-quality-assurance", prompts::SR_QUALITY_ASSURANCE),
        ])
    }

    /// Case-insensitive lookup.
    pub fn resolve(&self, name: &str) -> Option<&AgentDefinition> {
        self.agents
            .iter()
            .find(|agent| agent.name.eq_ignore_ascii_case(name))
    }

    pub fn names(&self) -> Vec<String> {
        self.agents.iter().map(|agent| agent.name.clone()).collect()
    }

    pub fn first_name(&self) -> Option<&str> {
        self.agents.first().map(|agent| agent.name.as_str())
    }
}

/// Binds the catalog to a generation backend.
pub struct AgentDirectory {
    catalog: Arc<AgentCatalog>,
    backend: Arc<dyn CompletionBackend>,
}

impl AgentDirectory {
    pub fn new(catalog: Arc<AgentCatalog>, backend: Arc<dyn CompletionBackend>) -> Self {
        Self { catalog, backend }
    }

    /// Produce a callable agent pre-bound to its persona, or None for an
    /// unknown name.
    pub fn get(&self, name: &str) -> Option<Agent> {
        let definition = self.catalog.resolve(name)?;
        Some(Agent {
            name: definition.name.clone(),
            system_prompt: definition.system_prompt.clone(),
            backend: self.backend.clone(),
        })
    }
}

/// A callable panelist: persona plus backend.
pub struct Agent {
    pub name: String,
    system_prompt: String,
    backend: Arc<dyn CompletionBackend>,
}

impl Agent {
    /// Stream one generation turn with the persona prepended.
    pub async fn stream(
        &self,
        history: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<mpsc::UnboundedReceiver<StreamPart>> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(Message::system(self.system_prompt.clone()));
        messages.extend(history.iter().cloned());
        self.backend.stream(messages, tools).await
    }
}
