//! Speaker-selection scheduler
//!
//! Each round the manager asks a lightweight model which panelist acts
//! next. The model's answer is free text; everything after that is a
//! deterministic parse with an ordered fallback chain (structured decode →
//! keyword scan → default agent). The scheduler never fails a round: a
//! transport error degrades exactly like an unmatched decision token.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::ai::CompletionBackend;
use crate::model::Message;

/// Cap on rendered history content per message.
const HISTORY_SNIPPET_CHARS: usize = 500;

pub const AWAIT_USER_TOKEN: &str = "AWAIT_USER";
pub const COMPLETE_TOKEN: &str = "COMPLETE";
const DEFAULT_AGENT: &str = "business-analyst";

const MANAGER_PERSONA: &str = "\
You are the delivery manager of a software team. Each round you decide \
which panelist speaks next, or whether the team should pause for the user, \
or whether the task is finished.";

/// What the panel should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Choice {
    Speak(String),
    AwaitUser,
    Complete,
}

/// Scheduler output. `reasoning` is retained for diagnostics only.
#[derive(Debug, Clone)]
pub struct Decision {
    pub choice: Choice,
    pub reasoning: String,
}

impl Decision {
    fn speak(agent: impl Into<String>, reasoning: impl Into<String>) -> Self {
        Self {
            choice: Choice::Speak(agent.into()),
            reasoning: reasoning.into(),
        }
    }
}

#[derive(Deserialize)]
struct RawDecision {
    #[serde(rename = "nextAgent")]
    next_agent: Option<String>,
    reasoning: Option<String>,
}

pub struct Manager {
    backend: Arc<dyn CompletionBackend>,
    roster: Vec<String>,
}

impl Manager {
    pub fn new(backend: Arc<dyn CompletionBackend>, roster: Vec<String>) -> Self {
        Self { backend, roster }
    }

    /// Decide who acts next. One model call at most; never errors out.
    pub async fn select_next(&self, history: &[Message]) -> Decision {
        let prompt = self.build_prompt(history);
        let raw = match self.backend.complete(prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!("manager model call failed: {:#}", e);
                return Decision::speak(self.first_agent(), format!("Model call failed: {e}"));
            }
        };
        self.interpret(&raw)
    }

    fn build_prompt(&self, history: &[Message]) -> Vec<Message> {
        let mut rendered = String::new();
        for message in history {
            let content = message.content.as_deref().unwrap_or("");
            let snippet: String = content.chars().take(HISTORY_SNIPPET_CHARS).collect();
            rendered.push_str(&format!("[{}]: {}\n", message.author_or_role(), snippet));
        }

        let instruction = format!(
            "Panelists: {}.\n\nConversation so far:\n{}\n\
             Decide who should act next. If the team needs input from the \
             user, answer {}. If the task is finished, answer {}. Respond \
             with JSON: {{\"nextAgent\": \"<panelist>\", \"reasoning\": \
             \"<one sentence>\"}}.",
            self.roster.join(", "),
            rendered,
            AWAIT_USER_TOKEN,
            COMPLETE_TOKEN,
        );

        vec![Message::system(MANAGER_PERSONA), Message::user(instruction)]
    }

    fn interpret(&self, raw: &str) -> Decision {
        if let Some(parsed) = first_json_object(raw)
            .and_then(|span| serde_json::from_str::<RawDecision>(span).ok())
        {
            let token = parsed
                .next_agent
                .unwrap_or_else(|| DEFAULT_AGENT.to_string());
            return self.map_token(&token, parsed.reasoning.unwrap_or_default());
        }
        self.scan_keywords(raw)
    }

    /// Map a decision token onto a choice. Unknown tokens fall back to the
    /// first configured agent; the round keeps going.
    fn map_token(&self, token: &str, reasoning: String) -> Decision {
        let token = token.trim();
        if token.eq_ignore_ascii_case(AWAIT_USER_TOKEN) {
            return Decision {
                choice: Choice::AwaitUser,
                reasoning,
            };
        }
        if token.eq_ignore_ascii_case(COMPLETE_TOKEN) {
            return Decision {
                choice: Choice::Complete,
                reasoning,
            };
        }
        if let Some(name) = self
            .roster
            .iter()
            .find(|name| name.eq_ignore_ascii_case(token))
        {
            return Decision::speak(name.clone(), reasoning);
        }
        debug!(token, "decision token not in roster; using first agent");
        Decision::speak(self.first_agent(), reasoning)
    }

    /// Keyword fallback over the raw text. Checked in fixed priority
    /// order: control tokens first, then senior-qualified names *before*
    /// their plain counterparts (every plain name is a substring of its
    /// senior form).
    fn scan_keywords(&self, raw: &str) -> Decision {
        let haystack = raw.to_ascii_lowercase();

        if haystack.contains("await_user") {
            return Decision {
                choice: Choice::AwaitUser,
                reasoning: "Keyword match: AWAIT_USER".to_string(),
            };
        }
        if haystack.contains("complete") {
            return Decision {
                choice: Choice::Complete,
                reasoning: "Keyword match: COMPLETE".to_string(),
            };
        }

        let scans: [(&str, &[&str]); 6] = [
            ("sr-developer", &["sr-developer", "senior developer"]),
            (
                "sr-business-analyst",
                &["sr-business-analyst", "senior business analyst"],
            ),
            (
                "sr-quality-assurance",
                &["sr-quality-assurance", "senior qa"],
            ),
            ("developer", &["developer"]),
            ("business-analyst", &["business-analyst"]),
            ("quality-assurance", &["quality-assurance", "qa"]),
        ];
        for (agent, needles) in scans {
            if needles.iter().any(|needle| haystack.contains(needle)) {
                return Decision::speak(agent, format!("Keyword match: {agent}"));
            }
        }

        Decision::speak(DEFAULT_AGENT, "Fallback to default agent")
    }

    fn first_agent(&self) -> String {
        self.roster
            .first()
            .cloned()
            .unwrap_or_else(|| DEFAULT_AGENT.to_string())
    }
}

/// Locate the first balanced `{...}` span in free text.
fn first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use crate::agents::AgentCatalog;
    use crate::ai::streaming::StreamPart;
    use crate::model::ToolDefinition;

    struct CannedBackend {
        response: Result<String, String>,
    }

    impl CannedBackend {
        fn ok(response: &str) -> Arc<Self> {
            Arc::new(Self {
                response: Ok(response.to_string()),
            })
        }

        fn err(message: &str) -> Arc<Self> {
            Arc::new(Self {
                response: Err(message.to_string()),
            })
        }
    }

    #[async_trait]
    impl CompletionBackend for CannedBackend {
        async fn complete(&self, _messages: Vec<Message>) -> Result<String> {
            self.response.clone().map_err(|e| anyhow!(e))
        }

        async fn stream(
            &self,
            _messages: Vec<Message>,
            _tools: &[ToolDefinition],
        ) -> Result<mpsc::UnboundedReceiver<StreamPart>> {
            unimplemented!("scheduler never streams")
        }
    }

    fn manager(backend: Arc<CannedBackend>) -> Manager {
        Manager::new(backend, AgentCatalog::builtin().names())
    }

    async fn decide(raw: &str) -> Decision {
        manager(CannedBackend::ok(raw))
            .select_next(&[Message::user("Hi")])
            .await
    }

    #[tokio::test]
    async fn parses_structured_decision() {
        let decision =
            decide(r#"{"nextAgent": "developer", "reasoning": "implementation next"}"#).await;
        assert_eq!(decision.choice, Choice::Speak("developer".to_string()));
        assert_eq!(decision.reasoning, "implementation next");
    }

    #[tokio::test]
    async fn finds_json_embedded_in_prose() {
        let decision = decide(
            "Sure! Here is my decision:\n```json\n{\"nextAgent\": \"sr-developer\", \
             \"reasoning\": \"review\"}\n```\nHope that helps.",
        )
        .await;
        assert_eq!(decision.choice, Choice::Speak("sr-developer".to_string()));
    }

    #[tokio::test]
    async fn missing_next_agent_defaults_to_business_analyst() {
        let decision = decide(r#"{"reasoning": "not sure"}"#).await;
        assert_eq!(
            decision.choice,
            Choice::Speak("business-analyst".to_string())
        );
    }

    #[tokio::test]
    async fn control_tokens_are_case_insensitive() {
        let await_user = decide(r#"{"nextAgent": "await_user"}"#).await;
        assert_eq!(await_user.choice, Choice::AwaitUser);

        let complete = decide(r#"{"nextAgent": "Complete"}"#).await;
        assert_eq!(complete.choice, Choice::Complete);
    }

    #[tokio::test]
    async fn unknown_token_falls_back_to_first_agent() {
        let decision = decide(r#"{"nextAgent": "architect"}"#).await;
        assert_eq!(
            decision.choice,
            Choice::Speak("business-analyst".to_string())
        );
    }

    #[tokio::test]
    async fn keyword_scan_prefers_senior_names() {
        // "developer" also appears inside "sr-developer"; priority order
        // must pick the senior form.
        let decision = decide("I think the sr-developer should take a look").await;
        assert_eq!(decision.choice, Choice::Speak("sr-developer".to_string()));

        let spelled_out = decide("let the senior qa weigh in").await;
        assert_eq!(
            spelled_out.choice,
            Choice::Speak("sr-quality-assurance".to_string())
        );
    }

    #[tokio::test]
    async fn keyword_scan_control_tokens_win_over_names() {
        let decision = decide("developer is done, AWAIT_USER for approval").await;
        assert_eq!(decision.choice, Choice::AwaitUser);
    }

    #[tokio::test]
    async fn garbage_falls_back_to_default_agent() {
        let decision = decide("beep boop").await;
        assert_eq!(
            decision.choice,
            Choice::Speak("business-analyst".to_string())
        );
        assert_eq!(decision.reasoning, "Fallback to default agent");
    }

    #[tokio::test]
    async fn transport_error_behaves_like_unmatched_token() {
        let decision = manager(CannedBackend::err("connection reset"))
            .select_next(&[Message::user("Hi")])
            .await;
        assert_eq!(
            decision.choice,
            Choice::Speak("business-analyst".to_string())
        );
    }

    #[test]
    fn json_span_handles_nesting_and_strings() {
        assert_eq!(
            first_json_object(r#"x {"a": {"b": "}"}} y"#),
            Some(r#"{"a": {"b": "}"}}"#)
        );
        assert_eq!(first_json_object("no braces"), None);
        assert_eq!(first_json_object("{unterminated"), None);
    }
}
