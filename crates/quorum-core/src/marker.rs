//! Session correlation marker
//!
//! Task continuity across the stateless request cycle rides on an HTML
//! comment appended to assistant-visible text: `<!-- task:XXXXXXXX -->`.
//! Invisible under markdown rendering, trivially extractable here.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::Message;

static MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<!--\s*task:([A-Za-z0-9]{8})\s*-->").expect("valid marker regex"));

/// Render the marker for a task id.
pub fn task_marker(task_id: &str) -> String {
    format!("<!-- task:{task_id} -->")
}

/// Append the marker to a response body.
pub fn append_marker(body: &str, task_id: &str) -> String {
    format!("{}\n\n{}", body, task_marker(task_id))
}

/// Scan messages newest-first for a task marker. The first match wins; no
/// match means a fresh session.
pub fn extract_task_id(messages: &[Message]) -> Option<String> {
    messages.iter().rev().find_map(|message| {
        let content = message.content.as_deref()?;
        MARKER_RE
            .captures(content)
            .map(|captures| captures[1].to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_round_trip() {
        let body = append_marker("All done here.", "Ab3dE9xZ");
        let messages = vec![Message::assistant(body)];
        assert_eq!(extract_task_id(&messages).as_deref(), Some("Ab3dE9xZ"));
    }

    #[test]
    fn newest_marker_wins() {
        let messages = vec![
            Message::assistant(append_marker("old turn", "11111111")),
            Message::user("continue please"),
            Message::assistant(append_marker("new turn", "22222222")),
        ];
        assert_eq!(extract_task_id(&messages).as_deref(), Some("22222222"));
    }

    #[test]
    fn no_marker_means_fresh_session() {
        let messages = vec![Message::user("Hi")];
        assert_eq!(extract_task_id(&messages), None);
    }

    #[test]
    fn ignores_markers_with_wrong_length() {
        let messages = vec![Message::assistant("<!-- task:short -->")];
        assert_eq!(extract_task_id(&messages), None);
    }
}
