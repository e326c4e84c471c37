//! Shared constants

/// AI provider defaults
pub mod ai {
    /// Default generation model for panel agents.
    pub const DEFAULT_MODEL: &str = "gpt-4o";

    /// Default lightweight model for speaker selection.
    pub const DEFAULT_MANAGER_MODEL: &str = "gpt-4o-mini";

    /// Default OpenAI-compatible completions endpoint.
    pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1/chat/completions";

    /// Maximum output tokens per generation call.
    pub const MAX_OUTPUT_TOKENS: usize = 8192;
}
