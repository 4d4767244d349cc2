use thiserror::Error;

/// Longest slice of model output kept on a parse failure.
const SNIPPET_CHARS: usize = 500;

#[derive(Error, Debug)]
pub enum LLMError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Upstream returned HTTP {status}: {body}")]
    Transport { status: u16, body: String },

    #[error("Malformed model response ({reason}): {snippet}")]
    MalformedResponse { reason: String, snippet: String },
}

impl LLMError {
    pub fn malformed(reason: impl Into<String>, text: &str) -> Self {
        LLMError::MalformedResponse {
            reason: reason.into(),
            snippet: text.chars().take(SNIPPET_CHARS).collect(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            LLMError::Transport { status, .. } => Some(*status),
            LLMError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, LLMError>;
