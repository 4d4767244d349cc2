use conversation_store::StoreError;
use outline_core::CoreError;
use outline_llm::LLMError;
use thiserror::Error;

const SNIPPET_CHARS: usize = 500;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration missing: {0}")]
    ConfigurationMissing(String),

    #[error("Upstream returned HTTP {status}: {body}")]
    Transport { status: u16, body: String },

    #[error("Malformed model response ({reason}): {snippet}")]
    MalformedResponse { reason: String, snippet: String },

    #[error("{level} index {index} of \"{branch}\" is out of range (1..={bound})")]
    CoordinateOutOfRange {
        branch: String,
        level: &'static str,
        index: usize,
        bound: usize,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Failed to {operation}: {source}")]
    GenerationFailed {
        operation: &'static str,
        source: Box<EngineError>,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    pub fn malformed(reason: impl Into<String>, text: &str) -> Self {
        EngineError::MalformedResponse {
            reason: reason.into(),
            snippet: text.chars().take(SNIPPET_CHARS).collect(),
        }
    }

    /// Wrap a failure at a generator boundary.
    pub fn failed(operation: &'static str, source: EngineError) -> Self {
        EngineError::GenerationFailed {
            operation,
            source: Box::new(source),
        }
    }

    /// Innermost error, skipping `GenerationFailed` wrappers.
    pub fn root_cause(&self) -> &EngineError {
        match self {
            EngineError::GenerationFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Text shown to the user at an operation boundary.
    pub fn user_message(&self) -> String {
        match self {
            EngineError::GenerationFailed { operation, source } => {
                format!("Failed to {}: {}", operation, source.user_message())
            }
            EngineError::ConfigurationMissing(what) => format!(
                "No usable configuration ({}). Select or create a configuration first.",
                what
            ),
            EngineError::Transport { status, .. } => match status {
                401 | 403 => format!(
                    "The completion endpoint rejected the API key (HTTP {}).",
                    status
                ),
                429 => "The completion endpoint is rate limiting requests (HTTP 429).".to_string(),
                _ => format!("The completion endpoint returned HTTP {}.", status),
            },
            EngineError::MalformedResponse { reason, .. } => {
                format!("The model answer could not be read: {}.", reason)
            }
            EngineError::CoordinateOutOfRange { .. } => self.to_string(),
            EngineError::Validation(message) => message.clone(),
            EngineError::Request(message) => {
                format!("Could not reach the completion endpoint: {}", message)
            }
            EngineError::Store(e) => format!("Could not save the conversation: {}", e),
        }
    }
}

impl From<LLMError> for EngineError {
    fn from(err: LLMError) -> Self {
        match err {
            LLMError::Transport { status, body } => EngineError::Transport { status, body },
            LLMError::MalformedResponse { reason, snippet } => {
                EngineError::MalformedResponse { reason, snippet }
            }
            LLMError::Json(e) => EngineError::malformed("invalid JSON", &e.to_string()),
            LLMError::Http(e) => EngineError::Request(e.to_string()),
        }
    }
}

impl From<CoreError> for EngineError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConfigurationMissing(what) => EngineError::ConfigurationMissing(what),
            CoreError::CoordinateOutOfRange {
                branch,
                level,
                index,
                bound,
            } => EngineError::CoordinateOutOfRange {
                branch,
                level,
                index,
                bound,
            },
            CoreError::ShapeMismatch { branch, expected } => EngineError::MalformedResponse {
                reason: format!("branch \"{}\" should be {}", branch, expected),
                snippet: String::new(),
            },
            CoreError::Validation(message) => EngineError::Validation(message),
            CoreError::Json(e) => EngineError::malformed("invalid JSON", &e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
