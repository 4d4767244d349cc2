use serde::{Deserialize, Serialize};

/// How a model family wants requests shaped and answers read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ModelClass {
    /// Function calling with a forced call.
    StructuredCall,
    /// JSON mode; the schema travels as text.
    PlainJson,
    /// One user turn, no schema enforcement.
    SingleMessage,
}

impl ModelClass {
    pub fn classify(model_id: &str) -> Self {
        if model_id.starts_with("o1-") {
            ModelClass::SingleMessage
        } else if model_id.starts_with("deepseek-") {
            ModelClass::PlainJson
        } else {
            ModelClass::StructuredCall
        }
    }

    pub fn temperature(&self) -> f32 {
        match self {
            ModelClass::SingleMessage => 1.0,
            _ => 0.5,
        }
    }

    pub fn max_tokens(&self) -> u32 {
        8000
    }
}

impl std::fmt::Display for ModelClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ModelClass::StructuredCall => "structured-call",
            ModelClass::PlainJson => "plain-json",
            ModelClass::SingleMessage => "single-message",
        };
        f.write_str(name)
    }
}
