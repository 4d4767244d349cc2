//! Request shaping and response reading, one strategy per [`ModelClass`].

use serde_json::{json, Value};

use crate::error::{LLMError, Result};
use crate::extract::extract_json;
use crate::model::ModelClass;
use crate::types::{ChatMessage, ChatRole, CompletionRequest, FunctionSpec, ResponseMessage};

const SCHEMA_PREAMBLE: &str = "Generate the content according to the following requirements:";

pub trait ModelStrategy: Send + Sync {
    fn class(&self) -> ModelClass;

    /// Chat messages for this class.
    fn build_messages(&self, request: &CompletionRequest) -> Vec<ChatMessage>;

    /// Full request body, messages already compacted.
    fn build_body(&self, model: &str, request: &CompletionRequest) -> Value;

    /// Read the structured answer out of the first choice's message.
    fn parse_message(&self, message: &ResponseMessage) -> Result<Value>;
}

pub fn strategy_for(class: ModelClass) -> &'static dyn ModelStrategy {
    match class {
        ModelClass::StructuredCall => &StructuredCall,
        ModelClass::PlainJson => &PlainJson,
        ModelClass::SingleMessage => &SingleMessage,
    }
}

/// Collapse runs of whitespace into single spaces.
pub fn compact(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn schema_instructions(function: Option<&FunctionSpec>) -> String {
    match function {
        Some(f) => format!(
            "{}\n{}",
            SCHEMA_PREAMBLE,
            serde_json::to_string_pretty(&f.parameters).unwrap_or_default()
        ),
        None => String::new(),
    }
}

fn join_nonempty(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|p| !p.trim().is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn messages_json(messages: &[ChatMessage]) -> Value {
    Value::Array(
        messages
            .iter()
            .map(|m| json!({"role": m.role, "content": compact(&m.content)}))
            .collect(),
    )
}

fn text_content(message: &ResponseMessage, class: ModelClass) -> Result<String> {
    match message.content.as_deref() {
        Some(text) if !text.trim().is_empty() => Ok(text.to_string()),
        _ => Err(LLMError::malformed(
            format!("{class} model returned no content"),
            "",
        )),
    }
}

pub struct StructuredCall;

impl ModelStrategy for StructuredCall {
    fn class(&self) -> ModelClass {
        ModelClass::StructuredCall
    }

    fn build_messages(&self, request: &CompletionRequest) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(&request.system_prompt),
            ChatMessage::user(&request.user_prompt),
        ]
    }

    fn build_body(&self, model: &str, request: &CompletionRequest) -> Value {
        let class = self.class();
        let mut body = json!({
            "model": model,
            "messages": messages_json(&self.build_messages(request)),
            "temperature": class.temperature(),
            "max_tokens": class.max_tokens(),
        });
        if let Some(function) = &request.function {
            body["functions"] = json!([{
                "name": function.name,
                "description": compact(&function.description),
                "parameters": function.parameters,
            }]);
            body["function_call"] = json!({"name": function.name});
        }
        body
    }

    fn parse_message(&self, message: &ResponseMessage) -> Result<Value> {
        if let Some(arguments) = message
            .function_call
            .as_ref()
            .and_then(|call| call.arguments.as_deref())
        {
            return serde_json::from_str(arguments)
                .map_err(|e| LLMError::malformed(format!("function arguments: {e}"), arguments));
        }
        extract_json(&text_content(message, self.class())?)
    }
}

pub struct PlainJson;

impl ModelStrategy for PlainJson {
    fn class(&self) -> ModelClass {
        ModelClass::PlainJson
    }

    fn build_messages(&self, request: &CompletionRequest) -> Vec<ChatMessage> {
        let instructions = schema_instructions(request.function.as_ref());
        vec![
            ChatMessage::system(&request.system_prompt),
            ChatMessage::user(join_nonempty(&[request.user_prompt.as_str(), instructions.as_str()])),
        ]
    }

    fn build_body(&self, model: &str, request: &CompletionRequest) -> Value {
        let class = self.class();
        json!({
            "model": model,
            "messages": messages_json(&self.build_messages(request)),
            "response_format": {"type": "json_object"},
            "temperature": class.temperature(),
            "max_tokens": class.max_tokens(),
        })
    }

    fn parse_message(&self, message: &ResponseMessage) -> Result<Value> {
        extract_json(&text_content(message, self.class())?)
    }
}

pub struct SingleMessage;

impl ModelStrategy for SingleMessage {
    fn class(&self) -> ModelClass {
        ModelClass::SingleMessage
    }

    fn build_messages(&self, request: &CompletionRequest) -> Vec<ChatMessage> {
        let instructions = schema_instructions(request.function.as_ref());
        vec![ChatMessage {
            role: ChatRole::User,
            content: join_nonempty(&[
                request.system_prompt.as_str(),
                request.user_prompt.as_str(),
                instructions.as_str(),
            ]),
        }]
    }

    fn build_body(&self, model: &str, request: &CompletionRequest) -> Value {
        let class = self.class();
        json!({
            "model": model,
            "messages": messages_json(&self.build_messages(request)),
            "temperature": class.temperature(),
            "max_tokens": class.max_tokens(),
        })
    }

    fn parse_message(&self, message: &ResponseMessage) -> Result<Value> {
        extract_json(&text_content(message, self.class())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FunctionCall;

    fn request() -> CompletionRequest {
        CompletionRequest::new("You are   an expert.", "Design\n\n  a plan").with_function(FunctionSpec {
            name: "generate_main_structure".to_string(),
            description: "Generate   the\nplan".to_string(),
            parameters: json!({"type": "object", "properties": {"Plan": {"type": "string"}}}),
        })
    }

    #[test]
    fn structured_call_forces_function() {
        let body = StructuredCall.build_body("gpt-4o", &request());
        assert_eq!(body["function_call"]["name"], "generate_main_structure");
        assert_eq!(body["functions"][0]["description"], "Generate the plan");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Design a plan");
        assert_eq!(body["temperature"], 0.5);
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn plain_json_embeds_schema_in_user_turn() {
        let body = PlainJson.build_body("deepseek-chat", &request());
        assert_eq!(body["response_format"]["type"], "json_object");
        assert!(body.get("functions").is_none());
        let user = body["messages"][1]["content"].as_str().unwrap();
        assert!(user.starts_with("Design a plan"));
        assert!(user.contains("\"Plan\""));
    }

    #[test]
    fn single_message_collapses_roles() {
        let body = SingleMessage.build_body("o1-mini", &request());
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
        assert!(messages[0]["content"].as_str().unwrap().starts_with("You are an expert."));
        assert_eq!(body["temperature"], 1.0);
        assert!(body.get("functions").is_none());
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn structured_call_prefers_function_arguments() {
        let message = ResponseMessage {
            content: Some("{\"ignored\": true}".to_string()),
            function_call: Some(FunctionCall {
                name: Some("f".to_string()),
                arguments: Some("{\"used\": true}".to_string()),
            }),
        };
        assert_eq!(StructuredCall.parse_message(&message).unwrap(), json!({"used": true}));
    }

    #[test]
    fn structured_call_falls_back_to_text() {
        let message = ResponseMessage {
            content: Some("```json\n{\"from_text\": 1}\n```".to_string()),
            function_call: None,
        };
        assert_eq!(StructuredCall.parse_message(&message).unwrap(), json!({"from_text": 1}));
    }

    #[test]
    fn empty_content_is_malformed() {
        let err = PlainJson.parse_message(&ResponseMessage::default()).unwrap_err();
        assert!(matches!(err, LLMError::MalformedResponse { .. }));
    }
}
