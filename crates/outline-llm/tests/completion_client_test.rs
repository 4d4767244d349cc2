//! HTTP-level tests for the completion client against a mock endpoint.

use outline_llm::{CompletionClient, CompletionRequest, FunctionSpec, HttpCompletionClient, LLMError, ModelClass};
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn network_tests_disabled() -> bool {
    std::env::var_os("CODEX_SANDBOX_NETWORK_DISABLED").is_some()
}

fn outline_request() -> CompletionRequest {
    CompletionRequest::new("You design plans.", "Design a launch plan").with_function(FunctionSpec {
        name: "generate_main_structure".to_string(),
        description: "Generate the plan".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {"Launch": {"type": "object"}},
            "required": ["Launch"]
        }),
    })
}

fn text_completion(content: &str) -> Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    })
}

async fn last_request_body(server: &MockServer) -> Value {
    let requests = server.received_requests().await.unwrap_or_default();
    let last = requests.last().expect("one request received");
    serde_json::from_slice(&last.body).expect("request body is JSON")
}

#[tokio::test]
async fn fenced_json_is_parsed_under_every_model_class() {
    if network_tests_disabled() {
        return;
    }

    let fenced = "Here is the plan:\n```json\n{\"Launch\": {\"Research\": \"Talk to users\"}}\n```";

    for (model, class) in [
        ("gpt-4o-mini", ModelClass::StructuredCall),
        ("deepseek-chat", ModelClass::PlainJson),
        ("o1-mini", ModelClass::SingleMessage),
    ] {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(text_completion(fenced)))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpCompletionClient::new(
            format!("{}/v1/chat/completions", server.uri()),
            "test-key",
            model,
        );
        assert_eq!(client.class(), class);

        let value = client.complete(&outline_request()).await.unwrap();
        assert_eq!(value, json!({"Launch": {"Research": "Talk to users"}}), "model {model}");
    }
}

#[tokio::test]
async fn structured_call_reads_function_arguments() {
    if network_tests_disabled() {
        return;
    }

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "function_call": {
                        "name": "generate_main_structure",
                        "arguments": "{\"Launch\": {\"Plan\": [{\"title\": \"Prep\", \"description\": {\"Goal\": \"Ready\"}}]}}"
                    }
                }
            }]
        })))
        .mount(&server)
        .await;

    let client = HttpCompletionClient::new(format!("{}/chat", server.uri()), "k", "gpt-4o");
    let value = client.complete(&outline_request()).await.unwrap();

    // Description folded into the content field.
    assert_eq!(value["Launch"]["Plan"][0]["content"], "Goal: Ready");

    let body = last_request_body(&server).await;
    assert_eq!(body["function_call"]["name"], "generate_main_structure");
    assert_eq!(body["max_tokens"], 8000);
}

#[tokio::test]
async fn plain_json_requests_json_object_format() {
    if network_tests_disabled() {
        return;
    }

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_completion("{\"ok\": true}")))
        .mount(&server)
        .await;

    let client = HttpCompletionClient::new(server.uri(), "k", "deepseek-reasoner");
    client.complete(&outline_request()).await.unwrap();

    let body = last_request_body(&server).await;
    assert_eq!(body["response_format"]["type"], "json_object");
    assert!(body.get("functions").is_none());
}

#[tokio::test]
async fn non_success_status_is_a_transport_error() {
    if network_tests_disabled() {
        return;
    }

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpCompletionClient::new(server.uri(), "k", "gpt-4o");
    let err = client.complete(&outline_request()).await.unwrap_err();
    match err {
        LLMError::Transport { status, body } => {
            assert_eq!(status, 429);
            assert_eq!(body, "rate limited");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn unparseable_text_is_malformed_response() {
    if network_tests_disabled() {
        return;
    }

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_completion("I cannot do that.")))
        .mount(&server)
        .await;

    let client = HttpCompletionClient::new(server.uri(), "k", "o1-preview");
    let err = client.complete(&outline_request()).await.unwrap_err();
    match err {
        LLMError::MalformedResponse { snippet, .. } => assert_eq!(snippet, "I cannot do that."),
        other => panic!("unexpected error: {other:?}"),
    }
}
