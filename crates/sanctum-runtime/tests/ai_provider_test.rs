use std::sync::Arc;

use httpmock::prelude::*;
use sanctum_runtime::{AIProvider, AnthropicProvider, GenerateRequest, OpenAIProvider};

fn summary_request() -> GenerateRequest {
    GenerateRequest::new("User: I pulled the Tower card today.\nAssistant: How did it feel?")
        .with_system("Summarize this conversation concisely.")
        .with_model("small-model")
        .with_max_tokens(200)
        .with_temperature(0.3)
}

#[tokio::test]
async fn providers_are_interchangeable_behind_trait_object() {
    let server = MockServer::start_async().await;

    let openai_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/openai/chat/completions")
                .body_includes(r#""model":"small-model""#)
                .body_includes(r#""temperature":0.3"#);
            then.status(200).json_body(serde_json::json!({
                "model": "small-model",
                "choices": [
                    {
                        "index": 0,
                        "message": { "role": "assistant", "content": "Tarot reflection." },
                        "finish_reason": "stop"
                    }
                ]
            }));
        })
        .await;

    let anthropic_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/anthropic/messages")
                .body_includes(r#""model":"small-model""#);
            then.status(200).json_body(serde_json::json!({
                "content": [{ "type": "text", "text": "Tarot reflection." }],
                "model": "small-model",
                "stop_reason": "end_turn"
            }));
        })
        .await;

    let providers: Vec<Arc<dyn AIProvider>> = vec![
        Arc::new(
            OpenAIProvider::new("key", format!("{}/openai", server.base_url()), "gpt-4o")
                .expect("openai provider"),
        ),
        Arc::new(
            AnthropicProvider::new("key", format!("{}/anthropic", server.base_url()), "sonnet")
                .expect("anthropic provider"),
        ),
    ];

    for provider in providers {
        let response = provider
            .generate(summary_request())
            .await
            .expect("provider generate should succeed");
        assert_eq!(response.content, "Tarot reflection.", "{}", provider.name());
        assert_eq!(response.model.as_deref(), Some("small-model"));
    }

    openai_mock.assert_async().await;
    anthropic_mock.assert_async().await;
}

#[tokio::test]
async fn unreachable_endpoint_is_transport_error() {
    let provider =
        OpenAIProvider::new("key", "http://127.0.0.1:9/v1", "gpt-4o-mini").expect("provider");

    let err = provider
        .generate(GenerateRequest::new("hello"))
        .await
        .unwrap_err();

    assert!(matches!(err, sanctum_runtime::ProviderError::Transport(_)));
}
