//! Anthropic Messages adapter tests against a scripted transport, plus one
//! live connectivity test.

mod common;

use std::env;
use std::sync::Arc;

use dotenvy::dotenv;
use futures_util::StreamExt;
use kaiwa::error::{ChatError, ProviderFault};
use kaiwa::http::reqwest::ReqwestTransport;
use kaiwa::provider::ProviderAdapter;
use kaiwa::provider::anthropic_messages::AnthropicMessagesAdapter;
use kaiwa::types::{ChatTurn, PromptContext, Role};

use common::{ScriptedStream, ScriptedTransport, request_json, sse_event};

fn sample_context(max_output_tokens: Option<u32>) -> PromptContext {
    let turns = vec![
        ChatTurn::text(Role::User, "What is Rust?"),
        ChatTurn::text(Role::Assistant, "A systems language."),
        ChatTurn {
            role: Role::User,
            content: "Describe these pictures.".to_string(),
            images: vec!["data:image/png;base64,aGk=".to_string()],
        },
    ];
    PromptContext::new(
        "Answer in English.",
        turns,
        "claude-3-5-sonnet-20240620",
        max_output_tokens,
    )
    .expect("context should build")
}

/// The instruction leads as an assistant message, turns stay text-only with
/// image attachments dropped, and the required `max_tokens` comes from the
/// caller's budget.
#[tokio::test]
async fn translate_leads_with_instruction_and_drops_images() {
    let transport = ScriptedTransport::new();
    let adapter = AnthropicMessagesAdapter::new(transport, "ak-test");

    let request = adapter
        .translate(&sample_context(Some(300)))
        .expect("translation should succeed");

    assert_eq!(request.url, "https://api.anthropic.com/v1/messages");
    assert_eq!(
        request.headers.get("x-api-key").map(String::as_str),
        Some("ak-test")
    );
    assert_eq!(
        request.headers.get("anthropic-version").map(String::as_str),
        Some("2023-06-01")
    );

    let body = request_json(&request);
    assert_eq!(body["model"], "claude-3-5-sonnet-20240620");
    assert_eq!(body["max_tokens"], 300);
    assert_eq!(body["temperature"], 0.7);
    assert_eq!(body["stream"], true);

    let messages = body["messages"].as_array().expect("messages array");
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[0]["role"], "assistant");
    assert_eq!(messages[0]["content"], "Answer in English.");
    assert_eq!(messages[1]["role"], "user");
    assert_eq!(messages[1]["content"], "What is Rust?");
    assert_eq!(messages[2]["role"], "assistant");
    assert_eq!(messages[3]["role"], "user");
    assert_eq!(
        messages[3]["content"], "Describe these pictures.",
        "附件不应出现在该通道的消息里"
    );
}

/// `max_tokens` is mandatory on this API, so a missing budget falls back to
/// the built-in default instead of being omitted.
#[tokio::test]
async fn missing_budget_falls_back_to_default_max_tokens() {
    let transport = ScriptedTransport::new();
    let adapter = AnthropicMessagesAdapter::new(transport, "ak-test");

    let request = adapter
        .translate(&sample_context(None))
        .expect("translation should succeed");
    let body = request_json(&request);
    assert_eq!(body["max_tokens"], 4096);
}

/// Only `text_delta` payloads surface; structural events and pings are
/// skipped and `message_stop` ends the stream even if the body stays open.
#[tokio::test]
async fn stream_surfaces_text_deltas_until_message_stop() {
    let transport = ScriptedTransport::new();
    let script = [
        sse_event(r#"{"type":"message_start","message":{"id":"msg_01"}}"#),
        sse_event(r#"{"type":"ping"}"#),
        sse_event(r#"{"type":"content_block_start","index":0}"#),
        sse_event(r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hel"}}"#),
        sse_event(r#"{"type":"content_block_delta","index":0,"delta":{"type":"input_json_delta","partial_json":"{"}}"#),
        sse_event(r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"lo"}}"#),
        sse_event(r#"{"type":"message_delta","delta":{"stop_reason":"end_turn"}}"#),
        sse_event(r#"{"type":"message_stop"}"#),
    ];
    transport.push_stream(
        ScriptedStream::ok(script.iter().map(String::as_str).collect()).held_open(),
    );
    let adapter = AnthropicMessagesAdapter::new(transport, "ak-test");

    let mut fragments = adapter
        .stream_reply(&sample_context(Some(300)))
        .await
        .expect("stream should open");
    let mut collected = Vec::new();
    while let Some(fragment) = fragments.next().await {
        collected.push(fragment.expect("fragment should decode"));
    }
    assert_eq!(collected, vec!["Hel", "lo"]);
}

/// An in-stream `error` event surfaces as a classified fault after the
/// fragments that preceded it.
#[tokio::test]
async fn stream_error_event_becomes_classified_fault() {
    let transport = ScriptedTransport::new();
    let script = [
        sse_event(r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"partial"}}"#),
        sse_event(r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#),
    ];
    transport.push_stream(ScriptedStream::ok(
        script.iter().map(String::as_str).collect(),
    ));
    let adapter = AnthropicMessagesAdapter::new(transport, "ak-test");

    let mut fragments = adapter
        .stream_reply(&sample_context(Some(300)))
        .await
        .expect("stream should open");

    let first = fragments.next().await.expect("first item");
    assert_eq!(first.expect("fragment should decode"), "partial");

    let second = fragments.next().await.expect("second item");
    let err = second.expect_err("error event should fail the stream");
    let ChatError::Provider {
        provider,
        kind,
        message,
        retryable,
    } = err
    else {
        panic!("expected a provider fault");
    };
    assert_eq!(provider, "anthropic_messages");
    assert_eq!(kind, ProviderFault::Upstream);
    assert!(retryable, "overloaded_error 可重试");
    assert!(message.contains("Overloaded"), "{message}");
}

/// Connectivity test for streaming against a real Anthropic Messages endpoint.
#[tokio::test]
#[ignore = "requires valid Anthropic Messages endpoint"]
async fn anthropic_messages_stream_live() {
    dotenv().ok();
    let Some((adapter, model)) = build_adapter_from_env() else {
        return;
    };

    let context = PromptContext::new(
        "You are a helpful assistant. Respond in English.",
        vec![ChatTurn::text(
            Role::User,
            "Please introduce the Rust language in one sentence.",
        )],
        model,
        Some(128),
    )
    .expect("context should build");

    let mut fragments = adapter
        .stream_reply(&context)
        .await
        .expect("streaming chat should start");
    let mut text = String::new();
    while let Some(fragment) = fragments.next().await {
        match fragment {
            Ok(piece) => text.push_str(&piece),
            Err(err) => {
                eprintln!("skip anthropic_messages_stream_live (stream error): {err}");
                return;
            }
        }
    }
    assert!(
        !text.trim().is_empty(),
        "stream should yield some text; actual: {text:?}"
    );
}

fn build_adapter_from_env() -> Option<(AnthropicMessagesAdapter, String)> {
    let Some(endpoint) = load_env_var("ANTHROPIC_CHAT_ENDPOINT") else {
        eprintln!("skip anthropic live test: ANTHROPIC_CHAT_ENDPOINT missing");
        return None;
    };
    let Some(api_key) = load_env_var("ANTHROPIC_CHAT_KEY") else {
        eprintln!("skip anthropic live test: ANTHROPIC_CHAT_KEY missing");
        return None;
    };
    let Some(model) = load_env_var("ANTHROPIC_CHAT_MODEL") else {
        eprintln!("skip anthropic live test: ANTHROPIC_CHAT_MODEL missing");
        return None;
    };

    let transport = ReqwestTransport::default_client().ok()?;
    let adapter =
        AnthropicMessagesAdapter::new(Arc::new(transport), api_key).with_base_url(endpoint);
    Some((adapter, model))
}

fn load_env_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}
