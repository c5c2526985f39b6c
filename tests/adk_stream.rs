mod common;

use adkstream_rs::model::{LanguageModel, StreamRequest};
use adkstream_rs::protocol::normalized::{
    ClientStreamEvent, FinishReason, NormalizedMessage, NormalizedPart, NormalizedRole, Usage,
};
use adkstream_rs::session::SessionRef;
use adkstream_rs::AdapterError;
use axum::http::StatusCode;
use common::{agent_config, model_for, snake, start, MockAdk};
use futures_util::StreamExt;
use serde_json::json;

const STREAMED_HELLO: &[&str] = &[
    "data: {\"id\":\"ev-1\",\"author\":\"root_agent\",\"partial\":true,\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\"H\"}]}}\n\n",
    "data: {\"id\":\"ev-1\",\"author\":\"root_agent\",\"partial\":true,\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\"He\"}]}}\n\n",
    "data: {\"id\":\"ev-1\",\"partial\":true,\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\"Hel\"}]}}\n\ndata: {\"id\":\"ev-1\",\"partial\":true,",
    "\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\"Hello\"}]}}\n\n",
    ": keep-alive\n\n",
    "data: {\"id\":\"ev-2\",\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\"Hello\"}]},\"finishReason\":\"STOP\",\"usageMetadata\":{\"promptTokenCount\":7,\"candidatesTokenCount\":2,\"totalTokenCount\":9}}\n\n",
];

async fn collect_ok(
    model: &adkstream_rs::AdkLanguageModel,
    conversation: Vec<NormalizedMessage>,
) -> Vec<ClientStreamEvent> {
    let response = model
        .do_stream(StreamRequest::new(conversation))
        .await
        .expect("stream starts");
    response
        .stream
        .map(|item| item.expect("no stream error"))
        .collect()
        .await
}

fn text_of(events: &[ClientStreamEvent]) -> String {
    events
        .iter()
        .filter_map(|event| match event {
            ClientStreamEvent::TextDelta { delta, .. } => Some(delta.as_str()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_streams_cumulative_partials_as_deltas() {
    let server = start(MockAdk::new(STREAMED_HELLO.to_vec())).await;
    let model = model_for(agent_config(&server.base_url));

    let events = collect_ok(&model, vec![NormalizedMessage::user("hi")]).await;

    let deltas: Vec<&str> = events
        .iter()
        .filter_map(|event| match event {
            ClientStreamEvent::TextDelta { delta, .. } => Some(delta.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(deltas, vec!["H", "e", "l", "lo"]);
    assert_eq!(events.iter().filter(|event| event.is_finish()).count(), 1);
    assert_eq!(
        events.last(),
        Some(&ClientStreamEvent::Finish {
            reason: FinishReason::Stop,
            usage: Usage {
                prompt_tokens: 7,
                completion_tokens: 2,
                total_tokens: 9,
                reasoning_tokens: None,
            },
        })
    );
}

#[tokio::test]
async fn test_run_body_camel_case_and_session_bootstrap() {
    let server = start(MockAdk::new(STREAMED_HELLO.to_vec())).await;
    let model = model_for(agent_config(&server.base_url));

    let response = model
        .do_stream(StreamRequest::new(vec![
            NormalizedMessage::system("be brief"),
            NormalizedMessage::user("hi"),
        ]))
        .await
        .expect("stream starts");
    let _: Vec<_> = response.stream.collect().await;

    let current = model.sessions().current_session().expect("session pinned");
    assert!(current.session_id.starts_with("s_"));
    assert!(current.user_id.starts_with("u_"));
    assert_eq!(server.mock.create_calls(), 1);
    assert!(server
        .mock
        .has_session("my_agent", &current.user_id, &current.session_id));

    let bodies = server.mock.run_bodies();
    assert_eq!(bodies.len(), 1);
    let body = &bodies[0];
    assert_eq!(body["appName"], "my_agent");
    assert_eq!(body["userId"], current.user_id.as_str());
    assert_eq!(body["sessionId"], current.session_id.as_str());
    assert_eq!(body["streaming"], true);
    assert_eq!(body["newMessage"], json!({"role": "user", "parts": [{"text": "hi"}]}));
    assert_eq!(&response.raw_call.raw_prompt, body);
}

#[tokio::test]
async fn test_session_is_reused_across_turns() {
    let server = start(MockAdk::new(STREAMED_HELLO.to_vec())).await;
    let model = model_for(agent_config(&server.base_url));

    let _ = collect_ok(&model, vec![NormalizedMessage::user("one")]).await;
    let _ = collect_ok(&model, vec![NormalizedMessage::user("two")]).await;

    assert_eq!(server.mock.create_calls(), 1);
    let bodies = server.mock.run_bodies();
    assert_eq!(bodies[0]["sessionId"], bodies[1]["sessionId"]);
    assert_eq!(bodies[1]["newMessage"]["parts"][0]["text"], "two");
}

#[tokio::test]
async fn test_pinned_session_skips_creation() {
    let server = start(MockAdk::new(STREAMED_HELLO.to_vec())).await;
    let model = model_for(agent_config(&server.base_url));
    model
        .sessions()
        .set_current_session(SessionRef::new("alice", "s_pinned"));

    let _ = collect_ok(&model, vec![NormalizedMessage::user("hi")]).await;

    assert_eq!(server.mock.create_calls(), 0);
    let bodies = server.mock.run_bodies();
    assert_eq!(bodies[0]["userId"], "alice");
    assert_eq!(bodies[0]["sessionId"], "s_pinned");
}

#[tokio::test]
async fn test_snake_case_body() {
    let server = start(MockAdk::new(STREAMED_HELLO.to_vec())).await;
    let model = model_for(snake(agent_config(&server.base_url)));

    let _ = collect_ok(&model, vec![NormalizedMessage::user("hi")]).await;

    let body = &server.mock.run_bodies()[0];
    assert_eq!(body["app_name"], "my_agent");
    assert!(body["session_id"].as_str().unwrap().starts_with("s_"));
    assert_eq!(body["new_message"]["parts"][0]["text"], "hi");
    assert!(body.get("appName").is_none());
    assert!(body.get("newMessage").is_none());
}

#[tokio::test]
async fn test_session_create_failure_does_not_fail_stream() {
    let mut mock = MockAdk::new(STREAMED_HELLO.to_vec());
    mock.fail_create = true;
    let server = start(mock).await;
    let model = model_for(agent_config(&server.base_url));

    let events = collect_ok(&model, vec![NormalizedMessage::user("hi")]).await;

    assert_eq!(text_of(&events), "Hello");
    assert_eq!(server.mock.create_calls(), 1);
    let current = model.sessions().current_session().expect("ids kept");
    assert_eq!(server.mock.run_bodies()[0]["sessionId"], current.session_id.as_str());
}

#[tokio::test]
async fn test_dropping_stream_releases_connection() {
    let mut mock = MockAdk::new(vec![
        "data: {\"id\":\"ev-1\",\"partial\":true,\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\"x\"}]}}\n\n",
    ]);
    mock.endless_run = true;
    let server = start(mock).await;
    let model = model_for(agent_config(&server.base_url));

    let mut response = model
        .do_stream(StreamRequest::new(vec![NormalizedMessage::user("hi")]))
        .await
        .expect("stream starts");
    let first = response.stream.next().await;
    assert!(matches!(
        first,
        Some(Ok(ClientStreamEvent::TextDelta { ref delta, .. })) if delta == "x"
    ));
    assert!(!server.mock.run_body_dropped());

    drop(response);
    let mut released = false;
    for _ in 0..100 {
        if server.mock.run_body_dropped() {
            released = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert!(released, "server body still open after consumer dropped the stream");
}

#[tokio::test]
async fn test_non_success_run_status_fails_up_front() {
    let mut mock = MockAdk::new(Vec::new());
    mock.run_status = StatusCode::INTERNAL_SERVER_ERROR;
    let server = start(mock).await;
    let model = model_for(agent_config(&server.base_url));

    let err = model
        .do_stream(StreamRequest::new(vec![NormalizedMessage::user("hi")]))
        .await
        .err()
        .expect("run rejected");
    match err {
        AdapterError::RemoteRejected { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "agent exploded");
        }
        other => panic!("expected RemoteRejected, got {other:?}"),
    }
}

#[tokio::test]
async fn test_stream_helper_surfaces_rejection_once() {
    let mut mock = MockAdk::new(Vec::new());
    mock.run_status = StatusCode::UNPROCESSABLE_ENTITY;
    let server = start(mock).await;
    let model = model_for(agent_config(&server.base_url));

    let items: Vec<_> = model
        .stream(StreamRequest::new(vec![NormalizedMessage::user("hi")]))
        .collect()
        .await;
    assert_eq!(items.len(), 1);
    assert!(matches!(
        items[0],
        Err(AdapterError::RemoteRejected { status: 422, .. })
    ));
}

#[tokio::test]
async fn test_bearer_key_sent_on_every_request() {
    let server = start(MockAdk::new(STREAMED_HELLO.to_vec())).await;
    let mut agent = agent_config(&format!("{}/run_sse", server.base_url));
    agent.api_key = Some("sk-adk".into());
    let model = model_for(agent);

    let response = model
        .do_stream(StreamRequest::new(vec![NormalizedMessage::user("hi")]))
        .await
        .expect("stream starts");
    let _: Vec<_> = response.stream.collect().await;

    assert_eq!(
        server.mock.run_auth.lock().unwrap().as_slice(),
        &[Some("Bearer sk-adk".to_string())]
    );
    assert_eq!(
        server.mock.session_auth.lock().unwrap().as_slice(),
        &[Some("Bearer sk-adk".to_string())]
    );
    assert_eq!(response.raw_call.raw_settings["apiKey"], "***");
    assert!(!response.raw_call.raw_settings.to_string().contains("sk-adk"));
}

#[tokio::test]
async fn test_empty_stream_synthesizes_stop() {
    let server = start(MockAdk::new(vec![": ping\n\n"])).await;
    let model = model_for(agent_config(&server.base_url));

    let events = collect_ok(&model, vec![NormalizedMessage::user("hi")]).await;

    assert_eq!(
        events,
        vec![ClientStreamEvent::Finish {
            reason: FinishReason::Stop,
            usage: Usage::default(),
        }]
    );
}

#[tokio::test]
async fn test_tool_call_and_malformed_frames() {
    let server = start(MockAdk::new(vec![
        "data: {not json}\n\n",
        "data: {\"id\":\"ev-1\",\"content\":{\"role\":\"model\",\"parts\":[{\"functionCall\":{\"id\":\"adk-fc-1\",\"name\":\"get_weather\",\"args\":{\"city\":\"Paris\"}}}]}}\n\n",
        "data: {\"id\":\"ev-2\",\"content\":{\"role\":\"user\",\"parts\":[{\"functionResponse\":{\"id\":\"adk-fc-1\",\"name\":\"get_weather\",\"response\":{\"temp\":18}}}]}}\n\n",
        "data: {\"id\":\"ev-3\",\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\"18 degrees in Paris.\"}]},\"finishReason\":\"STOP\"}\n\n",
    ]))
    .await;
    let model = model_for(agent_config(&server.base_url));

    let events = collect_ok(&model, vec![NormalizedMessage::user("weather?")]).await;

    assert_eq!(
        events,
        vec![
            ClientStreamEvent::ToolCallDelta {
                tool_call_id: "adk-fc-1".into(),
                tool_name: "get_weather".into(),
                args_text_delta: "{\"city\":\"Paris\"}".into(),
            },
            ClientStreamEvent::TextDelta {
                id: "ev-3".into(),
                delta: "18 degrees in Paris.".into(),
            },
            ClientStreamEvent::Finish {
                reason: FinishReason::Stop,
                usage: Usage::default(),
            },
        ]
    );
}

#[tokio::test]
async fn test_tool_result_turn_keeps_identifiers_on_the_wire() {
    let server = start(MockAdk::new(STREAMED_HELLO.to_vec())).await;
    let model = model_for(agent_config(&server.base_url));

    let conversation = vec![
        NormalizedMessage::user("weather?"),
        NormalizedMessage::new(
            NormalizedRole::Assistant,
            vec![NormalizedPart::ToolCall {
                tool_call_id: "call_42".into(),
                tool_name: "get_weather".into(),
                args: json!({"city": "Paris"}),
            }],
        ),
        NormalizedMessage::tool_result(
            Some("call_42".into()),
            Some("get_weather".into()),
            json!({"temp": 18}),
        ),
    ];
    let _ = collect_ok(&model, conversation).await;

    let body = &server.mock.run_bodies()[0];
    assert_eq!(body["newMessage"]["role"], "user");
    assert_eq!(
        body["newMessage"]["parts"][0]["functionResponse"],
        json!({"id": "call_42", "name": "get_weather", "response": {"temp": 18}})
    );
}

#[tokio::test]
async fn test_connection_refused_is_transport_unavailable() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let model = model_for(agent_config(&format!("http://{addr}")));

    let err = model
        .do_stream(StreamRequest::new(vec![NormalizedMessage::user("hi")]))
        .await
        .err()
        .expect("no server");
    assert!(matches!(err, AdapterError::TransportUnavailable(_)));
}
