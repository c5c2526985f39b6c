//! In-process mock of the ADK API server used by the integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use std::sync::{Arc, Mutex};

use adkstream_rs::config::{AgentConfig, BodyCasing, HttpConfig};
use adkstream_rs::model::{AdkLanguageModel, AdkProvider};
use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use futures_util::StreamExt;
use serde_json::{json, Map, Value};

type SessionKey = (String, String, String);

pub struct MockAdk {
    pub sessions: Mutex<HashMap<SessionKey, Map<String, Value>>>,
    pub run_bodies: Mutex<Vec<Value>>,
    pub run_auth: Mutex<Vec<Option<String>>>,
    pub session_auth: Mutex<Vec<Option<String>>>,
    pub create_calls: AtomicUsize,
    pub run_chunks: Vec<&'static str>,
    pub run_status: StatusCode,
    pub fail_create: bool,
    /// Keep the run body open after `run_chunks`, sending keep-alives.
    pub endless_run: bool,
    pub run_body_dropped: Arc<AtomicBool>,
}

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl MockAdk {
    pub fn new(run_chunks: Vec<&'static str>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            run_bodies: Mutex::new(Vec::new()),
            run_auth: Mutex::new(Vec::new()),
            session_auth: Mutex::new(Vec::new()),
            create_calls: AtomicUsize::new(0),
            run_chunks,
            run_status: StatusCode::OK,
            fail_create: false,
            endless_run: false,
            run_body_dropped: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn run_bodies(&self) -> Vec<Value> {
        self.run_bodies.lock().unwrap().clone()
    }

    pub fn run_body_dropped(&self) -> bool {
        self.run_body_dropped.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn has_session(&self, app: &str, user: &str, session: &str) -> bool {
        self.sessions
            .lock()
            .unwrap()
            .contains_key(&(app.to_string(), user.to_string(), session.to_string()))
    }
}

fn auth_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn session_json(key: &SessionKey, state: &Map<String, Value>) -> Value {
    json!({
        "id": key.2,
        "appName": key.0,
        "userId": key.1,
        "state": state,
        "events": [],
        "lastUpdateTime": 1_727_000_000.25
    })
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"detail": "Session not found"})),
    )
        .into_response()
}

async fn create_session(
    State(mock): State<Arc<MockAdk>>,
    Path(key): Path<SessionKey>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    mock.create_calls.fetch_add(1, Ordering::SeqCst);
    mock.session_auth.lock().unwrap().push(auth_header(&headers));
    if mock.fail_create {
        return (StatusCode::INTERNAL_SERVER_ERROR, "session store down").into_response();
    }
    let state = serde_json::from_slice::<Value>(&body)
        .ok()
        .and_then(|value| value.as_object().cloned())
        .unwrap_or_default();
    let response = session_json(&key, &state);
    mock.sessions.lock().unwrap().insert(key, state);
    Json(response).into_response()
}

async fn get_session(State(mock): State<Arc<MockAdk>>, Path(key): Path<SessionKey>) -> Response {
    let sessions = mock.sessions.lock().unwrap();
    match sessions.get(&key) {
        Some(state) => Json(session_json(&key, state)).into_response(),
        None => not_found(),
    }
}

async fn update_session(
    State(mock): State<Arc<MockAdk>>,
    Path(key): Path<SessionKey>,
    Json(body): Json<Value>,
) -> Response {
    let mut sessions = mock.sessions.lock().unwrap();
    let Some(state) = sessions.get_mut(&key) else {
        return not_found();
    };
    if let Some(delta) = body.get("stateDelta").and_then(Value::as_object) {
        for (k, v) in delta {
            state.insert(k.clone(), v.clone());
        }
    }
    Json(session_json(&key, state)).into_response()
}

async fn delete_session(State(mock): State<Arc<MockAdk>>, Path(key): Path<SessionKey>) -> Response {
    match mock.sessions.lock().unwrap().remove(&key) {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => not_found(),
    }
}

async fn run_sse(
    State(mock): State<Arc<MockAdk>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    mock.run_bodies.lock().unwrap().push(body);
    mock.run_auth.lock().unwrap().push(auth_header(&headers));
    if mock.run_status != StatusCode::OK {
        return (mock.run_status, "agent exploded").into_response();
    }
    let chunks: Vec<Result<Bytes, Infallible>> = mock
        .run_chunks
        .iter()
        .map(|chunk| Ok(Bytes::from_static(chunk.as_bytes())))
        .collect();
    let keep_alives = futures_util::stream::unfold(mock.endless_run, |endless| async move {
        if !endless {
            return None;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        Some((Ok(Bytes::from_static(b": keep-alive\n\n")), endless))
    });
    let flag = DropFlag(Arc::clone(&mock.run_body_dropped));
    let body = futures_util::stream::iter(chunks)
        .chain(keep_alives)
        .map(move |chunk: Result<Bytes, Infallible>| {
            let _held = &flag;
            chunk
        });
    Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "text/event-stream")
        .body(Body::from_stream(body))
        .unwrap()
}

pub struct MockServer {
    pub base_url: String,
    pub mock: Arc<MockAdk>,
    handle: tokio::task::JoinHandle<()>,
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub async fn start(mock: MockAdk) -> MockServer {
    let mock = Arc::new(mock);
    let app = Router::new()
        .route("/run_sse", post(run_sse))
        .route(
            "/apps/{app}/users/{user}/sessions/{session}",
            post(create_session)
                .get(get_session)
                .patch(update_session)
                .delete(delete_session),
        )
        .with_state(Arc::clone(&mock));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock ADK server");
    let addr = listener.local_addr().expect("mock ADK addr");
    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockServer {
        base_url: format!("http://{addr}"),
        mock,
        handle,
    }
}

pub fn agent_config(base_url: &str) -> AgentConfig {
    AgentConfig::new(base_url, "my_agent")
}

pub fn model_for(agent: AgentConfig) -> AdkLanguageModel {
    AdkProvider::new(agent, &HttpConfig::default())
        .expect("provider")
        .default_model()
        .expect("model")
}

pub fn snake(mut agent: AgentConfig) -> AgentConfig {
    agent.body_casing = BodyCasing::Snake;
    agent
}
