//! Shared test utilities

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::extract::{Multipart, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use image::{Rgb, RgbImage};
use signova::{Config, StillCamera};
use tokio::sync::{Mutex, Semaphore};
use url::Url;

/// How the fake prediction endpoint answers
#[derive(Clone)]
pub enum Reply {
    /// JSON body with a status code
    Json(StatusCode, serde_json::Value),
    /// Raw text body with a status code
    Raw(StatusCode, &'static str),
    /// Never answer
    Hang,
}

impl Reply {
    /// 200 with a JSON body
    pub fn ok(body: serde_json::Value) -> Self {
        Self::Json(StatusCode::OK, body)
    }
}

/// One part received by the fake prediction endpoint
#[derive(Debug, Clone)]
pub struct ReceivedPart {
    pub field: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Clone)]
struct ServerState {
    predict: Reply,
    gifs: Arc<HashMap<String, String>>,
    predict_calls: Arc<AtomicUsize>,
    parts: Arc<Mutex<Vec<ReceivedPart>>>,
    gif_queries: Arc<Mutex<Vec<String>>>,
    gate: Option<Arc<Semaphore>>,
}

/// Local stand-in for the prediction service
pub struct MockService {
    pub base_url: Url,
    predict_calls: Arc<AtomicUsize>,
    parts: Arc<Mutex<Vec<ReceivedPart>>>,
    gif_queries: Arc<Mutex<Vec<String>>>,
    gate: Option<Arc<Semaphore>>,
}

impl MockService {
    /// Serve `predict` for every prediction; GIFs come from `gifs`, keyed
    /// by upper-cased text
    pub async fn start(predict: Reply, gifs: &[(&str, &str)]) -> Self {
        Self::spawn(predict, gifs, None).await
    }

    /// Like [`start`](Self::start), but each prediction waits for
    /// [`release`](Self::release) before answering
    pub async fn gated(predict: Reply) -> Self {
        Self::spawn(predict, &[], Some(Arc::new(Semaphore::new(0)))).await
    }

    async fn spawn(predict: Reply, gifs: &[(&str, &str)], gate: Option<Arc<Semaphore>>) -> Self {
        let state = ServerState {
            predict,
            gifs: Arc::new(
                gifs.iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect(),
            ),
            predict_calls: Arc::new(AtomicUsize::new(0)),
            parts: Arc::new(Mutex::new(Vec::new())),
            gif_queries: Arc::new(Mutex::new(Vec::new())),
            gate: gate.clone(),
        };

        let router = Router::new()
            .route("/predict", post(predict_handler))
            .route("/text_to_gif", get(gif_handler))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind mock service");
        let addr = listener.local_addr().expect("no local addr");
        tokio::spawn(async move {
            axum::serve(listener, router).await.ok();
        });

        Self {
            base_url: Url::parse(&format!("http://{addr}")).unwrap(),
            predict_calls: state.predict_calls,
            parts: state.parts,
            gif_queries: state.gif_queries,
            gate,
        }
    }

    /// Let one gated prediction answer
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    /// Prediction requests received so far, counted once their parts are
    /// recorded
    pub fn predict_calls(&self) -> usize {
        self.predict_calls.load(Ordering::SeqCst)
    }

    /// Multipart parts received so far
    pub async fn parts(&self) -> Vec<ReceivedPart> {
        self.parts.lock().await.clone()
    }

    /// GIF lookup texts received so far
    pub async fn gif_queries(&self) -> Vec<String> {
        self.gif_queries.lock().await.clone()
    }

    /// Configuration pointing at this service
    pub fn config(&self) -> Config {
        test_config(self.base_url.clone())
    }
}

async fn predict_handler(State(state): State<ServerState>, mut multipart: Multipart) -> Response {
    while let Ok(Some(field)) = multipart.next_field().await {
        let part = ReceivedPart {
            field: field.name().unwrap_or_default().to_string(),
            file_name: field.file_name().map(ToString::to_string),
            content_type: field.content_type().map(ToString::to_string),
            bytes: field.bytes().await.map(|b| b.to_vec()).unwrap_or_default(),
        };
        state.parts.lock().await.push(part);
    }
    state.predict_calls.fetch_add(1, Ordering::SeqCst);

    if let Some(gate) = &state.gate {
        gate.acquire().await.expect("gate closed").forget();
    }

    match state.predict {
        Reply::Json(status, body) => (status, axum::Json(body)).into_response(),
        Reply::Raw(status, body) => (status, body).into_response(),
        Reply::Hang => {
            std::future::pending::<()>().await;
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn gif_handler(
    State(state): State<ServerState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let text = params.get("text").cloned().unwrap_or_default();
    state.gif_queries.lock().await.push(text.clone());
    let gif = state.gifs.get(&text.to_uppercase()).cloned();
    axum::Json(serde_json::json!({ "gif": gif })).into_response()
}

/// Configuration for tests: short timeouts, no debounce, fast restarts
pub fn test_config(base_url: Url) -> Config {
    let mut config = Config::default();
    config.server.base_url = base_url;
    config.server.request_timeout = Duration::from_secs(2);
    config.voice.debounce = Duration::ZERO;
    config.voice.initial_backoff = Duration::from_millis(1);
    config.voice.max_backoff = Duration::from_millis(5);
    config
}

/// URL of a port nothing listens on
pub async fn closed_port_url() -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    Url::parse(&format!("http://{addr}")).unwrap()
}

/// Gradient test frame
pub fn test_frame(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        #[allow(clippy::cast_possible_truncation)]
        Rgb([(x % 256) as u8, (y % 256) as u8, 96])
    })
}

/// Camera serving a single gradient frame
pub fn test_camera() -> Arc<StillCamera> {
    Arc::new(StillCamera::from_frames(vec![test_frame(320, 240)]))
}

/// Camera that cannot be opened
pub fn broken_camera() -> Arc<StillCamera> {
    Arc::new(StillCamera::from_frames(Vec::new()))
}

/// Poll `check` until it holds, failing the test after five seconds
pub async fn wait_until(mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !check() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
