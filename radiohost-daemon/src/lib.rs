//! radiohost daemon library: session-per-context REST API.

mod state;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use radiohost_core::{version_info, Context, RadioResult};
use std::sync::PoisonError;
use std::time::Duration;
use tokio::time::Instant;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use state::{AppState, Session, SessionState};

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const DEFAULT_WAIT_TIMEOUT_MS: u64 = 30_000;

/// Build the axum Router with the given state (used by main and tests).
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/version", get(get_version))
        .route("/sessions", post(create_session))
        .route("/sessions/:id", delete(delete_session))
        .route("/sessions/:id/load", post(load_script))
        .route("/sessions/:id/start", post(start_pipeline))
        .route("/sessions/:id/stop", post(stop_pipeline))
        .route("/sessions/:id/status", get(pipeline_status))
        .route("/sessions/:id/wait", post(wait_pipeline))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({"error": message.into()}))).into_response()
}

fn session_not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, "session not found")
}

/// Run `f` against the session's context on the blocking pool.
async fn with_session<T, F>(state: &AppState, id: &str, f: F) -> Result<T, Response>
where
    F: FnOnce(&mut Context) -> RadioResult<T> + Send + 'static,
    T: Send + 'static,
{
    let session = state.sessions.get(id).ok_or_else(session_not_found)?;
    let result = tokio::task::spawn_blocking(move || {
        let mut ctx = session.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut ctx)
    })
    .await
    .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    result.map_err(|e| error_response(StatusCode::BAD_REQUEST, e.to_string()))
}

async fn get_version() -> impl IntoResponse {
    Json(version_info())
}

async fn create_session(State(state): State<AppState>) -> Response {
    let config = state.config.clone();
    let created = tokio::task::spawn_blocking(move || Context::with_config(&config)).await;
    match created {
        Ok(Ok(ctx)) => {
            let session_id = state.sessions.insert(ctx);
            tracing::info!(%session_id, "session created");
            (
                StatusCode::CREATED,
                Json(serde_json::json!({"session_id": session_id})),
            )
                .into_response()
        }
        Ok(Err(e)) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

async fn delete_session(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.sessions.remove(&id) {
        Some(_) => {
            tracing::info!(session_id = %id, "session destroyed");
            StatusCode::NO_CONTENT.into_response()
        }
        None => session_not_found(),
    }
}

#[derive(serde::Deserialize)]
struct LoadRequest {
    script: String,
}

async fn load_script(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<LoadRequest>,
) -> Response {
    match with_session(&state, &id, move |ctx| ctx.load(&body.script)).await {
        Ok(()) => Json(serde_json::json!({"loaded": true})).into_response(),
        Err(res) => res,
    }
}

async fn start_pipeline(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match with_session(&state, &id, Context::start).await {
        Ok(()) => Json(serde_json::json!({"ok": true})).into_response(),
        Err(res) => res,
    }
}

async fn stop_pipeline(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match with_session(&state, &id, Context::stop).await {
        Ok(()) => Json(serde_json::json!({"ok": true})).into_response(),
        Err(res) => res,
    }
}

async fn pipeline_status(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match with_session(&state, &id, Context::status).await {
        Ok(running) => Json(serde_json::json!({"running": running})).into_response(),
        Err(res) => res,
    }
}

#[derive(serde::Deserialize)]
struct WaitParams {
    timeout_ms: Option<u64>,
}

/// Poll `status` until the pipeline finishes or the deadline passes. The
/// context is only locked for each poll, so `stop` can get in between.
async fn wait_pipeline(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<WaitParams>,
) -> Response {
    let timeout = Duration::from_millis(params.timeout_ms.unwrap_or(DEFAULT_WAIT_TIMEOUT_MS));
    let deadline = Instant::now() + timeout;
    loop {
        match with_session(&state, &id, Context::status).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(res) => return res,
        }
        if Instant::now() >= deadline {
            return Json(serde_json::json!({"finished": false})).into_response();
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    match with_session(&state, &id, Context::wait).await {
        Ok(()) => Json(serde_json::json!({"finished": true})).into_response(),
        Err(res) => res,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use radiohost_core::ContextConfig;
    use serde_json::Value;
    use std::path::{Path, PathBuf};
    use tower::ServiceExt;

    fn fixtures_dir() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("radiohost-core")
            .join("tests")
            .join("fixtures")
    }

    fn test_state() -> AppState {
        AppState::new(ContextConfig {
            library_path: vec![fixtures_dir()],
            memory_limit: None,
        })
    }

    fn test_app() -> Router {
        build_app(test_state())
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                req = req.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let res = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn create(app: &Router) -> String {
        let (status, body) = send(app, "POST", "/sessions", None).await;
        assert_eq!(status, StatusCode::CREATED);
        body["session_id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn version_returns_descriptor() {
        let (status, body) = send(&test_app(), "GET", "/version", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["major"], radiohost_core::version_info().major);
        assert!(body["commit_id"].is_string());
    }

    #[tokio::test]
    async fn unknown_session_is_404() {
        let app = test_app();
        for (method, uri) in [
            ("GET", "/sessions/nope/status"),
            ("POST", "/sessions/nope/start"),
            ("POST", "/sessions/nope/stop"),
            ("POST", "/sessions/nope/wait"),
            ("DELETE", "/sessions/nope"),
        ] {
            let (status, body) = send(&app, method, uri, None).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{method} {uri}");
            assert_eq!(body["error"], "session not found");
        }
    }

    #[tokio::test]
    async fn start_without_pipeline_is_400() {
        let app = test_app();
        let id = create(&app).await;
        let (status, body) = send(&app, "POST", &format!("/sessions/{id}/start"), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "no Pipeline loaded to start");
    }

    #[tokio::test]
    async fn invalid_script_is_400() {
        let app = test_app();
        let id = create(&app).await;
        let (status, body) = send(
            &app,
            "POST",
            &format!("/sessions/{id}/load"),
            Some(serde_json::json!({"script": "return 5"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "script did not return a Pipeline instance");
    }

    #[tokio::test]
    async fn full_session_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("in.f32");
        let dst = dir.path().join("out.f32");
        let bytes: Vec<u8> = (0..256).flat_map(|i| (i as f32).to_le_bytes()).collect();
        std::fs::write(&src, bytes).unwrap();
        let script = format!(
            "return radio.CompositeBlock():connect(radio.RealFileSource({:?}, 'f32le', 1e6), radio.RealFileSink({:?}, 'f32le'))",
            src.to_str().unwrap(),
            dst.to_str().unwrap()
        );

        let state = test_state();
        let app = build_app(state.clone());
        assert!(state.sessions.is_empty());
        let id = create(&app).await;
        assert_eq!(state.sessions.len(), 1);

        let (status, body) = send(
            &app,
            "POST",
            &format!("/sessions/{id}/load"),
            Some(serde_json::json!({"script": script})),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["loaded"], true);

        let (status, body) = send(&app, "POST", &format!("/sessions/{id}/start"), None).await;
        assert_eq!(status, StatusCode::OK, "{body}");

        let (status, body) = send(&app, "GET", &format!("/sessions/{id}/status"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["running"], true);

        let (status, body) = send(
            &app,
            "POST",
            &format!("/sessions/{id}/wait?timeout_ms=5000"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["finished"], true);
        assert_eq!(std::fs::read(&dst).unwrap().len(), 256 * 4);

        let (status, _) = send(&app, "DELETE", &format!("/sessions/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(state.sessions.is_empty());
        let (status, _) = send(&app, "GET", &format!("/sessions/{id}/status"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, "DELETE", &format!("/sessions/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn wait_times_out_on_running_pipeline() {
        let app = test_app();
        let id = create(&app).await;
        let script = r#"
local top = radio.CompositeBlock()
function top:start() self.started = true end
function top:status() return { running = self.started == true } end
function top:stop() self.started = false end
return top
"#;
        send(
            &app,
            "POST",
            &format!("/sessions/{id}/load"),
            Some(serde_json::json!({"script": script})),
        )
        .await;
        send(&app, "POST", &format!("/sessions/{id}/start"), None).await;

        let (status, body) = send(
            &app,
            "POST",
            &format!("/sessions/{id}/wait?timeout_ms=100"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["finished"], false);

        let (status, body) = send(&app, "POST", &format!("/sessions/{id}/stop"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
    }
}
