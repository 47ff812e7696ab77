//! HTTP 传输层:REST 风格的检索端点,外加 MCP 规定的 SSE 通道。

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    response::{sse::{Event, Sse, KeepAlive}, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use futures::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::config::{ConnectionConfig, ServerConfig};
use crate::error::{Result, SplunkSearchError};
use crate::model::{SearchIndexParams, SearchParams, SearchSplunkParams};
use crate::search;

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<RwLock<HashMap<String, mpsc::UnboundedSender<Event>>>>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip)]
    status: StatusCode,
}

impl ErrorResponse {
    fn bad_request(error: String) -> Self {
        Self {
            error,
            status: StatusCode::BAD_REQUEST,
        }
    }
}

impl From<SplunkSearchError> for ErrorResponse {
    fn from(e: SplunkSearchError) -> Self {
        let status = match &e {
            SplunkSearchError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::BAD_GATEWAY,
        };
        Self {
            error: e.to_string(),
            status,
        }
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> axum::response::Response {
        let status = self.status;
        (status, Json(self)).into_response()
    }
}

async fn search_handler(
    payload: std::result::Result<Json<SearchParams>, JsonRejection>,
) -> impl IntoResponse {
    let params = match payload {
        Ok(Json(p)) => p,
        Err(e) => {
            return ErrorResponse::bad_request(format!("invalid request body: {e}"))
                .into_response()
        }
    };

    let config = ConnectionConfig::from_env();
    match search::search(&config, params).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => ErrorResponse::from(e).into_response(),
    }
}

async fn search_index_handler(
    payload: std::result::Result<Json<SearchIndexParams>, JsonRejection>,
) -> impl IntoResponse {
    let params = match payload {
        Ok(Json(p)) => p,
        Err(e) => {
            return ErrorResponse::bad_request(format!("invalid request body: {e}"))
                .into_response()
        }
    };

    let config = ConnectionConfig::from_env();
    match search::search_index(&config, params).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => ErrorResponse::from(e).into_response(),
    }
}

async fn search_raw_handler(
    payload: std::result::Result<Json<SearchSplunkParams>, JsonRejection>,
) -> impl IntoResponse {
    let params = match payload {
        Ok(Json(p)) => p,
        Err(e) => {
            return ErrorResponse::bad_request(format!("invalid request body: {e}"))
                .into_response()
        }
    };

    let config = ConnectionConfig::from_env();
    match search::search_splunk(&config, params).await {
        Ok(messages) => (StatusCode::OK, Json(messages)).into_response(),
        Err(e) => ErrorResponse::from(e).into_response(),
    }
}

async fn list_indexes_handler() -> impl IntoResponse {
    let config = ConnectionConfig::from_env();
    match search::list_indexes(&config).await {
        Ok(names) => (StatusCode::OK, Json(names)).into_response(),
        Err(e) => ErrorResponse::from(e).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct GreetQuery {
    pub name: String,
}

async fn greet_handler(
    q: std::result::Result<Query<GreetQuery>, QueryRejection>,
) -> impl IntoResponse {
    let q = match q {
        Ok(Query(q)) => q,
        Err(e) => {
            return ErrorResponse::bad_request(format!("invalid query: {e}")).into_response()
        }
    };
    (StatusCode::OK, Json(search::greet(&q.name))).into_response()
}

async fn sse_handler(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = std::result::Result<Event, axum::Error>>> {
    let (tx, rx) = mpsc::unbounded_channel();
    let session_id = format!("{}", chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0));

    // Clients expect an endpoint event first, then POST requests to that URI.
    // MCP clients generally accept a relative URI reference here.
    let endpoint_url = format!("/message?session_id={}", session_id);
    let _ = tx.send(Event::default().event("endpoint").data(endpoint_url));

    state.sessions.write().unwrap().insert(session_id.clone(), tx);

    let stream = UnboundedReceiverStream::new(rx).map(Ok::<_, axum::Error>);
    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[derive(Deserialize)]
struct MessageQuery {
    session_id: String,
}

async fn message_handler(
    State(state): State<AppState>,
    Query(q): Query<MessageQuery>,
    Json(req): Json<crate::mcp::RpcRequest>,
) -> impl IntoResponse {
    let sender = {
        let sessions = state.sessions.read().unwrap();
        sessions.get(&q.session_id).cloned()
    };

    if let Some(sender) = sender {
        tokio::spawn(async move {
            if let Some(resp) = crate::mcp::process_request(req).await {
                if let Ok(json_str) = serde_json::to_string(&resp) {
                    let _ = sender.send(Event::default().event("message").data(json_str));
                }
            }
        });
        StatusCode::ACCEPTED
    } else {
        StatusCode::NOT_FOUND
    }
}

pub fn build_router() -> Router {
    let state = AppState {
        sessions: Arc::new(RwLock::new(HashMap::new())),
    };
    Router::new()
        .route("/search", post(search_handler))
        .route("/search/index", post(search_index_handler))
        .route("/search/raw", post(search_raw_handler))
        .route("/indexes", get(list_indexes_handler))
        .route("/greet", get(greet_handler))
        .route("/sse", get(sse_handler))
        .route("/message", post(message_handler))
        .with_state(state)
}

pub async fn serve_http(config: &ServerConfig) -> Result<()> {
    let router = build_router();

    let addr = format!(
        "{}:{}",
        config.http_addr.as_deref().unwrap_or("0.0.0.0"),
        config.http_port.unwrap_or(8000)
    );
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| SplunkSearchError::ConfigError(format!("bind {addr} failed: {e}")))?;
    tracing::info!("HTTP server listening on http://{addr}");
    axum::serve(listener, router).await.map_err(|e| e.into())
}
