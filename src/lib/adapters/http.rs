use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, Method};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{any, get};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tokio::net;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::core::{AppError, TodoPatch};
use crate::storage::TodoStore;

/// Requests carrying this header value get JSON; everything else gets the
/// landing page or a rejection.
pub const AJAX_HEADER: &str = "X-Requested-With";
pub const AJAX_SENTINEL: &str = "XMLHttpRequest";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpServerConfig<'a> {
    pub port: &'a str,
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TodoStore>,
}

#[derive(Deserialize)]
struct CreateEnvelope {
    payload: NewTodo,
}

#[derive(Deserialize)]
struct NewTodo {
    task: String,
    completed: bool,
}

// A body of `{}` is a valid no-op update.
#[derive(Deserialize)]
struct PatchEnvelope {
    #[serde(default)]
    payload: TodoPatch,
}

fn is_ajax(headers: &HeaderMap) -> bool {
    headers.get(AJAX_HEADER).and_then(|v| v.to_str().ok()) == Some(AJAX_SENTINEL)
}

async fn home() -> Html<&'static str> {
    Html(include_str!("../../../static/home.html"))
}

async fn todos_collection(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    body: String,
) -> Result<Response, AppError> {
    if !is_ajax(&headers) {
        // Plain page loads still get the landing page; any other non-AJAX
        // request here is invalid.
        return match method.as_str() {
            "GET" => Ok(home().await.into_response()),
            _ => Err(AppError::InvalidRequest),
        };
    }

    match method.as_str() {
        "GET" => {
            let todos = state.store.list_all().await?;
            Ok(Json(json!({ "context": todos })).into_response())
        }
        "POST" => {
            let CreateEnvelope { payload } = serde_json::from_str(&body)?;
            let todo = state.store.create(payload.task, payload.completed).await?;
            tracing::info!(id = todo.id, "todo created");
            Ok(Json(json!({ "status": "Todo added!" })).into_response())
        }
        _ => Err(AppError::MethodNotAllowed),
    }
}

async fn todos_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    method: Method,
    headers: HeaderMap,
    body: String,
) -> Result<Response, AppError> {
    if !is_ajax(&headers) {
        return Err(AppError::InvalidRequest);
    }

    // Resolve the record before looking at the method: an unknown id is a
    // 404 even when the method would not be allowed.
    let todo = state.store.get(id).await?;

    match method.as_str() {
        "PUT" => {
            let PatchEnvelope { payload } = serde_json::from_str(&body)?;
            state.store.update(todo.id, payload).await?;
            tracing::info!(id = todo.id, "todo updated");
            Ok(Json(json!({ "status": "Todo updated!" })).into_response())
        }
        "DELETE" => {
            state.store.delete(todo.id).await?;
            tracing::info!(id = todo.id, "todo deleted");
            Ok(Json(json!({ "status": "Todo deleted!" })).into_response())
        }
        _ => Err(AppError::MethodNotAllowed),
    }
}

pub fn router(state: AppState) -> Router {
    let trace_layer =
        TraceLayer::new_for_http().make_span_with(|request: &axum::extract::Request<_>| {
            let uri = request.uri().to_string();
            tracing::info_span!("http_request", method = ?request.method(), uri)
        });

    Router::new()
        .route("/", get(home))
        .route("/todos/", any(todos_collection))
        .route("/todos/{id}/", any(todos_item))
        .nest_service("/static", ServeDir::new("static"))
        .layer(trace_layer)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub struct HttpServer {
    router: Router,
    listener: net::TcpListener,
}

impl HttpServer {
    pub async fn new(
        store: Arc<dyn TodoStore>,
        config: HttpServerConfig<'_>,
    ) -> anyhow::Result<Self> {
        let router = router(AppState { store });

        let addr = SocketAddr::from(([0, 0, 0, 0], config.port.parse::<u16>().unwrap_or(3000)));
        let listener = net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to listen on port {}", config.port))?;

        Ok(Self { router, listener })
    }

    pub async fn run(self) -> anyhow::Result<()> {
        tracing::info!("listening on {}", self.listener.local_addr()?);
        axum::serve(self.listener, self.router)
            .await
            .context("received error from running server")?;
        Ok(())
    }
}
