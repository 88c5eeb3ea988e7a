//! HTTP invocation endpoint.
//!
//! `POST /integrity` takes an invocation (`{ mode, batchSize?, offset?,
//! targetId?, category?, dryRun? }`) and answers with the matching report.
//! `GET /rules` exports the style guide for client-side pre-validation.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use fitfmt::{BatchError, Engine, Invocation, StoreError, StyleGuide};
use serde_json::json;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::file_store::JsonFileStore;
use crate::logging::LoggingMiddleware;

/// Shared handler state. Page calls are serialized on the store lock.
#[derive(Clone)]
pub struct AppState {
    engine: Arc<Engine>,
    store: Arc<Mutex<JsonFileStore>>,
}

impl AppState {
    #[must_use]
    pub fn new(engine: Engine, store: JsonFileStore) -> Self {
        Self {
            engine: Arc::new(engine),
            store: Arc::new(Mutex::new(store)),
        }
    }
}

#[must_use]
pub fn router(state: AppState, verbose: u8) -> Router {
    let logger = LoggingMiddleware::new(verbose);
    Router::new()
        .route("/integrity", post(integrity))
        .route("/rules", get(rules))
        .route("/health", get(health))
        .with_state(state)
        .layer(middleware::from_fn(move |request: Request, next: Next| {
            let logger = logger.clone();
            async move { logger.handle(request, next).await }
        }))
        .layer(TraceLayer::new_for_http())
}

/// Bind `addr` and serve until the process is stopped.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(state: AppState, addr: SocketAddr, verbose: u8) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %listener.local_addr()?, "fitfmt server listening");
    axum::serve(listener, router(state, verbose)).await?;
    Ok(())
}

fn status_for(err: &BatchError) -> StatusCode {
    match err {
        BatchError::InvalidPage(_) => StatusCode::BAD_REQUEST,
        BatchError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

async fn integrity(State(state): State<AppState>, Json(invocation): Json<Invocation>) -> Response {
    let mut store = state.store.lock().await;
    let response = match state.engine.invoke(&mut *store, &invocation) {
        Ok(response) => response,
        Err(err) => {
            warn!(error = %err, "invocation rejected");
            return error_response(status_for(&err), &err.to_string());
        }
    };
    if store.is_dirty()
        && let Err(err) = store.save()
    {
        error!(error = %err, path = %store.path().display(), "could not save store");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, &format!("{err:#}"));
    }
    Json(response).into_response()
}

#[allow(clippy::unused_async)]
async fn rules(State(state): State<AppState>) -> Response {
    Json::<&StyleGuide>(state.engine.guide()).into_response()
}

#[allow(clippy::unused_async)]
async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
