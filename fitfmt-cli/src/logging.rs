use std::time::Instant;

use axum::{
    Json,
    body::Body,
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Default filter for a `-v` count: warn, then info, then debug.
fn default_directive(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

/// Install the global subscriber. Logs go to stderr; `RUST_LOG` overrides `-v`.
pub fn init(verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));
    // A second init (tests) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Largest request or response body buffered for debug logging.
pub const DEFAULT_BODY_LIMIT: usize = 16 * 1024 * 1024;

#[derive(Clone)]
pub struct LoggingMiddleware {
    pub verbose: u8,
    pub body_limit: usize,
}

impl LoggingMiddleware {
    #[must_use]
    pub fn new(verbose: u8) -> Self {
        Self {
            verbose,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    #[must_use]
    pub fn with_body_limit(mut self, body_limit: usize) -> Self {
        self.body_limit = body_limit;
        self
    }

    /// Log method, path, status and latency; at `-vv` also the JSON bodies.
    pub async fn handle(&self, request: Request, next: Next) -> Response {
        if self.verbose == 0 {
            return next.run(request).await;
        }

        let method = request.method().clone();
        let path = request.uri().path().to_owned();
        let start = Instant::now();

        let response = if self.verbose >= 2 {
            let (parts, body) = request.into_parts();
            let bytes = match axum::body::to_bytes(body, self.body_limit).await {
                Ok(bytes) => bytes,
                Err(err) => {
                    warn!(%method, path = %path, error = %err, "could not read request body");
                    let message = format!("could not read request body: {err}");
                    return (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
                        .into_response();
                }
            };
            if !bytes.is_empty() {
                debug!(body = %String::from_utf8_lossy(&bytes), "request body");
            }
            next.run(Request::from_parts(parts, Body::from(bytes))).await
        } else {
            next.run(request).await
        };

        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        info!(
            %method,
            path = %path,
            status = response.status().as_u16(),
            elapsed_ms,
            "request"
        );

        if self.verbose < 2 {
            return response;
        }
        let (parts, body) = response.into_parts();
        match axum::body::to_bytes(body, self.body_limit).await {
            Ok(bytes) => {
                if !bytes.is_empty() {
                    debug!(body = %String::from_utf8_lossy(&bytes), "response body");
                }
                Response::from_parts(parts, Body::from(bytes))
            }
            Err(err) => {
                warn!(%method, path = %path, error = %err, "could not read response body");
                Response::from_parts(parts, Body::empty())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::{Router, routing::post};
    use tower::ServiceExt;

    fn echo_app(logger: LoggingMiddleware) -> Router {
        Router::new()
            .route("/", post(|body: String| async move { body }))
            .layer(axum::middleware::from_fn(move |request: Request, next: Next| {
                let logger = logger.clone();
                async move { logger.handle(request, next).await }
            }))
    }

    fn post_body(body: &'static str) -> Request {
        axum::http::Request::builder()
            .method("POST")
            .uri("/")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_unreadable_request_body_is_bad_request() {
        let app = echo_app(LoggingMiddleware::new(2).with_body_limit(4));
        let response = app.oneshot(post_body("far too long")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(value["error"].as_str().unwrap().contains("could not read request body"));
    }

    #[tokio::test]
    async fn test_request_body_is_passed_through() {
        let app = echo_app(LoggingMiddleware::new(2));
        let response = app.oneshot(post_body("hello")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"hello");
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(default_directive(0), "warn");
        assert_eq!(default_directive(1), "info");
        assert_eq!(default_directive(2), "debug");
        assert_eq!(default_directive(9), "debug");
    }
}
