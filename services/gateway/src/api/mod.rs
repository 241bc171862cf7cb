//! HTTP boundary: router assembly, middleware stack, and the server loop.

use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::{Extension, MatchedPath, Request};
use axum::http::{
    HeaderName, HeaderValue, Method,
    header::{AUTHORIZATION, CONTENT_TYPE},
};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, Any as AnyOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{Span, error, info, info_span, warn};
use ulid::Ulid;

pub mod client_ip;
pub mod envelope;
pub mod handlers;
mod headers;
mod openapi;
pub mod state;

pub use openapi::openapi;
pub use state::GatewayState;

use crate::metrics::GatewayMetrics;
use envelope::ApiError;

/// Grace period for in-flight requests after the termination signal.
const SHUTDOWN_BUDGET: Duration = Duration::from_secs(5);

/// Bind the listener and serve until a termination signal arrives, then
/// drain in-flight requests within the shutdown budget.
///
/// # Errors
///
/// Returns an error if the CORS configuration is invalid, the port cannot
/// be bound, or the server loop fails.
pub async fn serve(state: Arc<GatewayState>) -> Result<()> {
    let port = state.config.port();
    let cors = cors_layer(state.config.cors_allowed_origins())?;
    let metrics = state.metrics.clone();

    let (router, _openapi) = openapi::api_router().split_for_parts();
    let app = router
        // Apple's real callback is the documented form POST; this GET twin
        // exists for exercising the flow without form_post.
        .route(
            "/auth/icloud/callback",
            get(handlers::auth::oauth::icloud_callback_query),
        )
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &Request<Body>| {
                        HeaderValue::from_str(Ulid::new().to_string().as_str()).ok()
                    },
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(CatchPanicLayer::custom(panic_response))
                .layer(cors)
                .layer(axum::middleware::from_fn(headers::security_headers))
                .layer(axum::middleware::from_fn(
                    move |request: Request, next: Next| {
                        let metrics = metrics.clone();
                        async move { track_request(metrics, request, next).await }
                    },
                ))
                .layer(Extension(state.clone())),
        );

    let listener = TcpListener::bind(format!("::0:{port}"))
        .await
        .with_context(|| format!("failed to bind port {port}"))?;
    info!("Listening on [::]:{port}");

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("termination signal received, draining connections");
        let _ = shutdown_tx.send(true);
    });

    let graceful = {
        let mut rx = shutdown_rx.clone();
        async move {
            let _ = rx.changed().await;
        }
    };
    let drain_deadline = {
        let mut rx = shutdown_rx;
        async move {
            let _ = rx.changed().await;
            tokio::time::sleep(SHUTDOWN_BUDGET).await;
        }
    };

    let server = async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(graceful)
        .await
    };

    tokio::select! {
        result = server => {
            result.context("server loop failed")?;
            info!("Gracefully shutdown");
        }
        () = drain_deadline => {
            warn!(
                "shutdown budget of {}s exhausted, dropping in-flight requests",
                SHUTDOWN_BUDGET.as_secs()
            );
        }
    }
    Ok(())
}

fn make_span(request: &axum::http::Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

async fn track_request(metrics: Arc<GatewayMetrics>, request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let path = request.extensions().get::<MatchedPath>().map_or_else(
        || request.uri().path().to_string(),
        |path| path.as_str().to_string(),
    );
    let response = next.run(request).await;
    metrics.record_request(&method, &path, response.status().as_u16());
    response
}

/// Panic isolation: unexpected programming errors become `INTERNAL_ERROR`
/// instead of a dropped connection.
fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!("request handler panicked: {detail}");
    ApiError::internal().into_response()
}

fn cors_layer(allowed_origins: &[String]) -> Result<CorsLayer> {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION]);

    if allowed_origins.iter().any(|origin| origin == "*") {
        return Ok(layer.allow_origin(AnyOrigin));
    }

    let origins = allowed_origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin)
                .with_context(|| format!("invalid CORS origin: {origin}"))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(layer
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("failed to install ctrl-c handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!("failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cors_accepts_wildcard() {
        assert!(cors_layer(&["*".to_string()]).is_ok());
    }

    #[test]
    fn cors_accepts_origin_list() {
        let origins = vec![
            "https://play.boddlelearning.dev".to_string(),
            "https://dashboard.boddlelearning.dev".to_string(),
        ];
        assert!(cors_layer(&origins).is_ok());
    }

    #[test]
    fn cors_rejects_unencodable_origins() {
        assert!(cors_layer(&["https://bad\norigin".to_string()]).is_err());
    }

    #[test]
    fn panic_payloads_are_summarized() {
        let response = panic_response(Box::new("boom"));
        assert_eq!(
            response.status(),
            axum::http::StatusCode::INTERNAL_SERVER_ERROR
        );
        let response = panic_response(Box::new(String::from("boom")));
        assert_eq!(
            response.status(),
            axum::http::StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
