//! HTTP front end.
//!
//! One POST/GET/OPTIONS route per [`Operation`] under `/tenants/:tenant_id`,
//! plus the two documentation files.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::error_handling::HandleErrorLayer;
use axum::extract::{Path, Query, Request, State};
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ACCESS_CONTROL_MAX_AGE, CONTENT_TYPE,
};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::middleware::map_response;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{BoxError, Router};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tracing::{error, info, warn};

use crate::classify::Operation;
use crate::config::QueryParams;
use crate::handler::Handler;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

pub const DOCS_HTML: &str = "docs.html";
pub const DOCS_OPENAPI: &str = "openapi.yaml";

/// Listener settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    /// Directory holding `docs.html` and `openapi.yaml`.
    pub docs_dir: PathBuf,
}

#[derive(Clone)]
struct AppState {
    handler: Arc<Handler>,
    docs_dir: Arc<PathBuf>,
}

/// Build the application router.
pub fn router(handler: Arc<Handler>, docs_dir: PathBuf) -> Router {
    let state = AppState {
        handler,
        docs_dir: Arc::new(docs_dir),
    };

    let mut router = Router::new()
        .route(
            &format!("/tenants/:tenant_id/{}", DOCS_HTML),
            get(|State(state): State<AppState>| serve_doc(state, DOCS_HTML, "text/html")),
        )
        .route(
            &format!("/tenants/:tenant_id/{}", DOCS_OPENAPI),
            get(|State(state): State<AppState>| serve_doc(state, DOCS_OPENAPI, "application/yaml")),
        );

    for operation in Operation::ALL {
        let route = get(
            move |State(state): State<AppState>,
                  Path(tenant_id): Path<String>,
                  Query(params): Query<Vec<(String, String)>>,
                  headers: HeaderMap| async move {
                state
                    .handler
                    .from_uri(operation, tenant_id, QueryParams::new(params), headers)
                    .await
            },
        )
        .post(
            move |State(state): State<AppState>,
                  Path(tenant_id): Path<String>,
                  Query(params): Query<Vec<(String, String)>>,
                  request: Request| async move {
                state
                    .handler
                    .from_upload(operation, tenant_id, QueryParams::new(params), request)
                    .await
            },
        )
        .options(preflight)
        .layer(map_response(allow_any_origin));

        router = router.route(&format!("/tenants/:tenant_id/{}", operation.route()), route);
    }

    router.with_state(state).layer(
        ServiceBuilder::new()
            .layer(HandleErrorLayer::new(handle_timeout))
            .timeout(REQUEST_TIMEOUT),
    )
}

async fn serve_doc(state: AppState, name: &str, content_type: &'static str) -> Response {
    let path = state.docs_dir.join(name);
    match tokio::fs::read(&path).await {
        Ok(body) => (StatusCode::OK, [(CONTENT_TYPE, content_type)], body).into_response(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "documentation file unavailable");
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

async fn preflight() -> impl IntoResponse {
    (
        StatusCode::NO_CONTENT,
        [
            (ACCESS_CONTROL_ALLOW_METHODS, "POST,GET"),
            (ACCESS_CONTROL_ALLOW_HEADERS, "*"),
            (ACCESS_CONTROL_MAX_AGE, "3600"),
        ],
    )
}

async fn allow_any_origin(mut response: Response) -> Response {
    response
        .headers_mut()
        .insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    response
}

async fn handle_timeout(err: BoxError) -> StatusCode {
    if err.is::<tower::timeout::error::Elapsed>() {
        info!("request timed out");
        StatusCode::REQUEST_TIMEOUT
    } else {
        error!(error = %err, "unhandled service error");
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// Bind and serve until interrupted.
///
/// # Errors
///
/// Returns the bind or accept error.
pub async fn run(config: ServerConfig, handler: Handler) -> std::io::Result<()> {
    let app = router(Arc::new(handler), config.docs_dir);
    let listener = TcpListener::bind(config.addr).await?;
    info!(addr = %config.addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
