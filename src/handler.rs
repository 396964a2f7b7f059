//! Request pipeline: resolve sources, build the config, compare,
//! classify, render.
//!
//! [`Handler`] owns the injected collaborators. The synchronous stages run
//! on a blocking worker so that file I/O, blocking fetches and comparison
//! never stall the async runtime.

use std::sync::Arc;

use axum::extract::Request;
use axum::http::header::{CONTENT_TYPE, USER_AGENT};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::debug;

use crate::checker::CheckContext;
use crate::classify::{self, Operation, Report};
use crate::comparator::Comparator;
use crate::config::{ComparisonConfig, QueryParams};
use crate::error::PipelineError;
use crate::render::{MediaType, OutputRenderer, RenderRequest};
use crate::source::{self, SourcePair, BASE_FIELD, REVISION_FIELD};
use crate::telemetry::{self, TelemetryEvent, TelemetrySender};

/// Successful rendering of a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub media_type: MediaType,
    pub body: Vec<u8>,
}

impl IntoResponse for Rendered {
    fn into_response(self) -> Response {
        (
            StatusCode::CREATED,
            [(CONTENT_TYPE, self.media_type.mime())],
            self.body,
        )
            .into_response()
    }
}

/// Who asked, for telemetry.
#[derive(Debug, Clone, Default)]
pub struct Caller {
    pub tenant_id: String,
    pub user_agent: Option<String>,
}

impl Caller {
    pub fn new(tenant_id: String, headers: &HeaderMap) -> Self {
        Self {
            tenant_id,
            user_agent: headers
                .get(USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        }
    }
}

pub struct Handler {
    comparator: Arc<dyn Comparator>,
    telemetry: Arc<dyn TelemetrySender>,
    renderer: OutputRenderer,
}

impl Handler {
    pub fn new(comparator: Arc<dyn Comparator>, telemetry: Arc<dyn TelemetrySender>) -> Self {
        Self {
            comparator,
            telemetry,
            renderer: OutputRenderer,
        }
    }

    pub fn renderer(&self) -> &OutputRenderer {
        &self.renderer
    }

    /// Compare and classify a resolved pair.
    ///
    /// A JSON raw diff never includes the endpoint summary.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Load` when either document cannot be loaded.
    pub fn evaluate(
        &self,
        operation: Operation,
        mut config: ComparisonConfig,
        sources: &SourcePair,
        ctx: &CheckContext,
        media_type: MediaType,
    ) -> Result<Report, PipelineError> {
        if operation == Operation::Diff && media_type == MediaType::Json {
            config = config.without_endpoints();
        }
        let tree = self
            .comparator
            .compare(&config, &sources.base, &sources.revision)?;
        Ok(classify::classify_result(
            operation,
            self.comparator.as_ref(),
            tree,
            ctx,
        ))
    }

    /// Run every stage after source resolution.
    ///
    /// # Errors
    ///
    /// Returns the first failing stage's error.
    pub fn run(
        &self,
        operation: Operation,
        params: &QueryParams,
        sources: &SourcePair,
        request: &RenderRequest,
    ) -> Result<Rendered, PipelineError> {
        let config = ComparisonConfig::from_params(params);
        let ctx = CheckContext::now(config.deprecation_days);
        let report = self.evaluate(operation, config, sources, &ctx, request.media_type)?;
        let body = self.renderer.render(&report, request)?;
        debug!(
            operation = operation.command(),
            media_type = request.media_type.mime(),
            language = request.language,
            bytes = body.len(),
            "rendered report"
        );
        Ok(Rendered {
            media_type: request.media_type,
            body,
        })
    }

    fn record(&self, operation: Operation, sources: &SourcePair, request: &RenderRequest, caller: &Caller) {
        let event = TelemetryEvent::new(
            operation,
            vec![
                sources.base.origin().to_string(),
                sources.revision.origin().to_string(),
            ],
            request.media_type,
            &caller.tenant_id,
            caller.user_agent.as_deref(),
        );
        telemetry::report(Arc::clone(&self.telemetry), event);
    }

    /// Handle a multipart or url-encoded upload of `base` and `revision`.
    ///
    /// # Errors
    ///
    /// Any [`PipelineError`]; the temporary upload directory is removed
    /// before this returns, whatever the outcome.
    pub async fn from_upload(
        self: Arc<Self>,
        operation: Operation,
        tenant_id: String,
        params: QueryParams,
        request: Request,
    ) -> Result<Rendered, PipelineError> {
        let render = RenderRequest::from_headers(request.headers());
        let caller = Caller::new(tenant_id, request.headers());
        let fields = source::read_upload(request).await?;

        tokio::task::spawn_blocking(move || {
            let sources = source::resolve_from_upload(fields)?;
            self.record(operation, &sources, &render, &caller);
            self.run(operation, &params, &sources, &render)
        })
        .await
        .map_err(|e| PipelineError::Task(e.to_string()))?
    }

    /// Handle `?base=<url>&revision=<url>` references.
    ///
    /// # Errors
    ///
    /// Any [`PipelineError`].
    pub async fn from_uri(
        self: Arc<Self>,
        operation: Operation,
        tenant_id: String,
        params: QueryParams,
        headers: HeaderMap,
    ) -> Result<Rendered, PipelineError> {
        let render = RenderRequest::from_headers(&headers);
        let caller = Caller::new(tenant_id, &headers);

        tokio::task::spawn_blocking(move || {
            let sources =
                source::resolve_from_uri(params.first(BASE_FIELD), params.first(REVISION_FIELD))?;
            self.record(operation, &sources, &render, &caller);
            self.run(operation, &params, &sources, &render)
        })
        .await
        .map_err(|e| PipelineError::Task(e.to_string()))?
    }
}
