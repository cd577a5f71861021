//! Per-request state carried through both pipelines.
//!
//! A [`RequestContext`] is created at ingress and dropped when the response
//! is written. Stages fill it in as the request advances; every field is
//! optional because any stage may short-circuit before a later one runs.
//! Handlers read it to find the parsed resource ID, the buffered body, the
//! correlation data and the lock-loss cancellation token.

use bytes::Bytes;
use meridian_core::{CorrelationData, ResourceId, SubscriptionState, SystemData};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Path parameters captured by the matched route, keyed by lowercase name.
pub type PathParams = HashMap<String, String>;

/// Request-scoped state.
///
/// ```
/// use meridian_middleware::RequestContext;
///
/// let mut ctx = RequestContext::new().with_api_version("2024-06-10-preview");
/// ctx.set_original_path("/Subscriptions/abc");
///
/// assert_eq!(ctx.api_version(), Some("2024-06-10-preview"));
/// assert!(ctx.resource_id().is_none());
/// ```
#[derive(Debug)]
pub struct RequestContext {
    started_at: Instant,
    remote_addr: Option<SocketAddr>,
    original_path: Option<String>,
    body: Option<Bytes>,
    span: Option<tracing::Span>,
    api_version: Option<String>,
    correlation: Option<CorrelationData>,
    system_data: Option<SystemData>,
    resource_id: Option<ResourceId>,
    subscription_state: Option<SubscriptionState>,
    path_params: Option<PathParams>,
    route_pattern: Option<String>,
    cancellation: Option<CancellationToken>,
    otel: Option<opentelemetry::Context>,
}

impl RequestContext {
    /// Creates an empty context stamped with the current time.
    #[must_use]
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            remote_addr: None,
            original_path: None,
            body: None,
            span: None,
            api_version: None,
            correlation: None,
            system_data: None,
            resource_id: None,
            subscription_state: None,
            path_params: None,
            route_pattern: None,
            cancellation: None,
            otel: None,
        }
    }

    /// Sets the peer address.
    #[must_use]
    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    /// Sets the propagated OpenTelemetry context.
    #[must_use]
    pub fn with_otel_context(mut self, cx: opentelemetry::Context) -> Self {
        self.otel = Some(cx);
        self
    }

    /// Sets the original path.
    #[must_use]
    pub fn with_original_path(mut self, path: impl Into<String>) -> Self {
        self.original_path = Some(path.into());
        self
    }

    /// Sets the correlation data.
    #[must_use]
    pub fn with_correlation(mut self, correlation: CorrelationData) -> Self {
        self.correlation = Some(correlation);
        self
    }

    /// Sets the API version.
    #[must_use]
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    /// Sets the buffered body.
    #[must_use]
    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = Some(body);
        self
    }

    /// Sets the parsed resource ID.
    #[must_use]
    pub fn with_resource_id(mut self, resource_id: ResourceId) -> Self {
        self.resource_id = Some(resource_id);
        self
    }

    /// Sets the path parameters.
    #[must_use]
    pub fn with_path_params(mut self, params: PathParams) -> Self {
        self.path_params = Some(params);
        self
    }

    /// Sets the lock-loss cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = Some(cancellation);
        self
    }

    /// When the request entered the pipeline.
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Time since the request entered the pipeline.
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// The peer address.
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// The request path before lowercasing.
    pub fn original_path(&self) -> Option<&str> {
        self.original_path.as_deref()
    }

    /// Records the request path before lowercasing.
    pub fn set_original_path(&mut self, path: impl Into<String>) {
        self.original_path = Some(path.into());
    }

    /// The buffered request body.
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Stores the buffered request body.
    pub fn set_body(&mut self, body: Bytes) {
        self.body = Some(body);
    }

    /// The per-request logging span.
    pub fn span(&self) -> Option<&tracing::Span> {
        self.span.as_ref()
    }

    /// Stores the per-request logging span.
    pub fn set_span(&mut self, span: tracing::Span) {
        self.span = Some(span);
    }

    /// The validated `api-version`.
    pub fn api_version(&self) -> Option<&str> {
        self.api_version.as_deref()
    }

    /// Stores the validated `api-version`.
    pub fn set_api_version(&mut self, version: impl Into<String>) {
        self.api_version = Some(version.into());
    }

    /// Correlation identifiers.
    pub fn correlation(&self) -> Option<&CorrelationData> {
        self.correlation.as_ref()
    }

    /// Stores correlation identifiers.
    pub fn set_correlation(&mut self, correlation: CorrelationData) {
        self.correlation = Some(correlation);
    }

    /// ARM system data from `x-ms-arm-resource-system-data`.
    pub fn system_data(&self) -> Option<&SystemData> {
        self.system_data.as_ref()
    }

    /// Stores ARM system data.
    pub fn set_system_data(&mut self, system_data: SystemData) {
        self.system_data = Some(system_data);
    }

    /// The resource ID parsed from the original path.
    pub fn resource_id(&self) -> Option<&ResourceId> {
        self.resource_id.as_ref()
    }

    /// Stores the parsed resource ID.
    pub fn set_resource_id(&mut self, resource_id: ResourceId) {
        self.resource_id = Some(resource_id);
    }

    /// The subscription state observed by the gate.
    pub fn subscription_state(&self) -> Option<&SubscriptionState> {
        self.subscription_state.as_ref()
    }

    /// Stores the subscription state.
    pub fn set_subscription_state(&mut self, state: SubscriptionState) {
        self.subscription_state = Some(state);
    }

    /// All captured path parameters.
    pub fn path_params(&self) -> Option<&PathParams> {
        self.path_params.as_ref()
    }

    /// A single path parameter by lowercase name.
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .as_ref()
            .and_then(|params| params.get(name))
            .map(String::as_str)
    }

    /// Stores the captured path parameters.
    pub fn set_path_params(&mut self, params: PathParams) {
        self.path_params = Some(params);
    }

    /// The pattern of the matched route.
    pub fn route_pattern(&self) -> Option<&str> {
        self.route_pattern.as_deref()
    }

    /// Stores the pattern of the matched route.
    pub fn set_route_pattern(&mut self, pattern: impl Into<String>) {
        self.route_pattern = Some(pattern.into());
    }

    /// Trips when the subscription lock is lost mid-request.
    pub fn cancellation(&self) -> Option<&CancellationToken> {
        self.cancellation.as_ref()
    }

    /// Stores the lock-loss cancellation token.
    pub fn set_cancellation(&mut self, cancellation: CancellationToken) {
        self.cancellation = Some(cancellation);
    }

    /// The OpenTelemetry context holding the server span and baggage.
    pub fn otel_context(&self) -> Option<&opentelemetry::Context> {
        self.otel.as_ref()
    }

    /// Replaces the OpenTelemetry context.
    pub fn set_otel_context(&mut self, cx: opentelemetry::Context) {
        self.otel = Some(cx);
    }

    /// Sets an attribute on the server span, if one is active.
    pub fn set_span_attribute(&self, attribute: opentelemetry::KeyValue) {
        use opentelemetry::trace::TraceContextExt;

        if let Some(cx) = &self.otel {
            cx.span().set_attribute(attribute);
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
