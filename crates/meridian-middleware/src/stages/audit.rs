//! Control-plane auditing.

use crate::audit::{AuditOutcome, AuditRecord, AuditSink, CallerIdentity};
use crate::context::RequestContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response};
use chrono::Utc;
use meridian_core::headers;
use std::sync::Arc;
use uuid::Uuid;

/// Sends one [`AuditRecord`] per request to an [`AuditSink`].
///
/// Sink failures are logged and counted; the response is never affected.
#[derive(Clone)]
pub struct AuditMiddleware {
    sink: Arc<dyn AuditSink>,
}

impl AuditMiddleware {
    /// Creates the stage around `sink`.
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    fn build_record(ctx: &RequestContext, request: &Request) -> AuditRecord {
        let header = |name: &http::HeaderName| {
            request
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let mut caller_identities = Vec::new();
        if let Some(upn) = header(&headers::CLIENT_PRINCIPAL_NAME) {
            caller_identities.push(CallerIdentity::principal_name(upn));
        }
        if let Some(oid) = header(&headers::CLIENT_OBJECT_ID) {
            caller_identities.push(CallerIdentity::object_id(oid));
        }

        let (request_id, correlation_request_id) = match ctx.correlation() {
            Some(correlation) => {
                if !correlation.client_request_id.is_empty() {
                    caller_identities.push(CallerIdentity::client_request_id(
                        correlation.client_request_id.clone(),
                    ));
                }
                (
                    correlation.request_id,
                    correlation.correlation_request_id.clone(),
                )
            }
            None => (Uuid::nil(), String::new()),
        };

        AuditRecord {
            operation_name: format!("{} {}", request.method(), request.uri().path()),
            caller_ip: ctx.remote_addr().map(|addr| addr.ip()),
            caller_identities,
            request_id,
            correlation_request_id,
            timestamp: Utc::now(),
            outcome: AuditOutcome::Pending,
        }
    }
}

impl std::fmt::Debug for AuditMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditMiddleware").finish_non_exhaustive()
    }
}

impl Middleware for AuditMiddleware {
    fn name(&self) -> &'static str {
        "audit"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let mut record = Self::build_record(ctx, &request);

            let response = next.run(ctx, request).await;

            let status = response.status();
            if status.as_u16() >= 400 {
                record.fail(status.as_u16());
            } else {
                record.succeed();
            }

            if let Err(err) = self.sink.send(&record).await {
                tracing::error!(
                    error = %err,
                    operation = %record.operation_name,
                    "failed to send audit record"
                );
                meridian_telemetry::record_audit_failure();
            }
            response
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use crate::test_util::{create_test_request, StatusHandler};
    use http::{HeaderValue, StatusCode};
    use meridian_core::CorrelationData;

    #[tokio::test]
    async fn test_record_contents() {
        let sink = Arc::new(MemoryAuditSink::new());
        let stage = AuditMiddleware::new(sink.clone());

        let mut request = create_test_request("PUT", "/Subscriptions/abc");
        request
            .headers_mut()
            .insert(headers::CLIENT_PRINCIPAL_NAME, HeaderValue::from_static("user@example.com"));
        request
            .headers_mut()
            .insert(headers::CLIENT_REQUEST_ID, HeaderValue::from_static("client-1"));
        let correlation = CorrelationData::from_headers(request.headers());

        let mut ctx = RequestContext::new()
            .with_remote_addr("10.0.0.1:5555".parse().unwrap())
            .with_correlation(correlation.clone());
        let handler = StatusHandler(StatusCode::CONFLICT);
        stage.process(&mut ctx, request, Next::handler(&handler)).await;

        let records = sink.records();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.operation_name, "PUT /Subscriptions/abc");
        assert_eq!(record.caller_ip, Some("10.0.0.1".parse().unwrap()));
        assert_eq!(record.request_id, correlation.request_id);
        assert_eq!(
            record.caller_identities,
            vec![
                CallerIdentity::principal_name("user@example.com"),
                CallerIdentity::client_request_id("client-1"),
            ]
        );
        assert_eq!(
            record.outcome,
            AuditOutcome::Failure {
                description: "Status code: 409".into()
            }
        );
    }

    #[tokio::test]
    async fn test_success_outcome() {
        let sink = Arc::new(MemoryAuditSink::new());
        let mut ctx = RequestContext::new();
        let handler = StatusHandler(StatusCode::ACCEPTED);
        AuditMiddleware::new(sink.clone())
            .process(&mut ctx, create_test_request("DELETE", "/x"), Next::handler(&handler))
            .await;
        assert_eq!(sink.records()[0].outcome, AuditOutcome::Success);
    }

    #[tokio::test]
    async fn test_sink_failure_not_surfaced() {
        let mut ctx = RequestContext::new();
        let handler = StatusHandler(StatusCode::OK);
        let response = AuditMiddleware::new(Arc::new(MemoryAuditSink::failing()))
            .process(&mut ctx, create_test_request("GET", "/x"), Next::handler(&handler))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
