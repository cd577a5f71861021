//! HTTP server.
//!
//! Two listeners: the API listener feeding the [`Router`], and a metrics
//! listener answering `GET /metrics` from the Prometheus recorder. Each
//! connection runs on its own task over HTTP/1. On shutdown both accept
//! loops stop, open connections are asked to finish gracefully, and the
//! server waits up to the shutdown timeout for them to drain.

use crate::error::ServerError;
use crate::router::Router;
use crate::shutdown::{ConnectionTracker, ShutdownSignal};
use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::{Method, StatusCode};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use meridian_config::FrontendConfig;
use meridian_core::api::MAX_REQUEST_BODY_BYTES;
use meridian_core::CloudError;
use meridian_middleware::{RequestContext, Response, ResponseExt};
use meridian_telemetry::{extract_context, render_metrics};
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Hard cap on buffered request bodies. The body stage enforces the API
/// limit; this only bounds memory per connection.
const TRANSPORT_BODY_CEILING: usize = 4 * MAX_REQUEST_BODY_BYTES;

/// The frontend's HTTP server.
#[derive(Debug)]
pub struct Server {
    router: Arc<Router>,
    listen_addr: String,
    metrics_addr: Option<String>,
    request_timeout: Duration,
    shutdown_timeout: Duration,
}

impl Server {
    /// Creates a server for `router` with addresses and timeouts from
    /// `config`. The metrics listener is only opened when metrics are
    /// enabled.
    pub fn new(router: Arc<Router>, config: &FrontendConfig) -> Self {
        Self {
            router,
            listen_addr: config.server.listen_addr.clone(),
            metrics_addr: config
                .telemetry
                .metrics
                .enabled
                .then(|| config.server.metrics_addr.clone()),
            request_timeout: config.server.request_timeout(),
            shutdown_timeout: config.server.shutdown_timeout(),
        }
    }

    /// Runs until SIGTERM or SIGINT.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_with_shutdown(ShutdownSignal::with_os_signals()).await
    }

    /// Binds the configured listeners and serves until `shutdown` fires.
    pub async fn run_with_shutdown(self, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let listener = bind(&self.listen_addr).await?;
        let metrics = match &self.metrics_addr {
            Some(addr) => Some(bind(addr).await?),
            None => None,
        };
        self.serve(listener, metrics, shutdown).await
    }

    /// Serves on already bound listeners until `shutdown` fires.
    pub async fn serve(
        self,
        listener: TcpListener,
        metrics: Option<TcpListener>,
        shutdown: ShutdownSignal,
    ) -> Result<(), ServerError> {
        let tracker = ConnectionTracker::new();
        tracing::info!(addr = %listener.local_addr()?, "frontend listening");

        let metrics_loop = match metrics {
            Some(listener) => {
                tracing::info!(addr = %listener.local_addr()?, "metrics listening");
                let loop_ = accept_loop(listener, shutdown.clone(), tracker.clone(), |request, _| async move {
                    metrics_response(&request)
                });
                Some(tokio::spawn(loop_))
            }
            None => None,
        };

        let router = Arc::clone(&self.router);
        let request_timeout = self.request_timeout;
        accept_loop(listener, shutdown.clone(), tracker.clone(), move |request, remote_addr| {
            let router = Arc::clone(&router);
            async move { dispatch(&router, request, remote_addr, request_timeout).await }
        })
        .await;

        if let Some(handle) = metrics_loop {
            if let Err(err) = handle.await {
                tracing::error!(error = %err, "metrics listener task failed");
            }
        }

        tracing::info!(
            active = tracker.active_connections(),
            timeout = ?self.shutdown_timeout,
            "waiting for connections to drain"
        );
        if tokio::time::timeout(self.shutdown_timeout, tracker.drained()).await.is_err() {
            tracing::warn!(
                active = tracker.active_connections(),
                "shutdown timeout reached with connections still open"
            );
        }
        tracing::info!("frontend stopped");
        Ok(())
    }
}

async fn bind(addr: &str) -> Result<TcpListener, ServerError> {
    TcpListener::bind(addr)
        .await
        .map_err(|err| ServerError::bind(addr, err))
}

/// Accepts connections until `shutdown` fires, serving each on its own task.
async fn accept_loop<F, Fut>(listener: TcpListener, shutdown: ShutdownSignal, tracker: ConnectionTracker, handle: F)
where
    F: Fn(http::Request<Incoming>, SocketAddr) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, remote_addr)) => {
                    let token = tracker.acquire();
                    let shutdown = shutdown.clone();
                    let handle = handle.clone();
                    tokio::spawn(async move {
                        let service = service_fn(move |request| {
                            let response = handle(request, remote_addr);
                            async move { Ok::<_, Infallible>(response.await) }
                        });
                        let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
                        tokio::pin!(conn);

                        let result = tokio::select! {
                            result = conn.as_mut() => result,
                            () = shutdown.recv() => {
                                conn.as_mut().graceful_shutdown();
                                conn.await
                            }
                        };
                        if let Err(err) = result {
                            tracing::debug!(%remote_addr, error = %err, "connection closed with error");
                        }
                        drop(token);
                    });
                }
                Err(err) => tracing::error!(error = %err, "failed to accept connection"),
            },
            () = shutdown.recv() => break,
        }
    }
}

/// Buffers the body and hands the request to the router, bounded by
/// `timeout`.
async fn dispatch(
    router: &Router,
    request: http::Request<Incoming>,
    remote_addr: SocketAddr,
    timeout: Duration,
) -> Response {
    let work = async {
        let (parts, body) = request.into_parts();
        let bytes: Bytes = match Limited::new(body, TRANSPORT_BODY_CEILING).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => {
                tracing::warn!(%remote_addr, limit = TRANSPORT_BODY_CEILING, "request body over transport ceiling");
                return Response::cloud_error(&CloudError::request_too_large(MAX_REQUEST_BODY_BYTES));
            }
            Err(err) => {
                tracing::warn!(%remote_addr, error = %err, "failed to read request body");
                return Response::cloud_error(&CloudError::invalid_request_content(err));
            }
        };

        let ctx = RequestContext::new()
            .with_remote_addr(remote_addr)
            .with_otel_context(extract_context(&parts.headers));
        router
            .handle(ctx, http::Request::from_parts(parts, Full::new(bytes)))
            .await
    };

    match tokio::time::timeout(timeout, work).await {
        Ok(response) => response,
        Err(_) => {
            tracing::warn!(%remote_addr, ?timeout, "request timed out");
            Response::cloud_error(&CloudError::internal_server_error())
        }
    }
}

fn metrics_response<B>(request: &http::Request<B>) -> Response {
    if request.method() != Method::GET || request.uri().path() != "/metrics" {
        return Response::cloud_error(&CloudError::not_found());
    }
    match render_metrics() {
        Some(body) => {
            let mut response = Response::empty(StatusCode::OK);
            *response.body_mut() = Full::new(Bytes::from(body));
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static(PROMETHEUS_CONTENT_TYPE));
            response
        }
        None => Response::empty(StatusCode::SERVICE_UNAVAILABLE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::Frontend;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    async fn raw_request(addr: SocketAddr, request: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[test]
    fn test_metrics_listener_only_serves_metrics() {
        let request = http::Request::builder().uri("/healthz").body(()).unwrap();
        assert_eq!(metrics_response(&request).status(), StatusCode::NOT_FOUND);

        let request = http::Request::builder().method("POST").uri("/metrics").body(()).unwrap();
        assert_eq!(metrics_response(&request).status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_serves_until_shutdown() {
        let router = Arc::new(Router::new(Arc::new(Frontend::builder().location("westus3").build())));
        let server = Server::new(router, &FrontendConfig::default());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = ShutdownSignal::new();
        let running = tokio::spawn(server.serve(listener, None, shutdown.clone()));

        let health = raw_request(addr, "GET /healthz HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n").await;
        assert!(health.starts_with("HTTP/1.1 200"), "{health}");

        let location = raw_request(addr, "GET /location HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n").await;
        assert!(location.ends_with("westus3"), "{location}");

        let missing = raw_request(addr, "GET /nope HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n").await;
        assert!(missing.starts_with("HTTP/1.1 404"), "{missing}");

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(5), running)
            .await
            .expect("server should stop")
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_oversized_body_goes_through_pipeline() {
        let router = Arc::new(Router::new(Arc::new(Frontend::builder().build())));
        let server = Server::new(router, &FrontendConfig::default());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = ShutdownSignal::new();
        let running = tokio::spawn(server.serve(listener, None, shutdown.clone()));

        let body = " ".repeat(MAX_REQUEST_BODY_BYTES + 1);
        let send = |method: &str| {
            format!(
                "{method} /nope HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            )
        };

        let post = raw_request(addr, &send("POST")).await;
        assert!(post.starts_with("HTTP/1.1 400"), "{post}");
        assert!(post.contains("x-ms-request-id"), "{post}");

        // Only methods that carry a body are size-checked.
        let get = raw_request(addr, &send("GET")).await;
        assert!(get.starts_with("HTTP/1.1 404"), "{get}");
        assert!(get.contains("x-ms-request-id"), "{get}");

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(5), running)
            .await
            .expect("server should stop")
            .unwrap()
            .unwrap();
    }
}
