//! The full pre-dispatch pipeline with a recording terminal.

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Method, StatusCode};
use http_body_util::Full;
use meridian_core::api::MAX_REQUEST_BODY_BYTES;
use meridian_core::headers;
use meridian_middleware::stages::{
    AuditMiddleware, BodyMiddleware, CorrelationMiddleware, LoggingMiddleware, LowercaseMiddleware,
    MetricsMiddleware, PanicMiddleware, RefererMiddleware, SystemDataMiddleware, TracingMiddleware,
    ValidateStaticMiddleware,
};
use meridian_middleware::{
    AuditOutcome, BoxFuture, Handler, MemoryAuditSink, Pipeline, Request, RequestContext, Response,
    ResponseExt,
};
use parking_lot::Mutex;
use proptest::prelude::*;
use std::sync::Arc;

const CLUSTER: &str = "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/MyRG/providers/Microsoft.RedHatOpenShift/hcpOpenShiftClusters/MyCluster";

fn pre_dispatch(sink: Arc<MemoryAuditSink>) -> Pipeline {
    Pipeline::builder()
        .stage(PanicMiddleware::new())
        .stage(RefererMiddleware::new())
        .stage(MetricsMiddleware::new())
        .stage(CorrelationMiddleware::new())
        .stage(AuditMiddleware::new(sink))
        .stage(TracingMiddleware::new())
        .stage(LowercaseMiddleware::new())
        .stage(LoggingMiddleware::new())
        .stage(PanicMiddleware::new())
        .stage(BodyMiddleware::new())
        .stage(SystemDataMiddleware::new())
        .stage(ValidateStaticMiddleware::new())
        .build()
}

/// What the terminal saw.
#[derive(Debug, Default, Clone)]
struct Seen {
    routed_path: String,
    query: Option<String>,
    original_path: Option<String>,
    body_len: Option<usize>,
    referer: Option<String>,
}

#[derive(Default)]
struct Recorder {
    seen: Mutex<Option<Seen>>,
}

impl Recorder {
    fn seen(&self) -> Option<Seen> {
        self.seen.lock().clone()
    }
}

impl Handler for Recorder {
    fn call<'a>(&'a self, ctx: &'a mut RequestContext, request: Request) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            *self.seen.lock() = Some(Seen {
                routed_path: request.uri().path().to_string(),
                query: request.uri().query().map(str::to_string),
                original_path: ctx.original_path().map(str::to_string),
                body_len: ctx.body().map(Bytes::len),
                referer: request
                    .headers()
                    .get(http::header::REFERER)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string),
            });
            Response::empty(StatusCode::OK)
        })
    }
}

fn build(method: Method, uri: &str, body: Vec<u8>, content_type: Option<&'static str>) -> Request {
    let mut builder = http::Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::HOST, "rp.example.com");
    if let Some(content_type) = content_type {
        builder = builder.header(CONTENT_TYPE, content_type);
    }
    builder.body(Full::new(Bytes::from(body))).unwrap()
}

async fn run(request: Request) -> (Response, Recorder, Arc<MemoryAuditSink>) {
    let sink = Arc::new(MemoryAuditSink::new());
    let recorder = Recorder::default();
    let mut ctx = RequestContext::new();
    let response = pre_dispatch(sink.clone())
        .process(&mut ctx, request, &recorder)
        .await;
    (response, recorder, sink)
}

#[tokio::test]
async fn test_path_is_lowercased_and_original_kept() {
    let (response, recorder, _) =
        run(build(Method::GET, &format!("{CLUSTER}?api-version=2024-06-10-preview"), vec![], None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let seen = recorder.seen().unwrap();
    assert_eq!(seen.routed_path, CLUSTER.to_lowercase());
    assert_eq!(seen.original_path.as_deref(), Some(CLUSTER));
    assert_eq!(seen.query.as_deref(), Some("api-version=2024-06-10-preview"));
    assert_eq!(
        seen.referer.as_deref(),
        Some(format!("https://rp.example.com{CLUSTER}?api-version=2024-06-10-preview").as_str())
    );
}

#[tokio::test]
async fn test_request_id_always_set_client_id_on_request() {
    let mut request = build(Method::GET, CLUSTER, vec![], None);
    request
        .headers_mut()
        .insert(headers::CLIENT_REQUEST_ID, HeaderValue::from_static("client-abc"));
    let (response, _, _) = run(request).await;
    assert!(response.headers().contains_key(headers::REQUEST_ID));
    assert!(!response.headers().contains_key(headers::CLIENT_REQUEST_ID));

    let mut request = build(Method::GET, CLUSTER, vec![], None);
    request
        .headers_mut()
        .insert(headers::CLIENT_REQUEST_ID, HeaderValue::from_static("client-abc"));
    request
        .headers_mut()
        .insert(headers::RETURN_CLIENT_REQUEST_ID, HeaderValue::from_static("True"));
    let (response, _, _) = run(request).await;
    assert_eq!(
        response.headers().get(headers::CLIENT_REQUEST_ID).unwrap(),
        "client-abc"
    );
}

#[tokio::test]
async fn test_body_cap_is_inclusive() {
    let (response, recorder, _) = run(build(
        Method::PUT,
        CLUSTER,
        vec![b' '; MAX_REQUEST_BODY_BYTES],
        Some("application/json"),
    ))
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(recorder.seen().unwrap().body_len, Some(MAX_REQUEST_BODY_BYTES));

    let (response, recorder, _) = run(build(
        Method::PUT,
        CLUSTER,
        vec![b' '; MAX_REQUEST_BODY_BYTES + 1],
        Some("application/json"),
    ))
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.headers().get(headers::ERROR_CODE).unwrap(), "InvalidResource");
    assert!(recorder.seen().is_none());
}

#[tokio::test]
async fn test_media_type_matrix() {
    let cases: [(Method, &[u8], Option<&'static str>, StatusCode); 6] = [
        (Method::PUT, b"{}", Some("application/json"), StatusCode::OK),
        (Method::PATCH, b"{}", Some("application/json; charset=utf-8"), StatusCode::OK),
        (Method::POST, b"", None, StatusCode::OK),
        (Method::PUT, b"{}", Some("text/plain"), StatusCode::UNSUPPORTED_MEDIA_TYPE),
        (Method::POST, b"{}", None, StatusCode::UNSUPPORTED_MEDIA_TYPE),
        (Method::GET, b"", Some("text/plain"), StatusCode::OK),
    ];

    for (method, body, content_type, expected) in cases {
        let label = format!("{method} {content_type:?}");
        let (response, _, _) = run(build(method, CLUSTER, body.to_vec(), content_type)).await;
        assert_eq!(response.status(), expected, "{label}");
    }
}

#[tokio::test]
async fn test_static_validation_rejects_before_handler() {
    let (response, recorder, sink) = run(build(
        Method::GET,
        "/subscriptions/not-a-uuid/resourceGroups/rg",
        vec![],
        None,
    ))
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.headers().get(headers::ERROR_CODE).unwrap(),
        "InvalidSubscriptionID"
    );
    assert!(recorder.seen().is_none());

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].outcome,
        AuditOutcome::Failure {
            description: "Status code: 400".into()
        }
    );
    assert_eq!(
        records[0].operation_name,
        "GET /subscriptions/not-a-uuid/resourceGroups/rg"
    );
}

#[tokio::test]
async fn test_audit_records_success() {
    let (_, _, sink) = run(build(Method::GET, CLUSTER, vec![], None)).await;
    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].outcome, AuditOutcome::Success);
}

fn path_strategy() -> impl Strategy<Value = String> {
    proptest::collection::vec("[A-Za-z0-9._-]{1,12}", 1..6).prop_map(|segments| {
        segments
            .iter()
            .map(|s| format!("/{s}"))
            .collect::<String>()
    })
}

proptest! {
    #[test]
    fn test_lowercase_round_trip(path in path_strategy(), query in "[A-Za-z0-9=&-]{0,16}") {
        let uri = if query.is_empty() { path.clone() } else { format!("{path}?{query}") };
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();

        let recorder = Recorder::default();
        let mut ctx = RequestContext::new();
        let pipeline = Pipeline::builder().stage(LowercaseMiddleware::new()).build();
        runtime.block_on(pipeline.process(&mut ctx, build(Method::GET, &uri, vec![], None), &recorder));

        let seen = recorder.seen().unwrap();
        prop_assert_eq!(seen.routed_path, path.to_ascii_lowercase());
        prop_assert_eq!(ctx.original_path(), Some(path.as_str()));
        let expected_query = if query.is_empty() { None } else { Some(query.clone()) };
        prop_assert_eq!(seen.query, expected_query);
    }
}
