use crate::context::RequestContext;
use crate::middleware::{BoxFuture, Handler};
use crate::types::{Request, Response, ResponseExt};
use bytes::Bytes;
use http::StatusCode;
use http_body_util::Full;

pub fn create_test_request(method: &str, uri: &str) -> Request {
    http::Request::builder()
        .method(method)
        .uri(uri)
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// Responds with a fixed status.
pub struct StatusHandler(pub StatusCode);

impl Handler for StatusHandler {
    fn call<'a>(&'a self, _ctx: &'a mut RequestContext, _request: Request) -> BoxFuture<'a, Response> {
        Box::pin(async move { Response::empty(self.0) })
    }
}

/// Panics when called.
pub struct PanicHandler;

impl Handler for PanicHandler {
    fn call<'a>(&'a self, _ctx: &'a mut RequestContext, _request: Request) -> BoxFuture<'a, Response> {
        Box::pin(async move { panic!("handler exploded") })
    }
}
