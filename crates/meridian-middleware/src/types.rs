//! Request and response types used throughout the pipeline.

use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::StatusCode;
use http_body_util::Full;
use meridian_core::headers;
use meridian_core::CloudError;
use serde::Serialize;

/// The HTTP request type used in the pipeline.
pub type Request = http::Request<Full<Bytes>>;

/// The HTTP response type used in the pipeline.
pub type Response = http::Response<Full<Bytes>>;

const APPLICATION_JSON: HeaderValue = HeaderValue::from_static("application/json");

/// Constructors for the response shapes the frontend emits.
pub trait ResponseExt {
    /// An ARM error envelope with the `x-ms-error-code` header.
    fn cloud_error(error: &CloudError) -> Response;

    /// A JSON body. Serialization failure yields a 500 error envelope.
    fn json<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> Response;

    /// An empty body.
    fn empty(status: StatusCode) -> Response;

    /// Length of a fully buffered body.
    fn body_len(&self) -> u64;
}

impl ResponseExt for Response {
    fn cloud_error(error: &CloudError) -> Response {
        let mut response = http::Response::new(Full::new(Bytes::from(error.to_json())));
        *response.status_mut() = error.status();
        response.headers_mut().insert(CONTENT_TYPE, APPLICATION_JSON);
        if let Ok(code) = HeaderValue::from_str(&error.body().code) {
            response.headers_mut().insert(headers::ERROR_CODE, code);
        }
        response
    }

    fn json<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> Response {
        match serde_json::to_vec(value) {
            Ok(body) => {
                let mut response = http::Response::new(Full::new(Bytes::from(body)));
                *response.status_mut() = status;
                response.headers_mut().insert(CONTENT_TYPE, APPLICATION_JSON);
                response
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to serialize response body");
                Self::cloud_error(&CloudError::internal_server_error())
            }
        }
    }

    fn empty(status: StatusCode) -> Response {
        let mut response = http::Response::new(Full::new(Bytes::new()));
        *response.status_mut() = status;
        response
    }

    fn body_len(&self) -> u64 {
        http_body::Body::size_hint(self.body()).exact().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cloud_error_response() {
        let response = Response::cloud_error(&CloudError::not_found());
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers().get(CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(response.headers().get(headers::ERROR_CODE).unwrap(), "NotFound");
        assert!(response.body_len() > 0);
    }

    #[test]
    fn test_json_response() {
        let response = Response::json(StatusCode::OK, &serde_json::json!({"value": []}));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body_len(), br#"{"value":[]}"#.len() as u64);
    }

    #[test]
    fn test_empty_response() {
        let response = Response::empty(StatusCode::NO_CONTENT);
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.body_len(), 0);
    }
}
