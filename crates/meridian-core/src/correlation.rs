//! Correlation identifiers carried by every request.

use crate::headers;
use http::HeaderMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request identifiers used to stitch logs and traces together.
///
/// The request ID is always generated by the server. The client request ID
/// and correlation request ID are passed through verbatim from the caller and
/// default to empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationData {
    /// Server-generated request ID.
    pub request_id: Uuid,
    /// `x-ms-client-request-id`, verbatim.
    pub client_request_id: String,
    /// `x-ms-correlation-request-id`, verbatim.
    pub correlation_request_id: String,
}

impl CorrelationData {
    /// Extracts correlation data from request headers with a fresh request ID.
    pub fn from_headers(map: &HeaderMap) -> Self {
        Self {
            request_id: Uuid::now_v7(),
            client_request_id: header_string(map, &headers::CLIENT_REQUEST_ID),
            correlation_request_id: header_string(map, &headers::CORRELATION_REQUEST_ID),
        }
    }
}

fn header_string(map: &HeaderMap, name: &http::HeaderName) -> String {
    map.get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn test_from_headers() {
        let mut map = HeaderMap::new();
        map.insert(headers::CLIENT_REQUEST_ID, HeaderValue::from_static("client-1"));
        map.insert(headers::CORRELATION_REQUEST_ID, HeaderValue::from_static("corr-1"));

        let data = CorrelationData::from_headers(&map);
        assert_eq!(data.client_request_id, "client-1");
        assert_eq!(data.correlation_request_id, "corr-1");
        assert_ne!(data.request_id, Uuid::nil());
    }

    #[test]
    fn test_missing_and_malformed_default_to_empty() {
        let mut map = HeaderMap::new();
        map.insert(
            headers::CLIENT_REQUEST_ID,
            HeaderValue::from_bytes(b"\xff\xfe").unwrap(),
        );

        let data = CorrelationData::from_headers(&map);
        assert_eq!(data.client_request_id, "");
        assert_eq!(data.correlation_request_id, "");
    }

    #[test]
    fn test_request_id_is_unique() {
        let map = HeaderMap::new();
        assert_ne!(
            CorrelationData::from_headers(&map).request_id,
            CorrelationData::from_headers(&map).request_id
        );
    }
}
