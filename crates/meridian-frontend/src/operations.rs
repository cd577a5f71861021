//! Asynchronous operation exposure.
//!
//! A mutation commits its operation document first, then exposes it: the
//! document learns its public status ID and the caller's identity, and the
//! response gains the polling headers ARM follows. `PUT` gets only
//! `Azure-AsyncOperation`; `DELETE`, `PATCH` and `POST` also get `Location`
//! pointing at the operation result endpoint.

use crate::frontend::Frontend;
use http::header::{HeaderMap, HeaderValue, LOCATION, REFERER};
use http::{Method, Uri};
use meridian_core::api::{OPERATION_RESULT_TYPE_NAME, OPERATION_STATUS_TYPE_NAME, PROVIDER_NAMESPACE};
use meridian_core::headers::{
    API_VERSION_PARAMETER, ASYNC_NOTIFICATION, ASYNC_NOTIFICATION_URI, ASYNC_OPERATION,
    CLIENT_OBJECT_ID, HOME_TENANT_ID,
};
use meridian_core::{CloudError, OperationDocument, ResourceDocument, ResourceId, ResourceIdError};
use meridian_middleware::stages::query_param;
use meridian_middleware::Request;

/// The status resource ID of operation `name`.
pub fn operation_status_id(
    subscription_id: &str,
    location: &str,
    name: &str,
) -> Result<ResourceId, ResourceIdError> {
    ResourceId::parse(&format!(
        "/subscriptions/{subscription_id}/providers/{PROVIDER_NAMESPACE}/locations/{location}/{OPERATION_STATUS_TYPE_NAME}/{name}"
    ))
}

fn operation_result_path(operation_id: &ResourceId) -> String {
    format!(
        "/subscriptions/{}/providers/{PROVIDER_NAMESPACE}/locations/{}/{OPERATION_RESULT_TYPE_NAME}/{}",
        operation_id.subscription_id(),
        operation_id.location(),
        operation_id.name()
    )
}

/// Builds an absolute URL for `path` on the host the caller used.
///
/// The scheme and authority come from the `Referer` header; the request's
/// `api-version` is carried over.
fn callback_url(request: &Request, path: &str) -> Option<HeaderValue> {
    let referer = request.headers().get(REFERER)?.to_str().ok()?;
    let referer: Uri = match referer.parse() {
        Ok(uri) => uri,
        Err(err) => {
            tracing::error!(%referer, error = %err, "unparseable referer");
            return None;
        }
    };
    let (Some(scheme), Some(authority)) = (referer.scheme_str(), referer.authority()) else {
        tracing::error!(%referer, "referer is not an absolute URL");
        return None;
    };

    let mut url = format!("{scheme}://{authority}{path}");
    if let Some(api_version) = query_param(request.uri(), API_VERSION_PARAMETER) {
        url.push_str(&format!("?{API_VERSION_PARAMETER}={api_version}"));
    }
    HeaderValue::from_str(&url).ok()
}

/// `Azure-AsyncOperation` value for an operation.
pub fn async_operation_url(request: &Request, operation_id: &ResourceId) -> Option<HeaderValue> {
    callback_url(request, &operation_id.to_string())
}

/// `Location` value for an operation.
pub fn location_url(request: &Request, operation_id: &ResourceId) -> Option<HeaderValue> {
    callback_url(request, &operation_result_path(operation_id))
}

fn header_string(request: &Request, name: &http::HeaderName) -> Option<String> {
    request
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// The polling headers for `operation_id`, by request method.
pub fn operation_headers(request: &Request, operation_id: &ResourceId, notify: bool) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if notify {
        headers.insert(ASYNC_NOTIFICATION, HeaderValue::from_static("Enabled"));
    }

    let method = request.method();
    if matches!(*method, Method::DELETE | Method::PATCH | Method::POST) {
        if let Some(location) = location_url(request, operation_id) {
            headers.insert(LOCATION, location);
        }
    }
    if matches!(*method, Method::DELETE | Method::PATCH | Method::POST | Method::PUT) {
        if let Some(status) = async_operation_url(request, operation_id) {
            headers.insert(ASYNC_OPERATION, status);
        }
    }
    headers
}

impl Frontend {
    /// Publishes a committed operation.
    ///
    /// Records the caller's tenant, client and notification URI plus the
    /// public status ID on the operation document, then returns the headers
    /// to add to the response. On failure no headers are returned and the
    /// caller must answer `500`.
    pub async fn expose_operation(
        &self,
        request: &Request,
        operation: &OperationDocument,
    ) -> Result<HeaderMap, CloudError> {
        let subscription_id = operation.external_id.subscription_id();
        let operation_id = operation_status_id(subscription_id, self.location(), &operation.name)
            .map_err(|err| {
                tracing::error!(error = %err, operation = %operation.name, "failed to build operation ID");
                CloudError::internal_server_error()
            })?;

        let tenant_id = header_string(request, &HOME_TENANT_ID);
        let client_id = header_string(request, &CLIENT_OBJECT_ID);
        let notification_uri = header_string(request, &ASYNC_NOTIFICATION_URI);
        let notify = notification_uri.is_some();

        let mut update = |doc: &mut OperationDocument| {
            doc.tenant_id.clone_from(&tenant_id);
            doc.client_id.clone_from(&client_id);
            doc.notification_uri.clone_from(&notification_uri);
            doc.operation_id = Some(operation_id.clone());
            true
        };
        self.store()
            .update_operation(subscription_id, &operation.name, &mut update)
            .await
            .map_err(|err| {
                tracing::error!(error = %err, operation = %operation.name, "failed to expose operation");
                CloudError::internal_server_error()
            })?;

        Ok(operation_headers(request, &operation_id, notify))
    }

    /// Marks the operation currently acting on `resource` as canceled.
    ///
    /// A missing operation is already as good as canceled.
    pub async fn cancel_active_operation(&self, resource: &ResourceDocument) -> Result<(), CloudError> {
        let Some(operation_name) = resource.active_operation_id.as_deref() else {
            return Ok(());
        };

        let subscription_id = resource.resource_id.subscription_id();
        match self
            .store()
            .update_operation(subscription_id, operation_name, &mut OperationDocument::cancel)
            .await
        {
            Ok(true) => {
                tracing::info!(operation = %operation_name, "canceled operation");
                Ok(())
            }
            Ok(false) => Ok(()),
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => {
                tracing::error!(error = %err, operation = %operation_name, "failed to cancel operation");
                Err(CloudError::internal_server_error())
            }
        }
    }
}

/// Whether the caller may see `operation`.
///
/// The operation must have been exposed, and the caller's tenant, client
/// and path subscription must match what was recorded. Mismatches are
/// logged; callers answer them as not found.
pub fn operation_is_visible(request: &Request, path_subscription_id: &str, operation: &OperationDocument) -> bool {
    let Some(operation_id) = &operation.operation_id else {
        tracing::info!(operation = %operation.name, "status request for implicit operation");
        return false;
    };

    let same = |recorded: &Option<String>, header: &http::HeaderName| match recorded {
        Some(expected) => header_string(request, header)
            .is_some_and(|actual| actual.eq_ignore_ascii_case(expected)),
        None => true,
    };

    let mut visible = true;
    if !same(&operation.tenant_id, &HOME_TENANT_ID) {
        tracing::info!(operation = %operation.name, "unauthorized tenant in status request");
        visible = false;
    }
    if !same(&operation.client_id, &CLIENT_OBJECT_ID) {
        tracing::info!(operation = %operation.name, "unauthorized client in status request");
        visible = false;
    }
    if !path_subscription_id.eq_ignore_ascii_case(operation_id.subscription_id()) {
        tracing::info!(
            operation = %operation.name,
            subscription_id = %path_subscription_id,
            "unauthorized subscription in status request"
        );
        visible = false;
    }
    visible
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http_body_util::Full;
    use meridian_core::OperationRequest;

    const SUB: &str = "00000000-0000-0000-0000-000000000000";

    fn request(method: Method, uri: &str) -> Request {
        http::Request::builder()
            .method(method)
            .uri(uri)
            .header(REFERER, format!("https://management.example.com{uri}"))
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    fn exposed_operation() -> OperationDocument {
        let cluster = ResourceId::parse(&format!(
            "/subscriptions/{SUB}/resourceGroups/rg/providers/Microsoft.RedHatOpenShift/hcpOpenShiftClusters/dev"
        ))
        .unwrap();
        let mut doc = OperationDocument::new(OperationRequest::Create, cluster, "internal", None);
        doc.operation_id = Some(operation_status_id(SUB, "eastus", &doc.name).unwrap());
        doc.tenant_id = Some("Tenant-A".to_string());
        doc
    }

    #[test]
    fn test_put_gets_only_async_operation() {
        let op = exposed_operation();
        let id = op.operation_id.clone().unwrap();
        let headers = operation_headers(&request(Method::PUT, "/x?api-version=2024-06-10-preview"), &id, false);

        assert!(headers.get(LOCATION).is_none());
        assert!(headers.get(ASYNC_NOTIFICATION).is_none());
        let status = headers.get(ASYNC_OPERATION).unwrap().to_str().unwrap();
        assert_eq!(
            status,
            format!(
                "https://management.example.com/subscriptions/{SUB}/providers/Microsoft.RedHatOpenShift/locations/eastus/hcpOperationStatuses/{}?api-version=2024-06-10-preview",
                op.name
            )
        );
    }

    #[test]
    fn test_delete_gets_location_and_async_operation() {
        let op = exposed_operation();
        let id = op.operation_id.clone().unwrap();
        let headers = operation_headers(&request(Method::DELETE, "/x"), &id, true);

        assert_eq!(headers.get(ASYNC_NOTIFICATION).unwrap(), "Enabled");
        let location = headers.get(LOCATION).unwrap().to_str().unwrap();
        assert!(location.starts_with("https://management.example.com/subscriptions/"));
        assert!(location.ends_with(&format!("/hcpOperationResults/{}", op.name)));
        assert!(headers.get(ASYNC_OPERATION).is_some());
    }

    #[test]
    fn test_get_gets_no_callback_headers() {
        let op = exposed_operation();
        let id = op.operation_id.clone().unwrap();
        assert!(operation_headers(&request(Method::GET, "/x"), &id, false).is_empty());
    }

    #[test]
    fn test_relative_referer_yields_no_url() {
        let op = exposed_operation();
        let mut req = request(Method::PUT, "/x");
        req.headers_mut().insert(REFERER, HeaderValue::from_static("/relative/path"));
        assert!(async_operation_url(&req, op.operation_id.as_ref().unwrap()).is_none());
    }

    #[test]
    fn test_visibility() {
        let op = exposed_operation();
        let mut req = request(Method::GET, "/x");
        assert!(!operation_is_visible(&req, SUB, &op), "tenant header missing");

        req.headers_mut().insert(HOME_TENANT_ID, HeaderValue::from_static("tenant-a"));
        assert!(operation_is_visible(&req, SUB, &op));
        assert!(!operation_is_visible(&req, "11111111-1111-1111-1111-111111111111", &op));

        let mut implicit = op.clone();
        implicit.operation_id = None;
        assert!(!operation_is_visible(&req, SUB, &implicit));
    }

    #[test]
    fn test_visibility_requires_recording_client() {
        let mut op = exposed_operation();
        op.client_id = Some("C1".to_string());

        let mut req = request(Method::GET, "/x");
        req.headers_mut().insert(HOME_TENANT_ID, HeaderValue::from_static("Tenant-A"));
        assert!(!operation_is_visible(&req, SUB, &op), "client header missing");

        req.headers_mut().insert(CLIENT_OBJECT_ID, HeaderValue::from_static("C2"));
        assert!(!operation_is_visible(&req, SUB, &op));

        req.headers_mut().insert(CLIENT_OBJECT_ID, HeaderValue::from_static("c1"));
        assert!(operation_is_visible(&req, SUB, &op));
    }
}
