//! Path lowercasing.
//!
//! Routes are matched against the lowercased path. The verbatim path is kept
//! in the context because resource IDs echoed back to callers preserve the
//! caller's casing.

use crate::context::RequestContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response};
use http::uri::{PathAndQuery, Uri};

/// Lowercases the request path, leaving the query untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct LowercaseMiddleware;

impl LowercaseMiddleware {
    /// Creates the stage.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

/// Returns `uri` with its path lowercased, or `None` if nothing changes.
pub(crate) fn lowercase_path(uri: &Uri) -> Option<Uri> {
    let path = uri.path();
    if !path.bytes().any(|b| b.is_ascii_uppercase()) {
        return None;
    }

    let lowered = path.to_ascii_lowercase();
    let path_and_query = match uri.query() {
        Some(query) => format!("{lowered}?{query}"),
        None => lowered,
    };

    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(PathAndQuery::try_from(path_and_query).ok()?);
    Uri::from_parts(parts).ok()
}

impl Middleware for LowercaseMiddleware {
    fn name(&self) -> &'static str {
        "lowercase"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        mut request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            ctx.set_original_path(request.uri().path());
            if let Some(uri) = lowercase_path(request.uri()) {
                *request.uri_mut() = uri;
            }
            next.run(ctx, request).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_preserved() {
        let uri: Uri = "/Subscriptions/ABC/resourceGroups/RG?api-version=2024-06-10-Preview"
            .parse()
            .unwrap();
        let lowered = lowercase_path(&uri).unwrap();
        assert_eq!(lowered.path(), "/subscriptions/abc/resourcegroups/rg");
        assert_eq!(lowered.query(), Some("api-version=2024-06-10-Preview"));
    }

    #[test]
    fn test_already_lowercase() {
        let uri: Uri = "/subscriptions/abc?X=Y".parse().unwrap();
        assert!(lowercase_path(&uri).is_none());
    }

    #[test]
    fn test_absolute_form_keeps_authority() {
        let uri: Uri = "https://Host.Example/A/B".parse().unwrap();
        let lowered = lowercase_path(&uri).unwrap();
        assert_eq!(lowered.path(), "/a/b");
        assert_eq!(lowered.authority().unwrap().as_str(), "Host.Example");
    }
}
