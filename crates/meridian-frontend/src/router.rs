//! Request routing.
//!
//! Routing happens in two stages:
//!
//! 1. The [`Router`] answers `/healthz` and `/location` directly and sends
//!    everything else through the pre-dispatch pipeline, whose handler is
//!    the [`Mux`].
//! 2. The mux picks the route by method and most specific pattern on the
//!    lowercased path, records the path parameters and pattern in the
//!    context, and runs the route group's post-dispatch pipeline in front of
//!    the endpoint.
//!
//! Patterns are lowercase and use `{name}` for parameters:
//!
//! ```
//! use meridian_frontend::router::RoutePattern;
//!
//! let pattern = RoutePattern::new("/subscriptions/{subscriptionid}");
//! let params = pattern.match_path("/subscriptions/abc").unwrap();
//! assert_eq!(params.get("subscriptionid").map(String::as_str), Some("abc"));
//! assert!(pattern.match_path("/subscriptions/abc/resourcegroups").is_none());
//! ```

use crate::frontend::Frontend;
use crate::handlers::{Endpoint, EndpointHandler};
use crate::routes;
use bytes::Bytes;
use http::{Method, StatusCode};
use meridian_core::CloudError;
use meridian_middleware::{BoxFuture, Handler, PathParams, Pipeline, Request, RequestContext, Response, ResponseExt};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// A parsed route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    raw: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    /// Parses `pattern`. Literal segments are lowercased.
    pub fn new(pattern: &str) -> Self {
        let segments = pattern
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| match s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Some(name) => Segment::Param(name.to_ascii_lowercase()),
                None => Segment::Literal(s.to_ascii_lowercase()),
            })
            .collect::<Vec<_>>();
        let raw = segments
            .iter()
            .map(|segment| match segment {
                Segment::Literal(value) => value.clone(),
                Segment::Param(name) => format!("{{{name}}}"),
            })
            .fold(String::new(), |mut raw, segment| {
                raw.push('/');
                raw.push_str(&segment);
                raw
            });

        Self { raw, segments }
    }

    /// The normalized pattern text.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Number of literal segments; more means more specific.
    pub fn specificity(&self) -> usize {
        self.segments
            .iter()
            .filter(|segment| matches!(segment, Segment::Literal(_)))
            .count()
    }

    /// Matches an already lowercased path, returning captured parameters.
    pub fn match_path(&self, path: &str) -> Option<PathParams> {
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = PathParams::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(expected) if expected == part => {}
                Segment::Literal(_) => return None,
                Segment::Param(name) => {
                    params.insert(name.clone(), part.to_string());
                }
            }
        }
        Some(params)
    }
}

/// A registered route.
#[derive(Debug, Clone)]
pub struct Route {
    method: Method,
    pattern: RoutePattern,
    endpoint: Endpoint,
    pipeline: Arc<Pipeline>,
}

impl Route {
    /// Creates a route running `pipeline` before `endpoint`.
    pub fn new(method: Method, pattern: &str, endpoint: Endpoint, pipeline: Arc<Pipeline>) -> Self {
        Self {
            method,
            pattern: RoutePattern::new(pattern),
            endpoint,
            pipeline,
        }
    }

    /// The route's method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The route's pattern.
    pub fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }

    /// The endpoint invoked after the route's stages.
    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    /// Stage names of the route's post-dispatch pipeline.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.pipeline.stage_names()
    }
}

/// A matched route with its captured parameters.
#[derive(Debug)]
pub struct RouteMatch<'a> {
    route: &'a Route,
    params: PathParams,
}

impl<'a> RouteMatch<'a> {
    /// The matched route.
    pub fn route(&self) -> &'a Route {
        self.route
    }

    /// Captured path parameters.
    pub fn params(&self) -> &PathParams {
        &self.params
    }
}

/// The route table, terminal handler of the pre-dispatch pipeline.
pub struct Mux {
    frontend: Arc<Frontend>,
    routes: Vec<Route>,
}

impl Mux {
    /// Creates an empty mux.
    pub fn new(frontend: Arc<Frontend>) -> Self {
        Self {
            frontend,
            routes: Vec::new(),
        }
    }

    /// Registers a route.
    pub fn add(&mut self, route: Route) -> &mut Self {
        self.routes.push(route);
        self
    }

    /// Number of registered routes.
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// The most specific route for `method` and lowercased `path`. Among
    /// equally specific routes the first registered wins.
    pub fn match_route(&self, method: &Method, path: &str) -> Option<RouteMatch<'_>> {
        let mut best: Option<RouteMatch<'_>> = None;
        for route in self.routes.iter().filter(|route| route.method == *method) {
            let Some(params) = route.pattern.match_path(path) else {
                continue;
            };
            let better = best
                .as_ref()
                .map_or(true, |current| route.pattern.specificity() > current.route.pattern.specificity());
            if better {
                best = Some(RouteMatch { route, params });
            }
        }
        best
    }
}

impl std::fmt::Debug for Mux {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mux")
            .field("routes", &self.routes.len())
            .finish_non_exhaustive()
    }
}

impl Handler for Mux {
    fn call<'a>(&'a self, ctx: &'a mut RequestContext, request: Request) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let Some(matched) = self.match_route(request.method(), request.uri().path()) else {
                tracing::debug!(method = %request.method(), path = %request.uri().path(), "no route matched");
                return Response::cloud_error(&CloudError::not_found());
            };

            let route = matched.route;
            ctx.set_route_pattern(route.pattern.as_str());
            ctx.set_path_params(matched.params);

            let endpoint = EndpointHandler::new(&self.frontend, route.endpoint);
            route.pipeline.process(ctx, request, &endpoint).await
        })
    }
}

/// The complete request path of the frontend.
#[derive(Debug)]
pub struct Router {
    frontend: Arc<Frontend>,
    pre_dispatch: Pipeline,
    mux: Mux,
}

impl Router {
    /// Builds the pre-dispatch pipeline and the route table for `frontend`.
    pub fn new(frontend: Arc<Frontend>) -> Self {
        Self {
            pre_dispatch: routes::pre_dispatch_pipeline(&frontend),
            mux: routes::route_table(&frontend),
            frontend,
        }
    }

    /// The frontend the router dispatches to.
    pub fn frontend(&self) -> &Arc<Frontend> {
        &self.frontend
    }

    /// The pre-dispatch pipeline.
    pub fn pre_dispatch(&self) -> &Pipeline {
        &self.pre_dispatch
    }

    /// The route table.
    pub fn mux(&self) -> &Mux {
        &self.mux
    }

    /// Answers one request.
    pub async fn handle(&self, mut ctx: RequestContext, request: Request) -> Response {
        if request.method() == Method::GET {
            match request.uri().path() {
                "/healthz" => return Response::empty(StatusCode::OK),
                "/location" => {
                    let mut response = Response::empty(StatusCode::OK);
                    *response.body_mut() = Bytes::from(self.frontend.location().to_string()).into();
                    return response;
                }
                _ => {}
            }
        }

        self.pre_dispatch.process(&mut ctx, request, &self.mux).await
    }
}
