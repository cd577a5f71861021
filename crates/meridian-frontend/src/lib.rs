//! # Meridian Frontend
//!
//! The ARM-facing HTTP frontend of the Meridian managed-cluster resource
//! provider.
//!
//! - [`Router`] - pre-dispatch pipeline, route table and endpoint handlers
//! - [`Frontend`] - the injected store, lock table, cluster service and
//!   audit sink every handler works against
//! - [`Server`] - API and metrics listeners with graceful shutdown
//! - [`operations`] - exposing long-running operations to pollers
//!
//! ## Example
//!
//! ```
//! use bytes::Bytes;
//! use http::StatusCode;
//! use http_body_util::Full;
//! use meridian_frontend::{Frontend, Router};
//! use meridian_middleware::RequestContext;
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let router = Router::new(Arc::new(Frontend::builder().build()));
//! let request = http::Request::get("/healthz").body(Full::new(Bytes::new())).unwrap();
//! let response = router.handle(RequestContext::new(), request).await;
//! assert_eq!(response.status(), StatusCode::OK);
//! # });
//! ```

#![doc(html_root_url = "https://docs.rs/meridian-frontend/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod cluster_service;
pub mod error;
mod frontend;
pub mod handlers;
pub mod operations;
pub mod router;
mod routes;
mod server;
mod shutdown;

pub use cluster_service::{ClusterService, ClusterServiceResult, MemoryClusterService, OpenShiftVersion};
pub use error::{ClusterServiceError, ServerError};
pub use frontend::{Frontend, FrontendBuilder};
pub use handlers::{Endpoint, ResourceView};
pub use router::{Mux, Route, RouteMatch, RoutePattern, Router};
pub use server::Server;
pub use shutdown::{ConnectionToken, ConnectionTracker, ShutdownSignal};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
