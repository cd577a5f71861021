//! # Meridian Middleware
//!
//! The request pipeline of the Meridian frontend.
//!
//! Every request runs through a fixed pre-dispatch pipeline ending in the
//! router, then through the matched route group's post-dispatch pipeline
//! ending in the endpoint handler.
//!
//! ```text
//! Panic → Referer → Metrics → Correlation → Audit → Tracing → Lowercase →
//! Logging → Panic → Body → SystemData → ValidateStatic → Mux
//!                                                         ↓
//!          route group stages (ResourceId, LoggingPostMux, ApiVersion,
//!          SubscriptionState, Lock) → Handler
//! ```
//!
//! Stages share state through a [`RequestContext`] passed by `&mut`
//! alongside the request. Any stage may answer the request itself by
//! returning without running [`Next`].
//!
//! ## Example
//!
//! ```
//! use meridian_middleware::stages::{CorrelationMiddleware, LowercaseMiddleware};
//! use meridian_middleware::Pipeline;
//!
//! let pipeline = Pipeline::builder()
//!     .stage(CorrelationMiddleware::new())
//!     .stage(LowercaseMiddleware::new())
//!     .build();
//!
//! assert_eq!(pipeline.stage_names(), vec!["correlation", "lowercase"]);
//! ```

#![doc(html_root_url = "https://docs.rs/meridian-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod audit;
pub mod context;
pub mod middleware;
pub mod pipeline;
pub mod stages;
pub mod types;

#[cfg(test)]
mod test_util;

pub use audit::{AuditError, AuditOutcome, AuditRecord, AuditSink, CallerIdentity, MemoryAuditSink, TracingAuditSink};
pub use context::{PathParams, RequestContext};
pub use middleware::{BoxFuture, Handler, Middleware, Next};
pub use pipeline::{BoxedMiddleware, Pipeline, PipelineBuilder};
pub use types::{Request, Response, ResponseExt};
