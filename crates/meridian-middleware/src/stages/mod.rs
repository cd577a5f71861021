//! Middleware stages.
//!
//! ## Pre-dispatch (every request)
//!
//! 1. [`panic`] - panic containment
//! 2. [`referer`] - synthesize `Referer`
//! 3. [`metrics`] - request counters and latency
//! 4. [`correlation`] - request/client/correlation IDs
//! 5. [`audit`] - audit record per request
//! 6. [`trace`] - OpenTelemetry server span
//! 7. [`lowercase`] - lowercase the routed path
//! 8. [`logging`] - per-request span and access log
//! 9. [`panic`] again, inside the logging span
//! 10. [`body`] - body size and media type
//! 11. [`system_data`] - ARM system data header
//! 12. [`validate_static`] - path segment naming rules
//!
//! ## Post-dispatch (per route group)
//!
//! [`resource_id`], [`logging`] (post-mux), [`api_version`],
//! [`subscription_state`] and [`lock`].

pub mod api_version;
pub mod audit;
pub mod body;
pub mod correlation;
pub mod lock;
pub mod logging;
pub mod lowercase;
pub mod metrics;
pub mod panic;
pub mod referer;
pub mod resource_id;
pub mod subscription_state;
pub mod system_data;
pub mod trace;
pub mod validate_static;

pub use api_version::{query_param, ApiVersionMiddleware};
pub use audit::AuditMiddleware;
pub use body::BodyMiddleware;
pub use correlation::{correlation_attributes, CorrelationMiddleware};
pub use lock::LockMiddleware;
pub use logging::{
    LoggingMiddleware, LoggingPostMuxMiddleware, RESOURCE_GROUP_PARAM, RESOURCE_NAME_PARAM,
    SUBSCRIPTION_ID_PARAM,
};
pub use lowercase::LowercaseMiddleware;
pub use metrics::MetricsMiddleware;
pub use panic::PanicMiddleware;
pub use referer::RefererMiddleware;
pub use resource_id::ResourceIdMiddleware;
pub use subscription_state::{check_subscription_state, SubscriptionStateMiddleware};
pub use system_data::SystemDataMiddleware;
pub use trace::TracingMiddleware;
pub use validate_static::ValidateStaticMiddleware;
