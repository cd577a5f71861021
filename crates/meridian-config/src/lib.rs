//! Typed configuration for the Meridian frontend.
//!
//! [`FrontendConfig`] is assembled by [`ConfigLoader`] from defaults, a TOML
//! or JSON file, an optional `.env` file and `MERIDIAN__SECTION__KEY`
//! environment variables, then validated.
//!
//! ```toml
//! [server]
//! listen_addr = "0.0.0.0:8443"
//! metrics_addr = "0.0.0.0:8081"
//! location = "eastus"
//!
//! [lock]
//! ttl_secs = 10
//! retry_interval_ms = 1000
//!
//! [api]
//! versions = ["2024-06-10-preview"]
//!
//! [audit]
//! enabled = true
//!
//! [telemetry.logging]
//! level = "info"
//! format = "json"
//! ```

#![doc(html_root_url = "https://docs.rs/meridian-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::FrontendConfig;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::{
    ApiConfig, AuditConfig, LockConfig, LogFormat, LoggingConfig, MetricsConfig, ServerConfig,
    TelemetrySection, TracingConfig,
};
