//! Structured logging through `tracing-subscriber`.
//!
//! The logging stage records request identity (`request_id`,
//! `correlation_request_id`, `subscription_id`) on a `request` span. JSON
//! output carries the current span, so every line inside a request is
//! attributable.

use crate::TelemetryResult;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

/// Line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogOutput {
    /// One JSON object per line.
    #[default]
    Json,
    /// Multi-line, human-readable.
    Pretty,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Install a subscriber at all.
    pub enabled: bool,
    /// `EnvFilter` directive, e.g. `info` or `meridian_frontend=debug,info`.
    pub level: String,
    /// Line format.
    pub output: LogOutput,
    /// Emit an event with timings when a span closes.
    pub span_timings: bool,
    /// Include file and line of the call site.
    pub source_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            output: LogOutput::Json,
            span_timings: false,
            source_location: false,
        }
    }
}

impl LogConfig {
    /// Pretty debug output with span timings and call sites.
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            output: LogOutput::Pretty,
            span_timings: true,
            source_location: true,
            ..Self::default()
        }
    }

    fn filter(&self) -> TelemetryResult<EnvFilter> {
        Ok(EnvFilter::try_new(&self.level)?)
    }

    fn span_events(&self) -> FmtSpan {
        if self.span_timings {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }
}

/// Installs the global log subscriber. A disabled config installs nothing.
///
/// # Errors
///
/// Fails on an unparsable filter directive or when a global subscriber is
/// already set.
pub fn init_logging(config: &LogConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let filter = config.filter()?;
    let layer: Box<dyn Layer<Registry> + Send + Sync> = match config.output {
        LogOutput::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_span_events(config.span_events())
            .with_file(config.source_location)
            .with_line_number(config.source_location)
            .boxed(),
        LogOutput::Pretty => fmt::layer()
            .pretty()
            .with_span_events(config.span_events())
            .with_file(config.source_location)
            .with_line_number(config.source_location)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(layer.with_filter(filter))
        .try_init()?;
    Ok(())
}
