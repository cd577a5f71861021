//! Layered configuration loading.

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use crate::{ConfigError, FrontendConfig, LogFormat};

/// Configuration loader.
///
/// Layers apply in order, later ones overriding earlier ones:
/// 1. Built-in defaults (or the development preset)
/// 2. A TOML or JSON file
/// 3. A `.env` file, which only seeds the process environment
/// 4. `PREFIX__SECTION__KEY` environment variables
///
/// ```no_run
/// use meridian_config::ConfigLoader;
///
/// # fn main() -> Result<(), meridian_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_optional_file("frontend.toml")?
///     .with_dotenv()?
///     .with_env_prefix("MERIDIAN")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config: FrontendConfig,
    env_prefix: Option<String>,
}

/// Supported file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Toml,
    Json,
}

impl FromStr for Format {
    type Err = ConfigError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.to_ascii_lowercase().as_str() {
            "toml" => Ok(Self::Toml),
            "json" => Ok(Self::Json),
            _ => Err(ConfigError::UnsupportedFormat(name.to_string())),
        }
    }
}

impl Format {
    fn of(path: &Path) -> Result<Self, ConfigError> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
            .parse()
    }

    fn parse(self, content: &str) -> Result<FrontendConfig, ConfigError> {
        Ok(match self {
            Self::Toml => toml::from_str(content)?,
            Self::Json => serde_json::from_str(content)?,
        })
    }
}

impl ConfigLoader {
    /// Creates a loader seeded with production defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts over from the development preset.
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = FrontendConfig::development();
        self
    }

    /// Replaces the configuration with a file's content. The format follows
    /// the extension.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let format = Format::of(path)?;
        let content = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ConfigError::MissingFile(path.to_path_buf())
            } else {
                ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        self.config = format.parse(&content)?;
        Ok(self)
    }

    /// Like [`with_file`](Self::with_file), but a missing file is skipped.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Replaces the configuration with `content` in `format` (`toml` or
    /// `json`).
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = format.parse::<Format>()?.parse(content)?;
        Ok(self)
    }

    /// Enables environment overrides under `prefix`.
    ///
    /// With prefix `MERIDIAN`, `MERIDIAN__LOCK__TTL_SECS=30` sets
    /// `lock.ttl_secs`.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_ascii_uppercase());
        self
    }

    /// Seeds the environment from `.env` in the working directory, if any.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Err(source) if !source.not_found() => Err(ConfigError::Dotenv {
                path: ".env".into(),
                source,
            }),
            _ => Ok(self),
        }
    }

    /// Seeds the environment from a specific dotenv file.
    pub fn with_dotenv_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        dotenvy::from_path(path).map_err(|source| ConfigError::Dotenv {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(self)
    }

    /// Applies environment overrides, then validates.
    pub fn load(mut self) -> Result<FrontendConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            let marker = format!("{prefix}__");
            let overrides: BTreeMap<String, String> = std::env::vars()
                .filter(|(var, _)| var.starts_with(&marker))
                .collect();
            for (var, value) in &overrides {
                let path: Vec<&str> = var[marker.len()..].split("__").collect();
                apply_override(&mut self.config, &path, var, value)?;
            }
        }

        self.config.validate()?;
        Ok(self.config)
    }

    /// The configuration as layered so far, without environment overrides
    /// or validation.
    #[must_use]
    pub fn load_unvalidated(self) -> FrontendConfig {
        self.config
    }
}

fn parsed<T: FromStr>(var: &str, value: &str, expected: &'static str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::env_value(var, value, expected))
}

fn flag(var: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::env_value(var, value, "a boolean")),
    }
}

/// Sets the field at `path` (upper-case section and key names). Unknown
/// paths are ignored.
fn apply_override(config: &mut FrontendConfig, path: &[&str], var: &str, value: &str) -> Result<(), ConfigError> {
    let server = &mut config.server;
    let telemetry = &mut config.telemetry;
    match path {
        ["SERVER", "LISTEN_ADDR"] => server.listen_addr = value.to_string(),
        ["SERVER", "METRICS_ADDR"] => server.metrics_addr = value.to_string(),
        ["SERVER", "LOCATION"] => server.location = value.to_string(),
        ["SERVER", "SHUTDOWN_TIMEOUT_SECS"] => server.shutdown_timeout_secs = parsed(var, value, "an integer")?,
        ["SERVER", "REQUEST_TIMEOUT_MS"] => server.request_timeout_ms = parsed(var, value, "an integer")?,
        ["LOCK", "TTL_SECS"] => config.lock.ttl_secs = parsed(var, value, "an integer")?,
        ["LOCK", "RETRY_INTERVAL_MS"] => config.lock.retry_interval_ms = parsed(var, value, "an integer")?,
        ["API", "VERSIONS"] => {
            config.api.versions = value
                .split(',')
                .map(str::trim)
                .filter(|version| !version.is_empty())
                .map(str::to_string)
                .collect();
        }
        ["AUDIT", "ENABLED"] => config.audit.enabled = flag(var, value)?,
        ["TELEMETRY", "SERVICE_NAME"] => telemetry.service_name = value.to_string(),
        ["TELEMETRY", "ENVIRONMENT"] => telemetry.environment = value.to_string(),
        ["TELEMETRY", "LOGGING", "ENABLED"] => telemetry.logging.enabled = flag(var, value)?,
        ["TELEMETRY", "LOGGING", "LEVEL"] => telemetry.logging.level = value.to_string(),
        ["TELEMETRY", "LOGGING", "FORMAT"] => {
            telemetry.logging.format = match value.trim().to_ascii_lowercase().as_str() {
                "json" => LogFormat::Json,
                "pretty" => LogFormat::Pretty,
                _ => return Err(ConfigError::env_value(var, value, "'json' or 'pretty'")),
            };
        }
        ["TELEMETRY", "TRACING", "ENABLED"] => telemetry.tracing.enabled = flag(var, value)?,
        ["TELEMETRY", "TRACING", "OTLP_ENDPOINT"] => {
            telemetry.tracing.otlp_endpoint = Some(value.trim().to_string()).filter(|e| !e.is_empty());
        }
        ["TELEMETRY", "TRACING", "SAMPLING_RATIO"] => {
            telemetry.tracing.sampling_ratio = parsed(var, value, "a number")?;
        }
        ["TELEMETRY", "METRICS", "ENABLED"] => telemetry.metrics.enabled = flag(var, value)?,
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(config: &mut FrontendConfig, path: &str, value: &str) -> Result<(), ConfigError> {
        let parts: Vec<&str> = path.split("__").collect();
        apply_override(config, &parts, path, value)
    }

    #[test]
    fn test_defaults_validate() {
        let config = ConfigLoader::new().load().unwrap();
        assert_eq!(config.server.listen_addr, "0.0.0.0:8443");
        assert_eq!(config.lock.ttl_secs, 10);
    }

    #[test]
    fn test_development_preset() {
        let config = ConfigLoader::new().with_development().load().unwrap();
        assert_eq!(config.telemetry.logging.level, "debug");
        assert_eq!(config.telemetry.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_toml_string_fills_gaps_from_defaults() {
        let toml = r#"
            [server]
            location = "westus3"

            [lock]
            ttl_secs = 20
        "#;
        let config = ConfigLoader::new().with_string(toml, "TOML").unwrap().load().unwrap();

        assert_eq!(config.server.location, "westus3");
        assert_eq!(config.lock.ttl_secs, 20);
        assert_eq!(config.lock.retry_interval_ms, 1000);
    }

    #[test]
    fn test_json_string() {
        let json = r#"{"api": {"versions": ["2024-06-10-preview", "2025-01-01"]}}"#;
        let config = ConfigLoader::new().with_string(json, "json").unwrap().load().unwrap();
        assert_eq!(config.api.versions.len(), 2);
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(Format::of(Path::new("a/frontend.TOML")).unwrap(), Format::Toml);
        assert_eq!(Format::of(Path::new("frontend.json")).unwrap(), Format::Json);
        assert!(matches!(
            Format::of(Path::new("frontend")),
            Err(ConfigError::UnsupportedFormat(_))
        ));
        assert!(ConfigLoader::new().with_string("", "yaml").is_err());
    }

    #[test]
    fn test_missing_files() {
        let result = ConfigLoader::new().with_file("/nonexistent/frontend.toml");
        assert!(matches!(result, Err(ConfigError::MissingFile(_))));

        let config = ConfigLoader::new()
            .with_optional_file("/nonexistent/frontend.toml")
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(config.server.listen_addr, "0.0.0.0:8443");
    }

    #[test]
    fn test_overrides_by_section() {
        let mut config = FrontendConfig::default();
        set(&mut config, "SERVER__LOCATION", "uksouth").unwrap();
        set(&mut config, "LOCK__TTL_SECS", " 30 ").unwrap();
        set(&mut config, "AUDIT__ENABLED", "off").unwrap();
        set(&mut config, "API__VERSIONS", "2024-06-10-preview, 2025-01-01,").unwrap();
        set(&mut config, "TELEMETRY__LOGGING__FORMAT", "Pretty").unwrap();
        set(&mut config, "TELEMETRY__TRACING__OTLP_ENDPOINT", "").unwrap();

        assert_eq!(config.server.location, "uksouth");
        assert_eq!(config.lock.ttl_secs, 30);
        assert!(!config.audit.enabled);
        assert_eq!(config.api.versions, vec!["2024-06-10-preview", "2025-01-01"]);
        assert_eq!(config.telemetry.logging.format, LogFormat::Pretty);
        assert_eq!(config.telemetry.tracing.otlp_endpoint, None);
    }

    #[test]
    fn test_override_shape_errors() {
        let mut config = FrontendConfig::default();
        assert!(matches!(
            set(&mut config, "LOCK__TTL_SECS", "ten"),
            Err(ConfigError::EnvValue { expected: "an integer", .. })
        ));
        assert!(set(&mut config, "METRICS__ENABLED", "maybe").is_ok());
        assert!(set(&mut config, "TELEMETRY__METRICS__ENABLED", "maybe").is_err());
    }
}
