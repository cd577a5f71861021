//! File and dotenv layering.

use meridian_config::{ConfigError, ConfigLoader, LogFormat};
use std::io::Write;

fn write_temp(suffix: &str, content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_toml_file_overrides_defaults() {
    let file = write_temp(
        ".toml",
        r#"
            [server]
            listen_addr = "127.0.0.1:9443"
            location = "westeurope"

            [telemetry.logging]
            format = "pretty"
        "#,
    );

    let config = ConfigLoader::new().with_file(file.path()).unwrap().load().unwrap();

    assert_eq!(config.server.listen_addr, "127.0.0.1:9443");
    assert_eq!(config.server.location, "westeurope");
    assert_eq!(config.telemetry.logging.format, LogFormat::Pretty);
    assert_eq!(config.lock.ttl_secs, 10);
}

#[test]
fn test_json_file_is_accepted() {
    let file = write_temp(".json", r#"{"lock": {"ttl_secs": 42}}"#);
    let config = ConfigLoader::new().with_file(file.path()).unwrap().load().unwrap();
    assert_eq!(config.lock.ttl_secs, 42);
}

#[test]
fn test_unknown_extension_is_rejected() {
    let file = write_temp(".yaml", "server: {}");
    let result = ConfigLoader::new().with_file(file.path());
    assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
}

#[test]
fn test_invalid_value_in_file_fails_validation() {
    let file = write_temp(".toml", "[server]\nlisten_addr = \"nowhere\"\n");
    let result = ConfigLoader::new().with_file(file.path()).unwrap().load();
    assert!(matches!(result, Err(ConfigError::Invalid { field: "server.listen_addr", .. })));
}

#[test]
fn test_dotenv_file_feeds_env_overrides() {
    let dotenv = write_temp(
        ".env",
        "MERIDIANDOTENVTEST__SERVER__LOCATION=australiaeast\nMERIDIANDOTENVTEST__LOCK__RETRY_INTERVAL_MS=250\n",
    );

    let config = ConfigLoader::new()
        .with_dotenv_file(dotenv.path())
        .unwrap()
        .with_env_prefix("MERIDIANDOTENVTEST")
        .load()
        .unwrap();

    assert_eq!(config.server.location, "australiaeast");
    assert_eq!(config.lock.retry_interval_ms, 250);
}

#[test]
fn test_missing_dotenv_file_is_an_error() {
    let result = ConfigLoader::new().with_dotenv_file("/nonexistent/.env");
    assert!(matches!(result, Err(ConfigError::Dotenv { .. })));
}
