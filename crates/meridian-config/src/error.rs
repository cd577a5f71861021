//! Configuration errors.

use std::path::PathBuf;
use thiserror::Error;

/// Why a configuration could not be assembled.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An explicitly requested file does not exist.
    #[error("configuration file {} does not exist", .0.display())]
    MissingFile(PathBuf),

    /// A file exists but could not be read.
    #[error("cannot read configuration file {}", path.display())]
    Read {
        /// The file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A dotenv file could not be loaded.
    #[error("cannot load dotenv file {}", path.display())]
    Dotenv {
        /// The file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: dotenvy::Error,
    },

    /// Neither TOML nor JSON.
    #[error("unsupported configuration format '{0}' (expected toml or json)")]
    UnsupportedFormat(String),

    /// Malformed TOML.
    #[error("malformed TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// Malformed JSON.
    #[error("malformed JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// An override variable holds a value of the wrong shape.
    #[error("{var}: expected {expected}, got '{value}'")]
    EnvValue {
        /// Variable name.
        var: String,
        /// Raw value.
        value: String,
        /// What the field accepts.
        expected: &'static str,
    },

    /// A loaded value breaks a rule serde cannot express.
    #[error("{field} {reason}")]
    Invalid {
        /// Dotted path of the field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn env_value(var: &str, value: &str, expected: &'static str) -> Self {
        Self::EnvValue {
            var: var.to_string(),
            value: value.to_string(),
            expected,
        }
    }

    /// The dotted field path of an [`Invalid`](Self::Invalid) error.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::Invalid { field, .. } => Some(*field),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_names_the_field() {
        let err = ConfigError::invalid("lock.ttl_secs", "must be greater than zero");
        assert_eq!(err.to_string(), "lock.ttl_secs must be greater than zero");
        assert_eq!(err.field(), Some("lock.ttl_secs"));
    }

    #[test]
    fn test_env_value_echoes_input() {
        let err = ConfigError::env_value("MERIDIAN__LOCK__TTL_SECS", "ten", "an integer");
        assert_eq!(err.to_string(), "MERIDIAN__LOCK__TTL_SECS: expected an integer, got 'ten'");
        assert_eq!(err.field(), None);
    }
}
