//! Error types for pulsemind-sw

use thiserror::Error;

/// Result type alias for pulsemind-sw operations
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for the application
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Interactive prompt error: {0}")]
    Dialoguer(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Precache install failed: {0}")]
    Install(String),

    #[error("Background sync failed for {url}")]
    Sync { url: String },

    #[error("Operation failed: {0}")]
    Other(String),
}

impl From<dialoguer::Error> for Error {
    fn from(err: dialoguer::Error) -> Self {
        Error::Dialoguer(err.to_string())
    }
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to save configuration: {0}")]
    SaveError(String),

    #[error("Invalid exclude pattern '{pattern}': {reason}")]
    Pattern { pattern: String, reason: String },
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

/// Cache storage errors
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Could not determine cache directory")]
    NoHome,

    #[error("Cache I/O error: {0}")]
    Io(String),

    #[error("Cache database error: {0}")]
    Database(String),

    #[error("Cache lock poisoned")]
    Poisoned,
}

impl From<rusqlite::Error> for CacheError {
    fn from(err: rusqlite::Error) -> Self {
        CacheError::Database(err.to_string())
    }
}

/// Network fetch errors
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Network unreachable: {0}")]
    Unreachable(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Invalid request URL '{0}'")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for NetworkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NetworkError::Timeout
        } else if err.is_connect() {
            NetworkError::Unreachable("Failed to connect".to_string())
        } else {
            NetworkError::Unreachable(err.to_string())
        }
    }
}

/// Notification scheduling errors
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("Notification triggers are not supported by this host")]
    Unsupported,

    #[error("Failed to schedule notification: {0}")]
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_parse() {
        let err = ConfigError::ParseError("unexpected key".to_string());
        assert!(err.to_string().contains("unexpected key"));
    }

    #[test]
    fn test_config_error_pattern() {
        let err = ConfigError::Pattern {
            pattern: "[".to_string(),
            reason: "unclosed class".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("'['"));
        assert!(msg.contains("unclosed class"));
    }

    #[test]
    fn test_cache_error_database() {
        let err = CacheError::Database("locked".to_string());
        assert!(err.to_string().contains("locked"));
    }

    #[test]
    fn test_network_error_unreachable() {
        let err = NetworkError::Unreachable("Connection refused".to_string());
        assert!(err.to_string().contains("Connection refused"));
    }

    #[test]
    fn test_schedule_error_unsupported() {
        let err = ScheduleError::Unsupported;
        assert!(err.to_string().contains("not supported"));
    }

    #[test]
    fn test_sync_error_names_url() {
        let err = Error::Sync {
            url: "/api/readings".to_string(),
        };
        assert!(err.to_string().contains("/api/readings"));
    }

    #[test]
    fn test_error_from_cache_error() {
        let err: Error = CacheError::NoHome.into();

        match err {
            Error::Cache(CacheError::NoHome) => (),
            _ => panic!("Expected Error::Cache(CacheError::NoHome)"),
        }
    }

    #[test]
    fn test_error_from_network_error() {
        let err: Error = NetworkError::Timeout.into();

        match err {
            Error::Network(NetworkError::Timeout) => (),
            _ => panic!("Expected Error::Network(NetworkError::Timeout)"),
        }
    }

    #[test]
    fn test_config_error_from_yaml_error() {
        let yaml_str = "invalid: [yaml: content";
        let yaml_err = serde_yaml::from_str::<serde_yaml::Value>(yaml_str).unwrap_err();
        let config_err: ConfigError = yaml_err.into();

        match config_err {
            ConfigError::ParseError(_) => (),
            _ => panic!("Expected ConfigError::ParseError"),
        }
    }
}
