//! Errors raised while reading capture inputs
//!
//! Everything here happens before the simulator is touched: settings,
//! camera and weather files, and the recorder info report.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContractError {
    /// Input could not be parsed at all
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Parsed, but a value is out of range; `field` locates it
    /// (`weather.csv:2.precipitation`, `capture.max_workers`)
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    #[error("recorder info parse error: {message}")]
    RecorderInfo { message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ContractError {
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Parse error keeping the underlying cause
    pub fn config_parse_with(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn recorder_info(message: impl Into<String>) -> Self {
        Self::RecorderInfo {
            message: message.into(),
        }
    }
}
