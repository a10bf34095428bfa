use crate::domain::model::Category;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Unquote error: {message}")]
    UnquoteError { message: String },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Empty {category} payload")]
    EmptyPayload { category: Category },

    #[error("Broker error: {message}")]
    BrokerError { message: String },

    #[error("Storage error: {message}")]
    StorageError { message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

impl BridgeError {
    pub fn broker(message: impl Into<String>) -> Self {
        Self::BrokerError {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::StorageError {
            message: message.into(),
        }
    }

    /// Payload could not be turned into a typed value; the message stays un-acked.
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            Self::UnquoteError { .. } | Self::SerializationError(_) | Self::EmptyPayload { .. }
        )
    }

    /// Errors that stop the service before any message is processed.
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            Self::BrokerError { .. }
                | Self::ConfigError { .. }
                | Self::ConfigValidationError { .. }
                | Self::InvalidConfigValueError { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let unquote = BridgeError::UnquoteError {
            message: "bad".to_string(),
        };
        assert!(unquote.is_decode_error());
        assert!(!unquote.is_setup_error());

        let empty = BridgeError::EmptyPayload {
            category: Category::UpdateSample,
        };
        assert!(empty.is_decode_error());
        assert_eq!(empty.to_string(), "Empty update-sample payload");

        assert!(BridgeError::broker("no route to host").is_setup_error());
        assert!(!BridgeError::storage("disk full").is_setup_error());
        assert!(!BridgeError::storage("disk full").is_decode_error());
    }
}
