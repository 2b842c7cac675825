// Типы ошибок прикладного уровня

use crate::error::CryptoError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WhisprError {
    #[error("Cryptography error: {0}")]
    CryptoError(#[from] CryptoError),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Session error: {0}")]
    SessionError(String),

    #[error("Handshake already in progress: {0}")]
    HandshakeInProgress(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<serde_json::Error> for WhisprError {
    fn from(error: serde_json::Error) -> Self {
        WhisprError::SerializationError(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, WhisprError>;
