use thiserror::Error;

/// Ошибки криптографического уровня (примитивы + X3DH + кодек сообщений)
///
/// Каждый вариант несёт контекст шага, на котором произошёл сбой.
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Failed to generate keys: {0}")]
    KeyGenerationError(String),
    #[error("Signing failed: {0}")]
    SigningError(String),
    #[error("Signature verification failed: {0}")]
    SignatureVerificationError(String),
    #[error("Key agreement failed: {0}")]
    KeyAgreementError(String),
    #[error("Key import failed: {0}")]
    KeyImportError(String),
    #[error("AEAD encryption failed: {0}")]
    AeadEncryptionError(String),
    #[error("AEAD decryption failed: {0}")]
    AeadDecryptionError(String),
    #[error("Key derivation failed: {0}")]
    KeyDerivationError(String),
    #[error("Invalid input: {0}")]
    InvalidInputError(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Deserialization error: {0}")]
    DeserializationError(String),
}

impl From<aes_gcm::Error> for CryptoError {
    fn from(err: aes_gcm::Error) -> Self {
        CryptoError::AeadDecryptionError(err.to_string())
    }
}

impl From<p256::ecdsa::Error> for CryptoError {
    fn from(err: p256::ecdsa::Error) -> Self {
        CryptoError::SignatureVerificationError(err.to_string())
    }
}

impl From<serde_json::Error> for CryptoError {
    fn from(err: serde_json::Error) -> Self {
        CryptoError::DeserializationError(err.to_string())
    }
}
