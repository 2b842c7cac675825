use crate::config::Config;
use crate::crypto::keys::SymmetricKey;
use crate::crypto::provider::CryptoProvider;
use crate::error::CryptoError;
use crate::utils::serialization::bytes_from_array_or_map;
use crate::utils::time::current_timestamp_millis;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use tracing::{debug, warn};

/// Конверт сообщения на проводе
///
/// Байтовые поля сериализуются JSON-массивами чисел.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecureMessageEnvelope {
    #[serde(deserialize_with = "bytes_from_array_or_map")]
    pub ciphertext: Vec<u8>,
    #[serde(deserialize_with = "bytes_from_array_or_map")]
    pub iv: Vec<u8>,
    #[serde(deserialize_with = "bytes_from_array_or_map")]
    pub signature: Vec<u8>,
    pub sender_id: String,
    /// Unix ms
    pub timestamp: i64,
}

/// Результат `open`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedMessage {
    pub plaintext: Vec<u8>,
    pub is_authentic: bool,
}

impl OpenedMessage {
    pub fn text(&self) -> Result<&str, CryptoError> {
        std::str::from_utf8(&self.plaintext).map_err(|e| {
            CryptoError::DeserializationError(format!("Plaintext is not UTF-8: {}", e))
        })
    }
}

/// Кодек конвертов: encrypt + sign / decrypt + verify
pub struct SecureMessageCodec<P: CryptoProvider> {
    _phantom: PhantomData<P>,
}

impl<P: CryptoProvider> SecureMessageCodec<P> {
    /// Зашифровать и подписать сообщение ключами беседы
    pub fn seal(
        plaintext: &[u8],
        symmetric_key: &SymmetricKey,
        signing_key: &P::SigningKey,
        sender_id: &str,
    ) -> Result<SecureMessageEnvelope, CryptoError> {
        let iv = P::generate_nonce(Config::global().nonce_length)?;
        let ciphertext = P::aead_encrypt(symmetric_key.as_bytes(), &iv, plaintext, None)?;
        let signature = P::sign(signing_key, &ciphertext)
            .map_err(|e| CryptoError::SigningError(format!("Envelope signing failed: {}", e)))?;

        debug!(
            target: "crypto::codec",
            sender_id = %sender_id,
            ciphertext_len = ciphertext.len(),
            "Message sealed"
        );

        Ok(SecureMessageEnvelope {
            ciphertext,
            iv,
            signature,
            sender_id: sender_id.to_string(),
            timestamp: current_timestamp_millis(),
        })
    }

    /// Расшифровать конверт и проверить подпись
    ///
    /// # Ошибки
    /// - `AeadDecryptionError`: неверный ключ или изменённый шифротекст
    ///
    /// Неверная подпись ошибкой не является (`is_authentic = false`).
    pub fn open(
        envelope: &SecureMessageEnvelope,
        symmetric_key: &SymmetricKey,
        verification_key: &P::VerifyingKey,
    ) -> Result<OpenedMessage, CryptoError> {
        let plaintext = P::aead_decrypt(
            symmetric_key.as_bytes(),
            &envelope.iv,
            &envelope.ciphertext,
            None,
        )
        .map_err(|e| match e {
            CryptoError::AeadDecryptionError(msg) => CryptoError::AeadDecryptionError(format!(
                "Message from {}: {}",
                envelope.sender_id, msg
            )),
            other => other,
        })?;

        let is_authentic =
            match P::verify(verification_key, &envelope.ciphertext, &envelope.signature) {
                Ok(()) => true,
                Err(e) => {
                    warn!(
                        target: "crypto::codec",
                        sender_id = %envelope.sender_id,
                        error = %e,
                        "Envelope signature did not verify, delivering as unverified"
                    );
                    false
                }
            };

        debug!(
            target: "crypto::codec",
            sender_id = %envelope.sender_id,
            is_authentic,
            "Message opened"
        );

        Ok(OpenedMessage {
            plaintext,
            is_authentic,
        })
    }
}
