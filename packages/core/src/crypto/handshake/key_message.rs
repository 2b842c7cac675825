//! Conversation key message
//!
//! Единственный шифротекст под X3DH shared key: инициатор передаёт в нём
//! ключи беседы (AES ключ + подписывающую пару). После расшифровки
//! shared key больше не нужен.

use crate::crypto::jwk::{PrivateJwk, PublicJwk};
use crate::crypto::keys::{ConversationKeys, SymmetricKey};
use crate::crypto::provider::CryptoProvider;
use crate::error::CryptoError;
use crate::utils::serialization::bytes_from_array_or_map;
use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::{Zeroize, Zeroizing};

const KEY_MESSAGE_IV_LENGTH: usize = 12;

/// Plaintext key message: `{convSignPub, convSignPriv, convSymKey, initiatorId}`
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationKeyMessage {
    pub conv_sign_pub: PublicJwk,
    pub conv_sign_priv: PrivateJwk,
    #[serde(deserialize_with = "bytes_from_array_or_map")]
    pub conv_sym_key: Vec<u8>,
    pub initiator_id: String,
}

impl Drop for ConversationKeyMessage {
    fn drop(&mut self) {
        self.conv_sym_key.zeroize();
    }
}

impl ConversationKeyMessage {
    pub fn from_keys<P: CryptoProvider>(
        keys: &ConversationKeys<P>,
        initiator_id: &str,
    ) -> Result<Self, CryptoError> {
        Ok(Self {
            conv_sign_pub: P::export_verifying_key(&keys.signing_public)?,
            conv_sign_priv: P::export_signing_key(&keys.signing_key)?,
            conv_sym_key: keys.symmetric_key.as_bytes().to_vec(),
            initiator_id: initiator_id.to_string(),
        })
    }

    /// Импортировать ключи беседы; публичный ключ обязан соответствовать приватному
    pub fn to_keys<P: CryptoProvider>(&self) -> Result<ConversationKeys<P>, CryptoError> {
        let symmetric_key = SymmetricKey::from_slice(&self.conv_sym_key)?;
        let signing_key = P::import_signing_key(&self.conv_sign_priv)?;
        let signing_public = P::import_verifying_key(&self.conv_sign_pub)?;

        if P::verifying_key(&signing_key) != signing_public {
            return Err(CryptoError::KeyImportError(
                "convSignPub does not belong to convSignPriv".to_string(),
            ));
        }

        Ok(ConversationKeys {
            symmetric_key,
            signing_key,
            signing_public,
        })
    }
}

/// Зашифрованный key message (AES-256-GCM под shared key)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedKeyMessage {
    pub iv: Vec<u8>,
    pub ciphertext: Vec<u8>,
}

/// Зашифровать key message shared key'ом из X3DH
pub fn seal_key_message<P: CryptoProvider>(
    shared_key: &SymmetricKey,
    message: &ConversationKeyMessage,
) -> Result<EncryptedKeyMessage, CryptoError> {
    let plaintext = Zeroizing::new(
        serde_json::to_vec(message).map_err(|e| CryptoError::SerializationError(e.to_string()))?,
    );
    let iv = P::generate_nonce(KEY_MESSAGE_IV_LENGTH)?;
    let ciphertext = P::aead_encrypt(shared_key.as_bytes(), &iv, &plaintext, None)
        .map_err(|e| {
            CryptoError::AeadEncryptionError(format!("Key message encryption failed: {}", e))
        })?;

    debug!(target: "crypto::x3dh", ciphertext_len = ciphertext.len(), "Key message sealed");
    Ok(EncryptedKeyMessage { iv, ciphertext })
}

/// Расшифровать key message shared key'ом получателя
///
/// Неверный shared key (например, стороны разошлись в использовании OPK)
/// проявляется здесь как `AeadDecryptionError`.
pub fn open_key_message<P: CryptoProvider>(
    shared_key: &SymmetricKey,
    encrypted: &EncryptedKeyMessage,
) -> Result<ConversationKeyMessage, CryptoError> {
    let plaintext = Zeroizing::new(
        P::aead_decrypt(shared_key.as_bytes(), &encrypted.iv, &encrypted.ciphertext, None)
            .map_err(|e| {
                CryptoError::AeadDecryptionError(format!("Key message decryption failed: {}", e))
            })?,
    );

    serde_json::from_slice(&plaintext)
        .map_err(|e| CryptoError::DeserializationError(format!("Key message: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::suites::p256::P256SuiteProvider;

    type Suite = P256SuiteProvider;

    #[test]
    fn test_key_message_roundtrip() {
        let shared_key = SymmetricKey::generate::<Suite>().unwrap();
        let keys = ConversationKeys::<Suite>::generate().unwrap();
        let message = ConversationKeyMessage::from_keys(&keys, "alice").unwrap();

        let encrypted = seal_key_message::<Suite>(&shared_key, &message).unwrap();
        assert_eq!(encrypted.iv.len(), 12);

        let opened = open_key_message::<Suite>(&shared_key, &encrypted).unwrap();
        assert_eq!(opened.initiator_id, "alice");

        let recovered = opened.to_keys::<Suite>().unwrap();
        assert_eq!(recovered.symmetric_key.as_bytes(), keys.symmetric_key.as_bytes());
        assert_eq!(recovered.signing_public, keys.signing_public);
    }

    #[test]
    fn test_wrong_shared_key_fails() {
        let shared_key = SymmetricKey::generate::<Suite>().unwrap();
        let keys = ConversationKeys::<Suite>::generate().unwrap();
        let message = ConversationKeyMessage::from_keys(&keys, "alice").unwrap();
        let encrypted = seal_key_message::<Suite>(&shared_key, &message).unwrap();

        let other = SymmetricKey::generate::<Suite>().unwrap();
        assert!(matches!(
            open_key_message::<Suite>(&other, &encrypted),
            Err(CryptoError::AeadDecryptionError(_))
        ));
    }

    #[test]
    fn test_sym_key_as_numeric_map_is_accepted() {
        let keys = ConversationKeys::<Suite>::generate().unwrap();
        let message = ConversationKeyMessage::from_keys(&keys, "alice").unwrap();
        let mut json = serde_json::to_value(&message).unwrap();

        let as_map: serde_json::Map<String, serde_json::Value> = keys
            .symmetric_key
            .as_bytes()
            .iter()
            .enumerate()
            .map(|(i, b)| (i.to_string(), serde_json::Value::from(*b)))
            .collect();
        json["convSymKey"] = serde_json::Value::Object(as_map);

        let parsed: ConversationKeyMessage = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.conv_sym_key, keys.symmetric_key.as_bytes());
    }

    #[test]
    fn test_mismatched_signing_pair_is_rejected() {
        let keys = ConversationKeys::<Suite>::generate().unwrap();
        let other = ConversationKeys::<Suite>::generate().unwrap();
        let mut message = ConversationKeyMessage::from_keys(&keys, "alice").unwrap();
        message.conv_sign_pub = Suite::export_verifying_key(&other.signing_public).unwrap();

        assert!(matches!(
            message.to_keys::<Suite>(),
            Err(CryptoError::KeyImportError(_))
        ));
    }
}
