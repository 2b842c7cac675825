// Валидация входящих данных
//
// Только структурные проверки до любой криптографии: длины, пустые поля,
// тип ключей. Подписи и AEAD проверяются дальше по конвейеру.

use crate::config::Config;
use crate::crypto::handshake::PublicKeyBundle;
use crate::crypto::jwk::{PublicJwk, CRV_P256, KTY_EC};
use crate::crypto::messaging::SecureMessageEnvelope;
use crate::error::CryptoError;
use crate::protocol::messages::InitiationPayload;
use crate::utils::error::{Result, WhisprError};
use std::collections::HashSet;

fn invalid(message: impl Into<String>) -> WhisprError {
    WhisprError::ValidationError(message.into())
}

fn validate_ec_key(name: &str, jwk: &PublicJwk) -> Result<()> {
    if jwk.kty != KTY_EC || jwk.crv != CRV_P256 {
        return Err(invalid(format!(
            "{} must be an EC P-256 key, got kty={} crv={}",
            name, jwk.kty, jwk.crv
        )));
    }
    if jwk.x.is_empty() || jwk.y.is_empty() {
        return Err(invalid(format!("{} is missing coordinates", name)));
    }
    Ok(())
}

fn validate_iv(iv: &[u8]) -> Result<()> {
    let expected = Config::global().nonce_length;
    if iv.len() != expected {
        return Err(invalid(format!(
            "IV must be {} bytes, got {}",
            expected,
            iv.len()
        )));
    }
    Ok(())
}

/// Валидация конверта сообщения
pub fn validate_envelope(envelope: &SecureMessageEnvelope) -> Result<()> {
    let cfg = Config::global();

    validate_iv(&envelope.iv)?;

    // Шифротекст включает GCM tag
    if envelope.ciphertext.len() < cfg.gcm_tag_length {
        return Err(invalid(format!(
            "Ciphertext must be at least {} bytes",
            cfg.gcm_tag_length
        )));
    }

    if envelope.signature.is_empty() {
        return Err(invalid("Envelope signature is empty"));
    }

    if envelope.sender_id.trim().is_empty() {
        return Err(invalid("Envelope sender id is empty"));
    }

    // Timestamp в ms; сравниваем с допуском в секундах
    let now = crate::utils::time::current_timestamp_millis();
    let tolerance_ms = cfg.message_timestamp_future_tolerance_secs.saturating_mul(1000);
    if envelope.timestamp > now.saturating_add(tolerance_ms) {
        return Err(invalid("Envelope timestamp is too far in the future"));
    }

    Ok(())
}

/// Валидация публичного bundle до X3DH
pub fn validate_public_bundle(bundle: &PublicKeyBundle) -> Result<()> {
    validate_ec_key("identityKey", &bundle.identity_key)?;
    validate_ec_key("signedPrekey", &bundle.signed_prekey)?;

    // Ошибки токена подписи - того же вида, что и у проверки JWS
    if bundle.prekey_signature.trim().is_empty() {
        return Err(CryptoError::SignatureVerificationError(
            "prekeySignature is empty".to_string(),
        )
        .into());
    }

    let mut seen = HashSet::new();
    for opk in &bundle.one_time_pre_keys {
        if !seen.insert(opk.id.to_string()) {
            return Err(invalid(format!("Duplicate one-time prekey id {}", opk.id)));
        }
    }

    Ok(())
}

/// Валидация payload'а начала беседы
pub fn validate_initiation_payload(payload: &InitiationPayload) -> Result<()> {
    validate_iv(&payload.iv)?;

    if payload.ciphertext.is_empty() {
        return Err(invalid("Initiation ciphertext is empty"));
    }

    if payload.initiator_id.trim().is_empty() {
        return Err(invalid("Initiator id is empty"));
    }

    validate_ec_key("ephemeralKeyPublicJWK", &payload.ephemeral_key_public_jwk)?;

    Ok(())
}
