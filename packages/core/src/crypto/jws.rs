//! Compact JWS (RFC 7515) для подписи signed prekey
//!
//! ```text
//! base64url({"alg":"ES256"}) . base64url({"spk": <SPK public JWK>}) . base64url(r || s)
//! ```
//!
//! Подпись ставится identity ключом над `header.payload` (ASCII),
//! ES256 = ECDSA P-256 / SHA-256 с raw 64-байтовой подписью.

use crate::crypto::jwk::PublicJwk;
use crate::crypto::provider::CryptoProvider;
use crate::error::CryptoError;
use crate::utils::b64;
use serde::{Deserialize, Serialize};

pub const ES256: &str = "ES256";

#[derive(Debug, Serialize, Deserialize)]
struct JwsHeader {
    alg: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct SignedPreKeyClaims {
    spk: PublicJwk,
}

/// Подписать публичный JWK signed prekey identity ключом
pub fn sign_prekey<P: CryptoProvider>(
    identity_key: &P::SigningKey,
    spk_public: &PublicJwk,
) -> Result<String, CryptoError> {
    let header = serde_json::to_vec(&JwsHeader {
        alg: ES256.to_string(),
    })
    .map_err(|e| CryptoError::SerializationError(e.to_string()))?;
    let payload = serde_json::to_vec(&SignedPreKeyClaims {
        spk: spk_public.clone(),
    })
    .map_err(|e| CryptoError::SerializationError(e.to_string()))?;

    let signing_input = format!("{}.{}", b64::encode_url(&header), b64::encode_url(&payload));
    let signature = P::sign(identity_key, signing_input.as_bytes())?;

    Ok(format!("{}.{}", signing_input, b64::encode_url(&signature)))
}

/// Проверить токен и вернуть встроенный SPK JWK
///
/// Проверяется только криптографическая подпись; сравнение с SPK из
/// bundle делает [`verify_prekey_signature`].
pub fn verify_prekey_token<P: CryptoProvider>(
    identity_key: &P::VerifyingKey,
    token: &str,
) -> Result<PublicJwk, CryptoError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(CryptoError::SignatureVerificationError(format!(
            "Compact JWS must have 3 segments, got {}",
            segments.len()
        )));
    }
    let (header_b64, payload_b64, signature_b64) = (segments[0], segments[1], segments[2]);

    let header_bytes = b64::decode_url(header_b64).map_err(|e| {
        CryptoError::SignatureVerificationError(format!("JWS header encoding: {}", e))
    })?;
    let header: JwsHeader = serde_json::from_slice(&header_bytes).map_err(|e| {
        CryptoError::SignatureVerificationError(format!("JWS header JSON: {}", e))
    })?;
    if header.alg != ES256 {
        return Err(CryptoError::SignatureVerificationError(format!(
            "Unsupported JWS alg: {}",
            header.alg
        )));
    }

    let signature = b64::decode_url(signature_b64).map_err(|e| {
        CryptoError::SignatureVerificationError(format!("JWS signature encoding: {}", e))
    })?;
    let signing_input = format!("{}.{}", header_b64, payload_b64);
    P::verify(identity_key, signing_input.as_bytes(), &signature)?;

    let payload_bytes = b64::decode_url(payload_b64).map_err(|e| {
        CryptoError::SignatureVerificationError(format!("JWS payload encoding: {}", e))
    })?;
    let claims: SignedPreKeyClaims = serde_json::from_slice(&payload_bytes).map_err(|e| {
        CryptoError::SignatureVerificationError(format!("JWS payload JSON: {}", e))
    })?;

    Ok(claims.spk)
}

/// Проверить подпись SPK из bundle: подпись валидна И встроенный ключ
/// совпадает с `signedPrekey` по `{kty, crv, x, y}`
pub fn verify_prekey_signature<P: CryptoProvider>(
    identity_key: &P::VerifyingKey,
    token: &str,
    spk_public: &PublicJwk,
) -> Result<(), CryptoError> {
    let embedded = verify_prekey_token::<P>(identity_key, token)?;
    if !embedded.same_key(spk_public) {
        return Err(CryptoError::SignatureVerificationError(
            "Signed prekey in signature does not match bundle signedPrekey".to_string(),
        ));
    }
    Ok(())
}
