//! Tests for cryptographic building blocks
//!
//! This test suite covers:
//! - P-256 Suite Provider (ECDSA, ECDH, AES-256-GCM, HKDF)
//! - JWK import rejections
//! - Signed prekey tokens (compact JWS)
//! - SecureMessageCodec (seal / open, authenticity flag)
//! - Storage: sealed store, key material, conversation table

use std::sync::Arc;
use whispr_core::crypto::jwk::{PrivateJwk, PublicJwk, SymmetricJwk};
use whispr_core::crypto::jws::{sign_prekey, verify_prekey_signature};
use whispr_core::crypto::keys::{ConversationKeys, IdentityKeyManager, SymmetricKey};
use whispr_core::crypto::messaging::SecureMessageCodec;
use whispr_core::crypto::CryptoProvider;
use whispr_core::error::CryptoError;
use whispr_core::storage::conversations::{ConversationKeyStore, ConversationRecord};
use whispr_core::storage::models::ConversationType;
use whispr_core::storage::{KeyValueStore, MemoryStore, SealedStore};
use whispr_core::{P256SuiteProvider, WhisprError};

type Suite = P256SuiteProvider;
type Codec = SecureMessageCodec<Suite>;

fn conversation_keys() -> ConversationKeys<Suite> {
    ConversationKeys::<Suite>::generate().expect("conversation keys")
}

// ============================================================================
// P-256 Suite Provider
// ============================================================================

/// ECDSA signatures are raw 64-byte r||s, as WebCrypto produces them
#[test]
fn test_p256_signature_format() {
    let (signing_key, verifying_key) = Suite::generate_signature_keys().unwrap();
    let message = b"Hello, Whispr!";

    let signature = Suite::sign(&signing_key, message).unwrap();
    assert_eq!(signature.len(), 64, "Signature should be 64 bytes");

    assert!(
        Suite::verify(&verifying_key, message, &signature).is_ok(),
        "Signature verification failed"
    );
    assert!(
        Suite::verify(&verifying_key, b"Modified message", &signature).is_err(),
        "Verification should fail with wrong message"
    );
}

/// ECDH output is the 32-byte shared x-coordinate on both sides
#[test]
fn test_p256_ecdh_agreement() {
    let (a_priv, a_pub) = Suite::generate_agreement_keys().unwrap();
    let (b_priv, b_pub) = Suite::generate_agreement_keys().unwrap();

    let ab = Suite::diffie_hellman(&a_priv, &b_pub).unwrap();
    let ba = Suite::diffie_hellman(&b_priv, &a_pub).unwrap();

    assert_eq!(ab.len(), 32);
    assert_eq!(*ab, *ba, "Both sides must derive the same secret");
}

/// HKDF with an empty salt is the RFC 5869 zero-salt derivation
#[test]
fn test_hkdf_output_length_and_determinism() {
    let ikm = [7u8; 64];
    let a = Suite::hkdf_derive_key(b"", &ikm, b"Whispr X3DH Shared Secret v1", 32).unwrap();
    let b = Suite::hkdf_derive_key(&[0u8; 32], &ikm, b"Whispr X3DH Shared Secret v1", 32).unwrap();
    let c = Suite::hkdf_derive_key(b"", &ikm, b"other info", 32).unwrap();

    assert_eq!(a.len(), 32);
    assert_eq!(*a, *b, "Empty salt must equal a zero salt");
    assert_ne!(*a, *c, "Info string must separate domains");
}

/// RFC 5869, test cases 1 and 3 (SHA-256)
#[test]
fn test_hkdf_rfc5869_vectors() {
    let ikm = [0x0bu8; 22];

    let salt = hex::decode("000102030405060708090a0b0c").unwrap();
    let info = hex::decode("f0f1f2f3f4f5f6f7f8f9").unwrap();
    let okm = Suite::hkdf_derive_key(&salt, &ikm, &info, 42).unwrap();
    assert_eq!(
        hex::encode(&*okm),
        "3cb25f25faacd57a90434f64d0362f2a2d2d0a90cf1a5a4c5db02d56ecc4c5bf34007208d5b887185865"
    );

    let okm = Suite::hkdf_derive_key(b"", &ikm, b"", 42).unwrap();
    assert_eq!(
        hex::encode(&*okm),
        "8da4e775a563c18f715f802a063c5a31b8a11f5c5ee1879ec3454e5f3c738d2d9d201395faa4b61a96c8"
    );
}

#[test]
fn test_aead_wrong_key_fails() {
    let key = [1u8; 32];
    let nonce = Suite::generate_nonce(12).unwrap();
    let ciphertext = Suite::aead_encrypt(&key, &nonce, b"secret", None).unwrap();
    assert_eq!(ciphertext.len(), 6 + 16, "Tag is appended");

    let result = Suite::aead_decrypt(&[2u8; 32], &nonce, &ciphertext, None);
    assert!(matches!(result, Err(CryptoError::AeadDecryptionError(_))));
}

// ============================================================================
// JWK
// ============================================================================

#[test]
fn test_jwk_roundtrip_for_all_key_kinds() {
    let (signing_key, verifying_key) = Suite::generate_signature_keys().unwrap();
    let private = Suite::export_signing_key(&signing_key).unwrap();
    let restored = Suite::import_signing_key(&private).unwrap();
    assert_eq!(Suite::verifying_key(&restored), verifying_key);

    let (agreement_private, agreement_public) = Suite::generate_agreement_keys().unwrap();
    let public_jwk = Suite::export_agreement_public_key(&agreement_public).unwrap();
    assert_eq!(public_jwk.kty, "EC");
    assert_eq!(public_jwk.crv, "P-256");
    assert_eq!(
        Suite::import_agreement_public_key(&public_jwk).unwrap(),
        agreement_public
    );

    let private_jwk = Suite::export_agreement_private_key(&agreement_private).unwrap();
    assert!(Suite::import_agreement_private_key(&private_jwk).is_ok());

    let key = SymmetricKey::generate::<Suite>().unwrap();
    let jwk = key.to_jwk();
    assert_eq!(jwk.kty, "oct");
    assert_eq!(jwk.alg.as_deref(), Some("A256GCM"));
    assert_eq!(SymmetricKey::from_jwk(&jwk).unwrap().as_bytes(), key.as_bytes());
}

#[test]
fn test_jwk_import_rejections() {
    let (_, verifying_key) = Suite::generate_signature_keys().unwrap();
    let good = Suite::export_verifying_key(&verifying_key).unwrap();

    let mut wrong_curve = good.clone();
    wrong_curve.crv = "P-384".to_string();
    assert!(matches!(
        Suite::import_verifying_key(&wrong_curve),
        Err(CryptoError::KeyImportError(_))
    ));

    let mut wrong_kty = good.clone();
    wrong_kty.kty = "OKP".to_string();
    assert!(Suite::import_verifying_key(&wrong_kty).is_err(), "kty must be EC");

    let mut short_x = good.clone();
    short_x.x = "AAAA".to_string();
    assert!(Suite::import_verifying_key(&short_x).is_err(), "x must be 32 bytes");

    let mut bad_base64 = good.clone();
    bad_base64.y = "!!not base64!!".to_string();
    assert!(Suite::import_verifying_key(&bad_base64).is_err());

    // Координаты валидной длины, но не на кривой
    let off_curve = PublicJwk {
        y: good.x.clone(),
        ..good.clone()
    };
    assert!(Suite::import_agreement_public_key(&off_curve).is_err());

    // Нулевой скаляр
    let zero = PrivateJwk::new(good.clone(), &[0u8; 32]);
    assert!(Suite::import_signing_key(&zero).is_err(), "zero scalar must be rejected");

    // Симметричный ключ неверной длины
    let short = SymmetricJwk::new(&[1u8; 16]);
    assert!(SymmetricKey::from_jwk(&short).is_err());
}

// ============================================================================
// Signed prekey token
// ============================================================================

#[test]
fn test_signed_prekey_token_verifies_against_bundle() {
    let (identity, identity_public) = Suite::generate_signature_keys().unwrap();
    let (_, spk_public) = Suite::generate_agreement_keys().unwrap();
    let spk_jwk = Suite::export_agreement_public_key(&spk_public).unwrap();

    let token = sign_prekey::<Suite>(&identity, &spk_jwk).unwrap();
    assert_eq!(token.split('.').count(), 3, "Compact JWS has three segments");
    assert!(verify_prekey_signature::<Suite>(&identity_public, &token, &spk_jwk).is_ok());
}

#[test]
fn test_signed_prekey_token_rejects_other_spk_and_other_identity() {
    let (identity, identity_public) = Suite::generate_signature_keys().unwrap();
    let (_, other_identity_public) = Suite::generate_signature_keys().unwrap();
    let (_, spk_public) = Suite::generate_agreement_keys().unwrap();
    let (_, other_spk) = Suite::generate_agreement_keys().unwrap();
    let spk_jwk = Suite::export_agreement_public_key(&spk_public).unwrap();
    let other_spk_jwk = Suite::export_agreement_public_key(&other_spk).unwrap();

    let token = sign_prekey::<Suite>(&identity, &spk_jwk).unwrap();

    assert!(matches!(
        verify_prekey_signature::<Suite>(&identity_public, &token, &other_spk_jwk),
        Err(CryptoError::SignatureVerificationError(_))
    ));
    assert!(matches!(
        verify_prekey_signature::<Suite>(&other_identity_public, &token, &spk_jwk),
        Err(CryptoError::SignatureVerificationError(_))
    ));
    assert!(verify_prekey_signature::<Suite>(&identity_public, "a.b", &spk_jwk).is_err());
}

// ============================================================================
// SecureMessageCodec
// ============================================================================

/// seal → open with the same keys returns the plaintext, authentic
#[test]
fn test_seal_open_roundtrip() {
    let keys = conversation_keys();
    let envelope = Codec::seal(b"Hello", &keys.symmetric_key, &keys.signing_key, "alice").unwrap();

    assert_eq!(envelope.iv.len(), 12, "IV should be 12 bytes");
    assert_eq!(envelope.sender_id, "alice");
    assert!(envelope.timestamp > 0);

    let opened = Codec::open(&envelope, &keys.symmetric_key, &keys.signing_public).unwrap();
    assert_eq!(opened.plaintext, b"Hello");
    assert!(opened.is_authentic, "Signature should verify");
}

/// A fresh IV per message
#[test]
fn test_seal_uses_fresh_iv() {
    let keys = conversation_keys();
    let a = Codec::seal(b"same", &keys.symmetric_key, &keys.signing_key, "alice").unwrap();
    let b = Codec::seal(b"same", &keys.symmetric_key, &keys.signing_key, "alice").unwrap();
    assert_ne!(a.iv, b.iv);
    assert_ne!(a.ciphertext, b.ciphertext);
}

/// Wrong symmetric key is a decryption error, never garbage
#[test]
fn test_open_with_wrong_key_fails() {
    let keys = conversation_keys();
    let other = conversation_keys();
    let envelope = Codec::seal(b"Hello", &keys.symmetric_key, &keys.signing_key, "alice").unwrap();

    let result = Codec::open(&envelope, &other.symmetric_key, &keys.signing_public);
    assert!(matches!(result, Err(CryptoError::AeadDecryptionError(_))));
}

/// Tampered ciphertext fails the AEAD tag check
#[test]
fn test_open_tampered_ciphertext_fails() {
    let keys = conversation_keys();
    let mut envelope =
        Codec::seal(b"Hello", &keys.symmetric_key, &keys.signing_key, "alice").unwrap();
    envelope.ciphertext[0] ^= 0x01;

    let result = Codec::open(&envelope, &keys.symmetric_key, &keys.signing_public);
    assert!(matches!(result, Err(CryptoError::AeadDecryptionError(_))));
}

/// Tampered signature still decrypts, flagged as not authentic
#[test]
fn test_open_tampered_signature_is_soft_failure() {
    let keys = conversation_keys();
    let mut envelope =
        Codec::seal(b"Hello", &keys.symmetric_key, &keys.signing_key, "alice").unwrap();
    envelope.signature[10] ^= 0xff;

    let opened = Codec::open(&envelope, &keys.symmetric_key, &keys.signing_public).unwrap();
    assert_eq!(opened.plaintext, b"Hello");
    assert!(!opened.is_authentic);
}

/// Wrong verification key: plaintext delivered, not authentic
#[test]
fn test_open_with_wrong_verification_key() {
    let keys = conversation_keys();
    let other = conversation_keys();
    let envelope = Codec::seal(b"Hello", &keys.symmetric_key, &keys.signing_key, "alice").unwrap();

    let opened = Codec::open(&envelope, &keys.symmetric_key, &other.signing_public).unwrap();
    assert_eq!(opened.text().unwrap(), "Hello");
    assert!(!opened.is_authentic);
}

/// The signature covers the ciphertext bytes
#[test]
fn test_signature_covers_ciphertext() {
    let keys = conversation_keys();
    let envelope = Codec::seal(b"Hello", &keys.symmetric_key, &keys.signing_key, "alice").unwrap();
    assert!(Suite::verify(&keys.signing_public, &envelope.ciphertext, &envelope.signature).is_ok());
    assert!(Suite::verify(&keys.signing_public, b"Hello", &envelope.signature).is_err());
}

/// Envelope wire form uses number arrays for byte fields
#[test]
fn test_envelope_json_shape() {
    let keys = conversation_keys();
    let envelope = Codec::seal(b"Hi", &keys.symmetric_key, &keys.signing_key, "alice").unwrap();
    let json = serde_json::to_value(&envelope).unwrap();

    assert!(json["iv"].is_array());
    assert_eq!(json["iv"].as_array().unwrap().len(), 12);
    assert_eq!(json["senderId"], "alice");
    assert!(json["timestamp"].is_i64());
}

// ============================================================================
// Storage
// ============================================================================

#[test]
fn test_sealed_store_wrong_password() {
    let backend = Arc::new(MemoryStore::new());
    let manager = IdentityKeyManager::<Suite, _>::new(
        SealedStore::open(Arc::clone(&backend), "correct horse").unwrap(),
    );
    manager.initialize_device().unwrap();

    // Тот же пароль - ключи читаются
    let reopened = IdentityKeyManager::<Suite, _>::new(
        SealedStore::open(Arc::clone(&backend), "correct horse").unwrap(),
    );
    assert!(reopened.load().is_ok());

    // Неверный пароль обнаруживается при первом чтении
    let wrong = IdentityKeyManager::<Suite, _>::new(
        SealedStore::open(Arc::clone(&backend), "battery staple").unwrap(),
    );
    assert!(matches!(wrong.load(), Err(WhisprError::StorageError(_))));

    // На диске нет открытого JSON
    let raw = backend.get("x3dh_keys").unwrap().unwrap();
    assert!(serde_json::from_slice::<serde_json::Value>(&raw).is_err());
}

#[test]
fn test_conversation_store_lookups_and_peer_key_update() {
    let store = ConversationKeyStore::<Suite, _>::new(MemoryStore::new());

    for (conv_id, peer, kind) in [
        ("conv-bob", "bob", ConversationType::Direct),
        ("conv-carol", "carol", ConversationType::Direct),
        ("team", "team", ConversationType::Group),
    ] {
        let keys = conversation_keys();
        let record = ConversationRecord::<Suite> {
            conv_id: conv_id.to_string(),
            peer_or_group_id: Some(peer.to_string()),
            symmetric_key: keys.symmetric_key,
            signing_key: keys.signing_key,
            signing_public: keys.signing_public,
            their_verification_key: None,
            initiator: true,
            conversation_type: kind,
            created_at: 1_700_000_000_000,
        };
        store.save(&record).unwrap();
    }

    assert_eq!(store.find_by_peer("carol").unwrap().as_deref(), Some("conv-carol"));
    assert_eq!(store.find_by_peer("dave").unwrap(), None);
    assert_eq!(store.find_by_conv_id("team").unwrap().as_deref(), Some("team"));
    assert_eq!(store.find_by_conv_id("conv-bob").unwrap(), None, "DIRECT is not a group");

    let (_, peer_key) = Suite::generate_signature_keys().unwrap();
    assert!(store.update_peer_verification_key("conv-bob", &peer_key).unwrap());

    let record = store.load("conv-bob").unwrap().unwrap();
    assert_eq!(record.their_verification_key, Some(peer_key));

    let summaries = store.list().unwrap();
    assert_eq!(summaries.len(), 3);
    assert_eq!(
        summaries.iter().filter(|s| s.has_peer_verification_key).count(),
        1
    );
}
