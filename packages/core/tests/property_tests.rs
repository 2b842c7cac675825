//! Property-based tests
//!
//! Uses proptest to check the agreement and codec invariants across random inputs:
//! - X3DH initiator and responder derive the same key for any bundle
//! - seal/open returns the original plaintext for any message
//! - flipping any ciphertext bit always fails decryption

use proptest::prelude::*;
use whispr_core::crypto::handshake::{KeyAgreement, PublicKeyBundle, X3DHProtocol};
use whispr_core::crypto::keys::{ConversationKeys, IdentityKeyManager, KeyMaterial};
use whispr_core::crypto::messaging::SecureMessageCodec;
use whispr_core::error::CryptoError;
use whispr_core::{MemoryStore, P256SuiteProvider};

type Suite = P256SuiteProvider;
type X3DH = X3DHProtocol<Suite>;
type Codec = SecureMessageCodec<Suite>;

fn device() -> (KeyMaterial<Suite>, PublicKeyBundle) {
    let manager = IdentityKeyManager::<Suite, _>::new(MemoryStore::new());
    let registration = manager.initialize_device().unwrap();
    (manager.load().unwrap(), registration.public_bundle)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn test_x3dh_always_produces_same_secret(
        with_opk in any::<bool>(),
        opk_index in 0usize..20
    ) {
        let (material, mut bundle) = device();
        if with_opk {
            // Издатель мог уже раздать первые OPK
            bundle.one_time_pre_keys.drain(..opk_index);
        } else {
            bundle.one_time_pre_keys.clear();
        }

        let session = X3DH::establish_session(&bundle).unwrap();
        prop_assert_eq!(session.used_opk_id.is_some(), with_opk);
        if let Some(id) = &session.used_opk_id {
            prop_assert!(id.matches(opk_index as u32));
        }

        let responder_key = X3DH::complete_session(
            &material,
            &session.ephemeral_public,
            session.used_opk_id.as_ref(),
        )
        .unwrap();
        prop_assert_eq!(responder_key.as_bytes(), session.shared_key.as_bytes());
    }

    #[test]
    fn test_seal_open_roundtrip(
        message in prop::collection::vec(any::<u8>(), 0..1000),
        sender in "[a-z0-9]{1,16}"
    ) {
        let keys = ConversationKeys::<Suite>::generate().unwrap();
        let envelope =
            Codec::seal(&message, &keys.symmetric_key, &keys.signing_key, &sender).unwrap();

        let opened = Codec::open(&envelope, &keys.symmetric_key, &keys.signing_public).unwrap();
        prop_assert_eq!(opened.plaintext, message);
        prop_assert!(opened.is_authentic);
        prop_assert_eq!(envelope.sender_id, sender);
    }

    #[test]
    fn test_tampered_ciphertext_never_decrypts(
        message in prop::collection::vec(any::<u8>(), 0..256),
        position in any::<prop::sample::Index>(),
        flip in 1u8..=255
    ) {
        let keys = ConversationKeys::<Suite>::generate().unwrap();
        let mut envelope =
            Codec::seal(&message, &keys.symmetric_key, &keys.signing_key, "alice").unwrap();

        // Шифротекст включает tag, так что он не пуст даже для пустого сообщения
        let i = position.index(envelope.ciphertext.len());
        envelope.ciphertext[i] ^= flip;

        let result = Codec::open(&envelope, &keys.symmetric_key, &keys.signing_public);
        prop_assert!(matches!(result, Err(CryptoError::AeadDecryptionError(_))));
    }
}
