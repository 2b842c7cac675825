use crate::crypto::jwk::{PrivateJwk, PublicJwk};
use crate::crypto::provider::CryptoProvider;
use crate::crypto::P256_SUITE_ID;
use crate::error::CryptoError;
use aes_gcm::{
    aead::{Aead, Payload},
    Aes256Gcm, KeyInit, Nonce,
};
use hkdf::Hkdf;
use ::p256::ecdsa::{
    signature::{Signer, Verifier},
    Signature, SigningKey, VerifyingKey,
};
use ::p256::elliptic_curve::sec1::ToEncodedPoint;
use ::p256::{PublicKey, SecretKey};
use rand::rngs::OsRng;
use rand_core::RngCore;
use sha2::Sha256;
use zeroize::Zeroizing;

const AES_256_KEY_LENGTH: usize = 32;
const GCM_NONCE_LENGTH: usize = 12;

/// Concrete implementation of `CryptoProvider` for the P-256 suite.
#[derive(Debug, Clone, Copy, Default)]
pub struct P256SuiteProvider;

impl P256SuiteProvider {
    fn cipher(key: &[u8]) -> Result<Aes256Gcm, CryptoError> {
        if key.len() != AES_256_KEY_LENGTH {
            return Err(CryptoError::InvalidInputError(format!(
                "AES-256-GCM key must be {} bytes, got {}",
                AES_256_KEY_LENGTH,
                key.len()
            )));
        }
        Aes256Gcm::new_from_slice(key)
            .map_err(|e| CryptoError::InvalidInputError(format!("Invalid AES key: {}", e)))
    }

    fn check_nonce(nonce: &[u8]) -> Result<(), CryptoError> {
        if nonce.len() != GCM_NONCE_LENGTH {
            return Err(CryptoError::InvalidInputError(format!(
                "AES-GCM nonce must be {} bytes, got {}",
                GCM_NONCE_LENGTH,
                nonce.len()
            )));
        }
        Ok(())
    }

    /// Приватный JWK должен описывать ту же точку, что и его скаляр
    fn ensure_public_matches(jwk: &PrivateJwk, derived: &PublicJwk) -> Result<(), CryptoError> {
        if !jwk.public().same_key(derived) {
            return Err(CryptoError::KeyImportError(
                "Private JWK coordinates do not match its scalar".to_string(),
            ));
        }
        Ok(())
    }
}

impl CryptoProvider for P256SuiteProvider {
    type SigningKey = SigningKey;
    type VerifyingKey = VerifyingKey;
    type AgreementPrivateKey = SecretKey;
    type AgreementPublicKey = PublicKey;

    fn generate_signature_keys() -> Result<(Self::SigningKey, Self::VerifyingKey), CryptoError> {
        let signing_key = SigningKey::random(&mut OsRng);
        let verifying_key = VerifyingKey::from(&signing_key);
        Ok((signing_key, verifying_key))
    }

    fn verifying_key(signing_key: &Self::SigningKey) -> Self::VerifyingKey {
        VerifyingKey::from(signing_key)
    }

    fn generate_agreement_keys(
    ) -> Result<(Self::AgreementPrivateKey, Self::AgreementPublicKey), CryptoError> {
        let secret = SecretKey::random(&mut OsRng);
        let public = secret.public_key();
        Ok((secret, public))
    }

    fn sign(private_key: &Self::SigningKey, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let signature: Signature = private_key
            .try_sign(message)
            .map_err(|e| CryptoError::SigningError(e.to_string()))?;
        Ok(signature.to_bytes().to_vec())
    }

    fn verify(
        public_key: &Self::VerifyingKey,
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), CryptoError> {
        let signature_obj = Signature::from_slice(signature).map_err(|e| {
            CryptoError::SignatureVerificationError(format!("Malformed signature: {}", e))
        })?;

        public_key
            .verify(message, &signature_obj)
            .map_err(|e| CryptoError::SignatureVerificationError(e.to_string()))
    }

    fn diffie_hellman(
        private_key: &Self::AgreementPrivateKey,
        public_key: &Self::AgreementPublicKey,
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        let shared =
            ::p256::ecdh::diffie_hellman(private_key.to_nonzero_scalar(), public_key.as_affine());
        Ok(Zeroizing::new(shared.raw_secret_bytes().to_vec()))
    }

    fn aead_encrypt(
        key: &[u8],
        nonce: &[u8],
        plaintext: &[u8],
        associated_data: Option<&[u8]>,
    ) -> Result<Vec<u8>, CryptoError> {
        let cipher = Self::cipher(key)?;
        Self::check_nonce(nonce)?;

        let payload = Payload {
            msg: plaintext,
            aad: associated_data.unwrap_or(b""),
        };

        cipher
            .encrypt(Nonce::from_slice(nonce), payload)
            .map_err(|e| CryptoError::AeadEncryptionError(e.to_string()))
    }

    fn aead_decrypt(
        key: &[u8],
        nonce: &[u8],
        ciphertext: &[u8],
        associated_data: Option<&[u8]>,
    ) -> Result<Vec<u8>, CryptoError> {
        let cipher = Self::cipher(key)?;
        Self::check_nonce(nonce)?;

        let payload = Payload {
            msg: ciphertext,
            aad: associated_data.unwrap_or(b""),
        };

        cipher
            .decrypt(Nonce::from_slice(nonce), payload)
            .map_err(|e| CryptoError::AeadDecryptionError(e.to_string()))
    }

    fn hkdf_derive_key(
        salt: &[u8],
        ikm: &[u8],
        info: &[u8],
        len: usize,
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        // Пустая соль эквивалентна HashLen нулевых байт (RFC 5869)
        let salt = if salt.is_empty() { None } else { Some(salt) };
        let hk = Hkdf::<Sha256>::new(salt, ikm);
        let mut okm = Zeroizing::new(vec![0u8; len]);
        hk.expand(info, &mut okm)
            .map_err(|e| CryptoError::KeyDerivationError(e.to_string()))?;
        Ok(okm)
    }

    fn generate_nonce(len: usize) -> Result<Vec<u8>, CryptoError> {
        let mut nonce = vec![0u8; len];
        OsRng
            .try_fill_bytes(&mut nonce)
            .map_err(|e| CryptoError::KeyGenerationError(format!("RNG failure: {}", e)))?;
        Ok(nonce)
    }

    fn export_verifying_key(key: &Self::VerifyingKey) -> Result<PublicJwk, CryptoError> {
        PublicJwk::from_uncompressed_point(key.to_encoded_point(false).as_bytes())
    }

    fn import_verifying_key(jwk: &PublicJwk) -> Result<Self::VerifyingKey, CryptoError> {
        let point = jwk.to_uncompressed_point()?;
        VerifyingKey::from_sec1_bytes(&point)
            .map_err(|e| CryptoError::KeyImportError(format!("Invalid verifying key: {}", e)))
    }

    fn export_signing_key(key: &Self::SigningKey) -> Result<PrivateJwk, CryptoError> {
        let public = Self::export_verifying_key(&VerifyingKey::from(key))?;
        let scalar = Zeroizing::new(key.to_bytes().to_vec());
        Ok(PrivateJwk::new(public, &scalar))
    }

    fn import_signing_key(jwk: &PrivateJwk) -> Result<Self::SigningKey, CryptoError> {
        let scalar = jwk.scalar()?;
        let signing_key = SigningKey::from_slice(&scalar)
            .map_err(|e| CryptoError::KeyImportError(format!("Invalid signing key: {}", e)))?;
        let derived = Self::export_verifying_key(&VerifyingKey::from(&signing_key))?;
        Self::ensure_public_matches(jwk, &derived)?;
        Ok(signing_key)
    }

    fn export_agreement_public_key(
        key: &Self::AgreementPublicKey,
    ) -> Result<PublicJwk, CryptoError> {
        PublicJwk::from_uncompressed_point(key.to_encoded_point(false).as_bytes())
    }

    fn import_agreement_public_key(
        jwk: &PublicJwk,
    ) -> Result<Self::AgreementPublicKey, CryptoError> {
        let point = jwk.to_uncompressed_point()?;
        PublicKey::from_sec1_bytes(&point)
            .map_err(|e| CryptoError::KeyImportError(format!("Invalid ECDH public key: {}", e)))
    }

    fn export_agreement_private_key(
        key: &Self::AgreementPrivateKey,
    ) -> Result<PrivateJwk, CryptoError> {
        let public = Self::export_agreement_public_key(&key.public_key())?;
        let scalar = Zeroizing::new(key.to_bytes().to_vec());
        Ok(PrivateJwk::new(public, &scalar))
    }

    fn import_agreement_private_key(
        jwk: &PrivateJwk,
    ) -> Result<Self::AgreementPrivateKey, CryptoError> {
        let scalar = jwk.scalar()?;
        let secret = SecretKey::from_slice(&scalar)
            .map_err(|e| CryptoError::KeyImportError(format!("Invalid ECDH private key: {}", e)))?;
        let derived = Self::export_agreement_public_key(&secret.public_key())?;
        Self::ensure_public_matches(jwk, &derived)?;
        Ok(secret)
    }

    fn suite_id() -> u16 {
        P256_SUITE_ID
    }
}
