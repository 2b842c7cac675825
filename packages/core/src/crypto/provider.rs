//! Defines the CryptoProvider trait for crypto-agility.

use crate::crypto::jwk::{PrivateJwk, PublicJwk};
use crate::error::CryptoError;
use core::fmt::Debug;
use zeroize::Zeroizing;

/// Trait that formalizes all cryptographic operations for a specific cipher suite.
///
/// Protocol code (X3DH, message codec, key managers) is generic over this trait,
/// so a different curve or AEAD can be plugged in without touching it.
/// Keys cross the storage and wire boundaries as JWK, so every key type has
/// an import/export pair.
pub trait CryptoProvider: Send + Sync + 'static {
    /// Signing (identity / conversation) private key
    type SigningKey: Clone + Send + Sync + 'static;
    /// Signature verification key
    type VerifyingKey: Clone + Debug + PartialEq + Send + Sync + 'static;
    /// Key agreement private key (SPK, OPK, ephemeral)
    type AgreementPrivateKey: Clone + Send + Sync + 'static;
    /// Key agreement public key
    type AgreementPublicKey: Clone + Debug + PartialEq + Send + Sync + 'static;

    /// Generates a new Signature key pair.
    fn generate_signature_keys() -> Result<(Self::SigningKey, Self::VerifyingKey), CryptoError>;

    /// Derives the verification key from a signing key.
    fn verifying_key(signing_key: &Self::SigningKey) -> Self::VerifyingKey;

    /// Generates a new key agreement key pair.
    fn generate_agreement_keys(
    ) -> Result<(Self::AgreementPrivateKey, Self::AgreementPublicKey), CryptoError>;

    /// Signs a message with the given private key.
    fn sign(private_key: &Self::SigningKey, message: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Verifies a signature with the given public key.
    fn verify(
        public_key: &Self::VerifyingKey,
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), CryptoError>;

    /// Raw Diffie-Hellman output (shared x-coordinate).
    fn diffie_hellman(
        private_key: &Self::AgreementPrivateKey,
        public_key: &Self::AgreementPublicKey,
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError>;

    /// Performs AEAD encryption.
    /// `key`: The symmetric encryption key.
    /// `nonce`: The unique nonce for this encryption.
    /// `plaintext`: The data to encrypt.
    /// `associated_data`: Optional associated data (authenticated but not encrypted).
    fn aead_encrypt(
        key: &[u8],
        nonce: &[u8],
        plaintext: &[u8],
        associated_data: Option<&[u8]>,
    ) -> Result<Vec<u8>, CryptoError>;

    /// Performs AEAD decryption. Any tag mismatch is an error.
    fn aead_decrypt(
        key: &[u8],
        nonce: &[u8],
        ciphertext: &[u8],
        associated_data: Option<&[u8]>,
    ) -> Result<Vec<u8>, CryptoError>;

    /// Derives a key from input key material using HKDF.
    fn hkdf_derive_key(
        salt: &[u8],
        ikm: &[u8],
        info: &[u8],
        len: usize,
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError>;

    /// Generates a cryptographically secure random nonce of a specified length.
    fn generate_nonce(len: usize) -> Result<Vec<u8>, CryptoError>;

    /// Generates fresh symmetric key bytes.
    fn generate_symmetric_key(len: usize) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        Self::generate_nonce(len).map(Zeroizing::new)
    }

    // JWK import/export

    fn export_verifying_key(key: &Self::VerifyingKey) -> Result<PublicJwk, CryptoError>;
    fn import_verifying_key(jwk: &PublicJwk) -> Result<Self::VerifyingKey, CryptoError>;
    fn export_signing_key(key: &Self::SigningKey) -> Result<PrivateJwk, CryptoError>;
    fn import_signing_key(jwk: &PrivateJwk) -> Result<Self::SigningKey, CryptoError>;

    fn export_agreement_public_key(
        key: &Self::AgreementPublicKey,
    ) -> Result<PublicJwk, CryptoError>;
    fn import_agreement_public_key(jwk: &PublicJwk)
        -> Result<Self::AgreementPublicKey, CryptoError>;
    fn export_agreement_private_key(
        key: &Self::AgreementPrivateKey,
    ) -> Result<PrivateJwk, CryptoError>;
    fn import_agreement_private_key(
        jwk: &PrivateJwk,
    ) -> Result<Self::AgreementPrivateKey, CryptoError>;

    /// Returns the SuiteID associated with this CryptoProvider.
    fn suite_id() -> u16;
}
