//! Криптографические наборы (Crypto Suites)
//!
//! Этот модуль содержит реализации CryptoProvider trait.
//!
//! ## Доступные наборы
//!
//! ### P-256 Suite (текущий)
//! - **Key agreement**: ECDH на NIST P-256
//! - **Signatures**: ECDSA P-256 / SHA-256 (raw `r || s`, 64 байта)
//! - **AEAD**: AES-256-GCM
//! - **KDF**: HKDF-SHA256
//! - **Suite ID**: 1
//!
//! Набор совместим с ключами WebCrypto: те же кривые, тот же JWK формат,
//! тот же формат подписи.
//!
//! ## Выбор suite
//!
//! ```rust
//! use whispr_core::crypto::suites::p256::P256SuiteProvider;
//! use whispr_core::crypto::provider::CryptoProvider;
//!
//! type MySuite = P256SuiteProvider;
//!
//! let (signing_key, verifying_key) = MySuite::generate_signature_keys().unwrap();
//! let signature = MySuite::sign(&signing_key, b"hello").unwrap();
//! assert!(MySuite::verify(&verifying_key, b"hello", &signature).is_ok());
//! ```

pub mod p256;
