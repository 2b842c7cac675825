//! Криптографический модуль
//!
//! # Архитектура
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 SessionManager (state)                      │
//! │  - Беседы, состояния handshake, re-entrancy guard           │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                ┌─────────────┴─────────────┐
//!                ▼                           ▼
//! ┌───────────────────────────┐  ┌──────────────────────────┐
//! │   KeyAgreement (X3DH)     │  │  SecureMessageCodec      │
//! │  - Проверка подписи SPK   │  │  - AES-GCM + ECDSA       │
//! │  - EK × SPK, EK × OPK     │  │  - isAuthentic флаг      │
//! │  - Conversation key msg   │  │                          │
//! └───────────────────────────┘  └──────────────────────────┘
//!                │                           │
//!                └─────────────┬─────────────┘
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │              CryptoProvider (Crypto-Agility)                │
//! │  - ECDH / ECDSA P-256                                       │
//! │  - AEAD (AES-256-GCM)                                       │
//! │  - KDF (HKDF-SHA256)                                        │
//! │  - JWK import/export                                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Модули
//!
//! ### Core Traits
//! - [`provider`]: CryptoProvider trait для crypto-agility
//! - [`handshake`]: KeyAgreement trait и X3DH
//!
//! ### Implementations
//! - [`suites`]: Реализации CryptoProvider (P-256)
//! - [`handshake::x3dh`]: X3DH протокол
//! - [`messaging`]: Защищённый конверт сообщения
//!
//! ### Utilities
//! - [`keys`]: IdentityKeyManager и типы ключей
//! - [`jwk`], [`jws`]: форматы ключей и подпись signed prekey
//! - `master_key`: PBKDF2 мастер-ключ для шифрования хранилища

// ============================================================================
// Core Traits
// ============================================================================

/// CryptoProvider trait для crypto-agility
pub mod provider;

/// Key Agreement protocols (X3DH)
pub mod handshake;

/// Secure Messaging (encrypt + sign)
pub mod messaging;

// ============================================================================
// Implementations
// ============================================================================

/// Криптографические наборы (P-256)
pub mod suites;

// ============================================================================
// Utilities
// ============================================================================

pub mod jwk;

pub mod jws;

pub mod keys;

pub mod master_key;

// ============================================================================
// Re-exports для удобства
// ============================================================================

pub use provider::CryptoProvider;

pub type SuiteID = u16;

/// Suite ID for the P-256 suite
pub const P256_SUITE_ID: SuiteID = 1;
