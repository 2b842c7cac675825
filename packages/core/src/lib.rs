// Whispr Core
// X3DH key agreement and per-conversation end-to-end encryption

#![warn(clippy::all)]
#![allow(clippy::too_many_arguments)]

// Модули
pub mod config;
pub mod crypto;
pub mod error;
pub mod protocol;
pub mod state;
pub mod storage;
pub mod utils;

// Re-exports для удобства
pub use config::Config;
pub use crypto::suites::p256::P256SuiteProvider;
pub use crypto::CryptoProvider;
pub use error::CryptoError;
pub use state::{SessionManager, SessionState};
pub use storage::{KeyValueStore, MemoryStore, SealedStore};
pub use utils::error::{Result, WhisprError};
