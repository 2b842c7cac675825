// Шифрование хранилища мастер-паролем
//
// Соль PBKDF2 хранится в открытом виде под `master_salt_storage_key`,
// остальные значения - как `nonce || AES-256-GCM(value)` с ключом записи в AAD.

use crate::config::Config;
use crate::crypto::master_key::{decrypt_value, derive_master_key, encrypt_value, generate_salt};
use crate::storage::KeyValueStore;
use crate::utils::error::{Result, WhisprError};
use tracing::{debug, info};
use zeroize::Zeroizing;

/// Обёртка над [`KeyValueStore`], шифрующая значения мастер-ключом
pub struct SealedStore<S: KeyValueStore> {
    inner: S,
    master_key: Zeroizing<[u8; 32]>,
}

impl<S: KeyValueStore> SealedStore<S> {
    /// Открыть хранилище паролем
    ///
    /// При первом открытии создаётся и сохраняется соль. Неверный пароль
    /// здесь не обнаруживается: первое чтение вернёт `StorageError`.
    pub fn open(inner: S, password: &str) -> Result<Self> {
        let salt_key = Config::global().master_salt_storage_key;

        let salt = match inner.get(salt_key)? {
            Some(salt) => salt,
            None => {
                let salt = generate_salt();
                inner.set(salt_key, &salt)?;
                info!(target: "storage", "Generated new master key salt");
                salt
            }
        };

        let master_key = derive_master_key(password, &salt)?;
        debug!(target: "storage", "Master key derived");

        Ok(Self { inner, master_key })
    }

    fn ensure_not_reserved(key: &str) -> Result<()> {
        if key == Config::global().master_salt_storage_key {
            return Err(WhisprError::InvalidInput(format!(
                "Key {} is reserved for the master key salt",
                key
            )));
        }
        Ok(())
    }
}

impl<S: KeyValueStore> KeyValueStore for SealedStore<S> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Self::ensure_not_reserved(key)?;
        match self.inner.get(key)? {
            Some(sealed) => {
                let plaintext = decrypt_value(&self.master_key, key.as_bytes(), &sealed)?;
                Ok(Some(plaintext.to_vec()))
            }
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        Self::ensure_not_reserved(key)?;
        let sealed = encrypt_value(&self.master_key, key.as_bytes(), value)?;
        self.inner.set(key, &sealed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStore;
    use std::sync::Arc;

    #[test]
    fn test_values_are_encrypted_at_rest() {
        let backend = Arc::new(MemoryStore::new());
        let sealed = SealedStore::open(Arc::clone(&backend), "password123").unwrap();

        sealed.set("x3dh_keys", b"secret material").unwrap();
        assert_eq!(sealed.get("x3dh_keys").unwrap(), Some(b"secret material".to_vec()));

        let raw = backend.get("x3dh_keys").unwrap().unwrap();
        assert_ne!(raw, b"secret material".to_vec());
        assert!(backend.contains_key(Config::global().master_salt_storage_key));
    }

    #[test]
    fn test_reopen_with_same_password() {
        let backend = Arc::new(MemoryStore::new());
        SealedStore::open(Arc::clone(&backend), "password123")
            .unwrap()
            .set("k", b"v")
            .unwrap();

        let reopened = SealedStore::open(Arc::clone(&backend), "password123").unwrap();
        assert_eq!(reopened.get("k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn test_wrong_password_fails_on_read() {
        let backend = Arc::new(MemoryStore::new());
        SealedStore::open(Arc::clone(&backend), "password123")
            .unwrap()
            .set("k", b"v")
            .unwrap();

        let wrong = SealedStore::open(Arc::clone(&backend), "password456").unwrap();
        assert!(matches!(wrong.get("k"), Err(WhisprError::StorageError(_))));
    }

    #[test]
    fn test_records_are_bound_to_their_key() {
        let backend = Arc::new(MemoryStore::new());
        let sealed = SealedStore::open(Arc::clone(&backend), "password123").unwrap();
        sealed.set("a", b"value").unwrap();

        // Перенос шифротекста под другой ключ обнаруживается
        let raw = backend.get("a").unwrap().unwrap();
        backend.set("b", &raw).unwrap();
        assert!(sealed.get("b").is_err());
    }

    #[test]
    fn test_salt_key_is_reserved() {
        let sealed = SealedStore::open(MemoryStore::new(), "password123").unwrap();
        assert!(sealed.set(Config::global().master_salt_storage_key, b"x").is_err());
    }
}
