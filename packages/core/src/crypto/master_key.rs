// Мастер-ключ для шифрования хранилища
// PBKDF2 для деривации ключа + AES-256-GCM для шифрования значений

use crate::config::Config;
use crate::utils::error::{Result, WhisprError};
use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroizing;

// Compile-time константа для размера ключа (должна совпадать с Config::default())
const KEY_LENGTH: usize = 32;

/// Деривировать мастер-ключ из пароля с использованием PBKDF2
///
/// # Arguments
/// * `password` - Пользовательский пароль
/// * `salt` - Соль (`Config::salt_length` байт)
///
/// # Returns
/// 256-битный ключ для AES-256-GCM
pub fn derive_master_key(password: &str, salt: &[u8]) -> Result<Zeroizing<[u8; KEY_LENGTH]>> {
    if salt.len() != Config::global().salt_length {
        return Err(WhisprError::InvalidInput(format!(
            "Invalid salt length: expected {}, got {}",
            Config::global().salt_length,
            salt.len()
        )));
    }

    if password.is_empty() {
        return Err(WhisprError::InvalidInput(
            "Password cannot be empty".to_string(),
        ));
    }

    let mut key = Zeroizing::new([0u8; KEY_LENGTH]);

    pbkdf2_hmac::<Sha256>(
        password.as_bytes(),
        salt,
        Config::global().pbkdf2_iterations,
        &mut *key,
    );

    Ok(key)
}

/// Генерировать случайную соль
pub fn generate_salt() -> Vec<u8> {
    let mut salt = vec![0u8; Config::global().salt_length];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    salt
}

/// Зашифровать значение: `nonce || AES-256-GCM(value)`, `aad` привязывает
/// шифротекст к ключу записи
pub fn encrypt_value(master_key: &[u8; KEY_LENGTH], aad: &[u8], value: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new(master_key.into());
    let nonce_length = Config::global().nonce_length;

    // Генерируем случайный nonce
    let mut nonce_bytes = vec![0u8; nonce_length];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, Payload { msg: value, aad })
        .map_err(|e| WhisprError::StorageError(format!("Encryption failed: {}", e)))?;

    // Комбинируем nonce + ciphertext
    let mut result = Vec::with_capacity(nonce_length + ciphertext.len());
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&ciphertext);

    Ok(result)
}

/// Расшифровать значение, записанное [`encrypt_value`]
///
/// Неверный мастер-ключ (пароль) и подменённая запись дают `StorageError`.
pub fn decrypt_value(
    master_key: &[u8; KEY_LENGTH],
    aad: &[u8],
    data: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    let nonce_length = Config::global().nonce_length;

    if data.len() < nonce_length + Config::global().gcm_tag_length {
        return Err(WhisprError::StorageError(
            "Invalid ciphertext: too short".to_string(),
        ));
    }

    // Извлекаем nonce и ciphertext
    let (nonce_bytes, ciphertext) = data.split_at(nonce_length);
    let cipher = Aes256Gcm::new(master_key.into());

    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce_bytes), Payload { msg: ciphertext, aad })
        .map_err(|_| {
            WhisprError::StorageError(
                "Decryption failed: wrong password or corrupted record".to_string(),
            )
        })?;

    Ok(Zeroizing::new(plaintext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_master_key() {
        let salt = generate_salt();
        let password = "test_password_123";

        let key1 = derive_master_key(password, &salt).unwrap();
        let key2 = derive_master_key(password, &salt).unwrap();

        // Одинаковый пароль и соль должны давать одинаковый ключ
        assert_eq!(&*key1, &*key2);
    }

    #[test]
    fn test_derive_master_key_different_salt() {
        let password = "test_password_123";

        let key1 = derive_master_key(password, &generate_salt()).unwrap();
        let key2 = derive_master_key(password, &generate_salt()).unwrap();

        assert_ne!(&*key1, &*key2);
    }

    #[test]
    fn test_derive_rejects_bad_input() {
        assert!(derive_master_key("", &generate_salt()).is_err());
        assert!(derive_master_key("password", &[0u8; 8]).is_err());
    }

    #[test]
    fn test_encrypt_value_includes_nonce_and_tag() {
        let master_key = [7u8; KEY_LENGTH];
        let data = b"test data";

        let encrypted = encrypt_value(&master_key, b"key", data).unwrap();
        let expected_len =
            Config::global().nonce_length + data.len() + Config::global().gcm_tag_length;
        assert_eq!(encrypted.len(), expected_len);

        let decrypted = decrypt_value(&master_key, b"key", &encrypted).unwrap();
        assert_eq!(decrypted.as_slice(), data);
    }

    #[test]
    fn test_decrypt_with_wrong_key_or_aad() {
        let encrypted = encrypt_value(&[1u8; KEY_LENGTH], b"key", b"value").unwrap();

        assert!(decrypt_value(&[2u8; KEY_LENGTH], b"key", &encrypted).is_err());
        assert!(decrypt_value(&[1u8; KEY_LENGTH], b"other", &encrypted).is_err());
        assert!(decrypt_value(&[1u8; KEY_LENGTH], b"key", &encrypted[..10]).is_err());
    }
}
