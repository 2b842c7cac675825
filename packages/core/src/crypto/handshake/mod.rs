//! Key Agreement Protocols
//!
//! Этот модуль содержит протоколы установки ключей (key agreement).
//!
//! Цель: Установить общий секретный ключ между двумя сторонами без предварительного
//! обмена секретами. Секрет используется ровно один раз - чтобы зашифровать
//! conversation key message (см. [`key_message`]); дальше беседа живёт на
//! собственных ключах.
//!
//! ## Dataflow
//! ```text
//! Alice (инициатор)                          Bob (получатель)
//! ==================                         =================
//!
//! 1. Получает Bob's bundle от сервера
//! 2. KeyAgreement::establish_session()
//!    → (shared_key, EK_A_pub, usedOPKId)
//! 3. Шифрует conversation key message
//!    shared_key'ом и отправляет
//!    вместе с EK_A_pub и usedOPKId →
//!                                            1. Получает pending conversation
//!                                            2. KeyAgreement::complete_session()
//!                                               → shared_key (тот же!)
//!                                            3. Расшифровывает key message
//! ```

use crate::crypto::jwk::PublicJwk;
use crate::crypto::provider::CryptoProvider;
use crate::error::CryptoError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Идентификатор one-time prekey на проводе
///
/// Локальный порядковый номер устройства (0..N), уникален только в паре с
/// identity ключом владельца. Издатели присылают его то числом, то строкой.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneTimePreKeyId {
    Number(u64),
    Text(String),
}

impl OneTimePreKeyId {
    /// Сравнение с локальным id по десятичному представлению
    pub fn matches(&self, local_id: u32) -> bool {
        match self {
            OneTimePreKeyId::Number(n) => *n == u64::from(local_id),
            OneTimePreKeyId::Text(s) => s.trim() == local_id.to_string(),
        }
    }
}

impl From<u32> for OneTimePreKeyId {
    fn from(id: u32) -> Self {
        OneTimePreKeyId::Number(u64::from(id))
    }
}

impl fmt::Display for OneTimePreKeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OneTimePreKeyId::Number(n) => write!(f, "{}", n),
            OneTimePreKeyId::Text(s) => f.write_str(s),
        }
    }
}

/// One-time prekey в bundle: `{id, kty, crv, x, y}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundlePreKey {
    pub id: OneTimePreKeyId,
    #[serde(flatten)]
    pub key: PublicJwk,
}

/// Публичный bundle устройства (то, что публикуется на сервере)
///
/// Приватных компонентов здесь нет. `otpKey` - устаревшая форма с одним
/// OPK, которую отдают некоторые издатели вместо массива.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyBundle {
    pub identity_key: PublicJwk,
    pub signed_prekey: PublicJwk,
    pub prekey_signature: String,
    #[serde(default)]
    pub one_time_pre_keys: Vec<BundlePreKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otp_key: Option<BundlePreKey>,
}

impl PublicKeyBundle {
    /// OPK, который возьмёт инициатор: первый из массива, иначе `otpKey`
    pub fn select_one_time_prekey(&self) -> Option<&BundlePreKey> {
        self.one_time_pre_keys.first().or(self.otp_key.as_ref())
    }
}

/// Результат handshake на стороне инициатора
pub struct InitiatorSession<K> {
    /// Общий ключ (AES-256-GCM), только для key message
    pub shared_key: K,
    /// EK_A_pub для отправки получателю
    pub ephemeral_public: PublicJwk,
    /// OPK, реально вошедший в DH; `None` в режиме 1-DH
    pub used_opk_id: Option<OneTimePreKeyId>,
}

/// Протокол установки ключей (Key Agreement)
///
/// ## Ответственность
/// - Проверка подлинности signed prekey через подпись identity ключом
/// - Установка общего секретного ключа через DH + HKDF
///
/// ## Не отвечает за:
/// - Шифрование сообщений (это делает SecureMessageCodec)
/// - Управление беседами (это делает SessionManager)
/// - Хранение ключей (это делает IdentityKeyManager / KeyMaterialStore)
/// - Одноразовость OPK: её обеспечивает издатель bundle (сервер), который
///   удаляет выданный OPK. Локально использованные OPK не помечаются.
pub trait KeyAgreement<P: CryptoProvider> {
    /// Публичные ключи получателя, полученные от издателя
    type PublicKeyBundle: Clone + Serialize + for<'de> Deserialize<'de>;

    /// Приватный материал получателя (SPK + пул OPK)
    type LocalKeyMaterial;

    /// Общий секретный ключ
    type SharedSecret;

    /// Выполнить handshake как инициатор
    ///
    /// # Ошибки
    /// - `SignatureVerificationError`: подпись SPK не прошла, до любых DH
    /// - `KeyImportError` / `KeyAgreementError`: обязательный DH(EK, SPK) невозможен
    fn establish_session(
        remote_bundle: &Self::PublicKeyBundle,
    ) -> Result<InitiatorSession<Self::SharedSecret>, CryptoError>;

    /// Выполнить handshake как получатель
    ///
    /// Неизвестный `used_opk_id` не ошибка: DH с OPK пропускается.
    fn complete_session(
        local: &Self::LocalKeyMaterial,
        remote_ephemeral: &PublicJwk,
        used_opk_id: Option<&OneTimePreKeyId>,
    ) -> Result<Self::SharedSecret, CryptoError>;
}

pub mod key_message;
pub mod x3dh;

pub use x3dh::X3DHProtocol;
