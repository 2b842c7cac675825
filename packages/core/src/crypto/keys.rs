// Управление ключами устройства
// Identity key, signed prekey, пул one-time prekeys и публичный bundle

use crate::config::Config;
use crate::crypto::handshake::{BundlePreKey, PublicKeyBundle};
use crate::crypto::jwk::{PublicJwk, SymmetricJwk};
use crate::crypto::jws;
use crate::crypto::CryptoProvider;
use crate::error::CryptoError;
use crate::storage::key_material::KeyMaterialStore;
use crate::storage::KeyValueStore;
use crate::utils::error::{Result, WhisprError};
use crate::utils::logging::fingerprint;
use std::fmt;
use tracing::{debug, info};
use zeroize::Zeroizing;

/// Длина симметричного ключа AES-256-GCM
pub const SYMMETRIC_KEY_LENGTH: usize = 32;

/// Identity ключ (ECDSA), долгоживущий, не ротируется
pub struct IdentityKeyPair<P: CryptoProvider> {
    pub private_key: P::SigningKey,
    pub public_key: P::VerifyingKey,
}

/// Signed prekey (ECDH) + compact JWS `{spk}` от identity ключа
pub struct SignedPreKey<P: CryptoProvider> {
    pub private_key: P::AgreementPrivateKey,
    pub public_key: P::AgreementPublicKey,
    pub signature: String,
}

/// One-time prekey (ECDH) с локальным порядковым id
pub struct OneTimePreKey<P: CryptoProvider> {
    pub id: u32,
    pub private_key: P::AgreementPrivateKey,
    pub public_key: P::AgreementPublicKey,
}

/// Весь приватный материал устройства
pub struct KeyMaterial<P: CryptoProvider> {
    pub identity: IdentityKeyPair<P>,
    pub signed_prekey: SignedPreKey<P>,
    pub one_time_prekeys: Vec<OneTimePreKey<P>>,
}

impl<P: CryptoProvider> KeyMaterial<P> {
    pub fn find_one_time_prekey(&self, id: u32) -> Option<&OneTimePreKey<P>> {
        self.one_time_prekeys.iter().find(|opk| opk.id == id)
    }

    /// Публичный bundle из сохранённого материала
    pub fn public_bundle(&self) -> std::result::Result<PublicKeyBundle, CryptoError> {
        build_public_bundle(&self.identity, &self.signed_prekey, &self.one_time_prekeys)
    }
}

/// Симметричный ключ AES-256-GCM (обнуляется при drop)
#[derive(Clone)]
pub struct SymmetricKey(Zeroizing<[u8; SYMMETRIC_KEY_LENGTH]>);

impl SymmetricKey {
    pub fn generate<P: CryptoProvider>() -> std::result::Result<Self, CryptoError> {
        let bytes = P::generate_symmetric_key(SYMMETRIC_KEY_LENGTH)?;
        Self::from_slice(&bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> std::result::Result<Self, CryptoError> {
        if bytes.len() != SYMMETRIC_KEY_LENGTH {
            return Err(CryptoError::KeyImportError(format!(
                "Symmetric key must be {} bytes, got {}",
                SYMMETRIC_KEY_LENGTH,
                bytes.len()
            )));
        }
        let mut key = Zeroizing::new([0u8; SYMMETRIC_KEY_LENGTH]);
        key.copy_from_slice(bytes);
        Ok(Self(key))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0[..]
    }

    pub fn to_jwk(&self) -> SymmetricJwk {
        SymmetricJwk::new(self.as_bytes())
    }

    pub fn from_jwk(jwk: &SymmetricJwk) -> std::result::Result<Self, CryptoError> {
        Self::from_slice(&jwk.key_bytes()?)
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(<redacted>)")
    }
}

/// Ключи одной беседы: симметричный ключ + подписывающая пара
///
/// Создаются инициатором (или создателем группы) и передаются остальным
/// участникам внутри conversation key message.
pub struct ConversationKeys<P: CryptoProvider> {
    pub symmetric_key: SymmetricKey,
    pub signing_key: P::SigningKey,
    pub signing_public: P::VerifyingKey,
}

impl<P: CryptoProvider> ConversationKeys<P> {
    pub fn generate() -> std::result::Result<Self, CryptoError> {
        let symmetric_key = SymmetricKey::generate::<P>()?;
        let (signing_key, signing_public) = P::generate_signature_keys()?;
        Ok(Self {
            symmetric_key,
            signing_key,
            signing_public,
        })
    }
}

impl<P: CryptoProvider> Clone for ConversationKeys<P> {
    fn clone(&self) -> Self {
        Self {
            symmetric_key: self.symmetric_key.clone(),
            signing_key: self.signing_key.clone(),
            signing_public: self.signing_public.clone(),
        }
    }
}

/// Результат инициализации устройства
#[derive(Debug, Clone)]
pub struct DeviceRegistration {
    pub public_bundle: PublicKeyBundle,
    /// Та же подпись SPK, что и в bundle (для издателей, которые хранят её отдельно)
    pub signature: String,
}

/// Менеджер ключей устройства
///
/// Генерация ключей - без состояния; персистентность - через
/// [`KeyMaterialStore`] поверх внедрённого [`KeyValueStore`].
/// Менеджер не проверяет, есть ли уже ключи: это делает вызывающий
/// (см. [`IdentityKeyManager::has_key_material`]).
pub struct IdentityKeyManager<P: CryptoProvider, S> {
    store: KeyMaterialStore<P, S>,
}

impl<P: CryptoProvider, S> IdentityKeyManager<P, S> {
    /// Создать identity ключ (ECDSA)
    pub fn generate_identity() -> std::result::Result<IdentityKeyPair<P>, CryptoError> {
        let (private_key, public_key) = P::generate_signature_keys()?;
        let public_jwk = P::export_verifying_key(&public_key)?;
        debug!(
            target: "crypto::keys",
            identity = %public_fingerprint(&public_jwk),
            "Generated identity key"
        );
        Ok(IdentityKeyPair {
            private_key,
            public_key,
        })
    }

    /// Создать signed prekey и подписать его публичный JWK identity ключом
    pub fn generate_signed_prekey(
        identity_private: &P::SigningKey,
    ) -> std::result::Result<SignedPreKey<P>, CryptoError> {
        let (private_key, public_key) = P::generate_agreement_keys()?;
        let public_jwk = P::export_agreement_public_key(&public_key)?;
        let signature = jws::sign_prekey::<P>(identity_private, &public_jwk)?;

        debug!(
            target: "crypto::keys",
            spk = %public_fingerprint(&public_jwk),
            "Generated signed prekey"
        );

        Ok(SignedPreKey {
            private_key,
            public_key,
            signature,
        })
    }

    /// Создать `count` one-time prekeys с id 0..count-1
    pub fn generate_one_time_prekeys(
        count: usize,
    ) -> std::result::Result<Vec<OneTimePreKey<P>>, CryptoError> {
        let count = u32::try_from(count).map_err(|_| {
            CryptoError::InvalidInputError(format!("Too many one-time prekeys: {}", count))
        })?;

        let mut prekeys = Vec::with_capacity(count as usize);
        for id in 0..count {
            let (private_key, public_key) = P::generate_agreement_keys()?;
            prekeys.push(OneTimePreKey {
                id,
                private_key,
                public_key,
            });
        }

        debug!(target: "crypto::keys", count = prekeys.len(), "Generated one-time prekeys");
        Ok(prekeys)
    }

    /// Собрать публичный bundle (без приватных компонентов)
    pub fn export_public_bundle(
        identity: &IdentityKeyPair<P>,
        signed_prekey: &SignedPreKey<P>,
        one_time_prekeys: &[OneTimePreKey<P>],
    ) -> std::result::Result<PublicKeyBundle, CryptoError> {
        build_public_bundle(identity, signed_prekey, one_time_prekeys)
    }
}

impl<P: CryptoProvider, S: KeyValueStore> IdentityKeyManager<P, S> {
    pub fn new(store: S) -> Self {
        Self {
            store: KeyMaterialStore::new(store),
        }
    }

    /// Есть ли уже сохранённый ключевой материал
    pub fn has_key_material(&self) -> Result<bool> {
        self.store.exists()
    }

    /// Identity + SPK + пул OPK; всё приватное сохраняется, возвращается bundle
    ///
    /// Каждый вызов перезаписывает материал устройства новыми ключами.
    pub fn initialize_device(&self) -> Result<DeviceRegistration> {
        let identity = Self::generate_identity()?;
        let signed_prekey = Self::generate_signed_prekey(&identity.private_key)?;
        let one_time_prekeys =
            Self::generate_one_time_prekeys(Config::global().one_time_prekey_count)?;

        self.store
            .save(&identity, &signed_prekey, &one_time_prekeys)?;

        let public_bundle =
            Self::export_public_bundle(&identity, &signed_prekey, &one_time_prekeys)?;

        info!(
            target: "crypto::keys",
            identity = %public_fingerprint(&public_bundle.identity_key),
            opk_count = public_bundle.one_time_pre_keys.len(),
            "Device key material initialized"
        );

        Ok(DeviceRegistration {
            signature: signed_prekey.signature.clone(),
            public_bundle,
        })
    }

    /// Загрузить материал; `NotFound`, если устройство не инициализировано
    pub fn load(&self) -> Result<KeyMaterial<P>> {
        self.store.load()
    }

    /// Публичный bundle из сохранённого материала
    pub fn public_bundle(&self) -> Result<PublicKeyBundle> {
        let material = self.load()?;
        material.public_bundle().map_err(WhisprError::from)
    }
}

fn build_public_bundle<P: CryptoProvider>(
    identity: &IdentityKeyPair<P>,
    signed_prekey: &SignedPreKey<P>,
    one_time_prekeys: &[OneTimePreKey<P>],
) -> std::result::Result<PublicKeyBundle, CryptoError> {
    let one_time_pre_keys = one_time_prekeys
        .iter()
        .map(|opk| {
            Ok(BundlePreKey {
                id: opk.id.into(),
                key: P::export_agreement_public_key(&opk.public_key)?,
            })
        })
        .collect::<std::result::Result<Vec<_>, CryptoError>>()?;

    Ok(PublicKeyBundle {
        identity_key: P::export_verifying_key(&identity.public_key)?,
        signed_prekey: P::export_agreement_public_key(&signed_prekey.public_key)?,
        prekey_signature: signed_prekey.signature.clone(),
        one_time_pre_keys,
        otp_key: None,
    })
}

/// Отпечаток публичного JWK для логов
pub(crate) fn public_fingerprint(jwk: &PublicJwk) -> String {
    fingerprint(format!("{}.{}", jwk.x, jwk.y).as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::jws::verify_prekey_signature;
    use crate::crypto::suites::p256::P256SuiteProvider;
    use crate::storage::memory::MemoryStore;

    type Suite = P256SuiteProvider;
    type Manager = IdentityKeyManager<Suite, MemoryStore>;

    #[test]
    fn test_signed_prekey_signature_verifies() {
        let identity = Manager::generate_identity().unwrap();
        let spk = Manager::generate_signed_prekey(&identity.private_key).unwrap();
        let spk_jwk = Suite::export_agreement_public_key(&spk.public_key).unwrap();

        assert!(
            verify_prekey_signature::<Suite>(&identity.public_key, &spk.signature, &spk_jwk).is_ok()
        );
    }

    #[test]
    fn test_one_time_prekey_ids_are_sequential() {
        let opks = Manager::generate_one_time_prekeys(5).unwrap();
        let ids: Vec<u32> = opks.iter().map(|k| k.id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_initialize_device_persists_and_exports() {
        let manager = Manager::new(MemoryStore::new());
        assert!(!manager.has_key_material().unwrap());

        let registration = manager.initialize_device().unwrap();
        assert!(manager.has_key_material().unwrap());
        assert_eq!(
            registration.public_bundle.one_time_pre_keys.len(),
            Config::global().one_time_prekey_count
        );
        assert_eq!(registration.signature, registration.public_bundle.prekey_signature);

        let bundle = manager.public_bundle().unwrap();
        assert_eq!(bundle, registration.public_bundle);
    }

    #[test]
    fn test_load_without_material_is_not_found() {
        let manager = Manager::new(MemoryStore::new());
        assert!(matches!(manager.load(), Err(WhisprError::NotFound(_))));
    }

    #[test]
    fn test_symmetric_key_length_is_checked() {
        assert!(SymmetricKey::from_slice(&[0u8; 16]).is_err());
        let key = SymmetricKey::generate::<Suite>().unwrap();
        assert_eq!(key.as_bytes().len(), 32);
        assert_eq!(format!("{:?}", key), "SymmetricKey(<redacted>)");
    }
}
