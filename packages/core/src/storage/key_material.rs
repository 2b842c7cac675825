// Хранилище ключевого материала устройства
//
// Одна JSON-запись под `Config::key_material_storage_key`, все ключи - JWK.
// Записывается один раз за жизнь устройства; обновления/слияния нет.

use crate::config::Config;
use crate::crypto::jws;
use crate::crypto::keys::{IdentityKeyPair, KeyMaterial, OneTimePreKey, SignedPreKey};
use crate::crypto::CryptoProvider;
use crate::storage::models::{StoredKeyMaterial, StoredOneTimePreKey};
use crate::storage::KeyValueStore;
use crate::utils::error::{Result, WhisprError};
use std::marker::PhantomData;
use tracing::{debug, warn};
use zeroize::Zeroizing;

pub struct KeyMaterialStore<P: CryptoProvider, S> {
    store: S,
    _phantom: PhantomData<P>,
}

impl<P: CryptoProvider, S: KeyValueStore> KeyMaterialStore<P, S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            _phantom: PhantomData,
        }
    }

    fn storage_key() -> &'static str {
        Config::global().key_material_storage_key
    }

    pub fn exists(&self) -> Result<bool> {
        Ok(self.store.get(Self::storage_key())?.is_some())
    }

    /// Сохранить весь материал одной записью (публичные и приватные JWK)
    pub fn save(
        &self,
        identity: &IdentityKeyPair<P>,
        signed_prekey: &SignedPreKey<P>,
        one_time_prekeys: &[OneTimePreKey<P>],
    ) -> Result<()> {
        let opks = one_time_prekeys
            .iter()
            .map(|opk| {
                Ok(StoredOneTimePreKey {
                    id: opk.id,
                    public: P::export_agreement_public_key(&opk.public_key)?,
                    private: P::export_agreement_private_key(&opk.private_key)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let record = StoredKeyMaterial {
            ik_pub: P::export_verifying_key(&identity.public_key)?,
            ik_priv: P::export_signing_key(&identity.private_key)?,
            spk_pub: P::export_agreement_public_key(&signed_prekey.public_key)?,
            spk_priv: P::export_agreement_private_key(&signed_prekey.private_key)?,
            spk_signature: Some(signed_prekey.signature.clone()),
            opks,
        };

        let bytes = Zeroizing::new(serde_json::to_vec(&record)?);
        self.store.set(Self::storage_key(), &bytes)?;

        debug!(
            target: "storage",
            opk_count = record.opks.len(),
            "Key material saved"
        );
        Ok(())
    }

    /// Загрузить и импортировать весь материал
    ///
    /// # Ошибки
    /// - `NotFound`: устройство не инициализировано
    /// - `CryptoError(KeyImportError)`: повреждённый JWK
    pub fn load(&self) -> Result<KeyMaterial<P>> {
        let bytes = Zeroizing::new(self.store.get(Self::storage_key())?.ok_or_else(|| {
            WhisprError::NotFound("No key material found in storage".to_string())
        })?);

        let record: StoredKeyMaterial = serde_json::from_slice(&bytes)?;

        let identity = IdentityKeyPair {
            private_key: P::import_signing_key(&record.ik_priv)?,
            public_key: P::import_verifying_key(&record.ik_pub)?,
        };

        let spk_public = P::import_agreement_public_key(&record.spk_pub)?;
        let signature = match &record.spk_signature {
            Some(signature) => signature.clone(),
            None => {
                // Старые записи без подписи: подписываем SPK заново
                warn!(target: "storage", "Key material has no SPK signature, re-signing");
                jws::sign_prekey::<P>(&identity.private_key, &record.spk_pub)?
            }
        };

        let signed_prekey = SignedPreKey {
            private_key: P::import_agreement_private_key(&record.spk_priv)?,
            public_key: spk_public,
            signature,
        };

        let one_time_prekeys = record
            .opks
            .iter()
            .map(|opk| {
                Ok(OneTimePreKey {
                    id: opk.id,
                    private_key: P::import_agreement_private_key(&opk.private)?,
                    public_key: P::import_agreement_public_key(&opk.public)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            target: "storage",
            opk_count = one_time_prekeys.len(),
            "Key material loaded"
        );

        Ok(KeyMaterial {
            identity,
            signed_prekey,
            one_time_prekeys,
        })
    }
}
