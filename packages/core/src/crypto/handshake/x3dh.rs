//! X3DH (Extended Triple Diffie-Hellman) Protocol
//!
//! Вариант протокола без DH с identity ключами: identity ключ здесь -
//! ECDSA и участвует только в подписи signed prekey.
//!
//! ## Ключи
//!
//! ### Alice (инициатор)
//! - **EK_A**: Ephemeral Key (одноразовый, генерируется для каждой сессии)
//!
//! ### Bob (получатель)
//! - **IK_B**: Identity Key (ECDSA, подписывает SPK_B)
//! - **SPK_B**: Signed Prekey (ECDH)
//! - **OPK_B**: One-Time Prekey (ECDH, необязательный)
//!
//! ## Протокол
//!
//! ```text
//! Alice                                                Bob
//! =====                                                ===
//!
//! 1. Получает (IK_B, SPK_B, Sig, [OPK_B]) от сервера
//! 2. Проверяет Sig(SPK_B) ключом IK_B
//! 3. Генерирует EK_A
//! 4. Вычисляет:
//!    DH1 = DH(EK_A, SPK_B)            обязательный
//!    DH2 = DH(EK_A, OPK_B)            если OPK есть
//!    SK  = HKDF(DH1 || DH2)
//!
//! 5. Отправляет EK_A_pub + usedOPKId →
//!
//!                                                      1. DH1 = DH(SPK_B, EK_A)
//!                                                      2. DH2 = DH(OPK_B, EK_A), OPK по id
//!                                                      3. SK  = HKDF(DH1 || DH2)
//!
//! SK_Alice = SK_Bob
//! ```
//!
//! ## Деградация до 1-DH
//!
//! Сбой DH2 не прерывает handshake: инициатор не отправляет `usedOPKId`,
//! если OPK не вошёл в секрет; получатель пропускает DH2, если OPK с таким
//! id у него нет. В обоих случаях ключ выводится только из DH1.

use crate::config::Config;
use crate::crypto::handshake::{InitiatorSession, KeyAgreement, OneTimePreKeyId, PublicKeyBundle};
use crate::crypto::jwk::PublicJwk;
use crate::crypto::jws;
use crate::crypto::keys::{public_fingerprint, KeyMaterial, SymmetricKey, SYMMETRIC_KEY_LENGTH};
use crate::crypto::provider::CryptoProvider;
use crate::error::CryptoError;
use std::marker::PhantomData;
use tracing::{debug, trace, warn};
use zeroize::Zeroizing;

/// X3DH Protocol Implementation
///
/// Stateless struct - все данные передаются через параметры методов.
pub struct X3DHProtocol<P: CryptoProvider> {
    _phantom: PhantomData<P>,
}

impl<P: CryptoProvider> X3DHProtocol<P> {
    /// SK = HKDF-SHA256(salt = пусто, ikm = DH1 || DH2?, info = x3dh_info)
    fn derive_shared_key(dh1: &[u8], dh2: Option<&[u8]>) -> Result<SymmetricKey, CryptoError> {
        let mut ikm = Zeroizing::new(Vec::with_capacity(dh1.len() * 2));
        ikm.extend_from_slice(dh1);
        if let Some(dh2) = dh2 {
            ikm.extend_from_slice(dh2);
        }

        let okm = P::hkdf_derive_key(
            b"",
            &ikm,
            Config::global().x3dh_info.as_bytes(),
            SYMMETRIC_KEY_LENGTH,
        )
        .map_err(|e| CryptoError::KeyDerivationError(format!("HKDF derivation failed: {}", e)))?;

        SymmetricKey::from_slice(&okm)
    }

    fn one_time_prekey_dh(
        ephemeral_private: &P::AgreementPrivateKey,
        opk: &PublicJwk,
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        let opk_public = P::import_agreement_public_key(opk)?;
        P::diffie_hellman(ephemeral_private, &opk_public)
    }
}

impl<P: CryptoProvider> KeyAgreement<P> for X3DHProtocol<P> {
    type PublicKeyBundle = PublicKeyBundle;
    type LocalKeyMaterial = KeyMaterial<P>;
    type SharedSecret = SymmetricKey;

    fn establish_session(
        remote_bundle: &Self::PublicKeyBundle,
    ) -> Result<InitiatorSession<Self::SharedSecret>, CryptoError> {
        debug!(
            target: "crypto::x3dh",
            peer_identity = %public_fingerprint(&remote_bundle.identity_key),
            "Starting X3DH as initiator"
        );

        // 1. Подпись SPK - до любых DH
        debug!(target: "crypto::x3dh", "Step 1: Verifying signed prekey signature");
        let identity_key = P::import_verifying_key(&remote_bundle.identity_key).map_err(|e| {
            CryptoError::SignatureVerificationError(format!("Invalid identity key: {}", e))
        })?;
        jws::verify_prekey_signature::<P>(
            &identity_key,
            &remote_bundle.prekey_signature,
            &remote_bundle.signed_prekey,
        )
        .map_err(|e| {
            warn!(target: "crypto::x3dh", error = %e, "Signed prekey verification failed");
            e
        })?;

        let signed_prekey = P::import_agreement_public_key(&remote_bundle.signed_prekey)
            .map_err(|e| CryptoError::KeyImportError(format!("Signed prekey: {}", e)))?;

        // 2. Новый ephemeral key на каждую сессию
        let (ephemeral_private, ephemeral_public) = P::generate_agreement_keys()
            .map_err(|e| {
                CryptoError::KeyGenerationError(format!("Failed to generate ephemeral key: {}", e))
            })?;

        // 3. Первый доступный OPK
        let selected_opk = remote_bundle.select_one_time_prekey();

        // 4. DH1 = DH(EK_A, SPK_B)
        trace!(target: "crypto::x3dh", "Computing DH1 = DH(EK_A, SPK_B)");
        let dh1 = P::diffie_hellman(&ephemeral_private, &signed_prekey)
            .map_err(|e| CryptoError::KeyAgreementError(format!("DH1 (EK, SPK) failed: {}", e)))?;

        // 5. DH2 = DH(EK_A, OPK_B), сбой не фатален
        let mut used_opk_id = None;
        let dh2 = match selected_opk {
            Some(opk) => {
                trace!(target: "crypto::x3dh", opk_id = %opk.id, "Computing DH2 = DH(EK_A, OPK_B)");
                match Self::one_time_prekey_dh(&ephemeral_private, &opk.key) {
                    Ok(dh2) => {
                        used_opk_id = Some(opk.id.clone());
                        Some(dh2)
                    }
                    Err(e) => {
                        warn!(
                            target: "crypto::x3dh",
                            opk_id = %opk.id,
                            error = %e,
                            "One-time prekey unusable, continuing with DH1 only"
                        );
                        None
                    }
                }
            }
            None => {
                debug!(target: "crypto::x3dh", "Bundle offers no one-time prekey, using DH1 only");
                None
            }
        };

        // 6-7. SPK первым, затем OPK
        let shared_key = Self::derive_shared_key(&dh1, dh2.as_ref().map(|dh| dh.as_slice()))?;
        let ephemeral_public = P::export_agreement_public_key(&ephemeral_public)?;

        debug!(
            target: "crypto::x3dh",
            used_opk = used_opk_id.is_some(),
            "X3DH completed successfully as initiator"
        );

        Ok(InitiatorSession {
            shared_key,
            ephemeral_public,
            used_opk_id,
        })
    }

    fn complete_session(
        local: &Self::LocalKeyMaterial,
        remote_ephemeral: &PublicJwk,
        used_opk_id: Option<&OneTimePreKeyId>,
    ) -> Result<Self::SharedSecret, CryptoError> {
        debug!(
            target: "crypto::x3dh",
            ephemeral = %public_fingerprint(remote_ephemeral),
            "Starting X3DH as responder"
        );

        // 1. EK_A
        let ephemeral_public = P::import_agreement_public_key(remote_ephemeral)
            .map_err(|e| CryptoError::KeyImportError(format!("Ephemeral key: {}", e)))?;

        // 2. DH1 = DH(SPK_B, EK_A)
        let dh1 = P::diffie_hellman(&local.signed_prekey.private_key, &ephemeral_public)
            .map_err(|e| CryptoError::KeyAgreementError(format!("DH1 (SPK, EK) failed: {}", e)))?;

        // 3. DH2 = DH(OPK_B, EK_A), если OPK найден
        let dh2 = match used_opk_id {
            Some(id) => match local.one_time_prekeys.iter().find(|opk| id.matches(opk.id)) {
                Some(opk) => match P::diffie_hellman(&opk.private_key, &ephemeral_public) {
                    Ok(dh2) => Some(dh2),
                    Err(e) => {
                        warn!(
                            target: "crypto::x3dh",
                            opk_id = %id,
                            error = %e,
                            "DH2 (OPK, EK) failed, continuing with DH1 only"
                        );
                        None
                    }
                },
                None => {
                    warn!(
                        target: "crypto::x3dh",
                        opk_id = %id,
                        "One-time prekey not found locally, continuing with DH1 only"
                    );
                    None
                }
            },
            None => None,
        };

        // 4. Тот же порядок и та же деривация, что у инициатора
        let shared_key = Self::derive_shared_key(&dh1, dh2.as_ref().map(|dh| dh.as_slice()))?;

        debug!(
            target: "crypto::x3dh",
            used_opk = dh2.is_some(),
            "X3DH completed successfully as responder"
        );

        Ok(shared_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::IdentityKeyManager;
    use crate::crypto::suites::p256::P256SuiteProvider;
    use crate::storage::memory::MemoryStore;

    type Suite = P256SuiteProvider;
    type X3DH = X3DHProtocol<Suite>;

    fn bob() -> (KeyMaterial<Suite>, PublicKeyBundle) {
        let manager = IdentityKeyManager::<Suite, MemoryStore>::new(MemoryStore::new());
        let registration = manager.initialize_device().unwrap();
        (manager.load().unwrap(), registration.public_bundle)
    }

    #[test]
    fn test_initiator_and_responder_agree() {
        let (bob_keys, bundle) = bob();
        let session = X3DH::establish_session(&bundle).unwrap();
        assert_eq!(session.used_opk_id, Some(OneTimePreKeyId::Number(0)));

        let responder_key = X3DH::complete_session(
            &bob_keys,
            &session.ephemeral_public,
            session.used_opk_id.as_ref(),
        )
        .unwrap();
        assert_eq!(session.shared_key.as_bytes(), responder_key.as_bytes());
    }

    #[test]
    fn test_ephemeral_key_is_fresh_per_session() {
        let (_, bundle) = bob();
        let a = X3DH::establish_session(&bundle).unwrap();
        let b = X3DH::establish_session(&bundle).unwrap();
        assert_ne!(a.ephemeral_public, b.ephemeral_public);
        assert_ne!(a.shared_key.as_bytes(), b.shared_key.as_bytes());
    }

    #[test]
    fn test_opk_contributes_to_secret() {
        let (bob_keys, bundle) = bob();
        let session = X3DH::establish_session(&bundle).unwrap();

        // Без DH2 получатель выводит другой ключ
        let without_opk =
            X3DH::complete_session(&bob_keys, &session.ephemeral_public, None).unwrap();
        assert_ne!(session.shared_key.as_bytes(), without_opk.as_bytes());
    }
}
