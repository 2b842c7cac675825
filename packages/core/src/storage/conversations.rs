// Хранилище ключей бесед
//
// Вся таблица - один JSON-объект `convId → запись` под
// `Config::conversations_storage_key`. Любое изменение: прочитать таблицу,
// изменить, записать целиком. Запись либо есть полностью, либо её нет.

use crate::config::Config;
use crate::crypto::keys::SymmetricKey;
use crate::crypto::CryptoProvider;
use crate::storage::models::{
    ConversationSummary, ConversationTable, ConversationType, StoredConversation,
    StoredSignKeyPair,
};
use crate::storage::KeyValueStore;
use crate::utils::error::Result;
use parking_lot::Mutex;
use std::marker::PhantomData;
use tracing::{debug, info};
use zeroize::Zeroizing;

/// Беседа с импортированными ключами
pub struct ConversationRecord<P: CryptoProvider> {
    pub conv_id: String,
    /// Собеседник (DIRECT) или группа (GROUP)
    pub peer_or_group_id: Option<String>,
    pub symmetric_key: SymmetricKey,
    pub signing_key: P::SigningKey,
    pub signing_public: P::VerifyingKey,
    /// Подписывающий ключ собеседника, известен после acceptance
    pub their_verification_key: Option<P::VerifyingKey>,
    pub initiator: bool,
    pub conversation_type: ConversationType,
    /// Unix ms
    pub created_at: i64,
}

impl<P: CryptoProvider> ConversationRecord<P> {
    /// Ключ для проверки входящих конвертов
    ///
    /// Все участники подписывают общей парой беседы, поэтому без ключа
    /// собеседника проверяем собственным публичным.
    pub fn verification_key(&self) -> &P::VerifyingKey {
        self.their_verification_key
            .as_ref()
            .unwrap_or(&self.signing_public)
    }

    fn to_stored(&self) -> Result<StoredConversation> {
        let their_sign_pub_key = match &self.their_verification_key {
            Some(key) => Some(P::export_verifying_key(key)?),
            None => None,
        };

        Ok(StoredConversation {
            conv_id: self.conv_id.clone(),
            sym_key: self.symmetric_key.to_jwk(),
            sign_key_pair: StoredSignKeyPair {
                private_key: P::export_signing_key(&self.signing_key)?,
                public_key: P::export_verifying_key(&self.signing_public)?,
            },
            their_sign_pub_key,
            initiator: self.initiator,
            created_at: self.created_at,
            conversation_type: self.conversation_type,
            user_id: self.peer_or_group_id.clone(),
        })
    }

    fn from_stored(stored: &StoredConversation) -> Result<Self> {
        let their_verification_key = match &stored.their_sign_pub_key {
            Some(jwk) => Some(P::import_verifying_key(jwk)?),
            None => None,
        };

        Ok(Self {
            conv_id: stored.conv_id.clone(),
            peer_or_group_id: stored.user_id.clone(),
            symmetric_key: SymmetricKey::from_jwk(&stored.sym_key)?,
            signing_key: P::import_signing_key(&stored.sign_key_pair.private_key)?,
            signing_public: P::import_verifying_key(&stored.sign_key_pair.public_key)?,
            their_verification_key,
            initiator: stored.initiator,
            conversation_type: stored.conversation_type,
            created_at: stored.created_at,
        })
    }
}

impl<P: CryptoProvider> Clone for ConversationRecord<P> {
    fn clone(&self) -> Self {
        Self {
            conv_id: self.conv_id.clone(),
            peer_or_group_id: self.peer_or_group_id.clone(),
            symmetric_key: self.symmetric_key.clone(),
            signing_key: self.signing_key.clone(),
            signing_public: self.signing_public.clone(),
            their_verification_key: self.their_verification_key.clone(),
            initiator: self.initiator,
            conversation_type: self.conversation_type,
            created_at: self.created_at,
        }
    }
}

/// Локальная таблица бесед поверх [`KeyValueStore`]
pub struct ConversationKeyStore<P: CryptoProvider, S> {
    store: S,
    /// Сериализует read-modify-write всей таблицы
    write_lock: Mutex<()>,
    _phantom: PhantomData<P>,
}

impl<P: CryptoProvider, S: KeyValueStore> ConversationKeyStore<P, S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
            _phantom: PhantomData,
        }
    }

    fn read_table(&self) -> Result<ConversationTable> {
        match self.store.get(Config::global().conversations_storage_key)? {
            Some(bytes) => {
                let bytes = Zeroizing::new(bytes);
                Ok(serde_json::from_slice(&bytes)?)
            }
            None => Ok(ConversationTable::new()),
        }
    }

    fn write_table(&self, table: &ConversationTable) -> Result<()> {
        let bytes = Zeroizing::new(serde_json::to_vec(table)?);
        self.store
            .set(Config::global().conversations_storage_key, &bytes)
    }

    /// Upsert записи под её `conv_id`
    pub fn save(&self, record: &ConversationRecord<P>) -> Result<String> {
        let stored = record.to_stored()?;

        let _guard = self.write_lock.lock();
        let mut table = self.read_table()?;
        table.insert(record.conv_id.clone(), stored);
        self.write_table(&table)?;

        info!(
            target: "storage",
            conv_id = %record.conv_id,
            conversation_type = %record.conversation_type,
            initiator = record.initiator,
            "Conversation saved"
        );
        Ok(record.conv_id.clone())
    }

    /// DIRECT беседа с собеседником
    pub fn find_by_peer(&self, peer_id: &str) -> Result<Option<String>> {
        let table = self.read_table()?;
        Ok(table
            .values()
            .find(|c| {
                c.conversation_type == ConversationType::Direct
                    && c.user_id.as_deref() == Some(peer_id)
            })
            .map(|c| c.conv_id.clone()))
    }

    /// Известна ли локально GROUP беседа с этим id
    pub fn find_by_conv_id(&self, conv_id: &str) -> Result<Option<String>> {
        let table = self.read_table()?;
        Ok(table
            .values()
            .find(|c| c.conversation_type == ConversationType::Group && c.conv_id == conv_id)
            .map(|c| c.conv_id.clone()))
    }

    pub fn load(&self, conv_id: &str) -> Result<Option<ConversationRecord<P>>> {
        let table = self.read_table()?;
        match table.get(conv_id) {
            Some(stored) => Ok(Some(ConversationRecord::from_stored(stored)?)),
            None => {
                debug!(target: "storage", conv_id = %conv_id, "Conversation not found");
                Ok(None)
            }
        }
    }

    /// Заполнить подписывающий ключ собеседника; `false`, если беседы нет
    pub fn update_peer_verification_key(
        &self,
        conv_id: &str,
        key: &P::VerifyingKey,
    ) -> Result<bool> {
        let jwk = P::export_verifying_key(key)?;

        let _guard = self.write_lock.lock();
        let mut table = self.read_table()?;
        let Some(stored) = table.get_mut(conv_id) else {
            return Ok(false);
        };
        stored.their_sign_pub_key = Some(jwk);
        self.write_table(&table)?;

        debug!(target: "storage", conv_id = %conv_id, "Peer verification key stored");
        Ok(true)
    }

    /// Все беседы без импорта ключей, по времени создания
    pub fn list(&self) -> Result<Vec<ConversationSummary>> {
        let table = self.read_table()?;
        let mut summaries: Vec<ConversationSummary> =
            table.values().map(ConversationSummary::from).collect();
        summaries.sort_by_key(|s| s.created_at);
        Ok(summaries)
    }

    /// Удалить беседу по явному действию пользователя
    pub fn delete(&self, conv_id: &str) -> Result<bool> {
        let _guard = self.write_lock.lock();
        let mut table = self.read_table()?;
        if table.remove(conv_id).is_none() {
            return Ok(false);
        }
        self.write_table(&table)?;

        info!(target: "storage", conv_id = %conv_id, "Conversation deleted");
        Ok(true)
    }
}
