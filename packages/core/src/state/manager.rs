//! Менеджер сессий
//!
//! Связывает ключи устройства, X3DH, хранилище бесед и кодек сообщений.
//!
//! ## Жизненный цикл DIRECT беседы
//! ```text
//! Инициатор                                   Получатель
//! =========                                   ==========
//! start_direct_conversation(peer, bundle)
//!   → InitiationPayload          ── издатель ──▶ accept_conversation(pending)
//!   HANDSHAKE_IN_PROGRESS                          X3DH + key message
//! bind_conversation(peer, convId)                  запись сохранена
//!   запись сохранена                               ESTABLISHED
//! handle_acceptance(acceptance) ◀── издатель ──  → AcceptancePayload
//!   ESTABLISHED
//! ```
//!
//! Все методы принимают `&self`: таблица сессий и множество handshake'ов
//! "в полёте" защищены мьютексами, хранилище сериализует свои записи само.

use crate::config::Config;
use crate::crypto::handshake::key_message::{
    open_key_message, seal_key_message, ConversationKeyMessage,
};
use crate::crypto::handshake::{KeyAgreement, PublicKeyBundle, X3DHProtocol};
use crate::crypto::jwk::PublicJwk;
use crate::crypto::keys::{
    public_fingerprint, ConversationKeys, DeviceRegistration, IdentityKeyManager,
};
use crate::crypto::messaging::{OpenedMessage, SecureMessageCodec, SecureMessageEnvelope};
use crate::crypto::CryptoProvider;
use crate::protocol::messages::{
    AcceptancePayload, ChannelFrame, InitiationPayload, MessageFrame, PendingConversation,
};
use crate::protocol::transport::{KeyDirectory, MessageChannel};
use crate::protocol::validation;
use crate::state::session::{ConversationSession, SessionState};
use crate::storage::conversations::{ConversationKeyStore, ConversationRecord};
use crate::storage::models::{ConversationSummary, ConversationType};
use crate::storage::KeyValueStore;
use crate::utils::error::{Result, WhisprError};
use crate::utils::time::current_timestamp_millis;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// Приглашение одного участника группы
#[derive(Debug, Clone, PartialEq)]
pub struct MemberInvitation {
    pub member_id: String,
    pub payload: InitiationPayload,
}

/// Сообщение, принятое из канала
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub conversation_id: String,
    pub sender_id: String,
    pub sender_name: Option<String>,
    pub timestamp: i64,
    pub message: OpenedMessage,
}

struct SessionEntry<P: CryptoProvider> {
    session: ConversationSession,
    /// Ключи инициатора между start и bind; до bind нигде не сохраняются
    pending_keys: Option<ConversationKeys<P>>,
}

/// Держит ключ в множестве handshake'ов "в полёте" до drop
struct InFlightGuard<'a> {
    in_flight: &'a Mutex<HashSet<String>>,
    key: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.key);
    }
}

pub struct SessionManager<P: CryptoProvider, S> {
    user_id: String,
    keys: IdentityKeyManager<P, S>,
    conversations: ConversationKeyStore<P, S>,
    /// peer id (DIRECT) или group id (GROUP) → сессия
    sessions: Mutex<HashMap<String, SessionEntry<P>>>,
    in_flight: Mutex<HashSet<String>>,
}

impl<P: CryptoProvider, S: KeyValueStore + Clone> SessionManager<P, S> {
    pub fn new(user_id: &str, store: S) -> Result<Self> {
        if user_id.trim().is_empty() {
            return Err(WhisprError::InvalidInput("User id is empty".to_string()));
        }

        let configured = Config::global().suite_id;
        if P::suite_id() != configured {
            return Err(WhisprError::InvalidInput(format!(
                "Crypto suite {} does not match configured suite {}",
                P::suite_id(),
                configured
            )));
        }

        Ok(Self {
            user_id: user_id.to_string(),
            keys: IdentityKeyManager::new(store.clone()),
            conversations: ConversationKeyStore::new(store),
            sessions: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashSet::new()),
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    // ============================================
    // КЛЮЧИ УСТРОЙСТВА
    // ============================================

    /// Создать ключевой материал, только если его ещё нет
    pub fn ensure_device_keys(&self) -> Result<Option<DeviceRegistration>> {
        if self.keys.has_key_material()? {
            debug!(target: "state::session", "Device key material already present");
            return Ok(None);
        }
        Ok(Some(self.keys.initialize_device()?))
    }

    /// Инициализировать устройство и опубликовать bundle; `false`, если ключи уже были
    pub fn register<D: KeyDirectory + ?Sized>(&self, directory: &D) -> Result<bool> {
        match self.ensure_device_keys()? {
            Some(registration) => {
                directory.publish(&self.user_id, &registration.public_bundle)?;
                info!(
                    target: "state::session",
                    user_id = %self.user_id,
                    "Device registered and bundle published"
                );
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn public_bundle(&self) -> Result<PublicKeyBundle> {
        self.keys.public_bundle()
    }

    // ============================================
    // ИНИЦИАТОР
    // ============================================

    /// X3DH как инициатор; ничего не сохраняет до [`Self::bind_conversation`]
    ///
    /// # Ошибки
    /// - `HandshakeInProgress`: handshake с этим собеседником уже идёт
    /// - `SessionError`: DIRECT беседа с собеседником уже есть
    /// - `CryptoError(SignatureVerificationError)`: подпись SPK не сошлась
    pub fn start_direct_conversation(
        &self,
        peer_id: &str,
        bundle: &PublicKeyBundle,
    ) -> Result<InitiationPayload> {
        let _guard = self.acquire(peer_id)?;

        if let Some(conv_id) = self.conversations.find_by_peer(peer_id)? {
            return Err(WhisprError::SessionError(format!(
                "Conversation {} with {} already exists",
                conv_id, peer_id
            )));
        }

        self.begin_session(peer_id, ConversationType::Direct, true)?;

        let prepared = ConversationKeys::<P>::generate()
            .map_err(WhisprError::from)
            .and_then(|keys| {
                let identity = self.identity_public_jwk()?;
                let payload = self.build_initiation(bundle, &keys, &identity)?;
                Ok((keys, payload))
            });

        match prepared {
            Ok((keys, payload)) => {
                if let Some(entry) = self.sessions.lock().get_mut(peer_id) {
                    entry.pending_keys = Some(keys);
                }
                info!(
                    target: "state::session",
                    peer_id = %peer_id,
                    used_opk = payload.used_opk_id.is_some(),
                    "Direct conversation initiated"
                );
                Ok(payload)
            }
            Err(e) => {
                warn!(target: "state::session", peer_id = %peer_id, error = %e, "Handshake failed");
                self.discard(peer_id);
                Err(e)
            }
        }
    }

    /// Сохранить беседу под id, выданным издателем
    pub fn bind_conversation(&self, peer_id: &str, conversation_id: &str) -> Result<()> {
        let keys = {
            let sessions = self.sessions.lock();
            let entry = sessions.get(peer_id).ok_or_else(|| {
                WhisprError::NotFound(format!("No handshake in progress with {}", peer_id))
            })?;
            if entry.session.state() != SessionState::HandshakeInProgress {
                return Err(WhisprError::SessionError(format!(
                    "Conversation with {} is {}",
                    peer_id,
                    entry.session.state()
                )));
            }
            entry.pending_keys.clone().ok_or_else(|| {
                WhisprError::SessionError(format!(
                    "Handshake with {} is already bound",
                    peer_id
                ))
            })?
        };

        let record = Self::record_from_keys(
            conversation_id,
            peer_id,
            keys,
            true,
            ConversationType::Direct,
        );
        self.conversations.save(&record)?;

        if let Some(entry) = self.sessions.lock().get_mut(peer_id) {
            entry.session.bind(conversation_id);
            entry.pending_keys = None;
        }

        debug!(
            target: "state::session",
            peer_id = %peer_id,
            conv_id = %conversation_id,
            "Conversation bound"
        );
        Ok(())
    }

    /// Подтверждение от получателя: эхо ключа беседы должно совпасть с нашим
    pub fn handle_acceptance(&self, acceptance: &AcceptancePayload) -> Result<()> {
        let record = self
            .conversations
            .load(&acceptance.conversation_id)?
            .ok_or_else(|| {
                WhisprError::NotFound(format!(
                    "Conversation {} not found",
                    acceptance.conversation_id
                ))
            })?;

        let echoed = P::import_verifying_key(&acceptance.signing_public_key)?;
        if echoed != record.signing_public {
            warn!(
                target: "state::session",
                conv_id = %record.conv_id,
                echoed = %public_fingerprint(&acceptance.signing_public_key),
                "Acceptance does not confirm the conversation key"
            );
            return Err(WhisprError::SessionError(format!(
                "Acceptance for {} does not confirm the conversation key",
                record.conv_id
            )));
        }

        self.conversations
            .update_peer_verification_key(&record.conv_id, &echoed)?;

        let peer_id = record
            .peer_or_group_id
            .clone()
            .unwrap_or_else(|| record.conv_id.clone());
        self.mark_established(&peer_id, &record)?;

        info!(
            target: "state::session",
            conv_id = %record.conv_id,
            peer_id = %peer_id,
            "Conversation established (acceptance confirmed)"
        );
        Ok(())
    }

    /// Групповая беседа: один ключ и одна подписывающая пара на всех,
    /// доставка каждому участнику через отдельный X3DH
    ///
    /// Сбой любого участника отменяет всё: ничего не сохраняется.
    pub fn start_group_conversation(
        &self,
        group_id: &str,
        members: &[(String, PublicKeyBundle)],
    ) -> Result<Vec<MemberInvitation>> {
        if members.is_empty() {
            return Err(WhisprError::InvalidInput(format!(
                "Group {} has no members",
                group_id
            )));
        }

        let _guard = self.acquire(group_id)?;

        if self.conversations.find_by_conv_id(group_id)?.is_some() {
            return Err(WhisprError::SessionError(format!(
                "Group conversation {} already exists",
                group_id
            )));
        }

        self.begin_session(group_id, ConversationType::Group, true)?;

        let outcome = self
            .prepare_group(group_id, members)
            .and_then(|(keys, invitations)| {
                let record =
                    Self::record_from_keys(group_id, group_id, keys, true, ConversationType::Group);
                self.conversations.save(&record)?;
                Ok(invitations)
            });

        match outcome {
            Ok(invitations) => {
                if let Some(entry) = self.sessions.lock().get_mut(group_id) {
                    entry.session.bind(group_id);
                    entry.session.establish()?;
                }
                info!(
                    target: "state::session",
                    group_id = %group_id,
                    members = invitations.len(),
                    "Group conversation established"
                );
                Ok(invitations)
            }
            Err(e) => {
                warn!(
                    target: "state::session",
                    group_id = %group_id,
                    error = %e,
                    "Group handshake aborted"
                );
                self.discard(group_id);
                Err(e)
            }
        }
    }

    // ============================================
    // ПОЛУЧАТЕЛЬ
    // ============================================

    /// X3DH как получатель: открыть key message и сохранить беседу
    ///
    /// Повторный вызов для уже принятой беседы возвращает тот же ответ
    /// без повторного X3DH.
    pub fn accept_conversation(&self, pending: &PendingConversation) -> Result<AcceptancePayload> {
        validation::validate_initiation_payload(&pending.initial_payload)?;

        let session_key = match pending.conversation_type {
            ConversationType::Direct => pending.initiator_id.as_str(),
            ConversationType::Group => pending.id.as_str(),
        };

        let _guard = self.acquire(session_key)?;

        if let Some(record) = self.conversations.load(&pending.id)? {
            if record.initiator {
                return Err(WhisprError::SessionError(format!(
                    "Conversation {} was initiated on this device",
                    pending.id
                )));
            }
            debug!(
                target: "state::session",
                conv_id = %pending.id,
                "Conversation already accepted"
            );
            self.mark_established(session_key, &record)?;
            return self.acceptance_for(&record);
        }

        self.begin_session(session_key, pending.conversation_type, false)?;

        let outcome = self.open_pending(pending, session_key).and_then(|record| {
            self.conversations.save(&record)?;
            self.acceptance_for(&record)
        });

        match outcome {
            Ok(acceptance) => {
                if let Some(entry) = self.sessions.lock().get_mut(session_key) {
                    entry.session.bind(&pending.id);
                    entry.session.establish()?;
                }
                info!(
                    target: "state::session",
                    conv_id = %pending.id,
                    initiator_id = %pending.initiator_id,
                    conversation_type = %pending.conversation_type,
                    "Conversation accepted"
                );
                Ok(acceptance)
            }
            Err(e) => {
                warn!(
                    target: "state::session",
                    conv_id = %pending.id,
                    error = %e,
                    "Failed to accept conversation"
                );
                self.discard(session_key);
                Err(e)
            }
        }
    }

    /// Бросить незавершённый handshake
    ///
    /// Привязанная, но не подтверждённая запись инициатора удаляется вместе
    /// с сессией: следующий start начинает с нуля. Установленную беседу так
    /// не удалить, для этого есть [`Self::delete_conversation`].
    pub fn abandon(&self, peer_or_group_id: &str) -> Result<bool> {
        let _guard = self.acquire(peer_or_group_id)?;
        let stored = self.stored_for_peer(peer_or_group_id)?;

        let removed = {
            let mut sessions = self.sessions.lock();
            let established = sessions
                .get(peer_or_group_id)
                .is_some_and(|e| e.session.is_established())
                || stored
                    .as_ref()
                    .is_some_and(|s| derived_state(s) == SessionState::Established);
            if established {
                return Err(WhisprError::SessionError(format!(
                    "Conversation with {} is established",
                    peer_or_group_id
                )));
            }
            sessions.remove(peer_or_group_id).is_some()
        };

        let deleted = match &stored {
            Some(summary) => self.conversations.delete(&summary.conv_id)?,
            None => false,
        };

        if removed || deleted {
            info!(
                target: "state::session",
                key = %peer_or_group_id,
                record_deleted = deleted,
                "Handshake abandoned"
            );
        }
        Ok(removed || deleted)
    }

    // ============================================
    // СОСТОЯНИЕ
    // ============================================

    /// Состояние беседы по convId
    ///
    /// Без сессии в памяти состояние выводится из сохранённой записи.
    pub fn conversation_state(&self, conversation_id: &str) -> Result<SessionState> {
        if let Some(state) = self
            .sessions
            .lock()
            .values()
            .find(|e| e.session.conversation_id.as_deref() == Some(conversation_id))
            .map(|e| e.session.state())
        {
            return Ok(state);
        }

        let summary = self
            .conversations
            .list()?
            .into_iter()
            .find(|s| s.conv_id == conversation_id);

        Ok(summary
            .as_ref()
            .map(derived_state)
            .unwrap_or(SessionState::Uninitialized))
    }

    /// Состояние по peer id (DIRECT) или group id (GROUP)
    pub fn state_for_peer(&self, peer_or_group_id: &str) -> Result<SessionState> {
        if let Some(state) = self
            .sessions
            .lock()
            .get(peer_or_group_id)
            .map(|e| e.session.state())
        {
            return Ok(state);
        }

        Ok(self
            .stored_for_peer(peer_or_group_id)?
            .as_ref()
            .map(derived_state)
            .unwrap_or(SessionState::Uninitialized))
    }

    pub fn session(&self, key: &str) -> Option<ConversationSession> {
        self.sessions.lock().get(key).map(|e| e.session.clone())
    }

    pub fn sessions(&self) -> Vec<ConversationSession> {
        self.sessions
            .lock()
            .values()
            .map(|e| e.session.clone())
            .collect()
    }

    pub fn conversations(&self) -> Result<Vec<ConversationSummary>> {
        self.conversations.list()
    }

    /// Удалить беседу по действию пользователя
    pub fn delete_conversation(&self, conversation_id: &str) -> Result<bool> {
        let deleted = self.conversations.delete(conversation_id)?;
        self.sessions
            .lock()
            .retain(|_, e| e.session.conversation_id.as_deref() != Some(conversation_id));
        Ok(deleted)
    }

    // ============================================
    // СООБЩЕНИЯ
    // ============================================

    /// Зашифровать и подписать; только для ESTABLISHED бесед
    pub fn seal_message(
        &self,
        conversation_id: &str,
        plaintext: &[u8],
    ) -> Result<SecureMessageEnvelope> {
        let state = self.conversation_state(conversation_id)?;
        if state != SessionState::Established {
            return Err(WhisprError::SessionError(format!(
                "Conversation {} is not established ({})",
                conversation_id, state
            )));
        }

        let record = self.load_record(conversation_id)?;
        Ok(SecureMessageCodec::<P>::seal(
            plaintext,
            &record.symmetric_key,
            &record.signing_key,
            &self.user_id,
        )?)
    }

    /// Расшифровать конверт; ошибка касается только этого сообщения
    pub fn open_message(
        &self,
        conversation_id: &str,
        envelope: &SecureMessageEnvelope,
    ) -> Result<OpenedMessage> {
        validation::validate_envelope(envelope)?;
        let record = self.load_record(conversation_id)?;

        SecureMessageCodec::<P>::open(envelope, &record.symmetric_key, record.verification_key())
            .map_err(|e| {
                warn!(
                    target: "state::session",
                    conv_id = %conversation_id,
                    sender_id = %envelope.sender_id,
                    error = %e,
                    "Dropping undecryptable message"
                );
                WhisprError::from(e)
            })
    }

    pub fn send_message<C: MessageChannel + ?Sized>(
        &self,
        channel: &C,
        conversation_id: &str,
        plaintext: &[u8],
        sender_name: Option<&str>,
    ) -> Result<SecureMessageEnvelope> {
        let envelope = self.seal_message(conversation_id, plaintext)?;
        let frame = ChannelFrame::Message(MessageFrame::from_envelope(
            conversation_id,
            &envelope,
            sender_name.map(str::to_string),
        )?);
        channel.send(&frame.to_bytes()?)?;
        Ok(envelope)
    }

    /// Следующий кадр канала; `Ok(None)`, если кадров нет
    ///
    /// Кадр снимается с канала до расшифровки: сообщение, которое не
    /// удалось открыть, теряется, следующий вызов читает дальше.
    pub fn receive_message<C: MessageChannel + ?Sized>(
        &self,
        channel: &C,
    ) -> Result<Option<ReceivedMessage>> {
        let Some(bytes) = channel.receive()? else {
            return Ok(None);
        };

        let ChannelFrame::Message(frame) = ChannelFrame::from_bytes(&bytes)?;
        let envelope = frame.envelope()?;
        let message = self.open_message(&frame.room, &envelope)?;

        Ok(Some(ReceivedMessage {
            conversation_id: frame.room,
            sender_id: envelope.sender_id,
            sender_name: frame.sender_name,
            timestamp: envelope.timestamp,
            message,
        }))
    }

    // ============================================
    // ВНУТРЕННЕЕ
    // ============================================

    fn acquire(&self, key: &str) -> Result<InFlightGuard<'_>> {
        if !self.in_flight.lock().insert(key.to_string()) {
            debug!(target: "state::session", key = %key, "Handshake already in flight");
            return Err(WhisprError::HandshakeInProgress(key.to_string()));
        }
        Ok(InFlightGuard {
            in_flight: &self.in_flight,
            key: key.to_string(),
        })
    }

    fn begin_session(
        &self,
        key: &str,
        conversation_type: ConversationType,
        initiator: bool,
    ) -> Result<()> {
        let mut sessions = self.sessions.lock();
        match sessions.get_mut(key) {
            Some(entry) => entry.session.begin_handshake(),
            None => {
                let mut session = ConversationSession::new(key, conversation_type, initiator);
                session.begin_handshake()?;
                sessions.insert(
                    key.to_string(),
                    SessionEntry {
                        session,
                        pending_keys: None,
                    },
                );
                Ok(())
            }
        }
    }

    /// Убрать неудавшийся handshake, чтобы его можно было начать заново
    fn discard(&self, key: &str) {
        let mut sessions = self.sessions.lock();
        if sessions
            .get(key)
            .is_some_and(|e| !e.session.is_established())
        {
            sessions.remove(key);
        }
    }

    fn mark_established(&self, key: &str, record: &ConversationRecord<P>) -> Result<()> {
        let mut sessions = self.sessions.lock();
        match sessions.get_mut(key) {
            Some(entry) => {
                entry.session.bind(&record.conv_id);
                entry.session.establish()
            }
            None => {
                sessions.insert(
                    key.to_string(),
                    SessionEntry {
                        session: ConversationSession::established(
                            key,
                            &record.conv_id,
                            record.conversation_type,
                            record.initiator,
                        ),
                        pending_keys: None,
                    },
                );
                Ok(())
            }
        }
    }

    fn identity_public_jwk(&self) -> Result<PublicJwk> {
        let material = self.keys.load()?;
        Ok(P::export_verifying_key(&material.identity.public_key)?)
    }

    fn build_initiation(
        &self,
        bundle: &PublicKeyBundle,
        keys: &ConversationKeys<P>,
        identity: &PublicJwk,
    ) -> Result<InitiationPayload> {
        validation::validate_public_bundle(bundle)?;

        let session = X3DHProtocol::<P>::establish_session(bundle)?;
        let message = ConversationKeyMessage::from_keys(keys, &self.user_id)?;
        let encrypted = seal_key_message::<P>(&session.shared_key, &message)?;

        Ok(InitiationPayload {
            iv: encrypted.iv,
            ciphertext: encrypted.ciphertext,
            ephemeral_key_public_jwk: session.ephemeral_public,
            used_opk_id: session.used_opk_id,
            initiator_id: self.user_id.clone(),
            initiator_identity_key: Some(identity.clone()),
        })
    }

    fn prepare_group(
        &self,
        group_id: &str,
        members: &[(String, PublicKeyBundle)],
    ) -> Result<(ConversationKeys<P>, Vec<MemberInvitation>)> {
        let keys = ConversationKeys::<P>::generate()?;
        let identity = self.identity_public_jwk()?;

        let mut invitations = Vec::with_capacity(members.len());
        for (member_id, bundle) in members {
            if *member_id == self.user_id {
                continue;
            }
            let payload = self.build_initiation(bundle, &keys, &identity).map_err(|e| {
                warn!(
                    target: "state::session",
                    group_id = %group_id,
                    member_id = %member_id,
                    error = %e,
                    "Member handshake failed"
                );
                e
            })?;
            invitations.push(MemberInvitation {
                member_id: member_id.clone(),
                payload,
            });
        }

        Ok((keys, invitations))
    }

    fn open_pending(
        &self,
        pending: &PendingConversation,
        peer_or_group_id: &str,
    ) -> Result<ConversationRecord<P>> {
        let payload = &pending.initial_payload;
        let material = self.keys.load()?;

        let shared_key = X3DHProtocol::<P>::complete_session(
            &material,
            &payload.ephemeral_key_public_jwk,
            payload.used_opk_id.as_ref(),
        )?;
        let message = open_key_message::<P>(&shared_key, &payload.encrypted_key_message())?;

        if message.initiator_id != pending.initiator_id {
            return Err(WhisprError::ValidationError(format!(
                "Key message names initiator {}, payload came from {}",
                message.initiator_id, pending.initiator_id
            )));
        }

        let keys = message.to_keys::<P>()?;
        Ok(Self::record_from_keys(
            &pending.id,
            peer_or_group_id,
            keys,
            false,
            pending.conversation_type,
        ))
    }

    fn acceptance_for(&self, record: &ConversationRecord<P>) -> Result<AcceptancePayload> {
        Ok(AcceptancePayload {
            conversation_id: record.conv_id.clone(),
            signing_public_key: P::export_verifying_key(&record.signing_public)?,
        })
    }

    fn stored_for_peer(&self, peer_or_group_id: &str) -> Result<Option<ConversationSummary>> {
        Ok(self
            .conversations
            .list()?
            .into_iter()
            .find(|s| s.peer_or_group_id.as_deref() == Some(peer_or_group_id)))
    }

    fn load_record(&self, conversation_id: &str) -> Result<ConversationRecord<P>> {
        self.conversations.load(conversation_id)?.ok_or_else(|| {
            WhisprError::NotFound(format!("Conversation {} not found", conversation_id))
        })
    }

    fn record_from_keys(
        conversation_id: &str,
        peer_or_group_id: &str,
        keys: ConversationKeys<P>,
        initiator: bool,
        conversation_type: ConversationType,
    ) -> ConversationRecord<P> {
        ConversationRecord {
            conv_id: conversation_id.to_string(),
            peer_or_group_id: Some(peer_or_group_id.to_string()),
            symmetric_key: keys.symmetric_key,
            signing_key: keys.signing_key,
            signing_public: keys.signing_public,
            their_verification_key: None,
            initiator,
            conversation_type,
            created_at: current_timestamp_millis(),
        }
    }
}

/// Записи получателя и группы установлены сразу, запись инициатора -
/// после подтверждения (есть ключ собеседника)
fn derived_state(summary: &ConversationSummary) -> SessionState {
    if !summary.initiator
        || summary.conversation_type == ConversationType::Group
        || summary.has_peer_verification_key
    {
        SessionState::Established
    } else {
        SessionState::HandshakeInProgress
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::suites::p256::P256SuiteProvider;
    use crate::storage::memory::MemoryStore;
    use std::sync::Arc;

    type Manager = SessionManager<P256SuiteProvider, Arc<MemoryStore>>;

    fn device(user_id: &str) -> Manager {
        let manager = Manager::new(user_id, Arc::new(MemoryStore::new())).unwrap();
        manager.ensure_device_keys().unwrap();
        manager
    }

    #[test]
    fn test_in_flight_guard_blocks_reentry() {
        let alice = device("alice");
        let bob = device("bob");
        let bundle = bob.public_bundle().unwrap();

        let guard = alice.acquire("bob").unwrap();
        assert!(matches!(
            alice.start_direct_conversation("bob", &bundle),
            Err(WhisprError::HandshakeInProgress(_))
        ));
        assert_eq!(alice.state_for_peer("bob").unwrap(), SessionState::Uninitialized);

        drop(guard);
        assert!(alice.start_direct_conversation("bob", &bundle).is_ok());
    }

    #[test]
    fn test_empty_user_id_is_rejected() {
        assert!(Manager::new(" ", Arc::new(MemoryStore::new())).is_err());
    }

    #[test]
    fn test_ensure_device_keys_runs_once() {
        let manager = Manager::new("alice", Arc::new(MemoryStore::new())).unwrap();
        assert!(manager.ensure_device_keys().unwrap().is_some());
        let bundle = manager.public_bundle().unwrap();
        assert!(manager.ensure_device_keys().unwrap().is_none());
        assert_eq!(manager.public_bundle().unwrap(), bundle);
    }

    #[test]
    fn test_derived_state() {
        let mut summary = ConversationSummary {
            conv_id: "c".to_string(),
            peer_or_group_id: Some("bob".to_string()),
            conversation_type: ConversationType::Direct,
            initiator: true,
            created_at: 0,
            has_peer_verification_key: false,
        };
        assert_eq!(derived_state(&summary), SessionState::HandshakeInProgress);
        summary.has_peer_verification_key = true;
        assert_eq!(derived_state(&summary), SessionState::Established);
        summary.has_peer_verification_key = false;
        summary.initiator = false;
        assert_eq!(derived_state(&summary), SessionState::Established);
    }
}
