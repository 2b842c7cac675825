// Состояние одной беседы
//
//   UNINITIALIZED ──begin_handshake──▶ HANDSHAKE_IN_PROGRESS ──establish──▶ ESTABLISHED
//
// Обратных переходов нет: неудавшийся handshake просто не доходит до
// ESTABLISHED, сессию выбрасывают и начинают заново.

use crate::storage::models::ConversationType;
use crate::utils::error::{Result, WhisprError};
use crate::utils::time::current_timestamp_millis;
use crate::utils::uuid::generate_v4;
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Uninitialized,
    HandshakeInProgress,
    Established,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Uninitialized => f.write_str("UNINITIALIZED"),
            SessionState::HandshakeInProgress => f.write_str("HANDSHAKE_IN_PROGRESS"),
            SessionState::Established => f.write_str("ESTABLISHED"),
        }
    }
}

/// Сессия беседы в памяти
#[derive(Debug, Clone)]
pub struct ConversationSession {
    pub session_id: String,
    /// Собеседник (DIRECT) или группа (GROUP)
    pub peer_id: String,
    /// Известен после bind (инициатор) или сразу (получатель, группа)
    pub conversation_id: Option<String>,
    pub conversation_type: ConversationType,
    pub initiator: bool,
    state: SessionState,
    pub created_at: i64,
    pub updated_at: i64,
}

impl ConversationSession {
    pub fn new(peer_id: &str, conversation_type: ConversationType, initiator: bool) -> Self {
        let now = current_timestamp_millis();
        Self {
            session_id: generate_v4(),
            peer_id: peer_id.to_string(),
            conversation_id: None,
            conversation_type,
            initiator,
            state: SessionState::Uninitialized,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_established(&self) -> bool {
        self.state == SessionState::Established
    }

    fn transition(&mut self, to: SessionState) {
        debug!(
            target: "state::session",
            session_id = %self.session_id,
            peer_id = %self.peer_id,
            from = %self.state,
            to = %to,
            "Session state transition"
        );
        self.state = to;
        self.updated_at = current_timestamp_millis();
    }

    /// UNINITIALIZED → HANDSHAKE_IN_PROGRESS
    pub fn begin_handshake(&mut self) -> Result<()> {
        match self.state {
            SessionState::Uninitialized => {
                self.transition(SessionState::HandshakeInProgress);
                Ok(())
            }
            SessionState::HandshakeInProgress => {
                Err(WhisprError::HandshakeInProgress(self.peer_id.clone()))
            }
            SessionState::Established => Err(WhisprError::SessionError(format!(
                "Conversation with {} is already established",
                self.peer_id
            ))),
        }
    }

    /// HANDSHAKE_IN_PROGRESS → ESTABLISHED; повторный вызов ничего не меняет
    pub fn establish(&mut self) -> Result<()> {
        match self.state {
            SessionState::HandshakeInProgress => {
                self.transition(SessionState::Established);
                Ok(())
            }
            SessionState::Established => Ok(()),
            SessionState::Uninitialized => Err(WhisprError::SessionError(format!(
                "Cannot establish conversation with {} before a handshake",
                self.peer_id
            ))),
        }
    }

    pub fn bind(&mut self, conversation_id: &str) {
        self.conversation_id = Some(conversation_id.to_string());
        self.updated_at = current_timestamp_millis();
    }

    /// Сессия уже установленной беседы (восстановление из хранилища)
    pub(crate) fn established(
        peer_id: &str,
        conversation_id: &str,
        conversation_type: ConversationType,
        initiator: bool,
    ) -> Self {
        let mut session = Self::new(peer_id, conversation_type, initiator);
        session.conversation_id = Some(conversation_id.to_string());
        session.state = SessionState::Established;
        session
    }
}
