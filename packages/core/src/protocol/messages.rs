// Типы сообщений протокола
// JSON, camelCase; байтовые поля - массивы чисел

use crate::crypto::handshake::key_message::EncryptedKeyMessage;
use crate::crypto::handshake::OneTimePreKeyId;
use crate::crypto::jwk::PublicJwk;
use crate::crypto::messaging::SecureMessageEnvelope;
use crate::storage::models::ConversationType;
use crate::utils::error::{Result, WhisprError};
use crate::utils::serialization::{
    bytes_from_array_or_map, from_json_bytes, string_from_string_or_number, to_json_bytes,
};
use serde::{Deserialize, Serialize};

/// Начало беседы: key message под X3DH shared key + данные для получателя
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiationPayload {
    #[serde(deserialize_with = "bytes_from_array_or_map")]
    pub iv: Vec<u8>,
    #[serde(deserialize_with = "bytes_from_array_or_map")]
    pub ciphertext: Vec<u8>,
    /// EK_A_pub
    #[serde(rename = "ephemeralKeyPublicJWK")]
    pub ephemeral_key_public_jwk: PublicJwk,
    /// Отсутствует в режиме 1-DH
    #[serde(rename = "usedOPKId", default, skip_serializing_if = "Option::is_none")]
    pub used_opk_id: Option<OneTimePreKeyId>,
    pub initiator_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initiator_identity_key: Option<PublicJwk>,
}

impl InitiationPayload {
    pub fn encrypted_key_message(&self) -> EncryptedKeyMessage {
        EncryptedKeyMessage {
            iv: self.iv.clone(),
            ciphertext: self.ciphertext.clone(),
        }
    }
}

/// Беседа, ожидающая ответа получателя (как её отдаёт издатель)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingConversation {
    /// convId (DIRECT) или id группы (GROUP)
    #[serde(deserialize_with = "string_from_string_or_number")]
    pub id: String,
    pub initiator_id: String,
    #[serde(rename = "type")]
    pub conversation_type: ConversationType,
    pub initial_payload: InitiationPayload,
}

/// Ответ получателя инициатору
///
/// `signingPublicKey` - публичный ключ беседы, извлечённый из key message:
/// инициатор сверяет его со своим и так узнаёт, что key message открыт.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptancePayload {
    #[serde(deserialize_with = "string_from_string_or_number")]
    pub conversation_id: String,
    pub signing_public_key: PublicJwk,
}

/// Кадр канала сообщений
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChannelFrame {
    Message(MessageFrame),
}

/// `{type:"message", room, encryptedContent, senderId, senderName?, timestamp}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageFrame {
    /// convId
    pub room: String,
    /// JSON(SecureMessageEnvelope)
    pub encrypted_content: String,
    pub sender_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    pub timestamp: i64,
}

impl MessageFrame {
    pub fn from_envelope(
        room: &str,
        envelope: &SecureMessageEnvelope,
        sender_name: Option<String>,
    ) -> Result<Self> {
        Ok(Self {
            room: room.to_string(),
            encrypted_content: serde_json::to_string(envelope)?,
            sender_id: envelope.sender_id.clone(),
            sender_name,
            timestamp: envelope.timestamp,
        })
    }

    pub fn envelope(&self) -> Result<SecureMessageEnvelope> {
        Ok(serde_json::from_str(&self.encrypted_content)?)
    }
}

impl ChannelFrame {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        to_json_bytes(self).map_err(WhisprError::SerializationError)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        from_json_bytes(bytes).map_err(WhisprError::SerializationError)
    }
}
