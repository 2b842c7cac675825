// Модели данных для хранилища
//
// Всё хранится как JSON с ключами в JWK, тем же форматом, что и у
// веб-клиента, чтобы записи читались обеими сторонами.

use crate::crypto::jwk::{PrivateJwk, PublicJwk, SymmetricJwk};
use crate::utils::serialization::string_from_string_or_number;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Тип беседы
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConversationType {
    Direct,
    Group,
}

impl fmt::Display for ConversationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversationType::Direct => f.write_str("DIRECT"),
            ConversationType::Group => f.write_str("GROUP"),
        }
    }
}

/// One-time prekey в записи ключевого материала
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredOneTimePreKey {
    pub id: u32,
    #[serde(rename = "pub")]
    pub public: PublicJwk,
    #[serde(rename = "priv")]
    pub private: PrivateJwk,
}

/// Запись ключевого материала устройства (`x3dh_keys`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredKeyMaterial {
    pub ik_pub: PublicJwk,
    pub ik_priv: PrivateJwk,
    pub spk_pub: PublicJwk,
    pub spk_priv: PrivateJwk,
    /// Отсутствует в записях, созданных старыми клиентами
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spk_signature: Option<String>,
    #[serde(default)]
    pub opks: Vec<StoredOneTimePreKey>,
}

/// Подписывающая пара беседы
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSignKeyPair {
    pub private_key: PrivateJwk,
    pub public_key: PublicJwk,
}

/// Беседа в хранилище (значение таблицы `whispr_conversations`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredConversation {
    #[serde(deserialize_with = "string_from_string_or_number")]
    pub conv_id: String,
    pub sym_key: SymmetricJwk,
    pub sign_key_pair: StoredSignKeyPair,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub their_sign_pub_key: Option<PublicJwk>,
    pub initiator: bool,
    pub created_at: i64,
    #[serde(rename = "type")]
    pub conversation_type: ConversationType,
    /// Собеседник (DIRECT) или группа (GROUP)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Вся таблица бесед: convId → запись
pub type ConversationTable = BTreeMap<String, StoredConversation>;

/// Беседа без импорта ключей (для списков)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSummary {
    pub conv_id: String,
    pub peer_or_group_id: Option<String>,
    pub conversation_type: ConversationType,
    pub initiator: bool,
    pub created_at: i64,
    pub has_peer_verification_key: bool,
}

impl From<&StoredConversation> for ConversationSummary {
    fn from(stored: &StoredConversation) -> Self {
        Self {
            conv_id: stored.conv_id.clone(),
            peer_or_group_id: stored.user_id.clone(),
            conversation_type: stored.conversation_type,
            initiator: stored.initiator,
            created_at: stored.created_at,
            has_peer_verification_key: stored.their_sign_pub_key.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_type_wire_form() {
        assert_eq!(serde_json::to_string(&ConversationType::Direct).unwrap(), "\"DIRECT\"");
        assert_eq!(
            serde_json::from_str::<ConversationType>("\"GROUP\"").unwrap(),
            ConversationType::Group
        );
    }

    #[test]
    fn test_legacy_key_material_without_signature() {
        let jwk = r#"{"kty":"EC","crv":"P-256","x":"a","y":"b"}"#;
        let priv_jwk = r#"{"kty":"EC","crv":"P-256","x":"a","y":"b","d":"c"}"#;
        let json = format!(
            r#"{{"ik_pub":{jwk},"ik_priv":{p},"spk_pub":{jwk},"spk_priv":{p},
                "opks":[{{"id":0,"pub":{jwk},"priv":{p}}}]}}"#,
            jwk = jwk,
            p = priv_jwk
        );
        let stored: StoredKeyMaterial = serde_json::from_str(&json).unwrap();
        assert!(stored.spk_signature.is_none());
        assert_eq!(stored.opks[0].id, 0);
    }

    #[test]
    fn test_numeric_conv_id_is_accepted() {
        let json = r#"{
            "convId": 17,
            "symKey": {"kty":"oct","k":"AAAA","alg":"A256GCM","ext":true},
            "signKeyPair": {
                "privateKey": {"kty":"EC","crv":"P-256","x":"a","y":"b","d":"c"},
                "publicKey": {"kty":"EC","crv":"P-256","x":"a","y":"b"}
            },
            "initiator": true,
            "createdAt": 1700000000000,
            "type": "DIRECT",
            "userId": "bob"
        }"#;
        let stored: StoredConversation = serde_json::from_str(json).unwrap();
        assert_eq!(stored.conv_id, "17");
        assert!(stored.their_sign_pub_key.is_none());

        let summary = ConversationSummary::from(&stored);
        assert_eq!(summary.peer_or_group_id.as_deref(), Some("bob"));
        assert!(!summary.has_peer_verification_key);
    }
}
