//! Secure Messaging
//!
//! Защищённый конверт сообщения поверх ключей беседы.
//!
//! ## Dataflow
//! ```text
//! После установки беседы (ConversationRecord есть у обеих сторон):
//!
//! Alice                                      Bob
//! =====                                      ===
//!
//! seal(plaintext, symKey, signPriv, "alice")
//!   iv         = random(12)
//!   ciphertext = AES-GCM(symKey, iv, plaintext)
//!   signature  = ECDSA(signPriv, ciphertext)
//!   → {ciphertext, iv, signature, senderId, timestamp}  ──────→
//!
//!                                            open(envelope, symKey, verifyKey)
//!                                              plaintext   = AES-GCM⁻¹(...)   ошибка → сообщение отброшено
//!                                              isAuthentic = ECDSA.verify(...) ошибка → флаг false
//! ```
//!
//! ## Асимметрия ошибок
//!
//! Провал расшифровки фатален для сообщения (`AeadDecryptionError`).
//! Провал подписи - нет: plaintext возвращается с `is_authentic = false`,
//! чтобы интерфейс пометил сообщение как неподтверждённое.
//!
//! Подписывается шифротекст, а не plaintext (encrypt-then-sign). Подпись
//! доказывает, что конверт собрал владелец подписывающего ключа беседы;
//! ключ общий для всех участников, поэтому отправителя внутри беседы она
//! не различает.

pub mod codec;

pub use codec::{OpenedMessage, SecureMessageCodec, SecureMessageEnvelope};
