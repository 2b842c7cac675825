// Внешние коллабораторы: каталог ключей и канал сообщений
//
// Ядро не знает про HTTP/WebSocket: приложение реализует эти трейты
// поверх своего транспорта. In-memory реализации - для тестов и
// локальных прогонов.

use crate::crypto::handshake::PublicKeyBundle;
use crate::utils::error::{Result, WhisprError};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::debug;

/// Каталог публичных bundle (сервер ключей)
///
/// # Контракт
/// `fetch` обязан выдавать каждый OPK не более одного раза и удалять
/// выданные. Ядро локально одноразовость OPK не отслеживает.
pub trait KeyDirectory: Send + Sync {
    fn publish(&self, user_id: &str, bundle: &PublicKeyBundle) -> Result<()>;
    fn fetch(&self, peer_id: &str) -> Result<PublicKeyBundle>;
}

/// Двунаправленный канал непрозрачных кадров
pub trait MessageChannel: Send + Sync {
    fn send(&self, frame: &[u8]) -> Result<()>;
    /// `None`, если кадров пока нет
    fn receive(&self) -> Result<Option<Vec<u8>>>;
}

impl<T: KeyDirectory + ?Sized> KeyDirectory for Arc<T> {
    fn publish(&self, user_id: &str, bundle: &PublicKeyBundle) -> Result<()> {
        (**self).publish(user_id, bundle)
    }

    fn fetch(&self, peer_id: &str) -> Result<PublicKeyBundle> {
        (**self).fetch(peer_id)
    }
}

/// In-process каталог: отдаёт не больше одного OPK за fetch и удаляет его
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    bundles: Mutex<HashMap<String, PublicKeyBundle>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Сколько OPK ещё не выдано
    pub fn remaining_one_time_prekeys(&self, user_id: &str) -> usize {
        self.bundles
            .lock()
            .get(user_id)
            .map(|b| b.one_time_pre_keys.len() + usize::from(b.otp_key.is_some()))
            .unwrap_or(0)
    }
}

impl KeyDirectory for MemoryDirectory {
    fn publish(&self, user_id: &str, bundle: &PublicKeyBundle) -> Result<()> {
        self.bundles
            .lock()
            .insert(user_id.to_string(), bundle.clone());
        debug!(
            target: "protocol::transport",
            user_id = %user_id,
            opk_count = bundle.one_time_pre_keys.len(),
            "Bundle published"
        );
        Ok(())
    }

    fn fetch(&self, peer_id: &str) -> Result<PublicKeyBundle> {
        let mut bundles = self.bundles.lock();
        let stored = bundles
            .get_mut(peer_id)
            .ok_or_else(|| WhisprError::NotFound(format!("No bundle for {}", peer_id)))?;

        let one_time_pre_keys = if stored.one_time_pre_keys.is_empty() {
            Vec::new()
        } else {
            vec![stored.one_time_pre_keys.remove(0)]
        };
        let otp_key = if one_time_pre_keys.is_empty() {
            stored.otp_key.take()
        } else {
            None
        };

        debug!(
            target: "protocol::transport",
            peer_id = %peer_id,
            remaining = stored.one_time_pre_keys.len(),
            "Bundle fetched"
        );

        Ok(PublicKeyBundle {
            identity_key: stored.identity_key.clone(),
            signed_prekey: stored.signed_prekey.clone(),
            prekey_signature: stored.prekey_signature.clone(),
            one_time_pre_keys,
            otp_key,
        })
    }
}

type FrameQueue = Arc<Mutex<VecDeque<Vec<u8>>>>;

/// Один конец in-process канала
#[derive(Debug)]
pub struct MemoryChannel {
    outgoing: FrameQueue,
    incoming: FrameQueue,
}

impl MemoryChannel {
    /// Два связанных конца: отправленное одним читает другой
    pub fn pair() -> (MemoryChannel, MemoryChannel) {
        let a_to_b: FrameQueue = Arc::default();
        let b_to_a: FrameQueue = Arc::default();
        (
            MemoryChannel {
                outgoing: Arc::clone(&a_to_b),
                incoming: Arc::clone(&b_to_a),
            },
            MemoryChannel {
                outgoing: b_to_a,
                incoming: a_to_b,
            },
        )
    }

    pub fn pending(&self) -> usize {
        self.incoming.lock().len()
    }
}

impl MessageChannel for MemoryChannel {
    fn send(&self, frame: &[u8]) -> Result<()> {
        self.outgoing.lock().push_back(frame.to_vec());
        Ok(())
    }

    fn receive(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.incoming.lock().pop_front())
    }
}
