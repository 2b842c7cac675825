// Модуль хранилища
//
// Ядро знает только key-value абстракцию; конкретный носитель
// (localStorage, IndexedDB, файл, keychain) подставляет приложение.

pub mod conversations;
pub mod key_material;
pub mod memory;
pub mod models;
pub mod sealed;

use crate::utils::error::Result;
use std::sync::Arc;

/// Key-value хранилище, внедряемое в менеджеры ключей
///
/// `set` перезаписывает значение целиком: запись либо есть полностью,
/// либо её нет.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    fn set(&self, key: &str, value: &[u8]) -> Result<()>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        (**self).set(key, value)
    }
}

pub use conversations::ConversationKeyStore;
pub use key_material::KeyMaterialStore;
pub use memory::MemoryStore;
pub use sealed::SealedStore;
