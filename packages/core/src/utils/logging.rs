// Логирование

use sha2::{Digest, Sha256};
use std::sync::Once;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Установить глобальный tracing subscriber (`RUST_LOG`, по умолчанию `info`).
///
/// Повторные вызовы ничего не делают; если subscriber уже установлен
/// приложением, он сохраняется.
pub fn init_logging() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init();
    });
}

/// Короткий отпечаток публичного материала для логов (первые 8 байт SHA-256, hex).
///
/// Приватные ключи в логи не попадают никогда.
pub fn fingerprint(public_material: &[u8]) -> String {
    let digest = Sha256::digest(public_material);
    hex::encode(&digest[..8])
}
