//! Централизованная конфигурация для Whispr Core
//!
//! Все константы протокола и хранилища определены здесь,
//! чтобы избежать хардкода по всему проекту.

use std::sync::OnceLock;

/// Глобальная конфигурация приложения (синглтон)
static GLOBAL_CONFIG: OnceLock<Config> = OnceLock::new();

/// Основная структура конфигурации
#[derive(Debug, Clone)]
pub struct Config {
    // ============================================
    // КРИПТОГРАФИЧЕСКИЕ ПАРАМЕТРЫ
    // ============================================

    /// Размер пула one-time prekeys, генерируемого при инициализации устройства
    pub one_time_prekey_count: usize,

    /// Длина IV для AES-GCM (в байтах)
    pub nonce_length: usize,

    /// Размер GCM authentication tag (в байтах)
    pub gcm_tag_length: usize,

    /// HKDF info (domain separation) для X3DH shared secret
    pub x3dh_info: &'static str,

    /// ID криптографического набора (P-256 suite)
    pub suite_id: u16,

    /// PBKDF2: количество итераций для мастер-ключа SealedStore
    pub pbkdf2_iterations: u32,

    /// Длина соли для PBKDF2 (в байтах)
    pub salt_length: usize,

    // ============================================
    // ХРАНИЛИЩЕ
    // ============================================

    /// Ключ записи с ключевым материалом устройства
    pub key_material_storage_key: &'static str,

    /// Ключ таблицы бесед
    pub conversations_storage_key: &'static str,

    /// Ключ соли мастер-ключа (хранится незашифрованной)
    pub master_salt_storage_key: &'static str,

    // ============================================
    // ВАЛИДАЦИЯ
    // ============================================

    /// Максимальное время в будущем для timestamp конверта (в секундах)
    /// По умолчанию: 5 минут
    pub message_timestamp_future_tolerance_secs: i64,
}

impl Config {
    /// Создать конфигурацию с дефолтными значениями
    pub fn default() -> Self {
        Self {
            // Криптография
            one_time_prekey_count: 20,
            nonce_length: 12,
            gcm_tag_length: 16,
            x3dh_info: "Whispr X3DH Shared Secret v1",
            suite_id: 1,
            pbkdf2_iterations: 100_000,
            salt_length: 32,

            // Хранилище
            key_material_storage_key: "x3dh_keys",
            conversations_storage_key: "whispr_conversations",
            master_salt_storage_key: "whispr_master_salt",

            // Валидация
            message_timestamp_future_tolerance_secs: 300, // 5 minutes
        }
    }

    /// Создать конфигурацию из переменных окружения
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // Переопределяем значения из env, если они заданы
        if let Ok(val) = std::env::var("WHISPR_OPK_POOL_SIZE") {
            if let Ok(parsed) = val.parse() {
                config.one_time_prekey_count = parsed;
            }
        }

        if let Ok(val) = std::env::var("WHISPR_PBKDF2_ITERATIONS") {
            if let Ok(parsed) = val.parse() {
                config.pbkdf2_iterations = parsed;
            }
        }

        if let Ok(val) = std::env::var("WHISPR_MESSAGE_FUTURE_TOLERANCE_SECS") {
            if let Ok(parsed) = val.parse() {
                config.message_timestamp_future_tolerance_secs = parsed;
            }
        }

        config
    }

    /// Получить глобальный экземпляр конфигурации
    ///
    /// Автоматически инициализирует конфигурацию со значениями по умолчанию при первом вызове
    pub fn global() -> &'static Config {
        GLOBAL_CONFIG.get_or_init(Config::default)
    }

    /// Инициализировать глобальную конфигурацию из переменных окружения
    ///
    /// # Errors
    ///
    /// Возвращает ошибку, если конфигурация уже была инициализирована
    pub fn init_from_env() -> Result<(), &'static str> {
        GLOBAL_CONFIG
            .set(Self::from_env())
            .map_err(|_| "Config already initialized")
    }

    /// Инициализировать глобальную конфигурацию с кастомным экземпляром
    ///
    /// # Errors
    ///
    /// Возвращает ошибку, если конфигурация уже была инициализирована
    pub fn init_with(config: Config) -> Result<(), &'static str> {
        GLOBAL_CONFIG
            .set(config)
            .map_err(|_| "Config already initialized")
    }

    /// Проверить, инициализирована ли глобальная конфигурация
    pub fn is_initialized() -> bool {
        GLOBAL_CONFIG.get().is_some()
    }
}
