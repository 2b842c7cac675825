// Время

/// Unix timestamp в миллисекундах (формат `Date.now()`, используется в конвертах)
pub fn current_timestamp_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
