use std::time::{SystemTime, UNIX_EPOCH};

/// Current timestamp in milliseconds
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Generate a batch identifier.
pub fn generate_batch_id() -> String {
    format!("batch_{}", uuid::Uuid::new_v4().simple())
}
