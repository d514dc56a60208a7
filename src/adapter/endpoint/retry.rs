//! SSH Connection Retry Logic
//!
//! 接続リトライと接続エラーの分類

pub const MAX_CONNECT_ATTEMPTS: u32 = 3;
pub const INITIAL_RETRY_DELAY_MS: u64 = 1000;
pub const MAX_RETRY_DELAY_MS: u64 = 8000;

/// Calculate retry delay with exponential backoff
pub fn calculate_retry_delay(retry_count: u32) -> u64 {
    let shift = retry_count.saturating_sub(1).min(16);
    std::cmp::min(INITIAL_RETRY_DELAY_MS << shift, MAX_RETRY_DELAY_MS)
}

/// Check if an error happened on the transport and a fresh connection may succeed
pub fn is_connection_error(error_msg: &str) -> bool {
    let lower = error_msg.to_lowercase();
    lower.contains("broken pipe")
        || lower.contains("connection reset")
        || lower.contains("connection refused")
        || lower.contains("connection aborted")
        || lower.contains("timed out")
        || lower.contains("unexpected end of file")
        || error_msg.contains("EOF")
}
