//! Backoff policy for enrollment requests.

use std::time::Duration;

use reqwest::StatusCode;

/// Attempts after the first one before giving up on a transient failure.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(500);

pub const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(10);

/// Connection failures, timeouts and broken bodies are worth retrying.
pub fn is_transient_network_error(error: &reqwest::Error) -> bool {
    if error.is_connect() || error.is_timeout() || error.is_body() {
        return true;
    }
    error.status().is_some_and(is_transient_status)
}

/// Gateway errors from the tunnel in front of the backend.
pub fn is_transient_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
    )
}

/// `min(base * 2^attempt + base / 2, max)`
pub fn calculate_backoff(attempt: u32, base: Duration, max: Duration) -> Duration {
    let exponential = base.saturating_mul(2u32.saturating_pow(attempt));
    exponential.saturating_add(base / 2).min(max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles() {
        let base = Duration::from_millis(100);
        let max = Duration::from_secs(10);
        assert_eq!(calculate_backoff(0, base, max), Duration::from_millis(150));
        assert_eq!(calculate_backoff(1, base, max), Duration::from_millis(250));
        assert_eq!(calculate_backoff(2, base, max), Duration::from_millis(450));
    }

    #[test]
    fn test_backoff_is_capped() {
        let delay = calculate_backoff(20, DEFAULT_BACKOFF_BASE, DEFAULT_BACKOFF_MAX);
        assert_eq!(delay, DEFAULT_BACKOFF_MAX);
    }

    #[test]
    fn test_transient_statuses() {
        assert!(is_transient_status(StatusCode::BAD_GATEWAY));
        assert!(is_transient_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_transient_status(StatusCode::GATEWAY_TIMEOUT));
        assert!(!is_transient_status(StatusCode::BAD_REQUEST));
        assert!(!is_transient_status(StatusCode::INTERNAL_SERVER_ERROR));
    }
}
