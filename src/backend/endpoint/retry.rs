//! Transient-failure classification and backoff for endpoint requests.
//!
//! Errors are permanent unless they are known to be transient. Retrying a
//! 401 or a malformed response five times only delays the inevitable.

use reqwest::StatusCode;
use std::time::Duration;

/// HTTP statuses worth retrying: timeouts, rate limits, gateway hiccups.
pub const TRANSIENT_STATUS_CODES: [u16; 6] = [408, 429, 500, 502, 503, 504];

const BACKOFF_BASE_SECS: f64 = 0.5;
const BACKOFF_CAP_SECS: f64 = 8.0;

/// Delay before the attempt after `attempt` (0-based): `min(0.5 * 2^attempt, 8)` seconds.
///
/// ```rust
/// use pdf2md_ocr::backend::endpoint::retry::backoff_delay;
/// use std::time::Duration;
///
/// assert_eq!(backoff_delay(0), Duration::from_millis(500));
/// assert_eq!(backoff_delay(3), Duration::from_secs(4));
/// assert_eq!(backoff_delay(10), Duration::from_secs(8));
/// ```
pub fn backoff_delay(attempt: u32) -> Duration {
    let exp = 2f64.powi(attempt.min(16) as i32);
    Duration::from_secs_f64((BACKOFF_BASE_SECS * exp).min(BACKOFF_CAP_SECS))
}

/// Is this error likely to go away if we try again?
pub trait IsKnownTransient {
    fn is_known_transient(&self) -> bool;
}

impl IsKnownTransient for StatusCode {
    fn is_known_transient(&self) -> bool {
        TRANSIENT_STATUS_CODES.contains(&self.as_u16())
    }
}

impl IsKnownTransient for reqwest::Error {
    fn is_known_transient(&self) -> bool {
        if let Some(status) = self.status() {
            return status.is_known_transient();
        }
        // Failures while reaching the server or waiting on it. Decode and
        // builder errors will fail the same way next time.
        self.is_timeout() || self.is_connect() || self.is_request()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_sequence_is_capped() {
        let secs: Vec<f64> = (0..7).map(|a| backoff_delay(a).as_secs_f64()).collect();
        assert_eq!(secs, vec![0.5, 1.0, 2.0, 4.0, 8.0, 8.0, 8.0]);
        assert_eq!(backoff_delay(u32::MAX), Duration::from_secs(8));
    }

    #[test]
    fn transient_statuses() {
        for code in [408, 429, 500, 502, 503, 504] {
            let status = StatusCode::from_u16(code).unwrap();
            assert!(status.is_known_transient(), "{code} should be transient");
        }
        for code in [400, 401, 403, 404, 422, 501] {
            let status = StatusCode::from_u16(code).unwrap();
            assert!(!status.is_known_transient(), "{code} should be permanent");
        }
    }

    #[tokio::test]
    async fn connection_refused_is_transient() {
        // Bind then drop a listener so the port is (almost certainly) closed.
        let port = {
            let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap().port()
        };
        let err = reqwest::Client::new()
            .get(format!("http://127.0.0.1:{port}/"))
            .send()
            .await
            .unwrap_err();
        assert!(err.is_known_transient(), "got: {err:?}");
    }

    #[tokio::test]
    async fn builder_error_is_permanent() {
        let err = reqwest::Client::new()
            .get("not a url")
            .send()
            .await
            .unwrap_err();
        assert!(err.is_builder());
        assert!(!err.is_known_transient());
    }
}
