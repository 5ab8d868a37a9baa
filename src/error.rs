//! Error taxonomy for the collection and alarm core.
//!
//! Adapter-level failures (`AuthenticationFailed`, `Timeout`, `Unreachable`,
//! `ProtocolError`) are caught at the collector's per-device boundary and
//! turned into an offline transition; they only surface directly through
//! `collect_one` and `test_connection`.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unsupported device brand: {0}")]
    UnsupportedBrand(String),

    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("device request timed out")]
    Timeout,

    #[error("device unreachable: {0}")]
    Unreachable(String),

    #[error("malformed vendor response: {0}")]
    ProtocolError(String),

    #[error("device not found: {0}")]
    DeviceNotFound(String),

    #[error("a probe for device {0} is already in flight")]
    ProbeInFlight(String),

    #[error("alarm not found: {0}")]
    AlarmNotFound(String),

    #[error("store operation failed: {0}")]
    Store(String),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout
        } else if err.is_connect() {
            Error::Unreachable(err.to_string())
        } else if err.is_decode() {
            Error::ProtocolError(err.to_string())
        } else {
            Error::Unreachable(err.to_string())
        }
    }
}
