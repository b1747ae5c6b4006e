use thiserror::Error;

/// Top-level error type for the `fleetcon-api` crate.
///
/// Covers every failure mode of the console multiplexer, file transfer,
/// and the device REST client. Console helpers return distinct variants so
/// callers (and tests) can tell a refused handshake from a remote fault.
#[derive(Debug, Error)]
pub enum Error {
    // ── Configuration ───────────────────────────────────────────────
    /// Missing or invalid settings, raised before any network attempt.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS configuration could not be built.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Console transport ───────────────────────────────────────────
    /// Transport open/handshake failure or abnormal closure mid-exchange.
    #[error("{0}")]
    Connection(String),

    /// Non-JSON payload on the error channel: the remote side faulted.
    #[error("Console stream error: {0}")]
    Stream(String),

    // ── File transfer ───────────────────────────────────────────────
    /// Download produced no output. Indistinguishable from a missing file.
    #[error("Remote file not found: {path}")]
    NotFound { path: String },

    /// Download output was not valid base64.
    #[error("Failed to decode remote file contents: {0}")]
    Decode(#[from] base64::DecodeError),

    /// The remote shell reported a failure for a transfer command.
    #[error("Remote command failed: {message}")]
    Remote { message: String },

    /// Local filesystem error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ── REST API ────────────────────────────────────────────────────
    /// Token missing, expired, or rejected.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// No device matched an id or name lookup.
    #[error("Device not found: {identifier}")]
    DeviceNotFound { identifier: String },

    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success response from the REST API.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// Operation exceeded the caller-imposed deadline.
    #[error("Operation timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
}

impl Error {
    /// Build a [`Connection`](Self::Connection) error for a transport fault.
    pub(crate) fn websocket(reason: impl std::fmt::Display) -> Self {
        Self::Connection(format!("WebSocket connection error: {reason}"))
    }

    /// Returns `true` if the console transport failed and a
    /// [`reset`](crate::Console::reset) may recover.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Connection(_) | Self::Timeout { .. } => true,
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } | Self::DeviceNotFound { .. } | Self::Api { status: 404, .. } => {
                true
            }
            Self::Http(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn websocket_errors_carry_prefix() {
        let err = Error::websocket("reset by peer");
        assert!(err.is_connection());
        assert!(err.is_transient());
        assert_eq!(err.to_string(), "WebSocket connection error: reset by peer");
    }

    #[test]
    fn not_found_classification() {
        assert!(Error::NotFound { path: "/tmp/x".into() }.is_not_found());
        assert!(
            Error::Api {
                status: 404,
                message: "gone".into()
            }
            .is_not_found()
        );
        assert!(!Error::Stream("boom".into()).is_not_found());
    }
}
