// Shared transport plumbing.
//
// TLS mode and HTTP client construction for the REST client, plus the
// seam the console multiplexer talks through: a `Connector` opens one
// `Transport`, which moves whole messages in and out.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;

use crate::console::ConsoleTarget;
use crate::error::Error;

/// TLS verification mode shared by the console and REST clients.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TlsMode {
    /// Verify the server certificate against the bundled web PKI roots.
    #[default]
    Verify,
    /// Accept any certificate (self-signed fleet gateways).
    DangerAcceptInvalid,
}

impl TlsMode {
    /// Map a `verify_tls` flag into a mode.
    pub fn from_verify(verify: bool) -> Self {
        if verify {
            Self::Verify
        } else {
            Self::DangerAcceptInvalid
        }
    }
}

/// Shared configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::Verify,
            timeout: Duration::from_secs(30),
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` with the given default headers.
    pub fn build_client(
        &self,
        headers: reqwest::header::HeaderMap,
    ) -> Result<reqwest::Client, Error> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("fleetcon/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers);

        if self.tls == TlsMode::DangerAcceptInvalid {
            builder = builder.danger_accept_invalid_certs(true);
        }

        builder
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }
}

// ── Console transport seam ──────────────────────────────────────────

/// How a transport ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Closure {
    /// Normal close handshake (or the peer going away politely).
    Clean,
    /// Anything else: reset, protocol violation, error close code.
    Abnormal(String),
}

/// One open, bidirectional message stream to a device console.
///
/// Each message is one frame. Implementations swallow control traffic
/// (ping/pong) and only surface data messages.
pub trait Transport: Send {
    /// Send one binary message.
    fn send(&mut self, message: Bytes) -> impl Future<Output = Result<(), Closure>> + Send;

    /// Receive the next data message.
    fn recv(&mut self) -> impl Future<Output = Result<Bytes, Closure>> + Send;

    /// Close the transport. Failures are logged, never surfaced.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// Opens transports to a console target.
pub trait Connector: Send + Sync {
    type Transport: Transport;

    /// Open a transport. Never returns a half-open handle.
    fn connect(
        &self,
        target: &ConsoleTarget,
    ) -> impl Future<Output = Result<Self::Transport, Error>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tls_mode_from_verify_flag() {
        assert_eq!(TlsMode::from_verify(true), TlsMode::Verify);
        assert_eq!(TlsMode::from_verify(false), TlsMode::DangerAcceptInvalid);
    }

    #[test]
    fn builds_insecure_http_client() {
        let config = TransportConfig {
            tls: TlsMode::DangerAcceptInvalid,
            timeout: Duration::from_secs(5),
        };
        assert!(config.build_client(reqwest::header::HeaderMap::new()).is_ok());
    }
}
