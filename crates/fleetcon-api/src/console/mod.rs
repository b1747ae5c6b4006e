//! Remote console multiplexer.
//!
//! A [`Console`] owns at most one live transport to a device console and
//! runs shell commands over it. Commands go out on the stdin channel with
//! a trailing `echo <marker>` line; the exchange ends when the marker shows
//! up on stdout, a JSON status arrives on the error channel, or the
//! transport closes.
//!
//! The marker is a textual signal inside a live stream: a command whose
//! output contains the marker text ends early. Each command gets a fresh
//! UUID marker, which makes that practically impossible, not impossible.

mod blocking;
mod frame;
mod target;
mod transfer;

use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::error::Error;
use crate::transport::{Closure, Connector, Transport};
use crate::websocket::WsConnector;

pub use blocking::BlockingConsole;
pub use frame::{
    Channel, ErrorChannel, Frame, RemoteStatus, StatusCause, StatusDetails, encode_stdin,
};
pub use target::{
    ConsoleConfig, ConsoleTarget, SUBPROTOCOL, SessionMetadata, console_url, normalize_host,
};
pub use transfer::{UPLOAD_MARKER, download_command, upload_command};

/// Prefix of the per-command completion marker.
const MARKER_PREFIX: &str = "__FLEETCON_DONE_";

// ── ExecOutput ──────────────────────────────────────────────────────

/// Result of one command exchange.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecOutput {
    /// Trimmed stdout with the completion marker removed.
    pub stdout: String,
    /// Trimmed stderr.
    pub stderr: String,
    /// Terminal status, when the gateway ended the session with one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<RemoteStatus>,
}

impl ExecOutput {
    /// Remote exit code: `0` unless a failure status was received.
    pub fn exit_code(&self) -> i32 {
        self.status.as_ref().map_or(0, RemoteStatus::exit_code)
    }
}

// ── Connection state ────────────────────────────────────────────────

/// Transport lifecycle. Only `ensure_connected`, `close`, `reset`, and
/// observed transport closure move between states.
enum ConnectionState<T> {
    Disconnected,
    Connected(T),
}

// ── Console ─────────────────────────────────────────────────────────

/// Stateful console connection to one device.
///
/// Operations take `&mut self`: only one command may be in flight per
/// connection. Use [`BlockingConsole`] to share one across threads.
pub struct Console<C: Connector = WsConnector> {
    target: ConsoleTarget,
    connector: C,
    state: ConnectionState<C::Transport>,
}

impl Console<WsConnector> {
    /// Console over the WebSocket transport.
    pub fn new(config: &ConsoleConfig) -> Result<Self, Error> {
        Self::with_connector(config, WsConnector)
    }
}

impl<C: Connector> Console<C> {
    /// Console over a custom connector.
    ///
    /// Validates `config` up front; no network traffic happens until the
    /// first operation.
    pub fn with_connector(config: &ConsoleConfig, connector: C) -> Result<Self, Error> {
        Ok(Self {
            target: ConsoleTarget::new(config)?,
            connector,
            state: ConnectionState::Disconnected,
        })
    }

    pub fn target(&self) -> &ConsoleTarget {
        &self.target
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, ConnectionState::Connected(_))
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Open the transport unless one is already live.
    pub async fn ensure_connected(&mut self) -> Result<(), Error> {
        self.transport().await.map(|_| ())
    }

    /// Close the transport if open. Calling it again is a no-op.
    pub async fn close(&mut self) {
        let state = std::mem::replace(&mut self.state, ConnectionState::Disconnected);
        if let ConnectionState::Connected(mut transport) = state {
            debug!(device = self.target.device_id(), "closing console");
            transport.close().await;
        }
    }

    /// Close, then open a fresh transport. Does not replay anything.
    pub async fn reset(&mut self) -> Result<(), Error> {
        self.close().await;
        self.ensure_connected().await
    }

    async fn transport(&mut self) -> Result<&mut C::Transport, Error> {
        if let ConnectionState::Disconnected = self.state {
            debug!(
                device = self.target.device_id(),
                url = %self.target.url(),
                "opening console"
            );
            let transport = self.connector.connect(&self.target).await?;
            self.state = ConnectionState::Connected(transport);
        }
        match &mut self.state {
            ConnectionState::Connected(transport) => Ok(transport),
            ConnectionState::Disconnected => {
                Err(Error::Connection("console transport unavailable".into()))
            }
        }
    }

    // ── Command execution ───────────────────────────────────────────

    /// Run `command` in the remote shell and collect its output.
    ///
    /// A clean transport close mid-exchange yields an empty
    /// [`ExecOutput`]; an abnormal one is [`Error::Connection`]. A
    /// non-JSON error-channel payload is [`Error::Stream`].
    pub async fn exec(&mut self, command: &str) -> Result<ExecOutput, Error> {
        let marker = new_marker();
        let wire = format!("{command}\necho {marker}\n");

        debug!(
            device = self.target.device_id(),
            bytes = command.len(),
            "exec"
        );

        let result = self.exchange(&wire, &marker).await;
        match result {
            Err(Exchange::Closed(Closure::Clean)) => {
                debug!("console closed cleanly mid-command");
                self.state = ConnectionState::Disconnected;
                Ok(ExecOutput::default())
            }
            Err(Exchange::Closed(Closure::Abnormal(reason))) => {
                warn!(%reason, "console closed abnormally");
                self.state = ConnectionState::Disconnected;
                Err(Error::websocket(reason))
            }
            Err(Exchange::Failed(e)) => Err(e),
            Ok(output) => Ok(output),
        }
    }

    async fn exchange(&mut self, wire: &str, marker: &str) -> Result<ExecOutput, Exchange> {
        let transport = self.transport().await.map_err(Exchange::Failed)?;
        transport
            .send(encode_stdin(wire.as_bytes()))
            .await
            .map_err(Exchange::Closed)?;

        let mut collector = Collector::new(marker);
        loop {
            let message = transport.recv().await.map_err(Exchange::Closed)?;
            if let Some(done) = collector.push(&message).map_err(Exchange::Failed)? {
                return Ok(done);
            }
        }
    }
}

/// Why an exchange stopped without output.
enum Exchange {
    Closed(Closure),
    Failed(Error),
}

fn new_marker() -> String {
    format!("{MARKER_PREFIX}{}__", uuid::Uuid::new_v4().simple())
}

// ── Output collection ───────────────────────────────────────────────

/// Accumulates channel output for one command until a terminal frame.
struct Collector<'a> {
    marker: &'a [u8],
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl<'a> Collector<'a> {
    fn new(marker: &'a str) -> Self {
        Self {
            marker: marker.as_bytes(),
            stdout: Vec::new(),
            stderr: Vec::new(),
        }
    }

    /// Feed one raw message. Returns the finished output on a terminal
    /// frame.
    fn push(&mut self, message: &Bytes) -> Result<Option<ExecOutput>, Error> {
        let Some(frame) = Frame::decode(message) else {
            trace!("empty console message");
            return Ok(None);
        };
        trace!(channel = frame.channel.id(), bytes = frame.payload.len(), "frame");

        match frame.channel {
            Channel::Stdout => {
                // The marker may straddle frames: rescan from just before
                // the old end.
                let scan_from = self
                    .stdout
                    .len()
                    .saturating_sub(self.marker.len().saturating_sub(1));
                self.stdout.extend_from_slice(&frame.payload);
                if let Some(pos) = find(&self.stdout[scan_from..], self.marker) {
                    self.stdout.truncate(scan_from + pos);
                    return Ok(Some(self.finish(None)));
                }
            }
            Channel::Stderr => self.stderr.extend_from_slice(&frame.payload),
            Channel::Error => match ErrorChannel::decode(&frame.payload) {
                ErrorChannel::Status(status) => {
                    debug!(status = ?status.status, "console session status");
                    return Ok(Some(self.finish(Some(status))));
                }
                ErrorChannel::Raw(message) => return Err(Error::Stream(message)),
            },
            Channel::Stdin | Channel::Resize | Channel::Other(_) => {
                trace!(channel = frame.channel.id(), "ignoring frame");
            }
        }
        Ok(None)
    }

    fn finish(&self, status: Option<RemoteStatus>) -> ExecOutput {
        ExecOutput {
            stdout: String::from_utf8_lossy(&self.stdout).trim().to_owned(),
            stderr: String::from_utf8_lossy(&self.stderr).trim().to_owned(),
            status,
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

// ── Tests ───────────────────────────────────────────────────────────
