//! Channel framing for the `channel.k8s.io` console subprotocol.
//!
//! Every transport message is one frame: a single channel byte followed by
//! raw payload bytes. There is no further length framing.

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Multiplexed console channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Stdin,
    Stdout,
    Stderr,
    /// Error/status channel: JSON `Status` object or a raw error string.
    Error,
    /// Terminal resize. Never used for command execution.
    Resize,
    Other(u8),
}

impl Channel {
    pub fn id(self) -> u8 {
        match self {
            Self::Stdin => 0,
            Self::Stdout => 1,
            Self::Stderr => 2,
            Self::Error => 3,
            Self::Resize => 4,
            Self::Other(id) => id,
        }
    }
}

impl From<u8> for Channel {
    fn from(id: u8) -> Self {
        match id {
            0 => Self::Stdin,
            1 => Self::Stdout,
            2 => Self::Stderr,
            3 => Self::Error,
            4 => Self::Resize,
            other => Self::Other(other),
        }
    }
}

/// One decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub channel: Channel,
    pub payload: Bytes,
}

impl Frame {
    /// Split a raw message into channel and payload.
    ///
    /// Returns `None` for an empty message, which carries no channel byte.
    pub fn decode(message: &Bytes) -> Option<Self> {
        let (&id, _) = message.split_first()?;
        Some(Self {
            channel: Channel::from(id),
            payload: message.slice(1..),
        })
    }

    /// Lossy text view of the payload.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// Prefix `data` with the stdin channel byte.
pub fn encode_stdin(data: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(data.len() + 1);
    buf.put_u8(Channel::Stdin.id());
    buf.put_slice(data);
    buf.freeze()
}

// ── Error channel ───────────────────────────────────────────────────

/// Status object sent on the error channel when the session ends.
///
/// Shaped like a Kubernetes `metav1.Status`. Unknown fields are kept in
/// `extra` so nothing the gateway sends is dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteStatus {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub details: Option<StatusDetails>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusDetails {
    #[serde(default)]
    pub causes: Vec<StatusCause>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusCause {
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl RemoteStatus {
    pub fn is_success(&self) -> bool {
        self.status.as_deref() != Some("Failure")
    }

    /// Exit code of the remote process.
    ///
    /// `0` unless the status is `Failure`; then the `ExitCode` cause, or
    /// `1` if the gateway did not include one.
    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            return 0;
        }
        self.details
            .iter()
            .flat_map(|d| &d.causes)
            .find(|c| c.reason.as_deref() == Some("ExitCode"))
            .and_then(|c| c.message.as_deref())
            .and_then(|m| m.trim().parse().ok())
            .unwrap_or(1)
    }
}

/// Decoded error-channel payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorChannel {
    /// JSON payload: the session is over.
    Status(RemoteStatus),
    /// Anything that is not JSON: a remote-side fault.
    Raw(String),
}

impl ErrorChannel {
    /// Any JSON payload ends the session; only non-JSON text is a fault.
    pub fn decode(payload: &[u8]) -> Self {
        match serde_json::from_slice::<Value>(payload) {
            Ok(value) => Self::Status(RemoteStatus::from_value(value)),
            Err(_) => Self::Raw(String::from_utf8_lossy(payload).into_owned()),
        }
    }
}

impl RemoteStatus {
    /// Build a status from arbitrary JSON.
    ///
    /// Fields of the wrong type are left unset and kept in `extra`; a
    /// non-object payload lands in `extra["value"]`.
    fn from_value(value: Value) -> Self {
        let map = match value {
            Value::Object(map) => map,
            other => {
                let mut extra = Map::new();
                extra.insert("value".into(), other);
                return Self {
                    extra,
                    ..Self::default()
                };
            }
        };
        if let Ok(status) = serde_json::from_value(Value::Object(map.clone())) {
            return status;
        }

        let text = |key: &str| map.get(key).and_then(Value::as_str).map(str::to_owned);
        let details = map
            .get("details")
            .cloned()
            .and_then(|d| serde_json::from_value(d).ok());
        Self {
            status: text("status"),
            message: text("message"),
            reason: text("reason"),
            details,
            extra: map,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn stdin_frames_carry_a_single_zero_prefix() {
        let frame = encode_stdin(b"uname -a\n");
        assert_eq!(frame.first(), Some(&0));
        assert_eq!(&frame[1..], b"uname -a\n");
    }

    #[test]
    fn decode_splits_channel_and_payload() {
        let frame = Frame::decode(&Bytes::from_static(b"\x02oops")).unwrap();
        assert_eq!(frame.channel, Channel::Stderr);
        assert_eq!(frame.text(), "oops");
    }

    #[test]
    fn decode_empty_message_is_none() {
        assert!(Frame::decode(&Bytes::new()).is_none());
    }

    #[test]
    fn channel_only_message_has_empty_payload() {
        let frame = Frame::decode(&Bytes::from_static(b"\x01")).unwrap();
        assert_eq!(frame.channel, Channel::Stdout);
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn unknown_channel_is_preserved() {
        let frame = Frame::decode(&Bytes::from_static(b"\x09x")).unwrap();
        assert_eq!(frame.channel, Channel::Other(9));
        assert_eq!(frame.channel.id(), 9);
    }

    #[test]
    fn invalid_utf8_is_decoded_lossily() {
        let frame = Frame::decode(&Bytes::from_static(b"\x01ok\xff")).unwrap();
        assert_eq!(frame.text(), "ok\u{fffd}");
    }

    #[test]
    fn error_channel_json_is_status() {
        let decoded = ErrorChannel::decode(br#"{"metadata":{},"status":"Success"}"#);
        let ErrorChannel::Status(status) = decoded else {
            panic!("expected status, got {decoded:?}");
        };
        assert!(status.is_success());
        assert_eq!(status.exit_code(), 0);
        assert!(status.extra.contains_key("metadata"));
    }

    #[test]
    fn error_channel_garbage_is_raw() {
        assert_eq!(
            ErrorChannel::decode(b"not-json-garbage"),
            ErrorChannel::Raw("not-json-garbage".into())
        );
    }

    #[test]
    fn any_json_on_error_channel_is_status() {
        for payload in ["42", r#""done""#, r#"{"status":1}"#, r#"{"details":{"causes":null}}"#] {
            let decoded = ErrorChannel::decode(payload.as_bytes());
            assert!(matches!(decoded, ErrorChannel::Status(_)), "got {decoded:?}");
        }
    }

    #[test]
    fn mistyped_status_fields_are_kept_in_extra() {
        let decoded = ErrorChannel::decode(br#"{"status":1,"message":"bye"}"#);
        let ErrorChannel::Status(status) = decoded else {
            panic!("expected status");
        };
        assert_eq!(status.status, None);
        assert_eq!(status.message.as_deref(), Some("bye"));
        assert_eq!(status.extra["status"], 1);
        assert_eq!(status.exit_code(), 0);
    }

    #[test]
    fn failure_with_malformed_causes_defaults_to_one() {
        let ErrorChannel::Status(status) =
            ErrorChannel::decode(br#"{"status":"Failure","details":{"causes":null}}"#)
        else {
            panic!("expected status");
        };
        assert!(status.details.is_none());
        assert_eq!(status.exit_code(), 1);
    }

    #[test]
    fn failure_status_exposes_exit_code() {
        let payload = serde_json::json!({
            "status": "Failure",
            "message": "command terminated with non-zero exit code",
            "reason": "NonZeroExitCode",
            "details": { "causes": [{ "reason": "ExitCode", "message": "127" }] }
        });
        let ErrorChannel::Status(status) = ErrorChannel::decode(payload.to_string().as_bytes())
        else {
            panic!("expected status");
        };
        assert!(!status.is_success());
        assert_eq!(status.exit_code(), 127);
    }

    #[test]
    fn failure_without_exit_code_defaults_to_one() {
        let status = RemoteStatus {
            status: Some("Failure".into()),
            ..RemoteStatus::default()
        };
        assert_eq!(status.exit_code(), 1);
    }
}
