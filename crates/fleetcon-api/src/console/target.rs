// Console endpoint addressing: host normalization, device path, and the
// session metadata query parameter.

use secrecy::SecretString;
use serde::Serialize;
use url::Url;

use crate::error::Error;
use crate::transport::TlsMode;

/// Remote-command subprotocol negotiated on the upgrade request.
pub const SUBPROTOCOL: &str = "v4.channel.k8s.io";

/// Session description sent as the `metadata` query parameter.
///
/// Fixed for command execution: no TTY and an empty command, since
/// commands are written to stdin after the session is open.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct SessionMetadata {
    pub tty: bool,
    pub command: String,
}

/// Connection settings for one device console.
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    /// Fleet API host, with or without scheme (`fleet.example.com`,
    /// `https://fleet.example.com:8443/base`).
    pub host: String,
    /// Device identifier the console belongs to.
    pub device_id: String,
    /// Bearer token. Omitted from the upgrade request when `None`.
    pub token: Option<SecretString>,
    /// Certificate verification mode.
    pub tls: TlsMode,
}

/// A validated console endpoint, ready to connect to.
#[derive(Debug, Clone)]
pub struct ConsoleTarget {
    device_id: String,
    url: Url,
    token: Option<SecretString>,
    tls: TlsMode,
}

impl ConsoleTarget {
    /// Validate `config` and build the console URL.
    ///
    /// Fails with [`Error::Configuration`] when the device id or host is
    /// missing, before anything touches the network.
    pub fn new(config: &ConsoleConfig) -> Result<Self, Error> {
        let device_id = config.device_id.trim();
        if device_id.is_empty() {
            return Err(Error::Configuration("device id is required".into()));
        }

        let url = console_url(
            &normalize_host(&config.host)?,
            device_id,
            &SessionMetadata::default(),
        )?;

        Ok(Self {
            device_id: device_id.to_owned(),
            url,
            token: config.token.clone(),
            tls: config.tls,
        })
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Full console URL including the metadata query.
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn token(&self) -> Option<&SecretString> {
        self.token.as_ref()
    }

    pub fn tls(&self) -> TlsMode {
        self.tls
    }
}

/// Normalize a configured host into a WebSocket base URL.
///
/// No scheme defaults to `wss`. `https`/`http` map onto `wss`/`ws`.
pub fn normalize_host(host: &str) -> Result<Url, Error> {
    let host = host.trim();
    if host.is_empty() {
        return Err(Error::Configuration("host is required".into()));
    }

    let (scheme, rest) = match host.split_once("://") {
        Some((scheme, rest)) => {
            let mapped = match scheme.to_ascii_lowercase().as_str() {
                "https" | "wss" => "wss",
                "http" | "ws" => "ws",
                other => {
                    return Err(Error::Configuration(format!(
                        "unsupported host scheme '{other}'"
                    )));
                }
            };
            (mapped, rest)
        }
        None => ("wss", host),
    };

    Ok(Url::parse(&format!("{scheme}://{rest}"))?)
}

/// Append `/ws/v1/devices/<id>/console?metadata=<json>` to `base`.
pub fn console_url(base: &Url, device_id: &str, metadata: &SessionMetadata) -> Result<Url, Error> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| Error::Configuration(format!("host cannot carry a path: {base}")))?
        .pop_if_empty()
        .extend(["ws", "v1", "devices", device_id, "console"]);

    let metadata = serde_json::to_string(metadata)
        .map_err(|e| Error::Configuration(format!("failed to encode session metadata: {e}")))?;
    url.set_query(None);
    url.query_pairs_mut().append_pair("metadata", &metadata);

    Ok(url)
}
