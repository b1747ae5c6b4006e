// Device REST client
//
// Just enough of the fleet REST API to turn a device name into the id the
// console endpoint wants: list devices, find one by id or name.

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// A device as reported by `GET /api/v1/devices`.
///
/// Uses `#[serde(flatten)]` to keep every field beyond the core set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub status: Option<String>,

    #[serde(default)]
    pub model: Option<String>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// The listing comes back bare or wrapped, depending on API version.
#[derive(Deserialize)]
#[serde(untagged)]
enum DeviceList {
    Bare(Vec<Device>),
    Items { items: Vec<Device> },
    Data { data: Vec<Device> },
}

impl DeviceList {
    fn into_devices(self) -> Vec<Device> {
        match self {
            Self::Bare(devices) | Self::Items { items: devices } | Self::Data { data: devices } => {
                devices
            }
        }
    }
}

/// HTTP client for the fleet REST API.
pub struct DeviceClient {
    http: reqwest::Client,
    base_url: Url,
}

impl DeviceClient {
    /// Build a client for `host` (scheme optional, defaults to `https`).
    pub fn new(
        host: &str,
        token: Option<&SecretString>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
                .map_err(|_| Error::Configuration("token is not a valid header value".into()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        Ok(Self {
            http: transport.build_client(headers)?,
            base_url: api_base(host)?,
        })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/api/v1/{path}"))?)
    }

    /// List every device visible to the token.
    pub async fn list_devices(&self) -> Result<Vec<Device>, Error> {
        let url = self.url("devices")?;
        debug!("GET {url}");

        let resp = self.http.get(url).send().await?;
        let status = resp.status();

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(Error::Authentication {
                message: format!("token rejected (HTTP {status})"),
            });
        }

        let body = resp.text().await?;
        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                message: preview(&body).to_owned(),
            });
        }

        let list: DeviceList = serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: format!("{e} (body preview: {:?})", preview(&body)),
            body: body.clone(),
        })?;
        Ok(list.into_devices())
    }

    /// Find a device by exact id, falling back to an exact name match.
    pub async fn find_device(&self, identifier: &str) -> Result<Device, Error> {
        let devices = self.list_devices().await?;
        let by_id = devices.iter().position(|d| d.id == identifier);
        let index = by_id.or_else(|| {
            devices
                .iter()
                .position(|d| d.name.as_deref() == Some(identifier))
        });

        index
            .and_then(|i| devices.into_iter().nth(i))
            .ok_or_else(|| Error::DeviceNotFound {
                identifier: identifier.to_owned(),
            })
    }
}

fn preview(body: &str) -> &str {
    let end = body
        .char_indices()
        .nth(200)
        .map_or(body.len(), |(i, _)| i);
    &body[..end]
}

/// Normalize a configured host into the REST base URL.
///
/// No scheme defaults to `https`; `wss`/`ws` map onto `https`/`http`.
pub fn api_base(host: &str) -> Result<Url, Error> {
    let host = host.trim();
    if host.is_empty() {
        return Err(Error::Configuration("host is required".into()));
    }

    let url = match host.split_once("://") {
        Some((scheme, rest)) => {
            let mapped = match scheme.to_ascii_lowercase().as_str() {
                "https" | "wss" => "https",
                "http" | "ws" => "http",
                other => {
                    return Err(Error::Configuration(format!(
                        "unsupported host scheme '{other}'"
                    )));
                }
            };
            format!("{mapped}://{rest}")
        }
        None => format!("https://{host}"),
    };

    Ok(Url::parse(&url)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn api_base_defaults_to_https() {
        assert_eq!(api_base("fleet.example.com").unwrap().as_str(), "https://fleet.example.com/");
        assert_eq!(api_base("wss://gw:8443").unwrap().as_str(), "https://gw:8443/");
        assert_eq!(api_base("http://127.0.0.1:9").unwrap().scheme(), "http");
    }

    #[test]
    fn api_base_rejects_empty_host() {
        assert!(matches!(api_base(" "), Err(Error::Configuration(_))));
    }

    #[test]
    fn device_list_accepts_wrapped_shapes() {
        for body in [
            r#"[{"id":"a"}]"#,
            r#"{"items":[{"id":"a"}]}"#,
            r#"{"data":[{"id":"a"}],"total":1}"#,
        ] {
            let list: DeviceList = serde_json::from_str(body).unwrap();
            assert_eq!(list.into_devices()[0].id, "a", "{body}");
        }
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        let body = "é".repeat(300);
        assert_eq!(preview(&body).chars().count(), 200);
        assert_eq!(preview("short"), "short");
    }
}
