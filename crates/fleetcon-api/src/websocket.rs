//! WebSocket transport for device consoles.
//!
//! Opens `wss://<host>/ws/v1/devices/<id>/console` with the
//! `v4.channel.k8s.io` subprotocol and a bearer token, then moves binary
//! messages in and out. Control frames are handled here; the console only
//! sees data.

use std::sync::Arc;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::WebPkiSupportedAlgorithms;
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};
use secrecy::ExposeSecret;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

use crate::console::{ConsoleTarget, SUBPROTOCOL};
use crate::error::Error;
use crate::transport::{Closure, Connector, TlsMode, Transport};

// ── Connector ───────────────────────────────────────────────────────

/// Opens console transports over `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    type Transport = WsTransport;

    async fn connect(&self, target: &ConsoleTarget) -> Result<WsTransport, Error> {
        let uri: tungstenite::http::Uri = target
            .url()
            .as_str()
            .parse()
            .map_err(connect_failed)?;

        let mut request = ClientRequestBuilder::new(uri).with_sub_protocol(SUBPROTOCOL);
        if let Some(token) = target.token() {
            request = request.with_header(
                "Authorization",
                format!("Bearer {}", token.expose_secret()),
            );
        }

        let tls = tokio_tungstenite::Connector::Rustls(tls_config(target.tls())?);

        let (stream, response) =
            tokio_tungstenite::connect_async_tls_with_config(request, None, false, Some(tls))
                .await
                .map_err(connect_failed)?;

        debug!(
            device = target.device_id(),
            status = %response.status(),
            "console connected"
        );

        Ok(WsTransport { stream })
    }
}

fn connect_failed(e: impl std::fmt::Display) -> Error {
    Error::Connection(format!("WebSocket connection failed: {e}"))
}

// ── Transport ───────────────────────────────────────────────────────

/// One open console WebSocket.
pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl Transport for WsTransport {
    async fn send(&mut self, message: Bytes) -> Result<(), Closure> {
        self.stream
            .send(Message::Binary(message))
            .await
            .map_err(closure_from_error)
    }

    async fn recv(&mut self) -> Result<Bytes, Closure> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Binary(data))) => return Ok(data),
                Some(Ok(Message::Text(text))) => {
                    return Ok(Bytes::copy_from_slice(text.as_bytes()));
                }
                Some(Ok(Message::Close(frame))) => return Err(closure_from_frame(frame.as_ref())),
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {
                    // tungstenite answers pings itself
                    trace!("console control frame");
                }
                Some(Err(e)) => return Err(closure_from_error(e)),
                None => return Err(Closure::Clean),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!(error = %e, "console close failed");
        }
    }
}

/// Normal and going-away close codes are clean; everything else is not.
fn closure_from_frame(frame: Option<&CloseFrame>) -> Closure {
    match frame {
        None => Closure::Clean,
        Some(cf) if matches!(cf.code, CloseCode::Normal | CloseCode::Away) => Closure::Clean,
        Some(cf) => Closure::Abnormal(format!("close code {}: {}", cf.code, cf.reason)),
    }
}

fn closure_from_error(e: tungstenite::Error) -> Closure {
    match e {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => Closure::Clean,
        other => Closure::Abnormal(other.to_string()),
    }
}

// ── TLS ─────────────────────────────────────────────────────────────

fn tls_config(mode: TlsMode) -> Result<Arc<ClientConfig>, Error> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::Tls(e.to_string()))?;

    let config = match mode {
        TlsMode::Verify => {
            let roots = RootCertStore {
                roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
            };
            builder.with_root_certificates(roots).with_no_client_auth()
        }
        TlsMode::DangerAcceptInvalid => builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCert {
                algorithms: provider.signature_verification_algorithms,
            }))
            .with_no_client_auth(),
    };

    Ok(Arc::new(config))
}

/// Skips certificate validation. Handshake signatures are still checked.
#[derive(Debug)]
struct AcceptAnyCert {
    algorithms: WebPkiSupportedAlgorithms,
}

impl ServerCertVerifier for AcceptAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_and_away_close_codes_are_clean() {
        let normal = CloseFrame {
            code: CloseCode::Normal,
            reason: tungstenite::Utf8Bytes::from_static("bye"),
        };
        let away = CloseFrame {
            code: CloseCode::Away,
            reason: tungstenite::Utf8Bytes::from_static(""),
        };
        assert_eq!(closure_from_frame(Some(&normal)), Closure::Clean);
        assert_eq!(closure_from_frame(Some(&away)), Closure::Clean);
        assert_eq!(closure_from_frame(None), Closure::Clean);
    }

    #[test]
    fn error_close_codes_are_abnormal() {
        let frame = CloseFrame {
            code: CloseCode::Error,
            reason: tungstenite::Utf8Bytes::from_static("internal"),
        };
        let Closure::Abnormal(reason) = closure_from_frame(Some(&frame)) else {
            panic!("expected abnormal closure");
        };
        assert!(reason.contains("1011"), "{reason}");
        assert!(reason.contains("internal"), "{reason}");
    }

    #[test]
    fn closed_connection_errors_are_clean() {
        assert_eq!(
            closure_from_error(tungstenite::Error::ConnectionClosed),
            Closure::Clean
        );
        assert_eq!(
            closure_from_error(tungstenite::Error::AlreadyClosed),
            Closure::Clean
        );
    }

    #[test]
    fn protocol_errors_are_abnormal() {
        let err = tungstenite::Error::Protocol(
            tungstenite::error::ProtocolError::ResetWithoutClosingHandshake,
        );
        assert!(matches!(closure_from_error(err), Closure::Abnormal(_)));
    }

    #[test]
    fn both_tls_modes_build() {
        assert!(tls_config(TlsMode::Verify).is_ok());
        assert!(tls_config(TlsMode::DangerAcceptInvalid).is_ok());
    }
}
