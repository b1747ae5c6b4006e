// In-memory console transport driven by a script of inbound messages.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;

use crate::console::{Console, ConsoleConfig, ConsoleTarget};
use crate::error::Error;
use crate::transport::{Closure, Connector, TlsMode, Transport};

/// One scripted inbound event.
pub(crate) enum Step {
    /// Raw message, channel byte included.
    Message(Vec<u8>),
    /// Stdout frame echoing the marker of the last command sent.
    EchoMarker,
    /// The marker line split over two stdout frames.
    SplitMarker,
    /// Marker line followed by extra stdout in the same frame.
    MarkerWithTrailer(&'static str),
    /// Stdout frame carrying the base64 heredoc body of the most recent
    /// upload command.
    EchoUpload,
    Close(Closure),
}

impl Step {
    pub(crate) fn stdout(text: &str) -> Self {
        Self::on_channel(1, text.as_bytes())
    }

    pub(crate) fn stderr(text: &str) -> Self {
        Self::on_channel(2, text.as_bytes())
    }

    pub(crate) fn error(text: &str) -> Self {
        Self::on_channel(3, text.as_bytes())
    }

    fn on_channel(channel: u8, payload: &[u8]) -> Self {
        let mut message = vec![channel];
        message.extend_from_slice(payload);
        Self::Message(message)
    }
}

#[derive(Default)]
struct Shared {
    steps: VecDeque<Step>,
    sent: Vec<Vec<u8>>,
    connects: usize,
    closes: usize,
    connect_error: Option<String>,
    send_error: Option<Closure>,
}

#[derive(Clone, Default)]
pub(crate) struct ScriptedConnector {
    shared: Arc<Mutex<Shared>>,
}

impl ScriptedConnector {
    pub(crate) fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        let connector = Self::default();
        connector.lock().steps.extend(steps);
        connector
    }

    pub(crate) fn push(&self, steps: impl IntoIterator<Item = Step>) {
        self.lock().steps.extend(steps);
    }

    pub(crate) fn fail_connects(&self, reason: &str) {
        self.lock().connect_error = Some(reason.to_owned());
    }

    pub(crate) fn fail_sends(&self, closure: Closure) {
        self.lock().send_error = Some(closure);
    }

    /// Every message sent so far, channel byte included.
    pub(crate) fn sent(&self) -> Vec<Vec<u8>> {
        self.lock().sent.clone()
    }

    /// Text of the last sent message, without the channel byte.
    pub(crate) fn last_command(&self) -> String {
        self.lock()
            .sent
            .last()
            .map(|m| String::from_utf8_lossy(m.get(1..).unwrap_or_default()).into_owned())
            .unwrap_or_default()
    }

    fn last_upload(&self) -> String {
        self.lock()
            .sent
            .iter()
            .rev()
            .map(|m| String::from_utf8_lossy(m.get(1..).unwrap_or_default()).into_owned())
            .find(|c| c.contains("| base64 -d >"))
            .unwrap_or_default()
    }

    pub(crate) fn connects(&self) -> usize {
        self.lock().connects
    }

    pub(crate) fn closes(&self) -> usize {
        self.lock().closes
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap()
    }
}

impl Connector for ScriptedConnector {
    type Transport = ScriptedTransport;

    async fn connect(&self, _target: &ConsoleTarget) -> Result<ScriptedTransport, Error> {
        let mut shared = self.lock();
        if let Some(reason) = &shared.connect_error {
            return Err(Error::Connection(format!(
                "WebSocket connection failed: {reason}"
            )));
        }
        shared.connects += 1;
        Ok(ScriptedTransport {
            connector: self.clone(),
            pending: VecDeque::new(),
        })
    }
}

pub(crate) struct ScriptedTransport {
    connector: ScriptedConnector,
    pending: VecDeque<Bytes>,
}

impl ScriptedTransport {
    fn expand(&mut self, step: Step) -> Result<(), Closure> {
        let command = self.connector.last_command();
        let marker = command
            .rsplit_once("\necho ")
            .map(|(_, m)| m.trim().to_owned())
            .unwrap_or_default();

        let stdout = |text: &str| {
            let mut message = vec![1];
            message.extend_from_slice(text.as_bytes());
            Bytes::from(message)
        };

        match step {
            Step::Message(message) => self.pending.push_back(Bytes::from(message)),
            Step::EchoMarker => self.pending.push_back(stdout(&format!("{marker}\n"))),
            Step::SplitMarker => {
                let (head, tail) = marker.split_at(marker.len() / 2);
                self.pending.push_back(stdout(head));
                self.pending.push_back(stdout(&format!("{tail}\n")));
            }
            Step::MarkerWithTrailer(trailer) => {
                self.pending
                    .push_back(stdout(&format!("{marker}\n{trailer}")));
            }
            Step::EchoUpload => {
                let upload = self.connector.last_upload();
                let body = upload
                    .split_once('\n')
                    .and_then(|(_, rest)| rest.split_once('\n'))
                    .map(|(body, _)| body.to_owned())
                    .unwrap_or_default();
                self.pending.push_back(stdout(&format!("{body}\n")));
            }
            Step::Close(closure) => return Err(closure),
        }
        Ok(())
    }
}

impl Transport for ScriptedTransport {
    async fn send(&mut self, message: Bytes) -> Result<(), Closure> {
        let mut shared = self.connector.lock();
        if let Some(closure) = &shared.send_error {
            return Err(closure.clone());
        }
        shared.sent.push(message.to_vec());
        Ok(())
    }

    async fn recv(&mut self) -> Result<Bytes, Closure> {
        loop {
            if let Some(message) = self.pending.pop_front() {
                return Ok(message);
            }
            let step = self.connector.lock().steps.pop_front();
            match step {
                Some(step) => self.expand(step)?,
                None => return Err(Closure::Abnormal("script exhausted".into())),
            }
        }
    }

    async fn close(&mut self) {
        self.connector.lock().closes += 1;
    }
}

pub(crate) fn config() -> ConsoleConfig {
    ConsoleConfig {
        host: "fleet.test".into(),
        device_id: "dev-1".into(),
        token: None,
        tls: TlsMode::Verify,
    }
}

pub(crate) fn console(connector: ScriptedConnector) -> Console<ScriptedConnector> {
    Console::with_connector(&config(), connector).unwrap()
}
