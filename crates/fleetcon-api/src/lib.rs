// fleetcon-api: Async Rust client for device-fleet consoles and the device REST API

pub mod console;
pub mod devices;
pub mod error;
pub mod transport;
pub mod websocket;

#[cfg(test)]
mod test_support;

pub use console::{BlockingConsole, Console, ConsoleConfig, ExecOutput, RemoteStatus};
pub use devices::{Device, DeviceClient};
pub use error::Error;
pub use transport::{Closure, Connector, TlsMode, Transport, TransportConfig};
pub use websocket::{WsConnector, WsTransport};
