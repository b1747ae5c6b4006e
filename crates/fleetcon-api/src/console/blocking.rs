// Blocking facade over `Console` for synchronous callers.
//
// Owns a current-thread runtime and serializes every operation through a
// mutex, so one console can be shared by reference across threads while
// the transport still sees a single writer and a single reader.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::runtime::{Builder, Runtime};

use super::{Console, ConsoleConfig, ExecOutput};
use crate::error::Error;
use crate::transport::Connector;
use crate::websocket::WsConnector;

/// Synchronous console handle.
///
/// Must not be used from inside an async runtime: every call blocks the
/// current thread until the operation completes.
pub struct BlockingConsole<C: Connector = WsConnector> {
    runtime: Runtime,
    console: Mutex<Console<C>>,
}

impl BlockingConsole<WsConnector> {
    pub fn new(config: &ConsoleConfig) -> Result<Self, Error> {
        Self::with_connector(config, WsConnector)
    }
}

impl<C: Connector> BlockingConsole<C> {
    pub fn with_connector(config: &ConsoleConfig, connector: C) -> Result<Self, Error> {
        let console = Console::with_connector(config, connector)?;
        let runtime = Builder::new_current_thread().enable_all().build()?;
        Ok(Self {
            runtime,
            console: Mutex::new(console),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Console<C>> {
        // A panic mid-command leaves the console in a valid state: at
        // worst a stale transport, which the next failure drops.
        self.console.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_connected(&self) -> bool {
        self.lock().is_connected()
    }

    pub fn ensure_connected(&self) -> Result<(), Error> {
        let mut console = self.lock();
        self.runtime.block_on(console.ensure_connected())
    }

    pub fn close(&self) {
        let mut console = self.lock();
        self.runtime.block_on(console.close());
    }

    pub fn reset(&self) -> Result<(), Error> {
        let mut console = self.lock();
        self.runtime.block_on(console.reset())
    }

    pub fn exec(&self, command: &str) -> Result<ExecOutput, Error> {
        let mut console = self.lock();
        self.runtime.block_on(console.exec(command))
    }

    pub fn put_file(&self, local: &Path, remote: &str) -> Result<(), Error> {
        let mut console = self.lock();
        self.runtime.block_on(console.put_file(local, remote))
    }

    pub fn fetch_file(&self, remote: &str, local: &Path) -> Result<usize, Error> {
        let mut console = self.lock();
        self.runtime.block_on(console.fetch_file(remote, local))
    }
}

impl<C: Connector> Drop for BlockingConsole<C> {
    fn drop(&mut self) {
        let console = self
            .console
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        self.runtime.block_on(console.close());
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::test_support::{ScriptedConnector, Step, config};
    use crate::transport::Closure;

    #[test]
    fn exec_blocks_until_marker() {
        let connector = ScriptedConnector::new([Step::stdout("hi\n"), Step::EchoMarker]);
        let console = BlockingConsole::with_connector(&config(), connector).unwrap();

        let output = console.exec("echo hi").unwrap();
        assert_eq!(output.stdout, "hi");
        assert_eq!(output.exit_code(), 0);
        assert!(console.is_connected());
    }

    #[test]
    fn abnormal_close_is_connection_error() {
        let connector =
            ScriptedConnector::new([Step::Close(Closure::Abnormal("broken pipe".into()))]);
        let console = BlockingConsole::with_connector(&config(), connector).unwrap();

        let err = console.exec("ls").unwrap_err();
        assert!(err.to_string().contains("WebSocket connection error"));
    }

    #[test]
    fn close_twice_is_a_no_op() {
        let connector = ScriptedConnector::new([]);
        let console = BlockingConsole::with_connector(&config(), connector.clone()).unwrap();

        console.ensure_connected().unwrap();
        console.close();
        console.close();

        assert!(!console.is_connected());
        assert_eq!(connector.closes(), 1);
    }

    #[test]
    fn drop_closes_transport() {
        let connector = ScriptedConnector::new([]);
        {
            let console = BlockingConsole::with_connector(&config(), connector.clone()).unwrap();
            console.reset().unwrap();
        }
        assert_eq!(connector.closes(), 1);
    }

    #[test]
    fn concurrent_callers_are_serialized() {
        let connector = ScriptedConnector::new([]);
        for _ in 0..4 {
            connector.push([Step::stdout("ok\n"), Step::EchoMarker]);
        }
        let console =
            Arc::new(BlockingConsole::with_connector(&config(), connector.clone()).unwrap());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let console = Arc::clone(&console);
                std::thread::spawn(move || console.exec("echo ok").unwrap().stdout)
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), "ok");
        }
        assert_eq!(connector.sent().len(), 4);
        assert_eq!(connector.connects(), 1);
    }
}
