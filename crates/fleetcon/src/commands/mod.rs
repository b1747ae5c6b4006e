//! Command dispatch and shared helpers.

pub mod config_cmd;
pub mod devices;
pub mod exec;
pub mod transfer;

use std::future::Future;
use std::time::Duration;

use clap::CommandFactory;
use fleetcon_api::{Console, DeviceClient};
use tracing::debug;

use crate::cli::{Cli, Command, GlobalOpts};
use crate::config::{self, Resolved};
use crate::error::{CliError, exit_code};

/// Run one command; returns the process exit code.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<i32, CliError> {
    match cmd {
        // Config commands don't need a device connection
        Command::Config(args) => config_cmd::handle(args, global).map(|()| exit_code::SUCCESS),

        Command::Completions(args) => {
            let mut cmd = Cli::command();
            clap_complete::generate(args.shell, &mut cmd, "fleetcon", &mut std::io::stdout());
            Ok(exit_code::SUCCESS)
        }

        Command::Exec(args) => exec::handle(args, &settings(global)?, global).await,
        Command::Put(args) => transfer::put(args, &settings(global)?, global)
            .await
            .map(|()| exit_code::SUCCESS),
        Command::Fetch(args) => transfer::fetch(args, &settings(global)?, global)
            .await
            .map(|()| exit_code::SUCCESS),
        Command::Devices(args) => devices::handle(args, &settings(global)?, global)
            .await
            .map(|()| exit_code::SUCCESS),
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Resolve connection settings for commands that talk to the fleet.
fn settings(global: &GlobalOpts) -> Result<Resolved, CliError> {
    let resolved = config::resolve(global)?;
    debug!(
        profile = %resolved.profile_name,
        host = %resolved.host,
        "resolved settings"
    );
    Ok(resolved)
}

/// Bound a library call by the resolved timeout.
pub async fn with_timeout<T>(
    timeout: Duration,
    fut: impl Future<Output = Result<T, fleetcon_api::Error>>,
) -> Result<T, CliError> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(fleetcon_api::Error::Timeout {
            timeout_secs: timeout.as_secs(),
        }
        .into()),
    }
}

pub fn device_client(resolved: &Resolved) -> Result<DeviceClient, CliError> {
    Ok(DeviceClient::new(
        &resolved.host,
        resolved.token.as_ref(),
        &resolved.transport(),
    )?)
}

/// Turn `--device` into a console device id.
///
/// Names are looked up through the REST API. When the lookup itself can't
/// be done (no REST API, unreachable), the value is used as an id verbatim.
pub async fn resolve_device(resolved: &Resolved) -> Result<String, CliError> {
    let requested = resolved.device.as_deref().ok_or(CliError::NoDevice)?;

    let lookup = match device_client(resolved) {
        Ok(client) => with_timeout(resolved.timeout, client.find_device(requested)).await,
        Err(err) => Err(err),
    };

    match lookup {
        Ok(device) => {
            debug!(requested, id = %device.id, "device resolved");
            Ok(device.id)
        }
        Err(err @ CliError::NotFound { .. }) => Err(err),
        Err(err) => {
            debug!(requested, error = %err, "device lookup unavailable, using value as id");
            Ok(requested.to_owned())
        }
    }
}

/// Open a console for the resolved device. The transport connects lazily.
pub async fn open_console(resolved: &Resolved) -> Result<(Console, String), CliError> {
    let device = resolve_device(resolved).await?;
    let console = Console::new(&resolved.console(&device))?;
    Ok((console, device))
}
