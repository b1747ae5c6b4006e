//! `fleetcon exec`: run one shell command on the device.

use owo_colors::OwoColorize;

use crate::cli::{ExecArgs, GlobalOpts, OutputFormat};
use crate::config::Resolved;
use crate::error::CliError;
use crate::output;

use super::{open_console, with_timeout};

/// Returns the remote exit code.
pub async fn handle(
    args: ExecArgs,
    resolved: &Resolved,
    global: &GlobalOpts,
) -> Result<i32, CliError> {
    let command = args.command.join(" ");
    let (mut console, device) = open_console(resolved).await?;
    tracing::info!(device = %device, "running command");

    let result = with_timeout(resolved.timeout, console.exec(&command)).await;
    console.close().await;
    let out = result?;

    if global.output == OutputFormat::Json {
        output::print_output(&serde_json::to_string_pretty(&out)?, global.quiet);
        return Ok(out.exit_code());
    }

    output::print_output(&out.stdout, global.quiet);
    if !out.stderr.is_empty() {
        if output::should_color(global.color) {
            eprintln!("{}", out.stderr.red());
        } else {
            eprintln!("{}", out.stderr);
        }
    }
    if let Some(status) = out.status.as_ref().filter(|s| !s.is_success()) {
        let message = status.message.as_deref().unwrap_or("command failed");
        tracing::warn!(device = %device, exit_code = out.exit_code(), "{message}");
    }

    Ok(out.exit_code())
}
