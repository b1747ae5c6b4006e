//! `fleetcon put` / `fleetcon fetch`: file transfer through the console.

use serde_json::json;

use crate::cli::{FetchArgs, GlobalOpts, OutputFormat, PutArgs};
use crate::config::Resolved;
use crate::error::CliError;
use crate::output;

use super::{open_console, with_timeout};

pub async fn put(args: PutArgs, resolved: &Resolved, global: &GlobalOpts) -> Result<(), CliError> {
    let size = tokio::fs::metadata(&args.local).await?.len();
    let (mut console, device) = open_console(resolved).await?;

    let upload = console.put_file(&args.local, &args.remote);
    let result = with_timeout(resolved.timeout, upload).await;
    console.close().await;
    result?;

    let message = format!(
        "Uploaded {} to {device}:{} ({})",
        args.local.display(),
        args.remote,
        output::format_bytes(usize::try_from(size).unwrap_or(usize::MAX)),
    );
    let summary = json!({
        "device": device,
        "local": args.local.display().to_string(),
        "remote": args.remote,
        "bytes": size,
    });
    report(global, &summary, &message)
}

pub async fn fetch(
    args: FetchArgs,
    resolved: &Resolved,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let (mut console, device) = open_console(resolved).await?;

    let download = console.fetch_file(&args.remote, &args.local);
    let result = with_timeout(resolved.timeout, download).await;
    console.close().await;
    let size = result?;

    let message = format!(
        "Fetched {device}:{} to {} ({})",
        args.remote,
        args.local.display(),
        output::format_bytes(size),
    );
    let summary = json!({
        "device": device,
        "remote": args.remote,
        "local": args.local.display().to_string(),
        "bytes": size,
    });
    report(global, &summary, &message)
}

fn report(global: &GlobalOpts, summary: &serde_json::Value, message: &str) -> Result<(), CliError> {
    match global.output {
        OutputFormat::Json => {
            output::print_output(&serde_json::to_string_pretty(summary)?, global.quiet);
        }
        OutputFormat::Plain => {
            output::print_output(summary["bytes"].to_string().as_str(), global.quiet);
        }
        OutputFormat::Table => {
            output::success(message, output::should_color(global.color), global.quiet);
        }
    }
    Ok(())
}
