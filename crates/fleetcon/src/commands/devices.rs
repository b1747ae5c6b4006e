//! Device command handlers.

use fleetcon_api::Device;
use tabled::Tabled;

use crate::cli::{DevicesArgs, DevicesCommand, GlobalOpts};
use crate::config::Resolved;
use crate::error::CliError;
use crate::output;

use super::{device_client, with_timeout};

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Model")]
    model: String,
}

impl From<&Device> for DeviceRow {
    fn from(d: &Device) -> Self {
        Self {
            id: d.id.clone(),
            name: d.name.clone().unwrap_or_default(),
            status: d.status.clone().unwrap_or_default(),
            model: d.model.clone().unwrap_or_default(),
        }
    }
}

fn detail(d: &Device) -> String {
    let mut lines = vec![
        format!("ID:     {}", d.id),
        format!("Name:   {}", d.name.as_deref().unwrap_or("-")),
        format!("Status: {}", d.status.as_deref().unwrap_or("-")),
        format!("Model:  {}", d.model.as_deref().unwrap_or("-")),
    ];
    let mut extra: Vec<_> = d.extra.iter().collect();
    extra.sort_by(|a, b| a.0.cmp(b.0));
    lines.extend(extra.into_iter().map(|(k, v)| format!("{k}: {v}")));
    lines.join("\n")
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    args: DevicesArgs,
    resolved: &Resolved,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let client = device_client(resolved)?;

    let out = match args.command {
        DevicesCommand::List => {
            let devices = with_timeout(resolved.timeout, client.list_devices()).await?;
            output::render_list(global.output, &devices, |d| DeviceRow::from(d), |d| d.id.clone())?
        }
        DevicesCommand::Get { device } => {
            let device = with_timeout(resolved.timeout, client.find_device(&device)).await?;
            output::render_single(global.output, &device, detail, |d| d.id.clone())?
        }
    };

    output::print_output(&out, global.quiet);
    Ok(())
}
