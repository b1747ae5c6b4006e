//! CLI-side settings resolution: config file profile + `GlobalOpts` flags.
//!
//! Precedence is flag/env var > profile > `[defaults]`. The library
//! crates only ever see the finished `ConsoleConfig` / `TransportConfig`.

use std::time::Duration;

use secrecy::SecretString;

use fleetcon_api::{ConsoleConfig, TlsMode, TransportConfig};
use fleetcon_config::{Config, config_path, load_config, profile_to_transport, resolve_token};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Connection settings after merging every source.
#[derive(Debug)]
pub struct Resolved {
    pub profile_name: String,
    pub host: String,
    pub token: Option<SecretString>,
    pub tls: TlsMode,
    pub timeout: Duration,
    pub device: Option<String>,
}

impl Resolved {
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: self.tls,
            timeout: self.timeout,
        }
    }

    /// Console settings for `device_id`.
    pub fn console(&self, device_id: &str) -> ConsoleConfig {
        ConsoleConfig {
            host: self.host.clone(),
            device_id: device_id.to_owned(),
            token: self.token.clone(),
            tls: self.tls,
        }
    }
}

/// Load the config file and merge it with CLI flags.
pub fn resolve(global: &GlobalOpts) -> Result<Resolved, CliError> {
    let cfg = load_config()?;
    resolve_with(&cfg, global)
}

fn resolve_with(cfg: &Config, global: &GlobalOpts) -> Result<Resolved, CliError> {
    let profile_name = cfg.active_profile_name(global.profile.as_deref()).to_owned();
    let flag_token = global.token.clone().map(SecretString::from);

    let Some(profile) = cfg.profiles.get(&profile_name) else {
        // An explicitly requested profile must exist
        if global.profile.is_some() {
            return Err(CliError::ProfileNotFound {
                available: available_profiles(cfg),
                name: profile_name,
            });
        }

        // No profile: flags and env vars alone
        let host = global.host.clone().ok_or_else(|| CliError::NoConfig {
            path: config_path().display().to_string(),
        })?;

        return Ok(Resolved {
            profile_name,
            host,
            token: flag_token,
            tls: TlsMode::from_verify(!global.insecure),
            timeout: Duration::from_secs(global.timeout.unwrap_or(cfg.defaults.timeout)),
            device: global.device.clone(),
        });
    };

    let base = profile_to_transport(profile, &cfg.defaults);
    let tls = if global.insecure {
        TlsMode::DangerAcceptInvalid
    } else {
        base.tls
    };

    Ok(Resolved {
        host: global.host.clone().unwrap_or_else(|| profile.host.clone()),
        token: flag_token.or_else(|| resolve_token(profile, &profile_name)),
        tls,
        timeout: global.timeout.map_or(base.timeout, Duration::from_secs),
        device: global.device.clone().or_else(|| profile.device.clone()),
        profile_name,
    })
}

/// Comma-separated profile names, sorted, or `(none)`.
pub fn available_profiles(cfg: &Config) -> String {
    let mut names: Vec<_> = cfg.profiles.keys().map(String::as_str).collect();
    if names.is_empty() {
        return "(none)".into();
    }
    names.sort_unstable();
    names.join(", ")
}
