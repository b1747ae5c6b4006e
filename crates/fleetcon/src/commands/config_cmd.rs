//! Config subcommand handlers.

use std::fmt::Write as _;
use std::io::BufRead;

use fleetcon_config::{self as cfgfile, Config, KEYRING_SERVICE, Profile};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::config::available_profiles;
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

/// Format config for display, masking plaintext tokens.
fn format_config_redacted(cfg: &Config) -> String {
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);

    let mut names: Vec<_> = cfg.profiles.keys().collect();
    names.sort();
    for name in names {
        let p = &cfg.profiles[name];
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        let _ = writeln!(out, "host = \"{}\"", p.host);
        if p.token.is_some() {
            let _ = writeln!(out, "token = \"****\"");
        }
        if let Some(ref env) = p.token_env {
            let _ = writeln!(out, "token_env = \"{env}\"");
        }
        let _ = writeln!(out, "verify_tls = {}", p.verify_tls);
        if let Some(ref device) = p.device {
            let _ = writeln!(out, "device = \"{device}\"");
        }
        if let Some(timeout) = p.timeout {
            let _ = writeln!(out, "timeout = {timeout}");
        }
    }

    out.trim_end().to_owned()
}

/// JSON view of the config with plaintext tokens masked.
fn redacted_json(cfg: &Config) -> Result<serde_json::Value, CliError> {
    let mut value = serde_json::to_value(cfg)?;
    if let Some(profiles) = value.get_mut("profiles").and_then(|p| p.as_object_mut()) {
        for profile in profiles.values_mut() {
            if let Some(token) = profile.get_mut("token").filter(|t| !t.is_null()) {
                *token = "****".into();
            }
        }
    }
    Ok(value)
}

fn empty_profile() -> Profile {
    Profile {
        host: String::new(),
        token: None,
        token_env: None,
        verify_tls: true,
        device: None,
        timeout: None,
    }
}

fn parse_value<T: std::str::FromStr>(
    field: &str,
    value: &str,
    expected: &str,
) -> Result<T, CliError> {
    value.parse().map_err(|_| CliError::Validation {
        field: field.into(),
        reason: format!("must be {expected}"),
    })
}

fn keyring_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "keyring".into(),
        reason: e.to_string(),
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            let cfg = cfgfile::load_config()?;
            let out = match global.output {
                OutputFormat::Json => serde_json::to_string_pretty(&redacted_json(&cfg)?)?,
                _ => format_config_redacted(&cfg),
            };
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            println!("{}", cfgfile::config_path().display());
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = cfgfile::load_config_or_default();
            let default = cfg.active_profile_name(None);
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: fleetcon config set host <host>");
                return Ok(());
            }
            let mut names: Vec<_> = cfg.profiles.keys().collect();
            names.sort();
            for name in names {
                let marker = if name == default { " *" } else { "" };
                println!("{name}{marker}");
            }
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = cfgfile::load_config()?;
            if !cfg.profiles.contains_key(&name) {
                return Err(CliError::ProfileNotFound {
                    available: available_profiles(&cfg),
                    name,
                });
            }

            cfg.default_profile = Some(name.clone());
            cfgfile::save_config(&cfg)?;
            output::success(
                &format!("Default profile set to '{name}'"),
                output::should_color(global.color),
                global.quiet,
            );
            Ok(())
        }

        ConfigCommand::Set { key, value } => {
            let mut cfg = cfgfile::load_config()?;
            let profile_name = cfg.active_profile_name(global.profile.as_deref()).to_owned();
            let profile = cfg
                .profiles
                .entry(profile_name.clone())
                .or_insert_with(empty_profile);

            match key.as_str() {
                "host" => profile.host = value,
                "token" => profile.token = Some(value),
                "token_env" | "token-env" => profile.token_env = Some(value),
                "device" => profile.device = Some(value),
                "verify_tls" | "verify-tls" => {
                    profile.verify_tls = parse_value("verify_tls", &value, "'true' or 'false'")?;
                }
                "timeout" => {
                    profile.timeout = Some(parse_value("timeout", &value, "a number (seconds)")?);
                }
                other => {
                    return Err(CliError::Validation {
                        field: other.into(),
                        reason: format!(
                            "unknown config key '{other}'. Valid keys: host, token, token_env, \
                             verify_tls, device, timeout"
                        ),
                    });
                }
            }

            cfgfile::save_config(&cfg)?;
            output::success(
                &format!("Set {key} on profile '{profile_name}'"),
                output::should_color(global.color),
                global.quiet,
            );
            Ok(())
        }

        ConfigCommand::SetToken => {
            let cfg = cfgfile::load_config_or_default();
            let profile_name = cfg.active_profile_name(global.profile.as_deref()).to_owned();

            let mut token = String::new();
            std::io::stdin().lock().read_line(&mut token)?;
            let token = token.trim();
            if token.is_empty() {
                return Err(CliError::Validation {
                    field: "token".into(),
                    reason: "no token on stdin".into(),
                });
            }

            keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/token"))
                .map_err(keyring_err)?
                .set_password(token)
                .map_err(keyring_err)?;

            output::success(
                &format!("Token stored in system keyring for profile '{profile_name}'"),
                output::should_color(global.color),
                global.quiet,
            );
            Ok(())
        }
    }
}
