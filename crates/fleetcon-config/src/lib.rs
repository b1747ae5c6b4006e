//! Shared configuration for fleetcon.
//!
//! TOML profiles, token resolution (env + keyring + plaintext), and
//! translation to `fleetcon_api::TransportConfig`. The CLI layers its
//! `GlobalOpts` overrides on top of what this crate resolves.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use fleetcon_api::{TlsMode, TransportConfig};

/// Keyring service name; entries are keyed `<profile>/token`.
pub const KEYRING_SERVICE: &str = "fleetcon";

/// Environment variable that overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "FLEETCON_CONFIG";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when `--profile` is not given.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named fleet profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Name of the profile to use: explicit choice, then `default_profile`.
    pub fn active_profile_name<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        requested
            .or(self.default_profile.as_deref())
            .unwrap_or("default")
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_verify_tls() -> bool {
    true
}

/// A named fleet profile.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Profile {
    /// Fleet API host (e.g. "fleet.example.com" or "https://gw:8443").
    pub host: String,

    /// Bearer token (plaintext; prefer keyring or `token_env`).
    pub token: Option<String>,

    /// Environment variable name holding the token.
    pub token_env: Option<String>,

    /// Verify the gateway certificate.
    #[serde(default = "default_verify_tls")]
    pub verify_tls: bool,

    /// Device used when `--device` is not given.
    pub device: Option<String>,

    /// Override the default timeout.
    pub timeout: Option<u64>,
}

impl Profile {
    pub fn tls_mode(&self) -> TlsMode {
        TlsMode::from_verify(self.verify_tls)
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path: `FLEETCON_CONFIG`, then platform conventions.
pub fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
        return PathBuf::from(path);
    }

    ProjectDirs::from("com", "fleetcon", "fleetcon").map_or_else(
        || {
            let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
            p.push(".config");
            p.push("fleetcon");
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load config from `path`, layered over defaults and under `FLEETCON_*`
/// variables (`FLEETCON_DEFAULTS__TIMEOUT=60`). A missing file is not an error.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");

    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("FLEETCON_").split("__"));

    Ok(figment.extract()?)
}

/// Load config, returning a default if it can't be read.
///
/// For read-only callers. Anything that saves the result must use
/// [`load_config`] so a broken file is reported instead of overwritten.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Token resolution (without CLI flags) ────────────────────────────

/// Resolve a profile's bearer token: `token_env`, keyring, then plaintext.
///
/// Returns `None` when nothing is configured; gateways that don't
/// require auth accept an unauthenticated upgrade.
pub fn resolve_token(profile: &Profile, profile_name: &str) -> Option<SecretString> {
    resolve_token_with(
        profile,
        |var| std::env::var(var).ok(),
        || keyring_token(profile_name),
    )
}

fn resolve_token_with(
    profile: &Profile,
    env: impl Fn(&str) -> Option<String>,
    keyring: impl FnOnce() -> Option<String>,
) -> Option<SecretString> {
    // 1. Profile's token_env → env var lookup
    if let Some(value) = profile.token_env.as_deref().and_then(&env) {
        return Some(SecretString::from(value));
    }

    // 2. System keyring
    if let Some(secret) = keyring() {
        return Some(SecretString::from(secret));
    }

    // 3. Plaintext in config
    profile.token.clone().map(SecretString::from)
}

fn keyring_token(profile_name: &str) -> Option<String> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/token")).ok()?;
    match entry.get_password() {
        Ok(secret) => Some(secret),
        Err(e) => {
            debug!(profile = profile_name, error = %e, "no keyring token");
            None
        }
    }
}

// ── Translation ─────────────────────────────────────────────────────

/// HTTP transport settings for a profile.
pub fn profile_to_transport(profile: &Profile, defaults: &Defaults) -> TransportConfig {
    TransportConfig {
        tls: profile.tls_mode(),
        timeout: Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout)),
    }
}
