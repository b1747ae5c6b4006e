//! CLI error types with miette diagnostics.
//!
//! Maps `fleetcon_api::Error` and `ConfigError` into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use fleetcon_api::Error as ApiError;
use fleetcon_config::ConfigError;

/// Process exit codes.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the device console")]
    #[diagnostic(
        code(fleetcon::connection_failed),
        help(
            "{reason}\n\
             Check the host and that the device is online.\n\
             Self-signed gateway? Try: fleetcon --insecure ..."
        )
    )]
    ConnectionFailed { reason: String },

    #[error("TLS setup failed: {reason}")]
    #[diagnostic(code(fleetcon::tls))]
    Tls { reason: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(fleetcon::auth_failed),
        help(
            "Store a token with: fleetcon config set-token\n\
             Or set FLEETCON_TOKEN / the profile's token_env variable."
        )
    )]
    AuthFailed { message: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("No device selected")]
    #[diagnostic(
        code(fleetcon::no_device),
        help(
            "Pass --device <id-or-name> or set `device` in the profile.\n\
             Run: fleetcon devices list"
        )
    )]
    NoDevice,

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(fleetcon::not_found),
        help("Run: fleetcon {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("Remote file '{path}' not found")]
    #[diagnostic(
        code(fleetcon::remote_file_not_found),
        help("Empty and missing files look the same. Check with: fleetcon exec ls -l {path}")
    )]
    RemoteFileNotFound { path: String },

    // ── Remote side ──────────────────────────────────────────────────
    #[error("Remote command failed: {message}")]
    #[diagnostic(code(fleetcon::remote))]
    Remote { message: String },

    #[error("Console stream error: {message}")]
    #[diagnostic(
        code(fleetcon::stream),
        help("The device reported a fault on the error channel. Retry the command.")
    )]
    Stream { message: String },

    #[error("Downloaded data is not valid base64: {reason}")]
    #[diagnostic(code(fleetcon::decode))]
    Decode { reason: String },

    // ── API ──────────────────────────────────────────────────────────
    #[error("API error (HTTP {status}): {message}")]
    #[diagnostic(code(fleetcon::api_error))]
    Api { status: u16, message: String },

    #[error("Unexpected API response: {message}")]
    #[diagnostic(code(fleetcon::unexpected_response))]
    UnexpectedResponse { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(fleetcon::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(fleetcon::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: fleetcon config set host <host> --profile {name}"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No host configured")]
    #[diagnostic(
        code(fleetcon::no_config),
        help(
            "Pass --host or create a profile with: fleetcon config set host <host>\n\
             Expected config at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(code(fleetcon::config))]
    Config { message: String },

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Operation timed out after {seconds}s")]
    #[diagnostic(
        code(fleetcon::timeout),
        help("Increase timeout with --timeout or check the device's responsiveness.")
    )]
    Timeout { seconds: u64 },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON output failed: {0}")]
    #[diagnostic(code(fleetcon::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::Tls { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } => exit_code::AUTH,
            Self::NotFound { .. } | Self::RemoteFileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. }
            | Self::NoDevice
            | Self::NoConfig { .. }
            | Self::ProfileNotFound { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── Library error mapping ────────────────────────────────────────────

impl From<ApiError> for CliError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Configuration(reason) => Self::Validation {
                field: "connection settings".into(),
                reason,
            },
            ApiError::InvalidUrl(e) => Self::Validation {
                field: "host".into(),
                reason: e.to_string(),
            },
            ApiError::Tls(reason) => Self::Tls { reason },
            ApiError::Connection(reason) => Self::ConnectionFailed { reason },
            ApiError::Http(e) => Self::ConnectionFailed {
                reason: e.to_string(),
            },
            ApiError::Stream(message) => Self::Stream { message },
            ApiError::NotFound { path } => Self::RemoteFileNotFound { path },
            ApiError::Decode(e) => Self::Decode {
                reason: e.to_string(),
            },
            ApiError::Remote { message } => Self::Remote { message },
            ApiError::Io(e) => Self::Io(e),
            ApiError::Authentication { message } => Self::AuthFailed { message },
            ApiError::DeviceNotFound { identifier } => Self::NotFound {
                resource_type: "device".into(),
                identifier,
                list_command: "devices list".into(),
            },
            ApiError::Api { status, message } => Self::Api { status, message },
            ApiError::Deserialization { message, .. } => Self::UnexpectedResponse { message },
            ApiError::Timeout { timeout_secs } => Self::Timeout {
                seconds: timeout_secs,
            },
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Io(e) => Self::Io(e),
            other => Self::Config {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn library_errors_map_to_exit_codes() {
        let cases = [
            (ApiError::Connection("refused".into()), exit_code::CONNECTION),
            (
                ApiError::Authentication {
                    message: "401".into(),
                },
                exit_code::AUTH,
            ),
            (ApiError::NotFound { path: "/x".into() }, exit_code::NOT_FOUND),
            (
                ApiError::DeviceNotFound {
                    identifier: "d".into(),
                },
                exit_code::NOT_FOUND,
            ),
            (ApiError::Timeout { timeout_secs: 3 }, exit_code::TIMEOUT),
            (ApiError::Configuration("no host".into()), exit_code::USAGE),
            (ApiError::Stream("boom".into()), exit_code::GENERAL),
        ];

        for (err, code) in cases {
            let label = err.to_string();
            assert_eq!(CliError::from(err).exit_code(), code, "{label}");
        }
    }

    #[test]
    fn config_load_errors_are_general_failures() {
        let err = CliError::from(ConfigError::Io(std::io::Error::other("disk")));
        assert!(matches!(err, CliError::Io(_)));
        assert_eq!(err.exit_code(), exit_code::GENERAL);
    }
}
