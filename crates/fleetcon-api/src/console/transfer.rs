// File transfer over the console: inline base64 heredoc for uploads,
// remote `cat | base64` for downloads. Whole files are held in memory.

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::debug;

use super::Console;
use crate::error::Error;
use crate::transport::Connector;

/// Heredoc terminator for uploads. Distinct from the exec completion
/// marker so the shell's terminator search never sees the exec marker.
pub const UPLOAD_MARKER: &str = "FLEETCON_UPLOAD_EOF";

/// Quote `path` as a single-quoted shell literal.
fn quote(path: &str) -> Result<String, Error> {
    if path.contains('\'') {
        return Err(Error::Configuration(format!(
            "remote path must not contain a single quote: {path}"
        )));
    }
    Ok(format!("'{path}'"))
}

/// Shell command writing `contents` to `remote` via `base64 -d`.
pub fn upload_command(remote: &str, contents: &[u8]) -> Result<String, Error> {
    let path = quote(remote)?;
    let encoded = STANDARD.encode(contents);
    Ok(format!(
        "mkdir -p $(dirname {path}) && cat << '{UPLOAD_MARKER}' | base64 -d > {path}\n{encoded}\n{UPLOAD_MARKER}"
    ))
}

/// Shell command printing `remote` as base64, silent when it is missing.
pub fn download_command(remote: &str) -> Result<String, Error> {
    Ok(format!("cat {} 2>/dev/null | base64", quote(remote)?))
}

/// Stderr lines that mean the upload pipeline itself failed.
///
/// Only output from `mkdir`, `dirname`, `base64`, or a shell error naming
/// the target path counts; other stderr (profile noise, warnings) is
/// ignored so it cannot fail a write that succeeded.
fn upload_failure(stderr: &str, remote: &str) -> Option<String> {
    let lines: Vec<&str> = stderr
        .lines()
        .filter(|line| {
            let line = line.trim_start();
            ["mkdir:", "dirname:", "base64:"]
                .iter()
                .any(|tool| line.starts_with(tool))
                || line.contains(remote)
        })
        .collect();
    (!lines.is_empty()).then(|| lines.join("\n"))
}

impl<C: Connector> Console<C> {
    /// Copy a local file to `remote` on the device.
    pub async fn put_file(&mut self, local: &Path, remote: &str) -> Result<(), Error> {
        let contents = tokio::fs::read(local).await?;
        let command = upload_command(remote, &contents)?;

        debug!(
            device = self.target().device_id(),
            remote,
            bytes = contents.len(),
            "uploading file"
        );

        let output = self.exec(&command).await?;
        if let Some(message) = upload_failure(&output.stderr, remote) {
            return Err(Error::Remote { message });
        }
        if output.exit_code() != 0 {
            return Err(Error::Remote {
                message: format!("upload to {remote} exited with {}", output.exit_code()),
            });
        }
        Ok(())
    }

    /// Read `remote` from the device.
    ///
    /// Empty output means the file is missing (or empty, which this
    /// scheme cannot tell apart) and is reported as [`Error::NotFound`].
    pub async fn read_file(&mut self, remote: &str) -> Result<Vec<u8>, Error> {
        let output = self.exec(&download_command(remote)?).await?;
        if output.stdout.is_empty() {
            return Err(Error::NotFound {
                path: remote.to_owned(),
            });
        }

        // base64 wraps its output at 76 columns.
        let encoded: String = output
            .stdout
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        Ok(STANDARD.decode(encoded)?)
    }

    /// Copy `remote` from the device to a local path, overwriting it.
    ///
    /// Returns the number of bytes written.
    pub async fn fetch_file(&mut self, remote: &str, local: &Path) -> Result<usize, Error> {
        let contents = self.read_file(remote).await?;

        if let Some(parent) = local.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(local, &contents).await?;

        debug!(
            device = self.target().device_id(),
            remote,
            bytes = contents.len(),
            "downloaded file"
        );
        Ok(contents.len())
    }
}
