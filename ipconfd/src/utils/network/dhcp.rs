//! DHCP client boundary.
//!
//! The DHCP handshake is done by an external `udhcpc`-compatible program run
//! in the foreground. We only build its argument list and parse what it
//! prints.

use super::LeaseRecord;
use crate::error::NetworkError;
use async_trait::async_trait;
use log::{debug, info};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

/// Obtains one DHCP lease attempt for an interface.
#[async_trait]
pub trait DhcpClient: Send + Sync {
    /// Run a single, blocking lease attempt.
    ///
    /// "No lease" is not an error: it comes back as a record without a
    /// `bound`/`renew` status.
    async fn request_lease(
        &self,
        interface: &str,
        hostname: &str,
    ) -> Result<LeaseRecord, NetworkError>;
}

/// Runs `udhcpc` (or a compatible client) once per attempt.
pub struct UdhcpcClient {
    program: PathBuf,
    script: Option<PathBuf>,
}

impl UdhcpcClient {
    pub fn new(program: PathBuf, script: Option<PathBuf>) -> Self {
        Self { program, script }
    }

    /// Arguments for one foreground, non-daemon, quit-after-lease run.
    pub fn args(&self, interface: &str, hostname: &str) -> Vec<String> {
        let mut args = vec![
            "-f".to_string(),
            "-q".to_string(),
            "-n".to_string(),
            "-i".to_string(),
            interface.to_string(),
            "-x".to_string(),
            format!("hostname:{hostname}"),
        ];
        if let Some(script) = &self.script {
            args.push("-s".to_string());
            args.push(script.display().to_string());
        }
        args
    }
}

#[async_trait]
impl DhcpClient for UdhcpcClient {
    async fn request_lease(
        &self,
        interface: &str,
        hostname: &str,
    ) -> Result<LeaseRecord, NetworkError> {
        let args = self.args(interface, hostname);
        info!(
            "DHCP: Executing {} {}",
            self.program.display(),
            args.join(" ")
        );

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| NetworkError::DhcpSpawn {
                program: self.program.display().to_string(),
                source,
            })?;

        // udhcpc -n exits non-zero when no lease was obtained; the output
        // still tells us what happened.
        debug!("DHCP: client exited with {}", output.status);

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(LeaseRecord::parse(&text))
    }
}
