//! Port discovery through an external nmap process

use crate::error::{Result, VigiaError};
use crate::models::{Port, PortScan, ProbeCategory, TargetInfo};
use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, info};

use super::{ProbeContext, ProbeOutput};

/// Runs `nmap` in grepable mode against the target domain
pub struct PortScanner {
    binary: String,
}

impl PortScanner {
    pub fn new(binary: &str) -> Self {
        Self {
            binary: binary.to_string(),
        }
    }

    /// Resolves the binary against PATH, or as given when it contains a separator
    pub fn locate(&self) -> Option<PathBuf> {
        let given = Path::new(&self.binary);
        if given.components().count() > 1 {
            return given.is_file().then(|| given.to_path_buf());
        }
        let path = std::env::var_os("PATH")?;
        std::env::split_paths(&path)
            .map(|dir| dir.join(&self.binary))
            .find(|candidate| candidate.is_file())
    }

    pub fn is_available(&self) -> bool {
        self.locate().is_some()
    }

    /// Runs the scan, killing the child if it outlives `timeout`
    pub async fn scan(&self, domain: &str, timeout: Duration) -> Result<PortScan> {
        let binary = self.locate().ok_or_else(|| {
            VigiaError::ToolUnavailable(format!("{} is not installed or not in PATH", self.binary))
        })?;

        let started = Instant::now();
        let args = ["-Pn", "-sV", "-T4", "--top-ports", "1000", "-oG", "-", domain];
        debug!("Executing: {} {}", binary.display(), args.join(" "));

        let child = Command::new(&binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        // Dropping the future on timeout drops the child, which kills it
        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                VigiaError::TimeoutExceeded(format!(
                    "nmap did not finish within {}s",
                    timeout.as_secs()
                ))
            })??;

        if !output.status.success() {
            return Err(VigiaError::ScanError(format!(
                "nmap execution failed ({}): {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let open_ports = parse_grepable(&String::from_utf8_lossy(&output.stdout));
        let duration_ms = started.elapsed().as_millis() as u64;
        info!(
            "Nmap scan completed: found {} open ports in {duration_ms}ms",
            open_ports.len()
        );

        Ok(PortScan {
            open_ports,
            duration_ms,
        })
    }
}

/// Extracts open ports from `-oG` output.
///
/// Each entry reads `port/state/protocol/owner/service/rpc/version/`.
pub fn parse_grepable(output: &str) -> Vec<Port> {
    let Ok(ports_field) = Regex::new(r"Ports: ([^\t\n]*)") else {
        return Vec::new();
    };

    let mut ports = Vec::new();
    for caps in ports_field.captures_iter(output) {
        for entry in caps[1].split(", ") {
            let fields: Vec<&str> = entry.trim().splitn(8, '/').collect();
            if fields.len() < 7 || fields[1] != "open" {
                continue;
            }
            let Ok(number) = fields[0].parse::<u16>() else {
                continue;
            };
            ports.push(Port {
                number,
                protocol: fields[2].to_string(),
                state: fields[1].to_string(),
                service: fields[4].to_string(),
                version: fields[6].trim().to_string(),
            });
        }
    }
    ports
}

#[async_trait]
impl super::Analyzer for PortScanner {
    fn name(&self) -> &str {
        "ports"
    }

    fn description(&self) -> &str {
        "Discovers open ports and service versions with nmap"
    }

    fn category(&self) -> ProbeCategory {
        ProbeCategory::Ports
    }

    fn label(&self) -> &str {
        "Nmap"
    }

    fn check_available(&self) -> Result<()> {
        if self.is_available() {
            Ok(())
        } else {
            Err(VigiaError::ToolUnavailable(format!(
                "{} is not installed or not in PATH",
                self.binary
            )))
        }
    }

    async fn run(&self, target: &TargetInfo, ctx: &ProbeContext) -> Result<ProbeOutput> {
        let budget = ctx.scan_timeout / 2;
        debug!("Starting Nmap scan for {} (budget {:?})", target.domain, budget);
        let scan = self.scan(&target.domain, budget).await?;
        Ok(ProbeOutput::Ports(scan))
    }
}
