//! Analyzer trait, probe outputs and the scan engine

pub mod engine;
pub mod headers;
pub mod injection;
pub mod ports;
pub mod progress;
pub mod tls;

pub use engine::ScanEngine;
pub use progress::{ConsoleProgress, ProgressReporter};

use crate::error::Result;
use crate::http::HttpClient;
use crate::models::{
    HeaderScan, PortScan, ProbeCategory, ScanResult, TargetInfo, TlsScan, Vulnerability,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Everything an analyzer may use besides the target itself.
///
/// Lives for one scan invocation and is cloned into every probe unit.
#[derive(Clone)]
pub struct ProbeContext {
    pub client: HttpClient,
    pub progress: Arc<dyn ProgressReporter>,
    /// The global scan deadline; sub-probes derive their own budgets from it
    pub scan_timeout: Duration,
}

/// Typed output of one analyzer
#[derive(Debug, Clone)]
pub enum ProbeOutput {
    Ports(PortScan),
    Headers(HeaderScan),
    Tls(TlsScan),
    Sqli(Vec<Vulnerability>),
    Xss(Vec<Vulnerability>),
}

impl ProbeOutput {
    /// Stores the output in its slot of the scan result
    pub fn apply(self, result: &mut ScanResult) {
        match self {
            ProbeOutput::Ports(ports) => result.ports = Some(ports),
            ProbeOutput::Headers(headers) => result.headers = Some(headers),
            ProbeOutput::Tls(tls) => result.tls = Some(tls),
            ProbeOutput::Sqli(vulns) => result.sqli = vulns,
            ProbeOutput::Xss(vulns) => result.xss = vulns,
        }
    }

    /// One-line summary for logs
    pub fn summary(&self) -> String {
        match self {
            ProbeOutput::Ports(p) => format!("{} open ports", p.open_ports.len()),
            ProbeOutput::Headers(h) => format!("score {}/100", h.score),
            ProbeOutput::Tls(t) => format!(
                "{} score {}/100",
                if t.is_secure { "secure" } else { "insecure" },
                t.score
            ),
            ProbeOutput::Sqli(v) | ProbeOutput::Xss(v) => {
                format!("{} vulnerabilities", v.len())
            }
        }
    }
}

/// Trait that all analyzers implement
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Returns the module name
    fn name(&self) -> &str;

    /// Returns a description of what this module checks
    fn description(&self) -> &str;

    /// Category used to match the skip flags
    fn category(&self) -> ProbeCategory;

    /// Human label used in progress updates
    fn label(&self) -> &str {
        self.name()
    }

    /// Checked once before launch; an error keeps the analyzer out of the scan
    fn check_available(&self) -> Result<()> {
        Ok(())
    }

    /// Runs the analyzer against the target
    async fn run(&self, target: &TargetInfo, ctx: &ProbeContext) -> Result<ProbeOutput>;
}
