//! Probe orchestration
//!
//! Every enabled analyzer runs as its own task and sends exactly one report
//! over an mpsc channel. The engine is the only reader and the only writer of
//! the [`ScanResult`]; once the global deadline passes it stops reading, so a
//! straggler's late report is simply dropped with the channel.

use super::headers::HeadersAnalyzer;
use super::injection::sqli::SqliAnalyzer;
use super::injection::xss::XssAnalyzer;
use super::ports::PortScanner;
use super::tls::TlsAnalyzer;
use super::{Analyzer, ConsoleProgress, ProbeContext, ProbeOutput, ProgressReporter};
use crate::error::{Result, VigiaError};
use crate::http::HttpClient;
use crate::models::{FailureKind, ProbeFailure, ScanOptions, ScanResult, TargetInfo};
use crate::target::sanitize_url;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Message sent by a finished probe unit
struct UnitReport {
    name: String,
    label: String,
    outcome: Result<ProbeOutput>,
}

/// Orchestrates the execution of all registered analyzers
pub struct ScanEngine {
    analyzers: Vec<Arc<dyn Analyzer>>,
    progress: Arc<dyn ProgressReporter>,
}

impl ScanEngine {
    /// Creates a ScanEngine with no registered analyzers
    pub fn new(progress: Arc<dyn ProgressReporter>) -> Self {
        Self {
            analyzers: Vec::new(),
            progress,
        }
    }

    /// Creates a ScanEngine with the port probe and the four analyzers
    /// registered. Progress is not rendered until a reporter is attached.
    pub fn with_defaults(options: &ScanOptions) -> Self {
        let mut engine = Self::new(Arc::new(ConsoleProgress::hidden()));
        engine.register(Arc::new(PortScanner::new(&options.nmap_binary)));
        engine.register(Arc::new(HeadersAnalyzer));
        engine.register(Arc::new(TlsAnalyzer::default()));
        engine.register(Arc::new(SqliAnalyzer::default()));
        engine.register(Arc::new(XssAnalyzer::default()));
        engine
    }

    /// Replaces the progress reporter
    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Registers a new analyzer
    pub fn register(&mut self, analyzer: Arc<dyn Analyzer>) {
        self.analyzers.push(analyzer);
    }

    /// Returns information about all registered modules
    pub fn list_modules(&self) -> Vec<(&str, &str)> {
        self.analyzers
            .iter()
            .map(|a| (a.name(), a.description()))
            .collect()
    }

    /// Runs every enabled analyzer against the target.
    ///
    /// Never fails: analyzer errors and the global timeout end up in
    /// [`ScanResult::errors`].
    pub async fn run(&self, target: &TargetInfo, options: &ScanOptions) -> ScanResult {
        let mut result = ScanResult::new(target.clone());
        let span = info_span!(
            "scan",
            scan_id = %result.scan_id,
            target = %sanitize_url(&target.url)
        );
        self.execute(target, options, &mut result)
            .instrument(span)
            .await;
        result
    }

    /// Decides once, before launch, which analyzers take part
    fn launch_plan(&self, options: &ScanOptions) -> Vec<Arc<dyn Analyzer>> {
        self.analyzers
            .iter()
            .filter(|analyzer| {
                if !options.is_enabled(analyzer.category()) {
                    debug!("Module '{}' disabled", analyzer.name());
                    return false;
                }
                match analyzer.check_available() {
                    Ok(()) => true,
                    Err(e) => {
                        warn!("Module '{}' skipped: {e}", analyzer.name());
                        self.progress
                            .update_status(&format!("Skipping {}: {e}", analyzer.label()));
                        false
                    }
                }
            })
            .cloned()
            .collect()
    }

    async fn execute(&self, target: &TargetInfo, options: &ScanOptions, result: &mut ScanResult) {
        let client = match HttpClient::from_options(options) {
            Ok(client) => client,
            Err(e) => {
                error!("Could not build HTTP client: {e}");
                result.errors.push(failure("scan", &e));
                result.finish();
                self.progress.update_progress("Scan aborted", 100);
                return;
            }
        };

        let units = self.launch_plan(options);
        let total = units.len();
        info!("Launching {total} probe units");

        let ctx = ProbeContext {
            client: client.clone(),
            progress: Arc::clone(&self.progress),
            scan_timeout: options.timeout(),
        };
        let deadline = Instant::now() + options.timeout();
        let (tx, mut rx) = mpsc::channel::<UnitReport>(total.max(1));
        let mut set = JoinSet::new();

        for analyzer in units {
            let tx = tx.clone();
            let ctx = ctx.clone();
            let target = target.clone();

            set.spawn(
                async move {
                    ctx.progress
                        .update_status(&format!("Running {}...", analyzer.label()));
                    let outcome = AssertUnwindSafe(analyzer.run(&target, &ctx))
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|_| {
                            Err(VigiaError::ScanError(format!(
                                "module '{}' panicked",
                                analyzer.name()
                            )))
                        });
                    let report = UnitReport {
                        name: analyzer.name().to_string(),
                        label: analyzer.label().to_string(),
                        outcome,
                    };
                    if tx.send(report).await.is_err() {
                        debug!("Module '{}' finished after the scan closed", analyzer.name());
                    }
                }
                .in_current_span(),
            );
        }
        drop(tx);

        let mut completed = 0usize;
        loop {
            match tokio::time::timeout_at(deadline, rx.recv()).await {
                Ok(Some(report)) => {
                    completed += 1;
                    self.record(report, result, completed, total);
                }
                Ok(None) => {
                    debug!("All probe units reported");
                    break;
                }
                Err(_) => {
                    warn!(
                        "Scan timeout reached, {} of {total} units incomplete",
                        total - completed
                    );
                    result.errors.push(ProbeFailure {
                        module: "scan".to_string(),
                        kind: FailureKind::TimeoutExceeded,
                        message: "scan timeout exceeded".to_string(),
                    });
                    break;
                }
            }
        }

        drop(rx);
        // Stragglers are abandoned, not aborted
        set.detach_all();

        result.total_requests = client.request_count();
        result.finish();
        info!("Scan finished with risk level {}", result.risk_level);
        self.progress.update_progress("All scans complete", 100);
    }

    fn record(&self, report: UnitReport, result: &mut ScanResult, completed: usize, total: usize) {
        match report.outcome {
            Ok(output) => {
                info!("Module '{}' completed: {}", report.name, output.summary());
                output.apply(result);
            }
            Err(e) => {
                error!("Module '{}' failed: {e}", report.name);
                result.errors.push(failure(&report.name, &e));
            }
        }

        let percent = (completed * 100 / total.max(1)).min(100) as u8;
        self.progress
            .update_progress(&format!("Completed {}", report.label), percent);
    }
}

fn failure(module: &str, error: &VigiaError) -> ProbeFailure {
    ProbeFailure {
        module: module.to_string(),
        kind: error.kind(),
        message: error.to_string(),
    }
}
