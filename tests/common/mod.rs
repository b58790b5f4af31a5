//! Common test utilities
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;
use vigia::http::HttpClient;
use vigia::models::{ScanOptions, TargetInfo};
use vigia::scanner::{ConsoleProgress, ProbeContext, ProgressReporter};
use vigia::target::parse_target;

/// Options tuned for local mock servers
pub fn test_options() -> ScanOptions {
    ScanOptions {
        request_timeout_secs: 5,
        user_agent: "Vigia-Test/0.1.0".to_string(),
        ..ScanOptions::default()
    }
}

/// TargetInfo for a URL on a local mock server, without DNS
pub fn local_target(url: &str) -> TargetInfo {
    let (parsed, domain, port) = parse_target(url).expect("valid test URL");
    TargetInfo {
        url: parsed.to_string(),
        domain,
        ip: "127.0.0.1".to_string(),
        scheme: parsed.scheme().to_string(),
        port,
    }
}

/// Probe context with a silent progress reporter
pub fn test_context() -> ProbeContext {
    ProbeContext {
        client: HttpClient::from_options(&test_options()).expect("Failed to create client"),
        progress: Arc::new(ConsoleProgress::hidden()),
        scan_timeout: Duration::from_secs(30),
    }
}

/// Progress reporter that remembers every update
#[derive(Default)]
pub struct RecordingProgress {
    pub steps: Mutex<Vec<(String, u8)>>,
    pub statuses: Mutex<Vec<String>>,
}

impl ProgressReporter for RecordingProgress {
    fn update_progress(&self, step: &str, percent: u8) {
        self.steps.lock().unwrap().push((step.to_string(), percent));
    }

    fn update_status(&self, message: &str) {
        self.statuses.lock().unwrap().push(message.to_string());
    }
}
