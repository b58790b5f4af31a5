//! Integration tests for probe orchestration

mod common;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use vigia::error::{Result, VigiaError};
use vigia::models::{
    FailureKind, HeaderScan, PortScan, ProbeCategory, RiskLevel, ScanOptions, Severity,
    TargetInfo, TlsScan, VulnKind, Vulnerability,
};
use vigia::scanner::{Analyzer, ConsoleProgress, ProbeContext, ProbeOutput, ScanEngine};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

#[derive(Clone, Copy)]
enum Behavior {
    Succeed,
    Fail,
    Panic,
}

struct FakeAnalyzer {
    category: ProbeCategory,
    delay: Duration,
    behavior: Behavior,
    available: bool,
}

impl FakeAnalyzer {
    fn new(category: ProbeCategory) -> Self {
        Self {
            category,
            delay: Duration::from_millis(10),
            behavior: Behavior::Succeed,
            available: true,
        }
    }

    fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn behaving(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }

    fn output(&self) -> ProbeOutput {
        match self.category {
            ProbeCategory::Ports => ProbeOutput::Ports(PortScan::default()),
            ProbeCategory::Headers => ProbeOutput::Headers(HeaderScan {
                score: 100,
                ..HeaderScan::default()
            }),
            ProbeCategory::Tls => ProbeOutput::Tls(TlsScan {
                protocol: "TLS 1.3".to_string(),
                cipher_suite: "TLS_AES_128_GCM_SHA256".to_string(),
                score: 100,
                is_secure: true,
                ..TlsScan::default()
            }),
            ProbeCategory::Sqli => ProbeOutput::Sqli(vec![Vulnerability {
                kind: VulnKind::Sqli,
                severity: Severity::Critical,
                location: "id".to_string(),
                payload: "'".to_string(),
                evidence: "SQL error detected: sql syntax".to_string(),
                description: "Single quote test - SQL error exposed".to_string(),
            }]),
            ProbeCategory::Xss => ProbeOutput::Xss(Vec::new()),
        }
    }
}

#[async_trait]
impl Analyzer for FakeAnalyzer {
    fn name(&self) -> &str {
        match self.category {
            ProbeCategory::Ports => "ports",
            ProbeCategory::Headers => "headers",
            ProbeCategory::Tls => "tls",
            ProbeCategory::Sqli => "sqli",
            ProbeCategory::Xss => "xss",
        }
    }

    fn description(&self) -> &str {
        "fake analyzer"
    }

    fn category(&self) -> ProbeCategory {
        self.category
    }

    fn check_available(&self) -> Result<()> {
        if self.available {
            Ok(())
        } else {
            Err(VigiaError::ToolUnavailable("fake-tool is not installed".to_string()))
        }
    }

    async fn run(&self, _target: &TargetInfo, _ctx: &ProbeContext) -> Result<ProbeOutput> {
        tokio::time::sleep(self.delay).await;
        match self.behavior {
            Behavior::Succeed => Ok(self.output()),
            Behavior::Fail => Err(VigiaError::ConnectionError(
                "failed to connect: connection refused".to_string(),
            )),
            Behavior::Panic => panic!("analyzer blew up"),
        }
    }
}

fn engine_with(analyzers: Vec<FakeAnalyzer>) -> ScanEngine {
    let mut engine = ScanEngine::new(Arc::new(ConsoleProgress::hidden()));
    for analyzer in analyzers {
        engine.register(Arc::new(analyzer));
    }
    engine
}

fn all_fakes() -> Vec<FakeAnalyzer> {
    ProbeCategory::ALL.into_iter().map(FakeAnalyzer::new).collect()
}

fn target() -> TargetInfo {
    common::local_target("http://127.0.0.1:9/")
}

#[tokio::test]
async fn test_all_probes_fill_their_slots() {
    let engine = engine_with(all_fakes());
    let result = engine.run(&target(), &common::test_options()).await;

    assert!(result.errors.is_empty(), "{:?}", result.errors);
    assert!(result.ports.is_some());
    assert!(result.headers.is_some());
    assert!(result.tls.is_some());
    assert_eq!(result.sqli.len(), 1);
    assert!(result.xss.is_empty());
    assert!(result.finished_at.is_some());
    assert_eq!(result.risk_level, RiskLevel::Critical);
}

#[tokio::test]
async fn test_global_timeout_returns_promptly() {
    let engine = engine_with(
        ProbeCategory::ALL
            .into_iter()
            .map(|c| FakeAnalyzer::new(c).slow(Duration::from_secs(10)))
            .collect(),
    );
    let options = ScanOptions {
        timeout_ms: 50,
        ..common::test_options()
    };

    let started = Instant::now();
    let result = engine.run(&target(), &options).await;

    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(result.has_failure(FailureKind::TimeoutExceeded));
    let failure = result
        .errors
        .iter()
        .find(|e| e.kind == FailureKind::TimeoutExceeded)
        .expect("timeout failure recorded");
    assert_eq!(failure.module, "scan");
    assert_eq!(failure.message, "scan timeout exceeded");
    assert!(result.headers.is_none());
    assert!(result.tls.is_none());
    assert!(result.finished_at.is_some());
}

#[tokio::test]
async fn test_timeout_keeps_completed_results() {
    let engine = engine_with(vec![
        FakeAnalyzer::new(ProbeCategory::Headers),
        FakeAnalyzer::new(ProbeCategory::Sqli).slow(Duration::from_secs(10)),
    ]);
    let options = ScanOptions {
        timeout_ms: 500,
        ..common::test_options()
    };

    let result = engine.run(&target(), &options).await;

    assert!(result.headers.is_some());
    assert!(result.sqli.is_empty());
    assert!(result.has_failure(FailureKind::TimeoutExceeded));
    assert_eq!(result.risk_level, RiskLevel::Low);
}

#[tokio::test]
async fn test_skipped_categories_do_not_run() {
    let engine = engine_with(all_fakes());
    let options = ScanOptions {
        skip_ports: true,
        skip_sqli: true,
        skip_xss: true,
        ..common::test_options()
    };

    let result = engine.run(&target(), &options).await;

    assert!(result.ports.is_none());
    assert!(result.sqli.is_empty());
    assert!(result.headers.is_some());
    assert!(result.tls.is_some());
    assert!(result.errors.is_empty());
    assert_eq!(result.risk_level, RiskLevel::Low);
}

#[tokio::test]
async fn test_failing_probe_does_not_stop_siblings() {
    let engine = engine_with(vec![
        FakeAnalyzer::new(ProbeCategory::Headers).behaving(Behavior::Fail),
        FakeAnalyzer::new(ProbeCategory::Tls),
        FakeAnalyzer::new(ProbeCategory::Sqli),
    ]);

    let result = engine.run(&target(), &common::test_options()).await;

    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].module, "headers");
    assert_eq!(result.errors[0].kind, FailureKind::Connection);
    assert!(result.headers.is_none());
    assert!(result.tls.is_some());
    assert_eq!(result.sqli.len(), 1);
}

#[tokio::test]
async fn test_panicking_probe_is_reported() {
    let engine = engine_with(vec![
        FakeAnalyzer::new(ProbeCategory::Xss).behaving(Behavior::Panic),
        FakeAnalyzer::new(ProbeCategory::Headers),
    ]);

    let result = engine.run(&target(), &common::test_options()).await;

    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].module, "xss");
    assert_eq!(result.errors[0].kind, FailureKind::Other);
    assert!(result.errors[0].message.contains("panicked"));
    assert!(result.headers.is_some());
}

#[tokio::test]
async fn test_progress_reaches_completion() {
    let progress = Arc::new(common::RecordingProgress::default());
    let mut engine = ScanEngine::new(progress.clone());
    engine.register(Arc::new(FakeAnalyzer::new(ProbeCategory::Headers)));
    engine.register(Arc::new(FakeAnalyzer::new(ProbeCategory::Tls)));

    engine.run(&target(), &common::test_options()).await;

    let percents: Vec<u8> = progress
        .steps
        .lock()
        .unwrap()
        .iter()
        .map(|(_, p)| *p)
        .collect();
    assert_eq!(percents, vec![50, 100, 100]);
    assert_eq!(
        progress.steps.lock().unwrap().last().map(|(s, _)| s.clone()),
        Some("All scans complete".to_string())
    );
    assert_eq!(progress.statuses.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_insecure_tls_raises_risk() {
    struct WeakTls;

    #[async_trait]
    impl Analyzer for WeakTls {
        fn name(&self) -> &str {
            "tls"
        }

        fn description(&self) -> &str {
            "weak tls"
        }

        fn category(&self) -> ProbeCategory {
            ProbeCategory::Tls
        }

        async fn run(&self, _target: &TargetInfo, _ctx: &ProbeContext) -> Result<ProbeOutput> {
            Ok(ProbeOutput::Tls(TlsScan {
                protocol: "TLS 1.0".to_string(),
                score: 40,
                is_secure: false,
                ..TlsScan::default()
            }))
        }
    }

    let mut engine = ScanEngine::new(Arc::new(ConsoleProgress::hidden()));
    engine.register(Arc::new(WeakTls));

    let result = engine.run(&target(), &common::test_options()).await;
    assert_eq!(result.risk_level, RiskLevel::High);
}

#[tokio::test]
async fn test_default_engine_lists_all_modules() {
    let engine = ScanEngine::with_defaults(&ScanOptions::default());
    let names: Vec<&str> = engine.list_modules().into_iter().map(|(n, _)| n).collect();
    assert_eq!(names, vec!["ports", "headers", "tls", "sqli", "xss"]);
}

#[tokio::test]
async fn test_unavailable_tool_is_left_out_before_launch() {
    let progress = Arc::new(common::RecordingProgress::default());
    let mut engine = ScanEngine::new(progress.clone());
    engine.register(Arc::new(FakeAnalyzer::new(ProbeCategory::Ports).unavailable()));
    engine.register(Arc::new(FakeAnalyzer::new(ProbeCategory::Headers)));
    engine.register(Arc::new(FakeAnalyzer::new(ProbeCategory::Tls)));

    let result = engine.run(&target(), &common::test_options()).await;

    assert!(result.errors.is_empty(), "{:?}", result.errors);
    assert!(result.ports.is_none());
    assert!(result.headers.is_some());
    assert!(result.tls.is_some());

    // Denominator counts the two launched units only
    let percents: Vec<u8> = progress
        .steps
        .lock()
        .unwrap()
        .iter()
        .map(|(_, p)| *p)
        .collect();
    assert_eq!(percents, vec![50, 100, 100]);
    let statuses = progress.statuses.lock().unwrap();
    assert!(statuses
        .iter()
        .any(|s| s.starts_with("Skipping ports") && s.contains("fake-tool")));
    assert_eq!(statuses.iter().filter(|s| s.starts_with("Running")).count(), 2);
}

#[tokio::test]
async fn test_default_engine_scans_vulnerable_target() {
    let mock_server = MockServer::start().await;

    // No security headers; `id` echoed raw and breaks the "query" on a quote
    Mock::given(wiremock::matchers::any())
        .respond_with(|req: &Request| {
            let id = req
                .url
                .query_pairs()
                .find(|(k, _)| k == "id")
                .map(|(_, v)| v.into_owned())
                .unwrap_or_default();
            if id.contains('\'') {
                ResponseTemplate::new(500)
                    .set_body_string(format!("You have an error in your SQL syntax near '{id}'"))
            } else {
                ResponseTemplate::new(200).set_body_string(format!("<p>item {id}</p>"))
            }
        })
        .mount(&mock_server)
        .await;

    let target = common::local_target(&format!("{}/?id=1", mock_server.uri()));
    let options = ScanOptions {
        skip_ports: true,
        ..common::test_options()
    };

    let result = ScanEngine::with_defaults(&options)
        .run(&target, &options)
        .await;

    assert!(result.errors.is_empty(), "{:?}", result.errors);
    assert!(result.ports.is_none());

    let headers = result.headers.as_ref().expect("headers ran");
    assert_eq!(headers.score, 0);
    assert_eq!(headers.missing.len(), 7);

    let tls = result.tls.as_ref().expect("tls ran");
    assert!(!tls.is_secure);
    assert_eq!(tls.score, 0);

    assert_eq!(result.sqli.len(), 1);
    assert_eq!(result.sqli[0].severity, Severity::Critical);
    assert_eq!(result.sqli[0].location, "id");
    assert_eq!(result.xss.len(), 1);
    assert_eq!(result.xss[0].severity, Severity::High);

    assert!(result.total_requests >= 5);
    assert_eq!(result.risk_level, RiskLevel::Critical);
    assert!(result.finished_at.is_some());
}
