//! Vigia - concurrent web endpoint security probe
//!
//! Runs a header analyzer, a TLS analyzer, reflected SQL injection and XSS
//! analyzers and an optional nmap port probe against one URL, then folds
//! their outputs into a single [`models::ScanResult`] with a risk verdict.

pub mod config;
pub mod error;
pub mod http;
pub mod models;
pub mod report;
pub mod scanner;
pub mod scoring;
pub mod target;
