//! Configuration management for vigia

use crate::error::{Result, VigiaError};
use crate::models::{ProbeCategory, ScanOptions};
use serde::Deserialize;
use std::path::Path;

/// File-based configuration structure matching config/default.toml
#[derive(Debug, Deserialize)]
struct FileConfig {
    scan: Option<ScanSection>,
    modules: Option<ModulesSection>,
}

#[derive(Debug, Deserialize)]
struct ScanSection {
    timeout_secs: Option<u64>,
    request_timeout_secs: Option<u64>,
    user_agent: Option<String>,
    accept_invalid_certs: Option<bool>,
    nmap_binary: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModulesSection {
    /// Categories left out of this list are skipped
    enabled: Option<Vec<String>>,
}

/// Parses TOML text into scan options, starting from the defaults
pub fn parse_config(content: &str) -> Result<ScanOptions> {
    let file_config: FileConfig = toml::from_str(content)?;
    let mut options = ScanOptions::default();

    if let Some(scan) = file_config.scan {
        if let Some(timeout) = scan.timeout_secs {
            options.timeout_ms = timeout.saturating_mul(1000);
        }
        if let Some(timeout) = scan.request_timeout_secs {
            options.request_timeout_secs = timeout;
        }
        if let Some(ua) = scan.user_agent {
            options.user_agent = ua;
        }
        if let Some(accept) = scan.accept_invalid_certs {
            options.accept_invalid_certs = accept;
        }
        if let Some(binary) = scan.nmap_binary {
            options.nmap_binary = binary;
        }
    }

    if let Some(enabled) = file_config.modules.and_then(|m| m.enabled) {
        let mut selected = Vec::new();
        for name in &enabled {
            let category = ProbeCategory::from_name(name)
                .ok_or_else(|| VigiaError::ConfigError(format!("unknown module '{name}'")))?;
            selected.push(category);
        }
        for category in ProbeCategory::ALL {
            options.set_skipped(category, !selected.contains(&category));
        }
    }

    Ok(options)
}

/// Loads configuration from a TOML file and merges with defaults
pub fn load_config(path: &Path) -> Result<ScanOptions> {
    let content = std::fs::read_to_string(path).map_err(VigiaError::IoError)?;
    parse_config(&content)
}

/// Command-line overrides; `None` leaves the loaded value alone
#[derive(Debug, Default)]
pub struct CliOverrides {
    pub skip: Vec<ProbeCategory>,
    pub timeout_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub user_agent: Option<String>,
    pub accept_invalid_certs: bool,
}

/// Merges CLI arguments into existing ScanOptions
pub fn merge_cli_args(options: &mut ScanOptions, cli: CliOverrides) {
    for category in cli.skip {
        options.set_skipped(category, true);
    }
    if let Some(t) = cli.timeout_secs {
        options.timeout_ms = t.saturating_mul(1000);
    }
    if let Some(t) = cli.request_timeout_secs {
        options.request_timeout_secs = t;
    }
    if let Some(ua) = cli.user_agent {
        options.user_agent = ua;
    }
    if cli.accept_invalid_certs {
        options.accept_invalid_certs = true;
    }
}
