//! JSON report export and re-loading

use crate::error::{Result, VigiaError};
use crate::models::ScanResult;
use std::path::Path;
use tracing::info;

/// Pretty-printed JSON document for one scan
pub fn render(result: &ScanResult) -> Result<String> {
    Ok(serde_json::to_string_pretty(result)?)
}

/// Writes the scan result to `output_path`, creating parent directories
pub fn export(result: &ScanResult, output_path: &Path) -> Result<()> {
    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(output_path, render(result)?)?;
    info!("JSON report saved to {}", output_path.display());
    Ok(())
}

/// Reads back a report written by [`export`]
pub fn load(input_path: &Path) -> Result<ScanResult> {
    let content = std::fs::read_to_string(input_path)?;
    serde_json::from_str(&content).map_err(|e| {
        VigiaError::ParseError(format!("{} is not a scan report: {e}", input_path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RiskLevel, TargetInfo};

    #[test]
    fn writes_and_reads_report() {
        let mut result = ScanResult::new(TargetInfo {
            url: "https://example.com/".to_string(),
            domain: "example.com".to_string(),
            ip: "93.184.216.34".to_string(),
            scheme: "https".to_string(),
            port: 443,
        });
        result.finish();

        let dir = std::env::temp_dir().join(format!("vigia-report-{}", result.scan_id));
        let path = dir.join("nested").join("scan.json");
        export(&result, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"risk_level\": \"LOW\""));

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.scan_id, result.scan_id);
        assert_eq!(loaded.risk_level, RiskLevel::Low);
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn rejects_foreign_json() {
        let path =
            std::env::temp_dir().join(format!("vigia-foreign-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, "{\"hello\": 1}").unwrap();
        let err = load(&path).unwrap_err();
        assert!(matches!(err, VigiaError::ParseError(_)));
        std::fs::remove_file(path).unwrap();
    }
}
