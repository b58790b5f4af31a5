//! Vigia - web endpoint security probe CLI

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tabled::builder::Builder;
use tabled::settings::Style;
use tracing_subscriber::EnvFilter;

use vigia::config::{self, CliOverrides};
use vigia::http::HttpClient;
use vigia::models::{ProbeCategory, RiskLevel, ScanOptions, ScanResult, Severity};
use vigia::report;
use vigia::scanner::{ConsoleProgress, ScanEngine};
use vigia::target;

/// Vigia - concurrent web endpoint security probe
#[derive(Parser)]
#[command(name = "vigia", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a security scan against a target
    Scan {
        /// Target URL to scan (https:// is assumed when no scheme is given)
        #[arg(short, long)]
        target: String,

        /// Skip the nmap port probe
        #[arg(long)]
        skip_ports: bool,

        /// Skip the security headers analyzer
        #[arg(long)]
        skip_headers: bool,

        /// Skip the TLS analyzer
        #[arg(long)]
        skip_tls: bool,

        /// Skip the SQL injection analyzer
        #[arg(long)]
        skip_sqli: bool,

        /// Skip the XSS analyzer
        #[arg(long)]
        skip_xss: bool,

        /// Global scan timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Per-request timeout in seconds
        #[arg(long)]
        request_timeout: Option<u64>,

        /// Accept invalid certificates on HTTP probes
        #[arg(long)]
        insecure: bool,

        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output file path (default: vigia_{hostname}.{ext})
        #[arg(short, long)]
        output: Option<String>,

        /// Output format (json or markdown)
        #[arg(short, long, default_value = "json")]
        format: String,

        /// Exit with code 1 if the risk level is at or above this level (low, medium, high, critical)
        #[arg(long)]
        fail_on: Option<String>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// List available scanner modules
    Modules,

    /// Generate a report from a previous scan's JSON output
    Report {
        /// Path to the JSON results file
        #[arg(short, long)]
        input: PathBuf,

        /// Output format (markdown or json)
        #[arg(short, long, default_value = "markdown")]
        format: String,

        /// Output file path
        #[arg(short, long, default_value = "vigia_report.md")]
        output: String,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose { "vigia=debug" } else { "vigia=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();
}

fn output_name_from_host(domain: &str, ext: &str) -> String {
    let sanitized: String = domain
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    format!("vigia_{sanitized}.{ext}")
}

fn parse_risk_level(value: &str) -> Option<RiskLevel> {
    match value.to_lowercase().as_str() {
        "low" => Some(RiskLevel::Low),
        "medium" => Some(RiskLevel::Medium),
        "high" => Some(RiskLevel::High),
        "critical" => Some(RiskLevel::Critical),
        _ => None,
    }
}

fn print_banner() {
    let banner = r#"
    +---------------------------------------+
    |  VIGIA v0.1.0                         |
    |  Web Endpoint Security Probe          |
    +---------------------------------------+
    "#;
    println!("{}", banner.cyan());
}

fn colored_risk(level: RiskLevel) -> colored::ColoredString {
    let text = level.to_string();
    match level {
        RiskLevel::Critical => text.red().bold(),
        RiskLevel::High => text.bright_red().bold(),
        RiskLevel::Medium => text.yellow().bold(),
        RiskLevel::Low => text.green().bold(),
    }
}

fn print_summary(result: &ScanResult) {
    println!("\n{}", "  Scan Summary".bold());
    println!("  {}", "-".repeat(35));

    let mut builder = Builder::default();
    builder.push_record(["Module", "Result"]);

    if let Some(ports) = &result.ports {
        builder.push_record(["Open ports".to_string(), ports.open_ports.len().to_string()]);
    }
    if let Some(headers) = &result.headers {
        builder.push_record([
            "Security headers".to_string(),
            format!(
                "{}/100 ({} missing, {} weak)",
                headers.score,
                headers.missing.len(),
                headers.weak.len()
            ),
        ]);
    }
    if let Some(tls) = &result.tls {
        builder.push_record([
            "TLS".to_string(),
            format!(
                "{}/100 {}",
                tls.score,
                if tls.is_secure { "secure" } else { "insecure" }
            ),
        ]);
    }
    builder.push_record(["SQL injection".to_string(), result.sqli.len().to_string()]);
    builder.push_record(["XSS".to_string(), result.xss.len().to_string()]);
    builder.push_record(["Requests".to_string(), result.total_requests.to_string()]);

    let mut table = builder.build();
    table.with(Style::rounded());
    println!("{table}");

    let count = |s: Severity| result.count_by_severity(s);
    println!(
        "\n  {} {} {} {}",
        format!("{} Critical", count(Severity::Critical)).red().bold(),
        format!("{} High", count(Severity::High)).bright_red(),
        format!("{} Medium", count(Severity::Medium)).yellow(),
        format!("{} Low", count(Severity::Low)).blue(),
    );
    println!("  {} {}", "Risk level:".bold(), colored_risk(result.risk_level));

    for failure in &result.errors {
        println!(
            "  {} {}: {}",
            "Error".red(),
            failure.module.bold(),
            failure.message
        );
    }

    for (section, recs) in report::recommendations(result) {
        println!("\n  {}", section.bold());
        for rec in recs {
            println!("    - {rec}");
        }
    }
}

fn write_report(result: &ScanResult, format: &str, output_path: &Path) -> vigia::error::Result<()> {
    match format {
        "markdown" | "md" => report::markdown::export(result, output_path),
        _ => report::json::export(result, output_path),
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            target: raw_target,
            skip_ports,
            skip_headers,
            skip_tls,
            skip_sqli,
            skip_xss,
            timeout,
            request_timeout,
            insecure,
            config: config_path,
            output,
            format,
            fail_on,
            verbose,
        } => {
            init_logging(verbose);
            print_banner();

            let mut options = if let Some(ref path) = config_path {
                config::load_config(path)?
            } else {
                let default_path = Path::new("config/default.toml");
                if default_path.exists() {
                    config::load_config(default_path)?
                } else {
                    ScanOptions::default()
                }
            };

            let skip = [
                (skip_ports, ProbeCategory::Ports),
                (skip_headers, ProbeCategory::Headers),
                (skip_tls, ProbeCategory::Tls),
                (skip_sqli, ProbeCategory::Sqli),
                (skip_xss, ProbeCategory::Xss),
            ]
            .into_iter()
            .filter_map(|(flag, category)| flag.then_some(category))
            .collect();

            config::merge_cli_args(
                &mut options,
                CliOverrides {
                    skip,
                    timeout_secs: timeout,
                    request_timeout_secs: request_timeout,
                    user_agent: None,
                    accept_invalid_certs: insecure,
                },
            );

            let target_info = target::resolve_target(&raw_target).await?;
            let client = HttpClient::from_options(&options)?;
            target::check_reachability(&client, &target_info).await?;

            println!(
                "  {} {}",
                "Target:".bold(),
                target::sanitize_url(&target_info.url).green()
            );
            println!(
                "  {} {} ({})",
                "Host:".bold(),
                target_info.domain.cyan(),
                target_info.ip
            );
            let enabled: Vec<&str> = [
                (ProbeCategory::Ports, "ports"),
                (ProbeCategory::Headers, "headers"),
                (ProbeCategory::Tls, "tls"),
                (ProbeCategory::Sqli, "sqli"),
                (ProbeCategory::Xss, "xss"),
            ]
            .into_iter()
            .filter(|(category, _)| options.is_enabled(*category))
            .map(|(_, name)| name)
            .collect();
            println!("  {} {}", "Modules:".bold(), enabled.join(", ").cyan());
            println!(
                "  {} {}s\n",
                "Timeout:".bold(),
                options.timeout().as_secs().to_string().cyan()
            );

            let engine = ScanEngine::with_defaults(&options)
                .with_progress(Arc::new(ConsoleProgress::new()));
            let result = engine.run(&target_info, &options).await;

            print_summary(&result);

            let ext = match format.as_str() {
                "markdown" | "md" => "md",
                _ => "json",
            };
            let output_file =
                output.unwrap_or_else(|| output_name_from_host(&target_info.domain, ext));
            write_report(&result, &format, Path::new(&output_file))?;
            println!("\n  {} {}", "Report saved to:".bold(), output_file.green());

            if let Some(ref threshold) = fail_on {
                match parse_risk_level(threshold) {
                    Some(level) if result.risk_level >= level => {
                        println!(
                            "\n  {} Risk level {} is at or above {}.",
                            "FAIL:".red().bold(),
                            colored_risk(result.risk_level),
                            threshold.to_uppercase().red()
                        );
                        std::process::exit(1);
                    }
                    Some(_) => {}
                    None => eprintln!(
                        "  {} Invalid --fail-on value: '{}'. Use: low, medium, high, critical",
                        "Error:".red().bold(),
                        threshold
                    ),
                }
            }
        }

        Commands::Modules => {
            print_banner();
            let engine = ScanEngine::with_defaults(&ScanOptions::default());

            println!("  {}\n", "Available Scanner Modules:".bold());
            for (name, description) in engine.list_modules() {
                println!("    {} {}", format!("{name:10}").cyan().bold(), description);
            }
            println!();
        }

        Commands::Report {
            input,
            format,
            output,
        } => {
            init_logging(false);
            print_banner();

            let result = report::json::load(&input)?;
            write_report(&result, &format, Path::new(&output))?;

            print_summary(&result);
            println!("\n  {} {}", "Report saved to:".bold(), output.green());
        }
    }

    Ok(())
}
