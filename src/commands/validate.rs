//! Validate command implementation

use anyhow::Result;
use chrono::Utc;

use stock_strategies::validation::{safety_report, validate_config, Severity};
use stock_strategies::Config;

pub fn run(config_path: String) -> Result<()> {
    let config = Config::from_file(&config_path)?;

    let validation = validate_config(&config);

    println!("\n{}", "=".repeat(60));
    println!("CONFIGURATION VALIDATION");
    println!("{}", "=".repeat(60));

    if validation.errors.is_empty() {
        println!("No errors.");
    } else {
        for error in &validation.errors {
            println!("ERROR:   {}", error);
        }
    }
    for warning in &validation.warnings {
        println!("WARNING: {}", warning);
    }

    let report = safety_report(&config, Utc::now());

    println!("\n{}", "=".repeat(60));
    println!("SAFETY CHECKS");
    println!("{}", "=".repeat(60));
    for check in &report.checks {
        let status = if check.passed { "PASS" } else { "FAIL" };
        let severity = match check.severity {
            Severity::Critical => "CRITICAL",
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
        };
        println!("[{:4}] {:<8} {:<32} {}", status, severity, check.name, check.message);
    }

    if !report.recommendations.is_empty() {
        println!("\nRecommendations:");
        for recommendation in &report.recommendations {
            println!("  - {}", recommendation);
        }
    }

    let admitted = validation.is_valid() && report.approved();
    println!(
        "\nVerdict: {}",
        if admitted {
            "config admitted"
        } else {
            "config BLOCKED"
        }
    );

    if !admitted {
        anyhow::bail!("configuration failed the admission gate");
    }
    Ok(())
}
