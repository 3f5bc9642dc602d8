//! Config validation CLI tool
//!
//! Validates a boardkeeperd configuration file and reports any errors.

use boardkeeper_util::default_config_path;
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = default_config_path();
            eprintln!("Usage: validate-config [config-file]");
            eprintln!();
            eprintln!("Validates a boardkeeperd configuration file.");
            eprintln!();
            eprintln!("If no path is provided, uses: {}", default_path.display());
            eprintln!();
            eprintln!("Example:");
            eprintln!("  validate-config {}", default_path.display());
            eprintln!("  validate-config config.example.toml");
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match boardkeeper_config::load_config(&config_path) {
        Ok(policy) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Summary:");
            println!("  Config version: {}", boardkeeper_config::CURRENT_CONFIG_VERSION);
            println!("  Administrators: {}", policy.admins.len());
            println!(
                "  Rate: {:.2} per hour, {}..{} hours",
                policy.rental.hourly_rate, policy.rental.min_hours, policy.rental.max_hours
            );
            println!(
                "  Warning lead: {}s",
                policy.rental.warning_lead.as_secs()
            );
            match &policy.mirror {
                Some(mirror) => println!("  Mirror: {}", mirror.endpoint),
                None => println!("  Mirror: disabled"),
            }

            if !policy.catalog.is_empty() {
                println!();
                println!("Boards:");
                for board in policy.catalog.boards() {
                    println!("  - {}: {}", board.id, board.name);
                }
            }

            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                boardkeeper_config::ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                boardkeeper_config::ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                boardkeeper_config::ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                boardkeeper_config::ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver,
                        boardkeeper_config::CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}
