//! Config check command handler.

use std::path::Path;

use anyhow::{Context, Result};

use wagate::config::validate::{validate_config, validate_settings, DiagnosticLevel};
use wagate::config::{redact, Config};

use super::{load_config, ConfigAction};

/// Validate configuration file.
pub(crate) fn cmd_config(action: ConfigAction, path: Option<&Path>) -> Result<()> {
    match action {
        ConfigAction::Check => {
            let config_path = path.map(Path::to_path_buf).unwrap_or_else(Config::path);
            println!("Config file: {}", config_path.display());

            let mut errors = 0;
            let mut warnings = 0;

            if config_path.exists() {
                let content = std::fs::read_to_string(&config_path)
                    .context("Failed to read config file")?;
                let raw: serde_json::Value = match serde_json::from_str(&content) {
                    Ok(v) => v,
                    Err(e) => {
                        println!("[ERROR] Invalid JSON: {}", e);
                        return Ok(());
                    }
                };
                for diag in validate_config(&raw) {
                    println!("{}", diag);
                    match diag.level {
                        DiagnosticLevel::Error => errors += 1,
                        DiagnosticLevel::Warn => warnings += 1,
                        DiagnosticLevel::Ok => {}
                    }
                }
            } else {
                println!("[OK] No config file found (using defaults)");
            }

            let config = load_config(Some(config_path.as_path()))?;
            match config.validate() {
                Ok(()) => println!("[OK] Required settings present"),
                Err(e) => {
                    println!("[ERROR] {}", e);
                    errors += 1;
                }
            }
            for diag in validate_settings(&config) {
                println!("{}", diag);
                match diag.level {
                    DiagnosticLevel::Error => errors += 1,
                    DiagnosticLevel::Warn => warnings += 1,
                    DiagnosticLevel::Ok => {}
                }
            }

            println!();
            println!("whatsapp.access_token    {}", redact(&config.whatsapp.access_token));
            println!("whatsapp.phone_number_id {}", config.whatsapp.phone_number_id);
            println!("whatsapp.verify_token    {}", redact(&config.whatsapp.verify_token));
            println!("model.api_key            {}", redact(&config.model.api_key));
            println!("model.model              {}", config.model.model);
            println!(
                "gateway                  {}:{}{} ({} worker(s))",
                config.gateway.host, config.gateway.port, config.gateway.path, config.gateway.workers
            );
            println!("storage.db_path          {}", config.db_path().display());
            println!("storage.media_root       {}", config.media_root().display());

            if errors == 0 && warnings == 0 {
                println!("\nConfiguration looks good!");
            } else {
                println!("\nFound {} error(s), {} warning(s)", errors, warnings);
            }
        }
    }
    Ok(())
}
