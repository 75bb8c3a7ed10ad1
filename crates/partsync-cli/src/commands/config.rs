//! Config command handlers

use anyhow::{Context, Result};

use partsync_core::Config;

use crate::output::{Output, OutputFormat};

/// Show current configuration, credentials masked
pub fn show(config: &Config, output: &Output) -> Result<()> {
    let shown = config.redacted();

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&shown).context("Failed to serialize config")?
            );
        }
        OutputFormat::Quiet => {
            println!("{}", shown.server_url);
        }
        OutputFormat::Human => {
            let unset = || "(not set)".to_string();
            println!("Configuration:");
            println!("  server_url:           {}", shown.server_url);
            println!(
                "  document_id:          {}",
                shown.document_id.map(|v| v.to_string()).unwrap_or_else(unset)
            );
            println!(
                "  transcription:        {}",
                shown.transcription.map(|v| v.to_string()).unwrap_or_else(unset)
            );
            println!(
                "  csrf_token:           {}",
                shown.csrf_token.unwrap_or_else(unset)
            );
            println!(
                "  session_id:           {}",
                shown.session_id.unwrap_or_else(unset)
            );
            println!("  mask_window_ms:       {}", shown.mask_window_ms);
            println!("  ordering_window_ms:   {}", shown.ordering_window_ms);
            println!("  request_timeout_secs: {}", shown.request_timeout_secs);
            println!("  event_capacity:       {}", shown.event_capacity);
            println!("  log_level:            {}", shown.log_level);
            println!();
            println!("Config file: {}", Config::config_file_path().display());
        }
    }

    Ok(())
}
