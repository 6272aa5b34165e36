//! Config command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use tend_core::Config;

use crate::output::{Output, OutputFormat};

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;
    let store_status = match config.store_settings() {
        Ok(_) => "ready".to_string(),
        Err(e) => e.to_string(),
    };

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "store_url": config.store_url,
                    "store_key": config.store_key.as_deref().map(mask_key),
                    "table": config.table,
                    "realtime_enabled": config.realtime_enabled,
                    "log_file": config.log_file,
                    "suggest_delay_ms": config.suggest_delay_ms,
                    "plan_delay_ms": config.plan_delay_ms,
                    "store_status": store_status
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.store_url.as_deref().unwrap_or(""));
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!(
                "  store_url:        {}",
                config.store_url.as_deref().unwrap_or("(not set)")
            );
            println!(
                "  store_key:        {}",
                config
                    .store_key
                    .as_deref()
                    .map(mask_key)
                    .unwrap_or_else(|| "(not set)".to_string())
            );
            println!("  table:            {}", config.table);
            println!("  realtime_enabled: {}", config.realtime_enabled);
            println!(
                "  log_file:         {}",
                config
                    .log_file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(not set)".to_string())
            );
            println!("  suggest_delay_ms: {}", config.suggest_delay_ms);
            println!("  plan_delay_ms:    {}", config.plan_delay_ms);
            println!();
            println!("Store:       {}", store_status);
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(
    key: String,
    value: String,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    apply_setting(&mut config, &key, &value)?;

    // Save to the CLI-specified path or default
    let save_path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);
    config
        .save_to_path(&save_path)
        .context("Failed to save configuration")?;

    let shown = if key == "store_key" {
        mask_key(&value)
    } else {
        value
    };
    output.success(&format!("Set {} = {}", key, shown));

    Ok(())
}

fn apply_setting(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "store_url" => {
            config.store_url = optional(value);
        }
        "store_key" => {
            config.store_key = optional(value);
        }
        "table" => {
            if value.is_empty() {
                bail!("table cannot be empty");
            }
            config.table = value.to_string();
        }
        "realtime_enabled" => {
            config.realtime_enabled = value
                .parse()
                .context("Invalid value for realtime_enabled. Use 'true' or 'false'.")?;
        }
        "log_file" => {
            config.log_file = optional(value).map(PathBuf::from);
        }
        "suggest_delay_ms" => {
            config.suggest_delay_ms = value
                .parse()
                .context("Invalid value for suggest_delay_ms. Use milliseconds.")?;
        }
        "plan_delay_ms" => {
            config.plan_delay_ms = value
                .parse()
                .context("Invalid value for plan_delay_ms. Use milliseconds.")?;
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\n\
                 Valid keys: store_url, store_key, table, realtime_enabled, log_file, \
                 suggest_delay_ms, plan_delay_ms",
                key
            );
        }
    }
    Ok(())
}

/// Empty or "none" clears a value
fn optional(value: &str) -> Option<String> {
    if value.is_empty() || value == "none" {
        None
    } else {
        Some(value.to_string())
    }
}

/// Show only the start of an access key
fn mask_key(key: &str) -> String {
    let visible: String = key.chars().take(4).collect();
    format!("{}…", visible)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_apply_setting() {
        let mut config = Config::default();

        apply_setting(&mut config, "store_url", "https://demo.example.co").unwrap();
        apply_setting(&mut config, "realtime_enabled", "false").unwrap();
        apply_setting(&mut config, "plan_delay_ms", "0").unwrap();

        assert_eq!(config.store_url.as_deref(), Some("https://demo.example.co"));
        assert!(!config.realtime_enabled);
        assert_eq!(config.plan_delay_ms, 0);

        apply_setting(&mut config, "store_url", "none").unwrap();
        assert!(config.store_url.is_none());
    }

    #[test]
    fn test_apply_setting_rejects_bad_input() {
        let mut config = Config::default();
        assert!(apply_setting(&mut config, "realtime_enabled", "maybe").is_err());
        assert!(apply_setting(&mut config, "table", "").is_err());
        assert!(apply_setting(&mut config, "sync_url", "x").is_err());
    }

    #[test]
    fn test_set_writes_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let output = Output::new(OutputFormat::Quiet);

        set("table".to_string(), "chores".to_string(), Some(&path), &output).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("table = \"chores\""));
    }

    #[test]
    fn test_mask_key() {
        assert_eq!(mask_key("abcdefgh"), "abcd…");
        assert_eq!(mask_key("ab"), "ab…");
    }
}
