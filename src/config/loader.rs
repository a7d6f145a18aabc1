use anyhow::{Context, Result, ensure};
use schemars::{Schema, schema_for};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::debug;

use super::models::Config;

/// Upper bound for `step_delay_ms` (ten minutes).
pub const MAX_STEP_DELAY_MS: u64 = 600_000;
/// Upper bound for `event_capacity`.
pub const MAX_EVENT_CAPACITY: usize = 65_536;
/// Lower bound for `watch.poll_ms`.
pub const MIN_POLL_MS: u64 = 10;

/// Load configuration from a string slice.
pub fn load_from_str(s: &str) -> Result<Config> {
    let cfg: Config =
        serde_json::from_str(s).context("Failed to parse JSON config string into Config")?;
    validate_config(&cfg)?;
    Ok(cfg)
}

/// Load configuration from any reader (e.g., a file).
pub fn load_from_reader<R: Read>(reader: R) -> Result<Config> {
    let cfg: Config =
        serde_json::from_reader(reader).context("Failed to parse JSON config from reader")?;
    validate_config(&cfg)?;
    Ok(cfg)
}

/// Load configuration from a file path synchronously.
pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path_ref = path.as_ref();
    let file = File::open(path_ref)
        .with_context(|| format!("Failed to open config file {}", path_ref.display()))?;
    let cfg = load_from_reader(file)?;
    debug!("Loaded config from {}", path_ref.display());
    Ok(cfg)
}

/// Load configuration from a file path asynchronously (Tokio).
pub async fn load_from_path_async<P: AsRef<Path>>(path: P) -> Result<Config> {
    use tokio::fs;
    let path_ref = path.as_ref();
    let bytes = fs::read(path_ref)
        .await
        .with_context(|| format!("Failed to read config file {}", path_ref.display()))?;
    let cfg: Config = serde_json::from_slice(&bytes)
        .with_context(|| format!("Failed to parse JSON config from {}", path_ref.display()))?;
    validate_config(&cfg)?;
    debug!("Loaded config from {}", path_ref.display());
    Ok(cfg)
}

/// Generate the JSON Schema for the Config model (for external validation or tooling).
pub fn generate_schema() -> Schema {
    schema_for!(Config)
}

/// Write the JSON Schema for the Config model to any writer (pretty-printed).
pub fn write_schema_to_writer<W: Write>(mut writer: W) -> Result<()> {
    let schema = generate_schema();
    let json = serde_json::to_string_pretty(&schema).context("Failed to serialize schema")?;
    writer
        .write_all(json.as_bytes())
        .context("Failed to write schema to writer")?;
    Ok(())
}

/// Range checks that serde cannot express.
pub fn validate_config(cfg: &Config) -> Result<()> {
    ensure!(
        cfg.step_delay_ms <= MAX_STEP_DELAY_MS,
        "step_delay_ms must be at most {MAX_STEP_DELAY_MS} (got {})",
        cfg.step_delay_ms
    );
    ensure!(
        (1..=MAX_EVENT_CAPACITY).contains(&cfg.event_capacity),
        "event_capacity must be within 1..={MAX_EVENT_CAPACITY} (got {})",
        cfg.event_capacity
    );
    ensure!(
        cfg.watch.poll_ms >= MIN_POLL_MS,
        "watch.poll_ms must be at least {MIN_POLL_MS} (got {})",
        cfg.watch.poll_ms
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_empty_object_is_default() {
        assert_eq!(load_from_str("{}").unwrap(), Config::default());
    }

    #[test]
    fn test_fields_parse() {
        let cfg = load_from_str(
            r#"{"dry_run": true, "step_delay_ms": 50, "log_level": "debug",
                "watch": {"enabled": true}}"#,
        )
        .unwrap();
        assert!(cfg.dry_run);
        assert_eq!(cfg.step_delay_ms, 50);
        assert_eq!(cfg.log_level, Some(LogLevel::Debug));
        assert!(cfg.watch.enabled);
        assert_eq!(cfg.watch.poll_ms, 250);
    }

    #[test]
    fn test_out_of_range_values_are_rejected() {
        assert!(load_from_str(r#"{"event_capacity": 0}"#).is_err());
        assert!(load_from_str(r#"{"step_delay_ms": 600001}"#).is_err());
        assert!(load_from_str(r#"{"watch": {"poll_ms": 1}}"#).is_err());
    }

    #[test]
    fn test_schema_serializes() {
        let mut out = Vec::new();
        write_schema_to_writer(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("step_delay_ms"));
    }
}
