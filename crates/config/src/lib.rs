//! Syncwire Configuration Management
//!
//! Loads daemon options from a plain `key = value` file.

use std::fs;
use std::path::Path;

use syncwire_core::{Result, SyncError};

/// Daemon configuration from `syncd.conf`
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Simulation ticks per second (from "tickrate" option)
    pub tick_rate: u32,
    /// Maximum live entities (from "maxentities" option)
    pub max_entities: usize,
    /// Velocity samples retained per predicted entity, in ticks
    /// (from "predictionhistory" option)
    pub prediction_history: usize,
    /// Verify template schema digests at connect (from "schemacheck" option)
    pub schema_check: bool,
    /// Log every encoded/applied update at debug level
    /// (from "logupdates" option)
    pub log_updates: bool,
    /// Directory holding template JSON files (from "templatedir" option)
    pub template_dir: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            tick_rate: 20,
            max_entities: 1024,
            prediction_history: 64,
            schema_check: true,
            log_updates: false,
            template_dir: "templates".into(),
        }
    }
}

impl SyncConfig {
    /// Load configuration from a file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse config file content
    fn parse(content: &str) -> Result<Self> {
        let mut config = Self::default();

        for line in content.lines() {
            let line = line.trim();

            // Skip comments and empty lines
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            // Parse key=value
            if let Some(eq_pos) = line.find('=') {
                let key = line[..eq_pos].trim();
                let value = line[eq_pos + 1..].trim();

                config.parse_option(key, value)?;
            }
        }

        Ok(config)
    }

    fn parse_option(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "tickrate" => {
                self.tick_rate = value.parse().unwrap_or(20);
                if self.tick_rate == 0 {
                    return Err(SyncError::Config("tickrate must be nonzero".into()));
                }
            }
            "maxentities" => {
                self.max_entities = value.parse().unwrap_or(1024);
            }
            "predictionhistory" => {
                self.prediction_history = value.parse().unwrap_or(64);
            }
            "schemacheck" => {
                self.schema_check = value.parse().unwrap_or(true);
            }
            "logupdates" => {
                self.log_updates = value.parse().unwrap_or(false);
            }
            "templatedir" => self.template_dir = value.into(),
            _ => {
                tracing::debug!("Unknown config option: {} = {}", key, value);
            }
        }
        Ok(())
    }

    /// Print the effective configuration
    pub fn display(&self) {
        tracing::info!("Configuration:");
        tracing::info!("  Tick Rate: {} Hz", self.tick_rate);
        tracing::info!("  Max Entities: {}", self.max_entities);
        tracing::info!("  Prediction History: {} ticks", self.prediction_history);
        tracing::info!("  Schema Check: {}", self.schema_check);
        tracing::info!("  Log Updates: {}", self.log_updates);
        tracing::info!("  Template Dir: {}", self.template_dir);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert_eq!(config.tick_rate, 20);
        assert_eq!(config.max_entities, 1024);
        assert!(config.schema_check);
    }

    #[test]
    fn test_parse_simple_config() {
        let config_text = r#"
# test options
tickrate = 30
maxentities = 64
schemacheck = false
"#;
        let config = SyncConfig::parse(config_text).unwrap();
        assert_eq!(config.tick_rate, 30);
        assert_eq!(config.max_entities, 64);
        assert!(!config.schema_check);
        // untouched keys keep defaults
        assert_eq!(config.prediction_history, 64);
    }

    #[test]
    fn test_zero_tickrate_rejected() {
        assert!(SyncConfig::parse("tickrate = 0").is_err());
    }

    #[test]
    fn test_unparsable_value_falls_back() {
        let config = SyncConfig::parse("maxentities = lots").unwrap();
        assert_eq!(config.max_entities, 1024);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "tickrate = 10").unwrap();
        writeln!(file, "templatedir = data/templates").unwrap();

        let config = SyncConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.tick_rate, 10);
        assert_eq!(config.template_dir, "data/templates");
    }
}
