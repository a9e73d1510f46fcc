/// Service configuration loaded from an optional YAML file.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

pub const DEFAULT_CONFIG_PATH: &str = "hospital-booking.yaml";

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bind_addr: String,
    pub log_level: String,
    pub token_ttl_minutes: i64,
    pub bcrypt_cost: u32,
    pub slot_minutes: i64,
    pub seed_demo_data: bool,
    pub seed_admin_password: String,
    pub seed_patient_password: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind_addr: "127.0.0.1:8001".to_string(),
            log_level: "info".to_string(),
            token_ttl_minutes: 24 * 60,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            slot_minutes: 30,
            seed_demo_data: true,
            seed_admin_password: "admin123".to_string(),
            seed_patient_password: "patient123".to_string(),
        }
    }
}

// Seed passwords stay out of logs.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("token_ttl_minutes", &self.token_ttl_minutes)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("slot_minutes", &self.slot_minutes)
            .field("seed_demo_data", &self.seed_demo_data)
            .field("seed_admin_password", &"<redacted>")
            .field("seed_patient_password", &"<redacted>")
            .finish()
    }
}

impl Config {
    /// Load the config file at `path`, or defaults when no file exists there.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));

        if !path.exists() {
            info!("No config file at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = Config::from_yaml(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        info!("Loaded config from {:?}", path);
        debug!("{:?}", config);
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Config> {
        let config: Config = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.slot_minutes <= 0 {
            anyhow::bail!("slot_minutes must be positive, got {}", self.slot_minutes);
        }
        if self.token_ttl_minutes < 0 {
            anyhow::bail!("token_ttl_minutes cannot be negative");
        }
        if !(4..=31).contains(&self.bcrypt_cost) {
            anyhow::bail!("bcrypt_cost must be between 4 and 31, got {}", self.bcrypt_cost);
        }
        Ok(())
    }

    /// The tracing level named by `log_level`, falling back to INFO.
    pub fn tracing_level(&self) -> tracing::Level {
        self.log_level
            .parse()
            .unwrap_or(tracing::Level::INFO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = Config::from_yaml("bind_addr: 0.0.0.0:9000\nslot_minutes: 15\n").unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.slot_minutes, 15);
        assert_eq!(config.token_ttl_minutes, 24 * 60);
        assert!(config.seed_demo_data);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(Config::from_yaml("slot_minutes: 0\n").is_err());
        assert!(Config::from_yaml("bcrypt_cost: 2\n").is_err());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let config = Config::load(Some(Path::new("does/not/exist.yaml"))).unwrap();
        assert_eq!(config.slot_minutes, 30);
        assert_eq!(config.tracing_level(), tracing::Level::INFO);
    }

    #[test]
    fn debug_output_hides_seed_passwords() {
        let config = Config::from_yaml("seed_admin_password: hunter22\nseed_patient_password: letmein9\n").unwrap();
        assert_eq!(config.seed_admin_password, "hunter22");

        let shown = format!("{:?}", config);
        assert!(shown.contains("bind_addr"));
        assert!(!shown.contains("hunter22"));
        assert!(!shown.contains("letmein9"));
    }
}
