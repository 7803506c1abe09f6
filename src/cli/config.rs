//! Configuration discovery and loading
//!
//! This module handles the configuration discovery hierarchy:
//! 1. Current directory: ./llm-gateway.toml or ./.llm-gateway/config.toml
//! 2. User config: ~/.llm-gateway/config.toml
//! 3. System config: /etc/llm-gateway/config.toml
//! 4. Built-in defaults

use crate::config::GatewayConfig;
use crate::env;
use anyhow::{Context, Result};
use std::env as std_env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Configuration discovery system
pub struct ConfigDiscovery;

impl ConfigDiscovery {
    /// Load `override_path` when given, otherwise walk the hierarchy
    pub fn load(override_path: Option<&Path>) -> Result<GatewayConfig> {
        match override_path {
            Some(path) => {
                info!("Loading configuration override from: {:?}", path);
                GatewayConfig::from_toml_file(path)
            }
            None => Self::discover_config(),
        }
    }

    /// Discover and load configuration using the hierarchy
    pub fn discover_config() -> Result<GatewayConfig> {
        if let Some(config_path) = Self::find_config_file() {
            info!("Loading configuration from: {:?}", config_path);
            return GatewayConfig::from_toml_file(config_path);
        }

        info!("No configuration file found, using defaults");
        Ok(GatewayConfig::default())
    }

    /// Find configuration file using discovery hierarchy
    pub fn find_config_file() -> Option<PathBuf> {
        Self::get_config_candidates()
            .into_iter()
            .inspect(|candidate| debug!("Checking for config file: {:?}", candidate))
            .find(|candidate| candidate.is_file())
    }

    /// Get list of configuration file candidates in priority order
    fn get_config_candidates() -> Vec<PathBuf> {
        let mut candidates = Vec::new();

        if let Ok(current_dir) = std_env::current_dir() {
            candidates.extend(env::local_config_file_paths(&current_dir));
        }

        if let Some(home_dir) = Self::get_home_dir() {
            candidates.push(env::user_config_file_path(&home_dir));
        }

        #[cfg(unix)]
        candidates.push(PathBuf::from(env::SYSTEM_CONFIG_PATH));

        #[cfg(windows)]
        if let Ok(program_data) = std_env::var("PROGRAMDATA") {
            candidates.push(
                PathBuf::from(program_data)
                    .join("llm-gateway")
                    .join(env::CONFIG_FILE_NAME),
            );
        }

        candidates
    }

    fn get_home_dir() -> Option<PathBuf> {
        std_env::var("HOME")
            .ok()
            .or_else(|| std_env::var("USERPROFILE").ok())
            .map(PathBuf::from)
    }

    /// Write a default config file to the user's home directory
    pub fn create_default_user_config() -> Result<PathBuf> {
        let home_dir = Self::get_home_dir().context("Could not determine home directory")?;
        let config_path = env::user_config_file_path(&home_dir);

        if let Some(config_dir) = config_path.parent() {
            fs::create_dir_all(config_dir).with_context(|| {
                format!("Failed to create configuration directory {:?}", config_dir)
            })?;
        }

        if config_path.exists() {
            warn!("Configuration file already exists: {:?}", config_path);
        } else {
            GatewayConfig::default().to_toml_file(&config_path)?;
            info!("Created default configuration file: {:?}", config_path);
        }

        Ok(config_path)
    }

    /// Show configuration discovery information for debugging
    pub fn show_discovery_info() {
        println!("Configuration Discovery Hierarchy:");
        println!();

        for (i, candidate) in Self::get_config_candidates().iter().enumerate() {
            let status = if candidate.is_file() {
                "✓ EXISTS"
            } else if candidate.exists() {
                "✗ NOT A FILE"
            } else {
                "✗ NOT FOUND"
            };
            println!("  {}. {:?} - {}", i + 1, candidate, status);
        }

        println!();
        match Self::find_config_file() {
            Some(found) => println!("Active configuration: {:?}", found),
            None => println!("Active configuration: Built-in defaults"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_candidates() {
        let candidates = ConfigDiscovery::get_config_candidates();

        assert!(candidates.len() >= 2);
        assert_eq!(
            candidates[0].file_name().unwrap(),
            env::LOCAL_CONFIG_FILE_NAME
        );
        assert!(candidates[1].ends_with(".llm-gateway/config.toml"));
    }

    #[test]
    fn test_load_override() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("gateway.toml");
        fs::write(
            &config_path,
            r#"
[settings]
cache_ttl_secs = 60

[[providers]]
id = "p"
kind = "openai"
base_url = "https://api.example.com"
"#,
        )
        .unwrap();

        let config = ConfigDiscovery::load(Some(&config_path)).unwrap();
        assert_eq!(config.settings.cache_ttl_secs, 60);
        assert_eq!(config.providers[0].id, "p");
    }

    #[test]
    fn test_load_missing_override_fails() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("absent.toml");
        assert!(ConfigDiscovery::load(Some(&missing)).is_err());
    }
}
