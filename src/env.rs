//! Environment constants and path utilities for the LLM gateway.
//!
//! This module centralizes the configuration file names, discovery paths and
//! tuning defaults used throughout the crate, making them easier to maintain
//! and modify.

use std::path::{Path, PathBuf};

/// Application directory name (hidden directory like .git, .vscode)
pub const APP_DIR_NAME: &str = ".llm-gateway";

/// Configuration file name inside the application directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Stand-alone configuration file name in the working directory
pub const LOCAL_CONFIG_FILE_NAME: &str = "llm-gateway.toml";

/// System-wide configuration path on Unix-like systems
pub const SYSTEM_CONFIG_PATH: &str = "/etc/llm-gateway/config.toml";

/// Default log filter for the binary
pub const DEFAULT_LOG_FILTER: &str = "llm_gateway=info";

/// Tuning defaults
pub mod defaults {
    /// Per-attempt HTTP timeout
    pub const PROVIDER_TIMEOUT_SECS: u64 = 30;

    /// Total attempts for a buffered call
    pub const MAX_ATTEMPTS: u32 = 3;

    pub const MAX_TOKENS: u32 = 2048;

    pub const TEMPERATURE: f32 = 0.7;

    /// Response cache lifetime
    pub const RESPONSE_CACHE_TTL_SECS: u64 = 3600;

    /// Lifetime of a found prompt template in the resolver cache
    pub const PROMPT_CACHE_TTL_SECS: u64 = 3600;

    /// Lifetime of a known-missing prompt template in the resolver cache
    pub const PROMPT_NEGATIVE_TTL_SECS: u64 = 300;

    /// Characters of a failed response body kept in error reports
    pub const RESPONSE_SNIPPET_CHARS: usize = 500;

    /// Messages longer than this are shortened in request logs
    pub const LOG_MESSAGE_PREVIEW_CHARS: usize = 300;

    /// Language assumed when detection has nothing to go on
    pub const FALLBACK_LANGUAGE: &str = "en";
}

/// Build the application directory path from a base directory
pub fn app_dir_path(base: &Path) -> PathBuf {
    base.join(APP_DIR_NAME)
}

/// Build config file path in user's home directory
pub fn user_config_file_path(home_dir: &Path) -> PathBuf {
    app_dir_path(home_dir).join(CONFIG_FILE_NAME)
}

/// Build config file paths in the current directory, in lookup order
pub fn local_config_file_paths(current_dir: &Path) -> [PathBuf; 2] {
    [
        current_dir.join(LOCAL_CONFIG_FILE_NAME),
        app_dir_path(current_dir).join(CONFIG_FILE_NAME),
    ]
}
