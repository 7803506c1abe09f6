//! CLI-specific functionality for the LLM gateway
//!
//! This module contains argument parsing and configuration discovery.

pub mod args;
pub mod config;

pub use args::{Args, Commands, PromptArgs};
pub use config::ConfigDiscovery;
