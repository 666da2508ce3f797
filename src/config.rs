//! Configuration for mediasend paths and delivery limits.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (MEDIASEND_HOME, MEDIASEND_OUTPUT)
//! 2. Config file (.mediasend/config.yaml)
//! 3. Defaults (~/.mediasend)
//!
//! Config file discovery searches the current directory and parents for
//! .mediasend/config.yaml; paths in the file are relative to its parent
//! directory. Credentials (webhook URLs, API tokens) are never part of
//! the configuration: they come from the caller or the environment at
//! call time and live only for that call.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::retry::RetryPolicy;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<std::result::Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub delivery: Option<RetryPolicy>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Output directory for saved media (relative to config file)
    pub output: Option<String>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to the mediasend home directory
    pub home: PathBuf,
    /// Absolute path to the output directory for saved media
    pub output: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    /// Retry behavior for delivery calls
    pub retry: RetryPolicy,
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".mediasend").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's parent
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".mediasend");

    let config_file = find_config_file();

    let home = if let Ok(env_home) = std::env::var("MEDIASEND_HOME") {
        PathBuf::from(env_home)
    } else {
        default_home
    };

    let (output, retry) = if let Some(ref config_path) = config_file {
        let config = load_config_file(config_path)?;

        // Base directory is the parent of .mediasend/
        let base_dir = config_path
            .parent()
            .and_then(|p| p.parent())
            .unwrap_or(Path::new("."));

        let output = if let Ok(env_output) = std::env::var("MEDIASEND_OUTPUT") {
            PathBuf::from(env_output)
        } else if let Some(ref output_path) = config.paths.output {
            resolve_path(base_dir, output_path)
        } else {
            home.join("output")
        };

        (output, config.delivery.unwrap_or_default())
    } else {
        let output = std::env::var("MEDIASEND_OUTPUT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home.join("output"));

        (output, RetryPolicy::default())
    };

    Ok(ResolvedConfig {
        home,
        output,
        config_file,
        retry,
    })
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}

/// Get the output directory for saved media
pub fn output_dir() -> Result<PathBuf> {
    Ok(config()?.output.clone())
}
