//! Manager configuration from command-line flags.
//!
//! Precedence: built-in defaults, then the `--config` file, then
//! `--bundle` and `--data-dir`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use distkv_engine::KvManagerConfig;

/// Bundle used when neither flags nor the config file name one
pub const DEFAULT_BUNDLE: &str = "com.distkv.cli";

/// Flags that shape the manager configuration
#[derive(Debug, Default, Clone)]
pub struct ConfigFlags {
    pub config: Option<PathBuf>,
    pub bundle: Option<String>,
    pub data_dir: Option<PathBuf>,
}

/// Build the manager configuration
pub fn resolve(flags: &ConfigFlags) -> Result<KvManagerConfig> {
    let mut config = match &flags.config {
        Some(path) => KvManagerConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => KvManagerConfig::default(),
    };
    if let Some(bundle) = &flags.bundle {
        config.bundle_name = bundle.clone();
    }
    if config.bundle_name.is_empty() {
        config.bundle_name = DEFAULT_BUNDLE.to_string();
    }
    if let Some(dir) = &flags.data_dir {
        config.data_dir = Some(dir.clone());
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}
