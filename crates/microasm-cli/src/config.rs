//! Configuration file parsing for masm.toml.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Interpreter construction settings
    #[serde(default)]
    pub interpreter: InterpreterConfig,

    /// Runtime library selection
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Script defaults
    #[serde(default)]
    pub script: ScriptConfig,
}

/// Interpreter construction settings.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InterpreterConfig {
    /// RAM image size in bytes
    pub ram_size: Option<usize>,

    /// Trace every executed instruction
    #[serde(default)]
    pub debug: bool,
}

/// Runtime library selection.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Shared library to bind instead of the linked runtime
    pub library: Option<PathBuf>,
}

/// Script defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptConfig {
    /// Arguments used when none are given on the command line
    #[serde(default)]
    pub args: Vec<String>,
}

/// Load configuration from a file or search for default config files.
///
/// An explicitly given path must exist.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config_path = match path {
        Some(path) if !path.exists() => {
            anyhow::bail!("Config file not found: {}", path.display())
        }
        Some(path) => Some(path.to_path_buf()),
        None => find_config_file(),
    };

    match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)?;
            let mut config: Config = toml::from_str(&content)
                .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path.display(), e))?;
            // Relative library paths are relative to the config file
            if let (Some(lib), Some(dir)) = (&config.runtime.library, path.parent()) {
                if lib.is_relative() {
                    config.runtime.library = Some(dir.join(lib));
                }
            }
            tracing::debug!(path = %path.display(), "Loaded configuration");
            Ok(config)
        }
        None => Ok(Config::default()),
    }
}

/// Search for configuration file in the current directory and parent directories.
fn find_config_file() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    find_config_in_ancestors(&cwd)
}

fn find_config_in_ancestors(start: &Path) -> Option<PathBuf> {
    const CONFIG_NAMES: &[&str] = &["masm.toml", ".masmrc.toml"];

    let mut dir = Some(start);
    while let Some(current) = dir {
        for name in CONFIG_NAMES {
            let path = current.join(name);
            if path.exists() {
                return Some(path);
            }
        }
        dir = current.parent();
    }

    None
}
