//! Configuration loading.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use adaptest_core::engine::EngineConfig;

/// Top-level adaptest configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptestConfig {
    /// Directory holding the JSON question banks.
    #[serde(default = "default_bank_dir")]
    pub bank_dir: PathBuf,
    /// Directory for abilities, events and results.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub engine: EngineConfig,
}

fn default_bank_dir() -> PathBuf {
    PathBuf::from("./banks")
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("./adaptest-data")
}

impl Default for AdaptestConfig {
    fn default() -> Self {
        Self {
            bank_dir: default_bank_dir(),
            data_dir: default_data_dir(),
            engine: EngineConfig::default(),
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        result.push_str(&rest[..start]);
        let var_name = &rest[start + 2..start + len];
        result.push_str(&std::env::var(var_name).unwrap_or_default());
        rest = &rest[start + len + 1..];
    }
    result.push_str(rest);
    result
}

fn resolve_path(p: &Path) -> PathBuf {
    PathBuf::from(resolve_env_vars(&p.to_string_lossy()))
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `adaptest.toml` in the current directory
/// 2. `~/.config/adaptest/config.toml`
///
/// Environment overrides: `ADAPTEST_BANK_DIR`, `ADAPTEST_DATA_DIR`, `ADAPTEST_SEED`.
pub fn load_config() -> Result<AdaptestConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<AdaptestConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => {
            let local = PathBuf::from("adaptest.toml");
            if local.exists() {
                Some(local)
            } else {
                dirs_path()
                    .map(|dir| dir.join("config.toml"))
                    .filter(|global| global.exists())
            }
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            parse_config(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => AdaptestConfig::default(),
    };

    apply_env_overrides(&mut config)?;
    config.bank_dir = resolve_path(&config.bank_dir);
    config.data_dir = resolve_path(&config.data_dir);

    Ok(config)
}

/// Parse a TOML document, checking engine values that serde cannot.
pub fn parse_config(content: &str) -> Result<AdaptestConfig> {
    let config: AdaptestConfig = toml::from_str(content)?;
    let alpha = config.engine.smoothing_alpha;
    anyhow::ensure!(
        (0.0..=1.0).contains(&alpha),
        "engine.smoothing_alpha must be in [0, 1], got {alpha}"
    );
    anyhow::ensure!(
        config.engine.max_swap_attempts > 0,
        "engine.max_swap_attempts must be at least 1"
    );
    Ok(config)
}

fn apply_env_overrides(config: &mut AdaptestConfig) -> Result<()> {
    if let Ok(dir) = std::env::var("ADAPTEST_BANK_DIR") {
        config.bank_dir = PathBuf::from(dir);
    }
    if let Ok(dir) = std::env::var("ADAPTEST_DATA_DIR") {
        config.data_dir = PathBuf::from(dir);
    }
    if let Ok(seed) = std::env::var("ADAPTEST_SEED") {
        let seed = seed
            .parse()
            .with_context(|| format!("ADAPTEST_SEED is not an integer: {seed:?}"))?;
        config.engine.seed = Some(seed);
    }
    Ok(())
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("adaptest"))
}
