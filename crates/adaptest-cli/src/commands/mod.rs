pub mod ability;
pub mod init;
pub mod next;
pub mod submit;
pub mod validate;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use adaptest_core::model::Response;
use adaptest_core::CatEngine;
use adaptest_store::{AdaptestConfig, JsonItemBank};

/// Load config from `--config` or the default locations.
pub fn load_config(path: Option<PathBuf>) -> Result<AdaptestConfig> {
    adaptest_store::load_config_from(path.as_deref())
}

/// Build an engine over the configured bank and data directories.
pub fn open_engine(config: &AdaptestConfig) -> Result<CatEngine> {
    let bank = JsonItemBank::load_dir(&config.bank_dir)
        .with_context(|| format!("failed to load banks from {}", config.bank_dir.display()))?;
    let collaborators = adaptest_store::file_collaborators(Arc::new(bank), &config.data_dir);
    Ok(CatEngine::new(collaborators, config.engine.clone()))
}

/// Convert `1`/`0` flags to responses.
pub fn parse_responses(raw: &[u8]) -> Result<Vec<Response>> {
    raw.iter()
        .map(|&r| Response::try_from(r).map_err(anyhow::Error::msg))
        .collect()
}

/// Abilities are reported to three decimals.
pub fn round3(theta: f64) -> f64 {
    (theta * 1000.0).round() / 1000.0
}
