//! ConfigLoader facade delegating to the merge service.

use super::merge::service::MergeService;
use super::TreeOrderConfig;
use crate::error::ApiError;
use std::path::Path;

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from the global file (if present) and the environment.
    pub fn load() -> Result<TreeOrderConfig, ApiError> {
        Self::finish(MergeService::load(None))
    }

    /// Load with an explicit file layered over the global one.
    pub fn load_with_file(path: &Path) -> Result<TreeOrderConfig, ApiError> {
        Self::finish(MergeService::load(Some(path)))
    }

    fn finish(
        loaded: Result<TreeOrderConfig, config::ConfigError>,
    ) -> Result<TreeOrderConfig, ApiError> {
        let config = loaded.map_err(|e| ApiError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}
