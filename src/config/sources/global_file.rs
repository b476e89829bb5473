//! Global config file: `$XDG_CONFIG_HOME/treeorder/config.toml`, optional

use crate::config::paths::xdg_root;
use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, File};

pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    match xdg_root::global_config_path() {
        Ok(path) => Ok(builder.add_source(File::from(path).required(false))),
        Err(e) => {
            tracing::debug!(error = %e, "No global config location; skipping");
            Ok(builder)
        }
    }
}
