//! Base layer: the serialized defaults, so every key exists before files overlay it.

use crate::config::TreeOrderConfig;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let defaults = Config::try_from(&TreeOrderConfig::default())?;
    Ok(Config::builder().add_source(defaults))
}
