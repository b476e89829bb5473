//! Environment variable source: TREEORDER__ prefix with __ separator

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::Environment;

/// Add environment variable overlay to builder.
/// `TREEORDER__ORDER__CACHE_TTL_SECS=60` sets `order.cache_ttl_secs`.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let builder = builder.add_source(
        Environment::with_prefix("TREEORDER")
            .separator("__")
            .try_parsing(true),
    );
    Ok(builder)
}
