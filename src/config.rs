//! Configuration
//!
//! Layered settings for the order store, drag controller, tree filter and logging.
//! Sources, lowest precedence first: built-in defaults, the global config file,
//! an explicit `--config` file, then `TREEORDER__*` environment variables.

mod facade;
mod merge {
    pub mod merge_policy;
    pub mod service;
}
pub mod paths {
    pub mod xdg_root;
}
mod sources {
    pub mod environment;
    pub mod global_file;
}

pub use facade::ConfigLoader;

use crate::drag::{DragSettings, SortMode};
use crate::error::ApiError;
use crate::logging::LoggingConfig;
use crate::order::OrderStoreConfig;
use crate::tree::ExcludeNames;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TreeOrderConfig {
    #[serde(default)]
    pub order: OrderSettings,
    #[serde(default)]
    pub drag: DragConfig,
    #[serde(default)]
    pub tree: TreeSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSettings {
    /// Metadata root; `None` means `$XDG_DATA_HOME/treeorder/order`
    #[serde(default)]
    pub metadata_root: Option<PathBuf>,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_json_indent")]
    pub json_indent: usize,
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_json_indent() -> usize {
    2
}

impl Default for OrderSettings {
    fn default() -> Self {
        Self {
            metadata_root: None,
            cache_ttl_secs: default_cache_ttl_secs(),
            json_indent: default_json_indent(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DragConfig {
    #[serde(default = "default_expand_delay_ms")]
    pub expand_delay_ms: u64,
    #[serde(default = "default_insertion_threshold_px")]
    pub insertion_threshold_px: f64,
    #[serde(default)]
    pub sort_mode: SortMode,
}

fn default_expand_delay_ms() -> u64 {
    500
}

fn default_insertion_threshold_px() -> f64 {
    10.0
}

impl Default for DragConfig {
    fn default() -> Self {
        Self {
            expand_delay_ms: default_expand_delay_ms(),
            insertion_threshold_px: default_insertion_threshold_px(),
            sort_mode: SortMode::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeSettings {
    /// Exact child names hidden from the tree
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,
}

fn default_exclude() -> Vec<String> {
    vec![".git".to_string(), ".DS_Store".to_string()]
}

impl Default for TreeSettings {
    fn default() -> Self {
        Self {
            exclude: default_exclude(),
        }
    }
}

impl TreeOrderConfig {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.order.cache_ttl_secs == 0 {
            return Err(ApiError::ConfigError(
                "order.cache_ttl_secs must be greater than zero".to_string(),
            ));
        }
        if !self.drag.insertion_threshold_px.is_finite() || self.drag.insertion_threshold_px < 0.0 {
            return Err(ApiError::ConfigError(format!(
                "drag.insertion_threshold_px must be a non-negative number, got {}",
                self.drag.insertion_threshold_px
            )));
        }
        Ok(())
    }

    pub fn metadata_root(&self) -> Result<PathBuf, ApiError> {
        match &self.order.metadata_root {
            Some(root) => Ok(root.clone()),
            None => paths::xdg_root::default_metadata_root(),
        }
    }

    pub fn store_config(&self) -> Result<OrderStoreConfig, ApiError> {
        Ok(OrderStoreConfig {
            metadata_root: self.metadata_root()?,
            cache_ttl: Duration::from_secs(self.order.cache_ttl_secs),
            json_indent: self.order.json_indent,
        })
    }

    pub fn drag_settings(&self) -> DragSettings {
        DragSettings {
            expand_delay: Duration::from_millis(self.drag.expand_delay_ms),
            insertion_threshold: self.drag.insertion_threshold_px,
            sort_mode: self.drag.sort_mode,
        }
    }

    pub fn name_filter(&self) -> ExcludeNames {
        ExcludeNames::new(self.tree.exclude.iter().cloned())
    }
}
