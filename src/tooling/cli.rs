//! CLI Tooling
//!
//! Subcommands operate on one directory's order record, using the same store,
//! metadata root and name filter a tree view would.

use crate::config::TreeOrderConfig;
use crate::error::{ApiError, StorageError};
use crate::fs::{FileSystem, LocalFileSystem, StatOptions};
use crate::logging::LoggingConfig;
use crate::order::{BatchTarget, ChangeKind, CustomOrderProvider, CustomOrderStore};
use crate::tree::{FileTree, NameFilter, TreeOptions};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// treeorder - persistent custom ordering for file trees
#[derive(Parser)]
#[command(name = "treeorder")]
#[command(about = "Inspect and edit the custom child order of directories")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (layered over the global config)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Shorthand for --log-level debug
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr, both)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// Fold logging flags into the loaded configuration
    pub fn apply_logging_overrides(&self, logging: &mut LoggingConfig) {
        if self.verbose {
            logging.level = "debug".to_string();
        }
        if let Some(level) = &self.log_level {
            logging.level = level.clone();
        }
        if let Some(format) = &self.log_format {
            logging.format = format.clone();
        }
        if let Some(output) = &self.log_output {
            logging.output = output.clone();
        }
        if let Some(file) = &self.log_file {
            logging.file = Some(file.clone());
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print a directory's children in their effective order
    List {
        directory: PathBuf,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Print the metadata file location for a directory
    Path { directory: PathBuf },
    /// Reconcile a directory's order record with its current contents
    Sync { directory: PathBuf },
    /// Move entries (by current position) before the entry at --to
    Move {
        directory: PathBuf,
        #[arg(long, num_args = 1.., required = true)]
        from: Vec<usize>,
        #[arg(long)]
        to: usize,
    },
    /// Delete a directory's order record
    Reset { directory: PathBuf },
}

pub struct CliContext {
    config: TreeOrderConfig,
    fs: Arc<dyn FileSystem>,
    store: Arc<CustomOrderStore>,
}

impl CliContext {
    pub fn from_config(config: TreeOrderConfig) -> Result<Self, ApiError> {
        let fs: Arc<dyn FileSystem> = Arc::new(LocalFileSystem::new());
        let store = Arc::new(
            CustomOrderStore::new(fs.clone(), config.store_config()?)
                .with_name_filter(Arc::new(config.name_filter())),
        );
        Ok(Self { config, fs, store })
    }

    pub fn config(&self) -> &TreeOrderConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<CustomOrderStore> {
        &self.store
    }

    pub async fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        let output = match command {
            Commands::List { directory, format } => {
                self.handle_list(&canonical(directory)?, format).await?
            }
            Commands::Path { directory } => self
                .store
                .metadata_path(&canonical(directory)?)
                .display()
                .to_string(),
            Commands::Sync { directory } => self.handle_sync(&canonical(directory)?).await?,
            Commands::Move {
                directory,
                from,
                to,
            } => self.handle_move(&canonical(directory)?, from, *to).await?,
            Commands::Reset { directory } => {
                let directory = canonical(directory)?;
                if self.store.delete_directory_metadata(&directory).await? {
                    format!("Removed order record for {}", directory.display())
                } else {
                    format!("No order record for {}", directory.display())
                }
            }
        };
        Ok(output)
    }

    async fn handle_list(&self, directory: &Path, format: &str) -> Result<String, ApiError> {
        let provider = CustomOrderProvider::new(self.store.clone(), Arc::new(self.config.name_filter()));
        let tree = FileTree::open(
            self.fs.clone(),
            Arc::new(provider),
            directory,
            TreeOptions::default(),
        )
        .await?;

        let children: Vec<_> = tree
            .children(tree.root_id())
            .iter()
            .filter_map(|id| tree.get(id))
            .collect();

        if format == "json" {
            let names: Vec<&str> = children.iter().map(|c| c.name.as_str()).collect();
            return serde_json::to_string_pretty(&names).map_err(ApiError::MetadataEncode);
        }
        if format != "text" {
            return Err(ApiError::InvalidOperation(format!(
                "unknown output format '{}' (expected text or json)",
                format
            )));
        }
        Ok(children
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let suffix = if c.is_directory() { "/" } else { "" };
                format!("{:>3}  {}{}", i, c.name, suffix)
            })
            .collect::<Vec<_>>()
            .join("\n"))
    }

    async fn handle_sync(&self, directory: &Path) -> Result<String, ApiError> {
        let stat = self.fs.stat(directory, StatOptions::with_children()).await?;
        let filter = self.config.name_filter();
        let children: Vec<_> = stat
            .children
            .unwrap_or_default()
            .into_iter()
            .filter(|c| filter.accepts(&c.name()))
            .collect();

        let changed = self.store.sync_with_children(directory, &children).await?;
        Ok(if changed {
            format!("Order record for {} updated", directory.display())
        } else {
            format!("Order record for {} already up to date", directory.display())
        })
    }

    async fn handle_move(&self, directory: &Path, from: &[usize], to: usize) -> Result<String, ApiError> {
        // reconcile first so positions match what `list` printed
        self.handle_sync(directory).await?;
        self.store
            .update_metadata_lot(ChangeKind::Move, BatchTarget::Parent(directory), from, Some(to))
            .await?;
        info!(dir = %directory.display(), ?from, to, "Moved entries");
        let order = self.store.load_metadata(directory).await?;
        Ok(order.join("\n"))
    }
}

fn canonical(path: &Path) -> Result<PathBuf, ApiError> {
    dunce::canonicalize(path).map_err(|e| StorageError::from_io(path, e).into())
}
