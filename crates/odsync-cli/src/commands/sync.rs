//! Sync command - run a single reconciliation pass against OneDrive
//!
//! Provides the `odsync sync` CLI command which:
//! 1. Loads configuration and opens the SQLite index
//! 2. Retrieves stored OAuth tokens from the system keyring
//! 3. Wires up the Graph remote and local filesystem adapters
//! 4. Runs a download pass followed by an upload pass

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use odsync_cache::{DatabasePool, SqliteIndex};
use odsync_core::config::Config;
use odsync_core::domain::RemotePath;
use odsync_engine::facade::{SyncEngine, UploadScope};
use odsync_engine::fs::LocalFs;
use odsync_graph::auth::KeyringTokenStorage;
use odsync_graph::client::GraphClient;
use odsync_graph::remote::GraphRemote;

use crate::output::{get_formatter, OutputFormat};

const KEYRING_USER: &str = "default";

#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Force a full resynchronization: drop the persisted cursor and index
    #[arg(long)]
    pub full: bool,
}

impl SyncCommand {
    pub async fn execute(&self, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(matches!(format, OutputFormat::Json));

        let config_path = Config::default_path();
        let config = Config::load_or_default(&config_path);

        info!(config_path = %config_path.display(), "loaded configuration");

        let db_path = index_db_path();
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        if self.full {
            formatter.info("Full resync requested: dropping persisted cursor and index");
            for candidate in [&db_path, &db_path.with_extension("db-wal"), &db_path.with_extension("db-shm")] {
                if candidate.exists() {
                    tokio::fs::remove_file(candidate).await.with_context(|| {
                        format!("failed to remove {}", candidate.display())
                    })?;
                }
            }
        }

        let pool = DatabasePool::new(&db_path)
            .await
            .context("failed to open index database")?;
        let index = Arc::new(SqliteIndex::new(pool));

        let tokens = match KeyringTokenStorage::load(KEYRING_USER) {
            Ok(Some(t)) => t,
            Ok(None) => {
                formatter.error("Not authenticated. Run 'odsync auth login' first.");
                return Ok(());
            }
            Err(e) => {
                formatter.error(&format!("failed to read tokens from keyring: {e}"));
                return Ok(());
            }
        };

        let graph_client = GraphClient::new(tokens.access_token.clone());
        let remote = Arc::new(GraphRemote::new(graph_client));
        let local_fs = Arc::new(LocalFs::new());

        let engine = SyncEngine::new(
            remote,
            index,
            local_fs,
            config.sync.root.clone(),
            RemotePath::root(),
        );

        formatter.info("Applying remote changes...");
        engine.apply_differences().await.context("download pass failed")?;

        formatter.info("Uploading local changes...");
        engine
            .upload_differences(UploadScope::Full)
            .await
            .context("upload pass failed")?;

        if matches!(format, OutputFormat::Json) {
            formatter.print_json(&serde_json::json!({"success": true}));
        } else {
            formatter.success("Sync completed");
        }

        Ok(())
    }
}

/// Where the SQLite index lives, one file per sync root (single-account
/// deployments only ever have one).
pub fn index_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("odsync")
        .join("index.db")
}
