//! Monitor command - watch the sync root and keep it reconciled continuously
//!
//! Provides the `odsync monitor` CLI command which:
//! 1. Wires up the same adapters as `sync`
//! 2. Watches the sync root for local filesystem events
//! 3. Runs a download pass on a fixed poll interval
//! 4. Runs an upload pass whenever the debounced watcher settles, or ctrl-c

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tracing::{error, info};

use odsync_cache::{DatabasePool, SqliteIndex};
use odsync_core::config::Config;
use odsync_core::domain::{RemotePath, SyncError};
use odsync_engine::facade::{SyncEngine, UploadScope};
use odsync_engine::fs::LocalFs;
use odsync_engine::scheduler::SyncScheduler;
use odsync_engine::watcher::FileWatcher;
use odsync_graph::auth::KeyringTokenStorage;
use odsync_graph::client::GraphClient;
use odsync_graph::remote::GraphRemote;

use crate::commands::sync::index_db_path;
use crate::output::{get_formatter, OutputFormat};

const KEYRING_USER: &str = "default";

#[derive(Debug, Args)]
pub struct MonitorCommand {}

impl MonitorCommand {
    pub async fn execute(&self, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(matches!(format, OutputFormat::Json));

        let config_path = Config::default_path();
        let config = Config::load_or_default(&config_path);

        let db_path = index_db_path();
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
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

        let engine = Arc::new(SyncEngine::new(
            remote,
            index,
            local_fs,
            config.sync.root.clone(),
            RemotePath::root(),
        ));

        let debounce_ms = config.sync.debounce_delay.saturating_mul(1000);
        let (mut watcher, change_rx) = FileWatcher::new(debounce_ms)?;
        let watch_handle = watcher
            .watch(&config.sync.root)
            .with_context(|| format!("failed to watch {}", config.sync.root.display()))?;

        let poll_interval = Duration::from_secs(config.sync.poll_interval.max(1));
        let (mut scheduler, sync_requested) = SyncScheduler::new(
            change_rx,
            Duration::from_secs(config.sync.debounce_delay.max(1)),
            Duration::from_millis(500),
        );

        formatter.success(&format!(
            "Monitoring {} (polling every {}s)",
            config.sync.root.display(),
            poll_interval.as_secs()
        ));

        let scheduler_task = tokio::spawn(async move {
            scheduler.run().await;
        });

        let mut poll_timer = tokio::time::interval(poll_interval);
        // Wakes the loop faster than the scheduler's own 500ms debounce poll,
        // so a settled local edit is picked up promptly instead of waiting
        // for the next full poll_interval tick.
        let mut wake_timer = tokio::time::interval(Duration::from_millis(250));

        loop {
            tokio::select! {
                _ = poll_timer.tick() => {
                    if let Err(e) = run_cycle(&engine).await {
                        error!(error = %e, "periodic sync cycle failed");
                    }
                }
                _ = wake_timer.tick() => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("received shutdown signal");
                    break;
                }
            }

            if sync_requested.swap(false, Ordering::AcqRel) {
                if let Err(e) = run_cycle(&engine).await {
                    error!(error = %e, "debounced sync cycle failed");
                }
            }
        }

        drop(watch_handle);
        scheduler_task.abort();

        Ok(())
    }
}

async fn run_cycle(engine: &SyncEngine) -> Result<(), SyncError> {
    engine.apply_differences().await?;
    engine.upload_differences(UploadScope::Full).await
}
