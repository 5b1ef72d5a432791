//! Status command - display reconciliation state
//!
//! Provides the `odsync status` CLI command which:
//! 1. Shows global index counts and the persisted delta cursor
//! 2. Shows the indexed row for a single path, when one is given

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use odsync_cache::{DatabasePool, SqliteIndex};
use odsync_core::domain::ItemType;
use odsync_core::ports::IndexPort;

use crate::commands::sync::index_db_path;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Optional path to show the indexed row for
    pub path: Option<PathBuf>,
}

impl StatusCommand {
    pub async fn execute(&self, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(matches!(format, OutputFormat::Json));

        let db_path = index_db_path();
        if !db_path.exists() {
            formatter.error("No index found. Run 'odsync sync' first.");
            return Ok(());
        }

        let pool = DatabasePool::new(&db_path)
            .await
            .context("failed to open index database")?;
        let index = SqliteIndex::new(pool);

        match &self.path {
            Some(path) => self.show_path_status(&index, path, format, &*formatter).await,
            None => self.show_global_status(&index, format, &*formatter).await,
        }
    }

    async fn show_global_status(
        &self,
        index: &SqliteIndex,
        format: OutputFormat,
        formatter: &dyn crate::output::OutputFormatter,
    ) -> Result<()> {
        let items = index.enumerate_all().await.context("failed to enumerate index")?;
        let cursor = index.get_cursor().await.context("failed to read delta cursor")?;

        let files = items.iter().filter(|i| i.item_type == ItemType::File).count();
        let folders = items.iter().filter(|i| i.item_type == ItemType::Folder).count();

        info!(total = items.len(), files, folders, "status: index summary");

        if matches!(format, OutputFormat::Json) {
            formatter.print_json(&serde_json::json!({
                "total_items": items.len(),
                "files": files,
                "folders": folders,
                "cursor": cursor.map(|c| c.to_string()),
            }));
            return Ok(());
        }

        formatter.success("odsync status");
        formatter.info("");
        formatter.info(&format!("Indexed items: {} ({} files, {} folders)", items.len(), files, folders));
        match cursor {
            Some(c) if !c.is_initial() => formatter.info("Delta cursor: set (synced at least once)"),
            _ => formatter.info("Delta cursor: unset (never synced)"),
        }

        Ok(())
    }

    async fn show_path_status(
        &self,
        index: &SqliteIndex,
        path: &std::path::Path,
        format: OutputFormat,
        formatter: &dyn crate::output::OutputFormatter,
    ) -> Result<()> {
        let abs_path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir().context("failed to get current directory")?.join(path)
        };

        let item = index
            .lookup_by_path(&abs_path)
            .await
            .context("failed to query index by path")?;

        match item {
            Some(item) => {
                if matches!(format, OutputFormat::Json) {
                    formatter.print_json(&serde_json::json!({
                        "path": abs_path.display().to_string(),
                        "remote_id": item.id.to_string(),
                        "name": item.name,
                        "item_type": format!("{:?}", item.item_type),
                        "etag": item.etag.to_string(),
                        "ctag": item.ctag.to_string(),
                        "mtime": item.mtime.to_rfc3339(),
                        "crc32": item.crc32.map(|c| c.to_string()),
                    }));
                } else {
                    formatter.success(&format!("Indexed: {}", abs_path.display()));
                    formatter.info(&format!("Type:        {:?}", item.item_type));
                    formatter.info(&format!("Remote id:   {}", item.id));
                    formatter.info(&format!("ETag:        {}", item.etag));
                    formatter.info(&format!("CTag:        {}", item.ctag));
                    formatter.info(&format!("Modified:    {}", item.mtime.format("%Y-%m-%d %H:%M:%S UTC")));
                    if let Some(crc) = item.crc32 {
                        formatter.info(&format!("CRC32:       {crc}"));
                    }
                }
            }
            None => {
                if matches!(format, OutputFormat::Json) {
                    formatter.print_json(&serde_json::json!({
                        "path": abs_path.display().to_string(),
                        "tracked": false,
                    }));
                } else {
                    formatter.info(&format!("'{}' is not tracked by the index.", abs_path.display()));
                }
            }
        }

        Ok(())
    }
}
