use crate::config::Config;
use anyhow::Result;
use chrono::Utc;
use serde_json::Value;
use std::path::PathBuf;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::error;

/// Append-only log of command invocations and usage warnings, rotated by size.
#[derive(Debug, Clone)]
pub struct DiagnosticLog {
    log_file_path: PathBuf,
    max_size_bytes: u64,
}

impl DiagnosticLog {
    pub fn new(config: &Config) -> Self {
        if let Some(parent_dir) = config.diagnostic_log_file.parent() {
            if !parent_dir.exists() {
                if let Err(e) = std::fs::create_dir_all(parent_dir) {
                    error!(path = %parent_dir.display(), error = %e, "Failed to create diagnostic log directory");
                }
            }
        }
        Self {
            log_file_path: config.diagnostic_log_file.clone(),
            max_size_bytes: config.diagnostic_log_max_size_bytes,
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.log_file_path
    }

    async fn rotate_log_if_needed(&self) -> Result<()> {
        if !self.log_file_path.exists() {
            return Ok(());
        }

        let metadata = fs::metadata(&self.log_file_path).await?;
        if metadata.len() >= self.max_size_bytes {
            let timestamp = Utc::now().format("%Y-%m-%d_%H-%M-%S%.3f").to_string();
            let file_stem = self
                .log_file_path
                .file_stem()
                .unwrap_or_default()
                .to_string_lossy();
            let extension = self
                .log_file_path
                .extension()
                .unwrap_or_default()
                .to_string_lossy();

            let backup_file_name = format!("{}_{}.{}", file_stem, timestamp, extension);
            let backup_path = self.log_file_path.with_file_name(backup_file_name);

            fs::rename(&self.log_file_path, backup_path).await?;
        }
        Ok(())
    }

    pub async fn log_invocation(&self, command_id: &str, arguments: &Value) {
        let line = match serde_json::to_string(arguments) {
            Ok(args) => format!("Arguments: {}", args),
            Err(e) => format!("Arguments: <unserializable: {}>", e),
        };
        self.append(command_id, &line).await;
    }

    pub async fn log_warning(&self, message: &str) {
        self.append("warning", message).await;
    }

    async fn append(&self, event: &str, detail: &str) {
        if let Err(e) = self.try_append(event, detail).await {
            error!(event = %event, error = %e, "Failed to write diagnostic log");
        }
    }

    async fn try_append(&self, event: &str, detail: &str) -> Result<()> {
        self.rotate_log_if_needed().await?;

        let timestamp = Utc::now().to_rfc3339();
        let log_entry = format!("{} | {:<24} | {}\n", timestamp, event, detail);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file_path)
            .await?;

        file.write_all(log_entry.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
