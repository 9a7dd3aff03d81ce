use crate::utils::path_utils::{expand_tilde_path_buf, normalize_existing_dir};
use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::warn;

pub const DEFAULT_TERMINAL_NAME: &str = "terminal-command-keys";

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub shell: String,
    pub default_terminal_name: String,
    pub workspace_folders: Vec<PathBuf>,
    pub diagnostic_log_file: PathBuf,
    pub diagnostic_log_max_size_bytes: u64,
    pub hidden_output_lines: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_level: "info".to_string(),
            shell: default_shell(None),
            default_terminal_name: DEFAULT_TERMINAL_NAME.to_string(),
            workspace_folders: Vec::new(),
            diagnostic_log_file: default_log_dir().join("diagnostic.log"),
            diagnostic_log_max_size_bytes: 10 * 1024 * 1024,
            hidden_output_lines: 1000,
        }
    }
}

fn default_shell(configured: Option<String>) -> String {
    configured
        .filter(|s| !s.trim().is_empty())
        .or_else(|| std::env::var("SHELL").ok().filter(|s| !s.is_empty()))
        .unwrap_or_else(|| "/bin/sh".to_string())
}

fn default_log_dir() -> PathBuf {
    expand_tilde_path_buf("~/.terminal-command-keys")
        .unwrap_or_else(|_| PathBuf::from(".terminal-command-keys"))
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if present
        Self::from_env_fn(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_env_fn<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let log_level = var("LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let shell = default_shell(var("TCK_SHELL"));

        let default_terminal_name = var("TCK_DEFAULT_TERMINAL_NAME")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_TERMINAL_NAME.to_string());

        // Order matters: the first folder is the workspace root used for templates.
        let workspace_folders = var("TCK_WORKSPACE_FOLDERS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .filter_map(|s| match normalize_existing_dir(s) {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!(folder = %s, error = %e, "Skipping workspace folder");
                    None
                }
            })
            .collect::<Vec<_>>();

        let log_dir = match var("TCK_LOG_DIR").filter(|s| !s.is_empty()) {
            Some(dir) => expand_tilde_path_buf(&dir)
                .with_context(|| format!("Invalid TCK_LOG_DIR: {}", dir))?,
            None => default_log_dir(),
        };

        let diagnostic_log_max_size_bytes = var("TCK_LOG_MAX_SIZE_MB")
            .unwrap_or_else(|| "10".to_string())
            .parse::<u64>()
            .context("Invalid TCK_LOG_MAX_SIZE_MB")?
            * 1024
            * 1024;

        let hidden_output_lines = var("TCK_HIDDEN_OUTPUT_LINES")
            .unwrap_or_else(|| "1000".to_string())
            .parse::<usize>()
            .context("Invalid TCK_HIDDEN_OUTPUT_LINES")?;

        Ok(Config {
            log_level,
            shell,
            default_terminal_name,
            workspace_folders,
            diagnostic_log_file: log_dir.join("diagnostic.log"),
            diagnostic_log_max_size_bytes,
            hidden_output_lines,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load_with(vars: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_env_fn(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = load_with(&[]).unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.default_terminal_name, DEFAULT_TERMINAL_NAME);
        assert!(config.workspace_folders.is_empty());
        assert_eq!(config.diagnostic_log_max_size_bytes, 10 * 1024 * 1024);
        assert_eq!(config.hidden_output_lines, 1000);
        assert!(config.diagnostic_log_file.ends_with("diagnostic.log"));
    }

    #[test]
    fn workspace_folders_keep_order_and_skip_missing() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        let list = format!(
            "{}, /definitely/not/here ,{}",
            first.path().display(),
            second.path().display()
        );
        let config = load_with(&[("TCK_WORKSPACE_FOLDERS", &list)]).unwrap();
        assert_eq!(config.workspace_folders.len(), 2);
        assert_eq!(
            config.workspace_folders[0],
            dunce::canonicalize(first.path()).unwrap()
        );
        assert_eq!(
            config.workspace_folders[1],
            dunce::canonicalize(second.path()).unwrap()
        );
    }

    #[test]
    fn explicit_values_override_defaults() {
        let config = load_with(&[
            ("TCK_SHELL", "/bin/bash"),
            ("TCK_DEFAULT_TERMINAL_NAME", " build "),
            ("TCK_LOG_DIR", "/tmp/tck-logs"),
            ("TCK_LOG_MAX_SIZE_MB", "2"),
        ])
        .unwrap();
        assert_eq!(config.shell, "/bin/bash");
        assert_eq!(config.default_terminal_name, "build");
        assert_eq!(
            config.diagnostic_log_file,
            PathBuf::from("/tmp/tck-logs/diagnostic.log")
        );
        assert_eq!(config.diagnostic_log_max_size_bytes, 2 * 1024 * 1024);
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        assert!(load_with(&[("TCK_LOG_MAX_SIZE_MB", "lots")]).is_err());
        assert!(load_with(&[("TCK_HIDDEN_OUTPUT_LINES", "-1")]).is_err());
    }
}
