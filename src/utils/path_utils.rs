use crate::error::AppError;
use std::path::PathBuf;
use tracing::debug;

/// Expands tilde (~) and environment variables in a path string.
pub fn expand_tilde_path_buf(path_str: &str) -> Result<PathBuf, AppError> {
    shellexpand::full(path_str)
        .map(|cow_str| PathBuf::from(cow_str.as_ref()))
        .map_err(|e| {
            AppError::Config(anyhow::anyhow!(
                "Failed to expand path '{}': {}",
                path_str,
                e
            ))
        })
}

/// Expands and canonicalizes a directory path, failing if it does not exist.
pub fn normalize_existing_dir(path_str: &str) -> Result<PathBuf, AppError> {
    let expanded = expand_tilde_path_buf(path_str)?;
    // dunce keeps Windows paths free of the \\?\ prefix so they read naturally in commands.
    let canonical = dunce::canonicalize(&expanded)?;
    if !canonical.is_dir() {
        return Err(AppError::Config(anyhow::anyhow!(
            "Not a directory: {}",
            canonical.display()
        )));
    }
    debug!(input = %path_str, normalized = %canonical.display(), "Normalized directory");
    Ok(canonical)
}
