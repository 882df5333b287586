//! Thin adapter over the `git` binary.
//!
//! Only the CLI calls this; the extractor works on already-captured text.

use std::path::Path;
use std::process::Command;

use tracing::{debug, instrument};

use chronomark_shared::{ChronoError, Result};

/// Build the `git log` argument list for one file.
pub(crate) fn log_args(file: &str, follow: bool) -> Vec<String> {
    let mut args: Vec<String> = ["log", "-p", "--no-color", "--no-ext-diff", "--date=iso-strict"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    if follow {
        args.push("--follow".to_string());
    }
    args.push("--".to_string());
    args.push(file.to_string());
    args
}

/// Capture the full patch history of `file` inside `repo`.
#[instrument(skip_all, fields(repo = %repo.display(), file = %file))]
pub fn file_history(repo: &Path, file: &str, follow: bool) -> Result<String> {
    if !repo.is_dir() {
        return Err(ChronoError::Git(format!(
            "repository path '{}' is not a directory",
            repo.display()
        )));
    }

    let output = Command::new("git")
        .args(log_args(file, follow))
        .current_dir(repo)
        .output()
        .map_err(|e| ChronoError::Git(format!("failed to execute 'git log'. Is git installed? {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ChronoError::Git(format!("git log failed: {}", stderr.trim())));
    }

    let text = String::from_utf8_lossy(&output.stdout).into_owned();
    debug!(bytes = text.len(), "captured git history");
    Ok(text)
}
