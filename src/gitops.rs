//! Repository acquisition: resolve a repo argument to a local checkout.
//!
//! Local directories pass through untouched. Anything else is treated as a
//! clone URL and checked out shallow and tag-free into a persistent temp
//! directory, so artifacts written under it outlive the run. Cleanup is the
//! caller's concern.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Last path segment of a repo URL or path, without a `.git` suffix.
pub fn repo_name_from_url(repo: &str) -> String {
    let trimmed = repo
        .split(['?', '#'])
        .next()
        .unwrap_or(repo)
        .trim_end_matches('/');
    let name = trimmed.rsplit('/').next().unwrap_or(trimmed);
    name.strip_suffix(".git").unwrap_or(name).to_string()
}

/// Resolve `repo` to a readable local directory, cloning if needed.
pub fn acquire(repo: &str) -> Result<PathBuf> {
    let as_path = Path::new(repo);
    if as_path.is_dir() {
        tracing::debug!(repo, "using local directory as checkout");
        return Ok(as_path.to_path_buf());
    }

    let git = which::which("git").context("git not found on PATH")?;
    let workdir = tempfile::Builder::new()
        .prefix("apiscout-")
        .tempdir()
        .context("create clone workdir")?
        .keep();

    let output = Command::new(git)
        .args(["clone", "--depth", "1", "--no-tags"])
        .arg(repo)
        .arg(&workdir)
        .output()
        .context("run git clone")?;
    if !output.status.success() {
        bail!(
            "git clone of {repo} failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    tracing::info!(repo, dir = %workdir.display(), "cloned repository");
    Ok(workdir)
}
