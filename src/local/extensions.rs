//! Discovery of locally installed extensions
//!
//! An extension is a sub-directory of the extensions dir that is a git
//! checkout with an `origin` remote. Git metadata is read straight from the
//! `.git` directory.

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtensionItem {
    pub name: String,
    pub remote: String,
    pub branch: Option<String>,
    pub commit_hash: Option<String>,
    pub commit_date: Option<i64>,
    pub version: String,
    pub enabled: bool,
}

/// List extensions under `dir`, sorted by name; a missing dir lists nothing
pub async fn list_extensions(dir: &Path, disabled: &[String]) -> Result<Vec<ExtensionItem>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut items = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        let git_dir = entry.path().join(".git");
        let Some(remote) = read_origin_url(&git_dir).await else {
            debug!(extension = %name, "Skipping extension without a git remote");
            continue;
        };
        let (branch, commit_hash) = read_head(&git_dir).await;
        let version = commit_hash
            .as_deref()
            .map(|hash| hash.chars().take(8).collect())
            .unwrap_or_default();

        items.push(ExtensionItem {
            enabled: !disabled.contains(&name),
            name,
            remote,
            branch,
            commit_hash,
            commit_date: None,
            version,
        });
    }

    items.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(items)
}

async fn read_origin_url(git_dir: &Path) -> Option<String> {
    let config = tokio::fs::read_to_string(git_dir.join("config")).await.ok()?;
    let mut in_origin = false;
    for line in config.lines().map(str::trim) {
        if line.starts_with('[') {
            in_origin = line == "[remote \"origin\"]";
            continue;
        }
        if in_origin {
            if let Some((key, value)) = line.split_once('=') {
                if key.trim() == "url" {
                    return Some(value.trim().to_string());
                }
            }
        }
    }
    None
}

/// `(branch, commit)` from HEAD, following a symbolic ref through loose or packed refs
async fn read_head(git_dir: &Path) -> (Option<String>, Option<String>) {
    let head = match tokio::fs::read_to_string(git_dir.join("HEAD")).await {
        Ok(head) => head.trim().to_string(),
        Err(_) => return (None, None),
    };

    let Some(reference) = head.strip_prefix("ref: ") else {
        // detached HEAD
        return (None, Some(head));
    };
    let branch = reference
        .strip_prefix("refs/heads/")
        .unwrap_or(reference)
        .to_string();

    let loose: PathBuf = git_dir.join(reference);
    if let Ok(hash) = tokio::fs::read_to_string(&loose).await {
        return (Some(branch), Some(hash.trim().to_string()));
    }

    let packed = tokio::fs::read_to_string(git_dir.join("packed-refs"))
        .await
        .unwrap_or_default();
    let hash = packed.lines().find_map(|line| {
        let (hash, name) = line.split_once(' ')?;
        (name.trim() == reference).then(|| hash.to_string())
    });
    (Some(branch), hash)
}
