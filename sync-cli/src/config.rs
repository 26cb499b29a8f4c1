//! Configuration management for sync-cli.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Backend connection settings stored locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the backend API.
    pub api_base_url: String,
    /// Bearer token for authenticated requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

impl BackendConfig {
    /// Create a new backend configuration.
    pub fn new(api_base_url: &str) -> Self {
        Self {
            api_base_url: api_base_url.to_string(),
            auth_token: None,
        }
    }

    /// Load backend configuration from a directory.
    pub async fn load(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join("backend.json");
        let contents = tokio::fs::read_to_string(&path).await.context(
            "Backend not configured. Create backend.json in the data directory \
             with at least {\"api_base_url\": \"...\"}.",
        )?;
        serde_json::from_str(&contents).context("Invalid backend configuration")
    }

    /// Save backend configuration to a directory.
    pub async fn save(&self, data_dir: &Path) -> Result<()> {
        let path = data_dir.join("backend.json");
        let contents = serde_json::to_string_pretty(self)?;
        tokio::fs::write(&path, contents)
            .await
            .context("Failed to save backend configuration")?;
        Ok(())
    }

    /// Check if a backend is configured.
    pub async fn exists(data_dir: &Path) -> bool {
        data_dir.join("backend.json").exists()
    }
}

/// Resolve the data directory: the explicit flag or the platform default.
pub fn resolve_data_dir(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        return Ok(dir);
    }
    let dirs = directories::ProjectDirs::from("io", "repsync", "repsync")
        .context("Could not determine a data directory; pass --data-dir")?;
    Ok(dirs.data_dir().to_path_buf())
}
