use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::path::{FsPath, FsPathBuf, PathBuf};

pub const DEFAULT_SYNC_ROOT: &str = "/static-web-hosting";

/// Settings of sitepush.
/// All fields are optional in the JSON file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Logical remote folder under which local folders are deployed
    /// when no target path is given
    pub sync_root: PathBuf,
    /// Explicit location of the OAuth client secret
    pub client_secret: Option<FsPathBuf>,
    /// Where to cache OAuth tokens
    pub token_cache: Option<FsPathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sync_root: PathBuf::from(DEFAULT_SYNC_ROOT),
            client_secret: None,
            token_cache: None,
        }
    }
}

impl Config {
    pub async fn load_from_file(path: &FsPath) -> anyhow::Result<Self> {
        let config_json = tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read config from {path}"))?;
        let config_json = std::str::from_utf8(&config_json)?;
        serde_json::from_str(config_json).with_context(|| format!("Invalid config file {path}"))
    }

    /// Loads the user config file if it exists, the defaults otherwise.
    pub async fn load_user() -> anyhow::Result<Self> {
        let path = crate::loc::user::config_file()?;
        if path.exists() {
            log::info!("Found config file: {path}");
            Self::load_from_file(&path).await
        } else {
            Ok(Self::default())
        }
    }

    /// The logical remote path of `local_dir` when no target is given
    pub fn default_target(&self, local_dir: &FsPath) -> crate::Result<PathBuf> {
        let name = local_dir.file_name().ok_or_else(|| {
            crate::Error::Path(crate::PathError::Illegal(
                local_dir.to_string(),
                Some("Cannot deploy a folder without name".to_string()),
            ))
        })?;
        Ok(self.sync_root.join(name))
    }

    pub fn token_cache_file(&self) -> anyhow::Result<FsPathBuf> {
        match &self.token_cache {
            Some(path) => Ok(path.clone()),
            None => crate::loc::user::token_cache_file(),
        }
    }
}
