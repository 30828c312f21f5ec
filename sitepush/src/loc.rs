//! Locations module

pub const APP_NAME: &str = "sitepush";
pub const SECRET_FILE: &str = "client_secret.json";

/// Locations for the user
pub mod user {
    use crate::path::FsPathBuf;

    pub fn config_dir() -> anyhow::Result<FsPathBuf> {
        let dir =
            dirs::config_dir().ok_or_else(|| anyhow::anyhow!("Can't get config directory"))?;
        let dir = FsPathBuf::try_from(dir)?;
        Ok(dir.join(super::APP_NAME))
    }

    pub fn cache_dir() -> anyhow::Result<FsPathBuf> {
        let dir = dirs::cache_dir().ok_or_else(|| anyhow::anyhow!("Can't get cache directory"))?;
        let dir = FsPathBuf::try_from(dir)?;
        Ok(dir.join(super::APP_NAME))
    }

    pub fn config_file() -> anyhow::Result<FsPathBuf> {
        Ok(config_dir()?.join("config.json"))
    }

    pub fn token_cache_file() -> anyhow::Result<FsPathBuf> {
        Ok(cache_dir()?.join("token_cache.json"))
    }
}

/// System wide locations
pub mod system {
    use crate::path::FsPathBuf;

    #[cfg(not(target_os = "windows"))]
    pub fn config_dir() -> Option<FsPathBuf> {
        Some(FsPathBuf::from("/etc").join(super::APP_NAME))
    }

    #[cfg(target_os = "windows")]
    pub fn config_dir() -> Option<FsPathBuf> {
        let dir = std::env::var("ProgramData").ok()?;
        Some(FsPathBuf::from(dir).join(super::APP_NAME))
    }
}

/// Candidate paths of the OAuth client secret, in search order:
/// working directory, executable directory, user config, system config.
pub fn secret_candidates() -> Vec<crate::path::FsPathBuf> {
    use crate::path::FsPathBuf;

    let mut candidates = vec![FsPathBuf::from(SECRET_FILE)];
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|exe| FsPathBuf::try_from(exe).ok())
        .and_then(|exe| exe.parent().map(ToOwned::to_owned));
    if let Some(dir) = exe_dir {
        candidates.push(dir.join(SECRET_FILE));
    }
    if let Ok(dir) = user::config_dir() {
        candidates.push(dir.join(SECRET_FILE));
    }
    if let Some(dir) = system::config_dir() {
        candidates.push(dir.join(SECRET_FILE));
    }
    candidates
}

/// Returns the first existing path among `candidates`
pub fn find_first<I>(candidates: I) -> Option<crate::path::FsPathBuf>
where
    I: IntoIterator<Item = crate::path::FsPathBuf>,
{
    candidates.into_iter().find(|path| {
        log::trace!("looking for {path}");
        path.is_file()
    })
}

/// Finds the OAuth client secret following [`secret_candidates`] order.
pub fn find_secret() -> crate::Result<crate::path::FsPathBuf> {
    find_first(secret_candidates()).ok_or_else(|| {
        crate::other_error!(
            "Cannot find file: '{SECRET_FILE}'. You need to create this file using instructions on https://developers.google.com/drive/api/guides/about-sdk"
        )
    })
}
