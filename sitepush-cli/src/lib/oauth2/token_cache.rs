use chrono::{DateTime, Duration, Utc};
use oauth2::{AccessToken, RefreshToken, Scope, TokenResponse, TokenType};
use serde::{Deserialize, Serialize};
use sitepush::path::{FsPath, FsPathBuf};

use crate::PersistCache;

/// Tokens expiring sooner than this are refreshed before use
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TokenEntry {
    /// Sorted
    scopes: Vec<Scope>,
    access_token: AccessToken,
    refresh_token: Option<RefreshToken>,
    expiration: Option<DateTime<Utc>>,
}

impl TokenEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration
            .map(|exp| exp - Duration::seconds(EXPIRY_MARGIN_SECS) < now)
            .unwrap_or(false)
    }
}

#[derive(Debug)]
pub enum CacheResult {
    None,
    Expired(RefreshToken, Vec<Scope>),
    Ok(AccessToken),
}

#[derive(Debug, Default)]
pub struct TokenStore {
    entries: Vec<TokenEntry>,
}

impl TokenStore {
    /// Attempts to read the cache from disk.
    /// Returns `Ok(None)` if the file doesn't exist.
    /// A corrupted file is an error.
    async fn try_read_from_disk(path: &FsPath) -> anyhow::Result<Option<Self>> {
        let json = match tokio::fs::read_to_string(path).await {
            Ok(json) => json,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        log::info!("reading cached tokens from {path}");
        let entries = serde_json::from_str(&json)?;
        Ok(Some(TokenStore { entries }))
    }

    async fn write_to_disk(&self, path: &FsPath) -> anyhow::Result<()> {
        log::info!("caching tokens to {path}");
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        let json = serde_json::to_string_pretty(&self.entries)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    /// Inserts the token of a response.
    /// `requested` is used when the response does not echo the granted scopes.
    pub fn insert<T, TT>(&mut self, tok: &T, requested: &[Scope])
    where
        T: TokenResponse<TT>,
        TT: TokenType,
    {
        let mut scopes = tok
            .scopes()
            .cloned()
            .unwrap_or_else(|| requested.to_vec());
        scopes.sort_unstable_by(|a, b| a.as_str().cmp(b.as_str()));
        log::trace!("inserting token for scopes {scopes:?}");

        let expiration = tok
            .expires_in()
            .and_then(|exp| Duration::from_std(exp).ok())
            .map(|exp| Utc::now() + exp);
        let mut entry = TokenEntry {
            scopes,
            access_token: tok.access_token().clone(),
            refresh_token: tok.refresh_token().cloned(),
            expiration,
        };
        match self.entries.iter_mut().find(|e| e.scopes == entry.scopes) {
            Some(ent) => {
                // a refresh response usually omits the refresh token
                if entry.refresh_token.is_none() {
                    entry.refresh_token = ent.refresh_token.take();
                }
                *ent = entry;
            }
            None => self.entries.push(entry),
        }
    }

    /// Stops at the first entry holding all the required scopes
    pub fn get(&self, scopes: &[Scope]) -> CacheResult {
        let now = Utc::now();
        let Some(ent) = self
            .entries
            .iter()
            .find(|ent| scopes.iter().all(|s| ent.scopes.contains(s)))
        else {
            return CacheResult::None;
        };
        if !ent.is_expired(now) {
            return CacheResult::Ok(ent.access_token.clone());
        }
        match &ent.refresh_token {
            Some(refresh_token) => CacheResult::Expired(refresh_token.clone(), ent.scopes.clone()),
            None => CacheResult::None,
        }
    }
}

/// Tokens kept in memory for the duration of the program.
/// Loaded from `path` at startup and saved back by the PersistCache implementation.
#[derive(Debug)]
pub struct TokenCache {
    path: FsPathBuf,
    store: TokenStore,
}

impl TokenCache {
    pub async fn new(path: FsPathBuf) -> anyhow::Result<Self> {
        let store = TokenStore::try_read_from_disk(&path)
            .await?
            .unwrap_or_default();
        Ok(TokenCache { path, store })
    }

    pub fn put<T, TT>(&mut self, tok: &T, requested: &[Scope])
    where
        T: TokenResponse<TT>,
        TT: TokenType,
    {
        log::trace!(
            "Put token for scopes {:?}, expires in {:?}",
            tok.scopes(),
            tok.expires_in()
        );
        self.store.insert(tok, requested);
    }

    pub fn check(&self, scopes: &[Scope]) -> CacheResult {
        let res = self.store.get(scopes);

        if log::log_enabled!(log::Level::Trace) {
            let res_str = match &res {
                CacheResult::None => "None",
                CacheResult::Expired(..) => "Expired",
                CacheResult::Ok(..) => "Ok",
            };
            let scopes: Vec<&str> = scopes.iter().map(|s| s.as_str()).collect();
            log::trace!("check token for scopes {}: {res_str}", scopes.join(", "));
        }

        res
    }
}

impl PersistCache for TokenCache {
    async fn persist_cache(&self) -> anyhow::Result<()> {
        self.store.write_to_disk(&self.path).await
    }
}
