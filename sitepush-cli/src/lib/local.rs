use async_stream::try_stream;
use futures::{Stream, TryStreamExt};
use sitepush::{
    path::{FsPath, FsPathBuf},
    Kind, LocalEntry,
};
use tokio::fs::{self, DirEntry};

/// Streams the children of the local directory `dir`.
/// Symlinks are followed. Entries that are neither files nor directories
/// are left out.
pub fn dir_entries(dir: &FsPath) -> impl Stream<Item = sitepush::Result<LocalEntry>> + Send + '_ {
    log::trace!("listing entries of {dir}");
    try_stream! {
        let mut read_dir = fs::read_dir(dir).await?;
        while let Some(direntry) = read_dir.next_entry().await? {
            if let Some(entry) = map_direntry(dir, &direntry).await? {
                yield entry;
            }
        }
    }
}

/// Snapshot of the children of `dir`, sorted by name
pub async fn scan_dir(dir: &FsPath) -> sitepush::Result<Vec<LocalEntry>> {
    use sitepush::Named;

    let mut entries: Vec<LocalEntry> = dir_entries(dir).try_collect().await?;
    entries.sort_unstable_by(|a, b| a.name().cmp(b.name()));
    Ok(entries)
}

/// Resolves `dir` to an absolute path without symlinks, checking it is a directory.
pub async fn real_dir(dir: &FsPath) -> sitepush::Result<FsPathBuf> {
    let real = match fs::canonicalize(dir).await {
        Ok(real) => FsPathBuf::try_from(real)?,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(sitepush::PathError::NotFound(dir.to_owned()).into());
        }
        Err(err) => sitepush::io_bail!("Could not resolve {dir}: {err}"),
    };
    if !fs::metadata(&real).await?.is_dir() {
        return Err(sitepush::PathError::NotADirectory(real).into());
    }
    Ok(real)
}

async fn map_direntry(dir: &FsPath, direntry: &DirEntry) -> sitepush::Result<Option<LocalEntry>> {
    let name = String::from_utf8(direntry.file_name().into_encoded_bytes())?;
    if name == "." || name == ".." {
        return Ok(None);
    }
    let fs_path = dir.join(&name);
    // follows symlinks
    let metadata = fs::metadata(&fs_path)
        .await
        .map_err(|err| sitepush::io_error!("Could not stat {fs_path}: {err}"))?;
    let kind = if metadata.is_dir() {
        Kind::Folder
    } else if metadata.is_file() {
        Kind::File
    } else {
        log::warn!("ignoring {fs_path}: neither a file nor a folder");
        return Ok(None);
    };
    Ok(Some(LocalEntry::new(dir, name, kind)))
}
