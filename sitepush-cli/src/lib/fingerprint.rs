//! Content fingerprints of local files.
//!
//! Google Drive reports `md5Checksum` for every binary file, as lowercase
//! hexadecimal. Fingerprints are computed the same way so that equal strings
//! mean equal content.

use md5::{Digest, Md5};
use sitepush::path::FsPath;
use tokio::io::{self, AsyncReadExt};

const BUF_SZ: usize = 64 * 1024;

/// Computes the fingerprint of the file at `path`.
/// Only the content matters, timestamps and permissions are ignored.
pub async fn fingerprint(path: &FsPath) -> sitepush::Result<String> {
    log::trace!("hashing {path}");
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|err| sitepush::io_error!("Could not open {path}: {err}"))?;
    fingerprint_read(file)
        .await
        .map_err(|err| sitepush::io_error!("Could not read {path}: {err}"))
}

/// Computes the fingerprint of everything `data` yields
pub async fn fingerprint_read<R>(data: R) -> io::Result<String>
where
    R: io::AsyncRead,
{
    tokio::pin!(data);
    let mut hasher = Md5::new();
    let mut buf = vec![0u8; BUF_SZ];
    loop {
        let sz = data.read(&mut buf).await?;
        if sz == 0 {
            break;
        }
        hasher.update(&buf[..sz]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

pub fn fingerprint_bytes(data: &[u8]) -> String {
    format!("{:x}", Md5::digest(data))
}
