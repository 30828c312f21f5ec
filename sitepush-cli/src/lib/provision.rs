use sitepush::{id::IdBuf, path::Path, Kind, PathError};

use crate::storage::RemoteTree;

/// Resolves the logical `path` to a folder identity, creating the missing
/// folders along the way, and makes the final folder publicly readable.
///
/// The Drive root itself is never published, so `path` needs at least one segment.
/// Among same-named folders, the first one listed is used.
pub async fn provision<R>(remote: &R, path: &Path) -> sitepush::Result<IdBuf>
where
    R: RemoteTree,
{
    if path.is_root() {
        return Err(PathError::Illegal(
            path.to_string(),
            Some("Refusing to publish the root folder".to_string()),
        )
        .into());
    }
    if path.segments().any(|seg| seg == "..") {
        return Err(PathError::Illegal(
            path.to_string(),
            Some("Parent segment in target".to_string()),
        )
        .into());
    }

    let mut cur_id = remote.root_id().await?;
    for seg in path.segments() {
        let existing = remote
            .list_children(&cur_id, Kind::Folder)
            .await?
            .into_iter()
            .find(|entry| entry.name == seg);
        cur_id = match existing {
            Some(entry) => {
                log::trace!("found folder {seg} ({})", entry.id);
                entry.id
            }
            None => {
                log::info!("creating folder {seg}");
                remote.mkdir(&cur_id, seg).await?
            }
        };
    }

    remote.grant_public_read(&cur_id).await?;
    Ok(cur_id)
}
