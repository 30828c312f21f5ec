use futures::Future;
use sitepush::{
    id::{Id, IdBuf},
    path::FsPath,
    Kind, RemoteEntry,
};

pub mod gdrive;

/// Identity of the top-level container of the store
pub trait RootFolder {
    fn root_id(&self) -> impl Future<Output = sitepush::Result<IdBuf>> + Send;
}

/// Lists the non-trashed children of a folder.
/// Only entries of the requested kind are returned.
pub trait ListChildren {
    fn list_children(
        &self,
        parent_id: &Id,
        kind: Kind,
    ) -> impl Future<Output = sitepush::Result<Vec<RemoteEntry>>> + Send;
}

pub trait GetMetadata {
    fn get_metadata(&self, id: &Id) -> impl Future<Output = sitepush::Result<RemoteEntry>> + Send;
}

pub trait MkDir {
    fn mkdir(
        &self,
        parent_id: &Id,
        name: &str,
    ) -> impl Future<Output = sitepush::Result<IdBuf>> + Send;
}

/// Creates a new file in `parent_id` with the content of the local file `local`.
/// A new identity is assigned on every call, even if a file of the same name exists.
pub trait UploadFile {
    fn upload_file(
        &self,
        parent_id: &Id,
        name: &str,
        local: &FsPath,
    ) -> impl Future<Output = sitepush::Result<IdBuf>> + Send;
}

/// Removes a node. Folders are removed with all their content.
pub trait Delete {
    fn delete(&self, id: &Id) -> impl Future<Output = sitepush::Result<()>> + Send;
}

/// Makes a node readable by anyone holding its link.
/// Granting twice must not add a second permission.
pub trait GrantPublicRead {
    fn grant_public_read(&self, id: &Id) -> impl Future<Output = sitepush::Result<()>> + Send;
}

/// The full set of capabilities needed to mirror a tree
pub trait RemoteTree:
    RootFolder
    + ListChildren
    + GetMetadata
    + MkDir
    + UploadFile
    + Delete
    + GrantPublicRead
    + Send
    + Sync
    + 'static
{
}

impl<T> RemoteTree for T where
    T: RootFolder
        + ListChildren
        + GetMetadata
        + MkDir
        + UploadFile
        + Delete
        + GrantPublicRead
        + Send
        + Sync
        + 'static
{
}
