use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    id::IdBuf,
    path::{FsPath, FsPathBuf},
};

/// The two kinds of nodes that are mirrored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Kind {
    Folder,
    File,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Folder => f.write_str("folder"),
            Kind::File => f.write_str("file"),
        }
    }
}

/// Anything that can be matched by name during reconciliation
pub trait Named {
    fn name(&self) -> &str;
}

/// A child of a local directory, as read at scan time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEntry {
    name: String,
    path: FsPathBuf,
    kind: Kind,
}

impl LocalEntry {
    pub fn new(parent: &FsPath, name: String, kind: Kind) -> Self {
        let path = parent.join(&name);
        Self { name, path, kind }
    }

    pub fn path(&self) -> &FsPath {
        &self.path
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn is_dir(&self) -> bool {
        self.kind == Kind::Folder
    }
}

impl Named for LocalEntry {
    fn name(&self) -> &str {
        &self.name
    }
}

/// A node of the remote store.
/// `content_hash` is only ever set for files, and may be missing or stale
/// right after an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    pub id: IdBuf,
    pub name: String,
    pub kind: Kind,
    pub content_hash: Option<String>,
    pub trashed: bool,
    /// Shareable link, only reported by a metadata fetch
    pub web_link: Option<String>,
}

impl Named for RemoteEntry {
    fn name(&self) -> &str {
        &self.name
    }
}
