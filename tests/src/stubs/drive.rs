use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard},
};

use sitepush::{
    id::{Id, IdBuf},
    path::FsPath,
    Kind, RemoteEntry,
};
use sitepush_cli::{
    fingerprint::fingerprint_bytes,
    storage::{Delete, GetMetadata, GrantPublicRead, ListChildren, MkDir, RootFolder, UploadFile},
};

pub const ROOT_ID: &str = "root";

/// A mutating call received by the stub
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub op: Op,
    /// Path of the node from the root, e.g. `/sub/b.txt`
    pub path: String,
    pub id: IdBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Mkdir,
    Upload,
    Delete,
    Grant,
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {}", self.op, self.path)
    }
}

#[derive(Debug, Clone)]
struct Node {
    id: IdBuf,
    parent: Option<IdBuf>,
    name: String,
    kind: Kind,
    content: Vec<u8>,
    trashed: bool,
    public: bool,
}

#[derive(Debug, Default)]
struct State {
    nodes: Vec<Node>,
    next_id: u64,
    calls: Vec<Call>,
    failures: Vec<(Op, String)>,
}

impl State {
    fn node(&self, id: &Id) -> sitepush::Result<&Node> {
        self.nodes
            .iter()
            .find(|n| n.id.as_id() == id)
            .ok_or_else(|| sitepush::api_error!("GET /files/{id} returned 404 Not Found"))
    }

    fn path_of(&self, id: &Id) -> String {
        let mut segs = Vec::new();
        let mut cur = self.node(id).ok();
        while let Some(node) = cur {
            if node.parent.is_none() {
                break;
            }
            segs.push(node.name.clone());
            cur = node.parent.as_deref().and_then(|p| self.node(p).ok());
        }
        segs.reverse();
        format!("/{}", segs.join("/"))
    }

    fn check_failure(&self, op: Op, name: &str) -> sitepush::Result<()> {
        if self.failures.iter().any(|(o, n)| *o == op && n == name) {
            sitepush::api_bail!("injected failure on {op:?} {name}");
        }
        Ok(())
    }

    fn insert(&mut self, parent: &Id, name: &str, kind: Kind, content: Vec<u8>) -> sitepush::Result<IdBuf> {
        let parent = self.node(parent)?;
        if parent.kind != Kind::Folder {
            sitepush::api_bail!("{} is not a folder", parent.id);
        }
        let parent = parent.id.clone();
        self.next_id += 1;
        let id = IdBuf::from(format!("id{}", self.next_id));
        self.nodes.push(Node {
            id: id.clone(),
            parent: Some(parent),
            name: name.to_string(),
            kind,
            content,
            trashed: false,
            public: false,
        });
        Ok(id)
    }

    fn record(&mut self, op: Op, id: &Id) {
        let path = self.path_of(id);
        self.calls.push(Call {
            op,
            path,
            id: id.to_owned(),
        });
    }

    fn entry(&self, node: &Node, with_hash: bool) -> RemoteEntry {
        let content_hash = match node.kind {
            Kind::File if with_hash => Some(fingerprint_bytes(&node.content)),
            _ => None,
        };
        RemoteEntry {
            id: node.id.clone(),
            name: node.name.clone(),
            kind: node.kind,
            content_hash,
            trashed: node.trashed,
            web_link: Some(format!("https://drive.example.com/{}", node.id)),
        }
    }
}

/// In-memory remote tree.
/// Listings do not report content hashes, only metadata fetches do.
#[derive(Clone)]
pub struct Stub {
    state: Arc<Mutex<State>>,
}

impl Default for Stub {
    fn default() -> Self {
        Self::new()
    }
}

impl Stub {
    pub fn new() -> Self {
        let state = State {
            nodes: vec![Node {
                id: IdBuf::from(ROOT_ID),
                parent: None,
                name: String::new(),
                kind: Kind::Folder,
                content: Vec::new(),
                trashed: false,
                public: false,
            }],
            ..Default::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn root(&self) -> IdBuf {
        IdBuf::from(ROOT_ID)
    }

    /// Creates a folder without recording a call
    pub fn seed_folder(&self, parent: &Id, name: &str) -> IdBuf {
        self.lock()
            .insert(parent, name, Kind::Folder, Vec::new())
            .unwrap()
    }

    /// Creates a file without recording a call
    pub fn seed_file(&self, parent: &Id, name: &str, content: &str) -> IdBuf {
        self.lock()
            .insert(parent, name, Kind::File, content.as_bytes().to_vec())
            .unwrap()
    }

    /// Moves a node to the trash
    pub fn trash(&self, id: &Id) {
        let mut state = self.lock();
        let node = state.nodes.iter_mut().find(|n| n.id.as_id() == id).unwrap();
        node.trashed = true;
    }

    /// Every `op` on a node named `name` fails from now on
    pub fn fail_on(&self, op: Op, name: &str) {
        self.lock().failures.push((op, name.to_string()));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Calls as "Op /path" strings, in order
    pub fn call_log(&self) -> Vec<String> {
        self.calls().iter().map(ToString::to_string).collect()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Identity of the non-trashed node at `path`, relative to the root
    pub fn lookup(&self, path: &str) -> Option<IdBuf> {
        let state = self.lock();
        let mut cur = IdBuf::from(ROOT_ID);
        for seg in path.split('/').filter(|s| !s.is_empty()) {
            cur = state
                .nodes
                .iter()
                .find(|n| n.parent.as_ref() == Some(&cur) && n.name == seg && !n.trashed)?
                .id
                .clone();
        }
        Some(cur)
    }

    pub fn is_public(&self, id: &Id) -> bool {
        self.lock().node(id).map(|n| n.public).unwrap_or(false)
    }

    pub fn public_count(&self) -> usize {
        self.lock().nodes.iter().filter(|n| n.public).count()
    }

    /// Every non-trashed node under `folder`, as `(path, kind, content)`, sorted by path.
    /// Folders have no content.
    pub fn tree(&self, folder: &Id) -> Vec<(String, Kind, Option<String>)> {
        let state = self.lock();
        let mut res = Vec::new();
        let mut stack = vec![(folder.to_owned(), String::new())];
        while let Some((id, prefix)) = stack.pop() {
            for node in state
                .nodes
                .iter()
                .filter(|n| n.parent.as_ref() == Some(&id) && !n.trashed)
            {
                let path = format!("{prefix}/{}", node.name);
                match node.kind {
                    Kind::Folder => {
                        res.push((path.clone(), Kind::Folder, None));
                        stack.push((node.id.clone(), path));
                    }
                    Kind::File => res.push((
                        path,
                        Kind::File,
                        Some(String::from_utf8_lossy(&node.content).to_string()),
                    )),
                }
            }
        }
        res.sort_by(|a, b| a.0.cmp(&b.0));
        res
    }
}

impl RootFolder for Stub {
    async fn root_id(&self) -> sitepush::Result<IdBuf> {
        Ok(self.root())
    }
}

impl ListChildren for Stub {
    async fn list_children(&self, parent_id: &Id, kind: Kind) -> sitepush::Result<Vec<RemoteEntry>> {
        let state = self.lock();
        state.node(parent_id)?;
        Ok(state
            .nodes
            .iter()
            .filter(|n| n.parent.as_deref() == Some(parent_id) && n.kind == kind && !n.trashed)
            .map(|n| state.entry(n, false))
            .collect())
    }
}

impl GetMetadata for Stub {
    async fn get_metadata(&self, id: &Id) -> sitepush::Result<RemoteEntry> {
        let state = self.lock();
        let node = state.node(id)?;
        Ok(state.entry(node, true))
    }
}

impl MkDir for Stub {
    async fn mkdir(&self, parent_id: &Id, name: &str) -> sitepush::Result<IdBuf> {
        let mut state = self.lock();
        state.check_failure(Op::Mkdir, name)?;
        let id = state.insert(parent_id, name, Kind::Folder, Vec::new())?;
        state.record(Op::Mkdir, &id);
        Ok(id)
    }
}

impl UploadFile for Stub {
    async fn upload_file(&self, parent_id: &Id, name: &str, local: &FsPath) -> sitepush::Result<IdBuf> {
        let content = tokio::fs::read(local).await?;
        let mut state = self.lock();
        state.check_failure(Op::Upload, name)?;
        let id = state.insert(parent_id, name, Kind::File, content)?;
        state.record(Op::Upload, &id);
        Ok(id)
    }
}

impl Delete for Stub {
    async fn delete(&self, id: &Id) -> sitepush::Result<()> {
        let mut state = self.lock();
        let name = state.node(id)?.name.clone();
        state.check_failure(Op::Delete, &name)?;
        state.record(Op::Delete, id);

        let mut doomed = vec![id.to_owned()];
        let mut i = 0;
        while i < doomed.len() {
            let children: Vec<IdBuf> = state
                .nodes
                .iter()
                .filter(|n| n.parent.as_ref() == Some(&doomed[i]))
                .map(|n| n.id.clone())
                .collect();
            doomed.extend(children);
            i += 1;
        }
        state.nodes.retain(|n| !doomed.contains(&n.id));
        Ok(())
    }
}

impl GrantPublicRead for Stub {
    async fn grant_public_read(&self, id: &Id) -> sitepush::Result<()> {
        let mut state = self.lock();
        let name = state.node(id)?.name.clone();
        state.check_failure(Op::Grant, &name)?;
        state.record(Op::Grant, id);
        if let Some(node) = state.nodes.iter_mut().find(|n| n.id.as_id() == id) {
            node.public = true;
        }
        Ok(())
    }
}
