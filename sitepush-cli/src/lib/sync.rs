//! Reconciliation of a local folder tree with a remote folder tree.
//!
//! The local tree is authoritative. Each folder is handled in two passes,
//! files first then subfolders, and the subfolders are queued for the same
//! treatment. Remote files are never patched: an outdated file is deleted
//! and uploaded again, which gives it a new identity.

use std::collections::BTreeSet;
use std::fmt;

use sitepush::{
    id::{Id, IdBuf},
    path::{FsPath, FsPathBuf, Path, PathBuf},
    Kind, LocalEntry, Named, PathError, RemoteEntry,
};

use crate::{fingerprint, local, storage::RemoteTree};

/// Outcome of matching a name against the local and the remote children of a folder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pairing<'a, L, R> {
    LocalOnly(&'a L),
    RemoteOnly(&'a R),
    Both(&'a L, &'a R),
}

impl<L: Named, R: Named> Pairing<'_, L, R> {
    pub fn name(&self) -> &str {
        match self {
            Pairing::LocalOnly(l) | Pairing::Both(l, _) => l.name(),
            Pairing::RemoteOnly(r) => r.name(),
        }
    }
}

/// Pairs local and remote entries by name, over the union of both name sets, in name order.
///
/// If several remote entries share a name, the first one is paired and the
/// others are ignored.
pub fn pair<'a, L, R>(local: &'a [L], remote: &'a [R]) -> sitepush::Result<Vec<Pairing<'a, L, R>>>
where
    L: Named,
    R: Named,
{
    let names: BTreeSet<&str> = local
        .iter()
        .map(Named::name)
        .chain(remote.iter().map(Named::name))
        .collect();

    let mut pairings = Vec::with_capacity(names.len());
    for name in names {
        let l = local.iter().find(|l| l.name() == name);
        let r = remote.iter().find(|r| r.name() == name);
        let pairing = match (l, r) {
            (Some(l), None) => Pairing::LocalOnly(l),
            (None, Some(r)) => Pairing::RemoteOnly(r),
            (Some(l), Some(r)) => Pairing::Both(l, r),
            (None, None) => sitepush::bug_bail!("'{name}' is neither local nor remote"),
        };
        pairings.push(pairing);
    }
    Ok(pairings)
}

/// A reconciliation step, reported as it is applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Upload { path: PathBuf, id: IdBuf },
    Update { path: PathBuf, old_id: IdBuf, id: IdBuf },
    Delete { path: PathBuf, id: IdBuf },
    Skip { path: PathBuf },
    CreateFolder { path: PathBuf, id: IdBuf },
    DeleteFolder { path: PathBuf, id: IdBuf },
    /// A folder present on both sides, about to be reconciled
    Recurse { path: PathBuf },
}

impl Step {
    pub fn label(&self) -> &'static str {
        match self {
            Step::Upload { .. } => "Upload",
            Step::Update { .. } => "Update",
            Step::Delete { .. } => "Delete",
            Step::Skip { .. } => "Skip",
            Step::CreateFolder { .. } => "Create Folder",
            Step::DeleteFolder { .. } => "Delete Folder",
            Step::Recurse { .. } => "Sync Folder",
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Step::Upload { path, .. }
            | Step::Update { path, .. }
            | Step::Delete { path, .. }
            | Step::Skip { path }
            | Step::CreateFolder { path, .. }
            | Step::DeleteFolder { path, .. }
            | Step::Recurse { path } => path,
        }
    }

    /// Whether the step changed the remote tree
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Step::Skip { .. } | Step::Recurse { .. })
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label(), self.path())
    }
}

/// Counts of applied steps
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub uploaded: usize,
    pub updated: usize,
    pub deleted: usize,
    pub skipped: usize,
    pub folders_created: usize,
    pub folders_deleted: usize,
    pub folders_synced: usize,
}

impl Summary {
    fn count(&mut self, step: &Step) {
        match step {
            Step::Upload { .. } => self.uploaded += 1,
            Step::Update { .. } => self.updated += 1,
            Step::Delete { .. } => self.deleted += 1,
            Step::Skip { .. } => self.skipped += 1,
            Step::CreateFolder { .. } => self.folders_created += 1,
            Step::DeleteFolder { .. } => self.folders_deleted += 1,
            Step::Recurse { .. } => self.folders_synced += 1,
        }
    }

    /// True if the remote tree was left untouched
    pub fn is_noop(&self) -> bool {
        self.uploaded == 0
            && self.updated == 0
            && self.deleted == 0
            && self.folders_created == 0
            && self.folders_deleted == 0
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} uploaded, {} updated, {} deleted, {} unchanged, {} folders created, {} folders deleted",
            self.uploaded,
            self.updated,
            self.deleted,
            self.skipped,
            self.folders_created,
            self.folders_deleted
        )
    }
}

pub type Reporter<'a> = &'a (dyn Fn(&Step) + Send + Sync);

/// A folder waiting to be reconciled
struct Job {
    local: FsPathBuf,
    folder_id: IdBuf,
    prefix: PathBuf,
    /// Reported as "Sync Folder" when processed
    announce: bool,
    /// Real paths of the local directories above this one
    ancestors: Vec<FsPathBuf>,
}

pub struct SyncEngine<'a, R> {
    remote: &'a R,
    reporter: Option<Reporter<'a>>,
}

impl<'a, R> SyncEngine<'a, R>
where
    R: RemoteTree,
{
    pub fn new(remote: &'a R) -> Self {
        Self {
            remote,
            reporter: None,
        }
    }

    pub fn with_reporter(mut self, reporter: Reporter<'a>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Makes the content of the remote folder `folder_id` identical to the local
    /// directory `local_dir`. `prefix` is the logical path of `folder_id` and only
    /// serves reporting.
    ///
    /// The first error aborts the whole run. It carries the logical path where it happened.
    pub async fn sync_folder(
        &self,
        local_dir: &FsPath,
        folder_id: &Id,
        prefix: &Path,
    ) -> sitepush::Result<Summary> {
        let mut summary = Summary::default();
        let mut stack = vec![Job {
            local: local_dir.to_owned(),
            folder_id: folder_id.to_owned(),
            prefix: prefix.normalized(),
            announce: false,
            ancestors: Vec::new(),
        }];

        while let Some(mut job) = stack.pop() {
            let real = local::real_dir(&job.local)
                .await
                .map_err(|err| err.at(job.prefix.clone()))?;
            // the same directory reached through different links is fine, a cycle is not
            if job.ancestors.contains(&real) {
                return Err(sitepush::Error::from(PathError::Loop(real)).at(job.prefix));
            }
            job.ancestors.push(real.clone());
            if job.announce {
                self.apply(&mut summary, Step::Recurse {
                    path: job.prefix.clone(),
                });
            }
            log::debug!("reconciling {} with folder {}", job.local, job.folder_id);

            let (local_folders, local_files): (Vec<_>, Vec<_>) = local::scan_dir(&real)
                .await
                .map_err(|err| err.at(job.prefix.clone()))?
                .into_iter()
                .partition(LocalEntry::is_dir);

            self.sync_files(&mut summary, &job, &local_files)
                .await
                .map_err(|err| err.at(job.prefix.clone()))?;
            let children = self
                .sync_folders(&mut summary, &job, &local_folders)
                .await
                .map_err(|err| err.at(job.prefix.clone()))?;

            // reversed so that folders are popped in name order
            stack.extend(children.into_iter().rev());
        }
        Ok(summary)
    }

    fn apply(&self, summary: &mut Summary, step: Step) {
        log::debug!("{step}");
        summary.count(&step);
        if let Some(reporter) = self.reporter {
            reporter(&step);
        }
    }

    async fn sync_files(
        &self,
        summary: &mut Summary,
        job: &Job,
        local_files: &[LocalEntry],
    ) -> sitepush::Result<()> {
        let listed = self.remote.list_children(&job.folder_id, Kind::File).await?;
        let mut remote_files = Vec::with_capacity(listed.len());
        for entry in listed.into_iter().filter(|e| !e.trashed) {
            // listings may carry a stale or missing hash
            let path = job.prefix.join(&entry.name);
            let fresh = self
                .remote
                .get_metadata(&entry.id)
                .await
                .map_err(|err| err.at(path))?;
            remote_files.push(RemoteEntry {
                name: entry.name,
                ..fresh
            });
        }

        for pairing in pair(local_files, &remote_files)? {
            let path = job.prefix.join(pairing.name());
            let step = self
                .sync_file(&job.folder_id, pairing, path.clone())
                .await
                .map_err(|err| err.at(path))?;
            self.apply(summary, step);
        }
        Ok(())
    }

    async fn sync_file(
        &self,
        folder_id: &Id,
        pairing: Pairing<'_, LocalEntry, RemoteEntry>,
        path: PathBuf,
    ) -> sitepush::Result<Step> {
        match pairing {
            Pairing::LocalOnly(l) => {
                let id = self
                    .remote
                    .upload_file(folder_id, l.name(), l.path())
                    .await?;
                Ok(Step::Upload { path, id })
            }
            Pairing::RemoteOnly(r) => {
                self.remote.delete(&r.id).await?;
                Ok(Step::Delete {
                    path,
                    id: r.id.clone(),
                })
            }
            Pairing::Both(l, r) => {
                let hash = fingerprint::fingerprint(l.path()).await?;
                if r.content_hash.as_deref() == Some(hash.as_str()) {
                    return Ok(Step::Skip { path });
                }
                log::debug!(
                    "{path} changed: local {hash}, remote {}",
                    r.content_hash.as_deref().unwrap_or("<none>")
                );
                self.remote.delete(&r.id).await?;
                let id = self
                    .remote
                    .upload_file(folder_id, l.name(), l.path())
                    .await?;
                Ok(Step::Update {
                    path,
                    old_id: r.id.clone(),
                    id,
                })
            }
        }
    }

    /// Returns the folders to reconcile next
    async fn sync_folders(
        &self,
        summary: &mut Summary,
        job: &Job,
        local_folders: &[LocalEntry],
    ) -> sitepush::Result<Vec<Job>> {
        let remote_folders: Vec<RemoteEntry> = self
            .remote
            .list_children(&job.folder_id, Kind::Folder)
            .await?
            .into_iter()
            .filter(|e| !e.trashed)
            .collect();

        let mut children = Vec::new();
        for pairing in pair(local_folders, &remote_folders)? {
            let path = job.prefix.join(pairing.name());
            match pairing {
                Pairing::LocalOnly(l) => {
                    let id = self
                        .remote
                        .mkdir(&job.folder_id, l.name())
                        .await
                        .map_err(|err| err.at(path.clone()))?;
                    self.apply(summary, Step::CreateFolder {
                        path: path.clone(),
                        id: id.clone(),
                    });
                    children.push(Job {
                        local: l.path().to_owned(),
                        folder_id: id,
                        prefix: path,
                        announce: true,
                        ancestors: job.ancestors.clone(),
                    });
                }
                Pairing::RemoteOnly(r) => {
                    self.remote
                        .delete(&r.id)
                        .await
                        .map_err(|err| err.at(path.clone()))?;
                    self.apply(summary, Step::DeleteFolder {
                        path,
                        id: r.id.clone(),
                    });
                }
                Pairing::Both(l, r) => children.push(Job {
                    local: l.path().to_owned(),
                    folder_id: r.id.clone(),
                    prefix: path,
                    announce: true,
                    ancestors: job.ancestors.clone(),
                }),
            }
        }
        Ok(children)
    }
}
