use sitepush::{path::Path, Error, PathError};
use sitepush_cli::provision::provision;

use crate::{
    dataset::{self, Entry},
    harness::Harness,
    stubs::drive::{self, Op},
};

#[rustfmt::skip]
const A_AND_SUB: &[Entry] = &[
    Entry::File{name: "a.txt", content: "H1"},
    Entry::Dir{name: "sub", entries: &[
        Entry::File{name: "b.txt", content: "H2"},
    ]},
];

#[tokio::test]
async fn upload_into_empty_remote() {
    let harness = Harness::new(A_AND_SUB, &[]).await;

    let summary = harness.sync().await.unwrap();
    assert_eq!(
        harness.remote.call_log(),
        ["Upload /a.txt", "Mkdir /sub", "Upload /sub/b.txt"]
    );
    assert_eq!(summary.uploaded, 2);
    assert_eq!(summary.folders_created, 1);

    harness.remote.clear_calls();
    let summary = harness.sync().await.unwrap();
    assert!(harness.remote.calls().is_empty());
    assert!(summary.is_noop());
    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.folders_synced, 1);
}

#[tokio::test]
async fn stale_remote_file_is_deleted() {
    #[rustfmt::skip]
    let remote: &[Entry] = &[
        Entry::File{name: "a.txt", content: "H1"},
        Entry::File{name: "stale.txt", content: "H3"},
    ];
    let harness = Harness::new(&[Entry::File { name: "a.txt", content: "H1" }], remote).await;
    let a_id = harness.remote.lookup("/a.txt").unwrap();

    let summary = harness.sync().await.unwrap();
    assert_eq!(harness.remote.call_log(), ["Delete /stale.txt"]);
    assert_eq!(summary.skipped, 1);
    assert_eq!(harness.remote.lookup("/a.txt"), Some(a_id));
    assert_eq!(harness.remote.lookup("/stale.txt"), None);
}

#[tokio::test]
async fn changed_file_gets_new_identity() {
    let harness = Harness::new(
        &[Entry::File { name: "a.txt", content: "H2" }],
        &[Entry::File { name: "a.txt", content: "H1" }],
    )
    .await;
    let old_id = harness.remote.lookup("/a.txt").unwrap();

    let summary = harness.sync().await.unwrap();
    let calls = harness.remote.calls();
    assert_eq!(harness.remote.call_log(), ["Delete /a.txt", "Upload /a.txt"]);
    assert_eq!(calls[0].id, old_id);

    let new_id = harness.remote.lookup("/a.txt").unwrap();
    assert_ne!(new_id, old_id);
    assert_eq!(calls[1].id, new_id);
    assert_eq!(summary.updated, 1);
    assert_eq!(
        harness.remote.tree(&harness.remote.root()),
        [("/a.txt".to_string(), sitepush::Kind::File, Some("H2".to_string()))]
    );
}

#[tokio::test]
async fn full_dataset_converges() {
    let harness = Harness::new(dataset::LOCAL, dataset::REMOTE).await;
    let both_id = harness.remote.lookup("/both/both.txt").unwrap();
    let changed_id = harness.remote.lookup("/both/changed.txt").unwrap();

    harness.sync_and_check(dataset::LOCAL).await;

    assert_eq!(harness.remote.lookup("/both/both.txt"), Some(both_id));
    assert_ne!(harness.remote.lookup("/both/changed.txt"), Some(changed_id));
}

#[tokio::test]
async fn remote_only_nodes_are_removed() {
    let harness = Harness::new(dataset::LOCAL, dataset::REMOTE).await;

    harness.sync().await.unwrap();

    let remote = &harness.remote;
    for path in [
        "/only-remote.txt",
        "/only-remote",
        "/only-remote/deep/file1.txt",
        "/both/only-remote.txt",
        "/both/deep/file2.txt",
    ] {
        assert_eq!(remote.lookup(path), None, "{path} still exists");
    }
    // the folder is deleted as a whole, not file by file
    let deletes: Vec<_> = remote
        .calls()
        .into_iter()
        .filter(|c| c.op == Op::Delete)
        .map(|c| c.path)
        .collect();
    assert!(deletes.contains(&"/only-remote".to_string()));
    assert!(!deletes.iter().any(|p| p.starts_with("/only-remote/")));
}

#[tokio::test]
async fn local_changes_are_followed() {
    let harness = Harness::new(A_AND_SUB, &[]).await;
    harness.sync().await.unwrap();
    harness.remote.clear_calls();

    harness.write("/sub/b.txt", "H4").await;
    harness.write("/c.txt", "H5").await;
    harness.sync().await.unwrap();
    assert_eq!(
        harness.remote.call_log(),
        ["Upload /c.txt", "Delete /sub/b.txt", "Upload /sub/b.txt"]
    );

    harness.remote.clear_calls();
    harness.remove("/sub").await;
    harness.sync().await.unwrap();
    assert_eq!(harness.remote.call_log(), ["Delete /sub"]);
    assert_eq!(harness.remote.lookup("/sub/b.txt"), None);
}

#[tokio::test]
async fn reported_steps() {
    #[rustfmt::skip]
    let local: &[Entry] = &[
        Entry::File{name: "a.txt", content: "a"},
        Entry::Dir{name: "keep", entries: &[
            Entry::File{name: "k.txt", content: "k"},
        ]},
        Entry::Dir{name: "sub", entries: &[
            Entry::File{name: "b.txt", content: "b"},
        ]},
    ];
    #[rustfmt::skip]
    let remote: &[Entry] = &[
        Entry::File{name: "a.txt", content: "a"},
        Entry::Dir{name: "keep", entries: &[
            Entry::File{name: "k.txt", content: "k"},
        ]},
        Entry::Dir{name: "old", entries: &[
            Entry::File{name: "o.txt", content: "o"},
        ]},
    ];
    let harness = Harness::new(local, remote).await;

    let (res, steps) = harness.sync_reported().await;
    res.unwrap();
    assert_eq!(
        steps,
        [
            "Skip: /a.txt",
            "Delete Folder: /old",
            "Create Folder: /sub",
            "Sync Folder: /keep",
            "Skip: /keep/k.txt",
            "Sync Folder: /sub",
            "Upload: /sub/b.txt",
        ]
    );
}

#[tokio::test]
async fn trashed_remote_nodes_are_ignored() {
    let harness = Harness::new(&[], &[Entry::File { name: "gone.txt", content: "x" }]).await;
    let id = harness.remote.lookup("/gone.txt").unwrap();
    harness.remote.trash(&id);

    let summary = harness.sync().await.unwrap();
    assert!(summary.is_noop());
    assert!(harness.remote.calls().is_empty());
}

#[tokio::test]
async fn first_duplicate_remote_name_wins() {
    let harness = Harness::new(&[Entry::File { name: "a.txt", content: "same" }], &[]).await;
    let root = harness.remote.root();
    let first = harness.remote.seed_file(&root, "a.txt", "same");
    harness.remote.seed_file(&root, "a.txt", "other");

    harness.sync().await.unwrap();

    // the second duplicate is neither updated nor removed
    assert!(harness.remote.calls().is_empty());
    assert_eq!(harness.remote.lookup("/a.txt"), Some(first));
    assert!(harness
        .remote
        .tree(&root)
        .iter()
        .any(|(_, _, content)| content.as_deref() == Some("other")));
}

#[tokio::test]
async fn failure_aborts_with_location() {
    #[rustfmt::skip]
    let local: &[Entry] = &[
        Entry::File{name: "a.txt", content: "a"},
        Entry::Dir{name: "sub", entries: &[
            Entry::File{name: "b.txt", content: "b"},
        ]},
        Entry::Dir{name: "zzz", entries: &[
            Entry::File{name: "z.txt", content: "z"},
        ]},
    ];
    let harness = Harness::new(local, &[]).await;
    harness.remote.fail_on(Op::Upload, "b.txt");

    let err = harness.sync().await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "/sub/b.txt: API error: injected failure on Upload b.txt"
    );
    assert!(matches!(err.kind(), Error::Api(..)));
    assert_eq!(err.exit_code(), 2);
    // nothing happens after the failure, not even in sibling folders
    assert_eq!(
        harness.remote.call_log(),
        ["Upload /a.txt", "Mkdir /sub", "Mkdir /zzz"]
    );
}

#[tokio::test]
async fn failed_delete_is_reported() {
    let harness = Harness::new(&[], &[Entry::Dir { name: "old", entries: &[] }]).await;
    harness.remote.fail_on(Op::Delete, "old");

    let err = harness.sync().await.unwrap_err();
    assert!(err.to_string().starts_with("/old: API error"), "{err}");
}

#[tokio::test]
async fn missing_local_folder() {
    let harness = Harness::new(&[], &[]).await;
    let missing = harness.local.join("does-not-exist");

    let err = harness.sync_dir(&missing).await.unwrap_err();
    match err.kind() {
        Error::Path(PathError::NotFound(path)) => assert_eq!(path, &missing),
        other => panic!("unexpected error {other:?}"),
    }
    assert!(harness.remote.calls().is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn symlinks_are_followed() {
    let harness = Harness::new(A_AND_SUB, &[]).await;
    let outside = crate::utils::temp_path(Some("sitepush-ext"), None);
    tokio::fs::create_dir(&outside).await.unwrap();
    tokio::fs::write(outside.join("ext.txt"), "E").await.unwrap();
    tokio::fs::symlink(harness.local_path("a.txt"), harness.local_path("link.txt"))
        .await
        .unwrap();
    tokio::fs::symlink(&outside, harness.local_path("ext"))
        .await
        .unwrap();

    let res = harness.sync().await;
    tokio::fs::remove_dir_all(&outside).await.unwrap();
    res.unwrap();

    let tree = harness.remote.tree(&harness.remote.root());
    assert!(tree.contains(&(
        "/link.txt".to_string(),
        sitepush::Kind::File,
        Some("H1".to_string())
    )));
    assert!(tree.contains(&(
        "/ext/ext.txt".to_string(),
        sitepush::Kind::File,
        Some("E".to_string())
    )));
}

#[cfg(unix)]
#[tokio::test]
async fn aliased_folder_converges() {
    #[rustfmt::skip]
    const EXPECTED: &[Entry] = &[
        Entry::File{name: "a.txt", content: "H1"},
        Entry::Dir{name: "alias", entries: &[
            Entry::File{name: "b.txt", content: "H2"},
        ]},
        Entry::Dir{name: "sub", entries: &[
            Entry::File{name: "b.txt", content: "H2"},
        ]},
    ];
    let harness = Harness::new(A_AND_SUB, &[]).await;
    tokio::fs::symlink(harness.local_path("sub"), harness.local_path("alias"))
        .await
        .unwrap();

    harness.sync_and_check(EXPECTED).await;
}

#[cfg(unix)]
#[tokio::test]
async fn symlink_loop_is_refused() {
    let harness = Harness::new(A_AND_SUB, &[]).await;
    tokio::fs::symlink("..", harness.local_path("sub/loop"))
        .await
        .unwrap();

    let err = harness.sync().await.unwrap_err();
    assert!(
        matches!(err.kind(), Error::Path(PathError::Loop(..))),
        "{err}"
    );
    assert!(err.to_string().starts_with("/sub/loop: "), "{err}");
}

#[tokio::test]
async fn provisioning_is_idempotent() {
    crate::init_log();
    let remote = drive::Stub::new();
    let path = Path::new("/static-web-hosting/site");

    let id = provision(&remote, path).await.unwrap();
    assert_eq!(
        remote.call_log(),
        [
            "Mkdir /static-web-hosting",
            "Mkdir /static-web-hosting/site",
            "Grant /static-web-hosting/site"
        ]
    );
    assert!(remote.is_public(&id));

    remote.clear_calls();
    let again = provision(&remote, Path::new("//static-web-hosting/./site/"))
        .await
        .unwrap();
    assert_eq!(again, id);
    assert!(remote.calls().iter().all(|c| c.op == Op::Grant));
    assert_eq!(remote.public_count(), 1);
    assert_eq!(remote.lookup("/static-web-hosting/site"), Some(id));
}

#[tokio::test]
async fn provisioning_reuses_folders_only() {
    let remote = drive::Stub::new();
    let root = remote.root();
    let www = remote.seed_folder(&root, "www");
    remote.seed_file(&root, "docs", "not a folder");

    let blog = provision(&remote, Path::new("/www/blog")).await.unwrap();
    assert_eq!(remote.call_log(), ["Mkdir /www/blog", "Grant /www/blog"]);
    assert_ne!(blog, www);
    assert!(!remote.is_public(&www));

    remote.clear_calls();
    provision(&remote, Path::new("/docs")).await.unwrap();
    assert_eq!(remote.call_log(), ["Mkdir /docs", "Grant /docs"]);
}

#[tokio::test]
async fn provisioning_refuses_root_and_parent() {
    let remote = drive::Stub::new();

    for path in ["/", "", "//./", "/site/../other"] {
        let err = provision(&remote, Path::new(path)).await.unwrap_err();
        assert!(
            matches!(err, Error::Path(PathError::Illegal(..))),
            "{path}: {err}"
        );
    }
    assert!(remote.calls().is_empty());
    assert_eq!(remote.public_count(), 0);
}

#[tokio::test]
async fn provision_then_sync() {
    let harness = Harness::new(A_AND_SUB, &[]).await;
    let target = Path::new("/static-web-hosting/site");

    let folder = provision(&harness.remote, target).await.unwrap();
    harness.remote.clear_calls();

    let steps = std::sync::Mutex::new(Vec::new());
    let report = |step: &sitepush_cli::sync::Step| steps.lock().unwrap().push(step.to_string());
    sitepush_cli::sync::SyncEngine::new(&harness.remote)
        .with_reporter(&report)
        .sync_folder(&harness.local, &folder, target)
        .await
        .unwrap();

    assert_eq!(
        steps.into_inner().unwrap(),
        [
            "Upload: /static-web-hosting/site/a.txt",
            "Create Folder: /static-web-hosting/site/sub",
            "Sync Folder: /static-web-hosting/site/sub",
            "Upload: /static-web-hosting/site/sub/b.txt",
        ]
    );
    assert_eq!(
        harness.remote.tree(&folder),
        dataset::expected_tree(A_AND_SUB)
    );
}
