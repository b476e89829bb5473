use crate::support::{names, settle, strings, Fixture};
use std::time::Duration;
use treeorder::error::{ApiError, StorageError};
use treeorder::fs::{FileSystem, StatOptions};
use treeorder::order::{BatchTarget, ChangeKind};
use treeorder::tree::{default_compare, FileItem};

#[tokio::test]
async fn first_resolution_writes_default_order() {
    let fixture = Fixture::scenario();
    assert!(fixture.metadata_on_disk(fixture.root()).is_none());

    let tree = fixture.open_tree().await;

    let expected = strings(&["folder1", "folder2", "file1", "file2", "file3"]);
    assert_eq!(fixture.metadata_on_disk(fixture.root()), Some(expected.clone()));
    assert_eq!(names(&tree, tree.root_id()), expected);

    let raw = std::fs::read_to_string(fixture.store.metadata_path(fixture.root())).unwrap();
    assert!(raw.starts_with("[\n  \"folder1\",\n  \"folder2\""));
}

#[tokio::test]
async fn batch_remove_uses_pre_mutation_indices() {
    let fixture = Fixture::scenario();
    let root = fixture.root();
    fixture.store.load_metadata(root).await.unwrap();

    let writes = fixture.fs.writes();
    fixture
        .store
        .update_metadata_lot(ChangeKind::Remove, BatchTarget::Parent(root), &[0, 1], None)
        .await
        .unwrap();

    assert_eq!(fixture.fs.writes(), writes + 1);
    assert_eq!(
        fixture.metadata_on_disk(root),
        Some(strings(&["file1", "file2", "file3"]))
    );
}

#[tokio::test]
async fn batch_add_and_update_by_items() {
    let fixture = Fixture::scenario();
    let tree = fixture.open_tree().await;
    let root = fixture.root();
    let items: Vec<FileItem> = ["file1", "file3"]
        .iter()
        .map(|n| tree.get(&fixture.id(n)).unwrap().clone())
        .collect();

    fixture
        .store
        .update_metadata_lot(ChangeKind::Remove, BatchTarget::Parent(root), &[2, 4], None)
        .await
        .unwrap();
    fixture
        .store
        .update_metadata_lot(ChangeKind::Add, BatchTarget::Items(&items), &[0, 3], None)
        .await
        .unwrap();
    assert_eq!(
        fixture.store.cached_order(root).unwrap(),
        strings(&["file1", "folder1", "folder2", "file2", "file3"])
    );

    let mut renamed = items.clone();
    renamed[0].name = "first".to_string();
    renamed[1].name = "last".to_string();
    fixture
        .store
        .update_metadata_lot(ChangeKind::Update, BatchTarget::Items(&renamed), &[0, 4], None)
        .await
        .unwrap();
    assert_eq!(
        fixture.metadata_on_disk(root),
        Some(strings(&["first", "folder1", "folder2", "file2", "last"]))
    );
}

#[tokio::test]
async fn single_item_changes() {
    let fixture = Fixture::scenario();
    let tree = fixture.open_tree().await;
    let root = fixture.root();
    let file1 = tree.get(&fixture.id("file1")).unwrap().clone();

    fixture
        .store
        .update_metadata(ChangeKind::Swap, &file1, Some(0), Some(4))
        .await
        .unwrap();
    assert_eq!(
        fixture.store.cached_order(root).unwrap(),
        strings(&["file3", "folder2", "file1", "file2", "folder1"])
    );

    fixture
        .store
        .update_metadata(ChangeKind::Remove, &file1, None, None)
        .await
        .unwrap();
    fixture
        .store
        .update_metadata(ChangeKind::Add, &file1, Some(0), None)
        .await
        .unwrap();
    let mut renamed = file1.clone();
    renamed.name = "file1-renamed".to_string();
    fixture
        .store
        .update_metadata(ChangeKind::Update, &renamed, Some(0), None)
        .await
        .unwrap();

    assert_eq!(
        fixture.metadata_on_disk(root),
        Some(strings(&["file1-renamed", "file3", "folder2", "file2", "folder1"]))
    );

    // removing a name that is not there changes nothing on disk
    let writes = fixture.fs.writes();
    fixture
        .store
        .update_metadata(ChangeKind::Remove, &file1, None, None)
        .await
        .unwrap();
    assert_eq!(fixture.fs.writes(), writes);
}

#[tokio::test]
async fn misuse_is_rejected_before_disk_access() {
    let fixture = Fixture::scenario();
    let tree = fixture.open_tree().await;
    let root_item = tree.get(tree.root_id()).unwrap().clone();
    let file1 = tree.get(&fixture.id("file1")).unwrap().clone();
    let writes = fixture.fs.writes();

    let err = fixture
        .store
        .update_metadata(ChangeKind::Add, &root_item, Some(0), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidOperation(_)));

    let err = fixture
        .store
        .update_metadata(ChangeKind::Swap, &file1, Some(0), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidOperation(_)));

    let err = fixture
        .store
        .update_metadata_lot(
            ChangeKind::Add,
            BatchTarget::Items(std::slice::from_ref(&file1)),
            &[0, 1],
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidOperation(_)));

    let err = fixture
        .store
        .update_metadata_lot(ChangeKind::Swap, BatchTarget::Parent(fixture.root()), &[0, 1], None)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidOperation(_)));

    let err = fixture
        .store
        .update_metadata_lot(ChangeKind::Remove, BatchTarget::Parent(fixture.root()), &[7], None)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidOperation(_)));

    assert_eq!(fixture.fs.writes(), writes);
}

#[tokio::test]
async fn compare_without_cached_record_matches_default() {
    let fixture = Fixture::scenario();
    let tree = fixture.open_tree().await;
    let root = fixture.root();
    fixture
        .store
        .update_metadata_lot(ChangeKind::Move, BatchTarget::Parent(root), &[4], Some(0))
        .await
        .unwrap();

    let children: Vec<FileItem> = tree
        .children(tree.root_id())
        .iter()
        .map(|id| tree.get(id).unwrap().clone())
        .collect();

    assert!(fixture.store.evict(root));
    for a in &children {
        for b in &children {
            assert_eq!(fixture.store.compare(a, b), default_compare(a, b));
        }
    }
    assert!(!fixture.store.is_cached(root));
}

#[tokio::test]
async fn compare_sorts_recorded_names_first() {
    let fixture = Fixture::scenario();
    let tree = fixture.open_tree().await;
    let file1 = tree.get(&fixture.id("file1")).unwrap().clone();
    let folder2 = tree.get(&fixture.id("folder2")).unwrap().clone();

    std::fs::write(fixture.path("aaa"), "late").unwrap();
    let stat = fixture
        .fs
        .stat(&fixture.path("aaa"), StatOptions::entry_only())
        .await
        .unwrap();
    let late = FileItem::from_stat(&stat, Some(tree.root_id().clone()));

    assert_eq!(fixture.store.compare(&folder2, &file1), std::cmp::Ordering::Less);
    // "aaa" would sort first by name; the recorded name wins
    assert_eq!(fixture.store.compare(&late, &file1), std::cmp::Ordering::Greater);
    assert_eq!(fixture.store.compare(&file1, &late), std::cmp::Ordering::Less);
}

#[tokio::test]
async fn sync_appends_new_names_and_is_idempotent() {
    let fixture = Fixture::scenario();
    let root = fixture.root();
    fixture
        .store
        .update_metadata_lot(ChangeKind::Move, BatchTarget::Parent(root), &[4], Some(0))
        .await
        .unwrap();

    std::fs::remove_file(fixture.path("file2")).unwrap();
    std::fs::write(fixture.path("b-new"), "b").unwrap();
    std::fs::write(fixture.path("a-new"), "a").unwrap();
    let actual = strings(&["a-new", "b-new", "file1", "file3", "folder1", "folder2"]);

    assert!(fixture
        .store
        .sync_metadata_in_cache_with_disk(root, &actual)
        .await
        .unwrap());
    let synced = strings(&["file3", "folder1", "folder2", "file1", "a-new", "b-new"]);
    assert_eq!(fixture.metadata_on_disk(root), Some(synced.clone()));

    let writes = fixture.fs.writes();
    assert!(!fixture
        .store
        .sync_metadata_in_cache_with_disk(root, &actual)
        .await
        .unwrap());
    assert_eq!(fixture.fs.writes(), writes);
    assert_eq!(fixture.store.cached_order(root), Some(synced));
}

#[tokio::test]
async fn malformed_metadata_fails_only_that_directory() {
    let fixture = Fixture::scenario();
    let root = fixture.root();
    let path = fixture.store.metadata_path(root);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "{ not an array").unwrap();

    let err = fixture.store.load_metadata(root).await.unwrap_err();
    assert!(matches!(err, ApiError::MetadataDecode { .. }));
    // the corrupt file is surfaced, not replaced
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not an array");

    let folder1 = fixture.store.load_metadata(&fixture.path("folder1")).await.unwrap();
    assert_eq!(folder1, strings(&["sub", "a.txt", "b.txt"]));
}

#[tokio::test]
async fn missing_directory_is_a_typed_error() {
    let fixture = Fixture::scenario();
    let err = fixture
        .store
        .load_metadata(&fixture.path("nowhere"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ApiError::StorageError(StorageError::NotFound(_))
    ));
}

#[tokio::test]
async fn directory_move_carries_metadata_with_descendants() {
    let fixture = Fixture::scenario();
    let folder1 = fixture.path("folder1");
    let sub = folder1.join("sub");
    std::fs::write(sub.join("z"), "z").unwrap();
    std::fs::write(sub.join("y"), "y").unwrap();

    fixture
        .store
        .update_metadata_lot(ChangeKind::Move, BatchTarget::Parent(&folder1), &[2], Some(0))
        .await
        .unwrap();
    fixture
        .store
        .update_metadata_lot(ChangeKind::Move, BatchTarget::Parent(&sub), &[1], Some(0))
        .await
        .unwrap();
    let folder1_order = fixture.metadata_on_disk(&folder1).unwrap();
    let sub_order = fixture.metadata_on_disk(&sub).unwrap();
    assert_eq!(sub_order, strings(&["z", "y"]));

    let destination = fixture.path("folder2").join("folder1");
    fixture.fs.move_to(&folder1, &destination, false).await.unwrap();
    let carried = fixture
        .store
        .update_directory_metadata(&folder1, &destination, true)
        .await
        .unwrap();

    assert_eq!(carried, 2);
    assert_eq!(fixture.metadata_on_disk(&destination), Some(folder1_order));
    assert_eq!(fixture.metadata_on_disk(&destination.join("sub")), Some(sub_order));
    assert!(!fixture.store.metadata_path(&folder1).exists());
    assert!(!fixture.store.metadata_path(&sub).exists());
    assert!(!fixture.store.is_cached(&folder1));
}

#[cfg(unix)]
#[tokio::test]
async fn directory_move_with_links_inside_carries_descendant_metadata() {
    let fixture = Fixture::scenario();
    let folder1 = fixture.path("folder1");
    let sub = folder1.join("sub");
    std::fs::write(sub.join("z"), "z").unwrap();
    std::fs::write(sub.join("y"), "y").unwrap();
    fixture
        .store
        .update_metadata_lot(ChangeKind::Move, BatchTarget::Parent(&sub), &[1], Some(0))
        .await
        .unwrap();
    fixture.store.load_metadata(&folder1).await.unwrap();
    std::os::unix::fs::symlink(&folder1, folder1.join("loop")).unwrap();
    std::os::unix::fs::symlink(folder1.join("gone"), folder1.join("dangling")).unwrap();

    let destination = fixture.path("folder2").join("folder1");
    fixture.fs.move_to(&folder1, &destination, false).await.unwrap();
    let carried = fixture
        .store
        .update_directory_metadata(&folder1, &destination, true)
        .await
        .unwrap();

    assert_eq!(carried, 2);
    assert_eq!(
        fixture.metadata_on_disk(&destination.join("sub")),
        Some(strings(&["z", "y"]))
    );
    assert!(!fixture.store.metadata_path(&sub).exists());
}

#[tokio::test]
async fn directory_copy_keeps_source_metadata() {
    let fixture = Fixture::scenario();
    let folder1 = fixture.path("folder1");
    fixture.store.load_metadata(&folder1).await.unwrap();

    let destination = fixture.path("folder2").join("copy");
    fixture.fs.copy_to(&folder1, &destination).await.unwrap();
    let carried = fixture
        .store
        .update_directory_metadata(&folder1, &destination, false)
        .await
        .unwrap();

    assert_eq!(carried, 1);
    assert_eq!(
        fixture.metadata_on_disk(&folder1),
        fixture.metadata_on_disk(&destination)
    );
}

#[tokio::test]
async fn directory_without_metadata_is_a_noop() {
    let fixture = Fixture::scenario();
    let destination = fixture.path("moved");
    fixture
        .fs
        .move_to(&fixture.path("folder2"), &destination, false)
        .await
        .unwrap();
    let carried = fixture
        .store
        .update_directory_metadata(&fixture.path("folder2"), &destination, true)
        .await
        .unwrap();
    assert_eq!(carried, 0);
    assert!(fixture.metadata_on_disk(&destination).is_none());
}

#[tokio::test]
async fn delete_directory_metadata_removes_file_and_cache() {
    let fixture = Fixture::scenario();
    let root = fixture.root();
    fixture.store.load_metadata(root).await.unwrap();

    assert!(fixture.store.delete_directory_metadata(root).await.unwrap());
    assert!(!fixture.store.is_cached(root));
    assert!(fixture.metadata_on_disk(root).is_none());
    assert!(!fixture.store.delete_directory_metadata(root).await.unwrap());
}

#[tokio::test]
async fn idle_records_are_evicted_and_access_postpones_eviction() {
    let fixture = Fixture::scenario();
    let root = fixture.root();
    fixture.store.load_metadata(root).await.unwrap();
    let tree = fixture.open_tree().await;
    let file1 = tree.get(&fixture.id("file1")).unwrap().clone();
    let file2 = tree.get(&fixture.id("file2")).unwrap().clone();

    tokio::time::pause();
    tokio::time::advance(Duration::from_secs(200)).await;
    settle().await;
    assert!(fixture.store.is_cached(root));

    // a comparison counts as an access
    fixture.store.compare(&file1, &file2);
    tokio::time::advance(Duration::from_secs(200)).await;
    settle().await;
    assert!(fixture.store.is_cached(root));

    tokio::time::advance(Duration::from_secs(101)).await;
    settle().await;
    assert!(!fixture.store.is_cached(root));
    // eviction never touches disk
    assert!(fixture.metadata_on_disk(root).is_some());
    assert_eq!(fixture.store.lock_count(), 0);
}

#[tokio::test]
async fn timed_eviction_releases_directory_locks() {
    let fixture = Fixture::empty();
    let mut directories = Vec::new();
    for i in 0..20 {
        let dir = fixture.path(&format!("dir{}", i));
        std::fs::create_dir(&dir).unwrap();
        fixture.store.load_metadata(&dir).await.unwrap();
        directories.push(dir);
    }
    assert_eq!(fixture.store.lock_count(), 20);

    tokio::time::pause();
    tokio::time::advance(Duration::from_secs(301)).await;
    settle().await;

    assert!(directories.iter().all(|d| !fixture.store.is_cached(d)));
    assert_eq!(fixture.store.lock_count(), 0);
}
