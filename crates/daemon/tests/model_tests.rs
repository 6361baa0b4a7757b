//! End-to-end tests for the filesystem model against a scratch root.

mod common;

use common::{blob_count, bridge_create, bridge_read, bridge_write, model_at};
use tagfs_blobstore::BlobStore;
use tagfs_daemon::{FsModel, ModelError};
use tagfs_metadata::{SqliteStore, TagRepo};
use tempfile::tempdir;

#[tokio::test]
async fn create_write_and_read_back_survives_remount() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    let db_path = root.join("metadata").join("fs.db");

    {
        let mut model = model_at(root).await;
        model.create_folder("/a").await.unwrap();
        bridge_create(&mut model, "/a/b.txt").await;
        bridge_write(&model, "/a/b.txt", b"hello").await;

        assert_eq!(bridge_read(&model, "/a/b.txt").await, b"hello");
        assert_eq!(blob_count(root), 1);

        model.metadata().save(&db_path).await.unwrap();
    }

    // Remount: fresh store from the backing file, same blobs.
    let meta = SqliteStore::open(&db_path).await.unwrap();
    let blobs = BlobStore::new(root).await.unwrap();
    let model = FsModel::new(meta, blobs).await.unwrap();

    assert_eq!(bridge_read(&model, "/a/b.txt").await, b"hello");
    assert_eq!(blob_count(root), 1);
}

#[tokio::test]
async fn identical_content_shares_one_blob_until_truncate_diverges() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    let mut model = model_at(root).await;

    bridge_create(&mut model, "/a.txt").await;
    bridge_write(&model, "/a.txt", b"hi").await;
    bridge_create(&mut model, "/b.txt").await;
    bridge_write(&model, "/b.txt", b"hi").await;

    assert_eq!(blob_count(root), 1);

    model.truncate_file(1, "/a.txt").await.unwrap();

    assert_eq!(blob_count(root), 2);
    assert_eq!(bridge_read(&model, "/a.txt").await, b"h");
    assert_eq!(bridge_read(&model, "/b.txt").await, b"hi");
}

#[tokio::test]
async fn truncate_of_sole_reference_rehashes_in_place() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    let mut model = model_at(root).await;

    bridge_create(&mut model, "/solo.txt").await;
    bridge_write(&model, "/solo.txt", b"abcdef").await;

    model.truncate_file(3, "/solo.txt").await.unwrap();
    assert_eq!(bridge_read(&model, "/solo.txt").await, b"abc");
    assert_eq!(blob_count(root), 1);

    // A missing file cannot be truncated.
    assert!(matches!(
        model.truncate_file(10, "/missing.txt").await,
        Err(ModelError::NotFound(_))
    ));
}

#[tokio::test]
async fn release_without_changes_keeps_the_blob() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    let mut model = model_at(root).await;

    bridge_create(&mut model, "/same.txt").await;
    bridge_write(&model, "/same.txt", b"stable").await;
    let before = model.file_path("/same.txt").await.unwrap().unwrap();

    // A write window that produced identical bytes.
    bridge_write(&model, "/same.txt", b"stable").await;
    let after = model.file_path("/same.txt").await.unwrap().unwrap();

    assert_eq!(before, after);
    assert_eq!(blob_count(root), 1);
}

#[tokio::test]
async fn folder_create_list_delete() {
    let temp = tempdir().unwrap();
    let mut model = model_at(temp.path()).await;

    model.create_folder("/docs").await.unwrap();
    model.create_folder("/docs/work").await.unwrap();
    bridge_create(&mut model, "/docs/note.txt").await;

    assert!(matches!(
        model.create_folder("/docs").await,
        Err(ModelError::Exists(_))
    ));
    // A file name blocks a folder of the same name too.
    assert!(matches!(
        model.create_folder("/docs/note.txt").await,
        Err(ModelError::Exists(_))
    ));
    assert!(matches!(
        model.create_folder("/missing/sub").await,
        Err(ModelError::NotFound(_))
    ));

    let contents = model.list_folder("/docs").await.unwrap();
    assert_eq!(contents, vec!["work", "note.txt"]);

    assert!(matches!(
        model.delete_folder("/docs").await,
        Err(ModelError::NotEmpty(_))
    ));
    model.delete_file("/docs/note.txt").await.unwrap();
    model.delete_folder("/docs/work").await.unwrap();
    model.delete_folder("/docs").await.unwrap();
    assert!(!model.folder_exists("/docs").await.unwrap());
}

#[tokio::test]
async fn delete_file_drops_last_blob_and_tag_references() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    let mut model = model_at(root).await;

    bridge_create(&mut model, "/x").await;
    bridge_write(&model, "/x", b"xx").await;
    model.tag_files("/x", "red").await.unwrap();

    let removed_from = model.delete_file("/x").await.unwrap();
    assert_eq!(removed_from.len(), 1);
    assert_eq!(blob_count(root), 0);

    let red = model.metadata().tag_id_by_name("red").await.unwrap().unwrap();
    assert!(model.metadata().tagged_file_ids(red).await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_file_keeps_shared_blob() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    let mut model = model_at(root).await;

    bridge_create(&mut model, "/a").await;
    bridge_write(&model, "/a", b"shared").await;
    bridge_create(&mut model, "/b").await;
    bridge_write(&model, "/b", b"shared").await;

    model.delete_file("/a").await.unwrap();
    assert_eq!(blob_count(root), 1);
    assert_eq!(bridge_read(&model, "/b").await, b"shared");
}

#[tokio::test]
async fn rename_replacing_a_file_preserves_its_tags() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    let mut model = model_at(root).await;

    bridge_create(&mut model, "/old.txt").await;
    bridge_write(&model, "/old.txt", b"one").await;
    bridge_create(&mut model, "/new.txt").await;
    bridge_write(&model, "/new.txt", b"two").await;
    model.tag_files("/old.txt", "keep").await.unwrap();
    model.tag_files("/new.txt", "carry").await.unwrap();

    model.rename_path("/old.txt", "/new.txt").await.unwrap();

    // The renamed file now carries its own tag plus the replaced file's.
    let mut tags = model.file_tags_for_path("/new.txt").await.unwrap();
    tags.sort();
    assert_eq!(tags, vec!["carry", "keep"]);

    // The replaced file's blob went with it.
    assert_eq!(bridge_read(&model, "/new.txt").await, b"one");
    assert_eq!(blob_count(root), 1);
    assert!(model.file_path("/old.txt").await.unwrap().is_none());
}

#[tokio::test]
async fn rename_rejects_collision_with_co_tagged_filename() {
    let temp = tempdir().unwrap();
    let mut model = model_at(temp.path()).await;

    bridge_create(&mut model, "/x").await;
    bridge_write(&model, "/x", b"1").await;
    bridge_create(&mut model, "/y").await;
    bridge_write(&model, "/y", b"2").await;
    model.tag_files("/x", "shared").await.unwrap();
    model.tag_files("/y", "shared").await.unwrap();

    // Renaming y to x would leave two files named "x" under one tag.
    assert!(matches!(
        model.rename_path("/y", "/x").await,
        Err(ModelError::Exists(_))
    ));
    // Moving the tagged file elsewhere under its own name stays legal.
    model.create_folder("/sub").await.unwrap();
    model.rename_path("/y", "/sub/y").await.unwrap();
    assert!(model.file_path("/sub/y").await.unwrap().is_some());
}

#[tokio::test]
async fn rename_moves_folders_but_not_onto_existing_entries() {
    let temp = tempdir().unwrap();
    let mut model = model_at(temp.path()).await;

    model.create_folder("/from").await.unwrap();
    model.create_folder("/dest").await.unwrap();
    bridge_create(&mut model, "/file").await;

    model.rename_path("/from", "/dest/renamed").await.unwrap();
    assert!(model.folder_exists("/dest/renamed").await.unwrap());
    assert!(!model.folder_exists("/from").await.unwrap());

    assert!(matches!(
        model.rename_path("/dest/renamed", "/dest").await,
        Err(ModelError::Exists(_))
    ));
    assert!(matches!(
        model.rename_path("/dest/renamed", "/file").await,
        Err(ModelError::Exists(_))
    ));
    assert!(matches!(
        model.rename_path("/ghost", "/elsewhere").await,
        Err(ModelError::NotFound(_))
    ));
}

#[tokio::test]
async fn tagging_and_search_strict_vs_any() {
    let temp = tempdir().unwrap();
    let mut model = model_at(temp.path()).await;

    for (path, contents) in [("/x", "1"), ("/y", "2"), ("/z", "3")] {
        bridge_create(&mut model, path).await;
        bridge_write(&model, path, contents.as_bytes()).await;
    }
    model.tag_files("/x", "R").await.unwrap();
    model.tag_files("/y", "R").await.unwrap();
    model.tag_files("/y", "G").await.unwrap();
    model.tag_files("/z", "G").await.unwrap();

    let tags = vec!["R".to_string(), "G".to_string()];
    let mut any = model.search_by_tags(&tags, false).await.unwrap();
    any.sort();
    assert_eq!(any, vec!["x", "y", "z"]);

    let strict = model.search_by_tags(&tags, true).await.unwrap();
    assert_eq!(strict, vec!["y"]);

    // Order never matters.
    let reversed = vec!["G".to_string(), "R".to_string()];
    assert_eq!(model.search_by_tags(&reversed, true).await.unwrap(), strict);
    let mut any_reversed = model.search_by_tags(&reversed, false).await.unwrap();
    any_reversed.sort();
    assert_eq!(any_reversed, any);

    // An unknown tag empties the result.
    let unknown = vec!["R".to_string(), "missing".to_string()];
    assert!(model.search_by_tags(&unknown, false).await.unwrap().is_empty());
}

#[tokio::test]
async fn tagging_a_folder_sweeps_its_files_and_accumulates_conflicts() {
    let temp = tempdir().unwrap();
    let mut model = model_at(temp.path()).await;

    model.create_folder("/dir").await.unwrap();
    bridge_create(&mut model, "/dir/a").await;
    bridge_create(&mut model, "/dir/b").await;
    bridge_create(&mut model, "/other").await;
    // Another file also named "a", tagged first: the sweep conflicts on it.
    model.create_folder("/dup").await.unwrap();
    bridge_create(&mut model, "/dup/a").await;
    model.tag_files("/dup/a", "bulk").await.unwrap();

    let result = model.tag_files("/dir", "bulk").await;
    assert!(matches!(result, Err(ModelError::Exists(_))));

    // The non-conflicting file still got tagged during the sweep.
    let tags = model.file_tags_for_path("/dir/b").await.unwrap();
    assert_eq!(tags, vec!["bulk"]);
}

#[tokio::test]
async fn untag_requires_the_tag_to_be_present() {
    let temp = tempdir().unwrap();
    let mut model = model_at(temp.path()).await;

    bridge_create(&mut model, "/x").await;
    model.tag_files("/x", "R").await.unwrap();

    assert!(matches!(
        model.untag_files("/x", "missing").await,
        Err(ModelError::NotFound(_))
    ));
    model.untag_files("/x", "R").await.unwrap();
    assert!(matches!(
        model.untag_files("/x", "R").await,
        Err(ModelError::NotFound(_))
    ));
}

#[tokio::test]
async fn nest_rejects_cycles_and_leaves_the_graph_unchanged() {
    let temp = tempdir().unwrap();
    let model = model_at(temp.path()).await;

    for tag in ["A", "B", "C"] {
        model.create_tag(tag).await.unwrap();
    }
    model.nest_tag("B", "A").await.unwrap();
    model.nest_tag("C", "B").await.unwrap();

    assert!(matches!(
        model.nest_tag("A", "C").await,
        Err(ModelError::Cycle { .. })
    ));
    // Self-nesting is a cycle of length one.
    assert!(matches!(
        model.nest_tag("A", "A").await,
        Err(ModelError::Cycle { .. })
    ));

    // The rejected edge left no trace on either side.
    let meta = model.metadata();
    let a = meta.tag_id_by_name("A").await.unwrap().unwrap();
    let c = meta.tag_id_by_name("C").await.unwrap().unwrap();
    assert!(!meta.child_ids(c).await.unwrap().contains(&a));
    assert!(!meta.parent_ids(a).await.unwrap().contains(&c));
}

#[tokio::test]
async fn nesting_keeps_both_sides_of_the_index_in_step() {
    let temp = tempdir().unwrap();
    let model = model_at(temp.path()).await;

    model.create_tag("outer").await.unwrap();
    model.create_tag("inner").await.unwrap();
    model.nest_tag("inner", "outer").await.unwrap();

    let meta = model.metadata();
    let outer = meta.tag_id_by_name("outer").await.unwrap().unwrap();
    let inner = meta.tag_id_by_name("inner").await.unwrap().unwrap();
    assert!(meta.child_ids(outer).await.unwrap().contains(&inner));
    assert!(meta.parent_ids(inner).await.unwrap().contains(&outer));

    assert!(matches!(
        model.nest_tag("inner", "outer").await,
        Err(ModelError::Exists(_))
    ));

    model.unnest_tag("inner", "outer").await.unwrap();
    assert!(!meta.child_ids(outer).await.unwrap().contains(&inner));
    assert!(!meta.parent_ids(inner).await.unwrap().contains(&outer));
    assert!(matches!(
        model.unnest_tag("inner", "outer").await,
        Err(ModelError::NotFound(_))
    ));
}

#[tokio::test]
async fn delete_tag_guard() {
    let temp = tempdir().unwrap();
    let mut model = model_at(temp.path()).await;

    bridge_create(&mut model, "/x").await;
    model.tag_files("/x", "R").await.unwrap();

    assert!(matches!(
        model.delete_tag("R").await,
        Err(ModelError::NotEmpty(_))
    ));
    model.untag_files("/x", "R").await.unwrap();
    model.delete_tag("R").await.unwrap();
    assert!(!model.tag_exists("R").await.unwrap());
    assert!(matches!(
        model.delete_tag("R").await,
        Err(ModelError::NotFound(_))
    ));
}

#[tokio::test]
async fn delete_tag_refuses_one_with_children() {
    let temp = tempdir().unwrap();
    let model = model_at(temp.path()).await;

    model.create_tag("parent").await.unwrap();
    model.create_tag("child").await.unwrap();
    model.nest_tag("child", "parent").await.unwrap();

    assert!(matches!(
        model.delete_tag("parent").await,
        Err(ModelError::NotEmpty(_))
    ));
    model.delete_tag("child").await.unwrap();
    model.delete_tag("parent").await.unwrap();
}

#[tokio::test]
async fn tag_view_paths_resolve_through_any_ancestor_chain() {
    let temp = tempdir().unwrap();
    let model = model_at(temp.path()).await;

    model.create_tag("A").await.unwrap();
    model.create_tag("B").await.unwrap();
    model.create_tag("C").await.unwrap();
    model.nest_tag("B", "A").await.unwrap();
    model.nest_tag("C", "B").await.unwrap();

    assert!(model.tag_exists("/A/B/C").await.unwrap());
    // Partial and reordered ancestor chains denote the same tag.
    assert!(model.tag_exists("/A/C").await.unwrap());
    assert!(model.tag_exists("/B/A/C").await.unwrap());
    assert!(!model.tag_exists("/C/B").await.unwrap());
    assert!(!model.tag_exists("/X/C").await.unwrap());
    assert!(model.tag_exists("/").await.unwrap());
}

#[tokio::test]
async fn tag_view_listing_and_file_paths() {
    let temp = tempdir().unwrap();
    let mut model = model_at(temp.path()).await;

    bridge_create(&mut model, "/x").await;
    bridge_write(&model, "/x", b"data").await;
    model.create_tag("R").await.unwrap();
    model.create_tag("S").await.unwrap();
    model.nest_tag("S", "R").await.unwrap();
    model.tag_files("/x", "R").await.unwrap();

    let mut roots = model.list_tag_children("/").await.unwrap();
    roots.sort();
    assert_eq!(roots, vec!["R", "S"]);

    assert_eq!(model.list_tag_children("/R").await.unwrap(), vec!["S", "x"]);

    let blob = model.tagged_file_path("/R/x").await.unwrap().unwrap();
    assert_eq!(tokio::fs::read(blob).await.unwrap(), b"data");
    assert!(model.tagged_file_path("/R/ghost").await.unwrap().is_none());
}

#[tokio::test]
async fn tag_view_rename_moves_files_between_tags() {
    let temp = tempdir().unwrap();
    let mut model = model_at(temp.path()).await;

    bridge_create(&mut model, "/x").await;
    model.create_tag("R").await.unwrap();
    model.create_tag("G").await.unwrap();
    model.tag_files("/x", "R").await.unwrap();

    model.rename_tagged_path("/R/x", "/G/x").await.unwrap();
    assert_eq!(model.file_tags_for_path("/x").await.unwrap(), vec!["G"]);

    // A different leaf name is not a move between tags.
    assert!(model.rename_tagged_path("/G/x", "/R/y").await.is_err());
    assert_eq!(model.file_tags_for_path("/x").await.unwrap(), vec!["G"]);
}

#[tokio::test]
async fn tag_view_rename_renames_and_moves_tags() {
    let temp = tempdir().unwrap();
    let model = model_at(temp.path()).await;

    model.create_tag("old").await.unwrap();
    model.rename_tagged_path("/old", "/new").await.unwrap();
    assert!(model.tag_exists("new").await.unwrap());
    assert!(!model.tag_exists("old").await.unwrap());

    model.create_tag("parent").await.unwrap();
    model.rename_tagged_path("/new", "/parent/new").await.unwrap();
    let meta = model.metadata();
    let new = meta.tag_id_by_name("new").await.unwrap().unwrap();
    let parent = meta.tag_id_by_name("parent").await.unwrap().unwrap();
    assert!(meta.child_ids(parent).await.unwrap().contains(&new));
}

#[tokio::test]
async fn tag_view_unlink_untags_instead_of_deleting() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    let mut model = model_at(root).await;

    bridge_create(&mut model, "/x").await;
    bridge_write(&model, "/x", b"kept").await;
    model.tag_files("/x", "R").await.unwrap();

    model.untag_by_tag_path("/R/x").await.unwrap();
    assert!(model.file_tags_for_path("/x").await.unwrap().is_empty());
    // The file and its blob survive.
    assert_eq!(bridge_read(&model, "/x").await, b"kept");
    assert!(matches!(
        model.untag_by_tag_path("/R/x").await,
        Err(ModelError::NotFound(_))
    ));
}

#[tokio::test]
async fn placeholder_counter_survives_remount() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    let db_path = root.join("metadata").join("fs.db");

    let first = {
        let mut model = model_at(root).await;
        // Created but never written: stays a placeholder row.
        let path = bridge_create(&mut model, "/pending").await;
        model.metadata().save(&db_path).await.unwrap();
        path
    };

    let meta = SqliteStore::open(&db_path).await.unwrap();
    let blobs = BlobStore::new(root).await.unwrap();
    let mut model = FsModel::new(meta, blobs).await.unwrap();

    let second = bridge_create(&mut model, "/next").await;
    assert_ne!(first, second);
}

#[tokio::test]
async fn create_file_rejects_conflicts_and_missing_parents() {
    let temp = tempdir().unwrap();
    let mut model = model_at(temp.path()).await;

    bridge_create(&mut model, "/taken").await;
    assert!(matches!(
        model.create_file("/taken").await,
        Err(ModelError::Exists(_))
    ));
    model.create_folder("/dir").await.unwrap();
    assert!(matches!(
        model.create_file("/dir").await,
        Err(ModelError::Exists(_))
    ));
    assert!(matches!(
        model.create_file("/nowhere/file").await,
        Err(ModelError::NotFound(_))
    ));
}

#[tokio::test]
async fn get_tags_for_unknown_path_fails() {
    let temp = tempdir().unwrap();
    let model = model_at(temp.path()).await;

    assert!(matches!(
        model.file_tags_for_path("/missing").await,
        Err(ModelError::NotFound(_))
    ));
}
