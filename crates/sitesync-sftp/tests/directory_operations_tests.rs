//! Directory operation tests
//!
//! Directory creation (single and recursive) and deletion (single and
//! recursive, including partial failures).

mod common;

use common::{SITE, harness};
use sitesync_core::ErrorKind;

/// Recursive mkdir attempts every segment, root to leaf
#[tokio::test]
async fn test_create_directory_recursive_segments() {
    let h = harness();

    h.executor.create_directory(SITE, "/a/b/c", true).await.unwrap();

    assert_eq!(h.server.mkdir_calls(), vec!["/a", "/a/b", "/a/b/c"]);
    assert!(h.server.exists("/a/b/c"));
    assert_eq!(h.recorder.last().detail, "Created 3 directories");
}

#[tokio::test]
async fn test_create_directory_recursive_with_existing_prefix() {
    let h = harness();
    h.server.add_dir("/a");

    h.executor.create_directory(SITE, "/a/b/c", true).await.unwrap();

    assert_eq!(h.server.mkdir_calls(), vec!["/a", "/a/b", "/a/b/c"]);
    assert!(h.server.exists("/a/b/c"));
    assert_eq!(h.recorder.last().detail, "Created 2 directories");
}

/// A second recursive mkdir of the same path succeeds
#[tokio::test]
async fn test_create_directory_recursive_is_idempotent() {
    let h = harness();

    h.executor.create_directory(SITE, "/x/y", true).await.unwrap();
    h.executor.create_directory(SITE, "/x/y", true).await.unwrap();

    let records = h.recorder.records();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.success));
    assert_eq!(records[1].detail, "Created 0 directories");
}

#[tokio::test]
async fn test_create_directory_recursive_through_file() {
    let h = harness();
    h.server.add_file("/a/b", b"not a directory");

    let err = h
        .executor
        .create_directory(SITE, "/a/b/c", true)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    assert!(!h.server.exists("/a/b/c"));
}

#[tokio::test]
async fn test_create_directory_single() {
    let h = harness();
    h.server.add_dir("/www");

    h.executor.create_directory(SITE, "/www/assets", false).await.unwrap();

    assert!(h.server.exists("/www/assets"));
    assert_eq!(h.server.mkdir_calls(), vec!["/www/assets"]);
    assert_eq!(h.server.mode("/www/assets"), Some(0o755));
}

#[tokio::test]
async fn test_create_directory_existing_leaf() {
    let h = harness();
    h.server.add_dir("/www");

    let err = h
        .executor
        .create_directory(SITE, "/www", false)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
}

#[tokio::test]
async fn test_create_directory_missing_parent() {
    let h = harness();

    let err = h
        .executor
        .create_directory(SITE, "/no/parent", false)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(!h.server.exists("/no"));
}

#[tokio::test]
async fn test_delete_missing_path() {
    let h = harness();

    let err = h
        .executor
        .delete_file(SITE, "/missing", false)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let record = h.recorder.last();
    assert!(!record.success);
    assert_eq!(record.path, "/missing");
}

#[tokio::test]
async fn test_delete_file() {
    let h = harness();
    h.server.add_file("/tmp/upload.part", b"partial");

    h.executor
        .delete_file(SITE, "/tmp/upload.part", false)
        .await
        .unwrap();
    assert!(!h.server.exists("/tmp/upload.part"));
    assert!(h.server.exists("/tmp"));
}

#[tokio::test]
async fn test_delete_empty_directory() {
    let h = harness();
    h.server.add_dir("/empty");

    h.executor.delete_file(SITE, "/empty", false).await.unwrap();
    assert!(!h.server.exists("/empty"));
}

/// Without `recursive`, a non-empty directory is left untouched
#[tokio::test]
async fn test_delete_non_empty_directory_requires_recursive() {
    let h = harness();
    h.server.add_file("/full/a.txt", b"a");

    let err = h.executor.delete_file(SITE, "/full", false).await;
    assert!(err.is_err());
    assert!(h.server.exists("/full/a.txt"));
    assert!(!h.recorder.last().success);
}

/// Nothing under the deleted path stays reachable
#[tokio::test]
async fn test_delete_recursive_removes_everything() {
    let h = harness();
    h.server.add_file("/site/index.html", b"i");
    h.server.add_file("/site/css/main.css", b"c");
    h.server.add_file("/site/js/vendor/lib.js", b"l");
    h.server.add_dir("/site/empty");
    h.server.add_file("/sibling.txt", b"s");

    h.executor.delete_file(SITE, "/site", true).await.unwrap();

    assert!(!h.server.exists("/site"));
    assert!(h.server.paths_under("/site").is_empty());

    let entries = h.executor.list_files(SITE, "/").await.unwrap();
    let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["sibling.txt"]);

    // 3 files and 5 directories (css, js, vendor, empty, site)
    let delete_record = &h.recorder.records()[0];
    assert_eq!(delete_record.detail, "Removed 8 entries");
}

/// Deep trees are walked without recursion limits
#[tokio::test]
async fn test_delete_recursive_deep_tree() {
    let h = harness();
    let deep: String = (0..200).map(|i| format!("/d{i}")).collect();
    h.server.add_file(&format!("{deep}/leaf.txt"), b"leaf");

    h.executor.delete_file(SITE, "/d0", true).await.unwrap();
    assert!(!h.server.exists("/d0"));
    assert!(h.server.paths_under("/d0").is_empty());
}

/// Symlinks inside the tree are removed, their targets are not
#[tokio::test]
async fn test_delete_recursive_does_not_follow_symlinks() {
    let h = harness();
    h.server.add_file("/keep/data.txt", b"keep me");
    h.server.add_dir("/tree");
    h.server.add_symlink("/tree/link", "/keep");

    h.executor.delete_file(SITE, "/tree", true).await.unwrap();

    assert!(!h.server.exists("/tree"));
    assert_eq!(h.server.file("/keep/data.txt").unwrap(), b"keep me");
}

/// A recursive delete that fails part way keeps completed removals and
/// reports them
#[tokio::test]
async fn test_delete_recursive_partial_failure() {
    let h = harness();
    h.server.add_file("/t/a.txt", b"a");
    h.server.add_file("/t/b.txt", b"b");
    h.server.add_file("/t/z/c.txt", b"c");
    h.server.state().denied.insert("/t/z/c.txt".into());

    let err = h.executor.delete_file(SITE, "/t", true).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    assert!(
        err.to_string()
            .contains("recursive delete stopped after removing 2 entries"),
        "{err}"
    );
    assert!(!h.server.exists("/t/a.txt"));
    assert!(!h.server.exists("/t/b.txt"));
    assert!(h.server.exists("/t/z/c.txt"));

    let record = h.recorder.last();
    assert!(!record.success);
    assert!(record.detail.contains("removing 2 entries"));
}

#[tokio::test]
async fn test_delete_root_is_refused() {
    let h = harness();
    h.server.add_file("/important.txt", b"!");

    for path in ["/", "//", "/."] {
        let err = h.executor.delete_file(SITE, path, true).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
    assert!(h.server.exists("/important.txt"));
}
