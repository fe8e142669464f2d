//! Contract conformance: the same CRUD, listing and cascade expectations
//! hold for every backend reachable without a network, driven through
//! `&dyn FileManager` like real callers do.

use warren_storage::FileManager;
use warren_storage::backend::{LocalBackend, MemoryBackend};
use warren_storage::error::ErrorKind;

async fn round_trip(backend: &dyn FileManager) {
    backend.write_text("/test.txt", "Hello, World!").await.unwrap();
    let listing = backend.list("/", false).await.unwrap();
    let files: Vec<_> = listing.iter().filter(|entry| entry.is_file()).collect();
    assert_eq!(files.len(), 1, "expected exactly one file in {listing:?}");
    assert_eq!(files[0].path(), "/test.txt");
    assert_eq!(backend.read_text("/test.txt").await.unwrap(), "Hello, World!");
}

async fn update_then_read(backend: &dyn FileManager) {
    backend.write_text("/test2.txt", "A").await.unwrap();
    backend.write_text("/test2.txt", "B").await.unwrap();
    assert_eq!(backend.read_text("/test2.txt").await.unwrap(), "B");
}

async fn delete_semantics(backend: &dyn FileManager) {
    backend.write_text("/test.txt", "Hello, World!").await.unwrap();
    backend.delete_file("/test.txt").await.unwrap();
    let listing = backend.list("/", false).await.unwrap();
    assert!(listing.iter().all(|entry| entry.path() != "/test.txt"));
    assert!(!backend.exists("/test.txt").await.unwrap());
    // A second delete must not corrupt state: the backend may answer
    // NotFound, but never Update.
    if let Err(err) = backend.delete_file("/test.txt").await {
        assert!(matches!(&*err, ErrorKind::NotFound(_)), "unexpected kind: {err}");
    }
}

async fn directory_cascade(backend: &dyn FileManager) {
    backend.create_dir("/tests/newDir").await.unwrap();
    backend.write_text("/tests/newDir/inner.txt", "x").await.unwrap();
    backend.delete_dir("/tests/newDir").await.unwrap();
    let listing = backend.list("/tests", true).await.unwrap();
    assert!(listing.is_empty(), "leftover entries: {listing:?}");
}

async fn exercise(backend: &dyn FileManager) {
    round_trip(backend).await;
    update_then_read(backend).await;
    delete_semantics(backend).await;
    directory_cascade(backend).await;
}

#[tokio::test]
async fn memory_backend_honours_the_contract() {
    exercise(&MemoryBackend::new("contract")).await;
}

#[tokio::test]
async fn local_backend_honours_the_contract() {
    let dir = tempfile::tempdir().unwrap();
    let backend = LocalBackend::new("contract", dir.path()).unwrap();
    exercise(&backend).await;
}
