//! In-memory storage backend.
//!
//! A flat key-value store: every entry is keyed by its canonical path, and
//! a "directory" is just a marker key with a trailing slash holding empty
//! content. Useful on its own for scratch space and as the
//! no-dependencies backend in tests.

use crate::FileManager;
use crate::backend::ResourceStream;
use crate::error::{ErrorKind, Result};
use crate::resource::{ResourceInfo, ResourceKind};
use async_stream::stream;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Flat in-memory storage backend.
///
/// Entries live in a `BTreeMap` behind a [`RwLock`], so all trait methods
/// operate on `&self` and listings come back sorted by path. Contents are
/// lost when the backend is dropped.
///
/// # Examples
///
/// ```
/// use warren_storage::FileManager;
/// use warren_storage::backend::MemoryBackend;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MemoryBackend::with_files([("/works/123.html", "<html>...</html>")]);
/// assert!(backend.exists("/works/123.html").await?);
/// # Ok(())
/// # }
/// ```
pub struct MemoryBackend {
    name: String,
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryBackend {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Create a backend pre-populated with files.
    ///
    /// Panics on an invalid path. This constructor is meant for test
    /// setup; if the setup is wrong, the test should not pass.
    pub fn with_files(files: impl IntoIterator<Item = (impl AsRef<str>, impl Into<Vec<u8>>)>) -> Self {
        let mut entries = BTreeMap::new();
        for (path, data) in files {
            let Ok(file) = ResourceInfo::file(path.as_ref()) else {
                panic!("MemoryBackend::with_files: invalid path {:?}", path.as_ref());
            };
            record(&mut entries, &file, data.into());
        }
        Self {
            name: "memory".to_string(),
            entries: RwLock::new(entries),
        }
    }
}

/// Insert an entry plus marker keys for every missing ancestor directory,
/// so listings see the containing folders too.
fn record(entries: &mut BTreeMap<String, Vec<u8>>, info: &ResourceInfo, data: Vec<u8>) {
    entries.insert(info.path().to_string(), data);
    let mut ancestor = info.parent();
    while let Some(dir) = ancestor {
        if dir.path() == "/" {
            break;
        }
        entries.entry(dir.path().to_string()).or_default();
        ancestor = dir.parent();
    }
}

#[async_trait]
impl FileManager for MemoryBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let file = ResourceInfo::file(path)?;
        let entries = self.entries.read().await;
        entries.get(file.path()).cloned().ok_or_else(|| exn::Exn::from(ErrorKind::not_found(file.path())))
    }

    async fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        let file = ResourceInfo::file(path)?;
        tracing::debug!(path = %file, bytes = data.len(), "storing entry");
        let mut entries = self.entries.write().await;
        record(&mut entries, &file, data.to_vec());
        Ok(())
    }

    async fn delete_file(&self, path: &str) -> Result<()> {
        let file = ResourceInfo::file(path)?;
        tracing::debug!(path = %file, "removing entry");
        let mut entries = self.entries.write().await;
        entries.remove(file.path()).map(|_| ()).ok_or_else(|| exn::Exn::from(ErrorKind::not_found(file.path())))
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let info = ResourceInfo::new(path)?;
        if info.path() == "/" {
            return Ok(true);
        }
        Ok(self.entries.read().await.contains_key(info.path()))
    }

    fn list_stream<'a>(&'a self, dir: &'a str, recursive: bool) -> ResourceStream<'a> {
        Box::pin(stream! {
            let dir = match ResourceInfo::directory(dir) {
                Ok(dir) => dir,
                Err(e) => {
                    yield Err(e);
                    return;
                },
            };
            let prefix = dir.path().to_string();
            // Snapshot matching keys under the read lock, then drop it
            // before yielding so the lock is never held across a yield
            // point.
            let matched: Vec<(String, ResourceKind)> = {
                let entries = self.entries.read().await;
                entries
                    .keys()
                    .filter(|key| key.starts_with(&prefix) && key.as_str() != prefix)
                    .filter(|key| {
                        if recursive {
                            return true;
                        }
                        // Immediate children only: nothing left after the
                        // prefix but the leaf (plus a marker's own slash).
                        let rest = &key[prefix.len()..];
                        !rest.trim_end_matches('/').contains('/')
                    })
                    .map(|key| {
                        let kind = if key.ends_with('/') { ResourceKind::Directory } else { ResourceKind::File };
                        (key.clone(), kind)
                    })
                    .collect()
            };
            for (key, kind) in matched {
                yield ResourceInfo::resolve(&key, Some(kind), None);
            }
        })
    }

    async fn create_dir(&self, path: &str) -> Result<()> {
        let dir = ResourceInfo::directory(path)?;
        tracing::debug!(path = %dir, "creating directory markers");
        let mut entries = self.entries.write().await;
        let mut node = Some(dir);
        while let Some(current) = node {
            if current.path() == "/" {
                break;
            }
            entries.entry(current.path().to_string()).or_default();
            node = current.parent();
        }
        Ok(())
    }

    async fn delete_dir(&self, path: &str) -> Result<()> {
        let dir = ResourceInfo::directory(path)?;
        tracing::debug!(path = %dir, "removing subtree");
        let mut entries = self.entries.write().await;
        entries.retain(|key, _| !key.starts_with(dir.path()));
        Ok(())
    }
}
