//! Local filesystem storage backend.
//!
//! Canonical paths are joined onto a configured root directory and served
//! with standard filesystem operations via `tokio::fs`.

use crate::FileManager;
use crate::backend::ResourceStream;
use crate::error::{ErrorKind, Result};
use crate::resource::{ResourceInfo, ResourceKind};
use async_stream::stream;
use async_trait::async_trait;
use exn::ResultExt;
use std::collections::VecDeque;
use std::fs::create_dir_all as sync_create_dir;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

/// Local filesystem storage backend.
///
/// Stores files in a directory on the local filesystem. All canonical
/// paths are resolved relative to the configured root directory; `..`
/// components are resolved against the root and can never climb out of it.
///
/// # Examples
///
/// ```no_run
/// use warren_storage::backend::LocalBackend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = LocalBackend::new("disk", "/var/lib/warren")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LocalBackend {
    name: String,
    /// Root directory all canonical paths resolve under
    root: PathBuf,
}

impl LocalBackend {
    /// Create a new local filesystem backend rooted at `root`.
    ///
    /// The root must be an absolute path; it is created when missing.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::Connection(format!("local root must be absolute: {}", root.display())));
        }
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::Connection(format!("local root is not a directory: {}", root.display())));
            }
        } else {
            // Non-async on purpose; this happens once at construction and
            // isn't worth an async constructor.
            sync_create_dir(&root)
                .map_err(|e| ErrorKind::Connection(format!("cannot create local root {}: {e}", root.display())))?;
        }
        Ok(Self { name: name.into(), root })
    }

    /// Resolve a canonical path onto the disk, confined to the root.
    ///
    /// `.` and `..` components are resolved here; a path that would climb
    /// above the root cannot address anything, so it is a `NotFound`.
    fn disk_path(&self, info: &ResourceInfo) -> Result<PathBuf> {
        let mut parts = Vec::new();
        for component in Path::new(info.path().trim_start_matches('/')).components() {
            match component {
                Component::Normal(segment) => parts.push(segment),
                Component::CurDir | Component::RootDir => {},
                Component::Prefix(_) => exn::bail!(ErrorKind::not_found(info.path())),
                Component::ParentDir => {
                    if parts.pop().is_none() {
                        exn::bail!(ErrorKind::not_found(info.path()));
                    }
                },
            }
        }
        Ok(self.root.join(parts.into_iter().collect::<PathBuf>()))
    }

    /// Wrap a native directory entry back into the canonical vocabulary.
    fn entry_info(&self, absolute: &Path, kind: ResourceKind) -> Result<ResourceInfo> {
        let relative = absolute
            .strip_prefix(&self.root)
            .or_raise(|| ErrorKind::update(absolute.to_string_lossy().into_owned(), "entry escaped the storage root"))?;
        ResourceInfo::resolve(&relative.to_string_lossy(), Some(kind), None)
    }
}

fn map_io_error(err: std::io::Error, path: &str) -> ErrorKind {
    match err.kind() {
        std::io::ErrorKind::NotFound => ErrorKind::not_found(path),
        _ => ErrorKind::update(path, err),
    }
}

#[async_trait]
impl FileManager for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let file = ResourceInfo::file(path)?;
        let disk = self.disk_path(&file)?;
        Ok(fs::read(&disk).await.map_err(|e| map_io_error(e, file.path()))?)
    }

    async fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        let file = ResourceInfo::file(path)?;
        let disk = self.disk_path(&file)?;
        // Create missing ancestors so writes behave the same as on the
        // flat-keyed backends.
        if let Some(parent) = disk.parent() {
            fs::create_dir_all(parent).await.map_err(|e| ErrorKind::update(file.path(), e))?;
        }
        tracing::debug!(path = %file, bytes = data.len(), "writing file");
        Ok(fs::write(&disk, data).await.map_err(|e| ErrorKind::update(file.path(), e))?)
    }

    async fn delete_file(&self, path: &str) -> Result<()> {
        let file = ResourceInfo::file(path)?;
        let disk = self.disk_path(&file)?;
        tracing::debug!(path = %file, "deleting file");
        Ok(fs::remove_file(&disk).await.map_err(|e| map_io_error(e, file.path()))?)
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let info = ResourceInfo::new(path)?;
        let disk = self.disk_path(&info)?;
        Ok(fs::try_exists(&disk).await.map_err(|e| map_io_error(e, info.path()))?)
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
            let start = match self.disk_path(&dir) {
                Ok(start) => start,
                Err(e) => {
                    yield Err(e);
                    return;
                },
            };
            let mut queue = VecDeque::from([start]);
            let mut top_level = true;
            while let Some(current) = queue.pop_front() {
                let mut entries = match fs::read_dir(&current).await {
                    Ok(entries) => entries,
                    // A subdirectory that vanished between discovery and
                    // descent is dropped; a missing listing root is the
                    // caller's problem.
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound && !top_level => continue,
                    Err(err) => {
                        yield Err(exn::Exn::from(map_io_error(err, dir.path())));
                        continue;
                    },
                };
                top_level = false;
                let mut subdirs = Vec::new();
                loop {
                    let entry = match entries.next_entry().await {
                        Ok(Some(entry)) => entry,
                        Ok(None) => break,
                        Err(err) => {
                            yield Err(exn::Exn::from(map_io_error(err, dir.path())));
                            continue;
                        },
                    };
                    let file_type = match entry.file_type().await {
                        Ok(file_type) => file_type,
                        Err(err) => {
                            yield Err(exn::Exn::from(map_io_error(err, dir.path())));
                            continue;
                        },
                    };
                    let kind = if file_type.is_dir() {
                        ResourceKind::Directory
                    } else if file_type.is_file() {
                        ResourceKind::File
                    } else {
                        // Most likely a broken symlink; silently dropped.
                        continue;
                    };
                    if recursive && kind == ResourceKind::Directory {
                        subdirs.push(entry.path());
                    }
                    yield self.entry_info(&entry.path(), kind);
                }
                // Children descend after the current directory's own
                // entries, nearest subtree first.
                for sub in subdirs.into_iter().rev() {
                    queue.push_front(sub);
                }
            }
        })
    }

    async fn create_dir(&self, path: &str) -> Result<()> {
        let dir = ResourceInfo::directory(path)?;
        let disk = self.disk_path(&dir)?;
        tracing::debug!(path = %dir, "creating directory");
        Ok(fs::create_dir_all(&disk).await.map_err(|e| ErrorKind::update(dir.path(), e))?)
    }

    async fn delete_dir(&self, path: &str) -> Result<()> {
        let dir = ResourceInfo::directory(path)?;
        let disk = self.disk_path(&dir)?;
        tracing::debug!(path = %dir, "removing directory tree");
        Ok(fs::remove_dir_all(&disk).await.map_err(|e| map_io_error(e, dir.path()))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (tempfile::TempDir, LocalBackend) {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("test", temp_dir.path()).unwrap();
        (temp_dir, backend)
    }

    #[test]
    fn test_new_requires_absolute_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(LocalBackend::new("name", temp_dir.path()).is_ok());
        let err = LocalBackend::new("name", "relative/path").err().unwrap();
        assert!(matches!(&*err, ErrorKind::Connection(_)));
    }

    #[test]
    fn test_disk_path_confinement() {
        let (temp_dir, backend) = setup();
        let file = ResourceInfo::file("/a/b.txt").unwrap();
        assert_eq!(backend.disk_path(&file).unwrap(), temp_dir.path().join("a/b.txt"));
        // `..` resolves within the root
        let inside = ResourceInfo::file("/a/../b.txt").unwrap();
        assert_eq!(backend.disk_path(&inside).unwrap(), temp_dir.path().join("b.txt"));
        // and can never climb out of it
        let escape = ResourceInfo::file("/../etc/passwd").unwrap();
        let err = backend.disk_path(&escape).unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let (_dir, backend) = setup();
        backend.write("/test.txt", b"Hello, World!").await.unwrap();
        assert_eq!(backend.read("/test.txt").await.unwrap(), b"Hello, World!");
    }

    #[tokio::test]
    async fn test_overwrite_replaces_content() {
        let (_dir, backend) = setup();
        backend.write_text("/test2.txt", "A").await.unwrap();
        backend.write_text("/test2.txt", "B").await.unwrap();
        assert_eq!(backend.read_text("/test2.txt").await.unwrap(), "B");
    }

    #[tokio::test]
    async fn test_write_creates_ancestors() {
        let (_dir, backend) = setup();
        backend.write("/a/b/c/file.txt", b"data").await.unwrap();
        assert!(backend.exists("/a/b/c/file.txt").await.unwrap());
        assert!(backend.exists("/a/b/").await.unwrap());
    }

    #[tokio::test]
    async fn test_read_not_found() {
        let (_dir, backend) = setup();
        let err = backend.read("/missing.txt").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_twice_is_not_found_not_update() {
        let (_dir, backend) = setup();
        backend.write("/file.txt", b"data").await.unwrap();
        backend.delete_file("/file.txt").await.unwrap();
        assert!(!backend.exists("/file.txt").await.unwrap());
        let err = backend.delete_file("/file.txt").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_marks_kinds_from_native_entries() {
        let (_dir, backend) = setup();
        backend.write("/readme.txt", b"data").await.unwrap();
        backend.create_dir("/sub").await.unwrap();
        let mut entries = backend.list("/", false).await.unwrap();
        entries.sort_by(|a, b| a.path().cmp(b.path()));
        let described: Vec<_> = entries.iter().map(|e| (e.path().to_string(), e.is_directory())).collect();
        assert_eq!(described, [("/readme.txt".to_string(), false), ("/sub/".to_string(), true)]);
    }

    #[tokio::test]
    async fn test_list_recursive_walks_subtree() {
        let (_dir, backend) = setup();
        backend.write("/a/one.txt", b"1").await.unwrap();
        backend.write("/a/sub/two.txt", b"2").await.unwrap();
        let entries = backend.list("/a", true).await.unwrap();
        let mut paths: Vec<_> = entries.iter().map(ResourceInfo::path).collect();
        paths.sort_unstable();
        assert_eq!(paths, ["/a/one.txt", "/a/sub/", "/a/sub/two.txt"]);
    }

    #[tokio::test]
    async fn test_list_missing_directory_is_not_found() {
        let (_dir, backend) = setup();
        let err = backend.list("/nowhere", false).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_dir_cascades() {
        let (_dir, backend) = setup();
        backend.create_dir("/tests/newDir").await.unwrap();
        backend.write("/tests/newDir/inner.txt", b"x").await.unwrap();
        backend.delete_dir("/tests/newDir").await.unwrap();
        let remaining = backend.list("/tests", true).await.unwrap();
        assert!(remaining.is_empty());
        assert!(backend.exists("/tests/").await.unwrap());
    }

    #[tokio::test]
    async fn test_path_security() {
        let (_dir, backend) = setup();
        assert!(backend.read("/../etc/passwd").await.is_err());
        assert!(backend.write("/../escape.txt", b"data").await.is_err());
        assert!(backend.delete_file("/../../file.txt").await.is_err());
    }
}
