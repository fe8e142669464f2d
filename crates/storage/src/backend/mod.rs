//! File-manager contract and backend adapters.
//!
//! This module defines the [`FileManager`] trait, one unified CRUD surface
//! over heterogeneous stores: a flat in-memory map, the local filesystem,
//! a GitHub repository and a Google Drive folder graph. Callers speak
//! canonical paths; each adapter owns the translation into its native
//! addressing.

#[cfg(feature = "gdrive")]
mod gdrive;
#[cfg(feature = "github")]
mod github;
mod local;
mod memory;

#[cfg(feature = "gdrive")]
pub use self::gdrive::GoogleDriveBackend;
#[cfg(feature = "github")]
pub use self::github::GithubBackend;
pub use self::local::LocalBackend;
pub use self::memory::MemoryBackend;
use crate::error::Result;
use crate::resource::ResourceInfo;
use async_trait::async_trait;
use futures::{Stream, TryStreamExt};
use std::pin::Pin;

/// Stream of directory entries produced by [`FileManager::list_stream`].
pub type ResourceStream<'a> = Pin<Box<dyn Stream<Item = Result<ResourceInfo>> + Send + 'a>>;

/// Unified interface for file storage backends.
///
/// All operations are asynchronous I/O against a local or remote store; the
/// trait does no compute of its own. Paths are caller-supplied strings,
/// resolved into [`ResourceInfo`] by every adapter, and always interpreted
/// relative to the adapter's configured root — a leading slash doesn't let
/// a caller climb out of it.
///
/// # Errors
///
/// Operations fail with one of three kinds regardless of backend:
/// [`EmptyPath`](crate::error::ErrorKind::EmptyPath),
/// [`NotFound`](crate::error::ErrorKind::NotFound) or
/// [`Update`](crate::error::ErrorKind::Update). No backend-specific error
/// type crosses this boundary.
///
/// # Examples
///
/// ```
/// use warren_storage::FileManager;
/// use warren_storage::backend::MemoryBackend;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MemoryBackend::new("scratch");
/// backend.write_text("/notes/today.md", "- buy milk").await?;
/// assert!(backend.exists("/notes/today.md").await?);
/// for entry in backend.list("/", true).await? {
///     println!("{entry}");
/// }
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait FileManager: Send + Sync {
    /// Name of the configured backend, used for log attribution only.
    fn name(&self) -> &str;

    /// Read a file's contents.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) when no file
    /// exists at the resolved address.
    async fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Read a file's contents as text (lossy UTF-8).
    async fn read_text(&self, path: &str) -> Result<String> {
        Ok(String::from_utf8_lossy(&self.read(path).await?).into_owned())
    }

    /// Write a file: created when absent, overwritten when present.
    ///
    /// Backend rejection (auth, conflict, quota, network) surfaces as
    /// [`Update`](crate::error::ErrorKind::Update).
    async fn write(&self, path: &str, data: &[u8]) -> Result<()>;

    /// Write a text file with the same upsert semantics as
    /// [`write`](Self::write).
    async fn write_text(&self, path: &str, content: &str) -> Result<()> {
        self.write(path, content.as_bytes()).await
    }

    /// Delete a file.
    ///
    /// Backend rejection is an [`Update`](crate::error::ErrorKind::Update).
    /// Deleting an absent file is a no-op where the backend can detect
    /// absence cheaply (GitHub); elsewhere the backend's own not-found
    /// surfaces as [`NotFound`](crate::error::ErrorKind::NotFound).
    async fn delete_file(&self, path: &str) -> Result<()>;

    /// Whether a resource currently exists at the resolved address.
    async fn exists(&self, path: &str) -> Result<bool>;

    /// Stream a directory's entries.
    ///
    /// Non-recursive listings yield one entry per immediate child. With
    /// `recursive` the whole subtree comes back: the directory's own
    /// entries first, then each child directory's subtree depth-first,
    /// preserving backend listing order within a directory.
    fn list_stream<'a>(&'a self, dir: &'a str, recursive: bool) -> ResourceStream<'a>;

    /// Collect [`list_stream`](Self::list_stream) into a `Vec`.
    async fn list(&self, dir: &str, recursive: bool) -> Result<Vec<ResourceInfo>> {
        self.list_stream(dir, recursive).try_collect().await
    }

    /// Create a directory, including any missing ancestors.
    ///
    /// Backends without a native empty-directory concept represent one with
    /// a retained marker file inside it.
    async fn create_dir(&self, path: &str) -> Result<()>;

    /// Delete a directory and everything beneath it: every resource whose
    /// canonical path starts with this directory's canonical path.
    async fn delete_dir(&self, path: &str) -> Result<()>;
}
