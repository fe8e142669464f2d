//! Google Drive storage backend.
//!
//! Drive addresses nodes by opaque IDs, not paths. The backend walks a
//! canonical path segment by segment from the configured root folder,
//! asking for "the child of this parent with this name" at every step, and
//! memoizes every folder ID it resolves so repeated operations under the
//! same subtree skip the walk. The memo is advisory only: an entry gone
//! stale because the remote folder vanished out-of-band surfaces as a
//! downstream `NotFound` from the API, never a resolution-time crash.

use crate::FileManager;
use crate::backend::ResourceStream;
use crate::error::{ErrorKind, Result};
use crate::resource::{ResourceInfo, ResourceKind};
use async_stream::stream;
use async_trait::async_trait;
use exn::OptionExt;
use futures::future::BoxFuture;
use reqwest::{Client, StatusCode, header};
use serde::Deserialize;
use std::collections::HashMap;
use tokio::sync::RwLock;

const FILES_API: &str = "https://www.googleapis.com/drive/v3/files";
const UPLOAD_API: &str = "https://www.googleapis.com/upload/drive/v3/files";
const FOLDER_MIME: &str = "application/vnd.google-apps.folder";
const TEXT_MIME: &str = "text/plain";
const BINARY_MIME: &str = "application/octet-stream";
const LIST_FIELDS: &str = "nextPageToken, files(id, name, mimeType)";

/// Google Drive storage backend.
///
/// Stores files under a root folder addressed by its Drive ID, using an
/// OAuth bearer token the caller obtained elsewhere.
pub struct GoogleDriveBackend {
    name: String,
    client: Client,
    token: String,
    root_id: String,
    /// Canonical directory path -> Drive folder ID, scoped to this
    /// adapter instance.
    folder_ids: RwLock<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct DriveEntry {
    id: String,
    name: String,
    #[serde(rename = "mimeType")]
    mime_type: String,
}

#[derive(Debug, Deserialize)]
struct DriveEntryList {
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
    #[serde(default)]
    files: Vec<DriveEntry>,
}

/// Escape a file name for embedding in a Drive `q` query literal.
fn escape_query(name: &str) -> String {
    name.replace('\\', "\\\\").replace('\'', "\\'")
}

fn kind_of(mime_type: &str) -> ResourceKind {
    if mime_type == FOLDER_MIME { ResourceKind::Directory } else { ResourceKind::File }
}

/// Canonical path of a child entry inside `dir`.
fn child_path(dir: &ResourceInfo, entry: &DriveEntry) -> String {
    let suffix = if kind_of(&entry.mime_type) == ResourceKind::Directory { "/" } else { "" };
    format!("{}{}{suffix}", dir.path(), entry.name)
}

/// Drop memoized IDs under a deleted directory's path prefix.
fn purge_prefix(cache: &mut HashMap<String, String>, prefix: &str) {
    cache.retain(|path, _| !path.starts_with(prefix));
}

impl GoogleDriveBackend {
    pub fn new(name: impl Into<String>, root_folder_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            client: Client::new(),
            token: token.into(),
            root_id: root_folder_id.into(),
            folder_ids: RwLock::new(HashMap::new()),
        }
    }

    /// Send an authorized request; a 404 becomes `NotFound` at `path`, any
    /// other failure an `Update` carrying the API's message.
    async fn send(&self, request: reqwest::RequestBuilder, path: &str) -> Result<reqwest::Response> {
        let response = request.bearer_auth(&self.token).send().await.map_err(|e| ErrorKind::update(path, e))?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            exn::bail!(ErrorKind::not_found(path));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            exn::bail!(ErrorKind::update(path, format!("{status}: {body}")));
        }
        Ok(response)
    }

    /// Look up a child of `parent_id` by name. Zero matches is `None`, not
    /// an error; the caller decides what absence means.
    async fn find_child(&self, parent_id: &str, name: &str, folders_only: bool, path: &str) -> Result<Option<DriveEntry>> {
        let mut query = format!("'{parent_id}' in parents and name = '{}' and trashed = false", escape_query(name));
        if folders_only {
            query.push_str(&format!(" and mimeType = '{FOLDER_MIME}'"));
        }
        let request = self
            .client
            .get(FILES_API)
            .query(&[("q", query.as_str()), ("fields", LIST_FIELDS), ("pageSize", "2")]);
        let listing: DriveEntryList =
            self.send(request, path).await?.json().await.map_err(|e| ErrorKind::update(path, e))?;
        Ok(listing.files.into_iter().next())
    }

    async fn create_folder(&self, parent_id: &str, name: &str, path: &str) -> Result<String> {
        tracing::debug!(path, "creating folder");
        let payload = serde_json::json!({ "name": name, "mimeType": FOLDER_MIME, "parents": [parent_id] });
        let request = self.client.post(FILES_API).json(&payload);
        let created: DriveEntry =
            self.send(request, path).await?.json().await.map_err(|e| ErrorKind::update(path, e))?;
        Ok(created.id)
    }

    /// Resolve a canonical directory path to its Drive folder ID, walking
    /// segment by segment from the root folder. Missing segments are
    /// created only when `create_missing` is set; otherwise the walk stops
    /// with `NotFound` at the absent segment.
    async fn resolve_folder(&self, dir: &ResourceInfo, create_missing: bool) -> Result<String> {
        if dir.path() == "/" {
            return Ok(self.root_id.clone());
        }
        if let Some(id) = self.folder_ids.read().await.get(dir.path()) {
            return Ok(id.clone());
        }
        let mut parent = self.root_id.clone();
        let mut walked = String::from("/");
        for segment in dir.path().trim_matches('/').split('/') {
            walked.push_str(segment);
            walked.push('/');
            if let Some(id) = self.folder_ids.read().await.get(&walked) {
                parent = id.clone();
                continue;
            }
            parent = match self.find_child(&parent, segment, true, &walked).await? {
                Some(entry) => entry.id,
                None if create_missing => self.create_folder(&parent, segment, &walked).await?,
                None => exn::bail!(ErrorKind::not_found(walked)),
            };
            self.folder_ids.write().await.insert(walked.clone(), parent.clone());
        }
        Ok(parent)
    }

    /// Resolve a file path to `(parent folder ID, existing entry)`. The
    /// parent folder is never auto-created here.
    async fn resolve_file(&self, file: &ResourceInfo) -> Result<(String, Option<DriveEntry>)> {
        let Some(parent) = file.parent() else {
            exn::bail!(ErrorKind::not_found(file.path()));
        };
        let parent_id = self.resolve_folder(&parent, false).await?;
        let entry = self.find_child(&parent_id, file.fullname(), false, file.path()).await?;
        Ok((parent_id, entry))
    }

    async fn write_with_mime(&self, path: &str, data: &[u8], mime: &'static str) -> Result<()> {
        let file = ResourceInfo::file(path)?;
        let (parent_id, existing) = self.resolve_file(&file).await?;
        let id = match existing {
            Some(entry) => entry.id,
            None => {
                // Create the node first, then fill in its content.
                let payload = serde_json::json!({ "name": file.fullname(), "parents": [parent_id] });
                let request = self.client.post(FILES_API).json(&payload);
                let created: DriveEntry = self
                    .send(request, file.path())
                    .await?
                    .json()
                    .await
                    .map_err(|e| ErrorKind::update(file.path(), e))?;
                created.id
            },
        };
        tracing::debug!(path = %file, bytes = data.len(), "uploading content");
        let request = self
            .client
            .patch(format!("{UPLOAD_API}/{id}"))
            .query(&[("uploadType", "media")])
            .header(header::CONTENT_TYPE, mime)
            .body(data.to_vec());
        self.send(request, file.path()).await?;
        Ok(())
    }

    async fn list_children(&self, dir: &ResourceInfo, folder_id: &str) -> Result<Vec<ResourceInfo>> {
        let query = format!("'{folder_id}' in parents and trashed = false");
        let mut page_token: Option<String> = None;
        let mut entries = Vec::new();
        let mut resolved_folders = Vec::new();
        loop {
            let mut request = self
                .client
                .get(FILES_API)
                .query(&[("q", query.as_str()), ("fields", LIST_FIELDS), ("pageSize", "1000")]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }
            let listing: DriveEntryList =
                self.send(request, dir.path()).await?.json().await.map_err(|e| ErrorKind::update(dir.path(), e))?;
            for entry in listing.files {
                let kind = kind_of(&entry.mime_type);
                let path = child_path(dir, &entry);
                if kind == ResourceKind::Directory {
                    resolved_folders.push((path.clone(), entry.id));
                }
                entries.push(ResourceInfo::resolve(&path, Some(kind), None)?);
            }
            page_token = listing.next_page_token;
            if page_token.is_none() {
                break;
            }
        }
        if !resolved_folders.is_empty() {
            let mut cache = self.folder_ids.write().await;
            cache.extend(resolved_folders);
        }
        Ok(entries)
    }

    fn gather(&self, dir: ResourceInfo, recursive: bool) -> BoxFuture<'_, Result<Vec<ResourceInfo>>> {
        Box::pin(async move {
            let folder_id = self.resolve_folder(&dir, false).await?;
            let entries = self.list_children(&dir, &folder_id).await?;
            if !recursive {
                return Ok(entries);
            }
            let mut all = Vec::with_capacity(entries.len());
            let mut subdirs = Vec::new();
            for entry in entries {
                if entry.is_directory() {
                    subdirs.push(entry.clone());
                }
                all.push(entry);
            }
            for sub in subdirs {
                let subtree = self.gather(sub, true).await?;
                all.extend(subtree);
            }
            Ok(all)
        })
    }
}

#[async_trait]
impl FileManager for GoogleDriveBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let file = ResourceInfo::file(path)?;
        let (_parent_id, entry) = self.resolve_file(&file).await?;
        let entry = entry.ok_or_raise(|| ErrorKind::not_found(file.path()))?;
        let request = self.client.get(format!("{FILES_API}/{}", entry.id)).query(&[("alt", "media")]);
        let response = self.send(request, file.path()).await?;
        Ok(response.bytes().await.map_err(|e| ErrorKind::update(file.path(), e))?.to_vec())
    }

    async fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        self.write_with_mime(path, data, BINARY_MIME).await
    }

    async fn write_text(&self, path: &str, content: &str) -> Result<()> {
        self.write_with_mime(path, content.as_bytes(), TEXT_MIME).await
    }

    async fn delete_file(&self, path: &str) -> Result<()> {
        let file = ResourceInfo::file(path)?;
        let (_parent_id, entry) = self.resolve_file(&file).await?;
        let entry = entry.ok_or_raise(|| ErrorKind::not_found(file.path()))?;
        tracing::debug!(path = %file, "deleting file");
        let request = self.client.delete(format!("{FILES_API}/{}", entry.id));
        self.send(request, file.path()).await?;
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let info = ResourceInfo::new(path)?;
        let result = match info.kind() {
            ResourceKind::Directory => self.resolve_folder(&info, false).await.map(|_| true),
            ResourceKind::File => self.resolve_file(&info).await.map(|(_, entry)| entry.is_some()),
        };
        match result {
            Ok(found) => Ok(found),
            Err(err) if matches!(&*err, ErrorKind::NotFound(_)) => Ok(false),
            Err(err) => Err(err),
        }
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
            match self.gather(dir, recursive).await {
                Ok(entries) => {
                    for entry in entries {
                        yield Ok(entry);
                    }
                },
                Err(e) => yield Err(e),
            }
        })
    }

    async fn create_dir(&self, path: &str) -> Result<()> {
        let dir = ResourceInfo::directory(path)?;
        self.resolve_folder(&dir, true).await?;
        Ok(())
    }

    async fn delete_dir(&self, path: &str) -> Result<()> {
        let dir = ResourceInfo::directory(path)?;
        let folder_id = self.resolve_folder(&dir, false).await?;
        tracing::debug!(path = %dir, "deleting folder subtree");
        let request = self.client.delete(format!("{FILES_API}/{folder_id}"));
        self.send(request, dir.path()).await?;
        let mut cache = self.folder_ids.write().await;
        purge_prefix(&mut cache, dir.path());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, name: &str, mime_type: &str) -> DriveEntry {
        DriveEntry {
            id: id.to_string(),
            name: name.to_string(),
            mime_type: mime_type.to_string(),
        }
    }

    #[test]
    fn test_escape_query() {
        assert_eq!(escape_query("plain.txt"), "plain.txt");
        assert_eq!(escape_query("it's here.txt"), "it\\'s here.txt");
        assert_eq!(escape_query("back\\slash"), "back\\\\slash");
    }

    #[test]
    fn test_kind_of_mime() {
        assert_eq!(kind_of(FOLDER_MIME), ResourceKind::Directory);
        assert_eq!(kind_of("text/plain"), ResourceKind::File);
        assert_eq!(kind_of("application/octet-stream"), ResourceKind::File);
    }

    #[test]
    fn test_child_path_carries_kind_suffix() {
        let dir = ResourceInfo::directory("/docs").unwrap();
        assert_eq!(child_path(&dir, &entry("a", "guide.md", "text/markdown")), "/docs/guide.md");
        assert_eq!(child_path(&dir, &entry("b", "api", FOLDER_MIME)), "/docs/api/");
    }

    #[test]
    fn test_purge_prefix_is_exact() {
        let mut cache = HashMap::from([
            ("/docs/".to_string(), "a".to_string()),
            ("/docs/api/".to_string(), "b".to_string()),
            ("/docs2/".to_string(), "c".to_string()),
        ]);
        purge_prefix(&mut cache, "/docs/");
        assert!(!cache.contains_key("/docs/"));
        assert!(!cache.contains_key("/docs/api/"));
        assert!(cache.contains_key("/docs2/"));
    }

    #[tokio::test]
    async fn test_resolve_folder_prefers_memoized_ids() {
        // Seed the memo and resolve without any network in reach: a cache
        // hit must short-circuit the walk entirely.
        let backend = GoogleDriveBackend::new("drive", "root-id", "token");
        backend.folder_ids.write().await.insert("/docs/api/".to_string(), "cached-id".to_string());
        let dir = ResourceInfo::directory("/docs/api").unwrap();
        assert_eq!(backend.resolve_folder(&dir, false).await.unwrap(), "cached-id");
    }

    #[tokio::test]
    async fn test_resolve_root_is_the_configured_id() {
        let backend = GoogleDriveBackend::new("drive", "root-id", "token");
        assert_eq!(backend.resolve_folder(&ResourceInfo::root(), false).await.unwrap(), "root-id");
    }
}
