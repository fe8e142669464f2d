//! GitHub repository storage backend.
//!
//! Files live in a repository reached through the contents API. The
//! backend-native address of a file is its repo-side path plus the blob
//! `sha` the API last reported for it: a missing `sha` is how "this file
//! does not exist yet" is represented, which is exactly what turns every
//! write into an upsert — create when the probe found nothing, update
//! (with the probed `sha`) when it did. A stale `sha` makes the API answer
//! with a conflict, which surfaces as an `Update` error instead of
//! silently clobbering a concurrent edit.

use crate::FileManager;
use crate::backend::ResourceStream;
use crate::error::{ErrorKind, Result};
use crate::path::normalize;
use crate::resource::{ResourceInfo, ResourceKind};
use async_stream::stream;
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures::future::{BoxFuture, try_join_all};
use reqwest::{Client, Method, StatusCode, header};
use serde::Deserialize;

const API_ROOT: &str = "https://api.github.com";
const ACCEPT_JSON: &str = "application/vnd.github+json";
const ACCEPT_RAW: &str = "application/vnd.github.raw";
const USER_AGENT: &str = "warren-storage";
/// Marker file that keeps an otherwise-empty directory alive in git.
const DIR_MARKER: &str = ".gitkeep";

/// GitHub repository storage backend.
///
/// Stores files in a repository, optionally under a path prefix acting as
/// the storage root and on a branch other than the default one. Reads work
/// unauthenticated against public repositories; mutations need a token.
pub struct GithubBackend {
    name: String,
    client: Client,
    owner: String,
    repo: String,
    branch: Option<String>,
    token: Option<String>,
    /// Repo-side path prefix acting as the storage root; empty means the
    /// repository root.
    root: String,
}

/// One entry of a contents-API response.
#[derive(Debug, Deserialize)]
struct ContentEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

impl GithubBackend {
    pub fn new(
        name: impl Into<String>,
        owner: impl Into<String>,
        repo: impl Into<String>,
        branch: Option<String>,
        token: Option<String>,
        root: Option<&str>,
    ) -> Self {
        Self {
            name: name.into(),
            client: Client::new(),
            owner: owner.into(),
            repo: repo.into(),
            branch,
            token,
            root: root.map(|root| normalize(root, false, false)).unwrap_or_default(),
        }
    }

    /// Repo-side path for a canonical resource path.
    fn repo_path(&self, info: &ResourceInfo) -> String {
        let relative = info.path().trim_matches('/');
        match (self.root.is_empty(), relative.is_empty()) {
            (true, _) => relative.to_string(),
            (false, true) => self.root.clone(),
            (false, false) => format!("{}/{}", self.root, relative),
        }
    }

    fn contents_url(&self, repo_path: &str) -> String {
        let encoded = repo_path.split('/').map(urlencoding::encode).collect::<Vec<_>>().join("/");
        format!("{API_ROOT}/repos/{}/{}/contents/{encoded}", self.owner, self.repo)
    }

    fn request(&self, method: Method, url: &str, accept: &'static str) -> reqwest::RequestBuilder {
        let mut request = self
            .client
            .request(method, url)
            .header(header::USER_AGENT, USER_AGENT)
            .header(header::ACCEPT, accept);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        request
    }

    fn get(&self, url: &str, accept: &'static str) -> reqwest::RequestBuilder {
        let mut request = self.request(Method::GET, url, accept);
        if let Some(branch) = &self.branch {
            request = request.query(&[("ref", branch.as_str())]);
        }
        request
    }

    /// Probe the current blob `sha` for a file.
    ///
    /// A 404 here is deliberately not an error: it means the file does not
    /// exist yet, so the caller's write becomes a create instead of an
    /// update, and a delete becomes a no-op.
    async fn blob_sha(&self, file: &ResourceInfo) -> Result<Option<String>> {
        let response = self
            .get(&self.contents_url(&self.repo_path(file)), ACCEPT_JSON)
            .send()
            .await
            .map_err(|e| ErrorKind::update(file.path(), e))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body: serde_json::Value =
            check(response, file.path()).await?.json().await.map_err(|e| ErrorKind::update(file.path(), e))?;
        Ok(body.get("sha").and_then(|sha| sha.as_str()).map(str::to_owned))
    }

    async fn list_shallow(&self, dir: &ResourceInfo) -> Result<Vec<ResourceInfo>> {
        let response = self
            .get(&self.contents_url(&self.repo_path(dir)), ACCEPT_JSON)
            .send()
            .await
            .map_err(|e| ErrorKind::update(dir.path(), e))?;
        if response.status() == StatusCode::NOT_FOUND {
            exn::bail!(ErrorKind::not_found(dir.path()));
        }
        let body: serde_json::Value =
            check(response, dir.path()).await?.json().await.map_err(|e| ErrorKind::update(dir.path(), e))?;
        parse_entries(body, &self.root, dir.path())
    }

    /// Walk a subtree. The contents API only lists one level, so recursion
    /// happens here, fetching sibling subtrees concurrently; each subtree
    /// keeps its own per-directory order.
    fn gather(&self, dir: ResourceInfo, recursive: bool) -> BoxFuture<'_, Result<Vec<ResourceInfo>>> {
        Box::pin(async move {
            let entries = self.list_shallow(&dir).await?;
            if !recursive {
                return Ok(entries);
            }
            let subdirs: Vec<_> = entries.iter().filter(|entry| entry.is_directory()).cloned().collect();
            let subtrees = try_join_all(subdirs.into_iter().map(|sub| self.gather(sub, true))).await?;
            let mut all = entries;
            for subtree in subtrees {
                all.extend(subtree);
            }
            Ok(all)
        })
    }
}

/// Fail non-success responses as `Update`, keeping the API's own message.
async fn check(response: reqwest::Response, path: &str) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    exn::bail!(ErrorKind::update(path, format!("{status}: {body}")));
}

/// Build the JSON body for a contents-API commit. `content` is present for
/// creates and updates, absent for deletes; `sha` is present whenever the
/// probe found an existing blob.
fn commit_payload(message: &str, content: Option<&[u8]>, sha: Option<&str>, branch: Option<&str>) -> serde_json::Value {
    let mut payload = serde_json::json!({ "message": message });
    if let Some(content) = content {
        payload["content"] = serde_json::Value::from(BASE64.encode(content));
    }
    if let Some(sha) = sha {
        payload["sha"] = serde_json::Value::from(sha);
    }
    if let Some(branch) = branch {
        payload["branch"] = serde_json::Value::from(branch);
    }
    payload
}

/// Map contents-API entries into canonical resources, stripping the
/// configured repo root from the repo-side paths. Listing a file path
/// returns that file alone.
fn parse_entries(body: serde_json::Value, root: &str, dir_path: &str) -> Result<Vec<ResourceInfo>> {
    let entries: Vec<ContentEntry> = if body.is_array() {
        serde_json::from_value(body).map_err(|e| ErrorKind::update(dir_path, e))?
    } else {
        vec![serde_json::from_value(body).map_err(|e| ErrorKind::update(dir_path, e))?]
    };
    entries
        .into_iter()
        .map(|entry| {
            let kind = if entry.kind == "dir" { ResourceKind::Directory } else { ResourceKind::File };
            ResourceInfo::resolve(&entry.path, Some(kind), Some(root))
        })
        .collect()
}

#[async_trait]
impl FileManager for GithubBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let file = ResourceInfo::file(path)?;
        let response = self
            .get(&self.contents_url(&self.repo_path(&file)), ACCEPT_RAW)
            .send()
            .await
            .map_err(|e| ErrorKind::update(file.path(), e))?;
        if response.status() == StatusCode::NOT_FOUND {
            exn::bail!(ErrorKind::not_found(file.path()));
        }
        let response = check(response, file.path()).await?;
        Ok(response.bytes().await.map_err(|e| ErrorKind::update(file.path(), e))?.to_vec())
    }

    async fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        let file = ResourceInfo::file(path)?;
        let sha = self.blob_sha(&file).await?;
        let action = if sha.is_some() { "update" } else { "create" };
        let payload =
            commit_payload(&format!("{action} {}", file.path()), Some(data), sha.as_deref(), self.branch.as_deref());
        tracing::debug!(path = %file, action, bytes = data.len(), "committing file");
        let response = self
            .request(Method::PUT, &self.contents_url(&self.repo_path(&file)), ACCEPT_JSON)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ErrorKind::update(file.path(), e))?;
        check(response, file.path()).await?;
        Ok(())
    }

    async fn delete_file(&self, path: &str) -> Result<()> {
        let file = ResourceInfo::file(path)?;
        let Some(sha) = self.blob_sha(&file).await? else {
            // Absence is already known from the probe, so there is nothing
            // to delete and nothing to fail about.
            tracing::info!(path = %file, "skipping delete of absent file");
            return Ok(());
        };
        let payload = commit_payload(&format!("delete {}", file.path()), None, Some(&sha), self.branch.as_deref());
        tracing::debug!(path = %file, "deleting file");
        let response = self
            .request(Method::DELETE, &self.contents_url(&self.repo_path(&file)), ACCEPT_JSON)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ErrorKind::update(file.path(), e))?;
        check(response, file.path()).await?;
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let info = ResourceInfo::new(path)?;
        let response = self
            .get(&self.contents_url(&self.repo_path(&info)), ACCEPT_JSON)
            .send()
            .await
            .map_err(|e| ErrorKind::update(info.path(), e))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        check(response, info.path()).await?;
        Ok(true)
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
        // Git has no empty directories; a retained marker file keeps the
        // path alive (and its ancestors with it).
        let marker = format!("{}{DIR_MARKER}", dir.path());
        self.write(&marker, b"").await
    }

    async fn delete_dir(&self, path: &str) -> Result<()> {
        let dir = ResourceInfo::directory(path)?;
        let entries = self.gather(dir, true).await?;
        for entry in entries {
            if entry.is_file() {
                self.delete_file(entry.path()).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(root: Option<&str>) -> GithubBackend {
        GithubBackend::new("gh", "acme", "handbook", Some("main".to_string()), None, root)
    }

    #[test]
    fn test_repo_path_without_root() {
        let backend = backend(None);
        assert_eq!(backend.repo_path(&ResourceInfo::file("/a/b.txt").unwrap()), "a/b.txt");
        assert_eq!(backend.repo_path(&ResourceInfo::directory("/a/b").unwrap()), "a/b");
        assert_eq!(backend.repo_path(&ResourceInfo::root()), "");
    }

    #[test]
    fn test_repo_path_with_root() {
        let backend = backend(Some("docs/store/"));
        assert_eq!(backend.repo_path(&ResourceInfo::file("/a/b.txt").unwrap()), "docs/store/a/b.txt");
        assert_eq!(backend.repo_path(&ResourceInfo::root()), "docs/store");
    }

    #[test]
    fn test_contents_url_encodes_segments() {
        let backend = backend(None);
        assert_eq!(
            backend.contents_url("dir name/file one.txt"),
            "https://api.github.com/repos/acme/handbook/contents/dir%20name/file%20one.txt"
        );
    }

    #[test]
    fn test_commit_payload_carries_sha_iff_probed() {
        let create = commit_payload("create /a.txt", Some(b"hi"), None, Some("main"));
        assert_eq!(create["content"], BASE64.encode(b"hi"));
        assert_eq!(create["branch"], "main");
        assert!(create.get("sha").is_none());

        let update = commit_payload("update /a.txt", Some(b"hi"), Some("abc123"), None);
        assert_eq!(update["sha"], "abc123");
        assert!(update.get("branch").is_none());

        let delete = commit_payload("delete /a.txt", None, Some("abc123"), Some("main"));
        assert!(delete.get("content").is_none());
        assert_eq!(delete["sha"], "abc123");
    }

    #[test]
    fn test_parse_entries_strips_root_and_maps_kinds() {
        let body = serde_json::json!([
            { "path": "docs/store/guide.md", "type": "file", "sha": "aaa" },
            { "path": "docs/store/api", "type": "dir", "sha": "bbb" },
        ]);
        let entries = parse_entries(body, "docs/store", "/").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].path(), "/guide.md");
        assert!(entries[0].is_file());
        assert_eq!(entries[1].path(), "/api/");
        assert!(entries[1].is_directory());
    }

    #[test]
    fn test_parse_entries_accepts_single_file_object() {
        let body = serde_json::json!({ "path": "guide.md", "type": "file", "sha": "aaa" });
        let entries = parse_entries(body, "", "/guide.md").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path(), "/guide.md");
    }
}
