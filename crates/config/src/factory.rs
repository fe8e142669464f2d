//! Backend profiles and the adapter factory.
//!
//! A [`BackendSpec`] says which backend a name points at and how to reach
//! it; [`connect`] turns one into a live [`BackendHandle`]. Specs come from
//! profile files (see [`Settings`](crate::Settings)) or from
//! connection-string identifiers via [`parse_uri`].

use crate::error::{ErrorKind, Result};
use exn::OptionExt;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use warren_storage::BackendHandle;
use warren_storage::backend::{GithubBackend, GoogleDriveBackend, LocalBackend, MemoryBackend};

/// One configured backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendSpec {
    /// Flat in-memory store; contents are lost on drop.
    Memory,
    /// Directory on the local filesystem.
    Local { root: PathBuf },
    /// GitHub repository reached through the contents API.
    Github {
        owner: String,
        repo: String,
        #[serde(default)]
        branch: Option<String>,
        #[serde(default)]
        token: Option<String>,
        #[serde(default)]
        root: Option<String>,
    },
    /// Google Drive folder graph rooted at a folder ID.
    Gdrive { folder_id: String, token: String },
}

/// Construct a live adapter for a backend profile.
pub fn connect(name: &str, spec: &BackendSpec) -> Result<BackendHandle> {
    tracing::debug!(backend = name, "constructing backend");
    Ok(match spec {
        BackendSpec::Memory => Arc::new(MemoryBackend::new(name)),
        BackendSpec::Local { root } => {
            Arc::new(LocalBackend::new(name, root).map_err(|e| e.raise(ErrorKind::Backend(name.to_string())))?)
        },
        BackendSpec::Github { owner, repo, branch, token, root } => {
            Arc::new(GithubBackend::new(name, owner, repo, branch.clone(), token.clone(), root.as_deref()))
        },
        BackendSpec::Gdrive { folder_id, token } => Arc::new(GoogleDriveBackend::new(name, folder_id, token)),
    })
}

/// Parse a connection-string identifier into a backend profile.
///
/// Supported forms:
/// - `memory:`
/// - `file:///var/lib/warren`
/// - `github://owner/repo[/sub/root][?branch=main&token=...]`
/// - `gdrive://<root-folder-id>?token=...`
pub fn parse_uri(uri: &str) -> Result<BackendSpec> {
    let (scheme, rest) = match uri.split_once("://") {
        Some((scheme, rest)) => (scheme, rest),
        None => (uri.strip_suffix(':').unwrap_or(uri), ""),
    };
    let (location, query) = match rest.split_once('?') {
        Some((location, query)) => (location, query),
        None => (rest, ""),
    };
    match scheme {
        "memory" => Ok(BackendSpec::Memory),
        "file" => {
            if location.is_empty() {
                exn::bail!(ErrorKind::MissingValue("file root".to_string()));
            }
            Ok(BackendSpec::Local { root: PathBuf::from(location) })
        },
        "github" => {
            let mut segments = location.splitn(3, '/');
            let owner = segments.next().filter(|segment| !segment.is_empty());
            let repo = segments.next().filter(|segment| !segment.is_empty());
            let (Some(owner), Some(repo)) = (owner, repo) else {
                exn::bail!(ErrorKind::InvalidUri(uri.to_string()));
            };
            Ok(BackendSpec::Github {
                owner: owner.to_string(),
                repo: repo.to_string(),
                branch: query_value(query, "branch"),
                token: query_value(query, "token"),
                root: segments.next().map(str::to_owned),
            })
        },
        "gdrive" => {
            if location.is_empty() {
                exn::bail!(ErrorKind::MissingValue("root folder id".to_string()));
            }
            let token = query_value(query, "token").ok_or_raise(|| ErrorKind::MissingValue("token".to_string()))?;
            Ok(BackendSpec::Gdrive { folder_id: location.to_string(), token })
        },
        other => exn::bail!(ErrorKind::UnsupportedScheme(other.to_string())),
    }
}

fn query_value(query: &str, key: &str) -> Option<String> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(candidate, _)| *candidate == key)
        .map(|(_, value)| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use warren_storage::FileManager;

    #[rstest]
    #[case::plain("memory:", BackendSpec::Memory)]
    #[case::slashed("memory://", BackendSpec::Memory)]
    #[case::local("file:///var/lib/warren", BackendSpec::Local { root: PathBuf::from("/var/lib/warren") })]
    #[case::github("github://acme/handbook", BackendSpec::Github {
        owner: "acme".to_string(),
        repo: "handbook".to_string(),
        branch: None,
        token: None,
        root: None,
    })]
    #[case::github_full("github://acme/handbook/docs/store?branch=main&token=t0k", BackendSpec::Github {
        owner: "acme".to_string(),
        repo: "handbook".to_string(),
        branch: Some("main".to_string()),
        token: Some("t0k".to_string()),
        root: Some("docs/store".to_string()),
    })]
    #[case::gdrive("gdrive://folder123?token=t0k", BackendSpec::Gdrive {
        folder_id: "folder123".to_string(),
        token: "t0k".to_string(),
    })]
    fn test_parse_uri(#[case] uri: &str, #[case] expected: BackendSpec) {
        assert_eq!(parse_uri(uri).unwrap(), expected);
    }

    #[rstest]
    #[case::no_scheme("warren")]
    #[case::unknown_scheme("ftp://host/share")]
    #[case::github_missing_repo("github://acme")]
    #[case::gdrive_missing_token("gdrive://folder123")]
    #[case::file_missing_root("file://")]
    fn test_parse_uri_rejects(#[case] uri: &str) {
        assert!(parse_uri(uri).is_err());
    }

    #[tokio::test]
    async fn test_connect_memory_round_trip() {
        let backend = connect("scratch", &BackendSpec::Memory).unwrap();
        assert_eq!(backend.name(), "scratch");
        backend.write_text("/hello.txt", "hi").await.unwrap();
        assert_eq!(backend.read_text("/hello.txt").await.unwrap(), "hi");
    }

    #[tokio::test]
    async fn test_connect_local_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let spec = BackendSpec::Local { root: dir.path().to_path_buf() };
        let backend = connect("disk", &spec).unwrap();
        backend.write_text("/hello.txt", "hi").await.unwrap();
        assert_eq!(backend.read_text("/hello.txt").await.unwrap(), "hi");
    }

    #[test]
    fn test_connect_local_rejects_relative_root() {
        let spec = BackendSpec::Local { root: PathBuf::from("relative/root") };
        let err = connect("disk", &spec).err().unwrap();
        assert!(matches!(&*err, ErrorKind::Backend(_)));
    }
}
