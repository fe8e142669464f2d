//! Canonical resource descriptors.
//!
//! [`ResourceInfo`] is the one path vocabulary every backend understands:
//! rooted at `/`, directories end with a slash, files never do. All derived
//! attributes (name, extension, parent, text-ness) are pure functions of
//! the canonical path, so a descriptor never goes stale.

use crate::error::{ErrorKind, Result};
use crate::path::{normalize, split};
use regex::Regex;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::fmt;
use std::sync::LazyLock;

/// Sentinel name of the root directory.
pub const ROOT_NAME: &str = "<root>";

/// A leaf ending in `.<letters>` is classified as a file when the caller
/// didn't declare a kind.
static FILE_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.[A-Za-z]+$").expect("file pattern is valid"));

/// Extensions whose content is treated as text (documents, code, config,
/// markup). Matched against the full multi-dot extension, so `tar.gz`
/// stays binary.
const TEXT_EXTENSIONS: &[&str] = &[
    "bat", "c", "cfg", "conf", "cpp", "css", "csv", "env", "go", "h", "htm", "html", "ini", "java", "js",
    "json", "jsx", "log", "markdown", "md", "py", "rb", "rs", "rst", "sh", "sql", "svg", "toml", "ts", "tsv",
    "tsx", "txt", "xml", "yaml", "yml",
];

/// Whether a resource addresses a file or a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    File,
    Directory,
}

/// Canonical, immutable descriptor of one resource's path.
///
/// Two descriptors with the same canonical path are interchangeable; the
/// kind is encoded in the path itself (trailing slash).
///
/// # Examples
///
/// ```
/// use warren_storage::ResourceInfo;
///
/// let file = ResourceInfo::new("docs//guide/intro.tar.gz")?;
/// assert_eq!(file.path(), "/docs/guide/intro.tar.gz");
/// assert_eq!(file.name(), "intro");
/// assert_eq!(file.ext(), "tar.gz");
/// assert_eq!(file.parent().unwrap().path(), "/docs/guide/");
/// # Ok::<(), warren_storage::error::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceInfo {
    path: String,
    kind: ResourceKind,
}

impl ResourceInfo {
    /// Parse a raw path, inferring the kind (see [`Self::resolve`]).
    pub fn new(raw: impl AsRef<str>) -> Result<Self> {
        Self::resolve(raw.as_ref(), None, None)
    }

    /// Parse a raw path that is known to address a file.
    pub fn file(raw: impl AsRef<str>) -> Result<Self> {
        Self::resolve(raw.as_ref(), Some(ResourceKind::File), None)
    }

    /// Parse a raw path that is known to address a directory.
    pub fn directory(raw: impl AsRef<str>) -> Result<Self> {
        Self::resolve(raw.as_ref(), Some(ResourceKind::Directory), None)
    }

    /// The root directory.
    pub fn root() -> Self {
        Self {
            path: "/".to_string(),
            kind: ResourceKind::Directory,
        }
    }

    /// Parse a raw path into its canonical form.
    ///
    /// A configured `root_dir` is normalized and stripped as a whole-segment
    /// prefix first, which is how backend-native listings get mapped back
    /// into the caller's rooted vocabulary. The kind is taken from `kind`
    /// when given; otherwise a trailing slash always means directory, a
    /// trailing `.<letters>` pattern means file, and anything else is a
    /// directory.
    ///
    /// # Errors
    /// [`ErrorKind::EmptyPath`] when `raw` is empty.
    pub fn resolve(raw: &str, kind: Option<ResourceKind>, root_dir: Option<&str>) -> Result<Self> {
        if raw.is_empty() {
            exn::bail!(ErrorKind::EmptyPath);
        }
        let mut path = normalize(raw, true, raw.ends_with('/'));
        if let Some(root) = root_dir {
            let root = normalize(root, true, false);
            if root != "/"
                && let Some(rest) = path.strip_prefix(&root)
                && (rest.is_empty() || rest.starts_with('/'))
            {
                path = if rest.is_empty() { "/".to_string() } else { rest.to_string() };
            }
        }
        let kind = kind.unwrap_or_else(|| infer_kind(&path));
        let path = normalize(&path, true, kind == ResourceKind::Directory);
        Ok(Self { path, kind })
    }

    /// Canonical path: rooted at `/`, trailing slash iff directory.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn is_file(&self) -> bool {
        self.kind == ResourceKind::File
    }

    pub fn is_directory(&self) -> bool {
        self.kind == ResourceKind::Directory
    }

    /// Leaf segment with its extension, or [`ROOT_NAME`] for the root.
    pub fn fullname(&self) -> &str {
        let trimmed = self.path.trim_end_matches('/');
        let (_, leaf) = split(trimmed);
        if leaf.is_empty() { ROOT_NAME } else { leaf }
    }

    /// Leaf segment without its extension. Directories keep the whole leaf,
    /// matching their empty [`ext`](Self::ext).
    pub fn name(&self) -> &str {
        let fullname = self.fullname();
        if self.is_directory() {
            return fullname;
        }
        fullname.split_once('.').map_or(fullname, |(name, _)| name)
    }

    /// Extension after the first dot of the leaf, lowercased. Multi-dot
    /// extensions come back whole (`archive.tar.gz` has ext `tar.gz`);
    /// directories have none.
    pub fn ext(&self) -> String {
        if self.is_directory() {
            return String::new();
        }
        self.fullname().split_once('.').map(|(_, ext)| ext.to_ascii_lowercase()).unwrap_or_default()
    }

    /// The containing directory, or `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        let trimmed = self.path.trim_end_matches('/');
        if trimmed.is_empty() {
            return None;
        }
        let (prefix, _) = split(trimmed);
        let path = if prefix.is_empty() { "/".to_string() } else { normalize(prefix, true, true) };
        Some(Self {
            path,
            kind: ResourceKind::Directory,
        })
    }

    /// Whether the content behind this resource is text-like, judged from
    /// the extension alone.
    pub fn is_text(&self) -> bool {
        self.is_file() && TEXT_EXTENSIONS.contains(&self.ext().as_str())
    }
}

fn infer_kind(path: &str) -> ResourceKind {
    if path.ends_with('/') {
        // A trailing slash wins even when an earlier segment looks like an
        // extension.
        ResourceKind::Directory
    } else if FILE_PATTERN.is_match(path) {
        ResourceKind::File
    } else {
        ResourceKind::Directory
    }
}

impl fmt::Display for ResourceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

/// Directory entries cross serialization boundaries as
/// `{name, path, type: "folder"}` and files as
/// `{name, ext, path, type: "file", isText}`.
impl Serialize for ResourceInfo {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.kind {
            ResourceKind::Directory => {
                let mut entry = serializer.serialize_struct("ResourceInfo", 3)?;
                entry.serialize_field("name", self.name())?;
                entry.serialize_field("path", &self.path)?;
                entry.serialize_field("type", "folder")?;
                entry.end()
            },
            ResourceKind::File => {
                let mut entry = serializer.serialize_struct("ResourceInfo", 5)?;
                entry.serialize_field("name", self.name())?;
                entry.serialize_field("ext", &self.ext())?;
                entry.serialize_field("path", &self.path)?;
                entry.serialize_field("type", "file")?;
                entry.serialize_field("isText", &self.is_text())?;
                entry.end()
            },
        }
    }
}
