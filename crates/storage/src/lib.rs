//! One file-storage contract, four backends.
//!
//! Callers address every store through the same path-based vocabulary —
//! create, read, update and delete files and directories — oblivious to
//! whether the store underneath is a flat in-memory map, a directory on
//! disk, a GitHub repository or a Google Drive folder graph. The
//! [`ResourceInfo`] path model is the shared currency; each
//! [`FileManager`] implementation owns the translation into its native
//! addressing (map key, disk path, blob sha, Drive ID).

pub mod backend;
pub mod error;
pub mod path;
pub mod resource;

pub use crate::backend::{FileManager, ResourceStream};
pub use crate::resource::{ROOT_NAME, ResourceInfo, ResourceKind};
use std::sync::Arc;

pub type BackendHandle = Arc<dyn FileManager + Send + Sync>;
