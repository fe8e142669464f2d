//! Configuration for warren backends.
//!
//! Profiles name a backend and say how to reach it. They are loaded from a
//! TOML/YAML/JSON file merged with `WARREN_`-prefixed environment
//! overrides:
//!
//! ```toml
//! default = "scratch"
//!
//! [backends.scratch]
//! kind = "memory"
//!
//! [backends.docs]
//! kind = "github"
//! owner = "acme"
//! repo = "handbook"
//! branch = "main"
//! ```
//!
//! One-off identifiers skip the file entirely:
//!
//! ```
//! use warren_config::{connect, parse_uri};
//!
//! let spec = parse_uri("memory:")?;
//! let backend = connect("scratch", &spec)?;
//! # Ok::<(), warren_config::error::Error>(())
//! ```

pub mod error;
mod factory;
mod settings;

pub use crate::factory::{BackendSpec, connect, parse_uri};
pub use crate::settings::Settings;
