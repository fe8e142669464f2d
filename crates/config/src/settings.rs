//! Settings loading and profile selection.

use crate::error::{ErrorKind, Result};
use crate::factory::{self, BackendSpec};
use exn::OptionExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use warren_storage::BackendHandle;

/// Named backend profiles plus the default selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Settings {
    /// Profile to use when the caller doesn't name one.
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub backends: HashMap<String, BackendSpec>,
}

impl Settings {
    /// Load settings from an explicit profile file, or from the per-user
    /// default location, merged with `WARREN_`-prefixed environment
    /// overrides (`WARREN_DEFAULT`, `WARREN_BACKENDS__NAME__KIND`, ...).
    /// The file format follows its extension; a missing file simply yields
    /// empty settings.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();
        if let Some(path) = explicit.map(Path::to_path_buf).or_else(default_config_file) {
            figment = match path.extension().and_then(|ext| ext.to_str()) {
                Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
                Some("json") => figment.merge(Json::file(path)),
                _ => figment.merge(Toml::file(path)),
            };
        }
        let settings = Self::extract(figment)?;
        tracing::debug!(profiles = settings.backends.len(), "loaded backend profiles");
        Ok(settings)
    }

    fn extract(figment: Figment) -> Result<Self> {
        Ok(figment.merge(Env::prefixed("WARREN_").split("__")).extract().map_err(ErrorKind::Config)?)
    }

    /// Select a backend profile by name, falling back to the configured
    /// default, or to the only profile when exactly one exists.
    pub fn backend(&self, name: Option<&str>) -> Result<(&str, &BackendSpec)> {
        let chosen = name.or(self.default.as_deref()).or_else(|| {
            if self.backends.len() == 1 { self.backends.keys().next().map(String::as_str) } else { None }
        });
        let Some(chosen) = chosen else {
            exn::bail!(ErrorKind::NoDefault);
        };
        self.backends
            .get_key_value(chosen)
            .map(|(name, spec)| (name.as_str(), spec))
            .ok_or_raise(|| ErrorKind::UnknownBackend(chosen.to_string()))
    }

    /// Select and construct a backend in one step.
    pub fn connect(&self, name: Option<&str>) -> Result<BackendHandle> {
        let (name, spec) = self.backend(name)?;
        factory::connect(name, spec)
    }
}

fn default_config_file() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "warren").map(|dirs| dirs.config_dir().join("warren.toml"))
}
